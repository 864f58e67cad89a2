//! Entity extraction from heading lines and body sentences.

use std::collections::HashSet;

use super::{
    CompiledRules, Entity, EntityType, IdGenerator, IdKind, PreparedText, Properties, SourceInfo,
};
use crate::config::ExtractionConfig;

/// Type of a term under the rule set's category priority.
pub fn detect_entity_type(rules: &CompiledRules, term: &str) -> EntityType {
    rules.classify(term)
}

/// Candidate terms in `text`, in discovery order, without repeats.
///
/// Dictionary matches carry ideographic context on both sides and are kept
/// only within the configured length bounds; suffix matches are always kept.
pub(crate) fn candidate_terms(
    rules: &CompiledRules,
    config: &ExtractionConfig,
    text: &str,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut terms = Vec::new();

    for regex in rules.term_regexes() {
        for m in regex.find_iter(text) {
            let len = m.as_str().chars().count();
            if len < config.min_term_chars || len > config.max_term_chars {
                continue;
            }
            if seen.insert(m.as_str()) {
                terms.push(m.as_str().to_string());
            }
        }
    }

    for regex in rules.suffix_regexes() {
        for m in regex.find_iter(text) {
            if seen.insert(m.as_str()) {
                terms.push(m.as_str().to_string());
            }
        }
    }

    terms
}

/// Extract entities from a prepared document.
///
/// Headings are scanned first, then sentences. The first occurrence of a
/// name fixes its type, description and confidence; later occurrences in the
/// same pass are ignored.
pub fn extract_entities(
    rules: &CompiledRules,
    config: &ExtractionConfig,
    ids: &dyn IdGenerator,
    text: &PreparedText,
    source: &SourceInfo,
) -> Vec<Entity> {
    let mut entities = Vec::new();
    let mut names = HashSet::new();

    let new_entity = |name: String, description: Option<String>, confidence: f64| Entity {
        id: ids.next_id(IdKind::Entity),
        entity_type: rules.classify(&name),
        name,
        description,
        properties: Properties::new(),
        source_chapter: source.chapter.clone(),
        source_section: source.section.clone(),
        source_document_id: source.document_id.clone(),
        confidence,
    };

    for title in &text.headings {
        for term in candidate_terms(rules, config, title) {
            if names.insert(term.clone()) {
                entities.push(new_entity(term, None, config.heading_confidence));
            }
        }
    }

    for sentence in &text.sentences {
        for term in candidate_terms(rules, config, sentence) {
            if names.insert(term.clone()) {
                let description = sentence.chars().take(config.description_chars).collect();
                entities.push(new_entity(term, Some(description), config.body_confidence));
            }
        }
    }

    log::debug!(
        "Extracted {} entities from {} headings and {} sentences",
        entities.len(),
        text.headings.len(),
        text.sentences.len()
    );

    entities
}
