//! Relation extraction: lexical patterns plus sentence co-occurrence.

use std::collections::{HashMap, HashSet};

use super::{CompiledRules, Entity, IdGenerator, IdKind, Relation, RelationType, SourceInfo};
use crate::config::ExtractionConfig;

const EXACT_MATCH_CONFIDENCE: f64 = 0.8;
const FUZZY_MATCH_CONFIDENCE: f64 = 0.5;

/// Co-occurrence count at which confidence saturates at 1.0.
const COOCCURRENCE_SATURATION: f64 = 10.0;

/// Resolve a captured phrase to an entity: exact name first, then the first
/// entity whose name contains or is contained in the phrase.
///
/// Containment is unrestricted, so a short name like "带" can match many
/// phrases. The flag reports whether the match was exact.
fn resolve_phrase<'e>(
    phrase: &str,
    by_name: &HashMap<&str, &'e Entity>,
    entities: &'e [Entity],
) -> Option<(&'e Entity, bool)> {
    if phrase.is_empty() {
        return None;
    }
    if let Some(entity) = by_name.get(phrase) {
        return Some((*entity, true));
    }
    entities
        .iter()
        .find(|e| phrase.contains(e.name.as_str()) || e.name.contains(phrase))
        .map(|e| (e, false))
}

#[derive(Default)]
struct PairEvidence {
    count: usize,
    examples: Vec<String>,
}

/// Extract relations between already-extracted entities.
///
/// Pattern relations are found first, in table order. Co-occurrence then adds
/// a `related_to` edge for each entity pair sharing enough sentences, unless
/// the pair is already linked in either direction. Pair counting is
/// quadratic in the entities present per sentence; chunk very large
/// documents by section.
pub fn extract_relations(
    rules: &CompiledRules,
    config: &ExtractionConfig,
    ids: &dyn IdGenerator,
    sentences: &[String],
    entities: &[Entity],
    source: &SourceInfo,
) -> Vec<Relation> {
    let mut relations = Vec::new();
    if entities.is_empty() {
        return relations;
    }

    let by_name: HashMap<&str, &Entity> = entities.iter().map(|e| (e.name.as_str(), e)).collect();
    let mut triples: HashSet<(&str, &str, RelationType)> = HashSet::new();

    for (relation_type, regex) in rules.patterns() {
        for sentence in sentences {
            for caps in regex.captures_iter(sentence) {
                let (Some(source_phrase), Some(target_phrase)) = (caps.get(1), caps.get(2)) else {
                    continue;
                };
                let Some((from, from_exact)) =
                    resolve_phrase(source_phrase.as_str().trim(), &by_name, entities)
                else {
                    continue;
                };
                let Some((to, to_exact)) =
                    resolve_phrase(target_phrase.as_str().trim(), &by_name, entities)
                else {
                    continue;
                };

                if from.id == to.id {
                    continue;
                }
                if !triples.insert((from.id.as_str(), to.id.as_str(), *relation_type)) {
                    continue;
                }

                relations.push(Relation {
                    id: ids.next_id(IdKind::Relation),
                    source_entity_id: from.id.clone(),
                    target_entity_id: to.id.clone(),
                    relation_type: *relation_type,
                    description: None,
                    source_text: Some(caps[0].to_string()),
                    source_document_id: source.document_id.clone(),
                    confidence: if from_exact && to_exact {
                        EXACT_MATCH_CONFIDENCE
                    } else {
                        FUZZY_MATCH_CONFIDENCE
                    },
                });
            }
        }
    }
    let pattern_count = relations.len();

    // Pairs keyed by entity position (lower first), kept in first-seen order
    let mut pairs: HashMap<(usize, usize), PairEvidence> = HashMap::new();
    let mut pair_order = Vec::new();

    for sentence in sentences {
        let present: Vec<usize> = entities
            .iter()
            .enumerate()
            .filter(|(_, e)| sentence.contains(e.name.as_str()))
            .map(|(i, _)| i)
            .collect();

        for (n, &i) in present.iter().enumerate() {
            for &j in &present[n + 1..] {
                let evidence = pairs.entry((i, j)).or_insert_with(|| {
                    pair_order.push((i, j));
                    PairEvidence::default()
                });
                evidence.count += 1;
                if evidence.examples.len() < config.cooccurrence_max_examples {
                    evidence.examples.push(sentence.clone());
                }
            }
        }
    }

    let linked: HashSet<(String, String)> = relations
        .iter()
        .map(|r| (r.source_entity_id.clone(), r.target_entity_id.clone()))
        .collect();

    for (i, j) in pair_order {
        let evidence = &pairs[&(i, j)];
        if evidence.count < config.cooccurrence_min_count {
            continue;
        }

        let (a, b) = (&entities[i], &entities[j]);
        if a.id == b.id
            || linked.contains(&(a.id.clone(), b.id.clone()))
            || linked.contains(&(b.id.clone(), a.id.clone()))
        {
            continue;
        }

        relations.push(Relation {
            id: ids.next_id(IdKind::Relation),
            source_entity_id: a.id.clone(),
            target_entity_id: b.id.clone(),
            relation_type: RelationType::RelatedTo,
            description: None,
            source_text: evidence.examples.first().cloned(),
            source_document_id: source.document_id.clone(),
            confidence: (evidence.count as f64 / COOCCURRENCE_SATURATION).min(1.0),
        });
    }

    log::debug!(
        "Extracted {} pattern relations and {} co-occurrence relations",
        pattern_count,
        relations.len() - pattern_count
    );

    relations
}
