//! Extraction facade: rules, thresholds and id source bundled together.

use std::sync::{Arc, OnceLock};

use super::{
    entities, relations, CompiledRules, Entity, IdGenerator, KnowledgeGraph, PreparedText,
    Relation, RuleSet, SourceInfo, UuidIds,
};
use crate::config::ExtractionConfig;
use crate::error::Result;

/// Compiled rule set plus the settings every extraction pass needs.
///
/// Cheap to share behind an `Arc`; extraction never mutates it.
pub struct Extractor {
    rules: CompiledRules,
    config: ExtractionConfig,
    ids: Arc<dyn IdGenerator>,
}

impl Extractor {
    pub fn new(rules: &RuleSet, config: ExtractionConfig) -> Result<Self> {
        Ok(Self {
            rules: rules.compile()?,
            config,
            ids: Arc::new(UuidIds),
        })
    }

    /// Build from configuration, loading `rules_path` when set.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        let rules = match &config.rules_path {
            Some(path) => {
                log::info!("Loading extraction rules from {}", path.display());
                RuleSet::load(path)?
            }
            None => RuleSet::geology(),
        };
        Self::new(&rules, config.clone())
    }

    /// Built-in geology rules with default thresholds.
    pub fn geology() -> Self {
        Self::new(&RuleSet::geology(), ExtractionConfig::default())
            .expect("built-in geology rules compile")
    }

    /// Replace the id source. Graphs that will be merged should share one.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn rules(&self) -> &CompiledRules {
        &self.rules
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn extract_entities(&self, markdown: &str, source: &SourceInfo) -> Vec<Entity> {
        let text = PreparedText::new(markdown, self.config.min_sentence_chars);
        entities::extract_entities(&self.rules, &self.config, self.ids.as_ref(), &text, source)
    }

    pub fn extract_relations(
        &self,
        markdown: &str,
        entities: &[Entity],
        source: &SourceInfo,
    ) -> Vec<Relation> {
        let text = PreparedText::new(markdown, self.config.min_sentence_chars);
        relations::extract_relations(
            &self.rules,
            &self.config,
            self.ids.as_ref(),
            &text.sentences,
            entities,
            source,
        )
    }

    /// Run both passes over one document.
    pub fn build_graph(&self, markdown: &str, source: &SourceInfo) -> KnowledgeGraph {
        let text = PreparedText::new(markdown, self.config.min_sentence_chars);
        let ids = self.ids.as_ref();

        let entities = entities::extract_entities(&self.rules, &self.config, ids, &text, source);
        let relations = relations::extract_relations(
            &self.rules,
            &self.config,
            ids,
            &text.sentences,
            &entities,
            source,
        );

        KnowledgeGraph::new(entities, relations)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::geology()
    }
}

/// Build a graph from one document with the built-in geology rules.
pub fn build_knowledge_graph(markdown: &str, source: &SourceInfo) -> KnowledgeGraph {
    static DEFAULT: OnceLock<Extractor> = OnceLock::new();
    DEFAULT.get_or_init(Extractor::geology).build_graph(markdown, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EntityType, RelationType, SequentialIds};
    use std::collections::HashSet;
    use tempfile::TempDir;

    const SAMPLE: &str = "# 郯庐断裂带\n郯庐断裂带位于华北板块与扬子板块之间。";

    fn sequential() -> Extractor {
        Extractor::geology().with_id_generator(Arc::new(SequentialIds::new()))
    }

    #[test]
    fn test_heading_entity_and_located_in_relation() {
        let graph = build_knowledge_graph(SAMPLE, &SourceInfo::new().with_document("doc-1"));

        let fault = graph.entity_by_name("郯庐断裂带").unwrap();
        assert_eq!(fault.entity_type, EntityType::GeologicalStructure);
        assert_eq!(fault.confidence, 0.8);
        assert_eq!(fault.source_document_id.as_deref(), Some("doc-1"));

        let located: Vec<_> = graph
            .relations()
            .iter()
            .filter(|r| r.relation_type == RelationType::LocatedIn)
            .collect();
        assert_eq!(located.len(), 1);
        assert_eq!(located[0].source_entity_id, fault.id);
        assert!(located[0].source_text.as_ref().unwrap().contains("位于"));
        assert_eq!(located[0].confidence, 0.5);
    }

    #[test]
    fn test_text_without_ideographs() {
        let graph = build_knowledge_graph("Hello world.", &SourceInfo::new());
        assert!(graph.is_empty());
        assert_eq!(graph.statistics().total_entities, 0);
        assert_eq!(graph.statistics().total_relations, 0);
    }

    #[test]
    fn test_deterministic_with_sequential_ids() {
        let markdown = "# 秦岭造山带\n秦岭造山带属于中央造山带，\n郯庐断裂带位于华北板块与扬子板块之间。";
        let a = sequential().build_graph(markdown, &SourceInfo::new());
        let b = sequential().build_graph(markdown, &SourceInfo::new());
        assert_eq!(a, b);

        // Fresh uuids each call; names, types and named triples still agree.
        let c = build_knowledge_graph(markdown, &SourceInfo::new());
        let d = build_knowledge_graph(markdown, &SourceInfo::new());
        let entities = |g: &KnowledgeGraph| -> Vec<(String, EntityType)> {
            g.entities().iter().map(|e| (e.name.clone(), e.entity_type)).collect()
        };
        let triples = |g: &KnowledgeGraph| -> Vec<(String, String, RelationType)> {
            g.relations()
                .iter()
                .map(|r| {
                    (
                        g.entity(&r.source_entity_id).unwrap().name.clone(),
                        g.entity(&r.target_entity_id).unwrap().name.clone(),
                        r.relation_type,
                    )
                })
                .collect()
        };
        assert_ne!(c.entities()[0].id, d.entities()[0].id);
        assert_eq!(entities(&c), entities(&d));
        assert_eq!(triples(&c), triples(&d));
        assert_eq!(entities(&a), entities(&c));
        assert_eq!(triples(&a), triples(&c));
        assert!(!triples(&a).is_empty());
    }

    #[test]
    fn test_graph_invariants() {
        let markdown = "# 第一章 板块构造\n\n华北板块与扬子板块碰撞，形成秦岭造山带。\n\
                        岩浆活动导致火山喷发。\n华北板块、扬子板块、秦岭造山带，三者相互作用。\n\
                        华北板块、扬子板块、秦岭造山带，仍在演化之中。\n\
                        华北板块、扬子板块、秦岭造山带，记录了碰撞历史。";
        let graph = sequential().build_graph(markdown, &SourceInfo::new());

        let ids: HashSet<_> = graph.entities().iter().map(|e| e.id.as_str()).collect();
        let names: HashSet<_> = graph.entities().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(ids.len(), graph.entities().len());
        assert_eq!(names.len(), graph.entities().len());

        let mut triples = HashSet::new();
        for r in graph.relations() {
            assert_ne!(r.source_entity_id, r.target_entity_id);
            assert!(ids.contains(r.source_entity_id.as_str()));
            assert!(ids.contains(r.target_entity_id.as_str()));
            assert!((0.0..=1.0).contains(&r.confidence));
            assert!(triples.insert((&r.source_entity_id, &r.target_entity_id, r.relation_type)));
        }

        let stats = graph.statistics();
        assert_eq!(stats.total_entities, graph.entities().len());
        assert_eq!(stats.total_relations, graph.relations().len());
        assert_eq!(stats.entity_types.values().sum::<usize>(), stats.total_entities);
        assert_eq!(stats.relation_types.values().sum::<usize>(), stats.total_relations);
    }

    #[test]
    fn test_separate_passes_match_build_graph() {
        let extractor = sequential();
        let source = SourceInfo::new();
        let entities = extractor.extract_entities(SAMPLE, &source);
        let relations = extractor.extract_relations(SAMPLE, &entities, &source);
        assert_eq!(entities.len(), 3);
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].relation_type, RelationType::LocatedIn);
    }

    #[test]
    fn test_from_config_loads_rules_file() {
        let temp_dir = TempDir::new().unwrap();
        let rules_path = temp_dir.path().join("rules.toml");
        std::fs::write(
            &rules_path,
            r#"
[dictionary]
structures = ["冰川"]
phenomena = []
locations = []
ages = []
theories = []

[[patterns]]
relation = "causes"
pattern = "(.+?)导致(.+?)(?:[。，]|$)"
"#,
        )
        .unwrap();

        let config = ExtractionConfig {
            rules_path: Some(rules_path),
            ..ExtractionConfig::default()
        };
        let extractor = Extractor::from_config(&config).unwrap();
        assert_eq!(extractor.rules().dictionary().structures, vec!["冰川"]);

        let graph = extractor.build_graph("# 冰川\n", &SourceInfo::new());
        assert_eq!(graph.entities().len(), 1);
        assert_eq!(graph.entities()[0].name, "冰川");
    }

    #[test]
    fn test_from_config_missing_rules_file() {
        let config = ExtractionConfig {
            rules_path: Some("/nonexistent/rules.toml".into()),
            ..ExtractionConfig::default()
        };
        assert!(Extractor::from_config(&config).is_err());
    }
}
