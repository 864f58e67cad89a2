//! Merging per-document graphs into one graph.

use std::collections::{HashMap, HashSet};

use super::{Entity, KnowledgeGraph, Relation, RelationType};

/// Combine graphs into a new graph, leaving the inputs untouched.
///
/// Entities merge by exact name: the first one seen survives, takes the
/// incoming properties (incoming keys win) and the highest confidence.
/// Relation endpoints are re-pointed at surviving entities before the
/// `(source, target, type)` dedup; relations whose endpoints cannot be
/// resolved are dropped.
///
/// Ids are expected to come from one generator. A survivor whose id an
/// earlier survivor already holds is renamed with a numeric suffix, and
/// endpoints resolve through the entities of their own graph first.
pub fn merge_graphs(graphs: &[KnowledgeGraph]) -> KnowledgeGraph {
    let mut entities: Vec<Entity> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    let mut survivor_ids: HashSet<String> = HashSet::new();
    let mut renamed = 0usize;

    for graph in graphs {
        for entity in graph.entities() {
            match by_name.get(&entity.name) {
                Some(&index) => {
                    let existing = &mut entities[index];
                    existing
                        .properties
                        .extend(entity.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
                    if entity.confidence > existing.confidence {
                        existing.confidence = entity.confidence;
                    }
                }
                None => {
                    let mut survivor = entity.clone();
                    let mut suffix = 2;
                    while survivor_ids.contains(&survivor.id) {
                        survivor.id = format!("{}_{}", entity.id, suffix);
                        suffix += 1;
                    }
                    if survivor.id != entity.id {
                        renamed += 1;
                    }
                    survivor_ids.insert(survivor.id.clone());
                    by_name.insert(entity.name.clone(), entities.len());
                    entities.push(survivor);
                }
            }
        }
    }

    if renamed > 0 {
        log::warn!(
            "Renamed {} merged entities whose ids were already taken; the graphs came from separate id generators",
            renamed
        );
    }

    // Name of every input entity id; the earliest graph wins.
    let mut original_names: HashMap<&str, &str> = HashMap::new();
    for graph in graphs {
        for entity in graph.entities() {
            original_names
                .entry(entity.id.as_str())
                .or_insert(entity.name.as_str());
        }
    }

    let survivor_named = |name: &str| by_name.get(name).map(|&index| entities[index].id.clone());

    let mut relations: Vec<Relation> = Vec::new();
    let mut triples: HashSet<(String, String, RelationType)> = HashSet::new();
    let mut dropped = 0usize;

    for graph in graphs {
        let mut local_names: HashMap<&str, &str> = HashMap::new();
        for entity in graph.entities() {
            local_names
                .entry(entity.id.as_str())
                .or_insert(entity.name.as_str());
        }

        let resolve = |id: &str| -> Option<String> {
            if let Some(&name) = local_names.get(id) {
                return survivor_named(name);
            }
            if survivor_ids.contains(id) {
                return Some(id.to_string());
            }
            original_names.get(id).and_then(|&name| survivor_named(name))
        };

        for relation in graph.relations() {
            let (Some(source), Some(target)) = (
                resolve(&relation.source_entity_id),
                resolve(&relation.target_entity_id),
            ) else {
                dropped += 1;
                continue;
            };

            if source == target {
                dropped += 1;
                continue;
            }
            if !triples.insert((source.clone(), target.clone(), relation.relation_type)) {
                continue;
            }

            relations.push(Relation {
                source_entity_id: source,
                target_entity_id: target,
                ..relation.clone()
            });
        }
    }

    if dropped > 0 {
        log::debug!("Dropped {} unresolvable relations while merging", dropped);
    }

    KnowledgeGraph::new(entities, relations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{
        build_knowledge_graph, EntityType, Extractor, Properties, PropertyValue, SequentialIds,
        SourceInfo,
    };
    use std::sync::Arc;

    fn entity(id: &str, name: &str, doc: &str, confidence: f64) -> Entity {
        Entity {
            id: id.to_string(),
            name: name.to_string(),
            entity_type: EntityType::GeologicalStructure,
            description: None,
            properties: Properties::new(),
            source_chapter: None,
            source_section: None,
            source_document_id: Some(doc.to_string()),
            confidence,
        }
    }

    fn relation(id: &str, source: &str, target: &str, relation_type: RelationType) -> Relation {
        Relation {
            id: id.to_string(),
            source_entity_id: source.to_string(),
            target_entity_id: target.to_string(),
            relation_type,
            description: None,
            source_text: None,
            source_document_id: None,
            confidence: 0.8,
        }
    }

    fn triples(graph: &KnowledgeGraph) -> HashSet<(String, String, RelationType)> {
        graph
            .relations()
            .iter()
            .map(|r| {
                (
                    graph.entity(&r.source_entity_id).unwrap().name.clone(),
                    graph.entity(&r.target_entity_id).unwrap().name.clone(),
                    r.relation_type,
                )
            })
            .collect()
    }

    #[test]
    fn test_same_name_entities_merge_properties() {
        let mut a = entity("a1", "华北板块", "doc-a", 0.6);
        a.properties.insert("era".to_string(), PropertyValue::from("太古代"));
        a.properties.insert("area".to_string(), PropertyValue::from(1.0));
        let mut b = entity("b1", "华北板块", "doc-b", 0.8);
        b.properties.insert("area".to_string(), PropertyValue::from(2.0));
        b.properties.insert("stable".to_string(), PropertyValue::from(true));

        let merged = merge_graphs(&[
            KnowledgeGraph::new(vec![a], vec![]),
            KnowledgeGraph::new(vec![b], vec![]),
        ]);

        assert_eq!(merged.entities().len(), 1);
        let e = &merged.entities()[0];
        assert_eq!(e.id, "a1");
        assert_eq!(e.source_document_id.as_deref(), Some("doc-a"));
        assert_eq!(e.confidence, 0.8);
        assert_eq!(e.properties.len(), 3);
        assert_eq!(e.properties["area"], PropertyValue::Number(2.0));
        assert_eq!(e.properties["stable"], PropertyValue::Bool(true));
    }

    #[test]
    fn test_relations_repointed_to_survivors() {
        let g1 = KnowledgeGraph::new(vec![entity("a1", "华北板块", "doc-a", 0.8)], vec![]);
        let g2 = KnowledgeGraph::new(
            vec![
                entity("b1", "华北板块", "doc-b", 0.6),
                entity("b2", "郯庐断裂带", "doc-b", 0.6),
            ],
            vec![relation("r1", "b2", "b1", RelationType::LocatedIn)],
        );

        let merged = merge_graphs(&[g1, g2]);
        assert_eq!(merged.entities().len(), 2);
        assert_eq!(merged.relations().len(), 1);
        assert_eq!(merged.relations()[0].source_entity_id, "b2");
        assert_eq!(merged.relations()[0].target_entity_id, "a1");
    }

    #[test]
    fn test_duplicate_relations_collapse_after_repointing() {
        let g1 = KnowledgeGraph::new(
            vec![
                entity("a1", "华北板块", "doc-a", 0.6),
                entity("a2", "扬子板块", "doc-a", 0.6),
            ],
            vec![relation("r1", "a2", "a1", RelationType::BelongsTo)],
        );
        let g2 = KnowledgeGraph::new(
            vec![
                entity("b1", "华北板块", "doc-b", 0.6),
                entity("b2", "扬子板块", "doc-b", 0.6),
            ],
            vec![
                relation("r2", "b2", "b1", RelationType::BelongsTo),
                relation("r3", "b2", "b1", RelationType::Contains),
            ],
        );

        let merged = merge_graphs(&[g1, g2]);
        assert_eq!(merged.relations().len(), 2);
        assert_eq!(merged.relations()[0].id, "r1");
        assert_eq!(merged.relations()[1].id, "r3");
        assert_eq!(merged.statistics().relation_types["belongs_to"], 1);
    }

    #[test]
    fn test_unresolvable_relation_dropped() {
        let g = KnowledgeGraph::new(
            vec![entity("a1", "华北板块", "doc-a", 0.6)],
            vec![relation("r1", "a1", "ghost", RelationType::Causes)],
        );
        let merged = merge_graphs(&[g]);
        assert_eq!(merged.entities().len(), 1);
        assert!(merged.relations().is_empty());
        assert_eq!(merged.statistics().total_relations, 0);
    }

    #[test]
    fn test_merge_with_itself_is_idempotent() {
        let markdown = "# 郯庐断裂带\n郯庐断裂带位于华北板块与扬子板块之间。\n华北板块属于中国东部板块，";
        let g = build_knowledge_graph(markdown, &SourceInfo::new().with_document("doc-1"));
        assert!(!g.relations().is_empty());

        let merged = merge_graphs(&[g.clone(), g.clone()]);

        let names = |graph: &KnowledgeGraph| -> HashSet<String> {
            graph.entities().iter().map(|e| e.name.clone()).collect()
        };
        assert_eq!(names(&merged), names(&g));
        assert_eq!(merged.entities().len(), g.entities().len());
        assert_eq!(triples(&merged), triples(&g));
        assert_eq!(merged.relations().len(), g.relations().len());
    }

    #[test]
    fn test_inputs_untouched_and_statistics_recomputed() {
        let ids = Arc::new(SequentialIds::new());
        let extractor = Extractor::geology().with_id_generator(ids);
        let g1 = extractor.build_graph("# 秦岭造山带\n秦岭造山带属于中央造山带，", &SourceInfo::new());
        let g2 = extractor.build_graph("# 秦岭造山带\n# 寒武纪\n", &SourceInfo::new());
        let (before1, before2) = (g1.clone(), g2.clone());

        let merged = merge_graphs(&[g1.clone(), g2.clone()]);

        assert_eq!(g1, before1);
        assert_eq!(g2, before2);
        let stats = merged.statistics();
        assert_eq!(stats.total_entities, merged.entities().len());
        assert_eq!(stats.total_relations, merged.relations().len());
        assert_eq!(stats.entity_types.values().sum::<usize>(), stats.total_entities);
        assert!(merged.entity_by_name("寒武纪").is_some());
    }

    #[test]
    fn test_separate_id_pools_stay_distinct() {
        // Both graphs numbered their entities from entity_1.
        let g1 = KnowledgeGraph::new(vec![entity("entity_1", "华北板块", "doc-a", 0.8)], vec![]);
        let g2 = KnowledgeGraph::new(
            vec![
                entity("entity_1", "郯庐断裂带", "doc-b", 0.6),
                entity("entity_2", "扬子板块", "doc-b", 0.6),
            ],
            vec![relation("relation_1", "entity_1", "entity_2", RelationType::LocatedIn)],
        );

        let merged = merge_graphs(&[g1, g2]);

        assert_eq!(merged.entities().len(), 3);
        let ids: HashSet<&str> = merged.entities().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(merged.entity_by_name("华北板块").unwrap().id, "entity_1");
        assert_eq!(merged.entity_by_name("郯庐断裂带").unwrap().id, "entity_1_2");

        let expected: HashSet<_> = [(
            "郯庐断裂带".to_string(),
            "扬子板块".to_string(),
            RelationType::LocatedIn,
        )]
        .into_iter()
        .collect();
        assert_eq!(triples(&merged), expected);
    }

    #[test]
    fn test_separate_extractors_merge_by_name() {
        let first = Extractor::geology().with_id_generator(Arc::new(SequentialIds::new()));
        let second = Extractor::geology().with_id_generator(Arc::new(SequentialIds::new()));
        let g1 = first.build_graph("# 秦岭造山带\n", &SourceInfo::new());
        let g2 = second.build_graph(
            "# 郯庐断裂带\n郯庐断裂带位于华北板块与扬子板块之间。",
            &SourceInfo::new(),
        );

        let merged = merge_graphs(&[g1.clone(), g2.clone()]);

        let ids: HashSet<&str> = merged.entities().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), merged.entities().len());
        assert_eq!(triples(&merged), triples(&g2));
    }

    #[test]
    fn test_merge_nothing() {
        let merged = merge_graphs(&[]);
        assert!(merged.is_empty());
        assert_eq!(merged.statistics().total_entities, 0);
    }
}
