//! Knowledge graph module: rule-based extraction, merging and the outline variant.
//!
//! Turns Markdown book text into typed entities and relations using a term
//! dictionary and a relation-pattern table, then combines per-document graphs
//! into one graph by entity name.

mod builder;
mod entities;
mod ids;
mod merge;
mod normalize;
pub mod outline;
mod relations;
mod rules;

pub use builder::{build_knowledge_graph, Extractor};
pub use entities::{detect_entity_type, extract_entities};
pub use ids::{IdGenerator, IdKind, SequentialIds, UuidIds};
pub use merge::merge_graphs;
pub use normalize::{heading_titles, normalize_markdown, split_sentences, PreparedText};
pub use relations::extract_relations;
pub use rules::{CompiledRules, PatternRule, RuleSet, TermDictionary};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Classification of an extracted entity. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    GeologicalStructure,
    GeologicalPhenomenon,
    Location,
    GeologicalAge,
    Theory,
    Chapter,
    Concept,
}

impl EntityType {
    pub const ALL: [EntityType; 7] = [
        EntityType::GeologicalStructure,
        EntityType::GeologicalPhenomenon,
        EntityType::Location,
        EntityType::GeologicalAge,
        EntityType::Theory,
        EntityType::Chapter,
        EntityType::Concept,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::GeologicalStructure => "geological_structure",
            EntityType::GeologicalPhenomenon => "geological_phenomenon",
            EntityType::Location => "location",
            EntityType::GeologicalAge => "geological_age",
            EntityType::Theory => "theory",
            EntityType::Chapter => "chapter",
            EntityType::Concept => "concept",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = crate::KgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| crate::KgError::InvalidInput(format!("unknown entity type: {}", s)))
    }
}

/// Kind of a directed relation between two entities. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    BelongsTo,
    Causes,
    Forms,
    LocatedIn,
    OccursIn,
    RelatedTo,
    Contains,
}

impl RelationType {
    pub const ALL: [RelationType; 7] = [
        RelationType::BelongsTo,
        RelationType::Causes,
        RelationType::Forms,
        RelationType::LocatedIn,
        RelationType::OccursIn,
        RelationType::RelatedTo,
        RelationType::Contains,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::BelongsTo => "belongs_to",
            RelationType::Causes => "causes",
            RelationType::Forms => "forms",
            RelationType::LocatedIn => "located_in",
            RelationType::OccursIn => "occurs_in",
            RelationType::RelatedTo => "related_to",
            RelationType::Contains => "contains",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = crate::KgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| crate::KgError::InvalidInput(format!("unknown relation type: {}", s)))
    }
}

/// Value stored in an entity's property bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::Number(n)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

pub type Properties = BTreeMap<String, PropertyValue>;

/// A named domain concept extracted from text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    /// Exact extracted term; the dedup key within one extraction pass.
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_chapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_document_id: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}

/// A directed, typed association between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub id: String,
    pub source_entity_id: String,
    pub target_entity_id: String,
    #[serde(rename = "type")]
    pub relation_type: RelationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_document_id: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}

/// Counts derived from a graph's entities and relations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_entities: usize,
    pub total_relations: usize,
    pub entity_types: BTreeMap<String, usize>,
    pub relation_types: BTreeMap<String, usize>,
}

impl Statistics {
    pub fn compute(entities: &[Entity], relations: &[Relation]) -> Self {
        let mut entity_types = BTreeMap::new();
        for entity in entities {
            *entity_types
                .entry(entity.entity_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        let mut relation_types = BTreeMap::new();
        for relation in relations {
            *relation_types
                .entry(relation.relation_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        Self {
            total_entities: entities.len(),
            total_relations: relations.len(),
            entity_types,
            relation_types,
        }
    }
}

/// Entities, relations and their statistics.
///
/// Fields are private so `statistics` always matches the parts; it is
/// recomputed on construction and on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "GraphRecord")]
pub struct KnowledgeGraph {
    entities: Vec<Entity>,
    relations: Vec<Relation>,
    statistics: Statistics,
}

#[derive(Deserialize)]
struct GraphRecord {
    #[serde(default)]
    entities: Vec<Entity>,
    #[serde(default)]
    relations: Vec<Relation>,
}

impl From<GraphRecord> for KnowledgeGraph {
    fn from(record: GraphRecord) -> Self {
        KnowledgeGraph::new(record.entities, record.relations)
    }
}

impl KnowledgeGraph {
    pub fn new(entities: Vec<Entity>, relations: Vec<Relation>) -> Self {
        let statistics = Statistics::compute(&entities, &relations);
        Self {
            entities,
            relations,
            statistics,
        }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn entity_by_name(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn into_parts(self) -> (Vec<Entity>, Vec<Relation>) {
        (self.entities, self.relations)
    }
}

/// Provenance attached to everything extracted from one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceInfo {
    pub document_id: Option<String>,
    pub chapter: Option<String>,
    pub section: Option<String>,
}

impl SourceInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn with_chapter(mut self, chapter: impl Into<String>) -> Self {
        self.chapter = Some(chapter.into());
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }
}
