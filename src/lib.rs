pub mod config;
pub mod error;
pub mod db;
pub mod graph;
pub mod ingest;
pub mod store;

pub use config::Config;
pub use error::{KgError, Result};
pub use graph::{
    build_knowledge_graph, merge_graphs, Entity, EntityType, Extractor, KnowledgeGraph, Relation,
    RelationType, SourceInfo, Statistics,
};
pub use store::GraphStore;
