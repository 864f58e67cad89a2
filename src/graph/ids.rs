//! Identifier generation for entities and relations.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// What an identifier is being minted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Entity,
    Relation,
}

impl IdKind {
    fn prefix(&self) -> &'static str {
        match self {
            IdKind::Entity => "entity",
            IdKind::Relation => "relation",
        }
    }
}

/// Source of collision-resistant ids, shared by all extraction passes that feed one merge.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, kind: IdKind) -> String;
}

/// Random ids (`entity_<uuid>`), unique across runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self, kind: IdKind) -> String {
        format!("{}_{}", kind.prefix(), Uuid::new_v4().simple())
    }
}

/// Monotonic ids (`entity_1`, `relation_1`, ...), one counter per kind.
#[derive(Debug, Default)]
pub struct SequentialIds {
    entities: AtomicU64,
    relations: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self, kind: IdKind) -> String {
        let counter = match kind {
            IdKind::Entity => &self.entities,
            IdKind::Relation => &self.relations,
        };
        let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}_{}", kind.prefix(), n)
    }
}
