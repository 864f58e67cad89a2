//! SQLite-backed graph store.
//!
//! Each document owns the entities and relations extracted from it; saving a
//! document replaces them wholesale. Relations created by hand may link
//! entities of different documents and belong to no document. Deleting an
//! entity removes every relation touching it.

mod rows;
mod traversal;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::db::Db;
use crate::error::{KgError, Result};
use crate::graph::{
    merge_graphs, Entity, EntityType, IdGenerator, IdKind, KnowledgeGraph, Properties, Relation,
    RelationType, SourceInfo, UuidIds,
};
use rows::{ENTITY_COLUMNS, RELATION_COLUMNS};

/// A stored document and the provenance its graph was extracted with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub document_id: String,
    pub content_hash: String,
    pub chapter: Option<String>,
    pub section: Option<String>,
}

impl DocumentRecord {
    pub fn source_info(&self) -> SourceInfo {
        SourceInfo {
            document_id: Some(self.document_id.clone()),
            chapter: self.chapter.clone(),
            section: self.section.clone(),
        }
    }
}

/// Entity search filters. Unset filters match everything.
#[derive(Debug, Clone)]
pub struct EntityQuery {
    /// Substring of the name or description.
    pub text: Option<String>,
    pub entity_type: Option<EntityType>,
    pub document_id: Option<String>,
    pub limit: usize,
}

impl Default for EntityQuery {
    fn default() -> Self {
        Self {
            text: None,
            entity_type: None,
            document_id: None,
            limit: 20,
        }
    }
}

/// Fields to change on an entity; `properties` are merged into the existing bag.
#[derive(Debug, Clone, Default)]
pub struct EntityUpdate {
    pub name: Option<String>,
    pub entity_type: Option<EntityType>,
    pub description: Option<String>,
    pub properties: Option<Properties>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NewRelation {
    pub source_entity_id: String,
    pub target_entity_id: String,
    pub relation_type: RelationType,
    pub description: Option<String>,
    pub source_text: Option<String>,
    pub confidence: f64,
}

/// A path between two entities, in hop order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphPath {
    pub entity_ids: Vec<String>,
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

impl GraphPath {
    /// Number of relations traversed.
    pub fn hops(&self) -> usize {
        self.relations.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatistics {
    pub documents_count: usize,
    pub total_entities: usize,
    pub total_relations: usize,
    pub entity_types: BTreeMap<String, usize>,
    pub relation_types: BTreeMap<String, usize>,
}

fn validate_confidence(confidence: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err(KgError::InvalidInput(format!(
            "confidence must be between 0.0 and 1.0, got {}",
            confidence
        )));
    }
    Ok(())
}

fn type_counts(
    conn: &rusqlite::Connection,
    table: &str,
    column: &str,
    document_id: Option<&str>,
) -> Result<BTreeMap<String, usize>> {
    let sql = format!(
        "SELECT {column}, COUNT(*) FROM {table} \
         WHERE (?1 IS NULL OR document_id = ?1) GROUP BY {column}",
        column = column,
        table = table
    );
    let mut stmt = conn.prepare(&sql)?;
    let counts = stmt
        .query_map([document_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })?
        .collect::<std::result::Result<BTreeMap<_, _>, rusqlite::Error>>()?;
    Ok(counts)
}

fn document_exists(conn: &rusqlite::Connection, document_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE document_id = ?1",
        [document_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Graph persistence and queries over a [`Db`].
#[derive(Clone)]
pub struct GraphStore {
    db: Db,
    ids: Arc<dyn IdGenerator>,
}

impl GraphStore {
    pub fn new(db: Db) -> Self {
        Self {
            db,
            ids: Arc::new(UuidIds),
        }
    }

    /// Open the database at `db_path` and apply pending migrations.
    pub async fn open<P: AsRef<Path>, M: AsRef<Path>>(db_path: P, migrations_dir: M) -> Result<Self> {
        let db = Db::new(db_path);
        db.migrate(migrations_dir).await?;
        Ok(Self::new(db))
    }

    /// Id source for relations created through [`GraphStore::create_relation`].
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Replace a document's stored graph.
    pub async fn save_graph(&self, document: DocumentRecord, graph: KnowledgeGraph) -> Result<()> {
        self.db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                let doc_id = document.document_id.as_str();

                tx.execute("DELETE FROM documents WHERE document_id = ?1", [doc_id])?;
                tx.execute(
                    "INSERT INTO documents (document_id, content_hash, chapter, section) \
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![doc_id, document.content_hash, document.chapter, document.section],
                )?;
                for entity in graph.entities() {
                    rows::insert_entity(&tx, entity, Some(doc_id))?;
                }
                for relation in graph.relations() {
                    rows::insert_relation(&tx, relation, Some(doc_id))?;
                }

                tx.commit()?;
                log::debug!(
                    "Saved {}: {} entities, {} relations",
                    doc_id,
                    graph.entities().len(),
                    graph.relations().len()
                );
                Ok(())
            })
            .await
    }

    /// Delete a document with everything extracted from it.
    /// Returns false when the document was not stored.
    pub async fn remove_document(&self, document_id: &str) -> Result<bool> {
        let document_id = document_id.to_string();
        self.db
            .with_connection(move |conn| {
                let removed =
                    conn.execute("DELETE FROM documents WHERE document_id = ?1", [&document_id])?;
                Ok(removed > 0)
            })
            .await
    }

    pub async fn documents(&self) -> Result<Vec<DocumentRecord>> {
        self.db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT document_id, content_hash, chapter, section FROM documents ORDER BY document_id",
                )?;
                let documents = stmt
                    .query_map([], |row| {
                        Ok(DocumentRecord {
                            document_id: row.get(0)?,
                            content_hash: row.get(1)?,
                            chapter: row.get(2)?,
                            section: row.get(3)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok(documents)
            })
            .await
    }

    /// Stored content hash per document id.
    pub async fn document_hashes(&self) -> Result<HashMap<String, String>> {
        Ok(self
            .documents()
            .await?
            .into_iter()
            .map(|d| (d.document_id, d.content_hash))
            .collect())
    }

    pub async fn load_graph(&self, document_id: &str) -> Result<KnowledgeGraph> {
        let document_id = document_id.to_string();
        self.db
            .with_connection(move |conn| {
                if !document_exists(conn, &document_id)? {
                    return Err(KgError::DocumentNotFound(document_id));
                }
                let entities = rows::query_entities(
                    conn,
                    &format!("SELECT {} FROM entities WHERE document_id = ?1 ORDER BY rowid", ENTITY_COLUMNS),
                    [&document_id],
                )?;
                let relations = rows::query_relations(
                    conn,
                    &format!("SELECT {} FROM relations WHERE document_id = ?1 ORDER BY rowid", RELATION_COLUMNS),
                    [&document_id],
                )?;
                Ok(KnowledgeGraph::new(entities, relations))
            })
            .await
    }

    /// Every stored document merged into one graph, documents in id order.
    /// Relations that belong to no document are merged last.
    pub async fn load_merged(&self) -> Result<KnowledgeGraph> {
        let mut graphs = Vec::new();
        for document in self.documents().await? {
            graphs.push(self.load_graph(&document.document_id).await?);
        }

        let unowned = self
            .db
            .with_connection(|conn| {
                rows::query_relations(
                    conn,
                    &format!("SELECT {} FROM relations WHERE document_id IS NULL ORDER BY rowid", RELATION_COLUMNS),
                    [],
                )
            })
            .await?;
        if !unowned.is_empty() {
            graphs.push(KnowledgeGraph::new(Vec::new(), unowned));
        }

        Ok(merge_graphs(&graphs))
    }

    /// Entities matching every set filter, highest confidence first.
    pub async fn search_entities(&self, query: EntityQuery) -> Result<Vec<Entity>> {
        self.db
            .with_connection(move |conn| {
                let mut sql = format!("SELECT {} FROM entities WHERE 1 = 1", ENTITY_COLUMNS);
                let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

                if let Some(text) = query.text.filter(|t| !t.is_empty()) {
                    values.push(Box::new(text));
                    sql.push_str(&format!(
                        " AND (instr(name, ?{n}) > 0 OR instr(COALESCE(description, ''), ?{n}) > 0)",
                        n = values.len()
                    ));
                }
                if let Some(entity_type) = query.entity_type {
                    values.push(Box::new(entity_type.as_str()));
                    sql.push_str(&format!(" AND entity_type = ?{}", values.len()));
                }
                if let Some(document_id) = query.document_id {
                    values.push(Box::new(document_id));
                    sql.push_str(&format!(" AND document_id = ?{}", values.len()));
                }
                values.push(Box::new(query.limit as i64));
                sql.push_str(&format!(" ORDER BY confidence DESC, rowid LIMIT ?{}", values.len()));

                rows::query_entities(conn, &sql, rusqlite::params_from_iter(values))
            })
            .await
    }

    pub async fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        let id = id.to_string();
        self.db
            .with_connection(move |conn| rows::get_entity(conn, &id))
            .await
    }

    /// Relations touching an entity in either direction, optionally filtered by type.
    pub async fn entity_relations(&self, id: &str, types: &[RelationType]) -> Result<Vec<Relation>> {
        let id = id.to_string();
        let types = types.to_vec();
        self.db
            .with_connection(move |conn| {
                if !rows::entity_exists(conn, &id)? {
                    return Err(KgError::EntityNotFound(id));
                }
                rows::relations_touching(conn, &id, &types)
            })
            .await
    }

    /// Shortest path between two entities, following relations in either
    /// direction. `None` when no path exists within `max_depth` hops.
    pub async fn find_path(
        &self,
        source_id: &str,
        target_id: &str,
        max_depth: usize,
    ) -> Result<Option<GraphPath>> {
        let (source_id, target_id) = (source_id.to_string(), target_id.to_string());
        self.db
            .with_connection(move |conn| {
                for id in [&source_id, &target_id] {
                    if !rows::entity_exists(conn, id)? {
                        return Err(KgError::EntityNotFound(id.clone()));
                    }
                }

                let Some((entity_ids, relations)) =
                    traversal::shortest_path(conn, &source_id, &target_id, max_depth)?
                else {
                    return Ok(None);
                };

                let mut entities = Vec::with_capacity(entity_ids.len());
                for id in &entity_ids {
                    let entity = rows::get_entity(conn, id)?
                        .ok_or_else(|| KgError::EntityNotFound(id.clone()))?;
                    entities.push(entity);
                }

                Ok(Some(GraphPath {
                    entity_ids,
                    entities,
                    relations,
                }))
            })
            .await
    }

    pub async fn update_entity(&self, id: &str, update: EntityUpdate) -> Result<Entity> {
        if let Some(confidence) = update.confidence {
            validate_confidence(confidence)?;
        }
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(KgError::InvalidInput("entity name must not be empty".to_string()));
        }

        let id = id.to_string();
        self.db
            .with_connection(move |conn| {
                let mut entity =
                    rows::get_entity(conn, &id)?.ok_or_else(|| KgError::EntityNotFound(id.clone()))?;

                if let Some(name) = update.name {
                    entity.name = name;
                }
                if let Some(entity_type) = update.entity_type {
                    entity.entity_type = entity_type;
                }
                if let Some(description) = update.description {
                    entity.description = Some(description);
                }
                if let Some(properties) = update.properties {
                    entity.properties.extend(properties);
                }
                if let Some(confidence) = update.confidence {
                    entity.confidence = confidence;
                }

                rows::update_entity_row(conn, &entity)?;
                Ok(entity)
            })
            .await
    }

    /// Add a relation between two stored entities.
    ///
    /// The relation belongs to the endpoints' owning document when they share
    /// one, and carries their provenance when that matches too.
    pub async fn create_relation(&self, new: NewRelation) -> Result<Relation> {
        if new.source_entity_id == new.target_entity_id {
            return Err(KgError::InvalidInput(format!(
                "relation from {} to itself",
                new.source_entity_id
            )));
        }
        validate_confidence(new.confidence)?;

        let ids = Arc::clone(&self.ids);
        self.db
            .with_connection(move |conn| {
                let source = rows::get_entity(conn, &new.source_entity_id)?
                    .ok_or_else(|| KgError::EntityNotFound(new.source_entity_id.clone()))?;
                let target = rows::get_entity(conn, &new.target_entity_id)?
                    .ok_or_else(|| KgError::EntityNotFound(new.target_entity_id.clone()))?;

                let existing: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM relations \
                     WHERE source_entity_id = ?1 AND target_entity_id = ?2 AND relation_type = ?3",
                    rusqlite::params![source.id, target.id, new.relation_type.as_str()],
                    |row| row.get(0),
                )?;
                if existing > 0 {
                    return Err(KgError::InvalidInput(format!(
                        "relation {} {} {} already exists",
                        source.id, new.relation_type, target.id
                    )));
                }

                let owner = match (
                    rows::entity_owner(conn, &source.id)?,
                    rows::entity_owner(conn, &target.id)?,
                ) {
                    (Some(a), Some(b)) if a == b => Some(a),
                    _ => None,
                };
                let provenance = match (&source.source_document_id, &target.source_document_id) {
                    (Some(a), Some(b)) if a == b => Some(a.clone()),
                    _ => None,
                };
                let relation = Relation {
                    id: ids.next_id(IdKind::Relation),
                    source_entity_id: source.id,
                    target_entity_id: target.id,
                    relation_type: new.relation_type,
                    description: new.description,
                    source_text: new.source_text,
                    source_document_id: provenance,
                    confidence: new.confidence,
                };
                rows::insert_relation(conn, &relation, owner.as_deref())?;
                Ok(relation)
            })
            .await
    }

    /// Delete an entity and every relation touching it.
    pub async fn delete_entity(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.db
            .with_connection(move |conn| {
                let removed = conn.execute("DELETE FROM entities WHERE id = ?1", [&id])?;
                if removed == 0 {
                    return Err(KgError::EntityNotFound(id));
                }
                Ok(())
            })
            .await
    }

    /// Counts over the whole store, or over one document.
    pub async fn statistics(&self, document_id: Option<&str>) -> Result<StoreStatistics> {
        let document_id = document_id.map(str::to_string);
        self.db
            .with_connection(move |conn| {
                let documents_count = match &document_id {
                    Some(id) => {
                        if !document_exists(conn, id)? {
                            return Err(KgError::DocumentNotFound(id.clone()));
                        }
                        1
                    }
                    None => {
                        let count: i64 =
                            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
                        count as usize
                    }
                };

                let doc = document_id.as_deref();
                let entity_types = type_counts(conn, "entities", "entity_type", doc)?;
                let relation_types = type_counts(conn, "relations", "relation_type", doc)?;

                Ok(StoreStatistics {
                    documents_count,
                    total_entities: entity_types.values().sum(),
                    total_relations: relation_types.values().sum(),
                    entity_types,
                    relation_types,
                })
            })
            .await
    }
}
