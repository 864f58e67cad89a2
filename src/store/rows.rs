//! Row mapping and the synchronous queries shared by store operations.

use rusqlite::{params, Connection, Params, Row};

use crate::error::Result;
use crate::graph::{Entity, Properties, Relation, RelationType};

pub(crate) const ENTITY_COLUMNS: &str = "id, name, entity_type, description, properties_json, \
     source_chapter, source_section, source_document_id, confidence";

pub(crate) const RELATION_COLUMNS: &str = "id, source_entity_id, target_entity_id, relation_type, \
     description, source_text, source_document_id, confidence";

/// Entity columns as stored; type and properties are parsed afterwards so
/// their errors surface as [`crate::KgError`] rather than SQLite errors.
struct EntityRow {
    id: String,
    name: String,
    entity_type: String,
    description: Option<String>,
    properties_json: Option<String>,
    source_chapter: Option<String>,
    source_section: Option<String>,
    source_document_id: Option<String>,
    confidence: f64,
}

impl EntityRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            entity_type: row.get(2)?,
            description: row.get(3)?,
            properties_json: row.get(4)?,
            source_chapter: row.get(5)?,
            source_section: row.get(6)?,
            source_document_id: row.get(7)?,
            confidence: row.get(8)?,
        })
    }

    fn into_entity(self) -> Result<Entity> {
        let properties = match self.properties_json {
            Some(json) => serde_json::from_str(&json)?,
            None => Properties::new(),
        };
        Ok(Entity {
            id: self.id,
            name: self.name,
            entity_type: self.entity_type.parse()?,
            description: self.description,
            properties,
            source_chapter: self.source_chapter,
            source_section: self.source_section,
            source_document_id: self.source_document_id,
            confidence: self.confidence,
        })
    }
}

struct RelationRow {
    id: String,
    source_entity_id: String,
    target_entity_id: String,
    relation_type: String,
    description: Option<String>,
    source_text: Option<String>,
    source_document_id: Option<String>,
    confidence: f64,
}

impl RelationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source_entity_id: row.get(1)?,
            target_entity_id: row.get(2)?,
            relation_type: row.get(3)?,
            description: row.get(4)?,
            source_text: row.get(5)?,
            source_document_id: row.get(6)?,
            confidence: row.get(7)?,
        })
    }

    fn into_relation(self) -> Result<Relation> {
        Ok(Relation {
            id: self.id,
            source_entity_id: self.source_entity_id,
            target_entity_id: self.target_entity_id,
            relation_type: self.relation_type.parse()?,
            description: self.description,
            source_text: self.source_text,
            source_document_id: self.source_document_id,
            confidence: self.confidence,
        })
    }
}

pub(crate) fn query_entities<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Entity>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, EntityRow::from_row)?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    rows.into_iter().map(EntityRow::into_entity).collect()
}

pub(crate) fn query_relations<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Relation>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, RelationRow::from_row)?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    rows.into_iter().map(RelationRow::into_relation).collect()
}

pub(crate) fn get_entity(conn: &Connection, id: &str) -> Result<Option<Entity>> {
    let sql = format!("SELECT {} FROM entities WHERE id = ?1", ENTITY_COLUMNS);
    Ok(query_entities(conn, &sql, [id])?.into_iter().next())
}

/// Document that owns a stored entity; `None` for an unknown entity.
pub(crate) fn entity_owner(conn: &Connection, id: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT document_id FROM entities WHERE id = ?1")?;
    let owner = stmt
        .query_map([id], |row| row.get::<_, Option<String>>(0))?
        .next()
        .transpose()?
        .flatten();
    Ok(owner)
}

pub(crate) fn entity_exists(conn: &Connection, id: &str) -> Result<bool> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM entities WHERE id = ?1", [id], |row| {
        row.get(0)
    })?;
    Ok(count > 0)
}

/// Relations with `id` at either end, optionally restricted to `types`.
pub(crate) fn relations_touching(
    conn: &Connection,
    id: &str,
    types: &[RelationType],
) -> Result<Vec<Relation>> {
    let mut sql = format!(
        "SELECT {} FROM relations WHERE (source_entity_id = ?1 OR target_entity_id = ?1)",
        RELATION_COLUMNS
    );
    let mut values: Vec<String> = vec![id.to_string()];
    if !types.is_empty() {
        let placeholders = (0..types.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(",");
        sql.push_str(&format!(" AND relation_type IN ({})", placeholders));
        values.extend(types.iter().map(|t| t.as_str().to_string()));
    }
    sql.push_str(" ORDER BY rowid");
    query_relations(conn, &sql, rusqlite::params_from_iter(values))
}

fn properties_json(entity: &Entity) -> Result<Option<String>> {
    if entity.properties.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(&entity.properties)?))
}

/// Insert an entity owned by `document_id`; its own provenance is stored as is.
pub(crate) fn insert_entity(conn: &Connection, entity: &Entity, document_id: Option<&str>) -> Result<()> {
    conn.execute(
        "INSERT INTO entities (id, name, entity_type, description, properties_json, \
         source_chapter, source_section, source_document_id, document_id, confidence) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            entity.id,
            entity.name,
            entity.entity_type.as_str(),
            entity.description,
            properties_json(entity)?,
            entity.source_chapter,
            entity.source_section,
            entity.source_document_id,
            document_id,
            entity.confidence,
        ],
    )?;
    Ok(())
}

/// Rewrite every mutable column of an existing entity.
pub(crate) fn update_entity_row(conn: &Connection, entity: &Entity) -> Result<()> {
    conn.execute(
        "UPDATE entities SET name = ?2, entity_type = ?3, description = ?4, \
         properties_json = ?5, confidence = ?6 WHERE id = ?1",
        params![
            entity.id,
            entity.name,
            entity.entity_type.as_str(),
            entity.description,
            properties_json(entity)?,
            entity.confidence,
        ],
    )?;
    Ok(())
}

pub(crate) fn insert_relation(conn: &Connection, relation: &Relation, document_id: Option<&str>) -> Result<()> {
    conn.execute(
        "INSERT INTO relations (id, source_entity_id, target_entity_id, relation_type, \
         description, source_text, source_document_id, document_id, confidence) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            relation.id,
            relation.source_entity_id,
            relation.target_entity_id,
            relation.relation_type.as_str(),
            relation.description,
            relation.source_text,
            relation.source_document_id,
            document_id,
            relation.confidence,
        ],
    )?;
    Ok(())
}
