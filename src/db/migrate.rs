//! Numbered SQL migrations from a directory.
//!
//! Files are named `<version>_<name>.sql`. Each applied file is recorded
//! with the SHA-256 of its text, so an edited migration is reported rather
//! than silently re-run.

use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{KgError, Result};

struct Migration {
    version: u32,
    name: String,
    checksum: String,
    sql: String,
}

impl Migration {
    fn from_file(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .and_then(|n| n.to_str())
            .ok_or_else(|| KgError::Config(format!("Invalid migration file name: {}", path.display())))?
            .to_string();
        let version = name
            .split_once('_')
            .and_then(|(prefix, _)| prefix.parse::<u32>().ok())
            .ok_or_else(|| {
                KgError::Config(format!("Migration {} must start with <version>_", name))
            })?;

        let sql = fs::read_to_string(path)?;
        let checksum = format!("{:x}", Sha256::digest(sql.as_bytes()));
        Ok(Self {
            version,
            name,
            checksum,
            sql,
        })
    }
}

fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            checksum TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );",
    )?;
    Ok(())
}

/// Applied migrations by version, with the checksum recorded when applied.
pub fn applied_migrations(conn: &Connection) -> Result<BTreeMap<u32, String>> {
    let mut stmt = conn.prepare("SELECT version, checksum FROM schema_migrations")?;
    let applied = stmt
        .query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<BTreeMap<_, _>, rusqlite::Error>>()?;
    Ok(applied)
}

/// `.sql` files of `migrations_dir` in version order. Two files may not share a version.
fn load_migrations(migrations_dir: &Path) -> Result<Vec<Migration>> {
    let mut by_version: BTreeMap<u32, Migration> = BTreeMap::new();

    for entry in fs::read_dir(migrations_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }
        let migration = Migration::from_file(&path)?;
        if let Some(other) = by_version.get(&migration.version) {
            return Err(KgError::Config(format!(
                "Migrations {} and {} share version {}",
                other.name, migration.name, migration.version
            )));
        }
        by_version.insert(migration.version, migration);
    }

    Ok(by_version.into_values().collect())
}

/// Apply every migration in `migrations_dir` not yet recorded, each in its own transaction.
pub fn run_migrations(conn: &mut Connection, migrations_dir: &Path) -> Result<()> {
    ensure_migrations_table(conn)?;
    let applied = applied_migrations(conn)?;

    for migration in load_migrations(migrations_dir)? {
        if let Some(checksum) = applied.get(&migration.version) {
            if checksum != &migration.checksum {
                log::warn!(
                    "Migration {} changed after it was applied; the stored schema keeps the old version",
                    migration.name
                );
            }
            continue;
        }

        log::info!("Applying migration {}", migration.name);
        let tx = conn.transaction()?;
        if let Err(e) = tx.execute_batch(&migration.sql) {
            log::error!("Migration {} failed: {}", migration.name, e);
            return Err(e.into());
        }
        tx.execute(
            "INSERT INTO schema_migrations (version, name, checksum) VALUES (?1, ?2, ?3)",
            params![migration.version, migration.name, migration.checksum],
        )?;
        tx.commit()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(conn: &Connection, kind: &str) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")
            .unwrap()
            .query_map([kind], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .unwrap()
    }

    fn open(temp_dir: &TempDir) -> Connection {
        Connection::open(temp_dir.path().join("test.db")).unwrap()
    }

    #[test]
    fn test_load_migrations_in_version_order() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("010_later.sql"), "CREATE TABLE later (id INTEGER);").unwrap();
        fs::write(dir.join("002_first.sql"), "CREATE TABLE first (id INTEGER);").unwrap();
        fs::write(dir.join("README.md"), "not a migration").unwrap();

        let migrations = load_migrations(dir).unwrap();
        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0].version, 2);
        assert_eq!(migrations[1].name, "010_later");
        assert_eq!(migrations[0].checksum.len(), 64);
    }

    #[test]
    fn test_bad_migration_names() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("init.sql"), "SELECT 1;").unwrap();
        assert!(matches!(load_migrations(temp_dir.path()), Err(KgError::Config(_))));

        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("001_a.sql"), "SELECT 1;").unwrap();
        fs::write(temp_dir.path().join("1_b.sql"), "SELECT 2;").unwrap();
        let err = load_migrations(temp_dir.path()).err().unwrap();
        assert!(err.to_string().contains("share version 1"));
    }

    #[test]
    fn test_failed_migration_rolls_back() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("migrations");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("001_ok.sql"), "CREATE TABLE ok (id INTEGER);").unwrap();
        fs::write(dir.join("002_broken.sql"), "CREATE TABLE half (id INTEGER); NOT SQL;").unwrap();

        let mut conn = open(&temp_dir);
        assert!(matches!(run_migrations(&mut conn, &dir), Err(KgError::Database(_))));

        let tables = names(&conn, "table");
        assert!(tables.contains(&"ok".to_string()));
        assert!(!tables.contains(&"half".to_string()));
        assert_eq!(applied_migrations(&conn).unwrap().keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_edited_migration_not_reapplied() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("migrations");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("001_items.sql"), "CREATE TABLE items (id INTEGER);").unwrap();

        let mut conn = open(&temp_dir);
        run_migrations(&mut conn, &dir).unwrap();
        let before = applied_migrations(&conn).unwrap();

        fs::write(dir.join("001_items.sql"), "CREATE TABLE items (id INTEGER, name TEXT);").unwrap();
        run_migrations(&mut conn, &dir).unwrap();
        assert_eq!(applied_migrations(&conn).unwrap(), before);
    }

    #[test]
    fn test_knowledge_graph_schema() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = open(&temp_dir);
        let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");

        run_migrations(&mut conn, &migrations_dir).unwrap();
        // second run is a no-op
        run_migrations(&mut conn, &migrations_dir).unwrap();

        let tables = names(&conn, "table");
        for table in ["documents", "entities", "relations", "schema_migrations"] {
            assert!(tables.contains(&table.to_string()), "missing table {}", table);
        }

        let indexes = names(&conn, "index");
        assert!(indexes.contains(&"idx_entities_name".to_string()));
        assert!(indexes.contains(&"idx_relations_triple".to_string()));

        assert_eq!(applied_migrations(&conn).unwrap().len(), 1);
    }
}
