//! Transactional key-row store with migrations, foreign keys, and indexes
//! over the five tables of the data model (spec.md §4.1).

pub mod migrations;

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde_json::Value as Json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{Annotation, Entity, EntityType, GraphVersion, Project, Relationship};

/// Durable, transactional persistence for the five entity kinds. Holds a
/// single `rusqlite::Connection` behind a mutex: `Connection` is `!Sync`,
/// and the concurrency model (spec.md §5) only requires one writer
/// transaction in flight at a time per store.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens the store, enabling foreign keys and WAL mode, then applies any
    /// migrations from [`migrations::MIGRATIONS`] not yet recorded in
    /// `schema_migrations`.
    pub fn open(config: &Config) -> Result<Self> {
        let conn = Connection::open(&config.store_path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms as u64))?;
        if config.store_path != Path::new(":memory:") {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }

        let store = Store {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL
            );",
        )?;

        for (name, sql) in migrations::MIGRATIONS {
            let already_applied: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM schema_migrations WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;
            if already_applied.is_some() {
                continue;
            }

            tracing::info!(migration = name, "applying migration");
            let tx = conn.transaction()?;
            tx.execute_batch(sql)?;
            tx.execute(
                "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, ?2)",
                params![name, now_rfc3339()],
            )?;
            tx.commit()?;
        }
        Ok(())
    }

    /// Runs `f` inside a single SQLite transaction. On `Err`, the
    /// transaction is rolled back and never committed (spec.md §4.3.1's
    /// atomicity guarantee and §5's atomicity unit).
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}

pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .expect("OffsetDateTime::now_utc always formats")
}

fn parse_rfc3339(s: &str) -> OffsetDateTime {
    OffsetDateTime::parse(s, &Rfc3339).expect("stored timestamps are always RFC 3339")
}

// --- Projects ---------------------------------------------------------

fn project_from_row(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        theme: row.get("theme")?,
        genre: row.get("genre")?,
        description: row.get("description")?,
        created_at: parse_rfc3339(&row.get::<_, String>("created_at")?),
        updated_at: parse_rfc3339(&row.get::<_, String>("updated_at")?),
    })
}

pub fn insert_project(
    conn: &Connection,
    name: &str,
    theme: Option<&str>,
    genre: Option<&str>,
    description: Option<&str>,
) -> Result<Project> {
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO projects (name, theme, genre, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![name, theme, genre, description, now],
    )?;
    get_project(conn, conn.last_insert_rowid())
}

pub fn get_project(conn: &Connection, id: i64) -> Result<Project> {
    conn.query_row("SELECT * FROM projects WHERE id = ?1", params![id], project_from_row)
        .map_err(|_| Error::NotFound(format!("project {id}")))
}

pub fn list_projects(conn: &Connection) -> Result<Vec<Project>> {
    let mut stmt = conn.prepare("SELECT * FROM projects ORDER BY id")?;
    let rows = stmt.query_map([], project_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
}

pub fn delete_project(conn: &Connection, id: i64) -> Result<()> {
    let affected = conn.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
    if affected == 0 {
        return Err(Error::NotFound(format!("project {id}")));
    }
    Ok(())
}

// --- Graph versions -----------------------------------------------------

fn version_from_row(row: &Row) -> rusqlite::Result<GraphVersion> {
    Ok(GraphVersion {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        parent_version_id: row.get("parent_version_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        is_working_set: row.get("is_working_set")?,
        created_at: parse_rfc3339(&row.get::<_, String>("created_at")?),
    })
}

pub fn insert_version(
    conn: &Connection,
    project_id: i64,
    parent_version_id: Option<i64>,
    name: Option<&str>,
    description: Option<&str>,
) -> Result<GraphVersion> {
    conn.execute(
        "INSERT INTO graph_versions (project_id, parent_version_id, name, description, is_working_set, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![project_id, parent_version_id, name, description, now_rfc3339()],
    )?;
    get_version(conn, conn.last_insert_rowid())
}

pub fn get_version(conn: &Connection, id: i64) -> Result<GraphVersion> {
    conn.query_row("SELECT * FROM graph_versions WHERE id = ?1", params![id], version_from_row)
        .map_err(|_| Error::NotFound(format!("version {id}")))
}

pub fn get_working_set(conn: &Connection, project_id: i64) -> Result<GraphVersion> {
    conn.query_row(
        "SELECT * FROM graph_versions WHERE project_id = ?1 AND is_working_set = 1",
        params![project_id],
        version_from_row,
    )
    .map_err(|_| Error::NotFound(format!("working set for project {project_id}")))
}

/// Atomically clears the working-set flag for the project, then sets it on
/// `version_id` (spec.md §4.1, §4.3.4).
pub fn set_working_set(conn: &Connection, project_id: i64, version_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE graph_versions SET is_working_set = 0 WHERE project_id = ?1",
        params![project_id],
    )?;
    let affected = conn.execute(
        "UPDATE graph_versions SET is_working_set = 1 WHERE id = ?1 AND project_id = ?2",
        params![version_id, project_id],
    )?;
    if affected == 0 {
        return Err(Error::NotFound(format!(
            "version {version_id} in project {project_id}"
        )));
    }
    Ok(())
}

pub fn count_versions_for_project(conn: &Connection, project_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM graph_versions WHERE project_id = ?1",
        params![project_id],
        |row| row.get(0),
    )
    .map_err(Error::from)
}

pub fn list_all_working_sets(conn: &Connection) -> Result<Vec<GraphVersion>> {
    let mut stmt = conn.prepare("SELECT * FROM graph_versions WHERE is_working_set = 1")?;
    let rows = stmt.query_map([], version_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
}

// --- Entities ------------------------------------------------------------

fn entity_from_row(row: &Row) -> rusqlite::Result<Entity> {
    let entity_type_str: String = row.get("entity_type")?;
    let data_str: String = row.get("data")?;
    Ok(Entity {
        row_id: row.get("row_id")?,
        version_id: row.get("version_id")?,
        entity_type: EntityType::parse(&entity_type_str).unwrap_or(EntityType::Scene),
        name: row.get("name")?,
        data: serde_json::from_str(&data_str).expect("stored entity data is always valid JSON"),
        created_at: parse_rfc3339(&row.get::<_, String>("created_at")?),
        updated_at: parse_rfc3339(&row.get::<_, String>("updated_at")?),
    })
}

pub fn insert_entity(
    conn: &Connection,
    version_id: i64,
    entity_type: &EntityType,
    name: &str,
    data: &Json,
) -> Result<Entity> {
    let now = now_rfc3339();
    let data_str = serde_json::to_string(data).expect("entity data always serializes");
    conn.execute(
        "INSERT INTO entities (version_id, entity_type, name, data, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![version_id, entity_type.as_str(), name, data_str, now],
    )?;
    get_entity(conn, conn.last_insert_rowid())
}

pub fn get_entity(conn: &Connection, row_id: i64) -> Result<Entity> {
    conn.query_row("SELECT * FROM entities WHERE row_id = ?1", params![row_id], entity_from_row)
        .map_err(|_| Error::NotFound(format!("entity {row_id}")))
}

pub fn update_entity(conn: &Connection, row_id: i64, name: &str, data: &Json) -> Result<Entity> {
    let data_str = serde_json::to_string(data).expect("entity data always serializes");
    let affected = conn.execute(
        "UPDATE entities SET name = ?1, data = ?2 WHERE row_id = ?3",
        params![name, data_str, row_id],
    )?;
    if affected == 0 {
        return Err(Error::NotFound(format!("entity {row_id}")));
    }
    get_entity(conn, row_id)
}

pub fn delete_entity(conn: &Connection, row_id: i64) -> Result<()> {
    let affected = conn.execute("DELETE FROM entities WHERE row_id = ?1", params![row_id])?;
    if affected == 0 {
        return Err(Error::NotFound(format!("entity {row_id}")));
    }
    Ok(())
}

pub fn list_entities_in_version(conn: &Connection, version_id: i64) -> Result<Vec<Entity>> {
    let mut stmt = conn.prepare("SELECT * FROM entities WHERE version_id = ?1 ORDER BY row_id")?;
    let rows = stmt.query_map(params![version_id], entity_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
}

pub fn find_entity_by_logical_id(
    conn: &Connection,
    version_id: i64,
    logical_id: &str,
) -> Result<Option<Entity>> {
    conn.query_row(
        "SELECT * FROM entities WHERE version_id = ?1 AND json_extract(data, '$.logical_id') = ?2",
        params![version_id, logical_id],
        entity_from_row,
    )
    .optional()
    .map_err(Error::from)
}

// --- Relationships --------------------------------------------------------

fn relationship_from_row(row: &Row) -> rusqlite::Result<Relationship> {
    let properties_str: String = row.get("properties")?;
    Ok(Relationship {
        row_id: row.get("row_id")?,
        version_id: row.get("version_id")?,
        from_entity_row_id: row.get("from_entity_row_id")?,
        to_entity_row_id: row.get("to_entity_row_id")?,
        relationship_type: row.get("relationship_type")?,
        properties: serde_json::from_str(&properties_str)
            .expect("stored relationship properties are always valid JSON"),
        created_at: parse_rfc3339(&row.get::<_, String>("created_at")?),
    })
}

pub fn insert_relationship(
    conn: &Connection,
    version_id: i64,
    from_entity_row_id: i64,
    to_entity_row_id: i64,
    relationship_type: &str,
    properties: &Json,
) -> Result<Relationship> {
    let properties_str = serde_json::to_string(properties).expect("properties always serialize");
    conn.execute(
        "INSERT INTO relationships
            (version_id, from_entity_row_id, to_entity_row_id, relationship_type, properties, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            version_id,
            from_entity_row_id,
            to_entity_row_id,
            relationship_type,
            properties_str,
            now_rfc3339(),
        ],
    )?;
    get_relationship(conn, conn.last_insert_rowid())
}

pub fn get_relationship(conn: &Connection, row_id: i64) -> Result<Relationship> {
    conn.query_row(
        "SELECT * FROM relationships WHERE row_id = ?1",
        params![row_id],
        relationship_from_row,
    )
    .map_err(|_| Error::NotFound(format!("relationship {row_id}")))
}

pub fn update_relationship_properties(
    conn: &Connection,
    row_id: i64,
    properties: &Json,
) -> Result<Relationship> {
    let properties_str = serde_json::to_string(properties).expect("properties always serialize");
    let affected = conn.execute(
        "UPDATE relationships SET properties = ?1 WHERE row_id = ?2",
        params![properties_str, row_id],
    )?;
    if affected == 0 {
        return Err(Error::NotFound(format!("relationship {row_id}")));
    }
    get_relationship(conn, row_id)
}

pub fn delete_relationship(conn: &Connection, row_id: i64) -> Result<()> {
    let affected = conn.execute("DELETE FROM relationships WHERE row_id = ?1", params![row_id])?;
    if affected == 0 {
        return Err(Error::NotFound(format!("relationship {row_id}")));
    }
    Ok(())
}

pub fn delete_relationships_touching(conn: &Connection, entity_row_id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM relationships WHERE from_entity_row_id = ?1 OR to_entity_row_id = ?1",
        params![entity_row_id],
    )?;
    Ok(())
}

pub fn list_relationships_in_version(conn: &Connection, version_id: i64) -> Result<Vec<Relationship>> {
    let mut stmt = conn.prepare("SELECT * FROM relationships WHERE version_id = ?1 ORDER BY row_id")?;
    let rows = stmt.query_map(params![version_id], relationship_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
}

pub fn relationship_exists(
    conn: &Connection,
    version_id: i64,
    from_entity_row_id: i64,
    to_entity_row_id: i64,
    relationship_type: &str,
) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM relationships
         WHERE version_id = ?1 AND from_entity_row_id = ?2 AND to_entity_row_id = ?3 AND relationship_type = ?4",
        params![version_id, from_entity_row_id, to_entity_row_id, relationship_type],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

// --- Annotations -----------------------------------------------------------

fn annotation_from_row(row: &Row) -> rusqlite::Result<Annotation> {
    let metadata_str: String = row.get("metadata")?;
    Ok(Annotation {
        id: row.get("id")?,
        entity_row_id: row.get("entity_row_id")?,
        annotation_type: row.get("annotation_type")?,
        content: row.get("content")?,
        metadata: serde_json::from_str(&metadata_str).expect("stored metadata is always valid JSON"),
        agent_name: row.get("agent_name")?,
        created_at: parse_rfc3339(&row.get::<_, String>("created_at")?),
    })
}

pub fn insert_annotation(
    conn: &Connection,
    entity_row_id: i64,
    annotation_type: &str,
    content: &str,
    metadata: &Json,
    agent_name: Option<&str>,
) -> Result<Annotation> {
    let metadata_str = serde_json::to_string(metadata).expect("metadata always serializes");
    conn.execute(
        "INSERT INTO annotations (entity_row_id, annotation_type, content, metadata, agent_name, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![entity_row_id, annotation_type, content, metadata_str, agent_name, now_rfc3339()],
    )?;
    get_annotation(conn, conn.last_insert_rowid())
}

pub fn get_annotation(conn: &Connection, id: i64) -> Result<Annotation> {
    conn.query_row("SELECT * FROM annotations WHERE id = ?1", params![id], annotation_from_row)
        .map_err(|_| Error::NotFound(format!("annotation {id}")))
}

pub fn list_annotations_for_entity(conn: &Connection, entity_row_id: i64) -> Result<Vec<Annotation>> {
    let mut stmt = conn.prepare("SELECT * FROM annotations WHERE entity_row_id = ?1 ORDER BY id")?;
    let rows = stmt.query_map(params![entity_row_id], annotation_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
}
