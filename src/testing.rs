//! Fixture builders shared across the test suites of `store`, `graphwrite`,
//! `cross_project`, and `query` — mirrors the teacher's
//! `datatype::artifact_graph::testing` fixture module.
#![cfg(test)]

use serde_json::json;

use crate::config::Config;
use crate::graphwrite::{Delta, GraphWrite};
use crate::model::EntityType;
use crate::store::Store;

/// An in-memory SQLite store, fully migrated, for tests that don't need to
/// inspect the file on disk.
pub fn temp_store() -> Store {
    Store::open(&Config::new(":memory:")).expect("fixture store always opens")
}

/// Creates a project and an empty root version, returning `(project_id,
/// root_version_id)`. Most scenario tests start from this.
pub fn project_with_root_version(store: &Store) -> (i64, i64) {
    store
        .transaction(|tx| {
            let project = crate::store::insert_project(tx, "Test Saga", None, None, None)?;
            let root = crate::store::insert_version(tx, project.id, None, Some("root"), None)?;
            Ok((project.id, root.id))
        })
        .expect("fixture project/version always create")
}

/// A `create` delta for a `Character` with the given logical ID, name, and
/// level — the recurring "Elena" fixture from spec.md's scenarios.
pub fn create_character(logical_id: &str, name: &str, level: i64) -> Delta {
    Delta::Create {
        entity_id: Some(logical_id.to_string()),
        entity_type: EntityType::Character,
        fields: json!({ "name": name, "level": level }),
        relationships: vec![],
    }
}

pub fn apply_single(write: &GraphWrite, parent_version_id: i64, deltas: Vec<Delta>) -> i64 {
    write
        .apply(parent_version_id, deltas)
        .expect("fixture apply always succeeds")
        .new_version_id
}
