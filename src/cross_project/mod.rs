//! CrossProject: lets an entity defined in one project participate in
//! another without duplication or loss of identity (spec.md §4.4).

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use rusqlite::Transaction;
use serde_json::{json, Value as Json};
use time::OffsetDateTime;

use crate::codec::rfc3339_now;
use crate::error::{Error, Result};
use crate::model::{Entity, IMPORTED_FROM_PROJECT_KEY, IMPORT_TIMESTAMP_KEY};
use crate::store;
use crate::store::Store;

/// One project's snapshot of a shared entity, as returned by
/// [`CrossProject::get_entity_history`].
#[derive(Debug, Clone)]
pub struct EntityVersion {
    pub project_id: i64,
    pub project_name: String,
    pub entity: Entity,
}

/// An entity that appears in the working sets of two or more projects, as
/// returned by [`CrossProject::list_shared_entities`].
#[derive(Debug, Clone)]
pub struct SharedEntity {
    pub logical_id: String,
    pub name: String,
    pub project_count: usize,
    pub project_names: Vec<String>,
    pub first_seen: OffsetDateTime,
    pub last_modified: OffsetDateTime,
}

struct SharedAcc {
    name: String,
    project_names: Vec<String>,
    first_seen: OffsetDateTime,
    last_modified: OffsetDateTime,
}

pub struct CrossProject<'s> {
    store: &'s Store,
}

impl<'s> CrossProject<'s> {
    pub fn new(store: &'s Store) -> Self {
        CrossProject { store }
    }

    /// Imports the entity with `logical_id` from `source_project`'s working
    /// set into `target_version`, annotating its data with provenance. A
    /// repeat call with the same arguments is a no-op that returns the
    /// existing entity (spec.md §4.4, invariant 6).
    pub fn import_entity(
        &self,
        target_version_id: i64,
        source_project_id: i64,
        logical_id: &str,
    ) -> Result<Entity> {
        self.store.transaction(|tx| {
            if let Some(existing) = store::find_entity_by_logical_id(tx, target_version_id, logical_id)? {
                return Ok(existing);
            }

            let source_working_set = store::get_working_set(tx, source_project_id)?;
            let source_entity = store::find_entity_by_logical_id(tx, source_working_set.id, logical_id)?
                .ok_or_else(|| {
                    Error::NotFound(format!(
                        "entity {logical_id:?} in working set of project {source_project_id}"
                    ))
                })?;

            let mut fields = source_entity
                .data
                .as_object()
                .cloned()
                .expect("entity data is always a JSON object");
            fields.insert(IMPORTED_FROM_PROJECT_KEY.to_string(), json!(source_project_id));
            fields.insert(IMPORT_TIMESTAMP_KEY.to_string(), Json::String(rfc3339_now()));

            store::insert_entity(
                tx,
                target_version_id,
                &source_entity.entity_type,
                &source_entity.name,
                &Json::Object(fields),
            )
        })
    }

    /// Returns one snapshot per project that currently contains the entity
    /// in its working set (spec.md §4.4). Order is implementation-defined.
    pub fn get_entity_history(&self, logical_id: &str) -> Result<Vec<EntityVersion>> {
        self.store.transaction(|tx| {
            let mut history = Vec::new();
            for project in store::list_projects(tx)? {
                let Ok(working_set) = store::get_working_set(tx, project.id) else {
                    continue;
                };
                if let Some(entity) = store::find_entity_by_logical_id(tx, working_set.id, logical_id)? {
                    history.push(EntityVersion {
                        project_id: project.id,
                        project_name: project.name.clone(),
                        entity,
                    });
                }
            }
            Ok(history)
        })
    }

    /// Across working-set versions of every project, returns entities whose
    /// logical ID appears in two or more projects (spec.md §4.4).
    pub fn list_shared_entities(&self) -> Result<Vec<SharedEntity>> {
        self.store
            .transaction(|tx| accumulate_shared(tx).map(|acc| finalize_shared(acc, 2)))
    }

    /// Deletes a project. Refuses with [`Error::SharedEntityConflict`] when
    /// the project's working set hosts entities whose logical IDs also
    /// appear in another project's working set, unless `force` is set
    /// (spec.md §4.4's deletion safety, §8 scenario E).
    pub fn delete_project(&self, project_id: i64, force: bool) -> Result<()> {
        self.store.transaction(|tx| {
            if !force {
                let shared = shared_entity_names_for(tx, project_id)?;
                if !shared.is_empty() {
                    return Err(Error::SharedEntityConflict { project_id, shared });
                }
            }
            store::delete_project(tx, project_id)
        })
    }
}

/// Builds a logical-ID -> accumulator map by iterating every project's
/// working set exactly once (spec.md §9: "avoid recursion; iterate
/// projects once... accumulate into maps keyed by logical ID").
fn accumulate_shared(tx: &Transaction) -> Result<HashMap<String, SharedAcc>> {
    let mut by_logical: HashMap<String, SharedAcc> = HashMap::new();

    for project in store::list_projects(tx)? {
        let Ok(working_set) = store::get_working_set(tx, project.id) else {
            continue;
        };
        for entity in store::list_entities_in_version(tx, working_set.id)? {
            let logical_id = entity.logical_id().to_string();
            let acc = by_logical.entry(logical_id).or_insert_with(|| SharedAcc {
                name: entity.name.clone(),
                project_names: Vec::new(),
                first_seen: entity.created_at,
                last_modified: entity.updated_at,
            });
            acc.project_names.push(project.name.clone());
            acc.first_seen = acc.first_seen.min(entity.created_at);
            acc.last_modified = acc.last_modified.max(entity.updated_at);
        }
    }

    Ok(by_logical)
}

fn finalize_shared(acc: HashMap<String, SharedAcc>, min_projects: usize) -> Vec<SharedEntity> {
    acc.into_iter()
        .filter(|(_, a)| a.project_names.len() >= min_projects)
        .map(|(logical_id, a)| SharedEntity {
            logical_id,
            name: a.name,
            project_count: a.project_names.len(),
            project_names: a.project_names,
            first_seen: a.first_seen,
            last_modified: a.last_modified,
        })
        .collect()
}

fn shared_entity_names_for(tx: &Transaction, project_id: i64) -> Result<Vec<String>> {
    let by_logical = accumulate_shared(tx)?;
    let own_working_set = match store::get_working_set(tx, project_id) {
        Ok(v) => v,
        Err(_) => return Ok(Vec::new()),
    };
    let own_entities = store::list_entities_in_version(tx, own_working_set.id)?;

    let mut names = Vec::new();
    for entity in own_entities {
        if let Some(acc) = by_logical.get(entity.logical_id()) {
            if acc.project_names.len() >= 2 {
                names.push(entity.name.clone());
            }
        }
    }
    Ok(names)
}
