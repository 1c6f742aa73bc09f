//! GraphWrite: the single transactional mutation point that produces a new
//! immutable version from a parent by copying its state with preserved
//! logical identity, then applying a batch of deltas (spec.md §4.3).

mod delta;

pub use delta::{ApplyResult, Delta, RelationshipDelta};

use std::collections::HashMap;

use rusqlite::Transaction;
use serde_json::Value as Json;

use crate::codec::{derive_display_name, ensure_logical_id, read_logical_id};
use crate::error::{Error, Result};
use crate::model::LOGICAL_ID_KEY;
use crate::store;
use crate::store::Store;

/// Logical ID -> row ID in the version currently under construction.
type LogicalToRow = HashMap<String, i64>;
/// Parent row ID -> logical ID, used once while copying relationships.
type RowToLogical = HashMap<i64, String>;

pub struct GraphWrite<'s> {
    store: &'s Store,
}

impl<'s> GraphWrite<'s> {
    pub fn new(store: &'s Store) -> Self {
        GraphWrite { store }
    }

    /// Creates a new version as a child of `parent_version_id`, copying the
    /// parent's entities and relationships with preserved logical identity,
    /// then applying `deltas` in submission order. The whole operation is
    /// one transaction: on any failure, no new version becomes visible
    /// (spec.md §4.3.1, §4.3.5).
    pub fn apply(&self, parent_version_id: i64, deltas: Vec<Delta>) -> Result<ApplyResult> {
        if deltas.is_empty() {
            return Err(Error::InvalidInput("delta batch must not be empty".into()));
        }

        self.store.transaction(|tx| {
            let parent = store::get_version(tx, parent_version_id)?;
            let new_version = store::insert_version(tx, parent.project_id, Some(parent.id), None, None)?;

            let (mut logical_to_row, row_to_logical) = copy_parent_entities(tx, parent.id, new_version.id)?;
            copy_parent_relationships(tx, parent.id, new_version.id, &row_to_logical, &logical_to_row)?;

            let mut applied_count = 0;
            for delta in deltas {
                apply_entity_delta(tx, new_version.id, &mut logical_to_row, delta)?;
                applied_count += 1;
            }

            tracing::info!(
                parent_version_id = parent.id,
                new_version_id = new_version.id,
                applied_count,
                "applied delta batch"
            );

            Ok(ApplyResult {
                new_version_id: new_version.id,
                applied_count,
            })
        })
    }
}

/// Copies every entity in the parent version into the new version under a
/// fresh row ID, preserving `logical_id`. Pre-logical-ID rows (spec.md
/// §4.3.2 step 2) are backfilled with their old row ID as the logical ID.
fn copy_parent_entities(
    tx: &Transaction,
    parent_version_id: i64,
    new_version_id: i64,
) -> Result<(LogicalToRow, RowToLogical)> {
    let mut logical_to_row = LogicalToRow::new();
    let mut row_to_logical = RowToLogical::new();

    for entity in store::list_entities_in_version(tx, parent_version_id)? {
        let mut data = entity.data.clone();
        let logical_id = match read_logical_id(&data) {
            Some(id) => id.to_string(),
            None => {
                let id = entity.row_id.to_string();
                data.as_object_mut()
                    .expect("entity data is always a JSON object")
                    .insert(LOGICAL_ID_KEY.to_string(), Json::String(id.clone()));
                id
            }
        };

        let copied = store::insert_entity(tx, new_version_id, &entity.entity_type, &entity.name, &data)?;
        logical_to_row.insert(logical_id.clone(), copied.row_id);
        row_to_logical.insert(entity.row_id, logical_id);
    }

    Ok((logical_to_row, row_to_logical))
}

/// Copies every relationship whose endpoints both survived the entity copy,
/// rewriting endpoints to their new row IDs. Orphaned edges (an endpoint not
/// present in the parent's own current map, or not carried into the new
/// version) are silently dropped (spec.md §4.3.2 step 4).
fn copy_parent_relationships(
    tx: &Transaction,
    parent_version_id: i64,
    new_version_id: i64,
    row_to_logical: &RowToLogical,
    logical_to_row: &LogicalToRow,
) -> Result<()> {
    for relationship in store::list_relationships_in_version(tx, parent_version_id)? {
        let Some(from_logical) = row_to_logical.get(&relationship.from_entity_row_id) else {
            continue;
        };
        let Some(to_logical) = row_to_logical.get(&relationship.to_entity_row_id) else {
            continue;
        };
        let (Some(&from_row), Some(&to_row)) = (
            logical_to_row.get(from_logical),
            logical_to_row.get(to_logical),
        ) else {
            continue;
        };

        store::insert_relationship(
            tx,
            new_version_id,
            from_row,
            to_row,
            &relationship.relationship_type,
            &relationship.properties,
        )?;
    }
    Ok(())
}

fn apply_entity_delta(
    tx: &Transaction,
    version_id: i64,
    logical_to_row: &mut LogicalToRow,
    delta: Delta,
) -> Result<()> {
    match delta {
        Delta::Create {
            entity_id,
            entity_type,
            fields,
            relationships,
        } => {
            let mut fields = fields
                .as_object()
                .cloned()
                .ok_or_else(|| Error::InvalidInput("create delta fields must be an object".into()))?;
            let logical_id = ensure_logical_id(&mut fields, entity_id);
            if logical_to_row.contains_key(&logical_id) {
                return Err(Error::LogicalIdExists {
                    version_id,
                    logical_id,
                });
            }

            let data = Json::Object(fields);
            let name = derive_display_name(None, &data);
            let created = store::insert_entity(tx, version_id, &entity_type, &name, &data)?;
            logical_to_row.insert(logical_id, created.row_id);

            for rel_delta in relationships {
                apply_relationship_delta(tx, version_id, logical_to_row, rel_delta)?;
            }
        }
        Delta::Update {
            entity_id,
            fields,
            relationships,
        } => {
            let row_id = *logical_to_row
                .get(&entity_id)
                .ok_or_else(|| Error::NotInVersion {
                    version_id,
                    logical_id: entity_id.clone(),
                })?;

            let mut fields = fields
                .as_object()
                .cloned()
                .ok_or_else(|| Error::InvalidInput("update delta fields must be an object".into()))?;
            // Preserve identity regardless of what the caller passed.
            ensure_logical_id(&mut fields, Some(entity_id.clone()));
            let data = Json::Object(fields);
            let name = derive_display_name(data.get("name").and_then(Json::as_str), &data);
            store::update_entity(tx, row_id, &name, &data)?;

            for rel_delta in relationships {
                apply_relationship_delta(tx, version_id, logical_to_row, rel_delta)?;
            }
        }
        Delta::Delete { entity_id } => {
            let row_id = *logical_to_row
                .get(&entity_id)
                .ok_or_else(|| Error::NotInVersion {
                    version_id,
                    logical_id: entity_id.clone(),
                })?;

            store::delete_relationships_touching(tx, row_id)?;
            store::delete_entity(tx, row_id)?;
            logical_to_row.remove(&entity_id);
        }
    }
    Ok(())
}

fn apply_relationship_delta(
    tx: &Transaction,
    version_id: i64,
    logical_to_row: &LogicalToRow,
    delta: RelationshipDelta,
) -> Result<()> {
    match delta {
        RelationshipDelta::Create {
            from,
            to,
            relationship_type,
            properties,
        } => {
            let from_row = *logical_to_row
                .get(&from)
                .ok_or_else(|| Error::EndpointNotInVersion {
                    version_id,
                    logical_id: from.clone(),
                })?;
            let to_row = *logical_to_row
                .get(&to)
                .ok_or_else(|| Error::EndpointNotInVersion {
                    version_id,
                    logical_id: to.clone(),
                })?;

            if store::relationship_exists(tx, version_id, from_row, to_row, &relationship_type)? {
                return Err(Error::RelationshipExists {
                    version_id,
                    from: from_row,
                    to: to_row,
                    relationship_type,
                });
            }

            let properties = normalize_properties(properties);
            store::insert_relationship(tx, version_id, from_row, to_row, &relationship_type, &properties)?;
        }
        RelationshipDelta::Update {
            relationship_id,
            properties,
        } => {
            store::update_relationship_properties(tx, relationship_id, &properties)?;
        }
        RelationshipDelta::Delete { relationship_id } => {
            store::delete_relationship(tx, relationship_id)?;
        }
    }
    Ok(())
}

fn normalize_properties(properties: Option<Json>) -> Json {
    match properties {
        None | Some(Json::Null) => serde_json::json!({}),
        Some(value) => value,
    }
}
