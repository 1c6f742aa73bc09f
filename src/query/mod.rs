//! Query: read-side helpers over a version's entities and relationships,
//! translating logical IDs into the per-version row IDs stored in the
//! `Store` (spec.md §4.5).

#[cfg(test)]
mod tests;

use crate::error::{Error, Result};
use crate::model::{Entity, EntityType, GraphVersion};
use crate::store;
use crate::store::Store;

/// Optional filters for [`Query::list_entities_in_version`].
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    pub entity_type: Option<EntityType>,
    /// Case-sensitive substring match against `Entity::name`.
    pub name_contains: Option<String>,
    pub limit: Option<usize>,
}

/// Which side of an edge a neighbor was reached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    Outbound,
    Inbound,
}

/// A neighboring entity reached from the queried logical ID, with the edge
/// that connects them (spec.md §4.5's "endpoint-ID and edge-type
/// faithfulness").
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub entity: Entity,
    pub relationship_type: String,
    pub direction: EdgeDirection,
}

pub struct Query<'s> {
    store: &'s Store,
}

impl<'s> Query<'s> {
    pub fn new(store: &'s Store) -> Self {
        Query { store }
    }

    /// Lists entities in `version_id`, decoding `data` and exposing
    /// `logical_id` as the observable ID, filtered and limited as requested.
    pub fn list_entities_in_version(&self, version_id: i64, filter: &EntityFilter) -> Result<Vec<Entity>> {
        self.store.transaction(|tx| {
            let mut entities = store::list_entities_in_version(tx, version_id)?;

            if let Some(entity_type) = &filter.entity_type {
                entities.retain(|e| &e.entity_type == entity_type);
            }
            if let Some(needle) = &filter.name_contains {
                entities.retain(|e| e.name.contains(needle.as_str()));
            }
            if let Some(limit) = filter.limit {
                entities.truncate(limit);
            }
            Ok(entities)
        })
    }

    /// Resolves `logical_id` to its row in `version_id`, then returns every
    /// entity reachable via an outbound or inbound edge, optionally
    /// restricted to `relationship_type` (spec.md §4.5).
    pub fn neighbors_in_version(
        &self,
        version_id: i64,
        logical_id: &str,
        relationship_type: Option<&str>,
    ) -> Result<Vec<Neighbor>> {
        self.store.transaction(|tx| {
            let origin = store::find_entity_by_logical_id(tx, version_id, logical_id)?.ok_or_else(|| {
                Error::NotInVersion {
                    version_id,
                    logical_id: logical_id.to_string(),
                }
            })?;

            let mut neighbors = Vec::new();
            for relationship in store::list_relationships_in_version(tx, version_id)? {
                if let Some(wanted) = relationship_type {
                    if relationship.relationship_type != wanted {
                        continue;
                    }
                }

                if relationship.from_entity_row_id == origin.row_id {
                    let entity = store::get_entity(tx, relationship.to_entity_row_id)?;
                    neighbors.push(Neighbor {
                        entity,
                        relationship_type: relationship.relationship_type.clone(),
                        direction: EdgeDirection::Outbound,
                    });
                } else if relationship.to_entity_row_id == origin.row_id {
                    let entity = store::get_entity(tx, relationship.from_entity_row_id)?;
                    neighbors.push(Neighbor {
                        entity,
                        relationship_type: relationship.relationship_type.clone(),
                        direction: EdgeDirection::Inbound,
                    });
                }
            }
            Ok(neighbors)
        })
    }

    /// Returns the unique version flagged `is_working_set` for `project_id`.
    pub fn working_set(&self, project_id: i64) -> Result<GraphVersion> {
        self.store.transaction(|tx| store::get_working_set(tx, project_id))
    }
}
