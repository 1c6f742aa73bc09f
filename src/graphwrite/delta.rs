use serde_json::Value as Json;

use crate::model::EntityType;

/// A single proposed change to an entity, optionally carrying nested
/// relationship deltas (spec.md §4.3.1, §4.3.3).
#[derive(Debug, Clone)]
pub enum Delta {
    Create {
        /// Logical ID to assign, or `None` to generate a fresh one.
        entity_id: Option<String>,
        entity_type: EntityType,
        /// Type-specific fields. `logical_id` is written in by the engine;
        /// any `logical_id` present here is overridden by `entity_id`.
        fields: Json,
        relationships: Vec<RelationshipDelta>,
    },
    Update {
        /// Logical ID of the entity to update. Must already be present in
        /// the version being built (carried over from the parent, or
        /// created earlier in this same batch).
        entity_id: String,
        fields: Json,
        relationships: Vec<RelationshipDelta>,
    },
    Delete {
        entity_id: String,
    },
}

/// A relationship-side change, nested inside an entity [`Delta`]. Endpoints
/// are addressed by logical ID, never by row ID (spec.md §4.3.3).
#[derive(Debug, Clone)]
pub enum RelationshipDelta {
    Create {
        from: String,
        to: String,
        relationship_type: String,
        /// `None` and `Json::Null` are both treated as an empty properties
        /// map (spec.md §4.3.3 edge case).
        properties: Option<Json>,
    },
    Update {
        relationship_id: i64,
        properties: Json,
    },
    Delete {
        relationship_id: i64,
    },
}

/// Result of a successful [`crate::graphwrite::GraphWrite::apply`] call.
#[derive(Debug, Clone, Copy)]
pub struct ApplyResult {
    pub new_version_id: i64,
    pub applied_count: usize,
}
