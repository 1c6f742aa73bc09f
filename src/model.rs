//! The versioned graph data model: projects, versions, entities,
//! relationships, and annotations (spec.md §3).

use serde_json::Value as Json;
use time::OffsetDateTime;

/// Reserved field name inside an entity's `data` blob carrying its stable,
/// cross-version, cross-project identity.
pub const LOGICAL_ID_KEY: &str = "logical_id";
/// Reserved field name recording the source project of an imported entity.
pub const IMPORTED_FROM_PROJECT_KEY: &str = "imported_from_project";
/// Reserved field name recording when an entity was imported.
pub const IMPORT_TIMESTAMP_KEY: &str = "import_timestamp";

/// Relationship types the core recognizes but does not specially interpret
/// beyond accepting them (spec.md §3's reserved vocabulary). Any other
/// string is also accepted and stored verbatim.
pub const RESERVED_RELATIONSHIP_TYPES: &[&str] = &[
    "contains",
    "advances",
    "features",
    "occurs_at",
    "influences",
    "precedes",
    "follows",
    "conflicts",
    "supports",
    "allies_with",
    "mentors",
];

/// Annotation types the core recognizes (spec.md §3). Payloads under these
/// types are opaque to the core.
pub const RESERVED_ANNOTATION_TYPES: &[&str] = &[
    "emotional_analysis",
    "thematic_score",
    "continuity_check",
    "structural_note",
    "character_voice",
    "pacing_analysis",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityType {
    Scene,
    Character,
    Location,
    Theme,
    PlotPoint,
    Arc,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Scene => "scene",
            EntityType::Character => "character",
            EntityType::Location => "location",
            EntityType::Theme => "theme",
            EntityType::PlotPoint => "plot_point",
            EntityType::Arc => "arc",
        }
    }

    pub fn parse(s: &str) -> Option<EntityType> {
        Some(match s {
            "scene" => EntityType::Scene,
            "character" => EntityType::Character,
            "location" => EntityType::Location,
            "theme" => EntityType::Theme,
            "plot_point" => EntityType::PlotPoint,
            "arc" => EntityType::Arc,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub theme: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct GraphVersion {
    pub id: i64,
    pub project_id: i64,
    pub parent_version_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_working_set: bool,
    pub created_at: OffsetDateTime,
}

/// An entity row as stored in a particular version. `data` is the decoded
/// JSON blob, including the reserved `logical_id` field.
#[derive(Debug, Clone)]
pub struct Entity {
    pub row_id: i64,
    pub version_id: i64,
    pub entity_type: EntityType,
    pub name: String,
    pub data: Json,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Entity {
    /// The stable cross-version, cross-project identity. Every entity
    /// stored through `GraphWrite` carries one; this panics only on rows
    /// that bypassed the codec, which never happens in this crate's own
    /// write paths.
    pub fn logical_id(&self) -> &str {
        self.data
            .get(LOGICAL_ID_KEY)
            .and_then(Json::as_str)
            .expect("entity row missing logical_id: codec invariant violated")
    }
}

#[derive(Debug, Clone)]
pub struct Relationship {
    pub row_id: i64,
    pub version_id: i64,
    pub from_entity_row_id: i64,
    pub to_entity_row_id: i64,
    pub relationship_type: String,
    pub properties: Json,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct Annotation {
    pub id: i64,
    pub entity_row_id: i64,
    pub annotation_type: String,
    pub content: String,
    pub metadata: Json,
    pub agent_name: Option<String>,
    pub created_at: OffsetDateTime,
}
