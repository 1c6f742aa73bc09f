//! EntityCodec: converts between dynamic, type-specific entity payloads and
//! the schemaless JSON blob stored in `entities.data` (spec.md §4.2).
//!
//! Each type gets its own typed view with a `#[serde(flatten)]` catch-all so
//! that unknown/future fields survive a decode-then-encode round trip
//! untouched — the "tolerant decoder" requirement. `logical_id` always
//! round-trips because it lives in every typed view explicitly, never inside
//! the flattened extras.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use uuid::Uuid;

use crate::model::LOGICAL_ID_KEY;

/// Generates a new logical ID. Used for brand-new entities that don't supply
/// their own (spec.md §3: "a brand-new entity without a supplied logical ID
/// gets one generated").
pub fn generate_logical_id() -> String {
    Uuid::new_v4().to_string()
}

/// Returns the current time formatted as RFC 3339, for annotation-payload
/// and import-provenance timestamps (spec.md §4.2, §4.4).
pub fn rfc3339_now() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .expect("OffsetDateTime::now_utc always formats")
}

/// Derives the display name for an entity whose delta omitted an explicit
/// `name`: falls back to `data.name` if present, otherwise empty
/// (spec.md §4.3.3).
pub fn derive_display_name(explicit_name: Option<&str>, data: &Json) -> String {
    match explicit_name {
        Some(name) => name.to_string(),
        None => data
            .get("name")
            .and_then(Json::as_str)
            .unwrap_or("")
            .to_string(),
    }
}

/// Writes `logical_id` into a fields map, generating one if absent, and
/// returns it. Mutates `fields` in place so the caller can serialize it
/// straight into the `data` column.
pub fn ensure_logical_id(fields: &mut Map<String, Json>, supplied: Option<String>) -> String {
    if let Some(id) = supplied {
        fields.insert(LOGICAL_ID_KEY.to_string(), Json::String(id.clone()));
        return id;
    }
    if let Some(existing) = fields.get(LOGICAL_ID_KEY).and_then(Json::as_str) {
        return existing.to_string();
    }
    let generated = generate_logical_id();
    fields.insert(LOGICAL_ID_KEY.to_string(), Json::String(generated.clone()));
    generated
}

/// Extracts `logical_id` from a decoded entity payload, if present.
pub fn read_logical_id(data: &Json) -> Option<&str> {
    data.get(LOGICAL_ID_KEY).and_then(Json::as_str)
}

macro_rules! typed_payload {
    ($name:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        #[derive(Debug, Clone, Serialize, Deserialize)]
        pub struct $name {
            pub logical_id: Option<String>,
            $(pub $field: Option<$ty>,)*
            #[serde(flatten)]
            pub extra: Map<String, Json>,
        }

        impl $name {
            /// Decodes a stored `data` blob into this typed view, tolerating
            /// unknown fields by stashing them in `extra`.
            pub fn decode(data: &Json) -> serde_json::Result<Self> {
                serde_json::from_value(data.clone())
            }

            /// Encodes this typed view back into a `data` blob, preserving
            /// `extra` untouched.
            pub fn encode(&self) -> Json {
                serde_json::to_value(self).expect("typed payload always serializes")
            }
        }
    };
}

typed_payload!(SceneFields {
    name: String,
    summary: String,
    location_logical_id: String,
    pov_character_logical_id: String,
    sequence: i64,
});

typed_payload!(CharacterFields {
    name: String,
    role: String,
    description: String,
    level: i64,
});

typed_payload!(LocationFields {
    name: String,
    kind: String,
    description: String,
});

typed_payload!(ThemeFields {
    name: String,
    description: String,
});

typed_payload!(PlotPointFields {
    name: String,
    description: String,
    order: i64,
});

typed_payload!(ArcFields {
    name: String,
    description: String,
    status: String,
});

/// Opaque annotation payload: content is a free-form string, metadata an
/// arbitrary JSON object. The producer owns the shape (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationPayload {
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Json>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_id_round_trips_through_decode_encode() {
        let mut fields = Map::new();
        fields.insert("name".into(), Json::String("Elena".into()));
        let id = ensure_logical_id(&mut fields, Some("elena".into()));
        assert_eq!(id, "elena");

        let data = Json::Object(fields);
        let decoded = CharacterFields::decode(&data).unwrap();
        assert_eq!(decoded.logical_id.as_deref(), Some("elena"));

        let re_encoded = decoded.encode();
        assert_eq!(read_logical_id(&re_encoded), Some("elena"));
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let mut fields = Map::new();
        fields.insert("name".into(), Json::String("Marcus".into()));
        fields.insert("favorite_color".into(), Json::String("teal".into()));
        ensure_logical_id(&mut fields, Some("marcus".into()));

        let data = Json::Object(fields);
        let decoded = CharacterFields::decode(&data).unwrap();
        let re_encoded = decoded.encode();
        assert_eq!(
            re_encoded.get("favorite_color").and_then(Json::as_str),
            Some("teal")
        );
    }

    #[test]
    fn generates_logical_id_when_absent() {
        let mut fields = Map::new();
        let id = ensure_logical_id(&mut fields, None);
        assert!(!id.is_empty());
        assert_eq!(fields.get(LOGICAL_ID_KEY).and_then(Json::as_str), Some(id.as_str()));
    }
}
