use serde_json::json;

use crate::graphwrite::{Delta, GraphWrite, RelationshipDelta};
use crate::model::EntityType;
use crate::store;
use crate::testing::{apply_single, create_character, project_with_root_version, temp_store};

use super::{EdgeDirection, EntityFilter, Query};

fn three_entity_graph(store: &crate::store::Store) -> i64 {
    let (_, root) = project_with_root_version(store);
    let write = GraphWrite::new(store);
    write
        .apply(
            root,
            vec![
                Delta::Create {
                    entity_id: Some("s1".into()),
                    entity_type: EntityType::Scene,
                    fields: json!({ "name": "Opening" }),
                    relationships: vec![],
                },
                Delta::Create {
                    entity_id: Some("c1".into()),
                    entity_type: EntityType::Character,
                    fields: json!({ "name": "Elena" }),
                    relationships: vec![RelationshipDelta::Create {
                        from: "s1".into(),
                        to: "c1".into(),
                        relationship_type: "features".into(),
                        properties: None,
                    }],
                },
                Delta::Create {
                    entity_id: Some("l1".into()),
                    entity_type: EntityType::Location,
                    fields: json!({ "name": "The Hollow" }),
                    relationships: vec![RelationshipDelta::Create {
                        from: "s1".into(),
                        to: "l1".into(),
                        relationship_type: "occurs_at".into(),
                        properties: None,
                    }],
                },
            ],
        )
        .unwrap()
        .new_version_id
}

#[test]
fn list_entities_in_version_filters_by_type_and_name() {
    let store = temp_store();
    let version_id = three_entity_graph(&store);
    let query = Query::new(&store);

    let all = query.list_entities_in_version(version_id, &EntityFilter::default()).unwrap();
    assert_eq!(all.len(), 3);

    let characters = query
        .list_entities_in_version(
            version_id,
            &EntityFilter {
                entity_type: Some(EntityType::Character),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(characters.len(), 1);
    assert_eq!(characters[0].logical_id(), "c1");

    let by_name = query
        .list_entities_in_version(
            version_id,
            &EntityFilter {
                name_contains: Some("Hollow".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].logical_id(), "l1");

    let limited = query
        .list_entities_in_version(version_id, &EntityFilter { limit: Some(1), ..Default::default() })
        .unwrap();
    assert_eq!(limited.len(), 1);
}

#[test]
fn neighbors_in_version_resolves_both_directions() {
    let store = temp_store();
    let version_id = three_entity_graph(&store);
    let query = Query::new(&store);

    let from_scene = query.neighbors_in_version(version_id, "s1", None).unwrap();
    assert_eq!(from_scene.len(), 2);
    assert!(from_scene.iter().all(|n| n.direction == EdgeDirection::Outbound));
    let mut ids: Vec<&str> = from_scene.iter().map(|n| n.entity.logical_id()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["c1", "l1"]);

    let from_character = query.neighbors_in_version(version_id, "c1", None).unwrap();
    assert_eq!(from_character.len(), 1);
    assert_eq!(from_character[0].direction, EdgeDirection::Inbound);
    assert_eq!(from_character[0].entity.logical_id(), "s1");

    let filtered = query.neighbors_in_version(version_id, "s1", Some("occurs_at")).unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].entity.logical_id(), "l1");
}

#[test]
fn neighbors_in_version_rejects_unknown_logical_id() {
    let store = temp_store();
    let version_id = three_entity_graph(&store);
    let query = Query::new(&store);

    let result = query.neighbors_in_version(version_id, "ghost", None);
    assert!(matches!(result, Err(crate::error::Error::NotInVersion { .. })));
}

#[test]
fn working_set_resolves_the_flagged_version() {
    let store = temp_store();
    let (project_id, root) = project_with_root_version(&store);
    let query = Query::new(&store);

    assert!(query.working_set(project_id).is_err());

    store.transaction(|tx| store::set_working_set(tx, project_id, root)).unwrap();
    let resolved = query.working_set(project_id).unwrap();
    assert_eq!(resolved.id, root);
}

#[test]
fn create_character_fixture_is_reusable() {
    let store = temp_store();
    let (_, root) = project_with_root_version(&store);
    let write = GraphWrite::new(&store);
    let v1 = apply_single(&write, root, vec![create_character("elena", "Elena", 3)]);
    let query = Query::new(&store);
    let entities = query.list_entities_in_version(v1, &EntityFilter::default()).unwrap();
    assert_eq!(entities.len(), 1);
}
