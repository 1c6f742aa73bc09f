use serde_json::json;

use crate::codec::CharacterFields;
use crate::graphwrite::{Delta, GraphWrite};
use crate::model::{IMPORTED_FROM_PROJECT_KEY, IMPORT_TIMESTAMP_KEY};
use crate::store;
use crate::testing::{create_character, temp_store};

use super::CrossProject;

fn saga_project(store: &crate::store::Store, name: &str) -> (i64, i64) {
    store
        .transaction(|tx| {
            let project = store::insert_project(tx, name, None, None, None)?;
            let root = store::insert_version(tx, project.id, None, Some("root"), None)?;
            store::set_working_set(tx, project.id, root.id)?;
            Ok((project.id, root.id))
        })
        .expect("fixture project/version always create")
}

fn promote(store: &crate::store::Store, project_id: i64, version_id: i64) {
    store
        .transaction(|tx| store::set_working_set(tx, project_id, version_id))
        .unwrap();
}

/// Scenario C — cross-project import is idempotent (spec.md §8).
#[test]
fn import_entity_is_idempotent_and_annotates_provenance() {
    let store = temp_store();
    let (p1, v1) = saga_project(&store, "Book One");
    let (p2, w) = saga_project(&store, "Book Two");
    let write = GraphWrite::new(&store);
    let cross = CrossProject::new(&store);

    let v1 = write.apply(v1, vec![create_character("elena", "Elena Stormwind", 1)]).unwrap().new_version_id;
    promote(&store, p1, v1);

    let imported = cross.import_entity(w, p1, "elena").unwrap();
    assert_eq!(imported.logical_id(), "elena");
    assert_eq!(
        imported.data.get(IMPORTED_FROM_PROJECT_KEY).and_then(|v| v.as_i64()),
        Some(p1)
    );
    assert!(imported.data.get(IMPORT_TIMESTAMP_KEY).is_some());

    let imported_again = cross.import_entity(w, p1, "elena").unwrap();
    assert_eq!(imported_again.row_id, imported.row_id);

    let entities = store.transaction(|tx| store::list_entities_in_version(tx, w)).unwrap();
    assert_eq!(entities.iter().filter(|e| e.logical_id() == "elena").count(), 1);

    let _ = p2;
}

/// Scenario D — shared-entity listing after a 3-book saga (spec.md §8).
#[test]
fn list_shared_entities_and_history_across_three_books() {
    let store = temp_store();
    let write = GraphWrite::new(&store);
    let cross = CrossProject::new(&store);

    let (p1, root1) = saga_project(&store, "Book One");
    let (p2, root2) = saga_project(&store, "Book Two");
    let (p3, root3) = saga_project(&store, "Book Three");

    let b1 = write
        .apply(
            root1,
            vec![create_character("elena", "Elena Stormwind", 1), create_character("marcus", "Marcus Ironforge", 1)],
        )
        .unwrap()
        .new_version_id;
    promote(&store, p1, b1);

    let elena_in_b2 = cross.import_entity(root2, p1, "elena").unwrap();
    let marcus_in_b2 = cross.import_entity(root2, p1, "marcus").unwrap();
    let _ = marcus_in_b2;
    let b2 = write
        .apply(
            root2,
            vec![
                Delta::Update {
                    entity_id: "elena".to_string(),
                    fields: json!({ "name": "Elena Stormwind", "level": 7 }),
                    relationships: vec![],
                },
                Delta::Update {
                    entity_id: "marcus".to_string(),
                    fields: json!({ "name": "Marcus Ironforge", "level": 7 }),
                    relationships: vec![],
                },
            ],
        )
        .unwrap()
        .new_version_id;
    promote(&store, p2, b2);
    let _ = elena_in_b2;

    cross.import_entity(root3, p2, "elena").unwrap();
    cross.import_entity(root3, p2, "marcus").unwrap();
    let b3 = write
        .apply(
            root3,
            vec![Delta::Update {
                entity_id: "elena".to_string(),
                fields: json!({ "name": "Elena Stormwind", "level": 15 }),
                relationships: vec![],
            }],
        )
        .unwrap()
        .new_version_id;
    promote(&store, p3, b3);

    let shared = cross.list_shared_entities().unwrap();
    let elena = shared.iter().find(|s| s.logical_id == "elena").expect("elena is shared");
    assert_eq!(elena.project_count, 3);
    let marcus = shared.iter().find(|s| s.logical_id == "marcus").expect("marcus is shared");
    assert_eq!(marcus.project_count, 3);
    for name in ["Book One", "Book Two", "Book Three"] {
        assert!(elena.project_names.contains(&name.to_string()));
    }

    let history = cross.get_entity_history("elena").unwrap();
    assert_eq!(history.len(), 3);
    let mut levels: Vec<i64> = history
        .iter()
        .map(|v| CharacterFields::decode(&v.entity.data).unwrap().level.unwrap())
        .collect();
    levels.sort_unstable();
    assert_eq!(levels, vec![1, 7, 15]);

    let _ = p3;
}

/// Scenario E — shared-entity delete conflict (spec.md §8).
#[test]
fn delete_project_refuses_when_entities_are_shared() {
    let store = temp_store();
    let write = GraphWrite::new(&store);
    let cross = CrossProject::new(&store);

    let (p1, root1) = saga_project(&store, "Book One");
    let (_p2, root2) = saga_project(&store, "Book Two");

    let b1 = write
        .apply(
            root1,
            vec![create_character("elena", "Elena Stormwind", 1), create_character("marcus", "Marcus Ironforge", 1)],
        )
        .unwrap()
        .new_version_id;
    promote(&store, p1, b1);

    cross.import_entity(root2, p1, "elena").unwrap();
    cross.import_entity(root2, p1, "marcus").unwrap();

    let result = cross.delete_project(p1, false);
    match result {
        Err(crate::error::Error::SharedEntityConflict { project_id, shared }) => {
            assert_eq!(project_id, p1);
            assert!(shared.contains(&"Elena Stormwind".to_string()));
            assert!(shared.contains(&"Marcus Ironforge".to_string()));
        }
        other => panic!("expected SharedEntityConflict, got {other:?}"),
    }

    // The project is untouched.
    let still_there = store.transaction(|tx| store::get_project(tx, p1)).unwrap();
    assert_eq!(still_there.id, p1);
}

#[test]
fn delete_project_succeeds_when_forced_or_unshared() {
    let store = temp_store();
    let write = GraphWrite::new(&store);
    let cross = CrossProject::new(&store);

    let (p1, root1) = saga_project(&store, "Solo Book");
    let b1 = write.apply(root1, vec![create_character("elena", "Elena Stormwind", 1)]).unwrap().new_version_id;
    promote(&store, p1, b1);

    cross.delete_project(p1, false).unwrap();
    let result = store.transaction(|tx| store::get_project(tx, p1));
    assert!(matches!(result, Err(crate::error::Error::NotFound(_))));
}
