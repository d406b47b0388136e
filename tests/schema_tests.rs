/// Schema and snapshot tests
///
/// JSON entity schemas, behavior option validation and store snapshots.
/// Run with: cargo test --test schema_tests

use rustsortable::prelude::*;
use rustsortable::storage::snapshot;
use rustsortable::{NewPosition, parse_schemas};
use tempfile::tempdir;

const SCHEMAS: &str = r#"[
    {
        "name": "Slide",
        "columns": [{ "name": "title", "type": "text", "nullable": false }],
        "behaviors": [{ "sortable": { "new_position": "top", "column": "rank" } }]
    },
    { "name": "Note", "columns": [{ "name": "body", "type": "text" }] }
]"#;

fn register_all(manager: &mut EntityManager, json: &str) -> Result<()> {
    for schema in parse_schemas(json)? {
        manager.register(schema)?;
    }
    Ok(())
}

#[test]
fn test_parse_schema_file() {
    let schemas = parse_schemas(SCHEMAS).unwrap();
    assert_eq!(schemas.len(), 2);
    assert_eq!(schemas[0].behaviors[0].name(), "sortable");
    assert!(schemas[1].behaviors.is_empty());
}

#[test]
fn test_options_from_json_reach_the_engine() {
    let mut manager: EntityManager = EntityManager::default();
    register_all(&mut manager, SCHEMAS).unwrap();
    let repository = manager.sortable("Slide").unwrap();
    let config = repository.engine().config();
    assert_eq!(config.column, "rank");
    assert_eq!(config.new_position, NewPosition::Top);
    assert!(!config.compact_on_delete);
}

#[test]
fn test_default_options() {
    let schema = EntitySchema::from_json(r#"{ "name": "Item", "behaviors": [{ "sortable": {} }] }"#)
        .unwrap();
    let mut manager: EntityManager = EntityManager::default();
    manager.register(schema).unwrap();
    let repository = manager.sortable("Item").unwrap();
    assert_eq!(repository.engine().column(), "position");
    assert_eq!(repository.engine().config().new_position, NewPosition::Bottom);
}

#[test]
fn test_invalid_new_position_fails_at_registration() {
    let json = r#"[{ "name": "Item", "behaviors": [{ "sortable": { "new_position": "middle" } }] }]"#;
    let mut manager: EntityManager = EntityManager::default();
    let err = register_all(&mut manager, json).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Configuration error: The new_position \"middle\" is not valid."
    );
    assert!(manager.entity_names().is_empty());
}

#[test]
fn test_boolean_option_from_json() {
    let json = r#"[{ "name": "Item", "behaviors": [{ "sortable": { "compact_on_delete": true } }] }]"#;
    let mut manager: EntityManager = EntityManager::default();
    register_all(&mut manager, json).unwrap();
    assert!(manager.sortable("Item").unwrap().engine().config().compact_on_delete);
}

#[test]
fn test_invalid_schemas_are_rejected() {
    for json in [
        r#"[{ "name": "bad name" }]"#,
        r#"[{ "name": "Item", "columns": [{ "name": "id", "type": "integer" }] }]"#,
        r#"[{ "name": "Item", "columns": [
            { "name": "a", "type": "text" }, { "name": "a", "type": "text" }
        ] }]"#,
    ] {
        assert!(
            matches!(parse_schemas(json), Err(OrmError::Configuration(_))),
            "accepted {}",
            json
        );
    }
    assert!(matches!(
        parse_schemas("not json"),
        Err(OrmError::Serialization(_))
    ));
}

#[test]
fn test_snapshot_round_trip_keeps_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");

    let mut manager: EntityManager = EntityManager::default();
    register_all(&mut manager, SCHEMAS).unwrap();
    for title in ["a", "b", "c"] {
        let mut slide = manager.create("Slide").unwrap();
        slide.set("title", title).unwrap();
        manager.save(&mut slide).unwrap();
    }
    snapshot::save(&path, &manager.store().catalog().unwrap()).unwrap();

    let catalog = snapshot::load(&path).unwrap();
    let mut restored = EntityManager::new(InMemoryStorage::from_catalog(catalog));
    register_all(&mut restored, SCHEMAS).unwrap();

    let titles: Vec<String> = restored
        .sortable("Slide")
        .unwrap()
        .ordered()
        .unwrap()
        .iter()
        .map(|r| r.get_str("title").unwrap().to_string())
        .collect();
    assert_eq!(titles, vec!["c", "b", "a"]);

    // ids keep counting after a restore
    let mut slide = restored.create("Slide").unwrap();
    slide.set("title", "d").unwrap();
    restored.save(&mut slide).unwrap();
    assert_eq!(slide.id(), Some(4));
    assert_eq!(slide.get_i64("rank"), Some(1));
}

#[test]
fn test_missing_snapshot_is_empty_store() {
    let dir = tempdir().unwrap();
    let catalog = snapshot::load(&dir.path().join("absent.json")).unwrap();
    assert!(catalog.table_names().is_empty());
}

#[test]
fn test_snapshot_with_different_layout_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");

    let mut manager: EntityManager = EntityManager::default();
    register_all(&mut manager, SCHEMAS).unwrap();
    snapshot::save(&path, &manager.store().catalog().unwrap()).unwrap();

    let changed = SCHEMAS.replace("\"rank\"", "\"position\"");
    let mut restored = EntityManager::new(InMemoryStorage::from_catalog(
        snapshot::load(&path).unwrap(),
    ));
    assert!(matches!(
        register_all(&mut restored, &changed),
        Err(OrmError::Configuration(_))
    ));
}
