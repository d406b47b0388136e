/// Transaction tests
///
/// Every save, remove and swap commits or rolls back as one unit.
/// Run with: cargo test --test transaction_tests

use rustsortable::prelude::*;
use rustsortable::query::{Filter, Select, Update};

fn schema() -> EntitySchema {
    EntitySchema::new("Slide")
        .column(Column::new("slug", DataType::Text).unique())
        .behavior(BehaviorConfig::sortable().with_option("new_position", "top"))
}

fn manager() -> EntityManager {
    let mut manager: EntityManager = EntityManager::default();
    manager.register(schema()).unwrap();
    manager
}

fn insert(manager: &mut EntityManager, slug: &str) -> Result<Record> {
    let mut record = manager.create("Slide")?;
    record.set("slug", slug)?;
    manager.save(&mut record)?;
    Ok(record)
}

fn positions(manager: &EntityManager) -> Vec<i64> {
    manager
        .find_all("Slide")
        .unwrap()
        .iter()
        .map(|r| r.get_i64("position").unwrap())
        .collect()
}

#[test]
fn test_failed_insert_rolls_back_shift() {
    let mut manager = manager();
    insert(&mut manager, "a").unwrap();
    insert(&mut manager, "b").unwrap();
    assert_eq!(positions(&manager), vec![2, 1]);

    // top mode shifts everyone before the duplicate slug is rejected
    let err = insert(&mut manager, "a").unwrap_err();
    assert!(matches!(err, OrmError::ConstraintViolation(_)));
    assert!(err.is_retryable());
    assert_eq!(positions(&manager), vec![2, 1]);
    assert!(!manager.store().in_transaction());
}

#[test]
fn test_failed_update_rolls_back_shift() {
    let mut manager = manager();
    for slug in ["a", "b", "c"] {
        insert(&mut manager, slug).unwrap();
    }
    let mut record = manager.find("Slide", 3).unwrap().unwrap();
    record.set("position", 3).unwrap();
    record.set("slug", "a").unwrap();
    let before = record.clone();

    assert!(manager.save(&mut record).is_err());
    assert_eq!(record, before);
    assert_eq!(positions(&manager), vec![3, 2, 1]);
}

#[test]
fn test_swap_is_atomic_when_other_row_is_gone() {
    let mut manager = manager();
    let mut first = insert(&mut manager, "a").unwrap();
    let mut second = insert(&mut manager, "b").unwrap();
    manager.refresh(&mut first).unwrap();
    let (first_before, second_before) = (first.clone(), second.clone());

    manager.store_mut().delete("Slide", 2).unwrap();
    let err = manager
        .sortable("Slide")
        .unwrap()
        .swap_with(&mut first, &mut second)
        .unwrap_err();

    assert!(matches!(err, OrmError::EntityNotFound { id: 2, .. }));
    assert_eq!(first, first_before);
    assert_eq!(second, second_before);
    let stored = manager.find("Slide", 1).unwrap().unwrap();
    assert_eq!(stored.get_i64("position"), first_before.get_i64("position"));
}

#[test]
fn test_save_inside_outer_transaction_is_nested() {
    let mut manager = manager();
    insert(&mut manager, "a").unwrap();

    manager.store_mut().begin().unwrap();
    insert(&mut manager, "b").unwrap();
    assert!(insert(&mut manager, "b").is_err());
    // the failed inner save did not abort the outer unit
    assert_eq!(manager.store().transaction_depth(), 1);
    manager.store_mut().rollback().unwrap();

    assert_eq!(positions(&manager), vec![1]);
}

#[test]
fn test_transactional_commits_and_rolls_back() {
    let mut store = InMemoryStorage::new();
    store
        .create_table(rustsortable::storage::TableSchema::new(
            "items",
            vec![Column::new("rank", DataType::Integer)],
        ))
        .unwrap();

    transactional(&mut store, |s| {
        s.insert("items", vec![Value::Null, Value::Integer(1)])?;
        s.insert("items", vec![Value::Null, Value::Integer(2)])?;
        Ok(())
    })
    .unwrap();
    assert_eq!(store.row_count("items").unwrap(), 2);

    let result: Result<()> = transactional(&mut store, |s| {
        s.update_where(&Update::shift("items", "rank", 10))?;
        Err(OrmError::PreconditionFailed("stop".into()))
    });
    assert!(result.is_err());
    let ranks: Vec<_> = store
        .select(&Select::from("items").filter(Filter::Gt("rank".into(), Value::Integer(5))))
        .unwrap();
    assert!(ranks.is_empty());
}

#[test]
fn test_remove_with_compaction_is_atomic() {
    let mut manager: EntityManager = EntityManager::default();
    manager
        .register(
            EntitySchema::new("Slide")
                .behavior(BehaviorConfig::sortable().with_option("compact_on_delete", true)),
        )
        .unwrap();
    let mut records = Vec::new();
    for _ in 0..3 {
        let mut record = manager.create("Slide").unwrap();
        manager.save(&mut record).unwrap();
        records.push(record);
    }
    // removing the same row twice must not shift the survivors again
    let mut ghost = records[0].clone();
    manager.remove(&mut records[0]).unwrap();
    assert_eq!(positions(&manager), vec![1, 2]);
    assert!(matches!(
        manager.remove(&mut ghost),
        Err(OrmError::EntityNotFound { .. })
    ));
    assert_eq!(positions(&manager), vec![1, 2]);
}

#[test]
fn test_connected_handles_see_each_others_writes() {
    let store = InMemoryStorage::new();
    let mut writer: EntityManager = EntityManager::new(store.connect());
    writer.register(schema()).unwrap();
    insert(&mut writer, "a").unwrap();

    let mut reader: EntityManager = EntityManager::new(store.connect());
    reader.register(schema()).unwrap();
    assert_eq!(positions(&reader), vec![1]);
    assert_eq!(reader.sortable("Slide").unwrap().max_position().unwrap(), Some(1));
}

fn connected(store: &InMemoryStorage) -> EntityManager {
    let mut manager: EntityManager = EntityManager::new(store.connect());
    manager.register(schema()).unwrap();
    manager
}

fn three_slides(store: &InMemoryStorage) -> EntityManager {
    let mut manager = connected(store);
    for slug in ["a", "b", "c"] {
        insert(&mut manager, slug).unwrap();
    }
    assert_eq!(positions(&manager), vec![3, 2, 1]);
    manager
}

#[test]
fn test_rollback_keeps_swap_committed_by_other_handle() {
    let store = InMemoryStorage::new();
    let mut a = three_slides(&store);
    let mut b = connected(&store);

    a.store_mut().begin().unwrap();
    a.store_mut()
        .update_by_id("Slide", 1, "position", Value::Integer(2))
        .unwrap();
    assert_eq!(positions(&a), vec![2, 2, 1]);
    // the open transaction is not visible outside its handle
    assert_eq!(positions(&b), vec![3, 2, 1]);

    let mut first = b.find("Slide", 1).unwrap().unwrap();
    let mut third = b.find("Slide", 3).unwrap().unwrap();
    b.sortable("Slide")
        .unwrap()
        .swap_with(&mut first, &mut third)
        .unwrap();
    assert_eq!(positions(&b), vec![1, 2, 3]);

    a.store_mut().rollback().unwrap();
    assert_eq!(positions(&a), vec![1, 2, 3]);
    assert_eq!(positions(&b), vec![1, 2, 3]);
}

#[test]
fn test_commit_racing_a_committed_swap_is_rejected() {
    let store = InMemoryStorage::new();
    let mut a = three_slides(&store);
    let mut b = connected(&store);

    a.store_mut().begin().unwrap();
    let mut moved = a.find("Slide", 3).unwrap().unwrap();
    moved.set("position", 3).unwrap();
    a.save(&mut moved).unwrap();
    assert_eq!(positions(&a), vec![2, 1, 3]);

    let mut first = b.find("Slide", 1).unwrap().unwrap();
    let mut third = b.find("Slide", 3).unwrap().unwrap();
    b.sortable("Slide")
        .unwrap()
        .swap_with(&mut first, &mut third)
        .unwrap();

    let err = a.store_mut().commit().unwrap_err();
    assert!(matches!(err, OrmError::Transaction(_)));
    assert!(err.is_retryable());
    assert!(!a.store().in_transaction());
    assert_eq!(positions(&a), vec![1, 2, 3]);
}
