//! Table facade against the in-memory backend

mod common;

use azstore::{EntityKey, Filter, StorageError};
use common::{Person, storage_with_people};
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn save_and_retrieve_round_trips_fields() {
    let storage = storage_with_people().await;
    let tables = storage.tables();

    let p1 = Person::fake("A", 0);
    let p2 = Person::fake("A", 1);
    assert_ok!(tables.save(&p1).await);
    assert_ok!(tables.save(&p2).await);

    let missing: Option<Person> = tables.retrieve("nodata", "nodata").await.unwrap();
    assert!(missing.is_none());

    let found: Person = tables.retrieve("A", "0").await.unwrap().unwrap();
    assert_eq!(found.birth_date, p1.birth_date);
    assert_eq!(found, p1);
}

#[tokio::test]
async fn save_merges_into_existing_entity() {
    let storage = storage_with_people().await;
    let tables = storage.tables();

    let full = Person::fake("M", 0);
    tables.save(&full).await.unwrap();
    tables.save(&Person::keys_only("M", "0")).await.unwrap();

    let merged: Person = tables.retrieve("M", "0").await.unwrap().unwrap();
    assert_eq!(merged.first_name, full.first_name);
    assert_eq!(merged.last_name, full.last_name);
}

#[tokio::test]
async fn top_n_limits_results() {
    let storage = storage_with_people().await;
    let tables = storage.tables();
    let pk = "TopN";

    let people: Vec<Person> = (0..2000).map(|i| Person::fake(pk, i)).collect();
    assert_eq!(tables.save_multi_batch(&people).await.unwrap(), 20);

    let filter = || Some(Filter::partition_key_eq(pk));

    let all: Vec<Person> = tables.run_query(filter(), None).await.unwrap();
    assert_eq!(all.len(), 2000);

    for n in [50, 1500, 1] {
        let top: Vec<Person> = tables.run_query(filter(), Some(n)).await.unwrap();
        assert_eq!(top.len(), n);
    }

    let none: Vec<Person> = tables
        .run_query(Some(Filter::partition_key_eq("DOESNOTEXIST")), Some(1))
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn first_returns_lowest_key() {
    let storage = storage_with_people().await;
    let tables = storage.tables();
    let zeros = "000000";

    tables.save(&Person::fake("B", 1)).await.unwrap();
    tables.save(&Person::fake(zeros, zeros)).await.unwrap();

    let first: Person = tables.first().await.unwrap().unwrap();
    assert_eq!(first.partition_key, zeros);
    assert_eq!(first.row_key, zeros);
}

#[tokio::test]
async fn get_all_without_filter() {
    let storage = storage_with_people().await;
    let tables = storage.tables();

    for pk in ["X", "Y", "Z"] {
        tables.save(&Person::fake(pk, 0)).await.unwrap();
    }

    let people: Vec<Person> = tables.run_query(None, None).await.unwrap();
    assert_eq!(people.len(), 3);
}

#[tokio::test]
async fn delete_single() {
    let storage = storage_with_people().await;
    let tables = storage.tables();
    let id = "tobedeleted";

    let p = Person::fake(id, id);
    tables.save(&p).await.unwrap();

    let ghost = Person::keys_only("xyz", "xyz");
    assert_ok!(tables.delete(&ghost, false).await);

    let err = tables.delete(&ghost, true).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));

    assert_ok!(tables.delete(&p, true).await);
    let gone: Option<Person> = tables.retrieve(id, id).await.unwrap();
    assert!(gone.is_none());
}

#[tokio::test]
async fn batch_transaction_single_partition() {
    let storage = storage_with_people().await;
    let tables = storage.tables();

    let people: Vec<Person> = (0..100).map(|i| Person::fake("Batch", i)).collect();
    assert_ok!(tables.save_batch_transaction(&people).await);

    let saved: Vec<Person> = tables
        .run_query(Some(Filter::partition_key_eq("Batch")), None)
        .await
        .unwrap();
    assert_eq!(saved.len(), 100);

    assert_ok!(tables.delete_batch_transaction(&people[..40]).await);
    let left: Vec<Person> = tables.run_query(None, None).await.unwrap();
    assert_eq!(left.len(), 60);
}

#[tokio::test]
async fn batch_transaction_rejects_spread_partitions() {
    let storage = storage_with_people().await;
    let tables = storage.tables();

    let people: Vec<Person> = (0..100).map(|i| Person::fake(format!("Batch{i}"), i)).collect();
    let err = tables.save_batch_transaction(&people).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidBatch(_)));

    // nothing was written
    let saved: Vec<Person> = tables.run_query(None, None).await.unwrap();
    assert!(saved.is_empty());
}

#[tokio::test]
async fn delete_batch_transaction_fails_on_missing_entity() {
    let storage = storage_with_people().await;
    let tables = storage.tables();

    tables.save(&Person::fake("D", 0)).await.unwrap();
    let batch = vec![Person::keys_only("D", "0"), Person::keys_only("D", "missing")];

    let err = assert_err!(tables.delete_batch_transaction(&batch).await);
    assert!(err.is_not_found());

    // atomic: the existing entity survived
    let kept: Option<Person> = tables.retrieve("D", "0").await.unwrap();
    assert!(kept.is_some());
}

#[tokio::test]
async fn multi_batch_save_and_delete_across_partitions() {
    let storage = storage_with_people().await;
    let tables = storage.tables();

    let mut people: Vec<Person> = (0..150).map(|i| Person::fake("P1", i)).collect();
    people.extend((0..30).map(|i| Person::fake("P2", i)));
    people.extend((0..100).map(|i| Person::fake("P3", i)));

    assert_eq!(tables.save_multi_batch(&people).await.unwrap(), 4);
    assert_eq!(tables.run_query::<Person>(None, None).await.unwrap().len(), 280);

    assert_eq!(tables.delete_multi_batch(&people).await.unwrap(), 4);
    assert!(tables.first::<Person>().await.unwrap().is_none());

    assert_eq!(tables.save_multi_batch::<Person>(&[]).await.unwrap(), 0);
}

#[tokio::test]
async fn retrieve_parallel_skips_missing() {
    let storage = storage_with_people().await;
    let tables = storage.tables();

    let people: Vec<Person> = (0..30).map(|i| Person::fake("R", i)).collect();
    tables.save_multi_batch(&people).await.unwrap();

    let mut keys: Vec<EntityKey> = people.iter().map(|p| EntityKey::new("R", &p.row_key)).collect();
    keys.push(EntityKey::new("R", "missing"));
    keys.push(EntityKey::new("R", "0"));

    let found: Vec<Person> = tables.retrieve_parallel(&keys).await.unwrap();
    assert_eq!(found.len(), 30);
}

#[tokio::test]
async fn filters_on_properties() {
    let storage = storage_with_people().await;
    let tables = storage.tables();

    let mut alice = Person::fake("F", 0);
    alice.first_name = Some("Alice".to_string());
    let mut bob = Person::fake("F", 1);
    bob.first_name = Some("Bob".to_string());
    tables.save(&alice).await.unwrap();
    tables.save(&bob).await.unwrap();

    let filter = Filter::partition_key_eq("F").and(Filter::eq("FirstName", "Bob"));
    let found: Vec<Person> = tables.run_query(Some(filter), None).await.unwrap();
    assert_eq!(found, vec![bob]);
}

#[tokio::test]
async fn table_lifecycle() {
    let storage = storage_with_people().await;
    let tables = storage.tables();

    assert!(tables.table_exists::<Person>().await.unwrap());
    assert!(tables.delete_table::<Person>().await.unwrap());
    assert!(!tables.table_exists::<Person>().await.unwrap());
    assert!(!tables.delete_table::<Person>().await.unwrap());
}
