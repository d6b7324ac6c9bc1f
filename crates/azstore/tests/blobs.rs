//! Blob facade against the in-memory backend

mod common;

use azstore::AzureStorage;
use common::random_bytes;
use tokio_test::{assert_err, assert_ok};

const CONTAINER: &str = "test001";

async fn storage() -> AzureStorage {
    let storage = AzureStorage::in_memory("");
    storage
        .blobs()
        .container_create_if_not_exist(CONTAINER)
        .await
        .unwrap();
    storage
}

async fn seed_listing(storage: &AzureStorage) {
    let blobs = storage.blobs();
    for i in 0..10 {
        for name in [
            format!("listing/f{i}.dat"),
            format!("listing/sub1/s1_{i}.dat"),
            format!("listing/sub1/sub1.1/s1_{i}.dat"),
            format!("listing/sub2/s2_{i}.dat"),
        ] {
            blobs.store_data(CONTAINER, &name, random_bytes(10), true).await.unwrap();
        }
    }
}

#[tokio::test]
async fn read_write_exists_delete() {
    let storage = storage().await;
    let blobs = storage.blobs();

    let data1 = random_bytes(100);
    let data2 = random_bytes(1024);
    let data3 = random_bytes(64 * 1024);

    assert_ok!(blobs.store_data(CONTAINER, "data1.dat", data1.clone(), true).await);
    assert_ok!(blobs.store_data(CONTAINER, "data2.dat", data2.clone(), true).await);
    assert_ok!(blobs.store_data(CONTAINER, "data3.dat", data3.clone(), true).await);

    assert_eq!(blobs.get_data(CONTAINER, "data1.dat").await.unwrap(), data1);
    assert_eq!(blobs.get_data(CONTAINER, "data2.dat").await.unwrap(), data2);
    assert_eq!(blobs.get_data(CONTAINER, "data3.dat").await.unwrap(), data3);

    let err = assert_err!(blobs.get_data(CONTAINER, "non_existing.dat").await);
    assert_eq!(err.status(), Some(404));

    assert!(blobs.blob_exists(CONTAINER, "data1.dat").await.unwrap());
    assert!(!blobs.blob_exists(CONTAINER, "non_existing.dat").await.unwrap());

    assert_ok!(blobs.delete(CONTAINER, "data3.dat").await);
    assert!(!blobs.blob_exists(CONTAINER, "data3.dat").await.unwrap());
}

#[tokio::test]
async fn store_without_overwrite_keeps_original() {
    let storage = storage().await;
    let blobs = storage.blobs();

    blobs.store_data(CONTAINER, "once.dat", vec![1, 2, 3], false).await.unwrap();
    let err = assert_err!(blobs.store_data(CONTAINER, "once.dat", vec![9], false).await);
    assert_eq!(err.status(), Some(409));
    assert_eq!(blobs.get_data(CONTAINER, "once.dat").await.unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn list_is_recursive() {
    let storage = storage().await;
    seed_listing(&storage).await;
    let blobs = storage.blobs();

    assert_eq!(blobs.list(CONTAINER, "").await.unwrap().len(), 40);
    assert_eq!(blobs.list(CONTAINER, "listing/").await.unwrap().len(), 40);
    assert_eq!(blobs.list(CONTAINER, "listing/sub1/").await.unwrap().len(), 20);
}

#[tokio::test]
async fn list_single_level_splits_folders() {
    let storage = storage().await;
    seed_listing(&storage).await;

    let level = storage
        .blobs()
        .list_single_level(CONTAINER, "listing/")
        .await
        .unwrap();
    assert_eq!(level.folders, vec!["listing/sub1/", "listing/sub2/"]);
    assert_eq!(level.blobs.len(), 10);

    let root = storage.blobs().list_single_level(CONTAINER, "").await.unwrap();
    assert_eq!(root.folders, vec!["listing/"]);
    assert!(root.blobs.is_empty());
}

#[tokio::test]
async fn store_and_get_parallel() {
    let storage = storage().await;
    let blobs = storage.blobs();

    let items: Vec<(String, Vec<u8>)> = (0..200)
        .map(|i| (format!("parallel1/blob_{i}"), random_bytes(1024)))
        .collect();
    let names: Vec<String> = items.iter().map(|(name, _)| name.clone()).collect();

    assert_ok!(blobs.store_data_parallel(CONTAINER, items.clone(), true).await);

    let mut fetched = blobs.get_data_parallel(CONTAINER, &names).await.unwrap();
    fetched.sort();
    let mut expected = items;
    expected.sort();
    assert_eq!(fetched, expected);
}

#[tokio::test]
async fn delete_parallel_removes_everything() {
    let storage = storage().await;
    let blobs = storage.blobs();
    let n = 100;

    let items: Vec<(String, Vec<u8>)> = (0..n)
        .map(|i| (format!("parallel2/blob_{i}"), random_bytes(256)))
        .collect();
    let names: Vec<String> = items.iter().map(|(name, _)| name.clone()).collect();
    blobs.store_data_parallel(CONTAINER, items, true).await.unwrap();
    assert_eq!(blobs.list(CONTAINER, "parallel2/").await.unwrap().len(), n);

    assert_ok!(blobs.delete_parallel(CONTAINER, &names).await);
    assert!(blobs.list(CONTAINER, "parallel2/").await.unwrap().is_empty());
}

#[tokio::test]
async fn get_parallel_fails_on_missing_blob() {
    let storage = storage().await;
    let blobs = storage.blobs();

    blobs.store_data(CONTAINER, "here.dat", vec![1], true).await.unwrap();
    let names = vec!["here.dat".to_string(), "gone.dat".to_string()];

    let err = assert_err!(blobs.get_data_parallel(CONTAINER, &names).await);
    assert!(err.is_not_found());
}
