//! # Blob Facade
//!
//! Container lifecycle, single and parallel blob transfers, flat and
//! single-level listings.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::backend::BlobBackend;
use crate::error::{Result, StorageError};
use azstore_model::{BlobItem, BlobListing, FOLDER_DELIMITER, validate_container_name};

/// Blob operations scoped by container name
#[derive(Clone)]
pub struct EasyBlob {
    backend: Arc<dyn BlobBackend>,
    parallelism: usize,
}

impl EasyBlob {
    pub fn new(backend: Arc<dyn BlobBackend>, parallelism: usize) -> Self {
        Self {
            backend,
            parallelism: parallelism.max(1),
        }
    }

    // =========================================================================
    // CONTAINERS
    // =========================================================================

    /// # Errors
    ///
    /// Returns an error if the container name is invalid or the service call fails.
    pub async fn container_create_if_not_exist(&self, container: &str) -> Result<()> {
        validate_container_name(container)?;
        if self.backend.create_container_if_not_exists(container).await? {
            info!(container = %container, "Container created");
        }
        Ok(())
    }

    /// Delete a container and every blob in it. Returns `false` if it did
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the container name is invalid or the service call fails.
    pub async fn container_delete_if_exists(&self, container: &str) -> Result<bool> {
        validate_container_name(container)?;
        let deleted = self.backend.delete_container_if_exists(container).await?;
        if deleted {
            info!(container = %container, "Container deleted");
        }
        Ok(deleted)
    }

    // =========================================================================
    // SINGLE BLOBS
    // =========================================================================

    /// # Errors
    ///
    /// Returns an error if the container name is invalid or the service call fails.
    pub async fn blob_exists(&self, container: &str, name: &str) -> Result<bool> {
        validate_container_name(container)?;
        self.backend.blob_exists(container, name).await
    }

    /// Upload `data` as a block blob.
    ///
    /// # Errors
    ///
    /// With `overwrite` unset an existing blob fails with the service's 409.
    /// An invalid container name fails before any request.
    pub async fn store_data(&self, container: &str, name: &str, data: Vec<u8>, overwrite: bool) -> Result<()> {
        validate_container_name(container)?;
        debug!(container = %container, blob = %name, bytes = data.len(), overwrite, "Uploading blob");
        self.backend.upload_blob(container, name, data, overwrite).await
    }

    /// # Errors
    ///
    /// A missing blob or container is a 404 service error.
    pub async fn get_data(&self, container: &str, name: &str) -> Result<Vec<u8>> {
        validate_container_name(container)?;
        debug!(container = %container, blob = %name, "Downloading blob");
        self.backend.download_blob(container, name).await
    }

    /// # Errors
    ///
    /// A missing blob or container is a 404 service error.
    pub async fn delete(&self, container: &str, name: &str) -> Result<()> {
        validate_container_name(container)?;
        debug!(container = %container, blob = %name, "Deleting blob");
        self.backend.delete_blob(container, name).await
    }

    // =========================================================================
    // PARALLEL TRANSFERS
    // =========================================================================

    /// Upload many blobs concurrently. The first failure is returned; uploads
    /// already in flight are dropped.
    ///
    /// # Errors
    ///
    /// Propagates the first upload error.
    pub async fn store_data_parallel(
        &self,
        container: &str,
        items: Vec<(String, Vec<u8>)>,
        overwrite: bool,
    ) -> Result<()> {
        validate_container_name(container)?;
        let count = items.len();
        stream::iter(items.into_iter().map(Ok::<_, StorageError>))
            .try_for_each_concurrent(self.parallelism, |(name, data)| async move {
                self.backend.upload_blob(container, &name, data, overwrite).await
            })
            .await?;

        debug!(container = %container, blobs = count, "Parallel upload complete");
        Ok(())
    }

    /// Download many blobs concurrently, returned as `(name, data)` pairs in
    /// completion order.
    ///
    /// # Errors
    ///
    /// Propagates the first download error, including 404 for a missing blob.
    pub async fn get_data_parallel(&self, container: &str, names: &[String]) -> Result<Vec<(String, Vec<u8>)>> {
        validate_container_name(container)?;
        let downloaded: Vec<(String, Vec<u8>)> = stream::iter(names)
            .map(|name| async move {
                let data = self.backend.download_blob(container, name).await?;
                Ok::<_, StorageError>((name.clone(), data))
            })
            .buffer_unordered(self.parallelism)
            .try_collect()
            .await?;

        debug!(container = %container, blobs = downloaded.len(), "Parallel download complete");
        Ok(downloaded)
    }

    /// # Errors
    ///
    /// Propagates the first delete error, including 404 for a missing blob.
    pub async fn delete_parallel(&self, container: &str, names: &[String]) -> Result<()> {
        validate_container_name(container)?;
        stream::iter(names.iter().map(Ok::<_, StorageError>))
            .try_for_each_concurrent(self.parallelism, |name| async move {
                self.backend.delete_blob(container, name).await
            })
            .await?;

        debug!(container = %container, blobs = names.len(), "Parallel delete complete");
        Ok(())
    }

    // =========================================================================
    // LISTING
    // =========================================================================

    /// Every blob under `prefix`, at any depth.
    ///
    /// # Errors
    ///
    /// Propagates service errors.
    pub async fn list(&self, container: &str, prefix: &str) -> Result<Vec<BlobItem>> {
        validate_container_name(container)?;
        let listing = self
            .backend
            .list_blobs(container, non_empty(prefix), None)
            .await?;
        Ok(listing.blobs)
    }

    /// Blobs directly under `prefix` plus the virtual folders one level
    /// down, each folder ending in `/`.
    ///
    /// # Errors
    ///
    /// Propagates service errors.
    pub async fn list_single_level(&self, container: &str, prefix: &str) -> Result<BlobListing> {
        validate_container_name(container)?;
        self.backend
            .list_blobs(container, non_empty(prefix), Some(FOLDER_DELIMITER))
            .await
    }
}

fn non_empty(prefix: &str) -> Option<&str> {
    (!prefix.is_empty()).then_some(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    const CONTAINER: &str = "unittest";

    async fn setup() -> EasyBlob {
        let blobs = EasyBlob::new(Arc::new(InMemoryBackend::new()), 4);
        blobs.container_create_if_not_exist(CONTAINER).await.unwrap();
        blobs
    }

    #[tokio::test]
    async fn test_invalid_container_name_rejected() {
        let blobs = EasyBlob::new(Arc::new(InMemoryBackend::new()), 1);
        let err = blobs.container_create_if_not_exist("Bad_Name").await.unwrap_err();
        assert!(matches!(err, StorageError::Model(_)));
    }

    #[tokio::test]
    async fn test_invalid_container_name_rejected_by_blob_operations() {
        let blobs = setup().await;
        let names = vec!["a.dat".to_string()];

        let errors = [
            blobs.blob_exists("Bad_Name", "a.dat").await.unwrap_err(),
            blobs.store_data("Bad_Name", "a.dat", vec![1], true).await.unwrap_err(),
            blobs.get_data("Bad_Name", "a.dat").await.unwrap_err(),
            blobs.delete("Bad_Name", "a.dat").await.unwrap_err(),
            blobs
                .store_data_parallel("Bad_Name", vec![("a.dat".to_string(), vec![1])], true)
                .await
                .unwrap_err(),
            blobs.get_data_parallel("Bad_Name", &names).await.unwrap_err(),
            blobs.delete_parallel("Bad_Name", &names).await.unwrap_err(),
            blobs.list("Bad_Name", "").await.unwrap_err(),
            blobs.list_single_level("Bad_Name", "").await.unwrap_err(),
        ];
        for err in errors {
            assert!(matches!(err, StorageError::Model(_)), "{err}");
        }
    }

    #[tokio::test]
    async fn test_store_without_overwrite_conflicts() {
        let blobs = setup().await;
        assert_ok!(blobs.store_data(CONTAINER, "a.dat", vec![1], false).await);

        let err = blobs.store_data(CONTAINER, "a.dat", vec![2], false).await.unwrap_err();
        assert!(err.is_conflict());

        assert_ok!(blobs.store_data(CONTAINER, "a.dat", vec![3], true).await);
        assert_eq!(blobs.get_data(CONTAINER, "a.dat").await.unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_missing_blob_is_not_found() {
        let blobs = setup().await;
        assert!(blobs.get_data(CONTAINER, "nope").await.unwrap_err().is_not_found());
        assert!(blobs.delete(CONTAINER, "nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_parallel_round_trip() {
        let blobs = setup().await;
        let items: Vec<(String, Vec<u8>)> = (0..20u8)
            .map(|i| (format!("p/{i}.dat"), vec![i; 8]))
            .collect();
        let names: Vec<String> = items.iter().map(|(n, _)| n.clone()).collect();

        assert_ok!(blobs.store_data_parallel(CONTAINER, items, true).await);

        let mut fetched = blobs.get_data_parallel(CONTAINER, &names).await.unwrap();
        fetched.sort();
        assert_eq!(fetched.len(), 20);
        assert_eq!(fetched[0], ("p/0.dat".to_string(), vec![0; 8]));

        assert_ok!(blobs.delete_parallel(CONTAINER, &names).await);
        assert!(blobs.list(CONTAINER, "p/").await.unwrap().is_empty());
        assert_err!(blobs.delete_parallel(CONTAINER, &names).await);
    }

    #[tokio::test]
    async fn test_single_level_listing() {
        let blobs = setup().await;
        for name in ["l/a.dat", "l/b.dat", "l/x/c.dat", "l/y/z/d.dat"] {
            blobs.store_data(CONTAINER, name, Vec::new(), true).await.unwrap();
        }

        assert_eq!(blobs.list(CONTAINER, "l/").await.unwrap().len(), 4);

        let level = blobs.list_single_level(CONTAINER, "l/").await.unwrap();
        assert_eq!(level.blobs.len(), 2);
        assert_eq!(level.folders, vec!["l/x/".to_string(), "l/y/".to_string()]);
    }

    #[tokio::test]
    async fn test_container_delete() {
        let blobs = setup().await;
        assert!(blobs.container_delete_if_exists(CONTAINER).await.unwrap());
        assert!(!blobs.container_delete_if_exists(CONTAINER).await.unwrap());
    }

    /// Counts concurrent downloads against the in-memory backend
    struct SpyBackend {
        inner: InMemoryBackend,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl BlobBackend for SpyBackend {
        async fn create_container_if_not_exists(&self, container: &str) -> Result<bool> {
            self.inner.create_container_if_not_exists(container).await
        }

        async fn delete_container_if_exists(&self, container: &str) -> Result<bool> {
            self.inner.delete_container_if_exists(container).await
        }

        async fn blob_exists(&self, container: &str, blob: &str) -> Result<bool> {
            self.inner.blob_exists(container, blob).await
        }

        async fn upload_blob(&self, container: &str, blob: &str, data: Vec<u8>, overwrite: bool) -> Result<()> {
            self.inner.upload_blob(container, blob, data, overwrite).await
        }

        async fn download_blob(&self, container: &str, blob: &str) -> Result<Vec<u8>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            let result = self.inner.download_blob(container, blob).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }

        async fn delete_blob(&self, container: &str, blob: &str) -> Result<()> {
            self.inner.delete_blob(container, blob).await
        }

        async fn list_blobs(
            &self,
            container: &str,
            prefix: Option<&str>,
            delimiter: Option<&str>,
        ) -> Result<BlobListing> {
            self.inner.list_blobs(container, prefix, delimiter).await
        }
    }

    #[tokio::test]
    async fn test_get_data_parallel_respects_parallelism() {
        let spy = Arc::new(SpyBackend {
            inner: InMemoryBackend::new(),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        });
        let blobs = EasyBlob::new(spy.clone(), 4);
        blobs.container_create_if_not_exist(CONTAINER).await.unwrap();

        let items: Vec<(String, Vec<u8>)> = (0..50u8)
            .map(|i| (format!("c/{i}.dat"), vec![i]))
            .collect();
        let names: Vec<String> = items.iter().map(|(n, _)| n.clone()).collect();
        blobs.store_data_parallel(CONTAINER, items, true).await.unwrap();

        let fetched = blobs.get_data_parallel(CONTAINER, &names).await.unwrap();
        assert_eq!(fetched.len(), 50);

        let peak = spy.peak_in_flight.load(Ordering::SeqCst);
        assert!(peak <= 4, "peak in-flight downloads {peak}");
        assert!(peak > 1, "downloads never overlapped");
    }
}
