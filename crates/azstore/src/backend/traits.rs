//! # Backend Traits
//!
//! The service-client seam of the facade. Each trait mirrors the subset of
//! one storage service the facade calls into. Implementations relay service
//! failures as [`StorageError::Service`](crate::StorageError::Service) with
//! the original status code; the facade decides which statuses to absorb.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::Result;
use azstore_model::{BlobListing, EntityRecord, Filter, QueueMessage};

/// Largest page the table service returns for one query request
pub const MAX_QUERY_PAGE_SIZE: usize = 1000;

/// Stream of query result pages
pub type EntityPageStream = BoxStream<'static, Result<Vec<EntityRecord>>>;

// =============================================================================
// TABLES
// =============================================================================

/// One operation inside an entity group transaction
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionAction {
    /// Insert, or merge into the existing entity
    UpsertMerge(EntityRecord),
    /// Delete by key, regardless of etag
    Delete {
        partition_key: String,
        row_key: String,
    },
}

impl TransactionAction {
    pub fn partition_key(&self) -> &str {
        match self {
            Self::UpsertMerge(record) => &record.partition_key,
            Self::Delete { partition_key, .. } => partition_key,
        }
    }
}

/// Entity query parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    pub filter: Option<Filter>,
    /// Requested page size; capped at [`MAX_QUERY_PAGE_SIZE`]
    pub page_size: Option<usize>,
}

/// Table service client
#[async_trait]
pub trait TableBackend: Send + Sync {
    /// Create a table. Returns `false` if it already existed.
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool>;

    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Delete a table. Returns `false` if it did not exist.
    async fn delete_table_if_exists(&self, table: &str) -> Result<bool>;

    /// Insert or merge one entity
    async fn upsert_entity(&self, table: &str, entity: EntityRecord) -> Result<()>;

    /// Fetch one entity; a missing entity or table is a 404 service error
    async fn get_entity(&self, table: &str, partition_key: &str, row_key: &str)
    -> Result<EntityRecord>;

    /// Delete one entity; a missing entity is a 404 service error
    async fn delete_entity(&self, table: &str, partition_key: &str, row_key: &str) -> Result<()>;

    /// Submit an atomic transaction; all actions share one partition key
    async fn submit_transaction(&self, table: &str, actions: Vec<TransactionAction>) -> Result<()>;

    /// Run a query, yielding result pages in service order
    async fn query_entities(&self, table: &str, request: QueryRequest) -> Result<EntityPageStream>;
}

// =============================================================================
// BLOBS
// =============================================================================

/// Blob service client
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Create a container. Returns `false` if it already existed.
    async fn create_container_if_not_exists(&self, container: &str) -> Result<bool>;

    /// Delete a container. Returns `false` if it did not exist.
    async fn delete_container_if_exists(&self, container: &str) -> Result<bool>;

    async fn blob_exists(&self, container: &str, blob: &str) -> Result<bool>;

    /// Upload a block blob; with `overwrite == false` an existing blob is a
    /// 409 service error
    async fn upload_blob(
        &self,
        container: &str,
        blob: &str,
        data: Vec<u8>,
        overwrite: bool,
    ) -> Result<()>;

    async fn download_blob(&self, container: &str, blob: &str) -> Result<Vec<u8>>;

    async fn delete_blob(&self, container: &str, blob: &str) -> Result<()>;

    /// List blobs under `prefix`. Without a delimiter the listing is flat
    /// and `folders` stays empty.
    async fn list_blobs(
        &self,
        container: &str,
        prefix: Option<&str>,
        delimiter: Option<&str>,
    ) -> Result<BlobListing>;
}

// =============================================================================
// QUEUES
// =============================================================================

/// Queue service client
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Create a queue. Returns `false` if it already existed.
    async fn create_queue_if_not_exists(&self, queue: &str) -> Result<bool>;

    async fn queue_exists(&self, queue: &str) -> Result<bool>;

    /// Delete a queue. Returns `false` if it did not exist.
    async fn delete_queue_if_exists(&self, queue: &str) -> Result<bool>;

    async fn send_message(&self, queue: &str, body: &str) -> Result<QueueMessage>;

    async fn peek_messages(&self, queue: &str, max: usize) -> Result<Vec<QueueMessage>>;

    async fn receive_messages(
        &self,
        queue: &str,
        max: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>>;

    async fn delete_message(&self, queue: &str, message_id: &str, pop_receipt: &str) -> Result<()>;

    async fn clear_messages(&self, queue: &str) -> Result<()>;
}

/// A backend serving all three services
pub trait StorageBackend: TableBackend + BlobBackend + QueueBackend {}

impl<T: TableBackend + BlobBackend + QueueBackend> StorageBackend for T {}

