//! In-memory storage backend.
//!
//! Process-local stand-in for the storage service. It reproduces the status
//! codes and limits the facade relies on (404 for missing resources, 409 for
//! conflicting blob writes, transaction bounds, 1000-entity query pages,
//! partition/row key ordering, delimited blob listings, message visibility).

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::traits::{
    BlobBackend, EntityPageStream, MAX_QUERY_PAGE_SIZE, QueryRequest, QueueBackend, TableBackend,
    TransactionAction,
};
use crate::error::{Result, STATUS_BAD_REQUEST, STATUS_CONFLICT, STATUS_NOT_FOUND, StorageError};
use azstore_model::blob::folder_of;
use azstore_model::queue::{
    DEFAULT_MESSAGE_TTL_SECS, MAX_VISIBILITY_TIMEOUT_SECS, clamp_message_count,
};
use azstore_model::{BlobItem, BlobListing, EntityRecord, MAX_TRANSACTION_SIZE, QueueMessage};

type Table = BTreeMap<(String, String), EntityRecord>;
type Container = BTreeMap<String, StoredBlob>;
type Queue = VecDeque<StoredMessage>;

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Vec<u8>,
    last_modified: DateTime<Utc>,
    etag: String,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: String,
    pop_receipt: String,
    body: String,
    inserted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    visible_at: DateTime<Utc>,
    dequeue_count: u64,
}

impl StoredMessage {
    fn to_message(&self, with_receipt: bool) -> QueueMessage {
        QueueMessage {
            message_id: self.message_id.clone(),
            pop_receipt: with_receipt.then(|| self.pop_receipt.clone()),
            body: self.body.clone(),
            inserted_at: Some(self.inserted_at),
            expires_at: Some(self.expires_at),
            next_visible_at: Some(self.visible_at),
            dequeue_count: self.dequeue_count,
        }
    }
}

/// In-memory backend for tests and local runs
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    tables: RwLock<HashMap<String, Table>>,
    containers: RwLock<HashMap<String, Container>>,
    queues: RwLock<HashMap<String, Queue>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities currently stored in `table`
    pub async fn entity_count(&self, table: &str) -> usize {
        self.tables.read().await.get(table).map_or(0, BTreeMap::len)
    }
}

fn new_etag() -> String {
    format!("\"0x{}\"", Uuid::new_v4().simple())
}

fn stamp(record: &mut EntityRecord) {
    let now = Utc::now();
    record.timestamp = Some(now);
    record.etag = Some(format!(
        "W/\"datetime'{}'\"",
        now.format("%Y-%m-%dT%H%%3A%M%%3A%S.%fZ")
    ));
}

fn not_found(code: &str, message: String) -> StorageError {
    StorageError::service(STATUS_NOT_FOUND, code, message)
}

fn table_not_found(table: &str) -> StorageError {
    not_found("TableNotFound", format!("table '{table}' does not exist"))
}

fn container_not_found(container: &str) -> StorageError {
    not_found(
        "ContainerNotFound",
        format!("container '{container}' does not exist"),
    )
}

fn queue_not_found(queue: &str) -> StorageError {
    not_found("QueueNotFound", format!("queue '{queue}' does not exist"))
}

fn bad_request(code: &str, message: String) -> StorageError {
    StorageError::service(STATUS_BAD_REQUEST, code, message)
}

// =============================================================================
// TABLES
// =============================================================================

#[async_trait]
impl TableBackend for InMemoryBackend {
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.contains_key(table) {
            return Ok(false);
        }
        tables.insert(table.to_owned(), Table::new());
        Ok(true)
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.tables.read().await.contains_key(table))
    }

    async fn delete_table_if_exists(&self, table: &str) -> Result<bool> {
        Ok(self.tables.write().await.remove(table).is_some())
    }

    async fn upsert_entity(&self, table: &str, mut entity: EntityRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;

        let key = (entity.partition_key.clone(), entity.row_key.clone());
        match rows.get_mut(&key) {
            Some(existing) => {
                existing.merge_from(entity);
                stamp(existing);
            }
            None => {
                stamp(&mut entity);
                rows.insert(key, entity);
            }
        }
        Ok(())
    }

    async fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<EntityRecord> {
        let tables = self.tables.read().await;
        let rows = tables.get(table).ok_or_else(|| table_not_found(table))?;

        rows.get(&(partition_key.to_owned(), row_key.to_owned()))
            .cloned()
            .ok_or_else(|| {
                not_found(
                    "ResourceNotFound",
                    format!("entity ({partition_key}, {row_key}) not found in '{table}'"),
                )
            })
    }

    async fn delete_entity(&self, table: &str, partition_key: &str, row_key: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;

        rows.remove(&(partition_key.to_owned(), row_key.to_owned()))
            .map(|_| ())
            .ok_or_else(|| {
                not_found(
                    "ResourceNotFound",
                    format!("entity ({partition_key}, {row_key}) not found in '{table}'"),
                )
            })
    }

    async fn submit_transaction(&self, table: &str, actions: Vec<TransactionAction>) -> Result<()> {
        let Some(first) = actions.first() else {
            return Err(bad_request("InvalidInput", "transaction is empty".into()));
        };
        if actions.len() > MAX_TRANSACTION_SIZE {
            return Err(bad_request(
                "InvalidInput",
                format!(
                    "transaction has {} operations, limit is {MAX_TRANSACTION_SIZE}",
                    actions.len()
                ),
            ));
        }
        let partition_key = first.partition_key().to_owned();
        if actions.iter().any(|a| a.partition_key() != partition_key) {
            return Err(bad_request(
                "CommandsInBatchActOnDifferentPartitions",
                "all operations in a transaction must share one partition key".into(),
            ));
        }

        let mut seen = HashSet::new();
        for action in &actions {
            let row_key = match action {
                TransactionAction::UpsertMerge(record) => record.row_key.as_str(),
                TransactionAction::Delete { row_key, .. } => row_key.as_str(),
            };
            if !seen.insert(row_key) {
                return Err(bad_request(
                    "InvalidDuplicateRow",
                    format!("row key '{row_key}' appears more than once"),
                ));
            }
        }

        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;

        // A delete of a missing row fails the batch before any write.
        for action in &actions {
            if let TransactionAction::Delete {
                partition_key,
                row_key,
            } = action
            {
                if !rows.contains_key(&(partition_key.clone(), row_key.clone())) {
                    return Err(not_found(
                        "ResourceNotFound",
                        format!("entity ({partition_key}, {row_key}) not found in '{table}'"),
                    ));
                }
            }
        }

        let count = actions.len();
        for action in actions {
            match action {
                TransactionAction::UpsertMerge(mut record) => {
                    let key = (record.partition_key.clone(), record.row_key.clone());
                    match rows.get_mut(&key) {
                        Some(existing) => {
                            existing.merge_from(record);
                            stamp(existing);
                        }
                        None => {
                            stamp(&mut record);
                            rows.insert(key, record);
                        }
                    }
                }
                TransactionAction::Delete {
                    partition_key,
                    row_key,
                } => {
                    rows.remove(&(partition_key, row_key));
                }
            }
        }

        debug!(table, partition_key = %partition_key, operations = count, "Transaction applied in memory");
        Ok(())
    }

    async fn query_entities(&self, table: &str, request: QueryRequest) -> Result<EntityPageStream> {
        let tables = self.tables.read().await;
        let rows = tables.get(table).ok_or_else(|| table_not_found(table))?;

        let page_size = request
            .page_size
            .unwrap_or(MAX_QUERY_PAGE_SIZE)
            .clamp(1, MAX_QUERY_PAGE_SIZE);

        let matching: Vec<EntityRecord> = rows
            .values()
            .filter(|record| request.filter.as_ref().is_none_or(|f| f.matches(record)))
            .cloned()
            .collect();

        let pages: Vec<Result<Vec<EntityRecord>>> = matching
            .chunks(page_size)
            .map(|page| Ok(page.to_vec()))
            .collect();

        Ok(stream::iter(pages).boxed())
    }
}

// =============================================================================
// BLOBS
// =============================================================================

#[async_trait]
impl BlobBackend for InMemoryBackend {
    async fn create_container_if_not_exists(&self, container: &str) -> Result<bool> {
        let mut containers = self.containers.write().await;
        if containers.contains_key(container) {
            return Ok(false);
        }
        containers.insert(container.to_owned(), Container::new());
        Ok(true)
    }

    async fn delete_container_if_exists(&self, container: &str) -> Result<bool> {
        Ok(self.containers.write().await.remove(container).is_some())
    }

    async fn blob_exists(&self, container: &str, blob: &str) -> Result<bool> {
        Ok(self
            .containers
            .read()
            .await
            .get(container)
            .is_some_and(|blobs| blobs.contains_key(blob)))
    }

    async fn upload_blob(
        &self,
        container: &str,
        blob: &str,
        data: Vec<u8>,
        overwrite: bool,
    ) -> Result<()> {
        let mut containers = self.containers.write().await;
        let blobs = containers
            .get_mut(container)
            .ok_or_else(|| container_not_found(container))?;

        if !overwrite && blobs.contains_key(blob) {
            return Err(StorageError::service(
                STATUS_CONFLICT,
                "BlobAlreadyExists",
                format!("blob '{blob}' already exists in '{container}'"),
            ));
        }

        blobs.insert(
            blob.to_owned(),
            StoredBlob {
                data,
                last_modified: Utc::now(),
                etag: new_etag(),
            },
        );
        Ok(())
    }

    async fn download_blob(&self, container: &str, blob: &str) -> Result<Vec<u8>> {
        let containers = self.containers.read().await;
        let blobs = containers
            .get(container)
            .ok_or_else(|| container_not_found(container))?;

        blobs
            .get(blob)
            .map(|stored| stored.data.clone())
            .ok_or_else(|| not_found("BlobNotFound", format!("blob '{blob}' not found in '{container}'")))
    }

    async fn delete_blob(&self, container: &str, blob: &str) -> Result<()> {
        let mut containers = self.containers.write().await;
        let blobs = containers
            .get_mut(container)
            .ok_or_else(|| container_not_found(container))?;

        blobs
            .remove(blob)
            .map(|_| ())
            .ok_or_else(|| not_found("BlobNotFound", format!("blob '{blob}' not found in '{container}'")))
    }

    async fn list_blobs(
        &self,
        container: &str,
        prefix: Option<&str>,
        delimiter: Option<&str>,
    ) -> Result<BlobListing> {
        let containers = self.containers.read().await;
        let blobs = containers
            .get(container)
            .ok_or_else(|| container_not_found(container))?;

        let prefix = prefix.unwrap_or_default();
        let mut listing = BlobListing::default();
        let mut folders = BTreeSet::new();

        for (name, stored) in blobs.range(prefix.to_owned()..) {
            if !name.starts_with(prefix) {
                break;
            }
            if let Some(folder) = delimiter
                .filter(|d| !d.is_empty())
                .and_then(|d| folder_of(name, prefix, d))
            {
                folders.insert(folder);
                continue;
            }
            listing.blobs.push(BlobItem {
                name: name.clone(),
                content_length: stored.data.len() as u64,
                last_modified: Some(stored.last_modified),
                etag: Some(stored.etag.clone()),
                content_type: Some("application/octet-stream".to_owned()),
            });
        }

        listing.folders = folders.into_iter().collect();
        Ok(listing)
    }
}

// =============================================================================
// QUEUES
// =============================================================================

#[async_trait]
impl QueueBackend for InMemoryBackend {
    async fn create_queue_if_not_exists(&self, queue: &str) -> Result<bool> {
        let mut queues = self.queues.write().await;
        if queues.contains_key(queue) {
            return Ok(false);
        }
        queues.insert(queue.to_owned(), Queue::new());
        Ok(true)
    }

    async fn queue_exists(&self, queue: &str) -> Result<bool> {
        Ok(self.queues.read().await.contains_key(queue))
    }

    async fn delete_queue_if_exists(&self, queue: &str) -> Result<bool> {
        Ok(self.queues.write().await.remove(queue).is_some())
    }

    async fn send_message(&self, queue: &str, body: &str) -> Result<QueueMessage> {
        let mut queues = self.queues.write().await;
        let messages = queues.get_mut(queue).ok_or_else(|| queue_not_found(queue))?;

        let now = Utc::now();
        let stored = StoredMessage {
            message_id: Uuid::new_v4().to_string(),
            pop_receipt: Uuid::new_v4().to_string(),
            body: body.to_owned(),
            inserted_at: now,
            expires_at: now + chrono::Duration::seconds(DEFAULT_MESSAGE_TTL_SECS),
            visible_at: now,
            dequeue_count: 0,
        };
        let message = stored.to_message(true);
        messages.push_back(stored);
        Ok(message)
    }

    async fn peek_messages(&self, queue: &str, max: usize) -> Result<Vec<QueueMessage>> {
        let mut queues = self.queues.write().await;
        let messages = queues.get_mut(queue).ok_or_else(|| queue_not_found(queue))?;

        let now = Utc::now();
        messages.retain(|m| m.expires_at > now);

        Ok(messages
            .iter()
            .filter(|m| m.visible_at <= now)
            .take(clamp_message_count(max))
            .map(|m| m.to_message(false))
            .collect())
    }

    async fn receive_messages(
        &self,
        queue: &str,
        max: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>> {
        if visibility_timeout > Duration::from_secs(MAX_VISIBILITY_TIMEOUT_SECS) {
            return Err(bad_request(
                "OutOfRangeQueryParameterValue",
                format!(
                    "visibility timeout of {}s exceeds {MAX_VISIBILITY_TIMEOUT_SECS}s",
                    visibility_timeout.as_secs()
                ),
            ));
        }
        let visibility = chrono::Duration::from_std(visibility_timeout)
            .map_err(|e| bad_request("InvalidQueryParameterValue", e.to_string()))?;

        let mut queues = self.queues.write().await;
        let messages = queues.get_mut(queue).ok_or_else(|| queue_not_found(queue))?;

        let now = Utc::now();
        messages.retain(|m| m.expires_at > now);

        let mut received = Vec::new();
        for stored in messages
            .iter_mut()
            .filter(|m| m.visible_at <= now)
            .take(clamp_message_count(max))
        {
            stored.dequeue_count += 1;
            stored.pop_receipt = Uuid::new_v4().to_string();
            stored.visible_at = now + visibility;
            received.push(stored.to_message(true));
        }
        Ok(received)
    }

    async fn delete_message(&self, queue: &str, message_id: &str, pop_receipt: &str) -> Result<()> {
        let mut queues = self.queues.write().await;
        let messages = queues.get_mut(queue).ok_or_else(|| queue_not_found(queue))?;

        let idx = messages
            .iter()
            .position(|m| m.message_id == message_id)
            .ok_or_else(|| not_found("MessageNotFound", format!("message '{message_id}' not found")))?;

        if messages[idx].pop_receipt != pop_receipt {
            return Err(bad_request(
                "PopReceiptMismatch",
                format!("pop receipt does not match message '{message_id}'"),
            ));
        }

        messages.remove(idx);
        Ok(())
    }

    async fn clear_messages(&self, queue: &str) -> Result<()> {
        let mut queues = self.queues.write().await;
        queues
            .get_mut(queue)
            .ok_or_else(|| queue_not_found(queue))?
            .clear();
        Ok(())
    }
}
