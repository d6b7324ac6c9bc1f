//! Azure Storage backend built on the official SDK crates.

use std::time::Duration;

use async_trait::async_trait;
use azure_core::request_options::{IfMatchCondition, NumberOfMessages, Top};
use azure_data_tables::prelude::{Filter as TableFilter, TableServiceClient, TableServiceClientBuilder};
use azure_storage::{CloudLocation, StorageCredentials};
use azure_storage_blobs::prelude::{BlobServiceClient, ClientBuilder};
use azure_storage_queues::{PopReceipt, QueueServiceClient, QueueServiceClientBuilder};
use chrono::{DateTime, Utc};
use futures_util::stream::StreamExt;
use serde_json::{Map, Value};
use tracing::debug;

use super::traits::{
    BlobBackend, EntityPageStream, MAX_QUERY_PAGE_SIZE, QueryRequest, QueueBackend, TableBackend,
    TransactionAction,
};
use crate::error::{Result, StorageError};
use azstore_model::queue::clamp_message_count;
use azstore_model::{
    BlobItem, BlobListing, ConnectionString, Credentials, EntityRecord, QueueMessage,
    StorageService,
};

type WireEntity = Map<String, Value>;

/// Backend that talks to a real storage account (or the emulator)
pub struct AzureBackend {
    tables: TableServiceClient,
    blobs: BlobServiceClient,
    queues: QueueServiceClient,
}

impl AzureBackend {
    /// Build the three service clients for a parsed connection string.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Config` if the credentials are rejected by the SDK.
    pub fn new(connection: &ConnectionString) -> Result<Self> {
        let credentials = storage_credentials(connection)?;
        let account = connection.account_name.clone();
        let location = |service| CloudLocation::Custom {
            account: account.clone(),
            uri: connection.endpoint(service),
        };

        let tables = TableServiceClientBuilder::new(account.clone(), credentials.clone())
            .cloud_location(location(StorageService::Table))
            .build();
        let blobs =
            ClientBuilder::with_location(location(StorageService::Blob), credentials.clone())
                .blob_service_client();
        let queues = QueueServiceClientBuilder::new(account.clone(), credentials)
            .cloud_location(location(StorageService::Queue))
            .build();

        debug!(
            account = %connection.account_name,
            development = connection.development_storage,
            "Azure storage clients created"
        );

        Ok(Self {
            tables,
            blobs,
            queues,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the connection string cannot be parsed.
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let connection: ConnectionString = connection_string.parse()?;
        Self::new(&connection)
    }
}

fn storage_credentials(connection: &ConnectionString) -> Result<StorageCredentials> {
    match &connection.credentials {
        Credentials::AccountKey(key) => Ok(StorageCredentials::access_key(
            connection.account_name.clone(),
            key.clone(),
        )),
        Credentials::SasToken(token) => StorageCredentials::sas_token(token.clone())
            .map_err(|e| StorageError::Config(format!("invalid SAS token: {e}"))),
    }
}

fn to_chrono(ts: time::OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.unix_timestamp(), ts.nanosecond())
}

/// Map a 409 to `Ok(false)`, used by the create-if-not-exists calls
fn created(result: azure_core::Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) => {
            let err = StorageError::from(e);
            if err.is_conflict() { Ok(false) } else { Err(err) }
        }
    }
}

/// Map a 404 to `Ok(false)`, used by the delete-if-exists calls
fn deleted(result: azure_core::Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) => {
            let err = StorageError::from(e);
            if err.is_not_found() { Ok(false) } else { Err(err) }
        }
    }
}

// =============================================================================
// TABLES
// =============================================================================

#[async_trait]
impl TableBackend for AzureBackend {
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool> {
        let result = self.tables.table_client(table).create().await.map(|_| ());
        created(result)
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let mut pages = self
            .tables
            .table_client(table)
            .query()
            .top(Top::new(1))
            .into_stream::<WireEntity>();

        match pages.next().await {
            None | Some(Ok(_)) => Ok(true),
            Some(Err(e)) => {
                let err = StorageError::from(e);
                if err.is_not_found() { Ok(false) } else { Err(err) }
            }
        }
    }

    async fn delete_table_if_exists(&self, table: &str) -> Result<bool> {
        let result = self.tables.table_client(table).delete().await.map(|_| ());
        deleted(result)
    }

    async fn upsert_entity(&self, table: &str, entity: EntityRecord) -> Result<()> {
        self.tables
            .table_client(table)
            .partition_key_client(entity.partition_key.clone())
            .entity_client(entity.row_key.clone())
            .insert_or_merge(entity.to_wire())?
            .await?;
        Ok(())
    }

    async fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<EntityRecord> {
        let response = self
            .tables
            .table_client(table)
            .partition_key_client(partition_key)
            .entity_client(row_key)
            .get::<WireEntity>()
            .await?;
        Ok(EntityRecord::from_wire(response.entity)?)
    }

    async fn delete_entity(&self, table: &str, partition_key: &str, row_key: &str) -> Result<()> {
        self.tables
            .table_client(table)
            .partition_key_client(partition_key)
            .entity_client(row_key)
            .delete()
            .await?;
        Ok(())
    }

    async fn submit_transaction(&self, table: &str, actions: Vec<TransactionAction>) -> Result<()> {
        let Some(partition_key) = actions.first().map(|a| a.partition_key().to_owned()) else {
            return Ok(());
        };

        let mut transaction = self
            .tables
            .table_client(table)
            .partition_key_client(partition_key)
            .transaction();

        for action in actions {
            transaction = match action {
                TransactionAction::UpsertMerge(record) => {
                    transaction.insert_or_merge(record.row_key.clone(), record.to_wire())?
                }
                TransactionAction::Delete { row_key, .. } => transaction.delete(row_key)?,
            };
        }

        transaction.await?;
        Ok(())
    }

    async fn query_entities(&self, table: &str, request: QueryRequest) -> Result<EntityPageStream> {
        let mut query = self.tables.table_client(table).query();
        if let Some(filter) = &request.filter {
            query = query.filter(TableFilter::new(filter.to_odata()));
        }
        if let Some(size) = request.page_size {
            let size = size.clamp(1, MAX_QUERY_PAGE_SIZE);
            query = query.top(Top::new(u32::try_from(size).unwrap_or(1000)));
        }

        let pages = query.into_stream::<WireEntity>().map(|page| {
            page?
                .entities
                .into_iter()
                .map(|wire| EntityRecord::from_wire(wire).map_err(StorageError::from))
                .collect::<Result<Vec<_>>>()
        });

        Ok(pages.boxed())
    }
}

// =============================================================================
// BLOBS
// =============================================================================

#[async_trait]
impl BlobBackend for AzureBackend {
    async fn create_container_if_not_exists(&self, container: &str) -> Result<bool> {
        let result = self.blobs.container_client(container).create().await.map(|_| ());
        created(result)
    }

    async fn delete_container_if_exists(&self, container: &str) -> Result<bool> {
        let result = self.blobs.container_client(container).delete().await.map(|_| ());
        deleted(result)
    }

    async fn blob_exists(&self, container: &str, blob: &str) -> Result<bool> {
        Ok(self
            .blobs
            .container_client(container)
            .blob_client(blob)
            .exists()
            .await?)
    }

    async fn upload_blob(
        &self,
        container: &str,
        blob: &str,
        data: Vec<u8>,
        overwrite: bool,
    ) -> Result<()> {
        let client = self.blobs.container_client(container).blob_client(blob);
        let mut upload = client
            .put_block_blob(data)
            .content_type("application/octet-stream");
        if !overwrite {
            upload = upload.if_match(IfMatchCondition::NotMatch("*".to_owned()));
        }
        upload.await?;
        Ok(())
    }

    async fn download_blob(&self, container: &str, blob: &str) -> Result<Vec<u8>> {
        Ok(self
            .blobs
            .container_client(container)
            .blob_client(blob)
            .get_content()
            .await?)
    }

    async fn delete_blob(&self, container: &str, blob: &str) -> Result<()> {
        self.blobs
            .container_client(container)
            .blob_client(blob)
            .delete()
            .await?;
        Ok(())
    }

    async fn list_blobs(
        &self,
        container: &str,
        prefix: Option<&str>,
        delimiter: Option<&str>,
    ) -> Result<BlobListing> {
        let mut builder = self.blobs.container_client(container).list_blobs();
        if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
            builder = builder.prefix(prefix.to_owned());
        }
        if let Some(delimiter) = delimiter {
            builder = builder.delimiter(delimiter.to_owned());
        }

        let mut listing = BlobListing::default();
        let mut pages = builder.into_stream();
        while let Some(page) = pages.next().await {
            let page = page?;
            listing
                .folders
                .extend(page.blobs.prefixes().map(|p| p.name.clone()));
            listing.blobs.extend(page.blobs.blobs().map(|b| BlobItem {
                name: b.name.clone(),
                content_length: b.properties.content_length,
                last_modified: to_chrono(b.properties.last_modified),
                etag: Some(b.properties.etag.to_string()),
                content_type: Some(b.properties.content_type.clone()),
            }));
        }

        Ok(listing)
    }
}

// =============================================================================
// QUEUES
// =============================================================================

fn number_of_messages(max: usize) -> NumberOfMessages {
    NumberOfMessages::new(u8::try_from(clamp_message_count(max)).unwrap_or(1))
}

#[async_trait]
impl QueueBackend for AzureBackend {
    async fn create_queue_if_not_exists(&self, queue: &str) -> Result<bool> {
        let result = self.queues.queue_client(queue).create().await.map(|_| ());
        created(result)
    }

    async fn queue_exists(&self, queue: &str) -> Result<bool> {
        match self.queues.queue_client(queue).get_metadata().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = StorageError::from(e);
                if err.is_not_found() { Ok(false) } else { Err(err) }
            }
        }
    }

    async fn delete_queue_if_exists(&self, queue: &str) -> Result<bool> {
        let result = self.queues.queue_client(queue).delete().await.map(|_| ());
        deleted(result)
    }

    async fn send_message(&self, queue: &str, body: &str) -> Result<QueueMessage> {
        let response = self
            .queues
            .queue_client(queue)
            .put_message(body.to_owned())
            .await?;
        let sent = response.queue_message;

        Ok(QueueMessage {
            message_id: sent.message_id,
            pop_receipt: Some(sent.pop_receipt),
            body: body.to_owned(),
            inserted_at: to_chrono(sent.insertion_time),
            expires_at: to_chrono(sent.expiration_time),
            next_visible_at: to_chrono(sent.time_next_visible),
            dequeue_count: 0,
        })
    }

    async fn peek_messages(&self, queue: &str, max: usize) -> Result<Vec<QueueMessage>> {
        let response = self
            .queues
            .queue_client(queue)
            .peek_messages()
            .number_of_messages(number_of_messages(max))
            .await?;

        Ok(response
            .messages
            .into_iter()
            .map(|m| QueueMessage {
                message_id: m.message_id,
                pop_receipt: None,
                body: m.message_text,
                inserted_at: to_chrono(m.insertion_time),
                expires_at: to_chrono(m.expiration_time),
                next_visible_at: None,
                dequeue_count: m.dequeue_count,
            })
            .collect())
    }

    async fn receive_messages(
        &self,
        queue: &str,
        max: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>> {
        let response = self
            .queues
            .queue_client(queue)
            .get_messages()
            .number_of_messages(number_of_messages(max))
            .visibility_timeout(visibility_timeout)
            .await?;

        Ok(response
            .messages
            .into_iter()
            .map(|m| QueueMessage {
                message_id: m.message_id,
                pop_receipt: Some(m.pop_receipt),
                body: m.message_text,
                inserted_at: to_chrono(m.insertion_time),
                expires_at: to_chrono(m.expiration_time),
                next_visible_at: to_chrono(m.time_next_visible),
                dequeue_count: m.dequeue_count,
            })
            .collect())
    }

    async fn delete_message(&self, queue: &str, message_id: &str, pop_receipt: &str) -> Result<()> {
        self.queues
            .queue_client(queue)
            .pop_receipt_client(PopReceipt::new(message_id, pop_receipt))
            .delete()
            .await?;
        Ok(())
    }

    async fn clear_messages(&self, queue: &str) -> Result<()> {
        self.queues.queue_client(queue).clear_messages().await?;
        Ok(())
    }
}
