//! # Table Facade
//!
//! Typed CRUD, transactions and queries over the table service. The table
//! backing an entity type is `prefix + T::table_name()`, lowercased.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

use crate::backend::{MAX_QUERY_PAGE_SIZE, QueryRequest, TableBackend, TransactionAction};
use crate::error::{Result, StorageError};
use azstore_model::entity::short_type_name;
use azstore_model::{
    EntityKey, EntityRecord, Filter, MAX_TRANSACTION_SIZE, ModelError, TableEntity,
    plan_batches, table_name_for,
};

/// Table operations for any [`TableEntity`] type
#[derive(Clone)]
pub struct EasyTable {
    backend: Arc<dyn TableBackend>,
    prefix: String,
    parallelism: usize,
}

impl EasyTable {
    pub fn new(backend: Arc<dyn TableBackend>, prefix: impl Into<String>, parallelism: usize) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            parallelism: parallelism.max(1),
        }
    }

    /// Physical table name used for `T`
    ///
    /// # Errors
    ///
    /// Returns an error if the prefixed name breaks the table naming rules.
    pub fn table_name<T: TableEntity>(&self) -> Result<String> {
        Ok(table_name_for::<T>(&self.prefix)?)
    }

    // =========================================================================
    // TABLE LIFECYCLE
    // =========================================================================

    /// # Errors
    ///
    /// Returns an error if the name is invalid or the service call fails.
    pub async fn create_table_if_not_exist<T: TableEntity>(&self) -> Result<()> {
        let table = self.table_name::<T>()?;
        if self.backend.create_table_if_not_exists(&table).await? {
            info!(table = %table, "Table created");
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the name is invalid or the service call fails.
    pub async fn table_exists<T: TableEntity>(&self) -> Result<bool> {
        let table = self.table_name::<T>()?;
        self.backend.table_exists(&table).await
    }

    /// Drop the table for `T`. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the service call fails.
    pub async fn delete_table<T: TableEntity>(&self) -> Result<bool> {
        let table = self.table_name::<T>()?;
        let deleted = self.backend.delete_table_if_exists(&table).await?;
        if deleted {
            info!(table = %table, "Table deleted");
        }
        Ok(deleted)
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Insert or merge one entity.
    ///
    /// # Errors
    ///
    /// Propagates serialization and service errors.
    pub async fn save<T: TableEntity + Serialize>(&self, entity: &T) -> Result<()> {
        let table = self.table_name::<T>()?;
        let record = EntityRecord::from_entity(entity)?;
        debug!(
            table = %table,
            partition_key = %record.partition_key,
            row_key = %record.row_key,
            "Upserting entity"
        );
        self.backend.upsert_entity(&table, record).await
    }

    /// Upsert `entities` in one atomic transaction.
    ///
    /// All entities must share a partition key and there may be at most
    /// [`MAX_TRANSACTION_SIZE`] of them. An empty slice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidBatch` if the batch breaks the
    /// transaction rules, otherwise propagates service errors.
    pub async fn save_batch_transaction<T: TableEntity + Serialize>(&self, entities: &[T]) -> Result<()> {
        let actions = upsert_actions(entities.iter())?;
        self.submit::<T>(actions).await
    }

    /// Upsert any number of entities, one transaction per partition chunk.
    ///
    /// Returns the number of transactions submitted. Transactions already
    /// committed stay committed if a later one fails.
    ///
    /// # Errors
    ///
    /// Propagates the first serialization or service error.
    pub async fn save_multi_batch<T: TableEntity + Serialize>(&self, entities: &[T]) -> Result<usize> {
        let table = self.table_name::<T>()?;
        let mut batches = 0;

        for chunk in plan_batches(entities, MAX_TRANSACTION_SIZE) {
            let actions = upsert_actions(chunk.items.iter().copied())?;
            debug!(
                table = %table,
                partition_key = %chunk.partition_key,
                operations = actions.len(),
                "Submitting upsert transaction"
            );
            self.backend.submit_transaction(&table, actions).await?;
            batches += 1;
        }

        info!(table = %table, entities = entities.len(), batches, "Multi-batch save complete");
        Ok(batches)
    }

    // =========================================================================
    // DELETES
    // =========================================================================

    /// Delete one entity by its keys.
    ///
    /// A missing entity is ignored unless `throw_if_not_found` is set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for a missing entity when
    /// `throw_if_not_found` is set; any other service error propagates.
    pub async fn delete<T: TableEntity>(&self, entity: &T, throw_if_not_found: bool) -> Result<()> {
        let table = self.table_name::<T>()?;
        let pk = entity.partition_key();
        let rk = entity.row_key();

        match self.backend.delete_entity(&table, pk, rk).await {
            Ok(()) => {
                debug!(table = %table, partition_key = %pk, row_key = %rk, "Entity deleted");
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                if throw_if_not_found {
                    Err(StorageError::NotFound {
                        entity_type: short_type_name::<T>().to_owned(),
                        key: entity.key().to_string(),
                    })
                } else {
                    warn!(table = %table, partition_key = %pk, row_key = %rk, "Delete of missing entity ignored");
                    Ok(())
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Delete `entities` in one atomic transaction. Only the keys are sent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidBatch` if the batch breaks the
    /// transaction rules, otherwise propagates service errors (including a
    /// 404 when any entity is missing).
    pub async fn delete_batch_transaction<T: TableEntity>(&self, entities: &[T]) -> Result<()> {
        let actions = entities.iter().map(delete_action).collect();
        self.submit::<T>(actions).await
    }

    /// Delete any number of entities, one transaction per partition chunk.
    /// Returns the number of transactions submitted.
    ///
    /// # Errors
    ///
    /// Propagates the first service error.
    pub async fn delete_multi_batch<T: TableEntity>(&self, entities: &[T]) -> Result<usize> {
        let table = self.table_name::<T>()?;
        let mut batches = 0;

        for chunk in plan_batches(entities, MAX_TRANSACTION_SIZE) {
            let actions: Vec<TransactionAction> =
                chunk.items.iter().copied().map(delete_action).collect();
            debug!(
                table = %table,
                partition_key = %chunk.partition_key,
                operations = actions.len(),
                "Submitting delete transaction"
            );
            self.backend.submit_transaction(&table, actions).await?;
            batches += 1;
        }

        info!(table = %table, entities = entities.len(), batches, "Multi-batch delete complete");
        Ok(batches)
    }

    async fn submit<T: TableEntity>(&self, actions: Vec<TransactionAction>) -> Result<()> {
        if actions.is_empty() {
            return Ok(());
        }
        check_transaction(&actions)?;

        let table = self.table_name::<T>()?;
        debug!(table = %table, operations = actions.len(), "Submitting transaction");
        self.backend.submit_transaction(&table, actions).await
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Fetch one entity; `None` when it (or its table) does not exist.
    ///
    /// # Errors
    ///
    /// Propagates deserialization errors and service errors other than 404.
    pub async fn retrieve<T: TableEntity + DeserializeOwned>(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<T>> {
        let table = self.table_name::<T>()?;

        match self.backend.get_entity(&table, partition_key, row_key).await {
            Ok(record) => Ok(Some(record.into_entity()?)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Fetch many entities concurrently.
    ///
    /// Duplicate keys are fetched once, missing entities are skipped and the
    /// result order is unspecified.
    ///
    /// # Errors
    ///
    /// Propagates the first non-404 error.
    pub async fn retrieve_parallel<T>(&self, keys: &[EntityKey]) -> Result<Vec<T>>
    where
        T: TableEntity + DeserializeOwned + Send,
    {
        let mut unique = keys.to_vec();
        unique.sort();
        unique.dedup();

        let found: Vec<Option<T>> = stream::iter(unique)
            .map(|key| async move { self.retrieve::<T>(&key.partition_key, &key.row_key).await })
            .buffer_unordered(self.parallelism)
            .try_collect()
            .await?;

        Ok(found.into_iter().flatten().collect())
    }

    /// Run a query against the table for `T`.
    ///
    /// Without a filter every entity is returned. When `top_n` is below the
    /// service page size it is used as the page size; paging stops once
    /// `top_n` entities have been collected.
    ///
    /// # Errors
    ///
    /// Propagates deserialization and service errors.
    pub async fn run_query<T: TableEntity + DeserializeOwned>(
        &self,
        filter: Option<Filter>,
        top_n: Option<usize>,
    ) -> Result<Vec<T>> {
        if top_n == Some(0) {
            return Ok(Vec::new());
        }

        let table = self.table_name::<T>()?;
        let request = QueryRequest {
            filter,
            page_size: top_n.filter(|n| *n < MAX_QUERY_PAGE_SIZE),
        };
        debug!(
            table = %table,
            filter = ?request.filter.as_ref().map(Filter::to_odata),
            top_n = ?top_n,
            "Running query"
        );

        let mut pages = self.backend.query_entities(&table, request).await?;
        let mut output = Vec::new();

        while let Some(page) = pages.next().await {
            let remaining = top_n.map_or(usize::MAX, |n| n - output.len());
            for record in page?.into_iter().take(remaining) {
                output.push(record.into_entity::<T>()?);
            }
            if top_n.is_some_and(|n| output.len() >= n) {
                break;
            }
        }

        Ok(output)
    }

    /// First entity of the table, if any.
    ///
    /// # Errors
    ///
    /// Propagates deserialization and service errors.
    pub async fn first<T: TableEntity + DeserializeOwned>(&self) -> Result<Option<T>> {
        Ok(self.run_query::<T>(None, Some(1)).await?.into_iter().next())
    }
}

fn upsert_actions<'a, T, I>(entities: I) -> std::result::Result<Vec<TransactionAction>, ModelError>
where
    T: TableEntity + Serialize + 'a,
    I: Iterator<Item = &'a T>,
{
    entities
        .map(|e| EntityRecord::from_entity(e).map(TransactionAction::UpsertMerge))
        .collect()
}

fn delete_action<T: TableEntity>(entity: &T) -> TransactionAction {
    TransactionAction::Delete {
        partition_key: entity.partition_key().to_owned(),
        row_key: entity.row_key().to_owned(),
    }
}

fn check_transaction(actions: &[TransactionAction]) -> Result<()> {
    if actions.len() > MAX_TRANSACTION_SIZE {
        return Err(StorageError::InvalidBatch(format!(
            "{} operations exceed the transaction limit of {MAX_TRANSACTION_SIZE}",
            actions.len()
        )));
    }
    if let Some(first) = actions.first() {
        let pk = first.partition_key();
        if actions.iter().any(|a| a.partition_key() != pk) {
            return Err(StorageError::InvalidBatch(
                "all entities in a transaction must share one partition key".to_owned(),
            ));
        }
    }
    Ok(())
}
