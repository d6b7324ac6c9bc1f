//! # Storage Entry Point
//!
//! [`AzureStorage`] bundles the table, blob and queue facades over one
//! shared backend.

use std::sync::Arc;

use tracing::info;

use crate::backend::{InMemoryBackend, StorageBackend};
use crate::blobs::EasyBlob;
use crate::config::{BackendKind, DEFAULT_PARALLELISM, StorageConfig};
use crate::error::Result;
use crate::queues::EasyQueue;
use crate::tables::EasyTable;

/// Options shared by every facade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageOptions {
    /// Prepended to every table name
    pub table_prefix: String,
    /// Concurrency limit for parallel operations
    pub parallelism: usize,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

impl StorageOptions {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            table_prefix: prefix.into(),
            ..Self::default()
        }
    }
}

impl From<&StorageConfig> for StorageOptions {
    fn from(config: &StorageConfig) -> Self {
        Self {
            table_prefix: config.table_prefix.clone(),
            parallelism: config.parallelism,
        }
    }
}

/// Tables, blobs and queues of one storage account
#[derive(Clone)]
pub struct AzureStorage {
    tables: EasyTable,
    blobs: EasyBlob,
    queues: EasyQueue,
}

impl AzureStorage {
    /// Build the facades over any backend implementing all three services.
    pub fn with_backend<B: StorageBackend + 'static>(backend: Arc<B>, options: StorageOptions) -> Self {
        let parallelism = options.parallelism.max(1);
        Self {
            tables: EasyTable::new(backend.clone(), options.table_prefix, parallelism),
            blobs: EasyBlob::new(backend.clone(), parallelism),
            queues: EasyQueue::new(backend),
        }
    }

    /// Process-local storage, mainly for tests and demos.
    pub fn in_memory(table_prefix: impl Into<String>) -> Self {
        Self::with_backend(
            Arc::new(InMemoryBackend::new()),
            StorageOptions::with_prefix(table_prefix),
        )
    }

    /// Connect to a storage account or the development emulator.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string cannot be parsed or the
    /// clients cannot be built.
    #[cfg(feature = "azure")]
    pub fn from_connection_string(connection_string: &str, table_prefix: impl Into<String>) -> Result<Self> {
        let backend = crate::backend::AzureBackend::from_connection_string(connection_string)?;
        Ok(Self::with_backend(
            Arc::new(backend),
            StorageOptions::with_prefix(table_prefix),
        ))
    }

    /// Build storage from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BackendUnavailable` when the Azure backend is
    /// requested but the crate was built without the `azure` feature, or any
    /// connection error from the backend.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let options = StorageOptions::from(config);
        info!(
            backend = %config.backend,
            table_prefix = %options.table_prefix,
            parallelism = options.parallelism,
            "Initializing storage"
        );

        match config.backend {
            BackendKind::Memory => Ok(Self::with_backend(Arc::new(InMemoryBackend::new()), options)),
            BackendKind::Azure => Self::azure_from_config(config, options),
        }
    }

    #[cfg(feature = "azure")]
    fn azure_from_config(config: &StorageConfig, options: StorageOptions) -> Result<Self> {
        let backend = crate::backend::AzureBackend::from_connection_string(&config.connection_string)?;
        Ok(Self::with_backend(Arc::new(backend), options))
    }

    #[cfg(not(feature = "azure"))]
    #[allow(clippy::needless_pass_by_value, clippy::unnecessary_wraps)]
    fn azure_from_config(_config: &StorageConfig, _options: StorageOptions) -> Result<Self> {
        Err(crate::error::StorageError::BackendUnavailable(
            "azstore was built without the `azure` feature".to_string(),
        ))
    }

    pub const fn tables(&self) -> &EasyTable {
        &self.tables
    }

    pub const fn blobs(&self) -> &EasyBlob {
        &self.blobs
    }

    pub const fn queues(&self) -> &EasyQueue {
        &self.queues
    }
}
