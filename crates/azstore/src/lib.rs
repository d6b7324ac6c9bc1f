//! # azstore
//!
//! Convenience facade over the three Azure Storage data services.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        AzureStorage                          │
//! │         tables() -> EasyTable   blobs() -> EasyBlob          │
//! │                   queues() -> EasyQueue                      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Backend Traits                          │
//! │          (TableBackend, BlobBackend, QueueBackend)           │
//! └─────────────────────────────────────────────────────────────┘
//!                    │                   │
//!                    ▼                   ▼
//! ┌─────────────────────────┐   ┌──────────────────────────────┐
//! │    InMemoryBackend      │   │        AzureBackend          │
//! │   (tests, local runs)   │   │   (Azure SDK, emulator)      │
//! └─────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - `azure`: Enable the Azure SDK backend (off by default)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use azstore::{AzureStorage, Filter};
//!
//! let storage = AzureStorage::in_memory("dev");
//! storage.tables().create_table_if_not_exist::<Person>().await?;
//! storage.tables().save_multi_batch(&people).await?;
//!
//! let smiths: Vec<Person> = storage
//!     .tables()
//!     .run_query(Some(Filter::partition_key_eq("Smith")), Some(50))
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod blobs;
pub mod config;
pub mod error;
pub mod queues;
pub mod storage;
pub mod tables;

// Re-export commonly used types
pub use backend::{BlobBackend, InMemoryBackend, QueueBackend, StorageBackend, TableBackend};
pub use blobs::EasyBlob;
pub use config::{BackendKind, StorageConfig};
pub use error::{Result, StorageError};
pub use queues::EasyQueue;
pub use storage::{AzureStorage, StorageOptions};
pub use tables::EasyTable;

#[cfg(feature = "azure")]
pub use backend::AzureBackend;

pub use azstore_model::{
    BlobItem, BlobListing, ConnectionString, EntityKey, EntityRecord, Filter, FilterValue,
    QueueMessage, TableEntity,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
