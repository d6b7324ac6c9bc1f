//! # Backend Module
//!
//! Storage service clients behind the facade.

pub mod memory;
pub mod traits;

#[cfg(feature = "azure")]
pub mod azure_impl;

pub use memory::InMemoryBackend;
pub use traits::{
    BlobBackend, EntityPageStream, MAX_QUERY_PAGE_SIZE, QueryRequest, QueueBackend,
    StorageBackend, TableBackend, TransactionAction,
};

#[cfg(feature = "azure")]
pub use azure_impl::AzureBackend;
