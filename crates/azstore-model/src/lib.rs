//! # azstore Model
//!
//! Types shared by the storage facade and its backends: table entities and
//! their untyped records, partition-bounded batch planning, query filters,
//! connection strings, resource naming rules, and blob/queue value types.
//!
//! Nothing in this crate performs I/O.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod blob;
pub mod connection;
pub mod entity;
pub mod error;
pub mod filter;
pub mod naming;
pub mod queue;

pub use batch::{MAX_TRANSACTION_SIZE, PartitionChunk, plan_batches};
pub use blob::{BlobItem, BlobListing, FOLDER_DELIMITER};
pub use connection::{ConnectionString, Credentials, StorageService};
pub use entity::{EntityKey, EntityRecord, TableEntity};
pub use error::{ModelError, Result};
pub use filter::{CompareOp, Filter, FilterValue};
pub use naming::{table_name_for, validate_container_name, validate_queue_name, validate_table_name};
pub use queue::{MAX_MESSAGES_PER_REQUEST, QueueMessage};
