//! # Storage Configuration
//!
//! Environment-based configuration for the storage facade.

use std::env;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StorageError};

pub const DEFAULT_CONNECTION_STRING: &str = "UseDevelopmentStorage=true";
pub const DEFAULT_PARALLELISM: usize = 16;

/// Which backend serves the facade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// Process-local storage, nothing persists
    #[default]
    Memory,
    /// Azure Storage account or emulator (feature `azure`)
    Azure,
}

impl FromStr for BackendKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "azure" => Ok(Self::Azure),
            other => Err(StorageError::Config(format!(
                "unknown storage backend '{other}', expected 'memory' or 'azure'"
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Azure => "azure",
        })
    }
}

/// Storage facade configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Account connection string
    pub connection_string: String,

    pub backend: BackendKind,

    /// Prepended to every table name
    pub table_prefix: String,

    /// Concurrency limit for parallel operations
    pub parallelism: usize,

    /// Fallback log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            connection_string: DEFAULT_CONNECTION_STRING.to_string(),
            backend: BackendKind::Memory,
            table_prefix: String::new(),
            parallelism: DEFAULT_PARALLELISM,
            log_level: "info".to_string(),
        }
    }
}

impl StorageConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Config` for an unknown backend or a
    /// parallelism that is not a positive integer.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Same as [`StorageConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let parallelism = match lookup("STORAGE_PARALLELISM") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(StorageError::Config(format!(
                        "STORAGE_PARALLELISM must be a positive integer, got '{raw}'"
                    )));
                }
            },
            None => defaults.parallelism,
        };

        Ok(Self {
            connection_string: lookup("AZURE_STORAGE_CONNECTION_STRING")
                .unwrap_or(defaults.connection_string),

            backend: lookup("STORAGE_BACKEND")
                .map(|v| v.parse::<BackendKind>())
                .transpose()?
                .unwrap_or(defaults.backend),

            table_prefix: lookup("STORAGE_TABLE_PREFIX").unwrap_or(defaults.table_prefix),

            parallelism,

            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}
