//! Storage facade error types

use thiserror::Error;

use azstore_model::ModelError;

pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_CONFLICT: u16 = 409;
pub const STATUS_BAD_REQUEST: u16 = 400;

/// Storage facade errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failure reported by the storage service, status code preserved
    #[error("Storage service error ({status} {code}): {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Entity not found: {entity_type} with key {key}")]
    NotFound { entity_type: String, key: String },

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl StorageError {
    pub fn service(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Service status code, when the error came from the service
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. }) || self.status() == Some(STATUS_NOT_FOUND)
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(STATUS_CONFLICT)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "azure")]
impl From<azure_core::Error> for StorageError {
    fn from(err: azure_core::Error) -> Self {
        match err.as_http_error() {
            Some(http) => Self::Service {
                status: u16::from(http.status()),
                code: http.error_code().unwrap_or_default().to_string(),
                message: err.to_string(),
            },
            None => Self::BackendUnavailable(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(StorageError::service(404, "ResourceNotFound", "gone").is_not_found());
        assert!(
            StorageError::NotFound {
                entity_type: "Person".into(),
                key: "(A, 0)".into()
            }
            .is_not_found()
        );
        assert!(!StorageError::service(409, "BlobAlreadyExists", "exists").is_not_found());
        assert!(StorageError::service(409, "BlobAlreadyExists", "exists").is_conflict());
        assert_eq!(StorageError::Config("x".into()).status(), None);
    }
}
