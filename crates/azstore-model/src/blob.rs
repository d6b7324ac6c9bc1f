//! Blob listing types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator used to emulate folders in blob names
pub const FOLDER_DELIMITER: &str = "/";

/// Blob metadata returned by listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobItem {
    pub name: String,
    pub content_length: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub content_type: Option<String>,
}

impl BlobItem {
    pub fn new(name: impl Into<String>, content_length: u64) -> Self {
        Self {
            name: name.into(),
            content_length,
            last_modified: None,
            etag: None,
            content_type: None,
        }
    }
}

/// Result of a single-level listing: blobs directly under the prefix and
/// the virtual folders below it (each ending with the delimiter).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobListing {
    pub blobs: Vec<BlobItem>,
    pub folders: Vec<String>,
}

/// Classify `name` relative to `prefix` for a delimited listing.
///
/// Returns `Some(folder)` when the remainder of the name contains the
/// delimiter, `None` when the blob sits directly under the prefix.
#[must_use]
pub fn folder_of(name: &str, prefix: &str, delimiter: &str) -> Option<String> {
    let rest = name.strip_prefix(prefix)?;
    let idx = rest.find(delimiter)?;
    Some(format!("{prefix}{}", &rest[..idx + delimiter.len()]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_of() {
        assert_eq!(folder_of("listing/f1.dat", "listing/", "/"), None);
        assert_eq!(
            folder_of("listing/sub1/sub1.1/s1_0.dat", "listing/", "/"),
            Some("listing/sub1/".to_string())
        );
        assert_eq!(folder_of("root.dat", "", "/"), None);
        assert_eq!(folder_of("a/b.dat", "", "/"), Some("a/".to_string()));
    }
}
