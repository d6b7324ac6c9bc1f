//! Sample entity used by the `demo` command

use azstore::TableEntity;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Book {
    pub partition_key: String,
    pub row_key: String,
    pub title: String,
    pub author: String,
    pub pub_date: DateTime<Utc>,
    pub num_of_pages: i32,
}

impl TableEntity for Book {
    fn partition_key(&self) -> &str {
        &self.partition_key
    }

    fn row_key(&self) -> &str {
        &self.row_key
    }
}

/// The book saved and read back by the demo
pub fn foundation_and_empire() -> Book {
    Book {
        partition_key: "0".to_string(),
        row_key: "0000001".to_string(),
        title: "Foundation and Empire".to_string(),
        author: "Isaac Asimov".to_string(),
        pub_date: Utc
            .with_ymd_and_hms(1952, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default(),
        num_of_pages: 247,
    }
}
