//! Fixtures shared by the integration tests

#![allow(dead_code)]

use azstore::{AzureStorage, TableEntity};
use chrono::{DateTime, Utc};
use fake::faker::name::en::{FirstName, LastName};
use fake::{Fake, Faker};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Person {
    pub partition_key: String,
    pub row_key: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_date: DateTime<Utc>,
}

impl TableEntity for Person {
    fn partition_key(&self) -> &str {
        &self.partition_key
    }

    fn row_key(&self) -> &str {
        &self.row_key
    }
}

impl Person {
    pub fn fake(partition_key: impl Into<String>, row_key: impl ToString) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.to_string(),
            first_name: Some(FirstName().fake()),
            last_name: Some(LastName().fake()),
            birth_date: Utc::now(),
        }
    }

    pub fn keys_only(partition_key: &str, row_key: &str) -> Self {
        Self {
            partition_key: partition_key.to_string(),
            row_key: row_key.to_string(),
            first_name: None,
            last_name: None,
            birth_date: Utc::now(),
        }
    }
}

pub fn random_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|_| Faker.fake::<u8>()).collect()
}

pub async fn storage_with_people() -> AzureStorage {
    let storage = AzureStorage::in_memory("");
    storage
        .tables()
        .create_table_if_not_exist::<Person>()
        .await
        .unwrap();
    storage
}
