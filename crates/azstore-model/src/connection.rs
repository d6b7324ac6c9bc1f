//! Storage account connection strings.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ModelError, Result};

/// Account name of the local storage emulator
pub const DEVELOPMENT_ACCOUNT: &str = "devstoreaccount1";

/// Well-known shared key of the local storage emulator
pub const DEVELOPMENT_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

const DEVELOPMENT_HOST: &str = "http://127.0.0.1";
const DEVELOPMENT_BLOB_PORT: u16 = 10000;
const DEVELOPMENT_QUEUE_PORT: u16 = 10001;
const DEVELOPMENT_TABLE_PORT: u16 = 10002;

const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Storage services addressed by a connection string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageService {
    Blob,
    Queue,
    Table,
}

impl StorageService {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Queue => "queue",
            Self::Table => "table",
        }
    }

    fn development_port(self) -> u16 {
        match self {
            Self::Blob => DEVELOPMENT_BLOB_PORT,
            Self::Queue => DEVELOPMENT_QUEUE_PORT,
            Self::Table => DEVELOPMENT_TABLE_PORT,
        }
    }
}

/// How requests are authorized
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    AccountKey(String),
    SasToken(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccountKey(_) => f.write_str("AccountKey(<redacted>)"),
            Self::SasToken(_) => f.write_str("SasToken(<redacted>)"),
        }
    }
}

/// Parsed storage account connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: String,
    pub credentials: Credentials,
    pub protocol: String,
    pub endpoint_suffix: String,
    pub development_storage: bool,
    blob_endpoint: Option<String>,
    queue_endpoint: Option<String>,
    table_endpoint: Option<String>,
}

impl ConnectionString {
    /// Connection to the local storage emulator
    #[must_use]
    pub fn development() -> Self {
        Self {
            account_name: DEVELOPMENT_ACCOUNT.to_owned(),
            credentials: Credentials::AccountKey(DEVELOPMENT_ACCOUNT_KEY.to_owned()),
            protocol: "http".to_owned(),
            endpoint_suffix: String::new(),
            development_storage: true,
            blob_endpoint: None,
            queue_endpoint: None,
            table_endpoint: None,
        }
    }

    /// Base URI of a service, without a trailing slash.
    #[must_use]
    pub fn endpoint(&self, service: StorageService) -> String {
        let explicit = match service {
            StorageService::Blob => &self.blob_endpoint,
            StorageService::Queue => &self.queue_endpoint,
            StorageService::Table => &self.table_endpoint,
        };
        if let Some(uri) = explicit {
            return uri.trim_end_matches('/').to_owned();
        }

        if self.development_storage {
            format!(
                "{DEVELOPMENT_HOST}:{}/{}",
                service.development_port(),
                self.account_name
            )
        } else {
            format!(
                "{}://{}.{}.{}",
                self.protocol,
                self.account_name,
                service.as_str(),
                self.endpoint_suffix
            )
        }
    }
}

impl FromStr for ConnectionString {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let pairs = parse_pairs(s)?;
        let get = |key: &str| pairs.get(&key.to_ascii_lowercase()).cloned();

        if get("UseDevelopmentStorage").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            return Ok(Self::development());
        }

        let account_name = get("AccountName")
            .ok_or_else(|| invalid("AccountName is required"))?;

        let credentials = match (get("AccountKey"), get("SharedAccessSignature")) {
            (Some(key), _) => Credentials::AccountKey(key),
            (None, Some(sas)) => Credentials::SasToken(sas.trim_start_matches('?').to_owned()),
            (None, None) => {
                return Err(invalid("AccountKey or SharedAccessSignature is required"));
            }
        };

        let protocol = get("DefaultEndpointsProtocol")
            .unwrap_or_else(|| DEFAULT_PROTOCOL.to_owned())
            .to_ascii_lowercase();
        if protocol != "http" && protocol != "https" {
            return Err(invalid(&format!("unsupported protocol '{protocol}'")));
        }

        Ok(Self {
            account_name,
            credentials,
            protocol,
            endpoint_suffix: get("EndpointSuffix")
                .unwrap_or_else(|| DEFAULT_ENDPOINT_SUFFIX.to_owned()),
            development_storage: false,
            blob_endpoint: get("BlobEndpoint"),
            queue_endpoint: get("QueueEndpoint"),
            table_endpoint: get("TableEndpoint"),
        })
    }
}

fn parse_pairs(s: &str) -> Result<HashMap<String, String>> {
    let mut pairs = HashMap::new();
    for segment in s.split(';').map(str::trim).filter(|seg| !seg.is_empty()) {
        let (key, value) = segment
            .split_once('=')
            .ok_or_else(|| invalid(&format!("segment '{segment}' has no '='")))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(invalid("empty key"));
        }
        pairs.insert(key.to_ascii_lowercase(), value.trim().to_owned());
    }

    if pairs.is_empty() {
        return Err(invalid("connection string is empty"));
    }
    Ok(pairs)
}

fn invalid(reason: &str) -> ModelError {
    ModelError::InvalidConnectionString(reason.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_development_storage() {
        let cs = assert_ok!("UseDevelopmentStorage=true;".parse::<ConnectionString>());

        assert!(cs.development_storage);
        assert_eq!(cs.account_name, DEVELOPMENT_ACCOUNT);
        assert_eq!(
            cs.endpoint(StorageService::Blob),
            "http://127.0.0.1:10000/devstoreaccount1"
        );
        assert_eq!(
            cs.endpoint(StorageService::Table),
            "http://127.0.0.1:10002/devstoreaccount1"
        );
    }

    #[test]
    fn test_account_key_string() {
        let cs = assert_ok!(
            "DefaultEndpointsProtocol=https;AccountName=books;AccountKey=abc==;EndpointSuffix=core.windows.net"
                .parse::<ConnectionString>()
        );

        assert_eq!(cs.account_name, "books");
        assert_eq!(cs.credentials, Credentials::AccountKey("abc==".into()));
        assert_eq!(
            cs.endpoint(StorageService::Queue),
            "https://books.queue.core.windows.net"
        );
    }

    #[test]
    fn test_sas_and_explicit_endpoint() {
        let cs = assert_ok!(
            "BlobEndpoint=https://cdn.example.com/;AccountName=books;SharedAccessSignature=?sv=2022&sig=x"
                .parse::<ConnectionString>()
        );

        assert_eq!(cs.credentials, Credentials::SasToken("sv=2022&sig=x".into()));
        assert_eq!(cs.endpoint(StorageService::Blob), "https://cdn.example.com");
        assert_eq!(
            cs.endpoint(StorageService::Table),
            "https://books.table.core.windows.net"
        );
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let cs = assert_ok!("accountname=books;ACCOUNTKEY=k".parse::<ConnectionString>());
        assert_eq!(cs.account_name, "books");
    }

    #[test]
    fn test_invalid_strings() {
        assert_err!("".parse::<ConnectionString>());
        assert_err!("AccountName".parse::<ConnectionString>());
        assert_err!("AccountName=books".parse::<ConnectionString>());
        assert_err!("AccountKey=k".parse::<ConnectionString>());
        assert_err!("DefaultEndpointsProtocol=ftp;AccountName=a;AccountKey=k".parse::<ConnectionString>());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let cs = assert_ok!("AccountName=books;AccountKey=supersecret".parse::<ConnectionString>());
        let rendered = format!("{cs:?}");
        assert!(!rendered.contains("supersecret"));
        assert!(rendered.contains("books"));
    }
}
