//! Table entities and their untyped record form.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::error::{ModelError, Result};

pub const PARTITION_KEY: &str = "PartitionKey";
pub const ROW_KEY: &str = "RowKey";
pub const TIMESTAMP: &str = "Timestamp";
pub const ETAG: &str = "ETag";

const ODATA_PREFIX: &str = "odata.";
const ODATA_ETAG: &str = "odata.etag";
const ODATA_TYPE_SUFFIX: &str = "@odata.type";
const EDM_INT64: &str = "Edm.Int64";

// =============================================================================
// ENTITY TRAIT
// =============================================================================

/// A record stored in a table.
///
/// Implementors are plain `serde` types. The partition and row keys are read
/// through the trait; when the type also wants them back on read it declares
/// fields renamed to the reserved names:
///
/// ```rust
/// use azstore_model::TableEntity;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Person {
///     #[serde(rename = "PartitionKey")]
///     partition_key: String,
///     #[serde(rename = "RowKey")]
///     row_key: String,
///     first_name: String,
/// }
///
/// impl TableEntity for Person {
///     fn partition_key(&self) -> &str {
///         &self.partition_key
///     }
///
///     fn row_key(&self) -> &str {
///         &self.row_key
///     }
/// }
///
/// assert_eq!(Person::table_name(), "Person");
/// ```
pub trait TableEntity {
    fn partition_key(&self) -> &str;

    fn row_key(&self) -> &str;

    /// Logical table name before prefixing and lowercasing.
    ///
    /// Defaults to the short name of the implementing type.
    #[must_use]
    fn table_name() -> &'static str
    where
        Self: Sized,
    {
        short_type_name::<Self>()
    }

    fn key(&self) -> EntityKey {
        EntityKey::new(self.partition_key(), self.row_key())
    }
}

/// Last path segment of a type name, without generic arguments.
#[must_use]
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// =============================================================================
// ENTITY KEY
// =============================================================================

/// Identity of an entity within one table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub partition_key: String,
    pub row_key: String,
}

impl EntityKey {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.partition_key, self.row_key)
    }
}

impl<P: Into<String>, R: Into<String>> From<(P, R)> for EntityKey {
    fn from((partition_key, row_key): (P, R)) -> Self {
        Self::new(partition_key, row_key)
    }
}

// =============================================================================
// ENTITY RECORD
// =============================================================================

/// Untyped entity exchanged with the storage backends.
///
/// `properties` never contains the reserved key, timestamp or etag names;
/// those live in their own fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityRecord {
    pub partition_key: String,
    pub row_key: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub properties: Map<String, Value>,
}

impl EntityRecord {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn key(&self) -> EntityKey {
        EntityKey::new(&self.partition_key, &self.row_key)
    }

    /// Serialize a typed entity.
    ///
    /// Null properties are dropped: the table service does not store them.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::Serialization` if the entity does not serialize
    /// to a JSON object.
    pub fn from_entity<T: TableEntity + Serialize>(entity: &T) -> Result<Self> {
        let Value::Object(mut properties) = serde_json::to_value(entity)? else {
            return Err(ModelError::Serialization(format!(
                "{} did not serialize to an object",
                short_type_name::<T>()
            )));
        };

        for reserved in [PARTITION_KEY, ROW_KEY, TIMESTAMP, ETAG, ODATA_ETAG] {
            properties.remove(reserved);
        }
        properties.retain(|_, value| !value.is_null());

        Ok(Self {
            partition_key: entity.partition_key().to_owned(),
            row_key: entity.row_key().to_owned(),
            timestamp: None,
            etag: None,
            properties,
        })
    }

    /// Deserialize into a typed entity, reinserting the reserved properties.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::Serialization` if the properties do not match `T`.
    pub fn into_entity<T: DeserializeOwned>(self) -> Result<T> {
        let mut map = self.properties;
        map.insert(PARTITION_KEY.to_owned(), Value::String(self.partition_key));
        map.insert(ROW_KEY.to_owned(), Value::String(self.row_key));
        if let Some(timestamp) = self.timestamp {
            map.insert(
                TIMESTAMP.to_owned(),
                Value::String(timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            );
        }
        if let Some(etag) = self.etag {
            map.insert(ETAG.to_owned(), Value::String(etag));
        }

        Ok(serde_json::from_value(Value::Object(map))?)
    }

    /// Look up a property by name, including the reserved ones.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<Value> {
        match name {
            PARTITION_KEY => Some(Value::String(self.partition_key.clone())),
            ROW_KEY => Some(Value::String(self.row_key.clone())),
            TIMESTAMP => self
                .timestamp
                .map(|ts| Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))),
            _ => self.properties.get(name).cloned(),
        }
    }

    /// Merge another record's properties into this one (upsert-merge).
    pub fn merge_from(&mut self, other: Self) {
        self.properties.extend(other.properties);
    }

    // =========================================================================
    // WIRE FORMAT
    // =========================================================================

    /// JSON body as sent to the table service.
    ///
    /// Integers outside the 32-bit range are sent as annotated `Edm.Int64`
    /// strings, otherwise the service would store them as doubles.
    #[must_use]
    pub fn to_wire(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            PARTITION_KEY.to_owned(),
            Value::String(self.partition_key.clone()),
        );
        map.insert(ROW_KEY.to_owned(), Value::String(self.row_key.clone()));

        for (name, value) in &self.properties {
            let wide = value
                .as_i64()
                .is_some_and(|n| i32::try_from(n).is_err());
            if wide {
                map.insert(name.clone(), Value::String(value.to_string()));
                map.insert(
                    format!("{name}{ODATA_TYPE_SUFFIX}"),
                    Value::String(EDM_INT64.to_owned()),
                );
            } else {
                map.insert(name.clone(), value.clone());
            }
        }

        map
    }

    /// Parse a JSON entity as returned by the table service.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::MissingKey` if either key property is absent.
    pub fn from_wire(mut map: Map<String, Value>) -> Result<Self> {
        let partition_key =
            take_string(&mut map, PARTITION_KEY).ok_or(ModelError::MissingKey(PARTITION_KEY))?;
        let row_key = take_string(&mut map, ROW_KEY).ok_or(ModelError::MissingKey(ROW_KEY))?;
        let timestamp = take_string(&mut map, TIMESTAMP)
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|ts| ts.with_timezone(&Utc));
        let etag = take_string(&mut map, ODATA_ETAG);

        let metadata: Vec<String> = map
            .keys()
            .filter(|key| key.starts_with(ODATA_PREFIX) || key.ends_with(ODATA_TYPE_SUFFIX))
            .cloned()
            .collect();

        for key in metadata {
            let Some(Value::String(edm_type)) = map.remove(&key) else {
                continue;
            };
            let Some(property) = key.strip_suffix(ODATA_TYPE_SUFFIX) else {
                continue;
            };
            if edm_type != EDM_INT64 {
                continue;
            }
            let parsed = match map.get(property) {
                Some(Value::String(raw)) => raw.parse::<i64>().ok(),
                _ => None,
            };
            if let Some(n) = parsed {
                map.insert(property.to_owned(), Value::from(n));
            }
        }

        Ok(Self {
            partition_key,
            row_key,
            timestamp,
            etag,
            properties: map,
        })
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}
