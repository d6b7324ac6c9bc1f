//! Table query filters.
//!
//! A [`Filter`] renders to the service's OData `$filter` syntax and can also
//! be evaluated locally against an [`EntityRecord`].

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::entity::{EntityRecord, PARTITION_KEY, ROW_KEY};

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
        }
    }
}

/// Literal on the right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    DateTime(DateTime<Utc>),
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

impl FilterValue {
    fn to_odata(&self) -> String {
        match self {
            Self::String(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Int(n) if i32::try_from(*n).is_ok() => n.to_string(),
            Self::Int(n) => format!("{n}L"),
            Self::Double(d) => {
                let s = d.to_string();
                if s.contains(['.', 'e', 'E']) { s } else { format!("{s}.0") }
            }
            Self::Bool(b) => b.to_string(),
            Self::DateTime(ts) => {
                format!("datetime'{}'", ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
        }
    }

    /// Order a stored JSON value against this literal. `None` when the types
    /// are not comparable.
    fn compare(&self, stored: &Value) -> Option<Ordering> {
        match (self, stored) {
            (Self::String(expected), Value::String(actual)) => Some(actual.as_str().cmp(expected)),
            (Self::Int(expected), Value::Number(actual)) => match actual.as_i64() {
                Some(n) => Some(n.cmp(expected)),
                #[allow(clippy::cast_precision_loss)]
                None => actual.as_f64()?.partial_cmp(&(*expected as f64)),
            },
            (Self::Double(expected), Value::Number(actual)) => {
                actual.as_f64()?.partial_cmp(expected)
            }
            (Self::Bool(expected), Value::Bool(actual)) => Some(actual.cmp(expected)),
            (Self::DateTime(expected), Value::String(actual)) => {
                let parsed = DateTime::parse_from_rfc3339(actual).ok()?;
                Some(parsed.with_timezone(&Utc).cmp(expected))
            }
            _ => None,
        }
    }
}

// =============================================================================
// FILTER
// =============================================================================

/// Query filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        property: String,
        op: CompareOp,
        value: FilterValue,
    },
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn compare(property: impl Into<String>, op: CompareOp, value: impl Into<FilterValue>) -> Self {
        Self::Compare {
            property: property.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(property: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(property, CompareOp::Eq, value)
    }

    pub fn ne(property: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(property, CompareOp::Ne, value)
    }

    pub fn gt(property: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(property, CompareOp::Gt, value)
    }

    pub fn ge(property: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(property, CompareOp::Ge, value)
    }

    pub fn lt(property: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(property, CompareOp::Lt, value)
    }

    pub fn le(property: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(property, CompareOp::Le, value)
    }

    pub fn partition_key_eq(partition_key: impl Into<String>) -> Self {
        Self::eq(PARTITION_KEY, FilterValue::String(partition_key.into()))
    }

    pub fn row_key_eq(row_key: impl Into<String>) -> Self {
        Self::eq(ROW_KEY, FilterValue::String(row_key.into()))
    }

    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Render as an OData `$filter` expression
    #[must_use]
    pub fn to_odata(&self) -> String {
        match self {
            Self::Compare { property, op, value } => {
                format!("{property} {} {}", op.as_str(), value.to_odata())
            }
            Self::And(left, right) => format!("({}) and ({})", left.to_odata(), right.to_odata()),
            Self::Or(left, right) => format!("({}) or ({})", left.to_odata(), right.to_odata()),
            Self::Not(inner) => format!("not ({})", inner.to_odata()),
        }
    }

    /// Evaluate against a record. A comparison on a missing or differently
    /// typed property is false.
    #[must_use]
    pub fn matches(&self, record: &EntityRecord) -> bool {
        match self {
            Self::Compare { property, op, value } => record
                .property(property)
                .and_then(|stored| value.compare(&stored))
                .is_some_and(|ordering| op.accepts(ordering)),
            Self::And(left, right) => left.matches(record) && right.matches(record),
            Self::Or(left, right) => left.matches(record) || right.matches(record),
            Self::Not(inner) => !inner.matches(record),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_odata())
    }
}
