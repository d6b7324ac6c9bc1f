//! Resource naming rules of the storage service.

use crate::entity::TableEntity;
use crate::error::{ModelError, Result};

const MIN_NAME_LEN: usize = 3;
const MAX_NAME_LEN: usize = 63;

/// Physical table name for an entity type: `prefix + T::table_name()`, lowercased.
///
/// # Errors
///
/// Returns `ModelError::InvalidName` if the result breaks the table naming rules.
pub fn table_name_for<T: TableEntity>(prefix: &str) -> Result<String> {
    let name = format!("{prefix}{}", T::table_name()).to_lowercase();
    validate_table_name(&name)?;
    Ok(name)
}

/// Table names are alphanumeric, 3-63 characters and start with a letter.
///
/// # Errors
///
/// Returns `ModelError::InvalidName` describing the first violated rule.
pub fn validate_table_name(name: &str) -> Result<()> {
    let reject = |reason: &str| invalid("table", name, reason);

    check_length("table", name)?;
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(reject("must start with a letter"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(reject("only letters and digits are allowed"));
    }
    if name.eq_ignore_ascii_case("tables") {
        return Err(reject("name is reserved"));
    }
    Ok(())
}

/// Container names follow the DNS label rules.
///
/// # Errors
///
/// Returns `ModelError::InvalidName` describing the first violated rule.
pub fn validate_container_name(name: &str) -> Result<()> {
    validate_dns_name("container", name)
}

/// Queue names follow the same rules as container names.
///
/// # Errors
///
/// Returns `ModelError::InvalidName` describing the first violated rule.
pub fn validate_queue_name(name: &str) -> Result<()> {
    validate_dns_name("queue", name)
}

fn validate_dns_name(kind: &'static str, name: &str) -> Result<()> {
    check_length(kind, name)?;
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(kind, name, "only lowercase letters, digits and '-' are allowed"));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid(kind, name, "must start and end with a letter or digit"));
    }
    if name.contains("--") {
        return Err(invalid(kind, name, "consecutive '-' are not allowed"));
    }
    Ok(())
}

fn check_length(kind: &'static str, name: &str) -> Result<()> {
    let len = name.len();
    if (MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        Ok(())
    } else {
        Err(invalid(
            kind,
            name,
            &format!("length must be between {MIN_NAME_LEN} and {MAX_NAME_LEN}"),
        ))
    }
}

fn invalid(kind: &'static str, name: &str, reason: &str) -> ModelError {
    ModelError::InvalidName {
        kind,
        name: name.to_owned(),
        reason: reason.to_owned(),
    }
}
