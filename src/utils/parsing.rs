//! Parsing utilities for CLI arguments and stored values.
//!
//! This module provides the small validation and formatting helpers shared
//! by the store, the remote collaborators and the CLI.

use chrono::{Local, TimeZone};

use crate::config::is_reserved_key;
use crate::error::{Result, SyncError};

// =============================================================================
// Profile Names
// =============================================================================

/// Check that `name` can be used as a profile storage key.
///
/// The name must contain a non-whitespace character and must not collide
/// with a reserved key of the synchronized store.
///
/// # Example
/// ```
/// use aesr_config_sync::utils::parsing::validate_profile_name;
///
/// assert!(validate_profile_name("prod").is_ok());
/// assert!(validate_profile_name("  ").is_err());
/// assert!(validate_profile_name("defaultProfile").is_err());
/// ```
pub fn validate_profile_name(name: &str) -> Result<&str> {
    if name.trim().is_empty() {
        return Err(SyncError::validation("Profile name must not be empty"));
    }

    if is_reserved_key(name) {
        return Err(SyncError::validation(format!(
            "'{}' is reserved and cannot be used as a profile name",
            name
        )));
    }

    Ok(name)
}

/// Check that every named field is present and non-blank.
///
/// Returns the same message the options page used for incomplete forms.
pub fn require_fields(fields: &[(&str, Option<&str>)]) -> Result<()> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.is_none_or(|v| v.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        log::debug!("Missing required fields: {}", missing.join(", "));
        Err(SyncError::validation("Please fill in all required fields."))
    }
}

// =============================================================================
// Timestamps
// =============================================================================

/// Parse a stored last-sent timestamp (epoch milliseconds).
///
/// Accepts both the numeric-string form written by this crate and a bare
/// JSON number.
pub fn parse_timestamp_millis(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

/// Render the last-sent line shown to the user.
///
/// # Example
/// ```
/// use aesr_config_sync::utils::parsing::format_last_sent;
///
/// assert_eq!(format_last_sent(None), "Last sent: Never");
/// ```
pub fn format_last_sent(millis: Option<i64>) -> String {
    match millis.and_then(|ms| Local.timestamp_millis_opt(ms).single()) {
        Some(time) => format!("Last sent: {}", time.format("%Y-%m-%d %H:%M:%S")),
        None => "Last sent: Never".to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_profile_name() {
        assert_eq!(validate_profile_name("prod").unwrap(), "prod");
        assert!(validate_profile_name("").unwrap_err().is_validation());
        assert!(validate_profile_name("debugMode").unwrap_err().is_validation());
    }

    #[test]
    fn test_require_fields() {
        assert!(require_fields(&[("region", Some("us-east-1")), ("bucket", Some("b"))]).is_ok());

        let err = require_fields(&[("region", Some("us-east-1")), ("bucket", Some(" "))])
            .unwrap_err();
        assert_eq!(err.to_string(), "Please fill in all required fields.");
        assert!(require_fields(&[("key", None)]).is_err());
    }

    #[test]
    fn test_parse_timestamp_millis() {
        assert_eq!(parse_timestamp_millis(&json!("1700000000000")), Some(1_700_000_000_000));
        assert_eq!(parse_timestamp_millis(&json!(1700000000000i64)), Some(1_700_000_000_000));
        assert_eq!(parse_timestamp_millis(&json!("soon")), None);
        assert_eq!(parse_timestamp_millis(&json!(null)), None);
    }

    #[test]
    fn test_format_last_sent() {
        assert_eq!(format_last_sent(None), "Last sent: Never");
        let line = format_last_sent(Some(1_700_000_000_000));
        assert!(line.starts_with("Last sent: 2023-11-"));
    }
}
