//! Parser for the broker's `list_of_vm` response body.
//!
//! Wire format (JSON):
//! ```text
//! [
//!   {"id": 1, "name": "desktop-a", "state": "running", "blocked": 0},
//!   {"id": 2, "name": "desktop-b", "state": "stopped", "blocked": 1}
//! ]
//! ```
//!
//! `blocked` is sent as `0`/`1` by current brokers; JSON booleans are also
//! accepted.  Unknown extra fields are ignored so newer brokers can add data.
//!
//! # Strictness
//!
//! Parsing is all-or-nothing.  A single malformed record rejects the whole
//! response: a partially-populated catalog could shift the default candidate
//! and connect the user to the wrong desktop.  Every error names the index of
//! the offending record.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::domain::vm::{Vm, VmCatalog, VmId};

/// Errors produced while parsing a VM list.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// The body had no bytes at all.
    #[error("empty VM list response")]
    EmptyBody,

    /// The body is not valid JSON.
    #[error("VM list is not valid JSON: {0}")]
    Malformed(String),

    /// The top-level value is not a JSON array.
    #[error("VM list must be a JSON array, got {0}")]
    NotAList(&'static str),

    /// A record is not a JSON object.
    #[error("record {index}: expected an object, got {found}")]
    NotARecord { index: usize, found: &'static str },

    #[error("record {index}: missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("record {index}: field `{field}` {reason}")]
    InvalidField {
        index: usize,
        field: &'static str,
        reason: String,
    },

    /// The id is present but not a positive integer.
    #[error("record {index}: id {value} is not a positive integer")]
    InvalidId { index: usize, value: String },

    #[error("record {index}: duplicate VM id {id}")]
    DuplicateId { index: usize, id: VmId },
}

/// Parses a `list_of_vm` body into a [`VmCatalog`], preserving broker order.
///
/// `[]` yields an empty catalog, which is a valid answer ("no VMs for this
/// user") and not an error.
///
/// # Errors
///
/// Returns [`CatalogError`] describing the first problem found.
///
/// # Examples
///
/// ```rust
/// use qvd_core::parse_vm_list;
///
/// let body = br#"[{"id": 3, "name": "dev", "state": "running", "blocked": 0}]"#;
/// let catalog = parse_vm_list(body).unwrap();
/// assert_eq!(catalog.len(), 1);
/// assert_eq!(catalog.first().unwrap().name, "dev");
/// ```
pub fn parse_vm_list(body: &[u8]) -> Result<VmCatalog, CatalogError> {
    if body.is_empty() {
        return Err(CatalogError::EmptyBody);
    }

    let root: Value =
        serde_json::from_slice(body).map_err(|e| CatalogError::Malformed(e.to_string()))?;
    let records = match root {
        Value::Array(records) => records,
        other => return Err(CatalogError::NotAList(json_kind(&other))),
    };

    let mut catalog = VmCatalog::new();
    for (index, record) in records.iter().enumerate() {
        let fields = record.as_object().ok_or(CatalogError::NotARecord {
            index,
            found: json_kind(record),
        })?;
        let vm = parse_record(index, fields)?;
        catalog
            .push(vm)
            .map_err(|id| CatalogError::DuplicateId { index, id })?;
    }

    debug!("parsed VM list with {} entries", catalog.len());
    Ok(catalog)
}

fn parse_record(index: usize, fields: &Map<String, Value>) -> Result<Vm, CatalogError> {
    let id = parse_id(index, required(index, fields, "id")?)?;
    let name = required_str(index, fields, "name")?;
    let state = required_str(index, fields, "state")?;
    let blocked = parse_blocked(index, required(index, fields, "blocked")?)?;
    Ok(Vm::new(id, name, state, blocked))
}

fn required<'a>(
    index: usize,
    fields: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, CatalogError> {
    match fields.get(field) {
        None | Some(Value::Null) => Err(CatalogError::MissingField { index, field }),
        Some(value) => Ok(value),
    }
}

fn required_str<'a>(
    index: usize,
    fields: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, CatalogError> {
    let value = required(index, fields, field)?;
    value.as_str().ok_or_else(|| CatalogError::InvalidField {
        index,
        field,
        reason: format!("must be a string, got {}", json_kind(value)),
    })
}

fn parse_id(index: usize, value: &Value) -> Result<VmId, CatalogError> {
    value
        .as_u64()
        .and_then(|raw| u32::try_from(raw).ok())
        .and_then(VmId::new)
        .ok_or_else(|| CatalogError::InvalidId {
            index,
            value: value.to_string(),
        })
}

fn parse_blocked(index: usize, value: &Value) -> Result<bool, CatalogError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(CatalogError::InvalidField {
                index,
                field: "blocked",
                reason: format!("must be 0 or 1, got {n}"),
            }),
        },
        other => Err(CatalogError::InvalidField {
            index,
            field: "blocked",
            reason: format!("must be 0, 1 or a boolean, got {}", json_kind(other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_records_in_order() {
        // Arrange
        let body = br#"[
            {"id": 1, "name": "desktop-a", "state": "running", "blocked": 0},
            {"id": 2, "name": "desktop-b", "state": "stopped", "blocked": 1}
        ]"#;

        // Act
        let catalog = parse_vm_list(body).unwrap();

        // Assert
        let vms = catalog.as_slice();
        assert_eq!(vms.len(), 2);
        assert_eq!(vms[0].id.get(), 1);
        assert_eq!(vms[0].name, "desktop-a");
        assert_eq!(vms[0].state, "running");
        assert!(!vms[0].blocked);
        assert_eq!(vms[1].id.get(), 2);
        assert!(vms[1].blocked);
    }

    #[test]
    fn test_empty_array_is_an_empty_catalog() {
        let catalog = parse_vm_list(b"[]").unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_empty_body_is_an_error() {
        assert_eq!(parse_vm_list(b""), Err(CatalogError::EmptyBody));
    }

    #[test]
    fn test_boolean_blocked_is_accepted() {
        let body = br#"[{"id": 5, "name": "x", "state": "running", "blocked": true}]"#;
        assert!(parse_vm_list(body).unwrap().first().unwrap().blocked);
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let body = br#"[{"id": 5, "name": "x", "state": "running", "blocked": 0, "os": "linux"}]"#;
        assert_eq!(parse_vm_list(body).unwrap().len(), 1);
    }

    #[test]
    fn test_non_numeric_id_rejects_whole_response() {
        // Arrange: second record is malformed
        let body = br#"[
            {"id": 1, "name": "ok", "state": "running", "blocked": 0},
            {"id": "abc", "name": "bad", "state": "running", "blocked": 0}
        ]"#;

        // Act
        let err = parse_vm_list(body).unwrap_err();

        // Assert
        assert_eq!(
            err,
            CatalogError::InvalidId { index: 1, value: "\"abc\"".to_string() }
        );
    }

    #[test]
    fn test_zero_negative_and_fractional_ids_are_rejected() {
        for id in ["0", "-3", "1.5", "4294967296"] {
            let body = format!(r#"[{{"id": {id}, "name": "n", "state": "s", "blocked": 0}}]"#);
            assert!(
                matches!(parse_vm_list(body.as_bytes()), Err(CatalogError::InvalidId { index: 0, .. })),
                "id {id} must be rejected"
            );
        }
    }

    #[test]
    fn test_missing_field_names_field_and_index() {
        let body = br#"[{"id": 1, "state": "running", "blocked": 0}]"#;
        assert_eq!(
            parse_vm_list(body),
            Err(CatalogError::MissingField { index: 0, field: "name" })
        );
    }

    #[test]
    fn test_null_field_counts_as_missing() {
        let body = br#"[{"id": 1, "name": "a", "state": null, "blocked": 0}]"#;
        assert_eq!(
            parse_vm_list(body),
            Err(CatalogError::MissingField { index: 0, field: "state" })
        );
    }

    #[test]
    fn test_wrong_type_for_name_is_rejected() {
        let body = br#"[{"id": 1, "name": 12, "state": "running", "blocked": 0}]"#;
        assert!(matches!(
            parse_vm_list(body),
            Err(CatalogError::InvalidField { index: 0, field: "name", .. })
        ));
    }

    #[test]
    fn test_blocked_out_of_range_is_rejected() {
        let body = br#"[{"id": 1, "name": "a", "state": "running", "blocked": 2}]"#;
        assert!(matches!(
            parse_vm_list(body),
            Err(CatalogError::InvalidField { index: 0, field: "blocked", .. })
        ));
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let body = br#"[
            {"id": 7, "name": "a", "state": "running", "blocked": 0},
            {"id": 7, "name": "b", "state": "running", "blocked": 0}
        ]"#;
        assert!(matches!(
            parse_vm_list(body),
            Err(CatalogError::DuplicateId { index: 1, .. })
        ));
    }

    #[test]
    fn test_top_level_object_is_rejected() {
        assert_eq!(
            parse_vm_list(br#"{"vms": []}"#),
            Err(CatalogError::NotAList("object"))
        );
    }

    #[test]
    fn test_non_object_record_is_rejected() {
        assert_eq!(
            parse_vm_list(b"[1]"),
            Err(CatalogError::NotARecord { index: 0, found: "number" })
        );
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        assert!(matches!(
            parse_vm_list(b"[{\"id\": 1,"),
            Err(CatalogError::Malformed(_))
        ));
    }
}
