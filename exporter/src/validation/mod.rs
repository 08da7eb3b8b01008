//! JSON Schema validation for Jupiter snapshot records.
//!
//! Item and thesis records are checked against JSON Schema Draft 7 before
//! export, so a record missing its id, title or collection path is reported
//! instead of producing a broken DSpace row.
//!
//! # Embedded Schemas
//!
//! Schemas are embedded at compile time from `schemas/` directory:
//! - `jupiter-item.json`
//! - `jupiter-thesis.json`

use serde_json::Value;

use crate::error::{ExportError, ExportResult};
use crate::models::{JupiterRecord, RecordKind};

const ITEM_SCHEMA: &str = include_str!("../../schemas/jupiter-item.json");
const THESIS_SCHEMA: &str = include_str!("../../schemas/jupiter-thesis.json");

/// The embedded schema for a record kind.
pub fn record_schema(kind: RecordKind) -> ExportResult<Value> {
    let raw = match kind {
        RecordKind::Item => ITEM_SCHEMA,
        RecordKind::Thesis => THESIS_SCHEMA,
    };
    Ok(serde_json::from_str(raw)?)
}

/// Compiled validators for item and thesis records.
pub struct RecordValidator {
    item: jsonschema::Validator,
    thesis: jsonschema::Validator,
}

impl RecordValidator {
    pub fn new() -> ExportResult<Self> {
        let compile = |kind: RecordKind| -> ExportResult<jsonschema::Validator> {
            let schema = record_schema(kind)?;
            jsonschema::draft7::new(&schema).map_err(|e| ExportError::Schema(e.to_string()))
        };
        Ok(Self {
            item: compile(RecordKind::Item)?,
            thesis: compile(RecordKind::Thesis)?,
        })
    }

    /// Check a record's attributes; attached files are not part of the schema.
    pub fn validate(&self, kind: RecordKind, record: &JupiterRecord) -> Result<(), Vec<String>> {
        let validator = match kind {
            RecordKind::Item => &self.item,
            RecordKind::Thesis => &self.thesis,
        };
        collect_errors(validator, &Value::Object(record.attributes.clone()))
    }
}

/// Every schema error for `data`, or `Ok(())` when it is valid.
fn collect_errors(validator: &jsonschema::Validator, data: &Value) -> Result<(), Vec<String>> {
    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> JupiterRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_valid_item() {
        let validator = RecordValidator::new().unwrap();
        let item = record(json!({
            "id": "0e790a8e-a263-4a99-9a77-418d91b700c0",
            "title": "Soil survey",
            "member_of_paths": ["com/col"],
            "creators": ["Doe, Jane"],
            "publication_status": null,
            "owner_id": 12
        }));
        assert!(validator.validate(RecordKind::Item, &item).is_ok());
    }

    #[test]
    fn test_invalid_item() {
        let validator = RecordValidator::new().unwrap();
        let item = record(json!({
            "id": "x",
            "member_of_paths": ["not-a-path"]
        }));
        let errors = validator.validate(RecordKind::Item, &item).unwrap_err();
        assert!(errors.len() >= 2);
    }

    #[test]
    fn test_thesis_requires_dissertant() {
        let validator = RecordValidator::new().unwrap();
        let thesis = record(json!({
            "id": "t1",
            "title": "On moss",
            "member_of_paths": ["com/col"],
            "graduation_date": "2011-06"
        }));
        assert!(validator.validate(RecordKind::Thesis, &thesis).is_err());
        assert!(validator.validate(RecordKind::Item, &thesis).is_ok());
    }

    #[test]
    fn test_errors_name_the_failing_field() {
        let validator = RecordValidator::new().unwrap();
        let item = record(json!({
            "id": "i1",
            "title": "Soil survey",
            "member_of_paths": ["a/b/c"]
        }));
        let errors = validator.validate(RecordKind::Item, &item).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("a/b/c"));
    }

    #[test]
    fn test_embedded_schemas_parse() {
        assert!(record_schema(RecordKind::Item).is_ok());
        assert!(record_schema(RecordKind::Thesis).is_ok());
    }
}
