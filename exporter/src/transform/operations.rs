//! Value normalization operations.
//!
//! Operations run in order on a resolved source value. Scalar operations
//! applied to a list run on each element.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::error::ProfileError;
use crate::models::{is_blank, parse_datetime};

/// All available normalization operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Remove leading and trailing whitespace
    Trim,

    /// Replace using regex pattern
    Replace {
        pattern: String,
        #[serde(default)]
        value: String,
    },

    /// Map values using a lookup table; unmapped values become null
    Map {
        mapping: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_unmapped: Option<String>,
    },

    /// Reformat a timestamp with a strftime pattern
    FormatDate { format: String },

    /// Turn a `YYYY-MM` convocation date into `Spring YYYY` / `Fall YYYY`
    HumanizeDate,

    /// Join a list into one string
    Join { separator: String },

    /// Drop blank elements from a list
    RejectBlank,
}

static REGEX_CACHE: Lazy<Mutex<HashMap<String, Regex>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Compile a pattern once per process.
fn cached_regex(pattern: &str) -> Option<Regex> {
    let mut cache = REGEX_CACHE.lock().ok()?;
    if let Some(re) = cache.get(pattern) {
        return Some(re.clone());
    }
    let re = Regex::new(pattern).ok()?;
    cache.insert(pattern.to_string(), re.clone());
    Some(re)
}

impl Operation {
    /// Check that the operation can run (regex patterns compile).
    pub fn check(&self) -> Result<(), ProfileError> {
        if let Operation::Replace { pattern, .. } = self {
            Regex::new(pattern).map_err(|e| ProfileError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Apply this operation to a value
    pub fn apply(&self, value: &Value) -> Value {
        match self {
            Operation::Join { separator } => Self::apply_join(value, separator),
            Operation::RejectBlank => Self::apply_reject_blank(value),
            _ => match value {
                Value::Array(items) => {
                    Value::Array(items.iter().map(|v| self.apply_scalar(v)).collect())
                }
                other => self.apply_scalar(other),
            },
        }
    }

    fn apply_scalar(&self, value: &Value) -> Value {
        match self {
            Operation::Trim => Self::apply_trim(value),
            Operation::Replace { pattern, value: replacement } => {
                Self::apply_replace(value, pattern, replacement)
            }
            Operation::Map { mapping, default_unmapped } => {
                Self::apply_map(value, mapping, default_unmapped.as_deref())
            }
            Operation::FormatDate { format } => Self::apply_format_date(value, format),
            Operation::HumanizeDate => Self::apply_humanize_date(value),
            Operation::Join { .. } | Operation::RejectBlank => value.clone(),
        }
    }

    fn as_string(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn apply_trim(value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(s.trim().to_string()),
            other => other.clone(),
        }
    }

    fn apply_replace(value: &Value, pattern: &str, replacement: &str) -> Value {
        match value {
            Value::String(s) => cached_regex(pattern)
                .map(|re| Value::String(re.replace_all(s, replacement).to_string()))
                .unwrap_or_else(|| value.clone()),
            other => other.clone(),
        }
    }

    fn apply_map(
        value: &Value,
        mapping: &BTreeMap<String, String>,
        default_unmapped: Option<&str>,
    ) -> Value {
        match Self::as_string(value) {
            Some(key) => match mapping.get(&key) {
                Some(mapped) => Value::String(mapped.clone()),
                None => default_unmapped
                    .map(|d| Value::String(d.to_string()))
                    .unwrap_or(Value::Null),
            },
            None => value.clone(),
        }
    }

    fn apply_format_date(value: &Value, format: &str) -> Value {
        match value {
            Value::String(s) => match parse_datetime(s) {
                Some(dt) => Value::String(dt.format(format).to_string()),
                None => value.clone(),
            },
            other => other.clone(),
        }
    }

    fn apply_humanize_date(value: &Value) -> Value {
        let Some(s) = value.as_str() else {
            return value.clone();
        };
        match humanize_convocation(s.trim()) {
            Some(human) => Value::String(human),
            None => value.clone(),
        }
    }

    fn apply_join(value: &Value, separator: &str) -> Value {
        match value {
            Value::Array(items) => Value::String(
                items
                    .iter()
                    .map(|v| Self::as_string(v).unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(separator),
            ),
            other => other.clone(),
        }
    }

    fn apply_reject_blank(value: &Value) -> Value {
        match value {
            Value::Array(items) => {
                Value::Array(items.iter().filter(|v| !is_blank(v)).cloned().collect())
            }
            other => other.clone(),
        }
    }
}

/// `2011-06` -> `Spring 2011`, `2011-11` -> `Fall 2011`.
///
/// Months January to June are the spring convocation, July to December
/// the fall one. Other shapes are left alone.
fn humanize_convocation(s: &str) -> Option<String> {
    let (year, month) = s.split_once('-')?;
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let month: u32 = month.parse().ok()?;
    match month {
        1..=6 => Some(format!("Spring {}", year)),
        7..=12 => Some(format!("Fall {}", year)),
        _ => None,
    }
}

/// Get a description of all available operations
pub fn operations_description() -> String {
    r#"Available normalization operations:

| Operation | Description | Parameters |
|-----------|-------------|------------|
| trim | Remove leading/trailing whitespace | - |
| replace | Regex pattern replacement | pattern: regex, value: replacement |
| map | Map values using lookup table (unmapped -> null) | mapping: {source: target}, default_unmapped: optional |
| format_date | Reformat a timestamp | format: strftime pattern, e.g. "%F" |
| humanize_date | YYYY-MM convocation date to "Spring YYYY" / "Fall YYYY" | - |
| join | Join a list into a string | separator |
| reject_blank | Drop blank list elements | - |

Scalar operations applied to a list run on each element.

Example operations in JSON:
[
  {"type": "replace", "pattern": "^doi:", "value": "https://doi.org/"},
  {"type": "map", "mapping": {"http://id.loc.gov/vocabulary/iso639-2/eng": "en"}},
  {"type": "join", "separator": "||"}
]"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map_op(pairs: &[(&str, &str)]) -> Operation {
        Operation::Map {
            mapping: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            default_unmapped: None,
        }
    }

    #[test]
    fn test_doi_rewrite() {
        let op = Operation::Replace {
            pattern: "^doi:".to_string(),
            value: "https://doi.org/".to_string(),
        };
        assert_eq!(
            op.apply(&json!("doi:10.7939/R3X")),
            json!("https://doi.org/10.7939/R3X")
        );
        // Only a leading prefix is rewritten.
        assert_eq!(op.apply(&json!("10.1/doi:x")), json!("10.1/doi:x"));
    }

    #[test]
    fn test_map_elementwise_with_unknown() {
        let op = map_op(&[("eng", "en"), ("fre", "fr")]);
        assert_eq!(
            op.apply(&json!(["eng", "xxx", "fre"])),
            json!(["en", null, "fr"])
        );
        assert_eq!(op.apply(&json!("fre")), json!("fr"));
        assert_eq!(op.apply(&json!(null)), json!(null));
    }

    #[test]
    fn test_map_default_unmapped() {
        let op = Operation::Map {
            mapping: BTreeMap::new(),
            default_unmapped: Some("other".to_string()),
        };
        assert_eq!(op.apply(&json!("zzz")), json!("other"));
    }

    #[test]
    fn test_join_renders_null_as_empty() {
        let op = Operation::Join { separator: " ".to_string() };
        assert_eq!(op.apply(&json!(["a", null, "b"])), json!("a  b"));
        assert_eq!(op.apply(&json!([])), json!(""));
        assert_eq!(op.apply(&json!("plain")), json!("plain"));
    }

    #[test]
    fn test_format_date() {
        let op = Operation::FormatDate { format: "%F".to_string() };
        assert_eq!(op.apply(&json!("2030-01-15T00:00:00.000Z")), json!("2030-01-15"));
        assert_eq!(op.apply(&json!("2030-01-15 00:00:00 UTC")), json!("2030-01-15"));
        assert_eq!(op.apply(&json!("not a date")), json!("not a date"));
    }

    #[test]
    fn test_humanize_date() {
        let op = Operation::HumanizeDate;
        assert_eq!(op.apply(&json!("2011-06")), json!("Spring 2011"));
        assert_eq!(op.apply(&json!("2011-11")), json!("Fall 2011"));
        assert_eq!(op.apply(&json!("2011")), json!("2011"));
        assert_eq!(op.apply(&json!("2011-13")), json!("2011-13"));
    }

    #[test]
    fn test_reject_blank() {
        let op = Operation::RejectBlank;
        assert_eq!(op.apply(&json!(["a", "", " ", null, "b"])), json!(["a", "b"]));
    }

    #[test]
    fn test_check_rejects_bad_regex() {
        let op = Operation::Replace { pattern: "(".to_string(), value: String::new() };
        assert!(op.check().is_err());
        assert!(Operation::Trim.check().is_ok());
    }

    #[test]
    fn test_serde_tagging() {
        let op: Operation = serde_json::from_value(json!({"type": "format_date", "format": "%F"})).unwrap();
        assert_eq!(op, Operation::FormatDate { format: "%F".to_string() });
    }
}
