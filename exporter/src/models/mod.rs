//! Domain models for the Jupiter snapshot.
//!
//! - [`JupiterRecord`] - an Item, Thesis, Collection or Community with its attributes
//! - [`Attachment`] / [`Blob`] - a file attached to a record
//! - [`Version`] - one audit-log row (who changed what, when)
//! - [`User`] - a depositor or editor
//! - [`RecordKind`] - which Jupiter model a deposit record belongs to

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Record Kind
// =============================================================================

/// The two Jupiter deposit models exported to DSpace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Item,
    Thesis,
}

impl RecordKind {
    /// Model name as stored in audit-log rows (`item_type`).
    pub fn model_name(&self) -> &'static str {
        match self {
            RecordKind::Item => "Item",
            RecordKind::Thesis => "Thesis",
        }
    }

    /// Plural used in export file names.
    pub fn plural(&self) -> &'static str {
        match self {
            RecordKind::Item => "items",
            RecordKind::Thesis => "theses",
        }
    }

    /// Resolve an audit-log `item_type`.
    pub fn from_model_name(name: &str) -> Option<Self> {
        match name {
            "Item" => Some(RecordKind::Item),
            "Thesis" => Some(RecordKind::Thesis),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.model_name())
    }
}

// =============================================================================
// Records
// =============================================================================

/// A Jupiter record: every column of the source row, in source order,
/// plus the files attached to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JupiterRecord {
    #[serde(flatten)]
    pub attributes: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<Attachment>,
}

impl JupiterRecord {
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self { attributes, files: Vec::new() }
    }

    pub fn with_files(mut self, files: Vec<Attachment>) -> Self {
        self.files = files;
        self
    }

    /// Record identifier (`id` attribute), numeric ids are stringified.
    pub fn id(&self) -> String {
        self.attributes.get("id").map(scalar_to_string).unwrap_or_default()
    }

    pub fn title(&self) -> Option<&str> {
        self.str_attr("title")
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// A string attribute, `None` when absent or blank.
    pub fn str_attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    /// Collection paths this record belongs to (`community_id/collection_id`).
    pub fn member_of_paths(&self) -> Vec<&str> {
        match self.attributes.get("member_of_paths") {
            Some(Value::Array(paths)) => paths.iter().filter_map(|p| p.as_str()).collect(),
            Some(Value::String(path)) if !path.is_empty() => vec![path.as_str()],
            _ => Vec::new(),
        }
    }

    /// Collection ids taken from the second segment of each path.
    pub fn collection_ids(&self) -> Vec<&str> {
        self.member_of_paths()
            .into_iter()
            .filter_map(|path| path.split('/').nth(1))
            .collect()
    }

    /// True when the record is filed under more than one collection.
    pub fn in_multiple_collections(&self) -> bool {
        self.member_of_paths().len() > 1
    }

    /// Attachments sorted by filename, case-insensitively.
    pub fn ordered_files(&self) -> Vec<&Attachment> {
        let mut files: Vec<&Attachment> = self.files.iter().collect();
        files.sort_by_key(|f| f.blob.filename.to_lowercase());
        files
    }

    /// Parsed `updated_at`, if present and readable.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.str_attr("updated_at").and_then(parse_datetime)
    }

    /// Parent community of a collection record.
    pub fn community_id(&self) -> Option<String> {
        self.attributes
            .get("community_id")
            .filter(|v| !v.is_null())
            .map(scalar_to_string)
    }
}

// =============================================================================
// Attachments
// =============================================================================

/// Stored file content metadata (an ActiveStorage blob).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Blob {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<String>,
    pub key: String,
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub byte_size: Option<u64>,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A file attached to a record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    #[serde(deserialize_with = "required_id")]
    pub id: String,
    #[serde(default)]
    pub fileset_uuid: Option<String>,
    #[serde(default)]
    pub record_type: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    pub record_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    pub blob: Blob,
}

// =============================================================================
// Users and audit log
// =============================================================================

/// A Jupiter user account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(deserialize_with = "required_id")]
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// One audit-log row recording a change to a record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Version {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<String>,
    pub item_type: String,
    #[serde(deserialize_with = "required_id")]
    pub item_id: String,
    pub event: String,
    #[serde(default, deserialize_with = "optional_id")]
    pub whodunnit: Option<String>,
    pub created_at: String,
    /// attribute -> `[old, new]`
    #[serde(default, deserialize_with = "null_as_default")]
    pub object_changes: Map<String, Value>,
}

impl Version {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_datetime(&self.created_at)
    }

    /// The value an attribute had after this change.
    pub fn new_value(&self, attribute: &str) -> Option<&Value> {
        match self.object_changes.get(attribute) {
            Some(Value::Array(pair)) if pair.len() == 2 => pair.get(1),
            _ => None,
        }
    }
}

// =============================================================================
// Value helpers
// =============================================================================

/// Ruby-style blankness: null, whitespace-only strings, empty collections and `false`.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}

/// Render a scalar without JSON quoting; structured values become JSON text.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Parse the timestamp shapes found in Jupiter dumps.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff][ UTC| +hhmm]`,
/// `YYYY-MM-DDTHH:MM:SS[.fff]` and plain `YYYY-MM-DD` (midnight UTC).
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = s.strip_suffix(" UTC").unwrap_or(s);
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn id_from_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(id_from_value(Value::deserialize(deserializer)?))
}

fn required_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    id_from_value(Value::deserialize(deserializer)?)
        .ok_or_else(|| serde::de::Error::custom("id must not be null"))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
