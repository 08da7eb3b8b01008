//! Row builder
//!
//! Executes an export profile on a Jupiter record to produce one CSV row.

use serde_json::Value;

use super::history::edit_history;
use super::profile::{ColumnRule, ExportProfile, ValueSource, LIST_SEPARATOR};
use crate::models::{is_blank, scalar_to_string, JupiterRecord, RecordKind};
use crate::snapshot::{BlobStore, Snapshot, StatisticsSource};

/// Everything a row needs besides the record itself.
pub struct ExportContext<'a> {
    pub snapshot: &'a Snapshot,
    pub blobs: &'a BlobStore,
    statistics: &'a dyn StatisticsSource,
}

impl<'a> ExportContext<'a> {
    /// Context using the statistics loaded with the snapshot.
    pub fn new(snapshot: &'a Snapshot, blobs: &'a BlobStore) -> Self {
        Self {
            snapshot,
            blobs,
            statistics: snapshot.statistics(),
        }
    }

    /// Use another statistics source.
    pub fn with_statistics(mut self, statistics: &'a dyn StatisticsSource) -> Self {
        self.statistics = statistics;
        self
    }

    pub fn statistics(&self) -> &'a dyn StatisticsSource {
        self.statistics
    }
}

/// Build one CSV row for a record.
pub fn build_row(record: &JupiterRecord, profile: &ExportProfile, ctx: &ExportContext) -> Vec<String> {
    profile
        .columns
        .iter()
        .map(|rule| flatten(&column_value(record, profile.kind, rule, ctx)))
        .collect()
}

/// Resolve a column's source and run its operations.
pub fn column_value(
    record: &JupiterRecord,
    kind: RecordKind,
    rule: &ColumnRule,
    ctx: &ExportContext,
) -> Value {
    let value = resolve(record, kind, &rule.source, ctx);
    apply_operations(value, rule)
}

/// Run a column's operations, in order.
pub fn apply_operations(value: Value, rule: &ColumnRule) -> Value {
    rule.operations.iter().fold(value, |current, op| op.apply(&current))
}

/// Resolve the raw value of a source for a record.
pub fn resolve(
    record: &JupiterRecord,
    kind: RecordKind,
    source: &ValueSource,
    ctx: &ExportContext,
) -> Value {
    match source {
        ValueSource::Attribute { name } => record.attr(name).cloned().unwrap_or(Value::Null),

        ValueSource::Merge { names } => merge_attributes(record, names),

        ValueSource::Constant { value } => value.clone(),

        ValueSource::FileNames => Value::Array(
            record
                .ordered_files()
                .iter()
                .map(|f| Value::String(f.blob.filename.clone()))
                .collect(),
        ),

        ValueSource::FilePaths => Value::Array(
            record
                .ordered_files()
                .iter()
                .map(|f| {
                    Value::String(ctx.blobs.path_for(&f.blob.key).to_string_lossy().into_owned())
                })
                .collect(),
        ),

        ValueSource::ThumbnailIndex => {
            let logo_id = match record.attr("logo_id") {
                Some(v) if !v.is_null() => scalar_to_string(v),
                _ => return Value::Null,
            };
            record
                .files
                .iter()
                .position(|f| f.id == logo_id)
                .map(Value::from)
                .unwrap_or(Value::Null)
        }

        ValueSource::OwnerEmail => record
            .attr("owner_id")
            .filter(|v| !v.is_null())
            .and_then(|v| ctx.snapshot.user_email(&scalar_to_string(v)))
            .map(|email| Value::String(email.to_string()))
            .unwrap_or(Value::Null),

        ValueSource::StatViews => Value::from(ctx.statistics().counts(&record.id()).views),

        ValueSource::StatDownloads => Value::from(ctx.statistics().counts(&record.id()).downloads),

        ValueSource::EditHistory => {
            let versions = ctx.snapshot.versions_for(kind, &record.id());
            Value::String(edit_history(
                record.attr("embargo_history"),
                &versions,
                |id| ctx.snapshot.user_email(id),
            ))
        }
    }
}

/// Non-blank values of several attributes, list attributes flattened in.
fn merge_attributes(record: &JupiterRecord, names: &[String]) -> Value {
    let mut merged = Vec::new();
    for name in names {
        match record.attr(name) {
            Some(Value::Array(values)) => merged.extend(values.iter().cloned()),
            Some(value) => merged.push(value.clone()),
            None => {}
        }
    }
    merged.retain(|v| !is_blank(v));
    Value::Array(merged)
}

/// Render a value as a CSV cell: lists joined with `||`, XML-invalid
/// characters stripped, null as empty.
pub fn flatten(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Array(items) => remove_xml_invalid_characters(
            &items
                .iter()
                .map(scalar_to_string)
                .collect::<Vec<_>>()
                .join(LIST_SEPARATOR),
        ),
        Value::String(s) => remove_xml_invalid_characters(s),
        Value::Object(_) => remove_xml_invalid_characters(&value.to_string()),
        other => scalar_to_string(other),
    }
}

/// Drop control characters that XML 1.0 rejects (DSpace SAF is XML).
/// Tab, line feed and carriage return are kept.
pub fn remove_xml_invalid_characters(value: &str) -> String {
    value.chars().filter(|c| !is_xml_invalid(*c)).collect()
}

fn is_xml_invalid(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{0008}' | '\u{000B}' | '\u{000C}' | '\u{000E}'..='\u{001F}' | '\u{007F}'..='\u{009F}')
}
