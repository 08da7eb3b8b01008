//! Change-delta mapper
//!
//! Expresses an audit-log change set in DSpace terms: every column that
//! depends on a changed attribute is reported with its full new value,
//! computed from the snapshot record with the changes applied.

use serde_json::{Map, Value};

use super::executor::{column_value, flatten, ExportContext};
use super::profile::ExportProfile;
use crate::models::{JupiterRecord, RecordKind, Version};

/// Maps audit-log rows to DSpace header/value pairs.
#[derive(Debug, Clone)]
pub struct DeltaMapper {
    item: ExportProfile,
    thesis: ExportProfile,
}

impl Default for DeltaMapper {
    fn default() -> Self {
        Self::new(
            ExportProfile::builtin(RecordKind::Item),
            ExportProfile::builtin(RecordKind::Thesis),
        )
    }
}

impl DeltaMapper {
    pub fn new(item: ExportProfile, thesis: ExportProfile) -> Self {
        Self { item, thesis }
    }

    pub fn profile(&self, kind: RecordKind) -> &ExportProfile {
        match kind {
            RecordKind::Item => &self.item,
            RecordKind::Thesis => &self.thesis,
        }
    }

    /// DSpace delta of one audit-log row, in profile column order.
    ///
    /// Rows for other models (collections, communities, ...) map to an
    /// empty object.
    pub fn map_version(&self, version: &Version, ctx: &ExportContext) -> Map<String, Value> {
        let mut delta = Map::new();
        let Some(kind) = RecordKind::from_model_name(&version.item_type) else {
            return delta;
        };
        if version.object_changes.is_empty() {
            return delta;
        }

        let current = ctx.snapshot.record(kind, &version.item_id);
        let record = changed_record(version, current);
        let profile = self.profile(kind);
        for rule in &profile.columns {
            let triggered = rule
                .source
                .derivable_from()
                .iter()
                .any(|attr| version.object_changes.contains_key(*attr));
            if !triggered {
                continue;
            }
            let value = column_value(&record, kind, rule, ctx);
            delta.insert(rule.header.clone(), Value::String(flatten(&value)));
        }
        delta
    }
}

/// The record as it stands after the change: the snapshot record when it is
/// known, with the new values of the changed attributes on top.
fn changed_record(version: &Version, current: Option<&JupiterRecord>) -> JupiterRecord {
    let mut attributes = current.map(|r| r.attributes.clone()).unwrap_or_default();
    attributes.insert("id".to_string(), Value::String(version.item_id.clone()));
    for attr in version.object_changes.keys() {
        let value = version.new_value(attr).cloned().unwrap_or(Value::Null);
        attributes.insert(attr.clone(), value);
    }
    JupiterRecord::new(attributes)
}
