//! Change reports: what happened in Jupiter since a date.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;
use std::path::PathBuf;

use super::{create_csv, ensure_dir};
use crate::error::ExportResult;
use crate::logs::{log_info, log_success};
use crate::models::{parse_datetime, JupiterRecord, Version};
use crate::transform::{DeltaMapper, ExportContext};

pub const CHANGES_HEADERS: [&str; 6] = ["type", "id", "changed at", "event", "delta", "scholaris delta"];

/// Bitstream change columns, spelled as the downstream tooling expects.
pub const BITSTREAM_HEADERS: [&str; 10] = [
    "attachment.record_type",
    "attachement.record_id",
    "attachement.fileset_uuid",
    "attachment.created_at",
    "blob.id",
    "blob.created_at",
    "blob.filename",
    "blob.content_type",
    "blob.byte_size",
    "blob.checksum",
];

/// Midnight UTC at the start of a day.
fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::default()).and_utc()
}

/// Number of records of each type created or modified since a date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    pub items: usize,
    pub theses: usize,
    pub collections: usize,
    pub communities: usize,
}

impl std::fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} items, {} theses, {} collections and {} communities were created or modified.",
            self.items, self.theses, self.collections, self.communities
        )
    }
}

/// Audit-log rows since a date, with their DSpace delta.
pub struct ChangesReport<'a> {
    ctx: &'a ExportContext<'a>,
    mapper: &'a DeltaMapper,
    since: NaiveDate,
    output_dir: PathBuf,
}

impl<'a> ChangesReport<'a> {
    pub fn new(
        ctx: &'a ExportContext<'a>,
        mapper: &'a DeltaMapper,
        since: NaiveDate,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ctx,
            mapper,
            since,
            output_dir: output_dir.into(),
        }
    }

    /// `<date>_changes.csv`
    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_changes.csv", self.since.format("%Y-%m-%d")))
    }

    /// Versions created on or after the date, oldest first.
    pub fn versions(&self) -> Vec<&'a Version> {
        let since = start_of(self.since);
        let mut versions: Vec<(DateTime<Utc>, &'a Version)> = self
            .ctx
            .snapshot
            .versions()
            .iter()
            .filter_map(|v| v.created_at().map(|at| (at, v)))
            .filter(|(at, _)| *at >= since)
            .collect();
        versions.sort_by_key(|(at, _)| *at);
        versions.into_iter().map(|(_, v)| v).collect()
    }

    /// Records of each type with `updated_at` on or after the date.
    pub fn summary(&self) -> ChangeSummary {
        let since = start_of(self.since);
        let count = |records: &[JupiterRecord]| {
            records
                .iter()
                .filter(|r| r.updated_at().is_some_and(|at| at >= since))
                .count()
        };
        let snapshot = self.ctx.snapshot;
        ChangeSummary {
            items: count(snapshot.items()),
            theses: count(snapshot.theses()),
            collections: count(snapshot.collections()),
            communities: count(snapshot.communities()),
        }
    }

    pub fn run(&self) -> ExportResult<ChangeSummary> {
        ensure_dir(&self.output_dir)?;
        let path = self.output_path();
        let mut writer = create_csv(&path, &CHANGES_HEADERS)?;

        let versions = self.versions();
        log_info(format!("🔎 {} changes since {}", versions.len(), self.since));

        for version in &versions {
            let delta = Value::Object(version.object_changes.clone());
            let scholaris = Value::Object(self.mapper.map_version(version, self.ctx));
            writer.write_record([
                version.item_type.clone(),
                version.item_id.clone(),
                version.created_at.clone(),
                version.event.clone(),
                delta.to_string(),
                scholaris.to_string(),
            ])?;
        }
        writer.flush()?;

        let summary = self.summary();
        log_success(format!("{} -> {}", summary, path.display()));
        Ok(summary)
    }
}

/// Attachments created after a date.
pub struct BitstreamChangeReport<'a> {
    ctx: &'a ExportContext<'a>,
    since: NaiveDate,
    output_dir: PathBuf,
}

impl<'a> BitstreamChangeReport<'a> {
    pub fn new(ctx: &'a ExportContext<'a>, since: NaiveDate, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            ctx,
            since,
            output_dir: output_dir.into(),
        }
    }

    /// `<date>_bitstream_changes.csv`
    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_bitstream_changes.csv", self.since.format("%Y-%m-%d")))
    }

    pub fn run(&self) -> ExportResult<usize> {
        ensure_dir(&self.output_dir)?;
        let since = start_of(self.since);
        let path = self.output_path();
        let mut writer = create_csv(&path, &BITSTREAM_HEADERS)?;

        let mut rows = 0;
        for attachment in self.ctx.snapshot.attachments() {
            let created = attachment.created_at.as_deref().and_then(parse_datetime);
            if !created.is_some_and(|at| at > since) {
                continue;
            }
            let blob = &attachment.blob;
            writer.write_record([
                attachment.record_type.clone().unwrap_or_default(),
                attachment.record_id.clone().unwrap_or_default(),
                attachment.fileset_uuid.clone().unwrap_or_default(),
                attachment.created_at.clone().unwrap_or_default(),
                blob.id.clone().unwrap_or_default(),
                blob.created_at.clone().unwrap_or_default(),
                blob.filename.clone(),
                blob.content_type.clone().unwrap_or_default(),
                blob.byte_size.map(|s| s.to_string()).unwrap_or_default(),
                blob.checksum.clone().unwrap_or_default(),
            ])?;
            rows += 1;
        }
        writer.flush()?;

        log_success(format!("{} new bitstreams -> {}", rows, path.display()));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::read_csv_file;
    use crate::snapshot::{BlobStore, Snapshot, SnapshotData};
    use serde_json::json;
    use tempfile::tempdir;

    fn snapshot() -> Snapshot {
        let version = |at: &str, kind: &str, changes: Value| -> Version {
            serde_json::from_value(json!({
                "item_type": kind,
                "item_id": "r1",
                "event": "update",
                "created_at": at,
                "object_changes": changes
            }))
            .unwrap()
        };
        let record = |value: Value| -> JupiterRecord { serde_json::from_value(value).unwrap() };

        Snapshot::new(SnapshotData {
            items: vec![
                record(json!({"id": "i1", "updated_at": "2024-05-01 00:00:00 UTC"})),
                record(json!({"id": "i2", "updated_at": "2024-04-30 23:59:59 UTC"})),
            ],
            theses: vec![record(json!({"id": "t1", "updated_at": "2024-05-02T10:00:00Z"}))],
            communities: vec![record(json!({"id": "c1"}))],
            versions: vec![
                version("2024-05-03 09:00:00 UTC", "Item", json!({"title": ["A", "B"]})),
                version("2024-04-01 09:00:00 UTC", "Item", json!({"title": ["0", "A"]})),
                version("2024-05-01 08:00:00 UTC", "Collection", json!({"title": ["x", "y"]})),
            ],
            attachments: vec![
                serde_json::from_value(json!({
                    "id": 1, "record_type": "Item", "record_id": "i1", "fileset_uuid": "fs1",
                    "created_at": "2024-05-02 00:00:00 UTC",
                    "blob": {"id": 9, "key": "k", "filename": "new.pdf", "byte_size": 12}
                }))
                .unwrap(),
                serde_json::from_value(json!({
                    "id": 2, "created_at": "2024-05-01 00:00:00 UTC",
                    "blob": {"key": "k2", "filename": "same-day.pdf"}
                }))
                .unwrap(),
            ],
            ..SnapshotData::default()
        })
    }

    fn may_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_changes_report() {
        let dir = tempdir().unwrap();
        let snapshot = snapshot();
        let blobs = BlobStore::new("storage");
        let ctx = ExportContext::new(&snapshot, &blobs);
        let mapper = DeltaMapper::default();
        let report = ChangesReport::new(&ctx, &mapper, may_first(), dir.path());

        let summary = report.run().unwrap();
        assert_eq!(
            summary,
            ChangeSummary { items: 1, theses: 1, collections: 0, communities: 0 }
        );
        assert_eq!(
            summary.to_string(),
            "1 items, 1 theses, 0 collections and 0 communities were created or modified."
        );

        let path = report.output_path();
        assert_eq!(path.file_name().unwrap(), "2024-05-01_changes.csv");
        let table = read_csv_file(&path).unwrap();
        assert_eq!(table.headers, CHANGES_HEADERS.to_vec());
        assert_eq!(table.len(), 2);
        // Oldest first.
        assert_eq!(table.rows[0][0], "Collection");
        assert_eq!(table.rows[0][5], "{}");
        assert_eq!(table.rows[1][4], r#"{"title":["A","B"]}"#);
        assert_eq!(table.rows[1][5], r#"{"dc.title":"B"}"#);
    }

    #[test]
    fn test_bitstream_changes_strictly_after() {
        let dir = tempdir().unwrap();
        let snapshot = snapshot();
        let blobs = BlobStore::new("storage");
        let ctx = ExportContext::new(&snapshot, &blobs);
        let report = BitstreamChangeReport::new(&ctx, may_first(), dir.path());

        assert_eq!(report.run().unwrap(), 1);
        let table = read_csv_file(&report.output_path()).unwrap();
        assert_eq!(table.headers, BITSTREAM_HEADERS.to_vec());
        assert_eq!(table.value(&table.rows[0], "blob.filename"), Some("new.pdf"));
        assert_eq!(table.value(&table.rows[0], "attachement.record_id"), Some("i1"));
        assert_eq!(table.value(&table.rows[0], "blob.id"), Some("9"));
    }
}
