//! Raw Jupiter reports used to audit the migration.
//!
//! These are not DSpace ingest files: metadata dumps keep Jupiter attribute
//! names, the blob report lists stored files, and the statistics report
//! lists usage counts.

use serde_json::Value;
use std::path::{Path, PathBuf};

use super::{create_csv, ensure_dir, now_timestamp};
use crate::error::ExportResult;
use crate::logs::{log_success, log_warning};
use crate::models::{JupiterRecord, RecordKind};
use crate::snapshot::{Snapshot, StatisticsSource};

/// Header appended to the collection dump.
pub const COMMUNITY_TITLE_HEADER: &str = "community.title";

/// Blob report columns. `provenance.ual.jupiterId.item` and
/// `bitstream.sequenceId` line up with the DSpace export for joining.
pub const BLOB_HEADERS: [&str; 11] = [
    "item.id",
    "item.title",
    "provenance.ual.jupiterId.item",
    "bitstream.sequenceId",
    "key",
    "filename",
    "content_type",
    "metadata",
    "byte_size",
    "checksum",
    "created_at",
];

/// Statistics report columns.
pub const STATISTICS_HEADERS: [&str; 4] = [
    "id",
    "label",
    "ual.stats.jupiterViews",
    "ual.stats.jupiterDownloads",
];

/// Entity types with a raw metadata dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Communities,
    Collections,
    Items,
    Theses,
}

impl ReportKind {
    /// Name used in the dump file name.
    pub fn file_label(&self) -> &'static str {
        match self {
            ReportKind::Communities => "community",
            ReportKind::Collections => "collection",
            ReportKind::Items => RecordKind::Item.model_name(),
            ReportKind::Theses => RecordKind::Thesis.model_name(),
        }
    }

    /// Deposit record kind, for the types that can be restricted to a subset.
    pub fn record_kind(&self) -> Option<RecordKind> {
        match self {
            ReportKind::Items => Some(RecordKind::Item),
            ReportKind::Theses => Some(RecordKind::Thesis),
            _ => None,
        }
    }
}

/// Writes timestamped reports from a snapshot.
pub struct MetadataReport<'a> {
    snapshot: &'a Snapshot,
    output_dir: PathBuf,
    timestamp: String,
    subset: Option<Vec<String>>,
}

impl<'a> MetadataReport<'a> {
    pub fn new(snapshot: &'a Snapshot, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshot,
            output_dir: output_dir.into(),
            timestamp: now_timestamp(),
            subset: None,
        }
    }

    /// Fix the timestamp used in file names.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Restrict item and thesis reports to these ids, in this order.
    pub fn with_subset(mut self, ids: Vec<String>) -> Self {
        self.subset = Some(ids);
        self
    }

    fn file_path(&self, label: &str) -> PathBuf {
        let suffix = if self.subset.is_some() { "_subset" } else { "" };
        self.output_dir
            .join(format!("jupiter_{}{}_{}.csv", label, suffix, self.timestamp))
    }

    /// Deposit records of a kind, restricted to the subset when one is set.
    fn deposit_records(&self, kind: RecordKind) -> Vec<&'a JupiterRecord> {
        match &self.subset {
            None => self.snapshot.records(kind).iter().collect(),
            Some(ids) => ids
                .iter()
                .filter_map(|id| {
                    let found = self.snapshot.record(kind, id);
                    if found.is_none() {
                        log_warning(format!("{} {} not found in snapshot", kind, id));
                    }
                    found
                })
                .collect(),
        }
    }

    /// Raw attribute dump for one entity type.
    pub fn write_metadata(&self, kind: ReportKind) -> ExportResult<PathBuf> {
        ensure_dir(&self.output_dir)?;
        let records: Vec<&JupiterRecord> = match kind.record_kind() {
            Some(record_kind) => self.deposit_records(record_kind),
            None if kind == ReportKind::Communities => self.snapshot.communities().iter().collect(),
            None => self.snapshot.collections().iter().collect(),
        };

        let attribute_headers = attribute_union(&records);
        let mut headers = attribute_headers.clone();
        if kind == ReportKind::Collections {
            headers.push(COMMUNITY_TITLE_HEADER.to_string());
        }

        let path = self.file_path(kind.file_label());
        let mut writer = create_csv(&path, &headers)?;
        for record in &records {
            let mut row: Vec<String> = attribute_headers
                .iter()
                .map(|h| record.attr(h).map(raw_cell).unwrap_or_default())
                .collect();
            if kind == ReportKind::Collections {
                let title = record
                    .community_id()
                    .and_then(|id| self.snapshot.community(&id))
                    .and_then(|c| c.title())
                    .unwrap_or_default();
                row.push(title.to_string());
            }
            writer.write_record(&row)?;
        }
        writer.flush()?;

        log_success(format!("{} rows -> {}", records.len(), path.display()));
        Ok(path)
    }

    /// One row per stored file, numbered within each record.
    pub fn write_blobs(&self, kind: RecordKind) -> ExportResult<PathBuf> {
        ensure_dir(&self.output_dir)?;
        let path = self.file_path(&format!("{}_activestorage", kind.model_name()));
        let mut writer = create_csv(&path, &BLOB_HEADERS)?;

        let mut rows = 0;
        for record in self.deposit_records(kind) {
            let id = record.id();
            let title = record.title().unwrap_or_default();
            for (idx, file) in record.ordered_files().iter().enumerate() {
                let blob = &file.blob;
                writer.write_record([
                    id.clone(),
                    title.to_string(),
                    id.clone(),
                    (idx + 1).to_string(),
                    blob.key.clone(),
                    blob.filename.clone(),
                    blob.content_type.clone().unwrap_or_default(),
                    raw_cell(&blob.metadata),
                    blob.byte_size.map(|s| s.to_string()).unwrap_or_default(),
                    blob.checksum.clone().unwrap_or_default(),
                    blob.created_at.clone().unwrap_or_default(),
                ])?;
                rows += 1;
            }
        }
        writer.flush()?;

        log_success(format!("{} files -> {}", rows, path.display()));
        Ok(path)
    }

    /// View and download counts per record.
    pub fn write_statistics(
        &self,
        kind: RecordKind,
        statistics: &dyn StatisticsSource,
    ) -> ExportResult<PathBuf> {
        ensure_dir(&self.output_dir)?;
        let path = self.file_path(&format!("{}_statistics", kind.model_name()));
        let mut writer = create_csv(&path, &STATISTICS_HEADERS)?;

        let records = self.deposit_records(kind);
        for record in &records {
            let id = record.id();
            let counts = statistics.counts(&id);
            writer.write_record([
                id,
                record.title().unwrap_or_default().to_string(),
                counts.views.to_string(),
                counts.downloads.to_string(),
            ])?;
        }
        writer.flush()?;

        log_success(format!("{} rows -> {}", records.len(), path.display()));
        Ok(path)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Attribute names across records, in first-seen order.
fn attribute_union(records: &[&JupiterRecord]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for record in records {
        for key in record.attributes.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    headers
}

/// A raw attribute as written in dumps: scalars as text, lists and
/// objects as JSON.
fn raw_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attachment, Blob};
    use crate::parser::read_csv_file;
    use crate::snapshot::{SnapshotData, StatisticsTable, UsageCounts};
    use serde_json::json;
    use tempfile::tempdir;

    fn record(value: Value) -> JupiterRecord {
        serde_json::from_value(value).unwrap()
    }

    fn attachment(id: &str, filename: &str) -> Attachment {
        Attachment {
            id: id.to_string(),
            blob: Blob {
                key: format!("key-{}", id),
                filename: filename.to_string(),
                byte_size: Some(100),
                metadata: json!({"identified": true}),
                ..Blob::default()
            },
            ..Attachment::default()
        }
    }

    fn snapshot() -> Snapshot {
        let mut statistics = StatisticsTable::new();
        statistics.insert("i1", UsageCounts { views: 3, downloads: 1 });
        Snapshot::new(SnapshotData {
            communities: vec![record(json!({"id": "c1", "title": "Research"}))],
            collections: vec![
                record(json!({"id": "k1", "title": "Grants", "community_id": "c1"})),
                record(json!({"id": "k2", "title": "Orphan", "community_id": "gone", "restricted": true})),
            ],
            items: vec![
                record(json!({"id": "i1", "title": "First", "creators": ["A", "B"]}))
                    .with_files(vec![attachment("f2", "b.pdf"), attachment("f1", "a.pdf")]),
                record(json!({"id": "i2", "title": "Second", "doi": "doi:1"})),
            ],
            statistics,
            ..SnapshotData::default()
        })
    }

    #[test]
    fn test_item_metadata_dump() {
        let dir = tempdir().unwrap();
        let snapshot = snapshot();
        let path = MetadataReport::new(&snapshot, dir.path())
            .with_timestamp("2025-03-06_12-05-19")
            .write_metadata(ReportKind::Items)
            .unwrap();

        assert_eq!(path.file_name().unwrap(), "jupiter_Item_2025-03-06_12-05-19.csv");
        let table = read_csv_file(&path).unwrap();
        assert_eq!(table.headers, vec!["id", "title", "creators", "doi"]);
        assert_eq!(table.rows[0], vec!["i1", "First", "[\"A\",\"B\"]", ""]);
        assert_eq!(table.rows[1][3], "doi:1");
    }

    #[test]
    fn test_collection_dump_appends_community_title() {
        let dir = tempdir().unwrap();
        let snapshot = snapshot();
        let path = MetadataReport::new(&snapshot, dir.path())
            .with_timestamp("ts")
            .write_metadata(ReportKind::Collections)
            .unwrap();

        assert_eq!(path.file_name().unwrap(), "jupiter_collection_ts.csv");
        let table = read_csv_file(&path).unwrap();
        assert_eq!(table.headers.last().unwrap(), COMMUNITY_TITLE_HEADER);
        assert_eq!(table.value(&table.rows[0], COMMUNITY_TITLE_HEADER), Some("Research"));
        assert_eq!(table.value(&table.rows[1], COMMUNITY_TITLE_HEADER), Some(""));
        assert_eq!(table.value(&table.rows[1], "restricted"), Some("true"));
    }

    #[test]
    fn test_subset_keeps_given_order_and_skips_missing() {
        let dir = tempdir().unwrap();
        let snapshot = snapshot();
        let path = MetadataReport::new(&snapshot, dir.path())
            .with_timestamp("ts")
            .with_subset(vec!["i2".into(), "nope".into(), "i1".into()])
            .write_metadata(ReportKind::Items)
            .unwrap();

        assert_eq!(path.file_name().unwrap(), "jupiter_Item_subset_ts.csv");
        let table = read_csv_file(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][0], "i2");
    }

    #[test]
    fn test_blob_report_numbers_ordered_files() {
        let dir = tempdir().unwrap();
        let snapshot = snapshot();
        let path = MetadataReport::new(&snapshot, dir.path())
            .with_timestamp("ts")
            .write_blobs(RecordKind::Item)
            .unwrap();

        assert_eq!(path.file_name().unwrap(), "jupiter_Item_activestorage_ts.csv");
        let table = read_csv_file(&path).unwrap();
        assert_eq!(table.headers, BLOB_HEADERS.to_vec());
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(&table.rows[0], "filename"), Some("a.pdf"));
        assert_eq!(table.value(&table.rows[0], "bitstream.sequenceId"), Some("1"));
        assert_eq!(table.value(&table.rows[1], "bitstream.sequenceId"), Some("2"));
        assert_eq!(table.value(&table.rows[1], "metadata"), Some("{\"identified\":true}"));
        assert_eq!(table.value(&table.rows[1], "byte_size"), Some("100"));
    }

    #[test]
    fn test_statistics_report() {
        let dir = tempdir().unwrap();
        let snapshot = snapshot();
        let path = MetadataReport::new(&snapshot, dir.path())
            .with_timestamp("ts")
            .write_statistics(RecordKind::Item, snapshot.statistics())
            .unwrap();

        let table = read_csv_file(&path).unwrap();
        assert_eq!(table.headers, STATISTICS_HEADERS.to_vec());
        assert_eq!(table.rows[0], vec!["i1", "First", "3", "1"]);
        assert_eq!(table.rows[1], vec!["i2", "Second", "0", "0"]);

        // The report reads back as a statistics table.
        let reloaded = StatisticsTable::from_csv_path(&path).unwrap();
        assert_eq!(reloaded.counts("i1"), UsageCounts { views: 3, downloads: 1 });
    }
}
