//! CSV exports and reports.
//!
//! - Collections: DSpace-ready item/thesis files, one per collection
//! - Reports: raw metadata, blob and statistics dumps
//! - Files: collection file dump with copied blobs
//! - Changes: audit-log and bitstream deltas since a date

pub mod changes;
pub mod collections;
pub mod files;
pub mod reports;

use chrono::{DateTime, Local, TimeZone};
use std::fs::File;
use std::path::Path;

use crate::error::ExportResult;

pub use changes::{BitstreamChangeReport, ChangeSummary, ChangesReport};
pub use collections::CollectionExporter;
pub use files::CollectionFileExporter;
pub use reports::{MetadataReport, ReportKind};

/// Counts reported after an export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub files_written: usize,
    pub rows_written: usize,
    pub records_skipped: usize,
}

impl ExportSummary {
    pub fn summary(&self) -> String {
        format!(
            "{} files, {} rows, {} records skipped",
            self.files_written, self.rows_written, self.records_skipped
        )
    }
}

/// Timestamp used in report file names (`2025-03-06_12-05-19`).
pub fn file_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Timestamp for the current local time.
pub fn now_timestamp() -> String {
    file_timestamp(&Local::now())
}

/// Create the output directory if needed.
pub fn ensure_dir(dir: &Path) -> ExportResult<()> {
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// Open a CSV writer and write the header row.
pub fn create_csv<S: AsRef<str>>(path: &Path, headers: &[S]) -> ExportResult<csv::Writer<File>> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(headers.iter().map(|h| h.as_ref()))?;
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    #[test]
    fn test_file_timestamp() {
        let at = Utc.with_ymd_and_hms(2025, 3, 6, 12, 5, 19).unwrap();
        assert_eq!(file_timestamp(&at), "2025-03-06_12-05-19");
    }

    #[test]
    fn test_create_csv_writes_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut writer = create_csv(&path, &["id", "title"]).unwrap();
        writer.write_record(["1", "a, b"]).unwrap();
        writer.flush().unwrap();
        drop(writer);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "id,title\n1,\"a, b\"\n");
    }

    #[test]
    fn test_ensure_dir_nested() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
