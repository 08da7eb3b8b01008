//! View and download counts per record.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{SnapshotError, SnapshotResult};

/// Header names accepted for the views column.
const VIEW_COLUMNS: [&str; 2] = ["ual.stats.jupiterViews", "views"];
/// Header names accepted for the downloads column.
const DOWNLOAD_COLUMNS: [&str; 2] = ["ual.stats.jupiterDownloads", "downloads"];

/// Usage counts for a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageCounts {
    pub views: u64,
    pub downloads: u64,
}

/// Source of usage statistics.
pub trait StatisticsSource {
    /// Counts for a record; records never seen report zero.
    fn counts(&self, record_id: &str) -> UsageCounts;
}

/// Statistics loaded from a CSV table (`id`, views, downloads).
#[derive(Debug, Clone, Default)]
pub struct StatisticsTable {
    counts: HashMap<String, UsageCounts>,
}

impl StatisticsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record_id: impl Into<String>, counts: UsageCounts) {
        self.counts.insert(record_id.into(), counts);
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Load a statistics CSV. The statistics report written by this tool
    /// can be read back as-is.
    pub fn from_csv_path(path: &Path) -> SnapshotResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_csv_bytes(&bytes).map_err(|message| SnapshotError::Statistics {
            path: path.to_path_buf(),
            message,
        })
    }

    fn from_csv_bytes(bytes: &[u8]) -> Result<Self, String> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);
        let headers = reader.headers().map_err(|e| e.to_string())?.clone();

        let find = |names: &[&str]| headers.iter().position(|h| names.contains(&h.trim()));
        let id_col = find(&["id"][..]).ok_or("missing 'id' column")?;
        let views_col = find(&VIEW_COLUMNS[..]).ok_or("missing views column")?;
        let downloads_col = find(&DOWNLOAD_COLUMNS[..]).ok_or("missing downloads column")?;

        let mut table = Self::new();
        for (idx, row) in reader.records().enumerate() {
            let row = row.map_err(|e| e.to_string())?;
            let line = idx + 2;
            let id = row.get(id_col).unwrap_or("").trim();
            if id.is_empty() {
                continue;
            }
            let parse = |col: usize| -> Result<u64, String> {
                let raw = row.get(col).unwrap_or("").trim();
                if raw.is_empty() {
                    return Ok(0);
                }
                raw.parse::<u64>()
                    .map_err(|e| format!("line {}: '{}' is not a count: {}", line, raw, e))
            };
            table.insert(
                id,
                UsageCounts {
                    views: parse(views_col)?,
                    downloads: parse(downloads_col)?,
                },
            );
        }
        Ok(table)
    }
}

impl StatisticsSource for StatisticsTable {
    fn counts(&self, record_id: &str) -> UsageCounts {
        self.counts.get(record_id).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_headers_round_trip() {
        let csv = "id,label,ual.stats.jupiterViews,ual.stats.jupiterDownloads\n\
                   abc,Some title,12,3\n\
                   def,Other,,\n";
        let table = StatisticsTable::from_csv_bytes(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.counts("abc"), UsageCounts { views: 12, downloads: 3 });
        assert_eq!(table.counts("def"), UsageCounts::default());
    }

    #[test]
    fn test_short_headers_and_unknown_id() {
        let csv = "downloads,views,id\n5,9,xyz\n";
        let table = StatisticsTable::from_csv_bytes(csv.as_bytes()).unwrap();
        assert_eq!(table.counts("xyz"), UsageCounts { views: 9, downloads: 5 });
        assert_eq!(table.counts("missing"), UsageCounts::default());
    }

    #[test]
    fn test_bad_count_reports_line() {
        let csv = "id,views,downloads\nabc,many,1\n";
        let err = StatisticsTable::from_csv_bytes(csv.as_bytes()).unwrap_err();
        assert!(err.contains("line 2"));
    }

    #[test]
    fn test_missing_column() {
        let err = StatisticsTable::from_csv_bytes(b"id,views\n").unwrap_err();
        assert!(err.contains("downloads"));
    }
}
