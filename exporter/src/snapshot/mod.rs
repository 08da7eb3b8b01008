//! Jupiter snapshot loading and lookups.
//!
//! A snapshot is a directory of dumps taken from the Jupiter database:
//!
//! ```text
//! snapshot/
//! ├── items.jsonl         (or items.json, a JSON array)
//! ├── theses.jsonl
//! ├── collections.json
//! ├── communities.json
//! ├── users.json
//! ├── versions.jsonl      audit log
//! ├── attachments.jsonl   all attachments, for the bitstream delta
//! └── statistics.csv      id, views, downloads
//! ```
//!
//! Every file is optional; a missing dump is an empty table.

pub mod blobs;
pub mod statistics;

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{SnapshotError, SnapshotResult};
use crate::logs::{log_info, log_success};
use crate::models::{Attachment, JupiterRecord, RecordKind, User, Version};

pub use blobs::BlobStore;
pub use statistics::{StatisticsSource, StatisticsTable, UsageCounts};

/// Raw snapshot tables, before indexing.
#[derive(Debug, Clone, Default)]
pub struct SnapshotData {
    pub items: Vec<JupiterRecord>,
    pub theses: Vec<JupiterRecord>,
    pub collections: Vec<JupiterRecord>,
    pub communities: Vec<JupiterRecord>,
    pub users: Vec<User>,
    pub versions: Vec<Version>,
    pub attachments: Vec<Attachment>,
    pub statistics: StatisticsTable,
}

/// An indexed snapshot.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    data: SnapshotData,
    user_emails: HashMap<String, String>,
    /// (model name, record id) -> version positions, oldest first
    versions_by_record: HashMap<(String, String), Vec<usize>>,
    /// collection id -> position in `data.collections`
    collections_by_id: HashMap<String, usize>,
    /// community id -> position in `data.communities`
    communities_by_id: HashMap<String, usize>,
    /// (kind, record id) -> position in `data.items` / `data.theses`
    records_by_id: HashMap<(RecordKind, String), usize>,
    /// (kind, collection id) -> member record positions
    members: HashMap<(RecordKind, String), Vec<usize>>,
}

impl Snapshot {
    /// Index the given tables.
    pub fn new(data: SnapshotData) -> Self {
        let user_emails = data
            .users
            .iter()
            .filter_map(|u| {
                u.email
                    .as_ref()
                    .filter(|e| !e.trim().is_empty())
                    .map(|e| (u.id.clone(), e.clone()))
            })
            .collect();

        let mut versions_by_record: HashMap<(String, String), Vec<usize>> = HashMap::new();
        for (idx, version) in data.versions.iter().enumerate() {
            versions_by_record
                .entry((version.item_type.clone(), version.item_id.clone()))
                .or_default()
                .push(idx);
        }
        for positions in versions_by_record.values_mut() {
            // Stable sort keeps dump order for identical timestamps.
            positions.sort_by_key(|&idx| data.versions[idx].created_at());
        }

        let index_by_id = |records: &[JupiterRecord]| -> HashMap<String, usize> {
            records
                .iter()
                .enumerate()
                .map(|(idx, r)| (r.id(), idx))
                .collect()
        };
        let collections_by_id = index_by_id(&data.collections);
        let communities_by_id = index_by_id(&data.communities);
        let mut records_by_id = HashMap::new();
        for (kind, records) in [(RecordKind::Item, &data.items), (RecordKind::Thesis, &data.theses)] {
            for (id, idx) in index_by_id(records) {
                records_by_id.insert((kind, id), idx);
            }
        }

        let mut members: HashMap<(RecordKind, String), Vec<usize>> = HashMap::new();
        for kind in [RecordKind::Item, RecordKind::Thesis] {
            let records = match kind {
                RecordKind::Item => &data.items,
                RecordKind::Thesis => &data.theses,
            };
            for (idx, record) in records.iter().enumerate() {
                let mut seen: Vec<&str> = Vec::new();
                for collection_id in record.collection_ids() {
                    if seen.contains(&collection_id) {
                        continue;
                    }
                    seen.push(collection_id);
                    members
                        .entry((kind, collection_id.to_string()))
                        .or_default()
                        .push(idx);
                }
            }
        }

        Self {
            data,
            user_emails,
            versions_by_record,
            collections_by_id,
            communities_by_id,
            records_by_id,
            members,
        }
    }

    /// Load and index every dump found in `dir`.
    pub fn load(dir: &Path) -> SnapshotResult<Self> {
        log_info(format!("📂 Loading snapshot from {}", dir.display()));

        let statistics_path = dir.join("statistics.csv");
        let statistics = if statistics_path.exists() {
            StatisticsTable::from_csv_path(&statistics_path)?
        } else {
            StatisticsTable::new()
        };

        let data = SnapshotData {
            items: load_table(dir, "items")?,
            theses: load_table(dir, "theses")?,
            collections: load_table(dir, "collections")?,
            communities: load_table(dir, "communities")?,
            users: load_table(dir, "users")?,
            versions: load_table(dir, "versions")?,
            attachments: load_table(dir, "attachments")?,
            statistics,
        };

        log_success(format!(
            "{} items, {} theses, {} collections, {} communities, {} users, {} versions",
            data.items.len(),
            data.theses.len(),
            data.collections.len(),
            data.communities.len(),
            data.users.len(),
            data.versions.len()
        ));

        Ok(Self::new(data))
    }

    pub fn items(&self) -> &[JupiterRecord] {
        &self.data.items
    }

    pub fn theses(&self) -> &[JupiterRecord] {
        &self.data.theses
    }

    /// Deposit records of the given kind.
    pub fn records(&self, kind: RecordKind) -> &[JupiterRecord] {
        match kind {
            RecordKind::Item => &self.data.items,
            RecordKind::Thesis => &self.data.theses,
        }
    }

    pub fn collections(&self) -> &[JupiterRecord] {
        &self.data.collections
    }

    pub fn communities(&self) -> &[JupiterRecord] {
        &self.data.communities
    }

    pub fn versions(&self) -> &[Version] {
        &self.data.versions
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.data.attachments
    }

    pub fn statistics(&self) -> &StatisticsTable {
        &self.data.statistics
    }

    pub fn user_email(&self, user_id: &str) -> Option<&str> {
        self.user_emails.get(user_id).map(String::as_str)
    }

    /// Audit-log rows for a record, oldest first.
    pub fn versions_for(&self, kind: RecordKind, record_id: &str) -> Vec<&Version> {
        self.versions_by_record
            .get(&(kind.model_name().to_string(), record_id.to_string()))
            .map(|positions| positions.iter().map(|&i| &self.data.versions[i]).collect())
            .unwrap_or_default()
    }

    /// An item or thesis by id.
    pub fn record(&self, kind: RecordKind, record_id: &str) -> Option<&JupiterRecord> {
        self.records_by_id
            .get(&(kind, record_id.to_string()))
            .map(|&i| &self.records(kind)[i])
    }

    pub fn collection(&self, collection_id: &str) -> Option<&JupiterRecord> {
        self.collections_by_id
            .get(collection_id)
            .map(|&i| &self.data.collections[i])
    }

    pub fn community(&self, community_id: &str) -> Option<&JupiterRecord> {
        self.communities_by_id
            .get(community_id)
            .map(|&i| &self.data.communities[i])
    }

    /// Records of `kind` filed under a collection, in dump order.
    pub fn members(&self, kind: RecordKind, collection_id: &str) -> Vec<&JupiterRecord> {
        let records = self.records(kind);
        self.members
            .get(&(kind, collection_id.to_string()))
            .map(|positions| positions.iter().map(|&i| &records[i]).collect())
            .unwrap_or_default()
    }
}

/// Find `<name>.jsonl` or `<name>.json` in `dir`.
fn table_path(dir: &Path, name: &str) -> Option<PathBuf> {
    ["jsonl", "json"]
        .iter()
        .map(|ext| dir.join(format!("{}.{}", name, ext)))
        .find(|p| p.exists())
}

fn load_table<T: DeserializeOwned>(dir: &Path, name: &str) -> SnapshotResult<Vec<T>> {
    match table_path(dir, name) {
        Some(path) => read_records(&path),
        None => Ok(Vec::new()),
    }
}

/// Read a dump file: a JSON array, or one JSON object per line.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> SnapshotResult<Vec<T>> {
    let content = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_records(&content).map_err(|(line, message)| SnapshotError::Json {
        path: path.to_path_buf(),
        line,
        message,
    })
}

/// Parse dump content, reporting the failing line on error.
pub(crate) fn parse_records<T: DeserializeOwned>(content: &str) -> Result<Vec<T>, (usize, String)> {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(content).map_err(|e| (e.line(), e.to_string()));
    }

    let mut records = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|e| (idx + 1, e.to_string()))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn record(value: serde_json::Value) -> JupiterRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_json_lines_and_array() {
        let lines = "{\"id\": 1, \"email\": \"a@x.ca\"}\n\n{\"id\": \"2\"}\n";
        let users: Vec<User> = parse_records(lines).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, "1");

        let array = "[{\"id\": \"3\", \"email\": null}]";
        let users: Vec<User> = parse_records(array).unwrap();
        assert_eq!(users[0].id, "3");
        assert!(users[0].email.is_none());
    }

    #[test]
    fn test_parse_error_reports_line() {
        let lines = "{\"id\": 1}\n{broken\n";
        let err = parse_records::<User>(lines).unwrap_err();
        assert_eq!(err.0, 2);
    }

    #[test]
    fn test_load_directory_with_missing_tables() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("items.jsonl"),
            "{\"id\": \"i1\", \"member_of_paths\": [\"c1/k1\"]}\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("statistics.csv"),
            "id,views,downloads\ni1,4,2\n",
        )
        .unwrap();

        let snapshot = Snapshot::load(dir.path()).unwrap();
        assert_eq!(snapshot.items().len(), 1);
        assert!(snapshot.theses().is_empty());
        assert_eq!(snapshot.members(RecordKind::Item, "k1").len(), 1);
        assert_eq!(snapshot.statistics().counts("i1").views, 4);
    }

    #[test]
    fn test_load_reports_bad_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("users.json"), "[{\"id\": }]").unwrap();
        let err = Snapshot::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("users.json"));
    }

    #[test]
    fn test_versions_sorted_and_scoped_by_model() {
        let version = |kind: &str, at: &str, event: &str| -> Version {
            serde_json::from_value(json!({
                "item_type": kind,
                "item_id": "r1",
                "event": event,
                "created_at": at,
                "object_changes": {}
            }))
            .unwrap()
        };
        let snapshot = Snapshot::new(SnapshotData {
            versions: vec![
                version("Item", "2021-01-02 00:00:00 UTC", "update"),
                version("Item", "2021-01-01 00:00:00 UTC", "create"),
                version("Thesis", "2021-01-01 00:00:00 UTC", "create"),
            ],
            ..SnapshotData::default()
        });

        let events: Vec<&str> = snapshot
            .versions_for(RecordKind::Item, "r1")
            .iter()
            .map(|v| v.event.as_str())
            .collect();
        assert_eq!(events, vec!["create", "update"]);
        assert_eq!(snapshot.versions_for(RecordKind::Thesis, "r1").len(), 1);
        assert!(snapshot.versions_for(RecordKind::Item, "other").is_empty());
    }

    #[test]
    fn test_lookups() {
        let snapshot = Snapshot::new(SnapshotData {
            collections: vec![record(json!({"id": "k1", "title": "Grants", "community_id": "c1"}))],
            communities: vec![record(json!({"id": "c1", "title": "Research"}))],
            users: vec![
                serde_json::from_value(json!({"id": 5, "email": "owner@ualberta.ca"})).unwrap(),
                serde_json::from_value(json!({"id": 6, "email": " "})).unwrap(),
            ],
            theses: vec![record(json!({"id": "t1", "member_of_paths": ["c1/k1", "c1/k1"]}))],
            ..SnapshotData::default()
        });

        assert_eq!(snapshot.user_email("5"), Some("owner@ualberta.ca"));
        assert_eq!(snapshot.user_email("6"), None);
        let collection = snapshot.collection("k1").unwrap();
        assert_eq!(collection.title(), Some("Grants"));
        let community_id = collection.community_id().unwrap();
        assert_eq!(snapshot.community(&community_id).unwrap().title(), Some("Research"));
        // Duplicate paths do not duplicate membership.
        assert_eq!(snapshot.members(RecordKind::Thesis, "k1").len(), 1);
        assert!(snapshot.members(RecordKind::Item, "k1").is_empty());
        assert_eq!(snapshot.record(RecordKind::Thesis, "t1").unwrap().id(), "t1");
        assert!(snapshot.record(RecordKind::Item, "t1").is_none());
    }
}
