//! Collection file export: a report of every file in one collection, with
//! the files themselves copied next to it.

use std::path::{Path, PathBuf};

use super::{create_csv, ensure_dir, now_timestamp, ExportSummary};
use crate::config::ExportConfig;
use crate::error::{ExportError, ExportResult};
use crate::logs::{log_info, log_success};
use crate::models::{scalar_to_string, RecordKind};
use crate::snapshot::{BlobStore, Snapshot};

pub const FILE_EXPORT_HEADERS: [&str; 15] = [
    "item.id",
    "item.url",
    "item.title",
    "item.creators",
    "item.created_at",
    "item.updated_at",
    "bitstream.sequenceId",
    "file.key",
    "filename",
    "byte_size",
    "checksum",
    "created_at",
    "updated_at",
    "file_download_url",
    "local_file_path",
];

/// Copies the files of every item filed under a collection path.
pub struct CollectionFileExporter<'a> {
    snapshot: &'a Snapshot,
    blobs: &'a BlobStore,
    config: &'a ExportConfig,
    timestamp: String,
}

impl<'a> CollectionFileExporter<'a> {
    pub fn new(snapshot: &'a Snapshot, blobs: &'a BlobStore, config: &'a ExportConfig) -> Self {
        Self {
            snapshot,
            blobs,
            config,
            timestamp: now_timestamp(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// `jupiter_activestorage_<ts>.csv` in the output directory.
    pub fn report_path(&self) -> PathBuf {
        self.config
            .output_dir
            .join(format!("jupiter_activestorage_{}.csv", self.timestamp))
    }

    /// `jupiter_files_<ts>/` in the output directory.
    pub fn dump_dir(&self) -> PathBuf {
        self.config
            .output_dir
            .join(format!("jupiter_files_{}", self.timestamp))
    }

    /// Export the files of items whose `member_of_paths` contains `path`
    /// (`community_id/collection_id`).
    pub fn run(&self, member_of_path: &str) -> ExportResult<ExportSummary> {
        let dump_dir = self.dump_dir();
        ensure_dir(&dump_dir)?;
        let report_path = self.report_path();
        let mut writer = create_csv(&report_path, &FILE_EXPORT_HEADERS)?;
        let mut summary = ExportSummary {
            files_written: 1,
            ..ExportSummary::default()
        };

        log_info(format!("📁 Exporting files of {}", member_of_path));

        let items = self
            .snapshot
            .records(RecordKind::Item)
            .iter()
            .filter(|item| item.member_of_paths().contains(&member_of_path));

        for item in items {
            let item_id = item.id();
            let creators = item.attr("creators").map(scalar_to_string).unwrap_or_default();
            for (idx, file) in item.ordered_files().iter().enumerate() {
                let blob = &file.blob;
                let target = unique_target(&dump_dir, &blob.filename, &item_id);
                copy_blob(self.blobs, &blob.key, &target)?;
                summary.files_written += 1;

                let download_url = file
                    .fileset_uuid
                    .as_deref()
                    .map(|uuid| self.config.file_download_url(&item_id, uuid))
                    .unwrap_or_default();

                writer.write_record([
                    item_id.clone(),
                    self.config.item_url(&item_id),
                    item.title().unwrap_or_default().to_string(),
                    creators.clone(),
                    item.attr("created_at").map(scalar_to_string).unwrap_or_default(),
                    item.attr("updated_at").map(scalar_to_string).unwrap_or_default(),
                    (idx + 1).to_string(),
                    blob.key.clone(),
                    blob.filename.clone(),
                    blob.byte_size.map(|s| s.to_string()).unwrap_or_default(),
                    blob.checksum.clone().unwrap_or_default(),
                    blob.created_at.clone().unwrap_or_default(),
                    file.updated_at.clone().unwrap_or_default(),
                    download_url,
                    target.to_string_lossy().into_owned(),
                ])?;
                summary.rows_written += 1;
            }
        }
        writer.flush()?;

        log_success(format!(
            "{} files copied to {}",
            summary.rows_written,
            dump_dir.display()
        ));
        Ok(summary)
    }
}

/// `<dir>/<filename>`, or `<dir>/<filename>_duplicate_name_<item id>` when
/// that name is already taken. Directory parts of the stored name are
/// dropped so the copy stays inside `dir`.
fn unique_target(dir: &Path, filename: &str, item_id: &str) -> PathBuf {
    let filename = Path::new(filename)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("file_{}", item_id));
    let target = dir.join(&filename);
    if target.exists() {
        dir.join(format!("{}_duplicate_name_{}", filename, item_id))
    } else {
        target
    }
}

fn copy_blob(blobs: &BlobStore, key: &str, target: &Path) -> ExportResult<()> {
    let source = blobs.path_for(key);
    if !source.exists() {
        return Err(ExportError::MissingBlob {
            key: key.to_string(),
            path: source,
        });
    }
    std::fs::copy(&source, target)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attachment, Blob, JupiterRecord};
    use crate::parser::read_csv_file;
    use crate::snapshot::SnapshotData;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn attachment(id: &str, key: &str, filename: &str) -> Attachment {
        Attachment {
            id: id.to_string(),
            fileset_uuid: Some(format!("fs-{}", id)),
            blob: Blob {
                key: key.to_string(),
                filename: filename.to_string(),
                ..Blob::default()
            },
            ..Attachment::default()
        }
    }

    fn item(id: &str, paths: serde_json::Value, files: Vec<Attachment>) -> JupiterRecord {
        let record: JupiterRecord = serde_json::from_value(json!({
            "id": id,
            "title": format!("Item {}", id),
            "creators": ["Doe, Jane"],
            "member_of_paths": paths
        }))
        .unwrap();
        record.with_files(files)
    }

    fn store_blob(store: &BlobStore, key: &str, content: &str) {
        let path = store.path_for(key);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_export_copies_files_and_renames_duplicates() {
        let storage = tempdir().unwrap();
        let output = tempdir().unwrap();
        let blobs = BlobStore::new(storage.path());
        store_blob(&blobs, "aaaa1", "first");
        store_blob(&blobs, "bbbb2", "second");
        store_blob(&blobs, "cccc3", "other");

        let snapshot = Snapshot::new(SnapshotData {
            items: vec![
                item("i1", json!(["c/k"]), vec![attachment("1", "aaaa1", "report.pdf")]),
                item("i2", json!(["c/k", "c/z"]), vec![attachment("2", "bbbb2", "report.pdf")]),
                item("i3", json!(["c/z"]), vec![attachment("3", "cccc3", "skip.pdf")]),
            ],
            ..SnapshotData::default()
        });
        let config = ExportConfig {
            output_dir: output.path().to_path_buf(),
            base_url: "https://era.example.ca".to_string(),
            ..ExportConfig::default()
        };

        let exporter = CollectionFileExporter::new(&snapshot, &blobs, &config).with_timestamp("ts");
        let summary = exporter.run("c/k").unwrap();
        assert_eq!(summary.rows_written, 2);

        let dump = exporter.dump_dir();
        assert_eq!(fs::read_to_string(dump.join("report.pdf")).unwrap(), "first");
        assert_eq!(
            fs::read_to_string(dump.join("report.pdf_duplicate_name_i2")).unwrap(),
            "second"
        );
        assert!(!dump.join("skip.pdf").exists());

        let table = read_csv_file(&exporter.report_path()).unwrap();
        assert_eq!(table.headers, FILE_EXPORT_HEADERS.to_vec());
        let row = &table.rows[0];
        assert_eq!(table.value(row, "item.url"), Some("https://era.example.ca/items/i1"));
        assert_eq!(
            table.value(row, "file_download_url"),
            Some("https://era.example.ca/items/i1/download/fs-1")
        );
        assert_eq!(table.value(row, "item.creators"), Some("[\"Doe, Jane\"]"));
        assert_eq!(table.value(row, "bitstream.sequenceId"), Some("1"));
    }

    #[test]
    fn test_target_stays_inside_dump_dir() {
        let dir = tempdir().unwrap();
        assert_eq!(
            unique_target(dir.path(), "../../etc/passwd", "i1"),
            dir.path().join("passwd")
        );
        assert_eq!(unique_target(dir.path(), "scans/page 1.tif", "i1"), dir.path().join("page 1.tif"));
        assert_eq!(unique_target(dir.path(), "..", "i1"), dir.path().join("file_i1"));

        fs::write(dir.path().join("passwd"), "taken").unwrap();
        assert_eq!(
            unique_target(dir.path(), "a/passwd", "i2"),
            dir.path().join("passwd_duplicate_name_i2")
        );
    }

    #[test]
    fn test_missing_blob_is_an_error() {
        let storage = tempdir().unwrap();
        let output = tempdir().unwrap();
        let blobs = BlobStore::new(storage.path());
        let snapshot = Snapshot::new(SnapshotData {
            items: vec![item("i1", json!(["c/k"]), vec![attachment("1", "zzzz9", "a.pdf")])],
            ..SnapshotData::default()
        });
        let config = ExportConfig {
            output_dir: output.path().to_path_buf(),
            ..ExportConfig::default()
        };

        let err = CollectionFileExporter::new(&snapshot, &blobs, &config)
            .run("c/k")
            .unwrap_err();
        assert!(matches!(err, ExportError::MissingBlob { ref key, .. } if key == "zzzz9"));
    }
}
