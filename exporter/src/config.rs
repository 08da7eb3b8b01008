//! Export configuration.
//!
//! Values come from the environment (a `.env` file is loaded first by the
//! binary) and may be overridden by command-line flags.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default public base URL of the ERA site, used to build item links.
pub const DEFAULT_BASE_URL: &str = "https://era.library.ualberta.ca";

/// Default output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "era_export";

/// Paths and URLs shared by every export command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportConfig {
    /// Directory holding the snapshot files (`items.jsonl`, `users.json`, ...)
    pub snapshot_dir: PathBuf,

    /// Directory receiving CSV files
    pub output_dir: PathBuf,

    /// Root of the on-disk blob store
    pub blob_root: PathBuf,

    /// Public base URL used for item and download links
    pub base_url: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from("snapshot"),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            blob_root: PathBuf::from("storage"),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl ExportConfig {
    /// Build a configuration from `ERA_*` environment variables,
    /// falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            snapshot_dir: non_empty("ERA_SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_dir),
            output_dir: non_empty("ERA_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            blob_root: non_empty("ERA_BLOB_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.blob_root),
            base_url: non_empty("ERA_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
        }
    }

    /// Public URL of an item page.
    pub fn item_url(&self, item_id: &str) -> String {
        format!("{}/items/{}", self.base_url, item_id)
    }

    /// Public download URL of a file attached to an item.
    pub fn file_download_url(&self, item_id: &str, fileset_uuid: &str) -> String {
        format!("{}/items/{}/download/{}", self.base_url, item_id, fileset_uuid)
    }
}
