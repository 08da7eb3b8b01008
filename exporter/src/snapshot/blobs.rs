//! On-disk blob store layout.

use std::path::PathBuf;

/// A local disk blob store: blob `key` lives at `<root>/<key[0..2]>/<key[2..4]>/<key>`.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of a blob's content on disk.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let first: String = key.chars().take(2).collect();
        let second: String = key.chars().skip(2).take(2).collect();
        self.root.join(first).join(second).join(key)
    }
}
