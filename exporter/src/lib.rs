//! # ERA Export - Jupiter to DSpace metadata migration
//!
//! Reads a snapshot of the Jupiter repository (items, theses, collections,
//! communities, audit versions, attachments and usage statistics) and
//! writes the CSV files used to load and audit a DSpace repository.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Snapshot   │────▶│   Profile   │────▶│   Export    │────▶│  DSpace CSV │
//! │ (JSON dump) │     │ (rules+ops) │     │ (per coll.) │     │  + reports  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use era_export::{BlobStore, CollectionExporter, ExportContext, ExportProfile, RecordKind, Snapshot};
//!
//! let snapshot = Snapshot::load("snapshot".as_ref()).unwrap();
//! let blobs = BlobStore::new("storage");
//! let ctx = ExportContext::new(&snapshot, &blobs);
//! let profile = ExportProfile::builtin(RecordKind::Item);
//! let summary = CollectionExporter::new(&profile, &ctx, "era_export").run().unwrap();
//! println!("{}", summary.summary());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Paths and URLs from the environment
//! - [`models`] - Jupiter records, files, versions
//! - [`snapshot`] - Snapshot loading, statistics, blob store
//! - [`transform`] - Export profiles, operations, row builder, deltas
//! - [`export`] - DSpace CSV exports and reports
//! - [`parser`] - CSV reading with auto-detection
//! - [`tools`] - CSV filter / split / combine / compare
//! - [`dspace`] - Flattened CSV of saved DSpace REST objects
//! - [`validation`] - Record schema validation
//! - [`logs`] - Console logging

// Core modules
pub mod config;
pub mod error;
pub mod logs;
pub mod models;

// Input
pub mod parser;
pub mod snapshot;

// Transformation
pub mod transform;

// Output
pub mod dspace;
pub mod export;
pub mod tools;

// Validation
pub mod validation;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CsvError,
    ExportError,
    ExportResult,
    ProfileError,
    SnapshotError,
    ToolError,
    ToolResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use config::ExportConfig;
pub use models::{Attachment, Blob, JupiterRecord, RecordKind, User, Version};

// =============================================================================
// Re-exports - Snapshot
// =============================================================================

pub use snapshot::{BlobStore, Snapshot, SnapshotData, StatisticsSource, StatisticsTable, UsageCounts};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    build_row,
    operations_description,
    ColumnRule,
    DeltaMapper,
    ExportContext,
    ExportProfile,
    Operation,
    ValueSource,
};

// =============================================================================
// Re-exports - Export
// =============================================================================

pub use export::{
    BitstreamChangeReport,
    ChangeSummary,
    ChangesReport,
    CollectionExporter,
    CollectionFileExporter,
    ExportSummary,
    MetadataReport,
    ReportKind,
};

// =============================================================================
// Re-exports - CSV
// =============================================================================

pub use parser::{read_csv_file, CsvTable};
pub use dspace::{export_flattened, DspaceKind};
pub use tools::{combine_csv, compare_csv, filter_csv, split_csv, CompareOptions, CompareRule, Comparison};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{record_schema, RecordValidator};
