//! Transformation module.
//!
//! This module turns Jupiter records into DSpace CSV rows:
//! - Profile: ordered column rules and the built-in mapping tables
//! - Operations: value normalization steps
//! - Executor: row builder
//! - History: provenance value
//! - Delta: audit-log changes in DSpace terms

pub mod delta;
pub mod executor;
pub mod history;
pub mod operations;
pub mod profile;

pub use delta::DeltaMapper;
pub use executor::{build_row, flatten, remove_xml_invalid_characters, ExportContext};
pub use operations::{operations_description, Operation};
pub use profile::{item_profile, thesis_profile, ColumnRule, ExportProfile, ValueSource};
