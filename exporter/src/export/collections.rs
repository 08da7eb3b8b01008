//! DSpace-ready CSV files per collection.

use std::fs::File;
use std::path::{Path, PathBuf};

use super::{create_csv, ensure_dir, ExportSummary};
use crate::error::ExportResult;
use crate::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::models::JupiterRecord;
use crate::transform::{build_row, ExportContext, ExportProfile};
use crate::validation::RecordValidator;

/// Writes one CSV per collection for a record kind, plus one CSV for the
/// records filed under several collections.
pub struct CollectionExporter<'a> {
    profile: &'a ExportProfile,
    ctx: &'a ExportContext<'a>,
    output_dir: PathBuf,
    validator: Option<&'a RecordValidator>,
}

impl<'a> CollectionExporter<'a> {
    pub fn new(profile: &'a ExportProfile, ctx: &'a ExportContext<'a>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            profile,
            ctx,
            output_dir: output_dir.into(),
            validator: None,
        }
    }

    /// Skip records that fail schema validation.
    pub fn with_validator(mut self, validator: &'a RecordValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `items_<collection id>.csv`
    pub fn collection_file_name(&self, collection_id: &str) -> String {
        format!("{}_{}.csv", self.profile.kind.plural(), collection_id)
    }

    /// `items_in_multiple_collections.csv`
    pub fn multiple_collections_file_name(&self) -> String {
        format!("{}_in_multiple_collections.csv", self.profile.kind.plural())
    }

    pub fn run(&self) -> ExportResult<ExportSummary> {
        ensure_dir(&self.output_dir)?;
        let kind = self.profile.kind;
        let headers = self.profile.headers();
        let mut summary = ExportSummary::default();

        log_info(format!(
            "📤 Exporting {} to {}",
            kind.plural(),
            self.output_dir.display()
        ));

        for collection in self.ctx.snapshot.collections() {
            let collection_id = collection.id();
            let members = self.ctx.snapshot.members(kind, &collection_id);
            if members.is_empty() {
                continue;
            }

            let path = self.output_dir.join(self.collection_file_name(&collection_id));
            let mut writer = create_csv(&path, &headers)?;
            let mut rows = 0;
            for record in members {
                // Filed elsewhere too: goes to the multiple-collections file.
                if record.in_multiple_collections() {
                    continue;
                }
                if self.write_record(&mut writer, record, &mut summary)? {
                    rows += 1;
                }
            }
            writer.flush()?;
            summary.files_written += 1;
            log_info_indent(format!("{}: {} rows", path.display(), rows), 1);
        }

        let path = self.output_dir.join(self.multiple_collections_file_name());
        let mut writer = create_csv(&path, &headers)?;
        let mut rows = 0;
        for record in self.ctx.snapshot.records(kind) {
            if record.in_multiple_collections() && self.write_record(&mut writer, record, &mut summary)? {
                rows += 1;
            }
        }
        writer.flush()?;
        summary.files_written += 1;
        log_info_indent(format!("{}: {} rows", path.display(), rows), 1);

        log_success(format!("{} export: {}", kind, summary.summary()));
        Ok(summary)
    }

    /// Write a record's row unless validation rejects it. Returns whether
    /// a row was written.
    fn write_record(
        &self,
        writer: &mut csv::Writer<File>,
        record: &JupiterRecord,
        summary: &mut ExportSummary,
    ) -> ExportResult<bool> {
        if let Some(validator) = self.validator {
            if let Err(errors) = validator.validate(self.profile.kind, record) {
                log_warning(format!(
                    "Skipping {} {}: {}",
                    self.profile.kind,
                    record.id(),
                    errors.join("; ")
                ));
                summary.records_skipped += 1;
                return Ok(false);
            }
        }
        writer.write_record(build_row(record, self.profile, self.ctx))?;
        summary.rows_written += 1;
        Ok(true)
    }
}
