//! ERA Export CLI - Jupiter snapshot to DSpace CSV
//!
//! # Main Commands
//!
//! ```bash
//! era-export export items                    # One DSpace CSV per collection
//! era-export report metadata collections     # Raw attribute dump
//! era-export files --path <community>/<coll> # Copy a collection's files
//! era-export changes --since 2025-01-01      # Audit log with DSpace deltas
//! ```
//!
//! # CSV Tools
//!
//! ```bash
//! era-export tools filter in.csv --ids ids.csv --column id -o out.csv
//! era-export tools split in.csv --rows 500 --prefix out/batch
//! era-export tools combine items.csv theses.csv -o combined.csv
//! era-export tools compare jupiter.csv dspace.csv -o audit.csv
//! era-export tools flatten collections dspace_collections.json -o dspace_collections.csv
//! ```

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use era_export::dspace::export_flattened;
use era_export::logs::{log_error, log_info, LOGGER};
use era_export::tools::{combine_csv, compare_csv, filter_csv, split_csv, CompareOptions};
use era_export::{
    operations_description, BitstreamChangeReport, BlobStore, ChangesReport, CollectionExporter,
    CollectionFileExporter, DeltaMapper, DspaceKind, ExportConfig, ExportContext, ExportProfile,
    ExportResult, MetadataReport, RecordKind, RecordValidator, ReportKind, Snapshot,
    StatisticsTable, ToolResult,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "era-export")]
#[command(about = "Export Jupiter records to DSpace CSV files", long_about = None)]
struct Cli {
    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Snapshot directory (overrides ERA_SNAPSHOT_DIR)
    #[arg(long, global = true)]
    snapshot_dir: Option<PathBuf>,

    /// Output directory (overrides ERA_OUTPUT_DIR)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Blob store root (overrides ERA_BLOB_ROOT)
    #[arg(long, global = true)]
    blob_root: Option<PathBuf>,

    /// Public base URL (overrides ERA_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Items,
    Theses,
}

impl From<KindArg> for RecordKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Items => RecordKind::Item,
            KindArg::Theses => RecordKind::Thesis,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum EntityArg {
    Communities,
    Collections,
    Items,
    Theses,
}

impl From<EntityArg> for ReportKind {
    fn from(kind: EntityArg) -> Self {
        match kind {
            EntityArg::Communities => ReportKind::Communities,
            EntityArg::Collections => ReportKind::Collections,
            EntityArg::Items => ReportKind::Items,
            EntityArg::Theses => ReportKind::Theses,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DspaceArg {
    Communities,
    Collections,
    Items,
    Bitstreams,
    Users,
}

impl From<DspaceArg> for DspaceKind {
    fn from(kind: DspaceArg) -> Self {
        match kind {
            DspaceArg::Communities => DspaceKind::Communities,
            DspaceArg::Collections => DspaceKind::Collections,
            DspaceArg::Items => DspaceKind::Items,
            DspaceArg::Bitstreams => DspaceKind::Bitstreams,
            DspaceArg::Users => DspaceKind::Users,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write DSpace-ready CSV files, one per collection
    Export {
        #[arg(value_enum)]
        kind: KindArg,

        /// Export profile JSON (default: built-in profile)
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Skip records failing schema validation
        #[arg(long)]
        validate: bool,

        /// Statistics CSV (default: statistics.csv in the snapshot)
        #[arg(long)]
        statistics: Option<PathBuf>,
    },

    /// Raw metadata, file and statistics reports
    Report {
        #[command(subcommand)]
        action: ReportAction,
    },

    /// Copy the files of every item in a collection and list them
    Files {
        /// Collection path (`community_id/collection_id`)
        #[arg(long)]
        path: String,
    },

    /// Audit-log changes since a date, with DSpace deltas
    Changes {
        /// First day included (YYYY-MM-DD)
        #[arg(long)]
        since: NaiveDate,
    },

    /// Files attached after a date
    BitstreamChanges {
        /// Files attached after this day (YYYY-MM-DD)
        #[arg(long)]
        since: NaiveDate,
    },

    /// Inspect export profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// CSV utilities
    Tools {
        #[command(subcommand)]
        action: ToolAction,
    },
}

#[derive(Subcommand)]
enum ReportAction {
    /// Attribute dump of one entity type
    Metadata {
        #[arg(value_enum)]
        kind: EntityArg,

        /// File with one record ID per line (items and theses only)
        #[arg(long)]
        subset: Option<PathBuf>,
    },

    /// Stored files of items or theses
    Blobs {
        #[arg(value_enum)]
        kind: KindArg,

        /// File with one record ID per line
        #[arg(long)]
        subset: Option<PathBuf>,
    },

    /// View and download counts of items or theses
    Statistics {
        #[arg(value_enum)]
        kind: KindArg,

        /// Statistics CSV (default: statistics.csv in the snapshot)
        #[arg(long)]
        statistics: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Print a built-in profile as JSON
    Show {
        #[arg(value_enum)]
        kind: KindArg,
    },

    /// Check a profile file
    Check {
        /// Profile JSON file
        file: PathBuf,
    },

    /// Show available value operations
    Operations,
}

#[derive(Subcommand)]
enum ToolAction {
    /// Keep rows whose column value is listed in an ID file
    Filter {
        input: PathBuf,
        /// CSV with the same column holding the IDs to keep
        #[arg(long)]
        ids: PathBuf,
        #[arg(long)]
        column: String,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Split a CSV into files of N rows
    Split {
        input: PathBuf,
        #[arg(long)]
        rows: usize,
        /// Output prefix (`<prefix>_items_<start>_to_<end>.csv`)
        #[arg(long)]
        prefix: PathBuf,
    },

    /// Combine an item and a thesis export into one file
    Combine {
        items: PathBuf,
        theses: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Compare a Jupiter export with a DSpace export
    Compare {
        jupiter: PathBuf,
        dspace: PathBuf,
        /// Comparison options JSON (default: community rules)
        #[arg(long)]
        rules: Option<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Flatten saved DSpace REST JSON into a CSV
    Flatten {
        #[arg(value_enum)]
        kind: DspaceArg,
        /// JSON array, JSON lines or a paged REST response
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    LOGGER.set_quiet(cli.quiet);

    let mut config = ExportConfig::from_env();
    if let Some(dir) = cli.snapshot_dir {
        config.snapshot_dir = dir;
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    if let Some(dir) = cli.blob_root {
        config.blob_root = dir;
    }
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }

    let result: Result<(), Box<dyn std::error::Error>> = match cli.command {
        Commands::Export {
            kind,
            profile,
            validate,
            statistics,
        } => cmd_export(&config, kind.into(), profile.as_deref(), validate, statistics.as_deref())
            .map_err(Into::into),

        Commands::Report { action } => cmd_report(&config, action).map_err(Into::into),

        Commands::Files { path } => cmd_files(&config, &path).map_err(Into::into),

        Commands::Changes { since } => cmd_changes(&config, since).map_err(Into::into),

        Commands::BitstreamChanges { since } => cmd_bitstream_changes(&config, since).map_err(Into::into),

        Commands::Profile { action } => cmd_profile(action).map_err(Into::into),

        Commands::Tools { action } => cmd_tools(action).map_err(Into::into),
    };

    if let Err(e) = result {
        log_error(format!("Error: {}", e));
        std::process::exit(1);
    }
}

/// Statistics from an explicit CSV, if one was given.
fn load_statistics(path: Option<&Path>) -> ExportResult<Option<StatisticsTable>> {
    match path {
        Some(path) => Ok(Some(StatisticsTable::from_csv_path(path)?)),
        None => Ok(None),
    }
}

fn read_subset(path: &Path) -> ExportResult<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

fn cmd_export(
    config: &ExportConfig,
    kind: RecordKind,
    profile_path: Option<&Path>,
    validate: bool,
    statistics_path: Option<&Path>,
) -> ExportResult<()> {
    let profile = match profile_path {
        Some(path) => ExportProfile::load(path)?,
        None => ExportProfile::builtin(kind),
    };
    profile.check_kind(kind)?;

    let snapshot = Snapshot::load(&config.snapshot_dir)?;
    let blobs = BlobStore::new(&config.blob_root);
    let statistics = load_statistics(statistics_path)?;
    let mut ctx = ExportContext::new(&snapshot, &blobs);
    if let Some(table) = &statistics {
        ctx = ctx.with_statistics(table);
    }

    let validator = if validate { Some(RecordValidator::new()?) } else { None };
    let mut exporter = CollectionExporter::new(&profile, &ctx, &config.output_dir);
    if let Some(validator) = &validator {
        exporter = exporter.with_validator(validator);
    }
    exporter.run()?;
    Ok(())
}

fn cmd_report(config: &ExportConfig, action: ReportAction) -> ExportResult<()> {
    let snapshot = Snapshot::load(&config.snapshot_dir)?;
    let report = MetadataReport::new(&snapshot, &config.output_dir);

    match action {
        ReportAction::Metadata { kind, subset } => {
            let report = match subset {
                Some(path) => report.with_subset(read_subset(&path)?),
                None => report,
            };
            report.write_metadata(kind.into())?;
        }
        ReportAction::Blobs { kind, subset } => {
            let report = match subset {
                Some(path) => report.with_subset(read_subset(&path)?),
                None => report,
            };
            report.write_blobs(kind.into())?;
        }
        ReportAction::Statistics { kind, statistics } => {
            match load_statistics(statistics.as_deref())? {
                Some(table) => report.write_statistics(kind.into(), &table)?,
                None => report.write_statistics(kind.into(), snapshot.statistics())?,
            };
        }
    }
    Ok(())
}

fn cmd_files(config: &ExportConfig, member_of_path: &str) -> ExportResult<()> {
    let snapshot = Snapshot::load(&config.snapshot_dir)?;
    let blobs = BlobStore::new(&config.blob_root);
    CollectionFileExporter::new(&snapshot, &blobs, config).run(member_of_path)?;
    Ok(())
}

fn cmd_changes(config: &ExportConfig, since: NaiveDate) -> ExportResult<()> {
    let snapshot = Snapshot::load(&config.snapshot_dir)?;
    let blobs = BlobStore::new(&config.blob_root);
    let ctx = ExportContext::new(&snapshot, &blobs);
    let mapper = DeltaMapper::default();
    let summary = ChangesReport::new(&ctx, &mapper, since, &config.output_dir).run()?;
    println!("{}", summary);
    Ok(())
}

fn cmd_bitstream_changes(config: &ExportConfig, since: NaiveDate) -> ExportResult<()> {
    let snapshot = Snapshot::load(&config.snapshot_dir)?;
    let blobs = BlobStore::new(&config.blob_root);
    let ctx = ExportContext::new(&snapshot, &blobs);
    BitstreamChangeReport::new(&ctx, since, &config.output_dir).run()?;
    Ok(())
}

fn cmd_profile(action: ProfileAction) -> ExportResult<()> {
    match action {
        ProfileAction::Show { kind } => {
            println!("{}", ExportProfile::builtin(kind.into()).to_json()?);
        }
        ProfileAction::Check { file } => {
            let profile = ExportProfile::load(&file)?;
            log_info(format!(
                "✅ {} profile with {} columns",
                profile.kind,
                profile.columns.len()
            ));
        }
        ProfileAction::Operations => {
            println!("{}", operations_description());
        }
    }
    Ok(())
}

fn cmd_tools(action: ToolAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ToolAction::Filter {
            input,
            ids,
            column,
            output,
        } => {
            filter_csv(&input, &ids, &column, &output)?;
        }
        ToolAction::Split { input, rows, prefix } => {
            split_csv(&input, rows, &prefix)?;
        }
        ToolAction::Combine {
            items,
            theses,
            output,
        } => {
            combine_csv(&items, &theses, &output)?;
        }
        ToolAction::Compare {
            jupiter,
            dspace,
            rules,
            output,
        } => {
            cmd_compare(&jupiter, &dspace, rules.as_deref(), &output)?;
        }
        ToolAction::Flatten { kind, input, output } => {
            export_flattened(kind.into(), &input, &output)?;
        }
    }
    Ok(())
}

fn cmd_compare(jupiter: &Path, dspace: &Path, rules: Option<&Path>, output: &Path) -> ToolResult<()> {
    let options = match rules {
        Some(path) => CompareOptions::load(path)?,
        None => CompareOptions::communities(),
    };
    let summary = compare_csv(jupiter, dspace, &options, output)?;
    if summary.failures > 0 {
        log_info(format!("{} checks failed", summary.failures));
    }
    Ok(())
}
