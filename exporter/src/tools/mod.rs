//! CSV utilities used around the migration: filtering by an ID list,
//! splitting into chunks, combining item and thesis exports, and auditing
//! a Jupiter export against a DSpace export.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{ToolError, ToolResult};
use crate::logs::{log_info, log_success};
use crate::parser::{read_csv_file, CsvTable};

pub const PASS: &str = "PASS";
pub const FAIL: &str = "FAIL";

fn create_parent(path: &Path) -> ToolResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn writer_for<S: AsRef<str>>(path: &Path, headers: &[S]) -> ToolResult<csv::Writer<File>> {
    create_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(headers.iter().map(|h| h.as_ref()))?;
    Ok(writer)
}

// =============================================================================
// Filter
// =============================================================================

/// Keep the rows of `input` whose `column` value appears in the same column
/// of `ids_file`. Returns the number of rows written.
pub fn filter_csv(input: &Path, ids_file: &Path, column: &str, output: &Path) -> ToolResult<usize> {
    let table = read_csv_file(input)?;
    let ids = read_csv_file(ids_file)?;

    let id_col = ids.column_index(column)?;
    let wanted: HashSet<&str> = ids.rows.iter().map(|row| row[id_col].as_str()).collect();
    let col = table.column_index(column)?;

    let mut writer = writer_for(output, &table.headers)?;
    let mut written = 0;
    for row in table.rows.iter().filter(|row| wanted.contains(row[col].as_str())) {
        writer.write_record(row)?;
        written += 1;
    }
    writer.flush()?;

    log_success(format!("{} of {} rows kept -> {}", written, table.len(), output.display()));
    Ok(written)
}

// =============================================================================
// Split
// =============================================================================

/// `<prefix>_items_<start>_to_<end>.csv`
pub fn split_file_name(prefix: &Path, start: usize, rows_per_file: usize) -> PathBuf {
    let name = format!(
        "{}_items_{}_to_{}.csv",
        prefix.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
        start,
        start + rows_per_file - 1
    );
    prefix.with_file_name(name)
}

/// Split `input` into files of `rows_per_file` rows, each with the header.
/// Returns the paths written, in order.
pub fn split_csv(input: &Path, rows_per_file: usize, prefix: &Path) -> ToolResult<Vec<PathBuf>> {
    if rows_per_file == 0 {
        return Err(ToolError::InvalidArgument("rows per file must be at least 1".into()));
    }
    let table = read_csv_file(input)?;
    create_parent(prefix)?;

    let mut paths = Vec::new();
    for (chunk_idx, chunk) in table.rows.chunks(rows_per_file).enumerate() {
        let path = split_file_name(prefix, chunk_idx * rows_per_file, rows_per_file);
        let mut writer = writer_for(&path, &table.headers)?;
        for row in chunk {
            writer.write_record(row)?;
        }
        writer.flush()?;
        paths.push(path);
    }

    log_success(format!("{} rows split into {} files", table.len(), paths.len()));
    Ok(paths)
}

// =============================================================================
// Combine
// =============================================================================

/// Item headers followed by the thesis headers the items don't have.
pub fn combined_headers(items: &[String], theses: &[String]) -> Vec<String> {
    let mut headers = items.to_vec();
    headers.extend(theses.iter().filter(|h| !items.contains(h)).cloned());
    headers
}

fn write_aligned(writer: &mut csv::Writer<File>, headers: &[String], table: &CsvTable) -> ToolResult<()> {
    for row in &table.rows {
        writer.write_record(headers.iter().map(|h| table.value(row, h).unwrap_or("")))?;
    }
    Ok(())
}

/// Merge an item export and a thesis export into one file with the union
/// of their headers. Returns the number of rows written.
pub fn combine_csv(items: &Path, theses: &Path, output: &Path) -> ToolResult<usize> {
    let items = read_csv_file(items)?;
    let theses = read_csv_file(theses)?;
    let headers = combined_headers(&items.headers, &theses.headers);

    let mut writer = writer_for(output, &headers)?;
    write_aligned(&mut writer, &headers, &items)?;
    write_aligned(&mut writer, &headers, &theses)?;
    writer.flush()?;

    let total = items.len() + theses.len();
    log_success(format!(
        "{} items + {} theses, {} columns -> {}",
        items.len(),
        theses.len(),
        headers.len(),
        output.display()
    ));
    Ok(total)
}

// =============================================================================
// Compare
// =============================================================================

/// How two cells are compared. A cell that is empty on both sides counts
/// as equal, whereas a pandas-based comparison reads both as NaN and fails
/// them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    #[default]
    Exact,
    /// Runs of whitespace count as one space; leading and trailing
    /// whitespace is ignored.
    IgnoreWhitespace,
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Comparison {
    pub fn matches(&self, jupiter: &str, dspace: &str) -> bool {
        match self {
            Comparison::Exact => jupiter == dspace,
            Comparison::IgnoreWhitespace => collapse_whitespace(jupiter) == collapse_whitespace(dspace),
        }
    }
}

/// One output column of a comparison: a Jupiter column checked against a
/// DSpace column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareRule {
    pub name: String,
    pub jupiter: String,
    pub dspace: String,
    #[serde(default)]
    pub comparison: Comparison,
}

impl CompareRule {
    pub fn new(name: &str, jupiter: &str, dspace: &str) -> Self {
        Self {
            name: name.to_string(),
            jupiter: jupiter.to_string(),
            dspace: dspace.to_string(),
            comparison: Comparison::Exact,
        }
    }

    pub fn with_comparison(mut self, comparison: Comparison) -> Self {
        self.comparison = comparison;
        self
    }
}

/// Rules and join keys for a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareOptions {
    pub jupiter_key: String,
    pub dspace_key: String,
    pub rules: Vec<CompareRule>,
}

impl CompareOptions {
    /// Community export against the DSpace communities listing.
    pub fn communities() -> Self {
        Self {
            jupiter_key: "title".to_string(),
            dspace_key: "name".to_string(),
            rules: vec![
                CompareRule::new("name", "title", "name"),
                CompareRule::new("description", "description", "metadata.dc.description.0.value"),
                CompareRule::new(
                    "abstract",
                    "description",
                    "metadata.dc.description.abstract.0.value",
                ),
                CompareRule::new("dc.title", "title", "metadata.dc.title.0.value"),
            ],
        }
    }

    /// Read options from a JSON file.
    pub fn load(path: &Path) -> ToolResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn headers(&self) -> Vec<String> {
        std::iter::once("index".to_string())
            .chain(self.rules.iter().map(|r| r.name.clone()))
            .collect()
    }
}

/// Rows written and failing cells found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompareSummary {
    pub rows: usize,
    pub failures: usize,
}

/// Evaluate every rule for one joined pair. A missing side fails every rule.
fn evaluate(
    options: &CompareOptions,
    jupiter: Option<(&CsvTable, &[String])>,
    dspace: Option<(&CsvTable, &[String])>,
) -> Vec<&'static str> {
    options
        .rules
        .iter()
        .map(|rule| {
            let left = jupiter.and_then(|(t, row)| t.value(row, &rule.jupiter));
            let right = dspace.and_then(|(t, row)| t.value(row, &rule.dspace));
            match (left, right) {
                (Some(l), Some(r)) if rule.comparison.matches(l, r) => PASS,
                _ => FAIL,
            }
        })
        .collect()
}

/// Outer join of two tables on their key columns, one result row per
/// joined pair, sorted by key.
pub fn compare_tables(
    jupiter: &CsvTable,
    dspace: &CsvTable,
    options: &CompareOptions,
) -> ToolResult<Vec<Vec<String>>> {
    let j_key = jupiter.column_index(&options.jupiter_key)?;
    let d_key = dspace.column_index(&options.dspace_key)?;

    let mut by_key: BTreeMap<&str, (Vec<&[String]>, Vec<&[String]>)> = BTreeMap::new();
    for row in &jupiter.rows {
        by_key.entry(row[j_key].as_str()).or_default().0.push(row);
    }
    for row in &dspace.rows {
        by_key.entry(row[d_key].as_str()).or_default().1.push(row);
    }

    let mut out = Vec::new();
    for (key, (left, right)) in by_key {
        let lefts: Vec<Option<&[String]>> = if left.is_empty() { vec![None] } else { left.into_iter().map(Some).collect() };
        let rights: Vec<Option<&[String]>> = if right.is_empty() { vec![None] } else { right.into_iter().map(Some).collect() };
        for l in &lefts {
            for r in &rights {
                let results = evaluate(options, l.map(|row| (jupiter, row)), r.map(|row| (dspace, row)));
                let mut line = vec![key.to_string()];
                line.extend(results.into_iter().map(String::from));
                out.push(line);
            }
        }
    }
    Ok(out)
}

/// Compare a Jupiter CSV with a DSpace CSV and write a PASS/FAIL table.
pub fn compare_csv(
    jupiter: &Path,
    dspace: &Path,
    options: &CompareOptions,
    output: &Path,
) -> ToolResult<CompareSummary> {
    let jupiter = read_csv_file(jupiter)?;
    let dspace = read_csv_file(dspace)?;
    log_info(format!(
        "🔍 Comparing {} Jupiter rows with {} DSpace rows",
        jupiter.len(),
        dspace.len()
    ));

    let rows = compare_tables(&jupiter, &dspace, options)?;
    let mut writer = writer_for(output, &options.headers())?;
    let mut summary = CompareSummary::default();
    for row in &rows {
        writer.write_record(row)?;
        summary.rows += 1;
        summary.failures += row.iter().skip(1).filter(|cell| *cell == FAIL).count();
    }
    writer.flush()?;

    log_success(format!(
        "{} rows compared, {} failing checks -> {}",
        summary.rows,
        summary.failures,
        output.display()
    ));
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;
    use std::fs;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_filter_keeps_listed_ids() {
        let dir = tempdir().unwrap();
        let input = write(dir.path(), "in.csv", "id,title\n1,One\n2,Two\n3,Three\n");
        let ids = write(dir.path(), "ids.csv", "id\n3\n1\n");
        let output = dir.path().join("out/filtered.csv");

        assert_eq!(filter_csv(&input, &ids, "id", &output).unwrap(), 2);
        assert_eq!(fs::read_to_string(&output).unwrap(), "id,title\n1,One\n3,Three\n");
    }

    #[test]
    fn test_filter_missing_column() {
        let dir = tempdir().unwrap();
        let input = write(dir.path(), "in.csv", "id,title\n1,One\n");
        let ids = write(dir.path(), "ids.csv", "uuid\n1\n");
        let err = filter_csv(&input, &ids, "id", &dir.path().join("o.csv")).unwrap_err();
        assert!(err.to_string().contains("id"));
    }

    #[test]
    fn test_split_into_chunks() {
        let dir = tempdir().unwrap();
        let input = write(dir.path(), "in.csv", "id\na\nb\nc\nd\ne\n");
        let prefix = dir.path().join("chunks/part");

        let paths = split_csv(&input, 2, &prefix).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["part_items_0_to_1.csv", "part_items_2_to_3.csv", "part_items_4_to_5.csv"]
        );
        assert_eq!(fs::read_to_string(&paths[1]).unwrap(), "id\nc\nd\n");
        assert_eq!(fs::read_to_string(&paths[2]).unwrap(), "id\ne\n");
    }

    #[test]
    fn test_split_rejects_zero() {
        let dir = tempdir().unwrap();
        let input = write(dir.path(), "in.csv", "id\na\n");
        let err = split_csv(&input, 0, &dir.path().join("p")).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument(_)));
    }

    #[test]
    fn test_combine_pads_missing_columns() {
        let dir = tempdir().unwrap();
        let items = write(dir.path(), "items.csv", "id,title\ni1,Item\n");
        let theses = write(dir.path(), "theses.csv", "id,degree,title\nt1,MSc,Thesis\n");
        let output = dir.path().join("combined.csv");

        assert_eq!(combine_csv(&items, &theses, &output).unwrap(), 2);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "id,title,degree\ni1,Item,\nt1,Thesis,MSc\n"
        );
    }

    #[test]
    fn test_empty_cells_on_both_sides_pass() {
        let jupiter = parse_str("title,description\nArchive,\n", ',', "utf-8").unwrap();
        let dspace = parse_str("name,summary\nArchive,\n", ',', "utf-8").unwrap();
        let options = CompareOptions {
            jupiter_key: "title".into(),
            dspace_key: "name".into(),
            rules: vec![CompareRule::new("description", "description", "summary")],
        };
        let rows = compare_tables(&jupiter, &dspace, &options).unwrap();
        assert_eq!(rows, vec![vec!["Archive".to_string(), PASS.to_string()]]);
    }

    #[test]
    fn test_whitespace_comparison() {
        assert!(Comparison::IgnoreWhitespace.matches(" A  title\n", "A title"));
        assert!(!Comparison::Exact.matches(" A  title", "A title"));
    }

    #[test]
    fn test_compare_outer_join() {
        let jupiter = parse_str(
            "title,description\nBiology,Life\nChemistry,Atoms\nArchive,Old\n",
            ',',
            "utf-8",
        )
        .unwrap();
        let dspace = parse_str(
            "name,metadata.dc.description.0.value,metadata.dc.description.abstract.0.value,metadata.dc.title.0.value\n\
             Biology,Life,,Biology\n\
             Chemistry,atoms,Atoms,Chemistry\n\
             Physics,Waves,,Physics\n",
            ',',
            "utf-8",
        )
        .unwrap();

        let rows = compare_tables(&jupiter, &dspace, &CompareOptions::communities()).unwrap();
        let keys: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(keys, vec!["Archive", "Biology", "Chemistry", "Physics"]);
        assert_eq!(rows[0][1..], ["FAIL", "FAIL", "FAIL", "FAIL"]);
        assert_eq!(rows[1][1..], ["PASS", "PASS", "FAIL", "PASS"]);
        assert_eq!(rows[2][1..], ["PASS", "FAIL", "PASS", "PASS"]);
        assert_eq!(rows[3][1..], ["FAIL", "FAIL", "FAIL", "FAIL"]);
    }

    #[test]
    fn test_compare_csv_writes_report() {
        let dir = tempdir().unwrap();
        let jupiter = write(dir.path(), "j.csv", "title,description\nBiology,\"Life  on earth \"\n");
        let dspace = write(dir.path(), "d.csv", "name,summary\nBiology,Life on earth\n");
        let options = CompareOptions {
            jupiter_key: "title".into(),
            dspace_key: "name".into(),
            rules: vec![CompareRule::new("description", "description", "summary")
                .with_comparison(Comparison::IgnoreWhitespace)],
        };
        let output = dir.path().join("report.csv");

        let summary = compare_csv(&jupiter, &dspace, &options, &output).unwrap();
        assert_eq!(summary, CompareSummary { rows: 1, failures: 0 });
        assert_eq!(fs::read_to_string(&output).unwrap(), "index,description\nBiology,PASS\n");
    }

    #[test]
    fn test_compare_rule_from_json() {
        let rule: CompareRule = serde_json::from_str(
            r#"{"name":"t","jupiter":"title","dspace":"name","comparison":"ignore_whitespace"}"#,
        )
        .unwrap();
        assert_eq!(rule.comparison, Comparison::IgnoreWhitespace);
    }

    #[test]
    fn test_load_options_file() {
        let dir = tempdir().unwrap();
        let options = CompareOptions::communities();
        let path = write(dir.path(), "rules.json", &serde_json::to_string(&options).unwrap());
        assert_eq!(CompareOptions::load(&path).unwrap(), options);

        let bad = write(dir.path(), "bad.json", "{\"rules\": ");
        assert!(matches!(CompareOptions::load(&bad), Err(ToolError::Json(_))));
    }
}
