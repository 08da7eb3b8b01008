//! Export profiles
//!
//! A profile lists, in output order, the DSpace header of every column and
//! how its value is obtained from a Jupiter record.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use super::operations::Operation;
use crate::error::{ProfileError, ProfileResult};
use crate::models::RecordKind;

/// COAR resource type assigned to every thesis.
pub const THESIS_TYPE: &str = "http://purl.org/coar/resource_type/c_46ec";

/// Separator used when a list is flattened into one cell.
pub const LIST_SEPARATOR: &str = "||";

/// A complete export profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportProfile {
    /// Version of the profile format
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Which records the profile exports
    pub kind: RecordKind,

    /// Columns in output order
    pub columns: Vec<ColumnRule>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// One output column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRule {
    /// DSpace header
    pub header: String,

    /// Where the value comes from
    pub source: ValueSource,

    /// Ordered list of operations to apply
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<Operation>,
}

/// Where a column value comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueSource {
    /// A record attribute, as stored
    Attribute { name: String },

    /// Non-blank values of several attributes; list attributes are flattened in
    Merge { names: Vec<String> },

    /// Same value for every record
    Constant { value: Value },

    /// File names of the ordered files
    FileNames,

    /// Blob store paths of the ordered files
    FilePaths,

    /// Position in `files` of the attachment used as thumbnail (`logo_id`)
    ThumbnailIndex,

    /// Email of the owning user (`owner_id`)
    OwnerEmail,

    /// View count
    StatViews,

    /// Download count
    StatDownloads,

    /// Embargo history and audit log, as provenance
    EditHistory,
}

impl ValueSource {
    pub fn attribute(name: &str) -> Self {
        ValueSource::Attribute { name: name.to_string() }
    }

    /// Attributes whose new value alone is enough to recompute this source.
    pub fn derivable_from(&self) -> Vec<&str> {
        match self {
            ValueSource::Attribute { name } => vec![name.as_str()],
            ValueSource::Merge { names } => names.iter().map(String::as_str).collect(),
            ValueSource::OwnerEmail => vec!["owner_id"],
            _ => Vec::new(),
        }
    }
}

impl ColumnRule {
    pub fn new(header: &str, source: ValueSource) -> Self {
        Self {
            header: header.to_string(),
            source,
            operations: Vec::new(),
        }
    }

    /// Column copying an attribute unchanged.
    pub fn attribute(header: &str, name: &str) -> Self {
        Self::new(header, ValueSource::attribute(name))
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }
}

impl ExportProfile {
    pub fn new(kind: RecordKind, columns: Vec<ColumnRule>) -> Self {
        Self {
            version: default_version(),
            description: String::new(),
            kind,
            columns,
        }
    }

    /// The built-in profile for a record kind.
    pub fn builtin(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Item => item_profile(),
            RecordKind::Thesis => thesis_profile(),
        }
    }

    /// Parse a profile from JSON string
    pub fn from_json(json: &str) -> ProfileResult<Self> {
        let profile: Self = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Read and check a profile file.
    pub fn load(path: &Path) -> ProfileResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> ProfileResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Header row, in column order.
    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header.clone()).collect()
    }

    /// Refuse a profile written for another record type.
    pub fn check_kind(&self, kind: RecordKind) -> ProfileResult<()> {
        if self.kind != kind {
            return Err(ProfileError::KindMismatch {
                expected: kind.plural().to_string(),
                found: self.kind.plural().to_string(),
            });
        }
        Ok(())
    }

    /// Check the profile can be used for export.
    pub fn validate(&self) -> ProfileResult<()> {
        if self.columns.is_empty() {
            return Err(ProfileError::Empty);
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.header.as_str()) {
                return Err(ProfileError::DuplicateHeader(column.header.clone()));
            }
            for operation in &column.operations {
                operation.check()?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Static tables
// =============================================================================

/// Jupiter item type and publication status URIs -> COAR URIs.
pub fn resource_type_mapping() -> BTreeMap<String, String> {
    [
        ("http://purl.org/ontology/bibo/Article", "http://purl.org/coar/resource_type/c_6501"),
        ("http://purl.org/ontology/bibo/status#draft", "http://purl.org/coar/version/c_b1a7d7d4d402bcce"),
        ("http://vivoweb.org/ontology/core#submitted", "http://purl.org/coar/version/c_71e4c1898caa6e32"),
        ("http://purl.org/ontology/bibo/status#published", "http://purl.org/coar/version/c_970fb48d4fbd8a85"),
        ("http://purl.org/ontology/bibo/Book", "http://purl.org/coar/resource_type/c_2f33"),
        ("http://purl.org/ontology/bibo/Chapter", "http://purl.org/coar/resource_type/c_3248"),
        ("http://purl.org/ontology/bibo/Image", "http://purl.org/coar/resource_type/c_c513"),
        ("http://purl.org/ontology/bibo/Report", "http://purl.org/coar/resource_type/c_93fc"),
        ("http://terms.library.ualberta.ca/researchMaterial", "http://purl.org/coar/resource_type/c_1843"),
        ("http://vivoweb.org/ontology/core#Presentation", "http://purl.org/coar/resource_type/R60J-J5BD"),
        ("http://vivoweb.org/ontology/core#ConferencePoster", "http://purl.org/coar/resource_type/c_6670"),
        ("http://vivoweb.org/ontology/core#Dataset", "http://purl.org/coar/resource_type/c_ddb1"),
        ("http://vivoweb.org/ontology/core#Review", "http://purl.org/coar/resource_type/c_efa0"),
        ("http://terms.library.ualberta.ca/learningObject", "http://purl.org/coar/resource_type/c_e059"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Library of Congress ISO 639-2 URIs -> DSpace language codes.
pub fn language_mapping() -> BTreeMap<String, String> {
    [
        ("http://id.loc.gov/vocabulary/iso639-2/eng", "en"),
        ("http://id.loc.gov/vocabulary/iso639-2/fre", "fr"),
        ("http://id.loc.gov/vocabulary/iso639-2/ger", "de"),
        ("http://id.loc.gov/vocabulary/iso639-2/ita", "it"),
        ("http://id.loc.gov/vocabulary/iso639-2/jpn", "ja"),
        ("http://id.loc.gov/vocabulary/iso639-2/spa", "es"),
        ("http://id.loc.gov/vocabulary/iso639-2/zho", "zh"),
        ("http://id.loc.gov/vocabulary/iso639-2/ukr", "uk"),
        ("http://id.loc.gov/vocabulary/iso639-2/rus", "ru"),
        ("http://id.loc.gov/vocabulary/iso639-2/zxx", "No linguistic content"),
        ("http://terms.library.ualberta.ca/other", "other"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn map_with(mapping: BTreeMap<String, String>) -> Operation {
    Operation::Map { mapping, default_unmapped: None }
}

fn doi_rewrite() -> Operation {
    Operation::Replace {
        pattern: "^doi:".to_string(),
        value: "https://doi.org/".to_string(),
    }
}

fn iso_date() -> Operation {
    Operation::FormatDate { format: "%F".to_string() }
}

fn join(separator: &str) -> Operation {
    Operation::Join { separator: separator.to_string() }
}

// =============================================================================
// Built-in profiles
// =============================================================================

/// DSpace columns for Jupiter items.
pub fn item_profile() -> ExportProfile {
    use ColumnRule as C;
    let columns = vec![
        C::attribute("dc.contributor.author", "creators"),
        C::attribute("dc.contributor.other", "contributors"),
        C::attribute("dc.coverage.spatial", "spatial_subjects"),
        C::attribute("dc.coverage.temporal", "temporal_subjects"),
        C::attribute("dc.date.issued", "created"),
        C::attribute("dc.description", "description"),
        C::attribute("dc.identifier.doi", "doi").with_operation(doi_rewrite()),
        C::attribute("dc.language.iso", "languages")
            .with_operation(map_with(language_mapping()))
            .with_operation(join(LIST_SEPARATOR)),
        C::attribute("dc.publisher", "publisher"),
        C::attribute("dc.relation", "related_link"),
        C::attribute("dc.relation.isversionof", "is_version_of"),
        C::attribute("dc.rights", "rights"),
        C::attribute("dc.rights.uri", "license"),
        C::attribute("dcterms.source", "source"),
        C::attribute("dc.subject", "subject"),
        C::attribute("dc.title", "title"),
        C::attribute("dc.title.alternative", "alternative_title"),
        C::new(
            "dc.type",
            ValueSource::Merge {
                names: vec!["item_type".to_string(), "publication_status".to_string()],
            },
        )
        .with_operation(map_with(resource_type_mapping()))
        .with_operation(join(" ")),
        C::attribute("ual.jupiterAccess", "visibility"),
        C::new("filename", ValueSource::FileNames),
        C::new("ual.jupiterFilename", ValueSource::FileNames),
        C::attribute("local.embargo.terms", "embargo_end_date").with_operation(iso_date()),
        C::attribute("ual.depositor", "depositor"),
        C::new("dc.description.provenance", ValueSource::EditHistory),
        C::attribute("ual.fedora3Handle", "fedora3_handle"),
        C::attribute("ual.fedora3UUID", "fedora3_uuid"),
        C::attribute("ual.hydraNoid", "hydra_noid"),
        C::new(
            "ual.ingestBatch",
            ValueSource::Merge {
                names: vec!["ingest_batch".to_string(), "batch_ingest_id".to_string()],
            },
        ),
        C::attribute("ual.jupiterCollection", "member_of_paths"),
        C::attribute("ual.date.createdInERA", "record_created_at"),
        C::attribute("ual.date.createdInJupiter", "created_at"),
        C::attribute("ual.date.updatedInJupiter", "updated_at"),
        C::attribute("ual.jupiterId", "id"),
        C::new("ual.stats.jupiterDownloads", ValueSource::StatDownloads),
        C::new("ual.stats.jupiterViews", ValueSource::StatViews),
        C::new("ual.owner", ValueSource::OwnerEmail),
        C::new("file:paths", ValueSource::FilePaths),
        C::new("thumbnail:index", ValueSource::ThumbnailIndex),
    ];

    ExportProfile {
        description: "Jupiter items to DSpace".to_string(),
        ..ExportProfile::new(RecordKind::Item, columns)
    }
}

/// DSpace columns for Jupiter theses.
pub fn thesis_profile() -> ExportProfile {
    use ColumnRule as C;
    let columns = vec![
        C::attribute("dc.contributor.advisor", "supervisors"),
        C::attribute("dc.contributor.author", "dissertant"),
        C::attribute("dc.contributor.other", "committee_members"),
        C::attribute("dcterms.dateAccepted", "date_accepted").with_operation(iso_date()),
        C::attribute("dc.date.issued", "graduation_date"),
        C::attribute("dc.date.created", "graduation_date").with_operation(Operation::HumanizeDate),
        C::attribute("dc.date.submitted", "date_submitted").with_operation(iso_date()),
        C::attribute("dc.description.abstract", "abstract"),
        C::new("dc.description.provenance", ValueSource::EditHistory),
        C::attribute("dc.identifier.doi", "doi").with_operation(doi_rewrite()),
        C::attribute("dc.language.iso", "language").with_operation(map_with(language_mapping())),
        C::attribute("dc.relation.isversionof", "is_version_of"),
        C::attribute("dc.rights", "rights"),
        C::attribute("dc.subject", "subject"),
        C::attribute("dc.title", "title"),
        C::attribute("dc.title.alternative", "alternative_title"),
        C::new("dc.type", ValueSource::Constant { value: Value::String(THESIS_TYPE.to_string()) }),
        C::attribute("ual.jupiterAccess", "visibility"),
        C::new("filename", ValueSource::FileNames),
        C::attribute("local.embargo.terms", "embargo_end_date").with_operation(iso_date()),
        C::attribute("thesis.degree.discipline", "specialization"),
        C::attribute("thesis.degree.grantor", "institution"),
        C::attribute("thesis.degree.level", "thesis_level"),
        C::attribute("thesis.degree.name", "degree"),
        C::attribute("ual.date.createdInERA", "record_created_at"),
        C::attribute("ual.date.createdInJupiter", "created_at"),
        C::attribute("ual.date.updatedInJupiter", "updated_at"),
        C::attribute("ual.department", "departments"),
        C::attribute("ual.depositor", "depositor"),
        C::attribute("ual.fedora3Handle", "fedora3_handle"),
        C::attribute("ual.fedora3UUID", "fedora3_uuid"),
        C::attribute("ual.hydraNoid", "hydra_noid"),
        C::attribute("ual.ingestBatch", "ingest_batch"),
        C::attribute("ual.jupiterCollection", "member_of_paths"),
        C::new("ual.jupiterFilename", ValueSource::FileNames),
        C::attribute("ual.jupiterId", "id"),
        C::new("ual.owner", ValueSource::OwnerEmail),
        C::attribute("ual.proquestId", "proquest"),
        C::new("ual.stats.jupiterDownloads", ValueSource::StatDownloads),
        C::new("ual.stats.jupiterViews", ValueSource::StatViews),
        C::attribute("ual.unicornId", "unicorn"),
        C::new("file:paths", ValueSource::FilePaths),
        C::new("thumbnail:index", ValueSource::ThumbnailIndex),
    ];

    ExportProfile {
        description: "Jupiter theses to DSpace".to_string(),
        ..ExportProfile::new(RecordKind::Thesis, columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_header_order() {
        let headers = item_profile().headers();
        assert_eq!(headers.len(), 38);
        assert_eq!(headers[0], "dc.contributor.author");
        assert_eq!(headers[17], "dc.type");
        assert_eq!(headers[23], "dc.description.provenance");
        assert_eq!(
            &headers[headers.len() - 3..],
            &["ual.owner", "file:paths", "thumbnail:index"]
        );
    }

    #[test]
    fn test_thesis_header_order() {
        let headers = thesis_profile().headers();
        assert_eq!(headers.len(), 43);
        assert_eq!(headers[0], "dc.contributor.advisor");
        assert_eq!(headers[4], "dc.date.issued");
        assert_eq!(headers[5], "dc.date.created");
        assert_eq!(headers[40], "ual.unicornId");
    }

    #[test]
    fn test_builtin_profiles_validate() {
        assert!(item_profile().validate().is_ok());
        assert!(thesis_profile().validate().is_ok());
    }

    #[test]
    fn test_json_round_trip() {
        let profile = thesis_profile();
        let json = profile.to_json().unwrap();
        assert!(json.contains("\"type\": \"edit_history\""));
        let parsed = ExportProfile::from_json(&json).unwrap();
        assert_eq!(parsed, profile);
    }

    #[test]
    fn test_validate_rejects_duplicates_and_empty() {
        let profile = ExportProfile::new(
            RecordKind::Item,
            vec![
                ColumnRule::attribute("dc.title", "title"),
                ColumnRule::attribute("dc.title", "alternative_title"),
            ],
        );
        assert!(matches!(
            profile.validate(),
            Err(ProfileError::DuplicateHeader(h)) if h == "dc.title"
        ));

        let empty = ExportProfile::new(RecordKind::Item, Vec::new());
        assert!(matches!(empty.validate(), Err(ProfileError::Empty)));
    }

    #[test]
    fn test_from_json_rejects_bad_pattern() {
        let json = r#"{
            "kind": "item",
            "columns": [
                {"header": "dc.title", "source": {"type": "attribute", "name": "title"},
                 "operations": [{"type": "replace", "pattern": "[", "value": ""}]}
            ]
        }"#;
        assert!(matches!(
            ExportProfile::from_json(json),
            Err(ProfileError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_check_kind() {
        let profile = ExportProfile::builtin(RecordKind::Thesis);
        assert!(profile.check_kind(RecordKind::Thesis).is_ok());
        let err = profile.check_kind(RecordKind::Item).unwrap_err();
        assert!(matches!(err, ProfileError::KindMismatch { .. }));
        assert!(err.to_string().contains("theses"));
    }

    #[test]
    fn test_derivable_from() {
        assert_eq!(ValueSource::OwnerEmail.derivable_from(), vec!["owner_id"]);
        assert!(ValueSource::ThumbnailIndex.derivable_from().is_empty());
        assert!(ValueSource::EditHistory.derivable_from().is_empty());
    }
}
