//! Flattened CSV of DSpace REST objects.
//!
//! Reads communities, collections, items or epersons saved from the DSpace
//! REST API (a JSON array, JSON lines, or a paged `_embedded` response) and
//! writes one row per object under a fixed header set, so the DSpace side
//! can be audited against the Jupiter exports with `tools compare`.
//!
//! Metadata fields listed in [`LIST_VALUE_FIELDS`] are reduced to their
//! `value`s; other nested objects and lists become dotted column names
//! (`metadata.dc.provenance.0.value`). Keys outside the header set are
//! dropped.

use serde_json::{Map, Value};
use std::path::Path;

use crate::error::{ExportResult, SnapshotError};
use crate::export::{create_csv, ensure_dir};
use crate::logs::{log_info, log_success, log_warning};
use crate::models::scalar_to_string;
use crate::snapshot::parse_records;
use crate::transform::flatten;

/// Object types with a flattened export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DspaceKind {
    Communities,
    Collections,
    Items,
    /// One row per bitstream of each item, read from the items' embedded
    /// bundles.
    Bitstreams,
    Users,
}

impl DspaceKind {
    /// Key of the object list in a paged REST response.
    pub fn embedded_key(&self) -> &'static str {
        match self {
            DspaceKind::Communities => "communities",
            DspaceKind::Collections => "collections",
            DspaceKind::Items | DspaceKind::Bitstreams => "items",
            DspaceKind::Users => "epersons",
        }
    }

    pub fn headers(&self) -> &'static [&'static str] {
        match self {
            DspaceKind::Communities => COMMUNITY_HEADERS,
            DspaceKind::Collections => COLLECTION_HEADERS,
            DspaceKind::Items => ITEM_HEADERS,
            DspaceKind::Bitstreams => BITSTREAM_HEADERS,
            DspaceKind::Users => USER_HEADERS,
        }
    }
}

pub const COMMUNITY_HEADERS: &[&str] = &[
    "uuid",
    "name",
    "handle",
    "metadata",
    "lastModified",
    "type",
    "metadata.dc.description",
    "metadata.dc.description.abstract",
    "metadata.dc.identifier.uri",
    "metadata.dc.rights",
    "metadata.dc.title",
];

pub const COLLECTION_HEADERS: &[&str] = &[
    "handle",
    "name",
    "lastModified",
    "type",
    "uuid",
    "provenance.ual.jupiterId.collection",
    "provenance.ual.jupiterId.community",
    "metadata.dc.description",
    "metadata.dc.description.abstract",
    "metadata.dc.identifier.uri",
    "metadata.dc.provenance.0.authority",
    "metadata.dc.provenance.0.confidence",
    "metadata.dc.provenance.0.language",
    "metadata.dc.provenance.0.place",
    "metadata.dc.provenance.0.value",
    "metadata.dc.title",
    "metadata.dspace.entity.type",
];

pub const ITEM_HEADERS: &[&str] = &[
    "uuid",
    "metadata.ual.jupiterId",
    "handle",
    "lastModified",
    "name",
    "provenance.ual.jupiterId.item",
    "provenance.ual.jupiterId.collection",
    "type",
    "access_rights",
    "metadata.dc.contributor",
    "metadata.dc.contributor.author",
    "metadata.dc.contributor.advisor",
    "metadata.dc.contributor.other",
    "metadata.dc.coverage.spatial",
    "metadata.dc.coverage.temporal",
    "metadata.dc.creator",
    "metadata.dc.date.accessioned",
    "metadata.dc.date.available",
    "metadata.dc.date.created",
    "metadata.dc.date.issued",
    "metadata.dc.description",
    "metadata.dc.description.abstract",
    "metadata.dc.description.provenance",
    "metadata.dc.description.sponsorship",
    "metadata.dc.identifier.citation",
    "metadata.dc.identifier.govdoc",
    "metadata.dc.identifier.isbn",
    "metadata.dc.identifier.ismn",
    "metadata.dc.identifier.issn",
    "metadata.dc.identifier.other",
    "metadata.dc.identifier.doi",
    "metadata.dc.identifier.uri",
    "metadata.dc.language",
    "metadata.dc.language.iso",
    "metadata.dc.publisher",
    "metadata.dc.relation",
    "metadata.dc.relation.isversionof",
    "metadata.dc.relation.ispartof",
    "metadata.dc.relation.ispartofseries",
    "metadata.dc.rights",
    "metadata.dc.rights.license",
    "metadata.dc.source",
    "metadata.dc.subject",
    "metadata.dc.title",
    "metadata.dc.title.alternative",
    "metadata.dc.type",
    "metadata.dcterms.accessRights",
    "metadata.dcterms.available",
    "metadata.dcterms.source",
    "metadata.dspace.entity.type",
    "metadata.local.embargo.lift",
    "metadata.local.embargo.terms",
    "metadata.person.email",
    "metadata.person.familyName",
    "metadata.person.givenName",
    "metadata.relation.isAuthorOfPublication",
    "metadata.relation.isAuthorOfPublication.latestForDiscovery",
    "metadata.relation.isPublicationOfAuthor",
    "metadata.relation.isPublicationOfAuthor.latestForDiscovery",
    "metadata.thesis.degree.discipline",
    "metadata.thesis.degree.grantor",
    "metadata.thesis.degree.level",
    "metadata.thesis.degree.name",
    "metadata.ual.date.createdInERA",
    "metadata.ual.date.createdInJupiter",
    "metadata.ual.date.graduation",
    "metadata.ual.date.updatedInJupiter",
    "metadata.ual.department",
    "metadata.ual.depositor",
    "metadata.ual.fedora3Handle",
    "metadata.ual.fedora3UUID",
    "metadata.ual.jupiterCollection",
    "metadata.ual.jupiterFilename",
    "metadata.ual.jupiterThumbnail",
    "metadata.ual.hydraNoid",
    "metadata.ual.ingestBatch",
    "metadata.ual.owner",
    "metadata.ual.recordCreatedInJupiter",
    "metadata.ual.sortYear",
    "metadata.ual.stats.jupiterDownloads",
    "metadata.ual.stats.jupiterViews",
];

pub const BITSTREAM_HEADERS: &[&str] = &[
    "item.handle",
    "item.uuid",
    "item.name",
    "provenance.ual.jupiterId.item",
    "bitstream.bundleName",
    "bitstream.sizeBytes",
    "bitstream.id",
    "bitstream.name",
    "bitstream.sequenceId",
    "bitstream.checksum.value",
    "bitstream.checksum_algorithm",
    "bitstream.uuid",
    "bitstream.metadata.dc.title",
    "bitstream.metadata.dc.source.0.value",
    "bitstream.metadata.dc.description",
    "bundle.name",
];

pub const USER_HEADERS: &[&str] = &[
    "canLogIn",
    "email",
    "handle",
    "lastActive",
    "lastModified",
    "name",
    "netid",
    "requireCertificate",
    "selfRegistered",
    "type",
    "uuid",
    "metadata.dspace.agreements.cookies.0.authority",
    "metadata.dspace.agreements.cookies.0.confidence",
    "metadata.dspace.agreements.cookies.0.language",
    "metadata.dspace.agreements.cookies.0.place",
    "metadata.dspace.agreements.cookies.0.value",
    "metadata.dspace.agreements.end-user.0.value",
    "metadata.dspace.agreements.end-user.0.confidence",
    "metadata.dspace.agreements.end-user.0.language",
    "metadata.dspace.agreements.end-user.0.place",
    "metadata.dspace.agreements.end-user.0.authority",
    "metadata.eperson.firstname.0.authority",
    "metadata.eperson.firstname.0.confidence",
    "metadata.eperson.firstname.0.language",
    "metadata.eperson.firstname.0.place",
    "metadata.eperson.firstname.0.value",
    "metadata.eperson.language.0.authority",
    "metadata.eperson.language.0.confidence",
    "metadata.eperson.language.0.language",
    "metadata.eperson.language.0.value",
    "metadata.eperson.language.0.place",
    "metadata.eperson.lastname.0.authority",
    "metadata.eperson.lastname.0.confidence",
    "metadata.eperson.lastname.0.language",
    "metadata.eperson.lastname.0.place",
    "metadata.eperson.lastname.0.value",
];

/// Metadata fields reduced to the list of their `value`s.
pub const LIST_VALUE_FIELDS: &[&str] = &[
    "dc.contributor",
    "dc.contributor.advisor",
    "dc.contributor.author",
    "dc.contributor.other",
    "dc.coverage.spatial",
    "dc.coverage.temporal",
    "dc.creator",
    "dc.date.accessioned",
    "dc.date.available",
    "dc.date.created",
    "dc.date.issued",
    "dc.description",
    "dc.description.abstract",
    "dc.description.provenance",
    "dc.description.sponsorship",
    "dc.identifier.citation",
    "dc.identifier.govdoc",
    "dc.identifier.isbn",
    "dc.identifier.ismn",
    "dc.identifier.issn",
    "dc.identifier.other",
    "dc.identifier.doi",
    "dc.identifier.uri",
    "dc.language",
    "dc.language.iso",
    "dc.publisher",
    "dc.relation",
    "dc.relation.isversionof",
    "dc.relation.ispartof",
    "dc.relation.ispartofseries",
    "dc.rights",
    "dc.rights.license",
    "dc.source",
    "dc.subject",
    "dc.title",
    "dc.title.alternative",
    "dc.type",
    "dcterms.accessRights",
    "dcterms.available",
    "dcterms.source",
    "dspace.entity.type",
    "local.embargo.lift",
    "local.embargo.terms",
    "person.email",
    "person.familyName",
    "person.givenName",
    "relation.isAuthorOfPublication",
    "relation.isAuthorOfPublication.latestForDiscovery",
    "relation.isPublicationOfAuthor",
    "relation.isPublicationOfAuthor.latestForDiscovery",
    "thesis.degree.discipline",
    "thesis.degree.grantor",
    "thesis.degree.level",
    "thesis.degree.name",
    "ual.date.createdInERA",
    "ual.date.createdInJupiter",
    "ual.date.graduation",
    "ual.date.updatedInJupiter",
    "ual.department",
    "ual.depositor",
    "ual.fedora3Handle",
    "ual.fedora3UUID",
    "ual.jupiterCollection",
    "ual.jupiterFilename",
    "ual.jupiterThumbnail",
    "ual.hydraNoid",
    "ual.ingestBatch",
    "ual.owner",
    "ual.recordCreatedInJupiter",
    "ual.sortYear",
    "ual.stats.jupiterDownloads",
    "ual.stats.jupiterViews",
];

/// Metadata fields reduced to their first `value`.
pub const SINGLE_VALUE_FIELDS: &[&str] = &["ual.jupiterId"];

/// HAL keys, skipped at every depth. Embeds are read explicitly.
const SKIPPED_KEYS: &[&str] = &["_links", "_embedded"];

// =============================================================================
// Flattening
// =============================================================================

fn entry_values(entries: &[Value]) -> Vec<Value> {
    entries
        .iter()
        .map(|entry| entry.get("value").cloned().unwrap_or(Value::Null))
        .collect()
}

fn walk(object: &Map<String, Value>, headers: &[&str], prefix: &str, out: &mut Map<String, Value>) {
    for (key, value) in object {
        if SKIPPED_KEYS.contains(&key.as_str()) {
            continue;
        }
        let flat_key = format!("{}{}", prefix, key);
        match value {
            Value::Object(inner) => walk(inner, headers, &format!("{}.", flat_key), out),
            Value::Array(entries) if SINGLE_VALUE_FIELDS.contains(&key.as_str()) => {
                let first = entry_values(entries).into_iter().next().unwrap_or(Value::Null);
                out.insert(flat_key, first);
            }
            Value::Array(entries) if LIST_VALUE_FIELDS.contains(&key.as_str()) => {
                out.insert(flat_key, Value::Array(entry_values(entries)));
            }
            Value::Array(entries) => {
                for (idx, entry) in entries.iter().enumerate() {
                    match entry {
                        Value::Object(inner) => {
                            walk(inner, headers, &format!("{}.{}.", flat_key, idx), out)
                        }
                        _ if headers.contains(&flat_key.as_str()) => {
                            if let Value::Array(list) = out
                                .entry(flat_key.clone())
                                .or_insert_with(|| Value::Array(Vec::new()))
                            {
                                list.push(entry.clone());
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ if headers.contains(&flat_key.as_str()) => {
                out.insert(flat_key, value.clone());
            }
            _ => {}
        }
    }
}

/// Flatten one REST object into dotted keys, keeping only header columns
/// and the reduced metadata fields.
pub fn flatten_object(object: &Value, headers: &[&str]) -> Map<String, Value> {
    let mut out = Map::new();
    match object {
        Value::Object(map) => walk(map, headers, "", &mut out),
        other => log_warning(format!("Not a DSpace object: {}", other)),
    }
    out
}

/// CSV cells of a flattened object in header order.
pub fn row(flat: &Map<String, Value>, headers: &[&str]) -> Vec<String> {
    headers
        .iter()
        .map(|h| flat.get(*h).map(flatten).unwrap_or_default())
        .collect()
}

// =============================================================================
// Provenance and embeds
// =============================================================================

/// A Jupiter id recorded in an object's `dc.provenance` JSON, e.g.
/// `{"ual.jupiterId.collection": "..."}`. The last entry holding the key wins.
pub fn provenance_id(object: &Value, key: &str) -> Option<String> {
    let entries = object.pointer("/metadata/dc.provenance")?.as_array()?;
    let mut found = None;
    for entry in entries {
        let raw = entry.get("value").and_then(Value::as_str).unwrap_or_default();
        if raw.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(parsed) => {
                if let Some(id) = parsed.get(key) {
                    found = Some(scalar_to_string(id));
                }
            }
            Err(e) => log_warning(format!("Unreadable provenance '{}': {}", raw, e)),
        }
    }
    found
}

/// An embedded list, either `_embedded.<name>` or the paged
/// `_embedded.<name>._embedded.<name>`.
fn embedded_list<'a>(object: &'a Value, name: &str) -> Vec<&'a Value> {
    let paged = format!("/_embedded/{}/_embedded/{}", name, name);
    let direct = format!("/_embedded/{}", name);
    object
        .pointer(&paged)
        .or_else(|| object.pointer(&direct))
        .and_then(Value::as_array)
        .map(|list| list.iter().collect())
        .unwrap_or_default()
}

fn embedded_str(object: &Value, pointer: &str) -> Value {
    object.pointer(pointer).cloned().unwrap_or(Value::Null)
}

fn with_fields(object: &Value, fields: Vec<(&str, Value)>) -> Value {
    let mut merged = object.as_object().cloned().unwrap_or_default();
    for (key, value) in fields {
        merged.insert(key.to_string(), value);
    }
    Value::Object(merged)
}

/// Objects to flatten for a kind, with the provenance columns filled in from
/// the object and its embeds.
fn prepared(kind: DspaceKind, object: &Value) -> Vec<Value> {
    let opt = |v: Option<String>| v.map(Value::String).unwrap_or(Value::Null);
    match kind {
        DspaceKind::Communities | DspaceKind::Users => vec![object.clone()],
        DspaceKind::Collections => vec![with_fields(
            object,
            vec![
                (
                    "provenance.ual.jupiterId.collection",
                    opt(provenance_id(object, "ual.jupiterId.collection")),
                ),
                // Communities carry no provenance; the parent's name stands in.
                (
                    "provenance.ual.jupiterId.community",
                    embedded_str(object, "/_embedded/parentCommunity/name"),
                ),
            ],
        )],
        DspaceKind::Items => {
            let owning = object.pointer("/_embedded/owningCollection");
            vec![with_fields(
                object,
                vec![
                    (
                        "provenance.ual.jupiterId.item",
                        opt(provenance_id(object, "ual.jupiterId.item")),
                    ),
                    (
                        "provenance.ual.jupiterId.collection",
                        opt(owning.and_then(|c| provenance_id(c, "ual.jupiterId.collection"))),
                    ),
                    ("access_rights", embedded_str(object, "/_embedded/accessStatus/status")),
                ],
            )]
        }
        DspaceKind::Bitstreams => {
            let item_id = opt(provenance_id(object, "ual.jupiterId.item"));
            let mut rows = Vec::new();
            for bundle in embedded_list(object, "bundles") {
                for bitstream in embedded_list(bundle, "bitstreams") {
                    let mut row = Map::new();
                    row.insert("item".to_string(), object.clone());
                    row.insert("bundle".to_string(), bundle.clone());
                    row.insert("bitstream".to_string(), bitstream.clone());
                    row.insert("provenance.ual.jupiterId.item".to_string(), item_id.clone());
                    row.insert(
                        "bitstream.bundleName".to_string(),
                        bundle.get("name").cloned().unwrap_or(Value::Null),
                    );
                    row.insert(
                        "bitstream.checksum.value".to_string(),
                        embedded_str(bitstream, "/checkSum/value"),
                    );
                    row.insert(
                        "bitstream.checksum_algorithm".to_string(),
                        embedded_str(bitstream, "/checkSum/checkSumAlgorithm"),
                    );
                    rows.push(Value::Object(row));
                }
            }
            rows
        }
    }
}

/// Flattened rows for a list of REST objects.
pub fn rows(kind: DspaceKind, objects: &[Value]) -> Vec<Vec<String>> {
    let headers = kind.headers();
    objects
        .iter()
        .flat_map(|object| prepared(kind, object))
        .map(|object| row(&flatten_object(&object, headers), headers))
        .collect()
}

// =============================================================================
// Input / output
// =============================================================================

/// Objects of a saved REST response: an array, JSON lines, a paged
/// `_embedded.<kind>` page, or a single object.
pub fn load_objects(path: &Path, kind: DspaceKind) -> ExportResult<Vec<Value>> {
    let content = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if let Ok(Value::Object(page)) = serde_json::from_str::<Value>(&content) {
        let page = Value::Object(page);
        let list = page
            .pointer(&format!("/_embedded/{}", kind.embedded_key()))
            .and_then(Value::as_array);
        return Ok(match list {
            Some(list) => list.clone(),
            None => vec![page],
        });
    }

    let objects = parse_records(&content).map_err(|(line, message)| SnapshotError::Json {
        path: path.to_path_buf(),
        line,
        message,
    })?;
    Ok(objects)
}

/// Flatten a saved REST response into a CSV. Returns the number of rows.
pub fn export_flattened(kind: DspaceKind, input: &Path, output: &Path) -> ExportResult<usize> {
    let objects = load_objects(input, kind)?;
    log_info(format!("🔄 Flattening {} DSpace {}", objects.len(), kind.embedded_key()));

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    let mut writer = create_csv(output, kind.headers())?;
    let rows = rows(kind, &objects);
    for row in &rows {
        writer.write_record(row)?;
    }
    writer.flush()?;

    log_success(format!("{} rows -> {}", rows.len(), output.display()));
    Ok(rows.len())
}
