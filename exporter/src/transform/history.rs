//! Provenance value built from embargo history and the audit log.

use serde::Serialize;
use serde_json::{json, Map, Value};

use super::profile::LIST_SEPARATOR;
use crate::models::{is_blank, Version};

/// Change keys that never go into provenance.
const IGNORED_CHANGES: [&str; 2] = ["aasm_state", "logo_id"];

/// One audit-log row as written to `dc.description.provenance`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditEntry {
    pub event: String,
    pub date: String,
    pub changes: Map<String, Value>,
    pub edited_by: String,
}

/// Who made a change: the user's email, the raw `whodunnit` when no such
/// user exists, or `Unknown`.
pub fn edited_by<'a>(whodunnit: Option<&str>, email_of: impl Fn(&str) -> Option<&'a str>) -> String {
    match whodunnit.map(str::trim).filter(|w| !w.is_empty()) {
        Some(who) => email_of(who).map(str::to_string).unwrap_or_else(|| who.to_string()),
        None => "Unknown".to_string(),
    }
}

/// Turn audit-log rows into provenance entries.
///
/// Rows without changes are dropped, `aasm_state` and `logo_id` are removed
/// from the rest, and entries left with only `updated_at` are dropped.
pub fn clean_up_edit_history<'a>(
    versions: &[&Version],
    email_of: impl Fn(&str) -> Option<&'a str>,
) -> Vec<EditEntry> {
    versions
        .iter()
        .filter(|v| !v.object_changes.is_empty())
        .map(|v| {
            let mut changes = v.object_changes.clone();
            for key in IGNORED_CHANGES {
                changes.remove(key);
            }
            EditEntry {
                event: v.event.clone(),
                date: version_date(v),
                changes,
                edited_by: edited_by(v.whodunnit.as_deref(), &email_of),
            }
        })
        .filter(|entry| !(entry.changes.len() == 1 && entry.changes.contains_key("updated_at")))
        .collect()
}

/// ISO 8601 with milliseconds, UTC.
fn version_date(version: &Version) -> String {
    version
        .created_at()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
        .unwrap_or_else(|| version.created_at.clone())
}

/// The full provenance value: embargo history and edit history as JSON
/// documents joined with `||`, blank parts omitted.
pub fn edit_history<'a>(
    embargo_history: Option<&Value>,
    versions: &[&Version],
    email_of: impl Fn(&str) -> Option<&'a str>,
) -> String {
    let mut parts = Vec::new();

    if let Some(history) = embargo_history.filter(|h| !is_blank(h)) {
        parts.push(json!({ "jupiter_embargo_history": history }).to_string());
    }

    let entries = clean_up_edit_history(versions, email_of);
    if !entries.is_empty() {
        parts.push(json!({ "jupiter_edit_history": entries }).to_string());
    }

    parts.join(LIST_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(event: &str, whodunnit: Option<&str>, changes: Value) -> Version {
        serde_json::from_value(json!({
            "item_type": "Item",
            "item_id": "i1",
            "event": event,
            "whodunnit": whodunnit,
            "created_at": "2020-02-03 04:05:06.789 UTC",
            "object_changes": changes
        }))
        .unwrap()
    }

    fn emails(id: &str) -> Option<&'static str> {
        (id == "1").then_some("admin@ualberta.ca")
    }

    #[test]
    fn test_edited_by() {
        assert_eq!(edited_by(Some("1"), emails), "admin@ualberta.ca");
        assert_eq!(edited_by(Some("77"), emails), "77");
        assert_eq!(edited_by(Some(" "), emails), "Unknown");
        assert_eq!(edited_by(None, emails), "Unknown");
    }

    #[test]
    fn test_clean_up_filters_entries() {
        let versions = [
            version("create", Some("1"), json!({"title": [null, "A"], "aasm_state": [null, "draft"]})),
            version("update", None, json!({})),
            version("update", Some("2"), json!({"updated_at": ["x", "y"], "logo_id": [null, "f1"]})),
            version("update", Some("2"), json!({"aasm_state": ["draft", "available"]})),
        ];
        let refs: Vec<&Version> = versions.iter().collect();
        let entries = clean_up_edit_history(&refs, emails);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event, "create");
        assert_eq!(entries[0].date, "2020-02-03T04:05:06.789Z");
        assert_eq!(entries[0].edited_by, "admin@ualberta.ca");
        assert!(!entries[0].changes.contains_key("aasm_state"));
        // A change set holding only ignored keys stays, now empty.
        assert!(entries[1].changes.is_empty());
        assert_eq!(entries[1].edited_by, "2");
    }

    #[test]
    fn test_edit_history_joins_parts() {
        let versions = [version("update", Some("1"), json!({"title": ["A", "B"]}))];
        let refs: Vec<&Version> = versions.iter().collect();
        let embargo = json!(["Embargo lifted 2020-01-01"]);
        let value = edit_history(Some(&embargo), &refs, emails);

        let (embargo_part, edit_part) = value.split_once("||").unwrap();
        assert_eq!(embargo_part, r#"{"jupiter_embargo_history":["Embargo lifted 2020-01-01"]}"#);
        let parsed: Value = serde_json::from_str(edit_part).unwrap();
        assert_eq!(parsed["jupiter_edit_history"][0]["changes"]["title"], json!(["A", "B"]));
        assert_eq!(parsed["jupiter_edit_history"][0]["edited_by"], json!("admin@ualberta.ca"));
    }

    #[test]
    fn test_edit_history_blank() {
        assert_eq!(edit_history(Some(&json!([])), &[], emails), "");
        assert_eq!(edit_history(None, &[], emails), "");
    }

    #[test]
    fn test_entry_key_order() {
        let versions = [version("update", Some("1"), json!({"title": ["A", "B"]}))];
        let refs: Vec<&Version> = versions.iter().collect();
        let value = edit_history(None, &refs, emails);
        let event = value.find("\"event\"").unwrap();
        let date = value.find("\"date\"").unwrap();
        let edited = value.find("\"edited_by\"").unwrap();
        assert!(event < date && date < edited);
    }
}
