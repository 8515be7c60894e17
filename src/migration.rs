//! One-shot import of visit collections written before the tiered layout.
//!
//! Gated on `Metadata::schema_version`: once a store has been brought up to
//! [`CURRENT_SCHEMA_VERSION`] the legacy keys are never consulted again.

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::error::Result;
use crate::model::{VisitRecord, VisitStatus};
use crate::VisitDb;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Keys older builds kept visits under, in import order
pub const LEGACY_KEYS: [&str; 4] = ["visits", "oscar_visits", "scheduledVisits", "visitHistory"];

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MigrationReport {
    pub from_version: u32,
    pub migrated: usize,
    /// Legacy keys left in place because they, or one of their entries,
    /// could not be read
    pub skipped_keys: Vec<String>,
}

pub(crate) fn migrate(db: &VisitDb) -> Result<MigrationReport> {
    let _guard = db.lock()?;
    let now = Utc::now();

    let from_version = db.load_metadata()?.schema_version;
    let mut report = MigrationReport { from_version, ..Default::default() };
    if from_version >= CURRENT_SCHEMA_VERSION {
        return Ok(report);
    }

    for key in LEGACY_KEYS {
        let Some(raw) = db.store().get(key)? else {
            continue;
        };
        let entries = match serde_json::from_str::<Value>(&raw) {
            Ok(value) => flatten_entries(value),
            Err(e) => {
                error!("Error migrating '{}': {}", key, e);
                report.skipped_keys.push(key.to_string());
                continue;
            }
        };

        let mut unreadable = 0;
        for entry in entries {
            let Some(entry) = normalize_entry(entry, key) else {
                continue;
            };
            let visit: VisitRecord = match serde_json::from_value(entry) {
                Ok(visit) => visit,
                Err(e) => {
                    warn!("Could not read visit under '{}': {}", key, e);
                    unreadable += 1;
                    continue;
                }
            };
            db.save_locked(visit, false, now)?;
            report.migrated += 1;
        }

        if unreadable > 0 {
            error!("Keeping '{}': {} entries were not migrated", key, unreadable);
            report.skipped_keys.push(key.to_string());
        } else {
            db.store().remove(key)?;
        }
    }

    if report.migrated > 0 {
        db.rebuild_indexes_locked()?;
    }

    let mut metadata = db.load_metadata()?;
    metadata.schema_version = CURRENT_SCHEMA_VERSION;
    db.write_metadata(&metadata)?;

    info!(from = from_version, to = CURRENT_SCHEMA_VERSION, migrated = report.migrated, "Schema upgraded");
    Ok(report)
}

const NUMERIC_FIELDS: [&str; 2] = ["duration", "visitRating"];

/// Loosens a legacy entry into the current record shape. Numbers stored as
/// strings are parsed, unknown statuses and any other field of the wrong
/// type are dropped. Entries without an id yield `None`.
fn normalize_entry(entry: Value, key: &str) -> Option<Value> {
    let Value::Object(mut fields) = entry else {
        return None;
    };

    let id = match fields.remove("id")? {
        Value::String(id) if !id.is_empty() => id,
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    for name in NUMERIC_FIELDS {
        if let Some(value) = fields.get_mut(name) {
            *value = coerce_count(value).unwrap_or(Value::Null);
        }
    }

    if let Some(Value::String(status)) = fields.get("status") {
        let parsed = status.parse::<VisitStatus>().ok();
        fields.insert("status".into(), parsed.map_or(Value::Null, |s| Value::from(s.as_str())));
    }

    let mut normalized = Map::new();
    for (name, value) in fields {
        let single = Value::Object(Map::from_iter([(name.clone(), value.clone())]));
        if serde_json::from_value::<VisitRecord>(single).is_ok() {
            normalized.insert(name, value);
        } else {
            warn!("Dropping field '{}' of legacy visit '{}' under '{}'", name, id, key);
        }
    }
    normalized.insert("id".into(), Value::String(id));
    Some(Value::Object(normalized))
}

fn coerce_count(value: &Value) -> Option<Value> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (n.is_finite() && n >= 0.0).then(|| Value::from(n.round() as u64))
}

/// Legacy values are either a list of visits or an object of lists
/// (scheduled visits grouped by day).
fn flatten_entries(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(groups) => groups
            .into_iter()
            .flat_map(|(_, group)| match group {
                Value::Array(items) => items,
                other => vec![other],
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TierConfig;
    use crate::storage::{KvStore, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_flatten_grouped_object() {
        let grouped = json!({
            "2026-01-01": [{ "id": "a" }, { "id": "b" }],
            "2026-01-02": [{ "id": "c" }]
        });
        assert_eq!(flatten_entries(grouped).len(), 3);
        assert!(flatten_entries(json!("text")).is_empty());
    }

    #[test]
    fn test_legacy_keys_are_imported_and_removed() {
        let store = Arc::new(MemoryStore::new());
        store
            .set("visits", r#"[{"id":"old1","date":"2026-10-01","status":"completed"},{"date":"2026-10-02"}]"#)
            .unwrap();
        store
            .set("scheduledVisits", r#"{"2026-10-20":[{"id":"old2","date":"2026-10-20","hotelId":"hotel_003"}]}"#)
            .unwrap();

        let db = VisitDb::open(store.clone(), TierConfig::default()).unwrap();

        assert!(db.get_by_id("old1").unwrap().is_some());
        assert!(db.get_by_id("old2").unwrap().is_some());
        assert_eq!(db.all_visits().unwrap().len(), 2);
        assert_eq!(db.visits_by_hotel("hotel_003").unwrap().len(), 1);
        assert!(store.get("visits").unwrap().is_none());
        assert!(store.get("scheduledVisits").unwrap().is_none());
        assert_eq!(db.metadata().unwrap().schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_migration_runs_once() {
        let store = Arc::new(MemoryStore::new());
        let db = VisitDb::open(store.clone(), TierConfig::default()).unwrap();
        drop(db);

        // Written after the upgrade: must not be picked up on reopen
        store.set("visits", r#"[{"id":"late"}]"#).unwrap();
        let db = VisitDb::open(store.clone(), TierConfig::default()).unwrap();

        assert!(db.get_by_id("late").unwrap().is_none());
        assert!(store.get("visits").unwrap().is_some());
    }

    #[test]
    fn test_loosely_typed_entries_are_migrated() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                "visits",
                r#"[{"id":"a","duration":"60"},{"id":"b","status":"pending"},{"id":"c","visitRating":"4"},
                    {"id":"d","status":"Completed","date":"someday"},{"id":7},{"id":"ok"}]"#,
            )
            .unwrap();

        let db = VisitDb::open(store.clone(), TierConfig::default()).unwrap();

        let mut ids: Vec<String> = db.all_visits().unwrap().into_iter().map(|v| v.id).collect();
        ids.sort();
        assert_eq!(ids, ["7", "a", "b", "c", "d", "ok"]);
        assert_eq!(db.get_by_id("a").unwrap().unwrap().duration, Some(60));
        assert_eq!(db.get_by_id("b").unwrap().unwrap().status, None);
        assert_eq!(db.get_by_id("c").unwrap().unwrap().visit_rating, Some(4));
        let d = db.get_by_id("d").unwrap().unwrap();
        assert_eq!(d.status, Some(VisitStatus::Completed));
        assert_eq!(d.date, None);
        assert!(store.get("visits").unwrap().is_none());
    }

    #[test]
    fn test_normalize_entry() {
        assert!(normalize_entry(json!({ "date": "2026-01-01" }), "visits").is_none());
        assert!(normalize_entry(json!({ "id": "" }), "visits").is_none());
        assert!(normalize_entry(json!(["a"]), "visits").is_none());

        let entry = normalize_entry(json!({ "id": "x", "duration": 45.6, "visitRating": "many" }), "visits").unwrap();
        assert_eq!(entry, json!({ "id": "x", "duration": 46, "visitRating": null }));
    }

    #[test]
    fn test_unparsable_key_is_left_in_place() {
        let store = Arc::new(MemoryStore::new());
        store.set("visitHistory", "not json").unwrap();

        let db = VisitDb::open(store.clone(), TierConfig::default()).unwrap();

        assert!(db.all_visits().unwrap().is_empty());
        assert_eq!(store.get("visitHistory").unwrap().as_deref(), Some("not json"));
    }
}
