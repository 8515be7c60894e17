pub mod analytics;
pub mod codec;
pub mod config;
pub mod email;
pub mod error;
pub mod hotels;
pub mod index;
pub mod manager;
pub mod migration;
pub mod model;
pub mod parser;
pub mod shell;
pub mod storage;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::codec::{compress_with_limit, decompress};
use crate::config::TierConfig;
use crate::error::{Error, Result};
use crate::migration::CURRENT_SCHEMA_VERSION;
use crate::model::{
    CompressedVisitRecord, ExportBundle, Metadata, NewVisit, StorageStats, VisitRecord, VisitStatus,
};
use crate::storage::{KvStore, StorageError, KEY_METADATA, KEY_VISITS_ACTIVE, KEY_VISITS_ARCHIVED};

/// Assumed size of an uncompressed record when estimating the compression ratio
const ASSUMED_RECORD_BYTES: f64 = 500.0;

/// Maintenance sweeps once the active tier passes this share of capacity
const MAINTENANCE_SWEEP_RATIO: f64 = 0.8;

/// Two-tier visit store on top of a [`KvStore`].
///
/// Recent visits live uncompressed in the active tier; visits older than the
/// archive threshold live compressed in the archived tier. Every id is held by
/// exactly one tier. The store itself is the source of truth: collections are
/// read, modified and written back whole, one operation at a time.
pub struct VisitDb {
    store: Arc<dyn KvStore>,
    config: TierConfig,
    // Serializes read-modify-write cycles (callers vs. the maintenance thread)
    write_lock: Mutex<()>,
}

impl fmt::Debug for VisitDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisitDb")
            .field("archive_threshold_days", &self.config.archive_threshold_days)
            .field("max_active", &self.config.max_active)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceReport {
    pub swept: usize,
    pub pruned_buckets: usize,
    pub stats: StorageStats,
}

impl VisitDb {
    /// Opens the store, creating the metadata document and running any
    /// pending schema migration.
    pub fn open(store: Arc<dyn KvStore>, config: TierConfig) -> Result<Self> {
        let db = Self { store, config, write_lock: Mutex::new(()) };

        {
            let _guard = db.lock()?;
            if db.store.get(KEY_METADATA)?.is_none() {
                let metadata = Metadata { indexes: index::VisitIndex::new(), ..Default::default() };
                db.write_metadata(&metadata)?;
            }
        }

        let report = migration::migrate(&db)?;
        if report.migrated > 0 {
            info!("Migrated {} legacy visits into tiered storage", report.migrated);
        }

        info!(
            threshold_days = db.config.archive_threshold_days,
            max_active = db.config.max_active,
            "Visit storage ready"
        );
        Ok(db)
    }

    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    // --- WRITES ---

    pub fn save(&self, visit: VisitRecord) -> Result<String> {
        self.save_with(visit, true)
    }

    /// Saves a visit into the tier its age calls for. `update_index = false`
    /// defers indexing to a later [`VisitDb::rebuild_indexes`] (bulk loads).
    pub fn save_with(&self, visit: VisitRecord, update_index: bool) -> Result<String> {
        let _guard = self.lock()?;
        self.save_locked(visit, update_index, Utc::now())
    }

    pub fn schedule(&self, visit: NewVisit) -> Result<String> {
        self.save(visit.into_record())
    }

    /// Returns false when no visit has this id.
    pub fn update_status(&self, id: &str, status: VisitStatus) -> Result<bool> {
        let _guard = self.lock()?;
        let Some(mut visit) = self.find_locked(id)? else {
            return Ok(false);
        };
        visit.status = Some(status);
        self.save_locked(visit, true, Utc::now())?;
        Ok(true)
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.lock()?;

        let mut active = self.load_active()?;
        if let Some(pos) = active.iter().position(|v| v.id == id) {
            active.remove(pos);
            self.write_active(&active)?;
            self.unindex(id)?;
            return Ok(true);
        }

        let mut archived = self.load_archived()?;
        if let Some(pos) = archived.iter().position(|v| v.id == id) {
            archived.remove(pos);
            self.write_archived(&archived)?;
            self.unindex(id)?;
            return Ok(true);
        }

        Ok(false)
    }

    /// Moves every active visit past the archive threshold into the archived
    /// tier. Returns how many moved.
    pub fn sweep(&self) -> Result<usize> {
        let _guard = self.lock()?;
        self.sweep_locked(Utc::now())
    }

    /// Archives the older half of the active tier regardless of age.
    pub fn emergency_archival(&self) -> Result<usize> {
        let _guard = self.lock()?;
        self.emergency_archival_locked()
    }

    // --- READS ---

    pub fn get_by_id(&self, id: &str) -> Result<Option<VisitRecord>> {
        let _guard = self.lock()?;
        self.find_locked(id)
    }

    /// Resolves ids active-first; ids held by neither tier are skipped.
    pub fn get_by_ids<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<VisitRecord>> {
        let _guard = self.lock()?;
        self.get_by_ids_locked(ids)
    }

    pub fn visits_by_date(&self, date: &str) -> Result<Vec<VisitRecord>> {
        let _guard = self.lock()?;
        let metadata = self.load_metadata()?;
        self.get_by_ids_locked(metadata.indexes.by_date(date))
    }

    pub fn visits_by_hotel(&self, hotel_id: &str) -> Result<Vec<VisitRecord>> {
        let _guard = self.lock()?;
        let metadata = self.load_metadata()?;
        self.get_by_ids_locked(metadata.indexes.by_hotel(hotel_id))
    }

    pub fn visits_by_status(&self, status: VisitStatus) -> Result<Vec<VisitRecord>> {
        let _guard = self.lock()?;
        let metadata = self.load_metadata()?;
        self.get_by_ids_locked(metadata.indexes.by_status(status.as_str()))
    }

    /// Active visits followed by the decompressed archive.
    pub fn all_visits(&self) -> Result<Vec<VisitRecord>> {
        let _guard = self.lock()?;
        self.all_visits_locked()
    }

    pub fn active_visits(&self) -> Result<Vec<VisitRecord>> {
        let _guard = self.lock()?;
        self.load_active()
    }

    pub fn archived_visits(&self) -> Result<Vec<CompressedVisitRecord>> {
        let _guard = self.lock()?;
        self.load_archived()
    }

    pub fn metadata(&self) -> Result<Metadata> {
        let _guard = self.lock()?;
        self.load_metadata()
    }

    pub fn stats(&self) -> Result<StorageStats> {
        let _guard = self.lock()?;
        self.stats_locked()
    }

    // --- INDEXES ---

    /// Re-indexes both tiers from scratch. Returns the number of visits indexed.
    pub fn rebuild_indexes(&self) -> Result<usize> {
        let _guard = self.lock()?;
        self.rebuild_indexes_locked()
    }

    pub fn prune_indexes(&self) -> Result<usize> {
        let _guard = self.lock()?;
        self.prune_indexes_locked()
    }

    // --- MAINTENANCE ---

    pub fn perform_maintenance(&self) -> Result<MaintenanceReport> {
        let _guard = self.lock()?;

        let stats = self.stats_locked()?;
        let sweep_at = self.config.max_active as f64 * MAINTENANCE_SWEEP_RATIO;
        let swept = if stats.active_visits as f64 > sweep_at {
            self.sweep_locked(Utc::now())?
        } else {
            0
        };
        let pruned_buckets = self.prune_indexes_locked()?;

        info!(
            active = stats.active_visits,
            archived = stats.archived_visits,
            total_bytes = stats.total_size,
            swept,
            pruned_buckets,
            "Maintenance completed"
        );
        Ok(MaintenanceReport { swept, pruned_buckets, stats })
    }

    // --- BACKUP ---

    pub fn export_data(&self) -> Result<ExportBundle> {
        let _guard = self.lock()?;
        Ok(ExportBundle {
            active_visits: Some(self.load_active()?),
            archived_visits: Some(self.load_archived()?),
            metadata: Some(self.load_metadata()?),
            export_date: Utc::now(),
            version: Some(CURRENT_SCHEMA_VERSION.to_string()),
        })
    }

    /// Overwrites the stored collections with the bundle's. Indexes are
    /// rebuilt only when the bundle carries no metadata.
    pub fn import_data(&self, bundle: ExportBundle) -> Result<()> {
        let _guard = self.lock()?;

        if let Some(active) = &bundle.active_visits {
            self.write_active(active)?;
        }
        if let Some(archived) = &bundle.archived_visits {
            self.write_archived(archived)?;
        }
        match bundle.metadata {
            Some(mut metadata) => {
                metadata.schema_version = metadata.schema_version.max(CURRENT_SCHEMA_VERSION);
                self.write_metadata(&metadata)?;
            }
            None => {
                self.rebuild_indexes_locked()?;
            }
        }

        info!("Data imported (exported {})", bundle.export_date);
        Ok(())
    }

    // --- INTERNALS (caller holds the lock) ---

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|_| Error::Storage(StorageError::Poisoned))
    }

    pub(crate) fn save_locked(
        &self,
        mut visit: VisitRecord,
        update_index: bool,
        now: DateTime<Utc>,
    ) -> Result<String> {
        if visit.id.is_empty() {
            visit.id = generate_visit_id(now);
        }
        if visit.created_at.is_none() {
            visit.created_at = Some(now);
        }
        visit.updated_at = Some(now);
        visit.archived = false;

        let stored = if self.is_stale(&visit, now) {
            self.place_archived(&visit)?;
            true
        } else {
            self.place_active(visit.clone(), now)?
        };

        // A rejected active write leaves nothing to index
        if update_index && stored {
            self.reindex(&visit)?;
        }
        Ok(visit.id)
    }

    /// Returns false when the active write was rejected for quota.
    fn place_active(&self, visit: VisitRecord, now: DateTime<Utc>) -> Result<bool> {
        let id = visit.id.clone();
        let mut active = self.load_active()?;
        match active.iter().position(|v| v.id == visit.id) {
            Some(pos) => active[pos] = visit,
            None => active.push(visit),
        }

        // Age is re-checked on every active write, not only at capacity
        let over_capacity = active.len() > self.config.max_active;
        if over_capacity || active.iter().any(|v| self.is_stale(v, now)) {
            active = self.archive_stale(active, now)?;
        }

        let written = self.persist_active(&active)?;
        if written {
            self.drop_archived_copy(&id)?;
        }
        Ok(written)
    }

    fn place_archived(&self, visit: &VisitRecord) -> Result<()> {
        let mut archived = self.load_archived()?;
        upsert_compressed(&mut archived, compress_with_limit(visit, self.config.summary_limit));
        self.write_archived(&archived)?;

        let mut active = self.load_active()?;
        if let Some(pos) = active.iter().position(|v| v.id == visit.id) {
            active.remove(pos);
            self.persist_active(&active)?;
        }
        Ok(())
    }

    fn drop_archived_copy(&self, id: &str) -> Result<()> {
        let mut archived = self.load_archived()?;
        if let Some(pos) = archived.iter().position(|v| v.id == id) {
            archived.remove(pos);
            self.write_archived(&archived)?;
        }
        Ok(())
    }

    /// Writes the active tier. A quota failure triggers emergency archival
    /// and yields `Ok(false)`: the rejected list itself is not retried.
    fn persist_active(&self, active: &[VisitRecord]) -> Result<bool> {
        match self.write_active(active) {
            Ok(()) => Ok(true),
            Err(e) if e.is_quota() => {
                error!("Active tier write rejected: {}", e);
                self.emergency_archival_locked()?;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn sweep_locked(&self, now: DateTime<Utc>) -> Result<usize> {
        let active = self.load_active()?;
        let before = active.len();
        let remaining = self.archive_stale(active, now)?;
        let moved = before - remaining.len();
        if moved > 0 {
            self.persist_active(&remaining)?;
        }
        Ok(moved)
    }

    /// Moves stale visits from `active` into the archived tier and returns the
    /// rest. The caller persists the returned active list.
    fn archive_stale(&self, active: Vec<VisitRecord>, now: DateTime<Utc>) -> Result<Vec<VisitRecord>> {
        let (stale, remaining): (Vec<_>, Vec<_>) =
            active.into_iter().partition(|v| self.is_stale(v, now));

        if !stale.is_empty() {
            self.append_archived(&stale)?;
            info!("Archived {} old visits", stale.len());
        }
        Ok(remaining)
    }

    fn emergency_archival_locked(&self) -> Result<usize> {
        let original = self.load_active()?;
        let mut active = original.clone();
        active.sort_by_key(|v| v.reference_time());

        let midpoint = active.len() / 2;
        let mut remaining = active.split_off(midpoint);

        let mut archived = self.load_archived()?;
        for visit in &active {
            upsert_compressed(&mut archived, compress_with_limit(visit, self.config.summary_limit));
        }
        // Visits a rejected sweep already archived leave the active tier too
        remaining.retain(|v| !archived.iter().any(|c| c.id == v.id));

        // Shrink first: the archived write needs the space this frees.
        // Plain writes, a second quota failure here must not recurse.
        if let Err(e) = self.write_active(&remaining) {
            error!("Emergency archival could not shrink the active tier: {}", e);
            return Err(e);
        }
        if let Err(e) = self.write_archived(&archived) {
            error!("Emergency archival could not grow the archived tier: {}", e);
            if let Err(restore) = self.write_active(&original) {
                error!("Could not restore the active tier: {}", restore);
            }
            return Err(e);
        }

        warn!("Emergency archival: moved {} visits to archive", active.len());
        Ok(active.len())
    }

    fn append_archived(&self, visits: &[VisitRecord]) -> Result<()> {
        let mut archived = self.load_archived()?;
        for visit in visits {
            upsert_compressed(&mut archived, compress_with_limit(visit, self.config.summary_limit));
        }
        self.write_archived(&archived)
    }

    fn is_stale(&self, visit: &VisitRecord, now: DateTime<Utc>) -> bool {
        visit
            .days_since(now)
            .map_or(false, |days| days > f64::from(self.config.archive_threshold_days))
    }

    fn find_locked(&self, id: &str) -> Result<Option<VisitRecord>> {
        if let Some(visit) = self.load_active()?.into_iter().find(|v| v.id == id) {
            return Ok(Some(visit));
        }
        Ok(self.load_archived()?.iter().find(|v| v.id == id).map(decompress))
    }

    fn get_by_ids_locked<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<VisitRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let active = self.load_active()?;
        let archived = self.load_archived()?;

        let active_by_id: HashMap<&str, &VisitRecord> =
            active.iter().map(|v| (v.id.as_str(), v)).collect();
        let archived_by_id: HashMap<&str, &CompressedVisitRecord> =
            archived.iter().map(|v| (v.id.as_str(), v)).collect();

        Ok(ids
            .iter()
            .filter_map(|id| {
                let id = id.as_ref();
                active_by_id
                    .get(id)
                    .map(|v| (*v).clone())
                    .or_else(|| archived_by_id.get(id).map(|c| decompress(c)))
            })
            .collect())
    }

    pub(crate) fn all_visits_locked(&self) -> Result<Vec<VisitRecord>> {
        let mut visits = self.load_active()?;
        visits.extend(self.load_archived()?.iter().map(decompress));
        Ok(visits)
    }

    fn stats_locked(&self) -> Result<StorageStats> {
        let active = self.load_active()?;
        let archived = self.load_archived()?;
        let active_size = serde_json::to_string(&active)?.len();
        let archived_size = serde_json::to_string(&archived)?.len();

        let compression_ratio = if archived.is_empty() {
            0.0
        } else {
            archived_size as f64 / (archived.len() as f64 * ASSUMED_RECORD_BYTES)
        };

        Ok(StorageStats {
            active_visits: active.len(),
            archived_visits: archived.len(),
            total_visits: active.len() + archived.len(),
            active_size,
            archived_size,
            total_size: active_size + archived_size,
            compression_ratio,
        })
    }

    fn reindex(&self, visit: &VisitRecord) -> Result<()> {
        let mut metadata = self.load_metadata()?;
        // Drop stale status/date buckets before inserting the current ones
        metadata.indexes.remove(&visit.id);
        metadata.indexes.update(visit);
        self.write_metadata(&metadata)
    }

    fn unindex(&self, id: &str) -> Result<()> {
        let mut metadata = self.load_metadata()?;
        metadata.indexes.remove(id);
        self.write_metadata(&metadata)
    }

    pub(crate) fn rebuild_indexes_locked(&self) -> Result<usize> {
        let visits = self.all_visits_locked()?;
        let mut metadata = self.load_metadata()?;
        metadata.indexes.rebuild(&visits);
        self.write_metadata(&metadata)?;
        info!("Indexes rebuilt for {} visits", visits.len());
        Ok(visits.len())
    }

    fn prune_indexes_locked(&self) -> Result<usize> {
        let mut metadata = self.load_metadata()?;
        let dropped = metadata.indexes.prune();
        self.write_metadata(&metadata)?;
        Ok(dropped)
    }

    // --- RAW COLLECTIONS ---

    pub(crate) fn load_active(&self) -> Result<Vec<VisitRecord>> {
        Ok(self.load_json(KEY_VISITS_ACTIVE)?.unwrap_or_default())
    }

    pub(crate) fn load_archived(&self) -> Result<Vec<CompressedVisitRecord>> {
        Ok(self.load_json(KEY_VISITS_ARCHIVED)?.unwrap_or_default())
    }

    pub(crate) fn load_metadata(&self) -> Result<Metadata> {
        Ok(self.load_json(KEY_METADATA)?.unwrap_or_default())
    }

    fn write_active(&self, visits: &[VisitRecord]) -> Result<()> {
        self.write_json(KEY_VISITS_ACTIVE, &visits)
    }

    fn write_archived(&self, visits: &[CompressedVisitRecord]) -> Result<()> {
        self.write_json(KEY_VISITS_ARCHIVED, &visits)
    }

    pub(crate) fn write_metadata(&self, metadata: &Metadata) -> Result<()> {
        self.write_json(KEY_METADATA, metadata)
    }

    /// Unparsable values are logged and read as absent.
    fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        load_json(self.store.as_ref(), key)
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw)?;
        debug!(key, bytes = raw.len(), "stored");
        Ok(())
    }
}

/// Reads and parses a JSON value. Parse failures are logged and treated as a
/// missing key; storage failures propagate.
pub(crate) fn load_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            error!("Error loading '{}': {}", key, e);
            Ok(None)
        }
    }
}

fn upsert_compressed(archived: &mut Vec<CompressedVisitRecord>, compressed: CompressedVisitRecord) {
    match archived.iter().position(|v| v.id == compressed.id) {
        Some(pos) => archived[pos] = compressed,
        None => archived.push(compressed),
    }
}

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `visit_<unix millis>_<9 random base-36 chars>`
pub fn generate_visit_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("visit_{}_{}", now.timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::{Duration, NaiveDate};

    fn open_db(config: TierConfig) -> VisitDb {
        VisitDb::open(Arc::new(MemoryStore::new()), config).unwrap()
    }

    fn days_ago(days: i64) -> NaiveDate {
        (Utc::now() - Duration::days(days)).date_naive()
    }

    fn visit(id: &str, age_days: i64) -> VisitRecord {
        VisitRecord {
            id: id.into(),
            date: Some(days_ago(age_days)),
            hotel_id: Some("hotel_001".into()),
            status: Some(VisitStatus::Completed),
            ..Default::default()
        }
    }

    #[test]
    fn test_generated_id_shape() {
        let id = generate_visit_id(Utc::now());
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "visit");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
    }

    #[test]
    fn test_save_assigns_id_and_timestamps() {
        let db = open_db(TierConfig::default());
        let id = db.save(VisitRecord { date: Some(days_ago(1)), ..Default::default() }).unwrap();

        let stored = db.get_by_id(&id).unwrap().unwrap();
        assert!(id.starts_with("visit_"));
        assert!(stored.created_at.is_some());
        assert!(stored.updated_at.is_some());
        assert!(!stored.archived);
    }

    #[test]
    fn test_tier_placement_by_age() {
        let db = open_db(TierConfig::default());
        db.save(visit("recent", 10)).unwrap();
        db.save(visit("old", 200)).unwrap();

        assert_eq!(db.active_visits().unwrap().len(), 1);
        assert_eq!(db.archived_visits().unwrap().len(), 1);
        assert!(db.get_by_id("old").unwrap().unwrap().archived);
    }

    #[test]
    fn test_resave_moves_between_tiers() {
        let db = open_db(TierConfig::default());
        db.save(visit("v1", 200)).unwrap();

        // Rescheduled to a recent date: must leave the archive
        db.save(visit("v1", 5)).unwrap();
        assert_eq!(db.active_visits().unwrap().len(), 1);
        assert!(db.archived_visits().unwrap().is_empty());

        db.save(visit("v1", 300)).unwrap();
        assert!(db.active_visits().unwrap().is_empty());
        assert_eq!(db.archived_visits().unwrap().len(), 1);
    }

    #[test]
    fn test_capacity_sweep_only_moves_stale() {
        let config = TierConfig { max_active: 2, ..Default::default() };
        let db = open_db(config);
        for (i, age) in [1, 2, 3].iter().enumerate() {
            db.save(visit(&format!("v{}", i), *age)).unwrap();
        }
        // Over capacity but nothing is old enough to archive
        assert_eq!(db.active_visits().unwrap().len(), 3);
        assert!(db.archived_visits().unwrap().is_empty());
    }

    #[test]
    fn test_update_status_moves_status_bucket() {
        let db = open_db(TierConfig::default());
        let mut v = visit("v1", 3);
        v.status = Some(VisitStatus::Scheduled);
        db.save(v).unwrap();

        assert!(db.update_status("v1", VisitStatus::Completed).unwrap());
        assert!(!db.update_status("missing", VisitStatus::Completed).unwrap());

        assert!(db.visits_by_status(VisitStatus::Scheduled).unwrap().is_empty());
        assert_eq!(db.visits_by_status(VisitStatus::Completed).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_purges_indexes() {
        let db = open_db(TierConfig::default());
        db.save(visit("a", 3)).unwrap();
        db.save(visit("b", 250)).unwrap();

        assert!(db.delete("a").unwrap());
        assert!(db.delete("b").unwrap());
        assert!(!db.delete("b").unwrap());

        let metadata = db.metadata().unwrap();
        assert_eq!(metadata.indexes.bucket_count(), 0);
        assert!(db.visits_by_hotel("hotel_001").unwrap().is_empty());
    }

    #[test]
    fn test_stats_estimate() {
        let db = open_db(TierConfig::default());
        assert_eq!(db.stats().unwrap().compression_ratio, 0.0);

        db.save(visit("old", 400)).unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.total_visits, 1);
        assert_eq!(stats.active_size, 2); // "[]"
        let expected = stats.archived_size as f64 / 500.0;
        assert!((stats.compression_ratio - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn test_corrupt_collection_reads_as_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(KEY_VISITS_ACTIVE, "{not json").unwrap();
        let db = VisitDb::open(store, TierConfig::default()).unwrap();

        assert!(db.active_visits().unwrap().is_empty());
        db.save(visit("v1", 1)).unwrap();
        assert_eq!(db.active_visits().unwrap().len(), 1);
    }
}
