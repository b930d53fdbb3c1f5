//! Durable per-company processing state with checkpoint/resume.
//!
//! The store is a JSON snapshot keyed by canonical registration number.
//! Every mutation is persisted immediately: the store exists to survive a
//! crash, so there are no batched or delayed writes. Saves go through a
//! temp file plus rename so a crash mid-write leaves the previous snapshot
//! intact.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use log::{error, info, warn};

use crate::error::StoreError;
use crate::state::record::{EntityRecord, EntityStatus, Stage};

/// Counts per status bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub done: usize,
    pub failed: usize,
}

/// Attempt-timestamp summary over the whole store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeStats {
    pub first_attempt_at: DateTime<Utc>,
    pub last_attempt_at: DateTime<Utc>,
    pub total_entities: usize,
    pub touched_entities: usize,
}

pub struct StateStore {
    path: PathBuf,
    max_attempts: u32,
    records: HashMap<String, EntityRecord>,
}

impl StateStore {
    /// Opens the store at `path`, loading any prior snapshot. A missing or
    /// corrupt file is treated as "start fresh" and never fails.
    pub fn open<P: AsRef<Path>>(path: P, max_attempts: u32) -> Self {
        let path = path.as_ref().to_path_buf();
        let records = Self::load_snapshot(&path);
        Self {
            path,
            max_attempts,
            records,
        }
    }

    fn load_snapshot(path: &Path) -> HashMap<String, EntityRecord> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return HashMap::new();
            }
            Err(e) => {
                warn!(
                    "Could not read state file '{}', starting fresh: {}",
                    path.display(),
                    e
                );
                return HashMap::new();
            }
        };

        match serde_json::from_str::<HashMap<String, EntityRecord>>(&content) {
            Ok(records) => {
                info!(
                    "Loaded {} records from '{}'",
                    records.len(),
                    path.display()
                );
                records
            }
            Err(e) => {
                warn!(
                    "State file '{}' is corrupt, starting fresh: {}",
                    path.display(),
                    e
                );
                HashMap::new()
            }
        }
    }

    /// Writes the full snapshot atomically: serialize to `<path>.tmp`, then
    /// rename over the target.
    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let json = serde_json::to_string_pretty(&self.records)?;

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(|e| StoreError::WriteFile {
            path: tmp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::ReplaceFile {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Saves and logs instead of propagating. Mutation paths use this so a
    /// transient write failure does not poison in-memory state; the
    /// coordinator's final `save()` still surfaces persistent failures.
    fn persist(&self) {
        if let Err(e) = self.save() {
            error!("Failed to persist state snapshot: {}", e);
        }
    }

    /// Inserts PENDING records for any id not already present. Idempotent:
    /// existing records keep their status and attempt count.
    pub fn add_entities(&mut self, entities: &[(String, String)]) {
        let mut next_seq = self
            .records
            .values()
            .map(|r| r.seq + 1)
            .max()
            .unwrap_or(0);

        let mut added = 0;
        for (id, name) in entities {
            if !self.records.contains_key(id) {
                self.records
                    .insert(id.clone(), EntityRecord::new(id, name, next_seq));
                next_seq += 1;
                added += 1;
            }
        }

        if added > 0 {
            info!("Registered {} new entities", added);
            self.persist();
        }
    }

    pub fn get(&self, id: &str) -> Option<&EntityRecord> {
        self.records.get(id)
    }

    pub fn records(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Two-phase selection: first every entity with `attempt_count == 0` in
    /// registry order, so one troublesome company cannot starve the rest of
    /// their first attempt. Only once every entity has been touched does the
    /// single retry pass run, over PENDING/FAILED records with exactly one
    /// attempt. Returns `None` when nothing qualifies.
    pub fn get_next_pending(&self) -> Option<EntityRecord> {
        if let Some(record) = self
            .records
            .values()
            .filter(|r| r.attempt_count == 0)
            .min_by_key(|r| r.seq)
        {
            return Some(record.clone());
        }

        self.records
            .values()
            .filter(|r| {
                matches!(r.status, EntityStatus::Pending | EntityStatus::Failed)
                    && r.attempt_count == 1
            })
            .min_by_key(|r| r.seq)
            .cloned()
    }

    pub fn mark_in_progress(&mut self, id: &str) -> bool {
        self.update(id, |record| {
            record.attempt_count += 1;
            record.status = EntityStatus::InProgress;
            record.last_attempt_at = Some(Utc::now());
            record.last_error = None;
        })
    }

    pub fn mark_done(&mut self, id: &str) -> bool {
        self.update(id, |record| {
            record.status = EntityStatus::Done;
            record.current_stage = Stage::Done;
            record.stage_progress_percent = Stage::Done.progress_percent();
            record.last_attempt_at = Some(Utc::now());
        })
    }

    pub fn mark_failed(&mut self, id: &str, reason: &str) -> bool {
        self.update(id, |record| {
            record.status = EntityStatus::Failed;
            record.last_error = Some(reason.to_string());
            record.last_attempt_at = Some(Utc::now());
        })
    }

    pub fn mark_pending(&mut self, id: &str, reason: &str) -> bool {
        self.update(id, |record| {
            record.status = EntityStatus::Pending;
            record.last_error = Some(reason.to_string());
            record.last_attempt_at = Some(Utc::now());
        })
    }

    /// Records stage completion. Fails gracefully (false, logged) when the
    /// id is unknown. Provided `session_data` keys are merged over the
    /// existing map.
    #[allow(clippy::too_many_arguments)]
    pub fn checkpoint(
        &mut self,
        id: &str,
        stage: Stage,
        progress_percent: u8,
        session_data: Option<HashMap<String, String>>,
        total_items: Option<u64>,
        items_processed: Option<u64>,
    ) -> bool {
        self.update(id, |record| {
            record.current_stage = stage;
            record.stage_progress_percent = progress_percent.min(100);
            record.checkpoint_at = Some(Utc::now());
            if let Some(data) = session_data {
                record.session_data.extend(data);
            }
            if let Some(total) = total_items {
                record.total_items_found = total;
            }
            if let Some(processed) = items_processed {
                record.items_processed = processed;
            }
        })
    }

    /// Moves a record strictly backward to `to_stage` with that stage's
    /// canonical progress, charging one attempt. At `max_attempts` the
    /// record becomes FAILED instead of PENDING.
    pub fn rollback(&mut self, id: &str, to_stage: Stage, reason: &str) -> bool {
        let max_attempts = self.max_attempts;
        let rolled = self.update(id, |record| {
            record.current_stage = to_stage;
            record.stage_progress_percent = to_stage.progress_percent();
            record.attempt_count += 1;
            record.status = if record.attempt_count >= max_attempts {
                EntityStatus::Failed
            } else {
                EntityStatus::Pending
            };
            record.last_error = Some(reason.to_string());
            record.checkpoint_at = Some(Utc::now());
        });
        if rolled {
            warn!("Rolled back '{}' to stage {}: {}", id, to_stage, reason);
        }
        rolled
    }

    /// Appends downloaded artifact names to a record.
    pub fn record_downloads(&mut self, id: &str, files: &[String]) -> bool {
        self.update(id, |record| {
            record.downloaded_files.extend(files.iter().cloned());
        })
    }

    /// Returns in-flight records whose checkpoint is still fresh enough to
    /// resume, oldest checkpoint first.
    pub fn recover_interrupted(&self, staleness_window: Duration) -> Vec<EntityRecord> {
        let now = Utc::now();
        let mut interrupted: Vec<EntityRecord> = self
            .records
            .values()
            .filter(|r| {
                r.status == EntityStatus::InProgress
                    && r.current_stage != Stage::Done
                    && r.checkpoint_at
                        .map(|at| now - at <= staleness_window)
                        .unwrap_or(false)
            })
            .cloned()
            .collect();
        interrupted.sort_by_key(|r| r.checkpoint_at);
        interrupted
    }

    /// Demotes IN_PROGRESS records whose checkpoint fell outside the
    /// staleness window back to PENDING, so they re-enter through the
    /// normal selection flow from scratch. Returns how many were demoted.
    pub fn release_stale(&mut self, staleness_window: Duration) -> usize {
        let now = Utc::now();
        let stale: Vec<String> = self
            .records
            .values()
            .filter(|r| {
                r.status == EntityStatus::InProgress
                    && r.checkpoint_at
                        .map(|at| now - at > staleness_window)
                        .unwrap_or(true)
            })
            .map(|r| r.id.clone())
            .collect();

        for id in &stale {
            self.mark_pending(id, "stale interrupted session");
        }
        stale.len()
    }

    /// Retention sweep: clears `session_data` and `checkpoint_at` on
    /// DONE/FAILED records older than `age_days`. Status is untouched.
    pub fn purge_old_checkpoints(&mut self, age_days: i64) -> usize {
        let cutoff = Utc::now() - Duration::days(age_days);
        let mut purged = 0;

        for record in self.records.values_mut() {
            if !record.is_finished() {
                continue;
            }
            let reference = record.checkpoint_at.or(record.last_attempt_at);
            let old = reference.map(|at| at < cutoff).unwrap_or(false);
            if old && (record.checkpoint_at.is_some() || !record.session_data.is_empty()) {
                record.session_data.clear();
                record.checkpoint_at = None;
                purged += 1;
            }
        }

        if purged > 0 {
            info!("Purged checkpoint data from {} old records", purged);
            self.persist();
        }
        purged
    }

    /// Clears all state, for non-resumable full re-runs.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.records.clear();
        self.save()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for record in self.records.values() {
            match record.status {
                EntityStatus::Pending => counts.pending += 1,
                EntityStatus::InProgress => counts.in_progress += 1,
                EntityStatus::Done => counts.done += 1,
                EntityStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Attempt-timestamp summary, `None` until something has been touched.
    pub fn time_stats(&self) -> Option<TimeStats> {
        let attempts: Vec<DateTime<Utc>> = self
            .records
            .values()
            .filter_map(|r| r.last_attempt_at)
            .collect();
        let first = *attempts.iter().min()?;
        let last = *attempts.iter().max()?;
        Some(TimeStats {
            first_attempt_at: first,
            last_attempt_at: last,
            total_entities: self.records.len(),
            touched_entities: self
                .records
                .values()
                .filter(|r| r.attempt_count > 0)
                .count(),
        })
    }

    fn update(&mut self, id: &str, mutate: impl FnOnce(&mut EntityRecord)) -> bool {
        match self.records.get_mut(id) {
            Some(record) => {
                mutate(record);
                self.persist();
                true
            }
            None => {
                warn!("State update for unknown entity '{}' ignored", id);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> StateStore {
        StateStore::open(dir.path().join("state.json"), 3)
    }

    fn sample_entities() -> Vec<(String, String)> {
        vec![
            ("111111111".to_string(), "Alpha".to_string()),
            ("222222222".to_string(), "Beta".to_string()),
            ("333333333".to_string(), "Gamma".to_string()),
        ]
    }

    // ── Loading & persistence ──

    #[test]
    fn test_open_missing_file_starts_empty() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        assert!(store.is_empty());
    }

    #[test]
    fn test_open_corrupt_file_starts_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = StateStore::open(&path, 3);
        assert!(store.is_empty());
    }

    #[test]
    fn test_state_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");

        let mut store = StateStore::open(&path, 3);
        store.add_entities(&sample_entities());
        store.mark_in_progress("111111111");
        store.checkpoint("111111111", Stage::Query, 60, None, Some(4), None);

        let reopened = StateStore::open(&path, 3);
        let record = reopened.get("111111111").unwrap();
        assert_eq!(record.status, EntityStatus::InProgress);
        assert_eq!(record.current_stage, Stage::Query);
        assert_eq!(record.stage_progress_percent, 60);
        assert_eq!(record.total_items_found, 4);
        assert_eq!(record.attempt_count, 1);
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/state.json");
        let mut store = StateStore::open(&path, 3);
        store.add_entities(&sample_entities());
        assert!(path.exists());
    }

    #[test]
    fn test_interrupted_save_keeps_old_snapshot() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");

        let mut store = StateStore::open(&path, 3);
        store.add_entities(&sample_entities());
        store.mark_done("111111111");

        // A crash mid-write leaves a dangling temp file; the real snapshot
        // must still parse to the previous state.
        std::fs::write(path.with_extension("json.tmp"), "{ partial garbage").unwrap();

        let reopened = StateStore::open(&path, 3);
        assert_eq!(reopened.len(), 3);
        assert_eq!(
            reopened.get("111111111").unwrap().status,
            EntityStatus::Done
        );
    }

    // ── add_entities ──

    #[test]
    fn test_add_entities_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        store.add_entities(&sample_entities());
        store.mark_in_progress("111111111");
        store.mark_done("111111111");

        store.add_entities(&sample_entities());

        let record = store.get("111111111").unwrap();
        assert_eq!(record.status, EntityStatus::Done);
        assert_eq!(record.attempt_count, 1);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_add_entities_assigns_sequential_order() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        store.add_entities(&sample_entities());
        assert_eq!(store.get("111111111").unwrap().seq, 0);
        assert_eq!(store.get("222222222").unwrap().seq, 1);
        assert_eq!(store.get("333333333").unwrap().seq, 2);

        store.add_entities(&[("444444444".to_string(), "Delta".to_string())]);
        assert_eq!(store.get("444444444").unwrap().seq, 3);
    }

    // ── Two-phase selection ──

    #[test]
    fn test_get_next_pending_registry_order_first_pass() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        store.add_entities(&sample_entities());

        assert_eq!(store.get_next_pending().unwrap().id, "111111111");
        store.mark_in_progress("111111111");

        assert_eq!(store.get_next_pending().unwrap().id, "222222222");
        store.mark_in_progress("222222222");

        assert_eq!(store.get_next_pending().unwrap().id, "333333333");
    }

    #[test]
    fn test_get_next_pending_retry_pass_after_full_first_pass() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        store.add_entities(&sample_entities());

        // First pass touches everything; Beta fails.
        store.mark_in_progress("111111111");
        store.mark_done("111111111");
        store.mark_in_progress("222222222");
        store.mark_failed("222222222", "download failed");
        store.mark_in_progress("333333333");
        store.mark_done("333333333");

        // Retry pass only serves the single-attempt failure.
        let next = store.get_next_pending().unwrap();
        assert_eq!(next.id, "222222222");

        store.mark_in_progress("222222222");
        store.mark_failed("222222222", "download failed again");

        // attempt_count is now 2: nothing qualifies.
        assert!(store.get_next_pending().is_none());
    }

    #[test]
    fn test_first_pass_blocks_retry_pass() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        store.add_entities(&sample_entities());

        store.mark_in_progress("111111111");
        store.mark_failed("111111111", "boom");

        // Beta and Gamma are still untouched, so the failed Alpha must wait.
        assert_eq!(store.get_next_pending().unwrap().id, "222222222");
    }

    // ── Checkpoint & rollback ──

    #[test]
    fn test_checkpoint_progress_non_decreasing() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        store.add_entities(&sample_entities());
        store.mark_in_progress("111111111");

        let stages = [Stage::Form, Stage::Captcha, Stage::Query, Stage::Validate];
        let mut last = 0;
        for stage in stages {
            store.checkpoint("111111111", stage, stage.progress_percent(), None, None, None);
            let percent = store.get("111111111").unwrap().stage_progress_percent;
            assert!(percent >= last);
            last = percent;
        }
    }

    #[test]
    fn test_checkpoint_unknown_id_returns_false() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        assert!(!store.checkpoint("nope", Stage::Form, 20, None, None, None));
    }

    #[test]
    fn test_checkpoint_merges_session_data() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        store.add_entities(&sample_entities());

        let mut data = HashMap::new();
        data.insert("last_url".to_string(), "https://a".to_string());
        store.checkpoint("111111111", Stage::Form, 20, Some(data), None, None);

        let mut data = HashMap::new();
        data.insert("note".to_string(), "x".to_string());
        store.checkpoint("111111111", Stage::Captcha, 40, Some(data), None, None);

        let record = store.get("111111111").unwrap();
        assert_eq!(record.session_data.len(), 2);
        assert_eq!(record.session_data.get("last_url").unwrap(), "https://a");
    }

    #[test]
    fn test_rollback_decreases_progress_and_counts_attempt() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        store.add_entities(&sample_entities());
        store.mark_in_progress("111111111");
        store.checkpoint("111111111", Stage::Query, 60, None, None, None);

        assert!(store.rollback("111111111", Stage::Captcha, "query failure"));

        let record = store.get("111111111").unwrap();
        assert_eq!(record.current_stage, Stage::Captcha);
        assert_eq!(record.stage_progress_percent, 40);
        assert_eq!(record.attempt_count, 2);
        assert_eq!(record.status, EntityStatus::Pending);
        assert_eq!(record.last_error.as_deref(), Some("query failure"));
    }

    #[test]
    fn test_third_rollback_marks_failed() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        store.add_entities(&sample_entities());

        store.rollback("111111111", Stage::Start, "first");
        assert_eq!(
            store.get("111111111").unwrap().status,
            EntityStatus::Pending
        );
        store.rollback("111111111", Stage::Start, "second");
        assert_eq!(
            store.get("111111111").unwrap().status,
            EntityStatus::Pending
        );
        store.rollback("111111111", Stage::Start, "third");

        let record = store.get("111111111").unwrap();
        assert_eq!(record.status, EntityStatus::Failed);
        assert_eq!(record.attempt_count, 3);
    }

    // ── Interrupted-session recovery ──

    #[test]
    fn test_recover_interrupted_within_window() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        store.add_entities(&sample_entities());
        store.mark_in_progress("333333333");
        store.checkpoint("333333333", Stage::Query, 60, None, None, None);

        let interrupted = store.recover_interrupted(Duration::minutes(30));
        assert_eq!(interrupted.len(), 1);
        assert_eq!(interrupted[0].id, "333333333");
        assert_eq!(interrupted[0].current_stage, Stage::Query);
    }

    #[test]
    fn test_recover_interrupted_ignores_stale_checkpoint() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        store.add_entities(&sample_entities());
        store.mark_in_progress("333333333");
        store.checkpoint("333333333", Stage::Query, 60, None, None, None);

        // Age the checkpoint past the window.
        store
            .records
            .get_mut("333333333")
            .unwrap()
            .checkpoint_at = Some(Utc::now() - Duration::hours(2));

        assert!(store.recover_interrupted(Duration::minutes(30)).is_empty());
    }

    #[test]
    fn test_release_stale_demotes_to_pending() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        store.add_entities(&sample_entities());
        store.mark_in_progress("222222222");
        store.checkpoint("222222222", Stage::Form, 20, None, None, None);
        store
            .records
            .get_mut("222222222")
            .unwrap()
            .checkpoint_at = Some(Utc::now() - Duration::hours(2));

        assert_eq!(store.release_stale(Duration::minutes(30)), 1);
        assert_eq!(
            store.get("222222222").unwrap().status,
            EntityStatus::Pending
        );
    }

    #[test]
    fn test_recover_interrupted_excludes_finished() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        store.add_entities(&sample_entities());
        store.mark_in_progress("111111111");
        store.mark_done("111111111");

        assert!(store.recover_interrupted(Duration::minutes(30)).is_empty());
    }

    // ── Retention & reset ──

    #[test]
    fn test_purge_old_checkpoints() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        store.add_entities(&sample_entities());

        store.mark_in_progress("111111111");
        let mut data = HashMap::new();
        data.insert("last_url".to_string(), "https://a".to_string());
        store.checkpoint("111111111", Stage::Done, 100, Some(data), None, None);
        store.mark_done("111111111");

        // Age the record past retention.
        {
            let record = store.records.get_mut("111111111").unwrap();
            record.checkpoint_at = Some(Utc::now() - Duration::days(10));
            record.last_attempt_at = Some(Utc::now() - Duration::days(10));
        }

        assert_eq!(store.purge_old_checkpoints(7), 1);

        let record = store.get("111111111").unwrap();
        assert_eq!(record.status, EntityStatus::Done);
        assert!(record.checkpoint_at.is_none());
        assert!(record.session_data.is_empty());
    }

    #[test]
    fn test_purge_skips_recent_and_unfinished() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        store.add_entities(&sample_entities());

        store.mark_in_progress("111111111");
        store.checkpoint("111111111", Stage::Query, 60, None, None, None);
        store.mark_in_progress("222222222");
        store.checkpoint("222222222", Stage::Done, 100, None, None, None);
        store.mark_done("222222222");

        // In-progress record is never purged; the finished one is recent.
        assert_eq!(store.purge_old_checkpoints(7), 0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        store.add_entities(&sample_entities());
        store.reset().unwrap();
        assert!(store.is_empty());

        let reopened = StateStore::open(tmp.path().join("state.json"), 3);
        assert!(reopened.is_empty());
    }

    // ── Counts & stats ──

    #[test]
    fn test_counts() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        store.add_entities(&sample_entities());
        store.mark_in_progress("111111111");
        store.mark_done("111111111");
        store.mark_in_progress("222222222");

        let counts = store.counts();
        assert_eq!(counts.done, 1);
        assert_eq!(counts.in_progress, 1);
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.failed, 0);
    }

    #[test]
    fn test_time_stats() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        store.add_entities(&sample_entities());
        assert!(store.time_stats().is_none());

        store.mark_in_progress("111111111");
        let stats = store.time_stats().unwrap();
        assert_eq!(stats.total_entities, 3);
        assert_eq!(stats.touched_entities, 1);
        assert_eq!(stats.first_attempt_at, stats.last_attempt_at);
    }

    #[test]
    fn test_record_downloads_appends() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        store.add_entities(&sample_entities());

        store.record_downloads("111111111", &["a.xml".to_string()]);
        store.record_downloads("111111111", &["b.xml".to_string()]);

        let record = store.get("111111111").unwrap();
        assert_eq!(record.downloaded_files, vec!["a.xml", "b.xml"]);
    }
}
