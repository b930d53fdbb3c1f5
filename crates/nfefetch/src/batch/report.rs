use crate::retry::RetryStats;
use crate::state::{EntityStatus, StateStore};

/// Bounded length of the per-bucket name samples.
pub const SAMPLE_LIMIT: usize = 5;

/// Final batch summary. Counts cover the whole store; the name lists are
/// bounded samples in registry order.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub total: usize,
    pub done: usize,
    pub failed: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub purged_checkpoints: usize,
    pub done_sample: Vec<String>,
    pub failed_sample: Vec<String>,
    pub pending_sample: Vec<String>,
    pub retry: RetryStats,
}

impl BatchReport {
    pub fn from_store(store: &StateStore, retry: RetryStats, purged_checkpoints: usize) -> Self {
        let counts = store.counts();

        let mut records: Vec<_> = store.records().collect();
        records.sort_by_key(|r| r.seq);

        let sample = |status: EntityStatus| -> Vec<String> {
            records
                .iter()
                .filter(|r| r.status == status)
                .take(SAMPLE_LIMIT)
                .map(|r| r.display_name.clone())
                .collect()
        };

        Self {
            total: store.len(),
            done: counts.done,
            failed: counts.failed,
            pending: counts.pending,
            in_progress: counts.in_progress,
            purged_checkpoints,
            done_sample: sample(EntityStatus::Done),
            failed_sample: sample(EntityStatus::Failed),
            pending_sample: sample(EntityStatus::Pending),
            retry,
        }
    }

    pub fn progress(&self) -> String {
        format!("{}/{}", self.done, self.total)
    }
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Batch progress: {}", self.progress())?;
        writeln!(
            f,
            "  done: {}  failed: {}  pending: {}  in progress: {}",
            self.done, self.failed, self.pending, self.in_progress
        )?;
        if !self.done_sample.is_empty() {
            writeln!(f, "  completed: {}", self.done_sample.join(", "))?;
        }
        if !self.failed_sample.is_empty() {
            writeln!(f, "  failed: {}", self.failed_sample.join(", "))?;
        }
        if !self.pending_sample.is_empty() {
            writeln!(f, "  pending: {}", self.pending_sample.join(", "))?;
        }
        writeln!(
            f,
            "  retries: {} operation(s), {} needed retry, {} attempt(s) total",
            self.retry.total_operations, self.retry.operations_with_retry, self.retry.total_attempts
        )?;
        if self.purged_checkpoints > 0 {
            writeln!(f, "  purged checkpoints: {}", self.purged_checkpoints)?;
        }
        Ok(())
    }
}
