//! Top-level batch loop: load, validate, resume, process, report.
//!
//! Strictly sequential by design — one browser session processes one
//! entity at a time. Per-entity failures become state transitions and the
//! batch moves on; only infrastructure failures (dead session, unwritable
//! state file) abort the run. The final state save happens on every exit
//! path, so a crash mid-batch never loses more than the work since the
//! last checkpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Duration;
use log::error;
use tracing::{debug, info, info_span, warn};

use crate::browser::BrowserSession;
use crate::captcha::CaptchaResolver;
use crate::error::{NfefetchError, Result};
use crate::pipeline::{PipelineOutcome, StagePipeline};
use crate::registry::CompanyRegistry;
use crate::state::StateStore;
use crate::validator;

/// How many rejected registrations are named in the log.
const REJECTION_LOG_LIMIT: usize = 5;

pub struct BatchCoordinator<B: BrowserSession, C: CaptchaResolver> {
    store: StateStore,
    pipeline: StagePipeline<B, C>,
    registry: CompanyRegistry,
    staleness_window: Duration,
    retention_days: i64,
    cancel: Arc<AtomicBool>,
}

impl<B: BrowserSession, C: CaptchaResolver> BatchCoordinator<B, C> {
    pub fn new(
        store: StateStore,
        pipeline: StagePipeline<B, C>,
        registry: CompanyRegistry,
        staleness_window: Duration,
        retention_days: i64,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            store,
            pipeline,
            registry,
            staleness_window,
            retention_days,
            cancel,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn pipeline(&self) -> &StagePipeline<B, C> {
        &self.pipeline
    }

    /// Runs the whole batch. The final `save()` is guaranteed even when
    /// the run aborts or is cancelled.
    pub fn run(&mut self) -> Result<super::report::BatchReport> {
        let result = self.run_inner();

        if let Err(e) = self.store.save() {
            error!("Final state save failed: {}", e);
            if result.is_ok() {
                return Err(NfefetchError::Store(e));
            }
        }

        result
    }

    fn run_inner(&mut self) -> Result<super::report::BatchReport> {
        let span = info_span!("batch");
        let _span = span.entered();

        // 1-2. Load the registry, validate, register newcomers as PENDING.
        let rows = self.registry.load();
        let mut entities = Vec::new();
        let mut rejected = 0usize;
        for row in &rows {
            match validator::validate(&row.raw_id) {
                Ok(id) => entities.push((id, row.name.clone())),
                Err(reason) => {
                    rejected += 1;
                    if rejected <= REJECTION_LOG_LIMIT {
                        warn!("Skipping '{}' ({}): {}", row.raw_id, row.name, reason);
                    }
                }
            }
        }
        if rejected > REJECTION_LOG_LIMIT {
            warn!(
                "... and {} more invalid registrations",
                rejected - REJECTION_LOG_LIMIT
            );
        }
        self.store.add_entities(&entities);
        info!(
            "Batch starts with {} entities ({} new from registry, {} rejected)",
            self.store.len(),
            entities.len(),
            rejected
        );

        self.pipeline.open_query_page()?;

        // 3. Interrupted sessions: stale ones re-enter the normal flow from
        // scratch; fresh ones resume at their checkpointed stage first.
        let released = self.store.release_stale(self.staleness_window);
        if released > 0 {
            info!("Released {} stale interrupted session(s)", released);
        }

        let interrupted = self.store.recover_interrupted(self.staleness_window);
        for record in interrupted {
            if self.cancelled() {
                break;
            }
            info!(
                "Resuming interrupted session for '{}' at stage {}",
                record.id, record.current_stage
            );
            self.store.mark_in_progress(&record.id);
            let outcome = self.pipeline.resume(&mut self.store, &record)?;
            self.apply_outcome(&record.id, outcome);
        }

        // 4-5. First pass over untouched entities, then the retry pass.
        while !self.cancelled() {
            let next = match self.store.get_next_pending() {
                Some(record) => record,
                None => break,
            };
            self.store.mark_in_progress(&next.id);
            let outcome = self.pipeline.process(&mut self.store, &next.id)?;
            self.apply_outcome(&next.id, outcome);
        }
        if self.cancelled() {
            warn!("Cancellation requested, stopping batch");
        }

        // 6. Retention sweep.
        let purged = self.store.purge_old_checkpoints(self.retention_days);

        let advisor = self.pipeline.advisor().report();
        debug!(
            "Server health at batch end: {:?} (factor {:.2})",
            advisor.health, advisor.adaptation_factor
        );

        // 7. Final report.
        Ok(super::report::BatchReport::from_store(
            &self.store,
            self.pipeline.retry_stats(),
            purged,
        ))
    }

    fn apply_outcome(&mut self, id: &str, outcome: PipelineOutcome) {
        match outcome {
            PipelineOutcome::Completed { total_items, files } => {
                info!(
                    "'{}' done: {} note(s), {} file(s) archived",
                    id,
                    total_items,
                    files.len()
                );
                self.store.mark_done(id);
            }
            PipelineOutcome::NoItems => {
                info!("'{}' done: no notes in the period", id);
                self.store.mark_done(id);
            }
            PipelineOutcome::DownloadFailed { reason, .. } => {
                warn!("'{}' failed: {}", id, reason);
                self.store.mark_failed(id, &reason);
            }
            // The rollback already moved the record; nothing to mark here.
            PipelineOutcome::RolledBack { .. } => {}
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}
