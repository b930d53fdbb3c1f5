use std::path::PathBuf;

use crate::state::Stage;

/// How one attempt at one entity ended. Failures are data here, not
/// errors: only infrastructure problems (a dead browser session) escape
/// the pipeline as `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Notes were found and at least one artifact landed in the archive.
    Completed {
        total_items: u64,
        files: Vec<PathBuf>,
    },
    /// The query ran cleanly and returned zero notes. Not an error.
    NoItems,
    /// The bulk download did not produce artifacts. The attempt is over;
    /// the entity is not rolled back to an earlier stage.
    DownloadFailed { total_items: u64, reason: String },
    /// A stage failed and the entity was moved back to an earlier stage
    /// for a future attempt.
    RolledBack { to_stage: Stage, reason: String },
}

impl PipelineOutcome {
    /// DONE-with-items and DONE-without-items both count as success.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            PipelineOutcome::Completed { .. } | PipelineOutcome::NoItems
        )
    }
}
