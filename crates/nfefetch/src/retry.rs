//! Bounded retries with inter-attempt delay and usage statistics.

use std::time::{Duration, Instant};

use log::{debug, error, warn};

/// Cumulative retry usage, surfaced in the final batch report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryStats {
    pub total_operations: u64,
    pub operations_with_retry: u64,
    pub total_attempts: u64,
    pub successes_after_retry: u64,
}

/// Runs units of work with bounded retries. The executor does not care why
/// an operation failed: retryability is decided by the caller-supplied
/// predicate, and an exhausted operation re-raises its last error for the
/// caller to turn into an entity failure or a batch abort.
#[derive(Debug, Default)]
pub struct RetryExecutor {
    stats: RetryStats,
}

impl RetryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run<T, E, F, P>(
        &mut self,
        label: &str,
        max_attempts: u32,
        delay: Duration,
        mut operation: F,
        is_retryable: P,
    ) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let max_attempts = max_attempts.max(1);
        self.stats.total_operations += 1;
        let started = Instant::now();

        let mut attempt = 1;
        loop {
            self.stats.total_attempts += 1;
            debug!("{} - attempt {}/{}", label, attempt, max_attempts);

            match operation() {
                Ok(value) => {
                    if attempt > 1 {
                        self.stats.operations_with_retry += 1;
                        self.stats.successes_after_retry += 1;
                        warn!(
                            "{} - succeeded after {} attempts ({:.1}s)",
                            label,
                            attempt,
                            started.elapsed().as_secs_f64()
                        );
                    }
                    return Ok(value);
                }
                Err(e) => {
                    if !is_retryable(&e) {
                        debug!("{} - not retryable: {}", label, e);
                        if attempt > 1 {
                            self.stats.operations_with_retry += 1;
                        }
                        return Err(e);
                    }
                    if attempt >= max_attempts {
                        error!(
                            "{} - failed after {} attempts ({:.1}s): {}",
                            label,
                            attempt,
                            started.elapsed().as_secs_f64(),
                            e
                        );
                        self.stats.operations_with_retry += 1;
                        return Err(e);
                    }
                    warn!(
                        "{} - attempt {} failed, retrying in {:?}: {}",
                        label, attempt, delay, e
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }

    pub fn stats(&self) -> RetryStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = RetryStats::default();
    }
}
