//! Adaptive timeouts from observed portal latency.
//!
//! Memory-only by design: the advisor re-learns server behavior every run
//! and always starts from NORMAL / factor 1.0.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::Timelike;
use log::debug;

/// Samples kept per category.
const WINDOW_SIZE: usize = 10;
/// Trailing window for the absolute-failure UNSTABLE trigger.
const FAILURE_WINDOW: Duration = Duration::from_secs(120);
/// Failures inside `FAILURE_WINDOW` that force UNSTABLE on their own.
const FAILURE_BURST: usize = 3;

const MIN_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_TIMEOUT: Duration = Duration::from_secs(90);
const MIN_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(10);
const MAX_BACKOFF: u32 = 8;

/// Operation categories with distinct base timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCategory {
    PageLoad,
    ElementWait,
    ActionDelay,
    LoginWait,
    PopupWait,
    QueryWait,
}

impl OpCategory {
    pub const ALL: [OpCategory; 6] = [
        OpCategory::PageLoad,
        OpCategory::ElementWait,
        OpCategory::ActionDelay,
        OpCategory::LoginWait,
        OpCategory::PopupWait,
        OpCategory::QueryWait,
    ];

    pub fn base(self) -> Duration {
        match self {
            OpCategory::PageLoad => Duration::from_secs(10),
            OpCategory::ElementWait => Duration::from_secs(15),
            OpCategory::ActionDelay => Duration::from_secs(2),
            OpCategory::LoginWait => Duration::from_secs(5),
            OpCategory::PopupWait => Duration::from_secs(10),
            OpCategory::QueryWait => Duration::from_secs(8),
        }
    }
}

impl std::fmt::Display for OpCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OpCategory::PageLoad => "page_load",
            OpCategory::ElementWait => "element_wait",
            OpCategory::ActionDelay => "action_delay",
            OpCategory::LoginWait => "login_wait",
            OpCategory::PopupWait => "popup_wait",
            OpCategory::QueryWait => "query_wait",
        };
        write!(f, "{}", name)
    }
}

/// Perceived portal health, derived from the sample windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerHealth {
    Optimal,
    Normal,
    Slow,
    Unstable,
}

impl ServerHealth {
    fn factor(self) -> f64 {
        match self {
            ServerHealth::Optimal => 0.7,
            ServerHealth::Normal => 1.0,
            ServerHealth::Slow => 1.5,
            ServerHealth::Unstable => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    duration: Duration,
    success: bool,
    at: Instant,
}

/// Performance snapshot for reporting.
#[derive(Debug, Clone)]
pub struct AdvisorReport {
    pub health: ServerHealth,
    pub adaptation_factor: f64,
    pub effective_timeouts: Vec<(OpCategory, Duration)>,
    pub sample_counts: Vec<(OpCategory, usize)>,
}

pub struct TimeoutAdvisor {
    windows: HashMap<OpCategory, VecDeque<Sample>>,
    health: ServerHealth,
    hour_source: fn() -> u32,
}

fn current_local_hour() -> u32 {
    chrono::Local::now().hour()
}

impl TimeoutAdvisor {
    pub fn new() -> Self {
        Self {
            windows: HashMap::new(),
            health: ServerHealth::Normal,
            hour_source: current_local_hour,
        }
    }

    /// Test hook: replaces the wall-clock hour used for the time-of-day
    /// factor.
    pub fn with_hour_source(hour_source: fn() -> u32) -> Self {
        Self {
            windows: HashMap::new(),
            health: ServerHealth::Normal,
            hour_source,
        }
    }

    /// Appends an observation to the category's rolling window (oldest
    /// evicted) and reclassifies health.
    pub fn record(&mut self, category: OpCategory, duration: Duration, success: bool) {
        let window = self.windows.entry(category).or_default();
        if window.len() >= WINDOW_SIZE {
            window.pop_front();
        }
        window.push_back(Sample {
            duration,
            success,
            at: Instant::now(),
        });

        self.reclassify();
    }

    fn reclassify(&mut self) {
        let samples: Vec<Sample> = self.windows.values().flatten().copied().collect();
        if samples.is_empty() {
            self.health = ServerHealth::Normal;
            return;
        }

        let failures = samples.iter().filter(|s| !s.success).count();
        let error_rate = failures as f64 / samples.len() as f64;

        let now = Instant::now();
        let recent_failures = samples
            .iter()
            .filter(|s| !s.success && now.duration_since(s.at) <= FAILURE_WINDOW)
            .count();

        let total: Duration = samples.iter().map(|s| s.duration).sum();
        let mean = total / samples.len() as u32;

        let health = if error_rate > 0.3 || recent_failures >= FAILURE_BURST {
            ServerHealth::Unstable
        } else if mean > Duration::from_secs(8) {
            ServerHealth::Slow
        } else if mean < Duration::from_secs(3) {
            ServerHealth::Optimal
        } else {
            ServerHealth::Normal
        };

        if health != self.health {
            debug!(
                "Server health {:?} -> {:?} (error rate {:.2}, mean {:?})",
                self.health, health, error_rate, mean
            );
            self.health = health;
        }
    }

    pub fn health(&self) -> ServerHealth {
        self.health
    }

    /// Health factor times time-of-day factor.
    pub fn adaptation_factor(&self) -> f64 {
        self.health.factor() * time_of_day_factor((self.hour_source)())
    }

    /// Adaptive timeout: `base * factor * backoff(attempt)`, clamped.
    pub fn get_timeout(&self, category: OpCategory, attempt: u32) -> Duration {
        let scaled = category.base().mul_f64(self.adaptation_factor() * backoff(attempt));
        scaled.clamp(MIN_TIMEOUT, MAX_TIMEOUT)
    }

    /// Adaptive inter-action delay, clamped to a narrow range so a sick
    /// server can never produce a degenerate-long pause.
    pub fn get_delay(&self, category: OpCategory) -> Duration {
        let scaled = category.base().mul_f64(self.adaptation_factor());
        scaled.clamp(MIN_DELAY, MAX_DELAY)
    }

    pub fn report(&self) -> AdvisorReport {
        AdvisorReport {
            health: self.health,
            adaptation_factor: self.adaptation_factor(),
            effective_timeouts: OpCategory::ALL
                .iter()
                .map(|&c| (c, self.get_timeout(c, 1)))
                .collect(),
            sample_counts: OpCategory::ALL
                .iter()
                .map(|&c| (c, self.windows.get(&c).map(|w| w.len()).unwrap_or(0)))
                .collect(),
        }
    }
}

impl Default for TimeoutAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

/// Exponential per-attempt multiplier, capped.
fn backoff(attempt: u32) -> f64 {
    let exp = 2u32.saturating_pow(attempt.saturating_sub(1));
    exp.min(MAX_BACKOFF) as f64
}

/// Peak business hours stretch timeouts; quiet hours shrink them.
fn time_of_day_factor(hour: u32) -> f64 {
    match hour {
        9..=11 | 14..=16 => 1.2,
        0..=6 | 20..=23 => 0.8,
        _ => 1.0,
    }
}
