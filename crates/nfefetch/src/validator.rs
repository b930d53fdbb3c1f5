//! Validation and normalization of state tax registration numbers (IEs).

use log::{debug, info, warn};
use thiserror::Error;

/// Registry cells that mean "this company has no state registration".
/// Checked before normalization, case-insensitively.
const NO_REGISTRATION_MARKERS: &[&str] =
    &["NÃO TEM", "NAO TEM", "N TEM", "SEM IE", "NONE", "N/A", "NA"];

const MIN_DIGITS: usize = 8;
const MAX_DIGITS: usize = 14;

/// How many rejection samples `filter_valid` surfaces in the log.
const REJECTION_SAMPLE_LIMIT: usize = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("registry marks the company as having no registration ('{0}')")]
    NoRegistration(String),

    #[error("expected {MIN_DIGITS} to {MAX_DIGITS} digits, got {0}")]
    BadLength(usize),

    #[error("registration is a sequence of zeros")]
    AllZeros,
}

/// Normalizes a raw registration number into its canonical digit string.
///
/// Strips every non-digit character, then rejects known "no registration"
/// sentinels, out-of-range lengths and all-zero sequences. The canonical
/// form is idempotent: validating a canonical ID returns it unchanged.
pub fn validate(raw: &str) -> Result<String, RejectionReason> {
    let trimmed = raw.trim();
    let upper = trimmed.to_uppercase();
    if NO_REGISTRATION_MARKERS.contains(&upper.as_str()) {
        return Err(RejectionReason::NoRegistration(trimmed.to_string()));
    }

    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() < MIN_DIGITS || digits.len() > MAX_DIGITS {
        return Err(RejectionReason::BadLength(digits.len()));
    }

    if digits.bytes().all(|b| b == b'0') {
        return Err(RejectionReason::AllZeros);
    }

    Ok(digits)
}

/// Splits a batch of raw registrations into canonical IDs and rejections.
///
/// Valid entries keep their input order. A bad entry never fails the
/// batch; the rejection count and a bounded sample are logged.
pub fn filter_valid<I, S>(raws: I) -> (Vec<String>, Vec<(String, RejectionReason)>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut valid = Vec::new();
    let mut rejected = Vec::new();

    for raw in raws {
        let raw = raw.as_ref();
        match validate(raw) {
            Ok(id) => valid.push(id),
            Err(reason) => rejected.push((raw.to_string(), reason)),
        }
    }

    if !rejected.is_empty() {
        warn!("Dropped {} invalid registrations", rejected.len());
        for (raw, reason) in rejected.iter().take(REJECTION_SAMPLE_LIMIT) {
            debug!("Invalid registration '{}': {}", raw, reason);
        }
    }
    info!("{} valid registrations", valid.len());

    (valid, rejected)
}

/// Detailed validation summary for a batch of raw registrations.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub total: usize,
    pub valid: Vec<String>,
    pub rejected: Vec<(String, RejectionReason)>,
    /// Fraction of valid entries, 0.0..=1.0. Zero for an empty batch.
    pub validity_rate: f64,
}

pub fn validate_batch<I, S>(raws: I) -> ValidationReport
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let (valid, rejected) = filter_valid(raws);
    let total = valid.len() + rejected.len();
    let validity_rate = if total == 0 {
        0.0
    } else {
        valid.len() as f64 / total as f64
    };

    ValidationReport {
        total,
        valid,
        rejected,
        validity_rate,
    }
}
