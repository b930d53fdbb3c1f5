use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Deserialize;

/// Portal date format, `DD/MM/YYYY`.
pub const PORTAL_DATE_FORMAT: &str = "%d/%m/%Y";

fn default_staleness_minutes() -> i64 {
    30
}

fn default_retention_days() -> i64 {
    7
}

fn default_max_attempts() -> u32 {
    3
}

fn default_state_path() -> PathBuf {
    PathBuf::from("state/batch_state.json")
}

/// Runtime configuration, loaded from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Portal entry URL.
    pub portal_url: String,
    /// Login CPF/user.
    pub username: String,
    pub password: String,
    /// Query period, portal format (`DD/MM/YYYY`).
    pub start_date: String,
    pub end_date: String,
    /// CSV export of the company spreadsheet.
    pub registry_path: PathBuf,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    /// Where the browser drops finished downloads.
    pub download_directory: PathBuf,
    /// Root of the per-company archive tree.
    pub output_directory: PathBuf,
    #[serde(default = "default_staleness_minutes")]
    pub staleness_window_minutes: i64,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Config {
    pub fn start_date_parsed(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.start_date, PORTAL_DATE_FORMAT).ok()
    }

    pub fn end_date_parsed(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.end_date, PORTAL_DATE_FORMAT).ok()
    }
}
