use chrono::NaiveDate;

use crate::config::Config;
use crate::error::ConfigError;

/// The slice of configuration the stage pipeline needs per run.
#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub portal_url: String,
    /// Query period, portal format (`DD/MM/YYYY`).
    pub start_date: String,
    pub end_date: String,
    /// Period start as a date; drives the artifact tree layout.
    pub reference_date: NaiveDate,
}

impl QuerySettings {
    pub fn new(portal_url: &str, start_date: &str, end_date: &str, reference_date: NaiveDate) -> Self {
        Self {
            portal_url: portal_url.to_string(),
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
            reference_date,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let reference_date = config.start_date_parsed().ok_or_else(|| ConfigError::Validation {
            message: format!("start_date '{}' is not a valid DD/MM/YYYY date", config.start_date),
        })?;

        Ok(Self {
            portal_url: config.portal_url.clone(),
            start_date: config.start_date.clone(),
            end_date: config.end_date.clone(),
            reference_date,
        })
    }
}
