use std::path::Path;

use crate::config::schema::{Config, PORTAL_DATE_FORMAT};
use crate::error::ConfigError;

use chrono::NaiveDate;

/// Markers left behind by an unedited credentials template.
const PLACEHOLDER_MARKERS: &[&str] = &["YOUR_", "_HERE", "SEU_", "AQUI"];

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// All validation problems at once, so the operator fixes the file in one
/// round instead of replaying errors one by one.
pub fn validation_errors(config: &Config) -> Vec<String> {
    let mut errors = Vec::new();

    let upper_user = config.username.to_uppercase();
    if config.username.trim().is_empty()
        || PLACEHOLDER_MARKERS.iter().any(|m| upper_user.contains(m))
    {
        errors.push("username is missing or still contains the template placeholder".to_string());
    }

    if config.password.len() < 3 {
        errors.push("password is missing or too short".to_string());
    }

    let start = NaiveDate::parse_from_str(&config.start_date, PORTAL_DATE_FORMAT);
    if start.is_err() {
        errors.push(format!(
            "start_date '{}' is not a valid DD/MM/YYYY date",
            config.start_date
        ));
    }
    let end = NaiveDate::parse_from_str(&config.end_date, PORTAL_DATE_FORMAT);
    if end.is_err() {
        errors.push(format!(
            "end_date '{}' is not a valid DD/MM/YYYY date",
            config.end_date
        ));
    }
    if let (Ok(start), Ok(end)) = (start, end) {
        if end < start {
            errors.push(format!(
                "end_date {} is before start_date {}",
                config.end_date, config.start_date
            ));
        }
    }

    if config.portal_url.trim().is_empty() {
        errors.push("portal_url is missing".to_string());
    }

    if config.staleness_window_minutes <= 0 {
        errors.push("staleness_window_minutes must be positive".to_string());
    }
    if config.retention_days <= 0 {
        errors.push("retention_days must be positive".to_string());
    }
    if config.max_attempts == 0 {
        errors.push("max_attempts must be at least 1".to_string());
    }

    errors
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let errors = validation_errors(config);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation {
            message: errors.join("; "),
        })
    }
}
