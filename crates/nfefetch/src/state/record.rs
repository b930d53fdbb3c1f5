//! Per-company processing record and stage model.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall status of one company in the batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}

/// Portal-interaction stages, in execution order.
///
/// Transitions only move forward, except `rollback` which jumps strictly
/// backward to a named earlier stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    Form,
    Captcha,
    Query,
    Validate,
    Download,
    Done,
}

impl Stage {
    /// Fixed stage → progress mapping, shared by checkpoint and rollback so
    /// a persisted percentage is always interpretable.
    pub fn progress_percent(self) -> u8 {
        match self {
            Stage::Start => 0,
            Stage::Form => 20,
            Stage::Captcha => 40,
            Stage::Query => 60,
            Stage::Validate => 70,
            Stage::Download => 80,
            Stage::Done => 100,
        }
    }

    /// Position in the forward execution order.
    pub fn order(self) -> u8 {
        match self {
            Stage::Start => 0,
            Stage::Form => 1,
            Stage::Captcha => 2,
            Stage::Query => 3,
            Stage::Validate => 4,
            Stage::Download => 5,
            Stage::Done => 6,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::Form => "form",
            Stage::Captcha => "captcha",
            Stage::Query => "query",
            Stage::Validate => "validate",
            Stage::Download => "download",
            Stage::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Durable processing state for one company, keyed by its canonical
/// registration number. Timestamps serialize as RFC 3339.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Canonical registration number. Immutable once created.
    pub id: String,
    /// Human-readable company name.
    pub display_name: String,
    /// Registry insertion order, assigned once by the store.
    pub seq: u64,
    pub status: EntityStatus,
    /// Incremented on every (re)start of processing. Never reset except by
    /// a full state wipe.
    pub attempt_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub current_stage: Stage,
    pub stage_progress_percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_at: Option<DateTime<Utc>>,
    /// Transient recovery hints (last known URL, etc.).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub session_data: HashMap<String, String>,
    #[serde(default)]
    pub total_items_found: u64,
    #[serde(default)]
    pub items_processed: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub downloaded_files: Vec<String>,
}

impl EntityRecord {
    pub fn new(id: &str, display_name: &str, seq: u64) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            seq,
            status: EntityStatus::Pending,
            attempt_count: 0,
            last_attempt_at: None,
            last_error: None,
            current_stage: Stage::Start,
            stage_progress_percent: 0,
            checkpoint_at: None,
            session_data: HashMap::new(),
            total_items_found: 0,
            items_processed: 0,
            downloaded_files: Vec::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, EntityStatus::Done | EntityStatus::Failed)
    }
}
