//! Shared fixtures for the batch-flow integration tests.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use tempfile::TempDir;

use nfefetch::browser::scripted::ScriptedSession;
use nfefetch::captcha::CaptchaResolver;
use nfefetch::pipeline::{QuerySettings, StagePipeline};
use nfefetch::registry::CompanyRegistry;
use nfefetch::state::StateStore;
use nfefetch::storage::ArtifactStore;
use nfefetch::timing::TimeoutAdvisor;
use nfefetch::BatchCoordinator;

pub const STALENESS_MINUTES: i64 = 30;
pub const RETENTION_DAYS: i64 = 7;
pub const MAX_ATTEMPTS: u32 = 3;

pub struct BatchFixture {
    pub tmp: TempDir,
    pub state_path: PathBuf,
    pub registry_path: PathBuf,
    pub downloads: PathBuf,
    pub archive: PathBuf,
}

impl BatchFixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let downloads = tmp.path().join("downloads");
        std::fs::create_dir_all(&downloads).unwrap();

        Self {
            state_path: tmp.path().join("state/batch_state.json"),
            registry_path: tmp.path().join("empresas.csv"),
            downloads,
            archive: tmp.path().join("archive"),
            tmp,
        }
    }

    pub fn write_registry(&self, rows: &[(&str, &str)]) {
        let mut content = String::from("ie,nome\n");
        for (ie, name) in rows {
            content.push_str(&format!("{},{}\n", ie, name));
        }
        std::fs::write(&self.registry_path, content).unwrap();
    }

    pub fn seed_download(&self, filename: &str) {
        std::fs::write(self.downloads.join(filename), b"artifact").unwrap();
    }

    pub fn open_store(&self) -> StateStore {
        StateStore::open(&self.state_path, MAX_ATTEMPTS)
    }

    pub fn settings(&self) -> QuerySettings {
        QuerySettings::new(
            "https://portal.example/netaccess",
            "01/03/2026",
            "31/03/2026",
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        )
    }

    pub fn coordinator<C: CaptchaResolver>(
        &self,
        session: ScriptedSession,
        captcha: C,
        cancel: Arc<AtomicBool>,
    ) -> BatchCoordinator<ScriptedSession, C> {
        let pipeline = StagePipeline::new(
            session,
            captcha,
            TimeoutAdvisor::with_hour_source(|| 12),
            ArtifactStore::new(&self.downloads, &self.archive),
            self.settings(),
        );

        BatchCoordinator::new(
            self.open_store(),
            pipeline,
            CompanyRegistry::new(&self.registry_path),
            Duration::minutes(STALENESS_MINUTES),
            RETENTION_DAYS,
            cancel,
        )
    }

    /// Rewrites one record's `checkpoint_at` in the persisted snapshot,
    /// simulating an interruption that happened `minutes_ago` minutes ago.
    pub fn age_checkpoint(&self, id: &str, minutes_ago: i64) {
        let content = std::fs::read_to_string(&self.state_path).unwrap();
        let mut snapshot: serde_json::Value = serde_json::from_str(&content).unwrap();
        let stamp = (Utc::now() - Duration::minutes(minutes_ago)).to_rfc3339();
        snapshot[id]["checkpoint_at"] = serde_json::Value::String(stamp);
        std::fs::write(&self.state_path, snapshot.to_string()).unwrap();
    }
}
