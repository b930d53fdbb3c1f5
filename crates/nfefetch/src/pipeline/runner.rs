//! The per-entity stage machine.
//!
//! One entity moves through START → FORM → CAPTCHA → QUERY → VALIDATE →
//! DOWNLOAD → DONE, with a checkpoint written after every completed stage
//! and a rollback to a named earlier stage when one fails. Browser calls
//! are wrapped in the retry executor with advisor-informed timeouts;
//! exhausted retries and fatal element failures both end the attempt via
//! rollback, never a silent continue.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{info, info_span, warn};

use crate::browser::{ensure_alive, with_frame, BrowserError, BrowserSession};
use crate::captcha::CaptchaResolver;
use crate::error::NfefetchError;
use crate::retry::{RetryExecutor, RetryStats};
use crate::state::{EntityRecord, Stage, StateStore};
use crate::storage::ArtifactStore;
use crate::timing::{OpCategory, TimeoutAdvisor};

use super::error::PipelineError;
use super::locators;
use super::outcome::PipelineOutcome;
use super::settings::QuerySettings;

const FORM_ATTEMPTS: u32 = 2;
const QUERY_ATTEMPTS: u32 = 2;
const VALIDATE_ATTEMPTS: u32 = 2;
const DOWNLOAD_ATTEMPTS: u32 = 3;

pub struct StagePipeline<B: BrowserSession, C: CaptchaResolver> {
    browser: B,
    captcha: C,
    advisor: TimeoutAdvisor,
    retry: RetryExecutor,
    artifacts: ArtifactStore,
    settings: QuerySettings,
}

impl<B: BrowserSession, C: CaptchaResolver> StagePipeline<B, C> {
    pub fn new(
        browser: B,
        captcha: C,
        advisor: TimeoutAdvisor,
        artifacts: ArtifactStore,
        settings: QuerySettings,
    ) -> Self {
        Self {
            browser,
            captcha,
            advisor,
            retry: RetryExecutor::new(),
            artifacts,
            settings,
        }
    }

    /// Navigates to the received-notes query page. Called once before the
    /// first entity of a batch.
    pub fn open_query_page(&mut self) -> Result<(), BrowserError> {
        let started = Instant::now();
        let result = self.browser.navigate(&self.settings.portal_url);
        self.advisor
            .record(OpCategory::PageLoad, started.elapsed(), result.is_ok());
        result
    }

    /// Runs an entity from the beginning.
    pub fn process(
        &mut self,
        store: &mut StateStore,
        id: &str,
    ) -> Result<PipelineOutcome, NfefetchError> {
        self.run_from(store, id, Stage::Start)
    }

    /// Re-enters an interrupted entity at its checkpointed stage. The
    /// checkpoint is re-created at that stage's canonical progress rather
    /// than trusted blindly; FORM restarts the whole pipeline, because
    /// form state does not survive a browser-session restart.
    pub fn resume(
        &mut self,
        store: &mut StateStore,
        record: &EntityRecord,
    ) -> Result<PipelineOutcome, NfefetchError> {
        self.run_from(store, &record.id, record.current_stage)
    }

    pub fn retry_stats(&self) -> RetryStats {
        self.retry.stats()
    }

    pub fn advisor(&self) -> &TimeoutAdvisor {
        &self.advisor
    }

    /// The underlying session, e.g. for the embedding application to drive
    /// the login flow before the batch starts.
    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn browser_mut(&mut self) -> &mut B {
        &mut self.browser
    }

    fn run_from(
        &mut self,
        store: &mut StateStore,
        id: &str,
        entry: Stage,
    ) -> Result<PipelineOutcome, NfefetchError> {
        let record = match store.get(id) {
            Some(record) => record.clone(),
            None => {
                warn!("Pipeline invoked for unknown entity '{}'", id);
                return Ok(PipelineOutcome::RolledBack {
                    to_stage: Stage::Start,
                    reason: "unknown entity".to_string(),
                });
            }
        };

        // A session that cannot even report its URL will fail every stage;
        // surface that as an infrastructure error instead of burning the
        // entity's attempts.
        ensure_alive(&mut self.browser, "stage pipeline")?;

        let entry = if entry == Stage::Form { Stage::Start } else { entry };
        let span = info_span!("entity", id = %record.id, entry = %entry);
        let _span = span.entered();

        if entry == Stage::Done {
            info!("'{}' already at DONE, nothing to resume", record.id);
            return Ok(PipelineOutcome::Completed {
                total_items: record.total_items_found,
                files: Vec::new(),
            });
        }

        if entry != Stage::Start {
            // Re-establish the checkpoint on re-entry.
            store.checkpoint(id, entry, entry.progress_percent(), None, None, None);
            info!("Resuming '{}' at stage {}", record.id, entry);
        }

        let entry_order = entry.order();

        if entry_order < Stage::Form.order() {
            if let Err(e) = self.fill_search_form(&record.id) {
                let reason = format!("form failure: {}", e);
                store.rollback(id, Stage::Start, &reason);
                return Ok(PipelineOutcome::RolledBack {
                    to_stage: Stage::Start,
                    reason,
                });
            }
            let hints = self.session_hints();
            store.checkpoint(id, Stage::Form, Stage::Form.progress_percent(), hints, None, None);
        }

        if entry_order < Stage::Captcha.order() {
            let label = format!("{} - {}", record.display_name, record.id);
            if let Err(e) = self.captcha.wait_for_solution(&label) {
                let reason = format!("captcha failure: {}", e);
                store.rollback(id, Stage::Form, &reason);
                return Ok(PipelineOutcome::RolledBack {
                    to_stage: Stage::Form,
                    reason,
                });
            }
            store.checkpoint(
                id,
                Stage::Captcha,
                Stage::Captcha.progress_percent(),
                None,
                None,
                None,
            );
        }

        if entry_order < Stage::Query.order() {
            if let Err(e) = self.submit_query(&record.id) {
                let reason = format!("query failure: {}", e);
                store.rollback(id, Stage::Captcha, &reason);
                return Ok(PipelineOutcome::RolledBack {
                    to_stage: Stage::Captcha,
                    reason,
                });
            }
            let hints = self.session_hints();
            store.checkpoint(id, Stage::Query, Stage::Query.progress_percent(), hints, None, None);
        }

        let total_items = if entry_order < Stage::Validate.order() {
            match self.count_results() {
                Err(e) => {
                    let reason = format!("validate failure: {}", e);
                    store.rollback(id, Stage::Query, &reason);
                    return Ok(PipelineOutcome::RolledBack {
                        to_stage: Stage::Query,
                        reason,
                    });
                }
                Ok(0) => {
                    info!("No notes found for '{}'", record.id);
                    store.checkpoint(
                        id,
                        Stage::Done,
                        Stage::Done.progress_percent(),
                        None,
                        Some(0),
                        None,
                    );
                    return Ok(PipelineOutcome::NoItems);
                }
                Ok(rows) => {
                    info!("Query returned {} note(s) for '{}'", rows, record.id);
                    store.checkpoint(
                        id,
                        Stage::Validate,
                        Stage::Validate.progress_percent(),
                        None,
                        Some(rows as u64),
                        None,
                    );
                    rows as u64
                }
            }
        } else {
            record.total_items_found
        };

        match self.download_artifacts(&record) {
            Ok(files) if !files.is_empty() => {
                let names: Vec<String> = files
                    .iter()
                    .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
                    .collect();
                store.record_downloads(id, &names);
                store.checkpoint(
                    id,
                    Stage::Done,
                    Stage::Done.progress_percent(),
                    None,
                    Some(total_items),
                    Some(files.len() as u64),
                );
                self.return_to_query_page();
                Ok(PipelineOutcome::Completed { total_items, files })
            }
            Ok(_) => {
                warn!("Bulk download produced no artifacts for '{}'", record.id);
                Ok(PipelineOutcome::DownloadFailed {
                    total_items,
                    reason: "no artifacts landed in the download directory".to_string(),
                })
            }
            Err(e) => {
                warn!("Download failed for '{}': {}", record.id, e);
                Ok(PipelineOutcome::DownloadFailed {
                    total_items,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Types the query period and entity id into the search form. Fills
    /// only; the search is submitted after the CAPTCHA is solved.
    fn fill_search_form(&mut self, entity_id: &str) -> Result<(), PipelineError> {
        let timeout = self.advisor.get_timeout(OpCategory::ElementWait, 1);
        let delay = self.advisor.get_delay(OpCategory::ActionDelay);
        let started = Instant::now();

        let browser = &mut self.browser;
        let settings = &self.settings;
        let result = self.retry.run(
            "fill search form",
            FORM_ATTEMPTS,
            delay,
            || {
                with_frame(&mut *browser, &locators::portal_frame(), |b| {
                    let field = b.find_element(&locators::start_date_field(), timeout)?;
                    b.type_text(field, &settings.start_date)?;

                    let field = b.find_element(&locators::end_date_field(), timeout)?;
                    b.type_text(field, &settings.end_date)?;

                    let field = b.find_element(&locators::entity_field(), timeout)?;
                    b.type_text(field, entity_id)?;

                    // All document models, cancelled notes included.
                    let selector = b.find_element(&locators::model_selector(), timeout)?;
                    b.type_text(selector, "-")?;
                    if let Ok(checkbox) =
                        b.find_element(&locators::cancelled_notes_checkbox(), timeout)
                    {
                        let _ = b.click(checkbox);
                    }

                    Ok(())
                })
            },
            BrowserError::is_transient,
        );

        self.advisor
            .record(OpCategory::ElementWait, started.elapsed(), result.is_ok());
        result.map_err(PipelineError::from)
    }

    /// Verifies the entity field survived the CAPTCHA reload (refilling it
    /// when the portal cleared the form) and submits the search.
    fn submit_query(&mut self, entity_id: &str) -> Result<(), PipelineError> {
        let timeout = self.advisor.get_timeout(OpCategory::ElementWait, 1);
        let delay = self.advisor.get_delay(OpCategory::ActionDelay);
        let started = Instant::now();

        let browser = &mut self.browser;
        let result = self.retry.run(
            "submit query",
            QUERY_ATTEMPTS,
            delay,
            || {
                with_frame(&mut *browser, &locators::portal_frame(), |b| {
                    let field = b.find_element(&locators::entity_field(), timeout)?;
                    if b.read_value(field)? != entity_id {
                        warn!("Entity field was cleared by the portal, refilling");
                        b.type_text(field, entity_id)?;
                    }

                    let button = b.find_element(&locators::search_button(), timeout)?;
                    b.click(button)
                })
            },
            BrowserError::is_transient,
        );

        self.advisor
            .record(OpCategory::QueryWait, started.elapsed(), result.is_ok());
        result.map_err(PipelineError::from)
    }

    /// Reads the results-table row count. Only zero-vs-nonzero gates
    /// control flow; exact counts are informational.
    fn count_results(&mut self) -> Result<usize, PipelineError> {
        let delay = self.advisor.get_delay(OpCategory::ActionDelay);
        let started = Instant::now();

        let browser = &mut self.browser;
        let result = self.retry.run(
            "read results table",
            VALIDATE_ATTEMPTS,
            delay,
            || {
                with_frame(&mut *browser, &locators::portal_frame(), |b| {
                    b.read_table_row_count()
                })
            },
            BrowserError::is_transient,
        );

        self.advisor
            .record(OpCategory::QueryWait, started.elapsed(), result.is_ok());
        result.map_err(PipelineError::from)
    }

    /// Triggers the bulk download, confirms the modal, waits for the
    /// download history, then sweeps the finished files into the entity's
    /// archive folder.
    fn download_artifacts(&mut self, record: &EntityRecord) -> Result<Vec<std::path::PathBuf>, PipelineError> {
        let timeout = self.advisor.get_timeout(OpCategory::PopupWait, 1);
        let delay = self.advisor.get_delay(OpCategory::ActionDelay);
        let started = Instant::now();

        let browser = &mut self.browser;
        let result = self.retry.run(
            "bulk download",
            DOWNLOAD_ATTEMPTS,
            delay,
            || {
                with_frame(&mut *browser, &locators::portal_frame(), |b| {
                    let button = b.find_element(&locators::download_all_button(), timeout)?;
                    b.click(button)?;

                    // The confirmation modal renders inside the same iframe.
                    b.find_element(&locators::modal_title(), timeout)?;
                    let option = b.find_element(&locators::modal_option_label(), timeout)?;
                    b.click(option)?;
                    let confirm = b.find_element(&locators::modal_confirm_button(), timeout)?;
                    b.click(confirm)?;

                    // History appearing means the portal accepted the request.
                    b.find_element(&locators::download_history_title(), timeout)?;
                    Ok(())
                })
            },
            BrowserError::is_transient,
        );

        self.advisor
            .record(OpCategory::PopupWait, started.elapsed(), result.is_ok());
        result?;

        let folder = if record.display_name.is_empty() {
            record.id.as_str()
        } else {
            record.display_name.as_str()
        };
        let files = self.artifacts.collect(folder, self.settings.reference_date)?;
        Ok(files)
    }

    /// Best effort: click "new query" so the next entity starts from the
    /// search form. The portal sometimes returns there on its own.
    fn return_to_query_page(&mut self) {
        let timeout = self.advisor.get_timeout(OpCategory::ElementWait, 1);
        let browser = &mut self.browser;
        let result = with_frame(&mut *browser, &locators::portal_frame(), |b| {
            let button = b.find_element(&locators::new_query_button(), timeout)?;
            b.click(button)
        });
        if let Err(e) = result {
            tracing::debug!("Could not return to the query page: {}", e);
        }
    }

    /// Recovery hints stored alongside checkpoints.
    fn session_hints(&mut self) -> Option<HashMap<String, String>> {
        match self.browser.current_url() {
            Ok(url) => {
                let mut hints = HashMap::new();
                hints.insert("last_url".to_string(), url);
                Some(hints)
            }
            Err(_) => None,
        }
    }
}
