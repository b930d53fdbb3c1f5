//! End-to-end batch scenarios against a scripted browser session.

mod common;

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nfefetch::browser::scripted::ScriptedSession;
use nfefetch::captcha::{CaptchaError, CaptchaResolver, NoopCaptchaResolver};
use nfefetch::pipeline::locators;
use nfefetch::state::{EntityStatus, Stage};

use common::BatchFixture;

#[derive(Default)]
struct CountingResolver {
    calls: Cell<usize>,
}

impl CaptchaResolver for CountingResolver {
    fn wait_for_solution(&self, _entity_label: &str) -> Result<(), CaptchaError> {
        self.calls.set(self.calls.get() + 1);
        Ok(())
    }
}

fn no_cancel() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

// ── Fresh batch ──

#[test]
fn fresh_batch_processes_entities_in_registry_order() {
    let fixture = BatchFixture::new();
    fixture.write_registry(&[("22222222-2", "Beta SA"), ("111111111", "Alpha Ltda")]);

    let session = ScriptedSession::with_rows(0);
    let mut coordinator = fixture.coordinator(session, NoopCaptchaResolver, no_cancel());

    let report = coordinator.run().unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.done, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.progress(), "2/2");
    assert_eq!(report.done_sample, vec!["Beta SA", "Alpha Ltda"]);

    // Registry order is preserved: Beta (first row) before Alpha, with the
    // canonical digit-only ids typed into the portal form.
    assert_eq!(
        coordinator
            .pipeline()
            .browser()
            .typed_values(&locators::entity_field()),
        vec!["222222222", "111111111"]
    );
}

#[test]
fn fresh_batch_with_downloads_archives_files() {
    let fixture = BatchFixture::new();
    fixture.write_registry(&[("111111111", "Alpha Ltda")]);
    fixture.seed_download("notas.zip");

    let session = ScriptedSession::with_rows(4);
    let mut coordinator = fixture.coordinator(session, NoopCaptchaResolver, no_cancel());

    let report = coordinator.run().unwrap();
    assert_eq!(report.done, 1);

    let record = coordinator.store().get("111111111").unwrap();
    assert_eq!(record.status, EntityStatus::Done);
    assert_eq!(record.total_items_found, 4);
    assert_eq!(record.downloaded_files, vec!["notas.zip"]);
    assert!(fixture
        .archive
        .join("Alpha Ltda/2026/03/notas.zip")
        .exists());
}

#[test]
fn invalid_registrations_are_skipped_not_fatal() {
    let fixture = BatchFixture::new();
    fixture.write_registry(&[
        ("NÃO TEM", "No Registration ME"),
        ("111111111", "Alpha Ltda"),
        ("123", "Too Short SA"),
    ]);

    let session = ScriptedSession::with_rows(0);
    let mut coordinator = fixture.coordinator(session, NoopCaptchaResolver, no_cancel());

    let report = coordinator.run().unwrap();
    assert_eq!(report.total, 1);
    assert_eq!(report.done, 1);
}

// ── Resume & staleness ──

#[test]
fn fresh_interruption_resumes_at_checkpointed_stage() {
    let fixture = BatchFixture::new();
    fixture.write_registry(&[("333333333", "Gamma ME")]);

    // A previous run died right after submitting the query.
    {
        let mut store = fixture.open_store();
        store.add_entities(&[("333333333".to_string(), "Gamma ME".to_string())]);
        store.mark_in_progress("333333333");
        store.checkpoint("333333333", Stage::Query, 60, None, None, None);
    }
    fixture.age_checkpoint("333333333", 2);

    let session = ScriptedSession::with_rows(0);
    let captcha = CountingResolver::default();
    let mut coordinator = fixture.coordinator(session, captcha, no_cancel());

    let report = coordinator.run().unwrap();
    assert_eq!(report.done, 1);

    // Resumed at QUERY: no form fill, no CAPTCHA wait.
    let browser = coordinator.pipeline().browser();
    assert_eq!(browser.typed_count(&locators::entity_field()), 0);
    assert_eq!(browser.typed_count(&locators::start_date_field()), 0);
}

#[test]
fn stale_interruption_restarts_from_scratch() {
    let fixture = BatchFixture::new();
    fixture.write_registry(&[("333333333", "Gamma ME")]);

    {
        let mut store = fixture.open_store();
        store.add_entities(&[("333333333".to_string(), "Gamma ME".to_string())]);
        store.mark_in_progress("333333333");
        store.checkpoint("333333333", Stage::Query, 60, None, None, None);
    }
    // Two hours old with a 30-minute window: not resumable.
    fixture.age_checkpoint("333333333", 120);

    let session = ScriptedSession::with_rows(0);
    let captcha = CountingResolver::default();
    let mut coordinator = fixture.coordinator(session, captcha, no_cancel());

    let report = coordinator.run().unwrap();
    assert_eq!(report.done, 1);

    // The whole pipeline ran again, form and CAPTCHA included.
    let browser = coordinator.pipeline().browser();
    assert_eq!(browser.typed_count(&locators::entity_field()), 1);
    assert_eq!(
        coordinator
            .store()
            .get("333333333")
            .unwrap()
            .attempt_count,
        2
    );
}

// ── Failure handling ──

#[test]
fn download_failure_gets_exactly_one_retry_pass() {
    let fixture = BatchFixture::new();
    fixture.write_registry(&[("111111111", "Alpha Ltda"), ("222222222", "Beta SA")]);

    // Notes exist but the bulk-download button never appears.
    let mut session = ScriptedSession::with_rows(2);
    session.set_missing(&locators::download_all_button());
    let mut coordinator = fixture.coordinator(session, NoopCaptchaResolver, no_cancel());

    let report = coordinator.run().unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.failed, 2);
    assert_eq!(report.done, 0);
    assert_eq!(report.failed_sample, vec!["Alpha Ltda", "Beta SA"]);

    // First pass plus the single retry pass, then no further selection.
    for id in ["111111111", "222222222"] {
        let record = coordinator.store().get(id).unwrap();
        assert_eq!(record.status, EntityStatus::Failed);
        assert_eq!(record.attempt_count, 2);
        // Download failures do not roll the stage back.
        assert_eq!(record.current_stage, Stage::Validate);
    }
}

#[test]
fn form_failure_rolls_back_and_does_not_starve_others() {
    let fixture = BatchFixture::new();
    fixture.write_registry(&[("111111111", "Alpha Ltda"), ("222222222", "Beta SA")]);

    // Alpha's form never loads its date field; Beta is fine.
    let mut session = ScriptedSession::with_rows(0);
    session.set_missing(&locators::start_date_field());

    // The missing field hits every entity in this scripted session, so
    // both roll back; what matters is that Beta still got its first
    // attempt instead of Alpha consuming the whole run.
    let mut coordinator = fixture.coordinator(session, NoopCaptchaResolver, no_cancel());
    let report = coordinator.run().unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.done, 0);
    for id in ["111111111", "222222222"] {
        let record = coordinator.store().get(id).unwrap();
        assert!(record.attempt_count >= 2);
        assert_eq!(record.current_stage, Stage::Start);
        assert_eq!(record.status, EntityStatus::Pending);
    }
}

#[test]
fn dead_session_aborts_batch_but_saves_state() {
    let fixture = BatchFixture::new();
    fixture.write_registry(&[("111111111", "Alpha Ltda")]);

    let mut session = ScriptedSession::new();
    session.kill_session();
    let mut coordinator = fixture.coordinator(session, NoopCaptchaResolver, no_cancel());

    assert!(coordinator.run().is_err());

    // The guaranteed final save preserved the registered entities.
    let store = fixture.open_store();
    assert_eq!(store.len(), 1);
    assert_eq!(
        store.get("111111111").unwrap().status,
        EntityStatus::Pending
    );
}

// ── Cancellation ──

#[test]
fn cancelled_run_processes_nothing_but_reports_and_saves() {
    let fixture = BatchFixture::new();
    fixture.write_registry(&[("111111111", "Alpha Ltda"), ("222222222", "Beta SA")]);

    let cancel = no_cancel();
    cancel.store(true, Ordering::Relaxed);

    let session = ScriptedSession::with_rows(0);
    let mut coordinator = fixture.coordinator(session, NoopCaptchaResolver, cancel);

    let report = coordinator.run().unwrap();
    assert_eq!(report.total, 2);
    assert_eq!(report.done, 0);
    assert_eq!(report.pending, 2);

    // Entities were registered and persisted despite the cancellation.
    let store = fixture.open_store();
    assert_eq!(store.len(), 2);
}

// ── Crash-resumability round trip ──

#[test]
fn second_run_skips_completed_entities() {
    let fixture = BatchFixture::new();
    fixture.write_registry(&[("111111111", "Alpha Ltda"), ("222222222", "Beta SA")]);

    let session = ScriptedSession::with_rows(0);
    let mut coordinator = fixture.coordinator(session, NoopCaptchaResolver, no_cancel());
    let report = coordinator.run().unwrap();
    assert_eq!(report.done, 2);
    drop(coordinator);

    // A second run over the same registry finds nothing to do.
    let session = ScriptedSession::with_rows(0);
    let mut coordinator = fixture.coordinator(session, NoopCaptchaResolver, no_cancel());
    let report = coordinator.run().unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.done, 2);
    assert_eq!(
        coordinator
            .pipeline()
            .browser()
            .typed_values(&locators::entity_field()),
        Vec::<String>::new()
    );
}
