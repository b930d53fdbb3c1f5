//! Scripted in-memory session for unit and integration tests.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use super::{BrowserError, BrowserSession, ElementHandle, Locator};

/// A [`BrowserSession`] that follows a pre-arranged script instead of a
/// real portal: tests decide which locators are missing, which lookups
/// time out and how many rows the results table reports.
#[derive(Debug, Default)]
pub struct ScriptedSession {
    next_handle: u64,
    handles: HashMap<u64, String>,
    field_values: HashMap<String, String>,
    clicks: Vec<String>,
    typed: Vec<(String, String)>,
    visited: Vec<String>,
    frame_depth: usize,
    url: String,
    row_count: usize,
    fail_finds: HashMap<String, u32>,
    missing: HashSet<String>,
    fail_row_counts: u32,
    session_lost: bool,
    volatile_form: bool,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self {
            url: "https://portal.example/netaccess".to_string(),
            ..Self::default()
        }
    }

    pub fn with_rows(row_count: usize) -> Self {
        Self {
            row_count,
            ..Self::new()
        }
    }

    /// The next `times` lookups of `locator` time out before succeeding.
    pub fn fail_find_times(&mut self, locator: &Locator, times: u32) {
        self.fail_finds.insert(locator.key(), times);
    }

    /// Every lookup of `locator` fails fatally.
    pub fn set_missing(&mut self, locator: &Locator) {
        self.missing.insert(locator.key());
    }

    /// The next `times` row-count reads time out.
    pub fn fail_row_count_times(&mut self, times: u32) {
        self.fail_row_counts = times;
    }

    /// Simulates a portal that clears form fields whenever the frame
    /// context is left.
    pub fn set_volatile_form(&mut self) {
        self.volatile_form = true;
    }

    pub fn kill_session(&mut self) {
        self.session_lost = true;
    }

    pub fn frame_depth(&self) -> usize {
        self.frame_depth
    }

    pub fn clicks(&self) -> &[String] {
        &self.clicks
    }

    pub fn visited(&self) -> &[String] {
        &self.visited
    }

    /// How many times text was typed into elements found by `locator`.
    pub fn typed_count(&self, locator: &Locator) -> usize {
        let key = locator.key();
        self.typed.iter().filter(|(k, _)| *k == key).count()
    }

    /// Everything typed into elements found by `locator`, in order.
    pub fn typed_values(&self, locator: &Locator) -> Vec<String> {
        let key = locator.key();
        self.typed
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn last_typed(&self, locator: &Locator) -> Option<&str> {
        let key = locator.key();
        self.typed
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, text)| text.as_str())
    }

    fn ensure_session(&self) -> Result<(), BrowserError> {
        if self.session_lost {
            Err(BrowserError::SessionLost("scripted session ended".to_string()))
        } else {
            Ok(())
        }
    }

    fn key_for(&self, element: ElementHandle) -> Result<String, BrowserError> {
        self.handles
            .get(&element.0)
            .cloned()
            .ok_or(BrowserError::StaleElement(element))
    }
}

impl BrowserSession for ScriptedSession {
    fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.ensure_session()?;
        self.url = url.to_string();
        self.visited.push(url.to_string());
        Ok(())
    }

    fn find_element(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementHandle, BrowserError> {
        self.ensure_session()?;
        let key = locator.key();

        if self.missing.contains(&key) {
            return Err(BrowserError::NotFound(locator.clone()));
        }

        if let Some(remaining) = self.fail_finds.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BrowserError::Timeout {
                    locator: locator.clone(),
                    timeout,
                });
            }
        }

        self.next_handle += 1;
        self.handles.insert(self.next_handle, key);
        Ok(ElementHandle(self.next_handle))
    }

    fn switch_into_frame(&mut self, _locator: &Locator) -> Result<(), BrowserError> {
        self.ensure_session()?;
        self.frame_depth += 1;
        Ok(())
    }

    fn switch_to_root(&mut self) -> Result<(), BrowserError> {
        self.ensure_session()?;
        self.frame_depth = 0;
        if self.volatile_form {
            self.field_values.clear();
        }
        Ok(())
    }

    fn click(&mut self, element: ElementHandle) -> Result<(), BrowserError> {
        self.ensure_session()?;
        let key = self.key_for(element)?;
        self.clicks.push(key);
        Ok(())
    }

    fn type_text(&mut self, element: ElementHandle, text: &str) -> Result<(), BrowserError> {
        self.ensure_session()?;
        let key = self.key_for(element)?;
        self.field_values.insert(key.clone(), text.to_string());
        self.typed.push((key, text.to_string()));
        Ok(())
    }

    fn read_value(&mut self, element: ElementHandle) -> Result<String, BrowserError> {
        self.ensure_session()?;
        let key = self.key_for(element)?;
        Ok(self.field_values.get(&key).cloned().unwrap_or_default())
    }

    fn read_table_row_count(&mut self) -> Result<usize, BrowserError> {
        self.ensure_session()?;
        if self.fail_row_counts > 0 {
            self.fail_row_counts -= 1;
            return Err(BrowserError::Timeout {
                locator: Locator::Css("tr.tbody-row".to_string()),
                timeout: Duration::from_secs(0),
            });
        }
        Ok(self.row_count)
    }

    fn current_url(&mut self) -> Result<String, BrowserError> {
        self.ensure_session()?;
        Ok(self.url.clone())
    }
}
