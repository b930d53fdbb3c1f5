//! The browser-session boundary consumed by the stage pipeline.
//!
//! The pipeline never touches a DOM engine directly: everything goes
//! through [`BrowserSession`], which a backend (WebDriver, CDP, ...)
//! implements. Each capability may fail with a transient error (worth
//! retrying) or a fatal one (element genuinely gone, session dead).

pub mod scripted;

use std::time::Duration;

use log::warn;
use thiserror::Error;

/// How to locate an element inside the current frame context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// By DOM id.
    Id(String),
    /// By CSS selector.
    Css(String),
    /// By visible text content.
    Text(String),
}

impl Locator {
    pub fn id(value: &str) -> Self {
        Locator::Id(value.to_string())
    }

    pub fn text(value: &str) -> Self {
        Locator::Text(value.to_string())
    }

    /// Stable key for caching and test scripting.
    pub fn key(&self) -> String {
        match self {
            Locator::Id(v) => format!("id:{}", v),
            Locator::Css(v) => format!("css:{}", v),
            Locator::Text(v) => format!("text:{}", v),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Id(v) => write!(f, "#{}", v),
            Locator::Css(v) => write!(f, "css({})", v),
            Locator::Text(v) => write!(f, "text({})", v),
        }
    }
}

/// Opaque handle to a located element, valid until the page changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHandle(pub u64);

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("timed out after {timeout:?} waiting for {locator}")]
    Timeout { locator: Locator, timeout: Duration },

    #[error("stale reference to element {0:?}")]
    StaleElement(ElementHandle),

    #[error("click intercepted on element {0:?}")]
    ClickIntercepted(ElementHandle),

    #[error("element not found: {0}")]
    NotFound(Locator),

    #[error("browser session lost: {0}")]
    SessionLost(String),
}

impl BrowserError {
    /// Transient failures are retry candidates; the rest are fatal to the
    /// current attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrowserError::Timeout { .. }
                | BrowserError::StaleElement(_)
                | BrowserError::ClickIntercepted(_)
        )
    }
}

/// Capabilities the stage pipeline needs from a browser backend.
///
/// Frame context is part of session state: `switch_into_frame` scopes
/// subsequent lookups, `switch_to_root` restores the top document. Prefer
/// [`with_frame`], which restores the root context even on error.
pub trait BrowserSession {
    fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Waits up to `timeout` for the element to appear in the current
    /// frame context.
    fn find_element(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementHandle, BrowserError>;

    fn switch_into_frame(&mut self, locator: &Locator) -> Result<(), BrowserError>;

    fn switch_to_root(&mut self) -> Result<(), BrowserError>;

    fn click(&mut self, element: ElementHandle) -> Result<(), BrowserError>;

    /// Replaces the element's content with `text`.
    fn type_text(&mut self, element: ElementHandle, text: &str) -> Result<(), BrowserError>;

    /// Reads the element's current value attribute.
    fn read_value(&mut self, element: ElementHandle) -> Result<String, BrowserError>;

    /// Row count of the results table in the current frame context.
    fn read_table_row_count(&mut self) -> Result<usize, BrowserError>;

    fn current_url(&mut self) -> Result<String, BrowserError>;
}

/// Runs `body` inside the given frame and always restores the root
/// context, on success and on error.
pub fn with_frame<S, T, F>(session: &mut S, frame: &Locator, body: F) -> Result<T, BrowserError>
where
    S: BrowserSession + ?Sized,
    F: FnOnce(&mut S) -> Result<T, BrowserError>,
{
    session.switch_into_frame(frame)?;
    let result = body(session);
    if let Err(e) = session.switch_to_root() {
        warn!("Failed to restore root frame context: {}", e);
        if result.is_ok() {
            return Err(e);
        }
    }
    result
}

/// Cheap liveness probe: a session that cannot answer `current_url` is
/// gone and every further call would fail the same way.
pub fn ensure_alive<S: BrowserSession + ?Sized>(
    session: &mut S,
    operation: &str,
) -> Result<(), BrowserError> {
    match session.current_url() {
        Ok(_) => Ok(()),
        Err(e) => {
            warn!("Session dead before '{}': {}", operation, e);
            Err(BrowserError::SessionLost(format!(
                "session unresponsive before '{}'",
                operation
            )))
        }
    }
}
