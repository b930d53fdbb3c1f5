use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Browser interaction failed: {0}")]
    Browser(#[from] crate::browser::BrowserError),

    #[error("CAPTCHA wait failed: {0}")]
    Captcha(#[from] crate::captcha::CaptchaError),

    #[error("Artifact storage failed: {0}")]
    Storage(#[from] crate::error::StorageError),
}
