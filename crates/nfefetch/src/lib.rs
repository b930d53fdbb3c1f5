pub mod batch;
pub mod browser;
pub mod captcha;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod retry;
pub mod state;
pub mod storage;
pub mod timing;
pub mod validator;

pub use batch::{BatchCoordinator, BatchReport};
pub use browser::{BrowserError, BrowserSession, ElementHandle, Locator};
pub use captcha::{CaptchaResolver, NoopCaptchaResolver, StdinCaptchaResolver};
pub use config::{load_config, Config};
pub use error::{ConfigError, NfefetchError, Result, StoreError};
pub use pipeline::{PipelineOutcome, QuerySettings, StagePipeline};
pub use registry::CompanyRegistry;
pub use retry::{RetryExecutor, RetryStats};
pub use state::{EntityRecord, EntityStatus, Stage, StateStore};
pub use storage::ArtifactStore;
pub use timing::{OpCategory, ServerHealth, TimeoutAdvisor};
