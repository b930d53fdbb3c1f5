pub mod advisor;

pub use advisor::{AdvisorReport, OpCategory, ServerHealth, TimeoutAdvisor};
