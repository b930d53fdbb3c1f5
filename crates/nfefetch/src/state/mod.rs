pub mod record;
pub mod store;

pub use record::{EntityRecord, EntityStatus, Stage};
pub use store::{StateStore, StatusCounts, TimeStats};
