pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, validation_errors};
pub use schema::{Config, PORTAL_DATE_FORMAT};
