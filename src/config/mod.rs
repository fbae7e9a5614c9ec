//! Client configuration: schema and SQLite-backed store

mod schema;
mod store;

pub use schema::{ApiConfig, AppConfig, QualityThresholds, SessionConfig};
pub use store::{ConfigChange, ConfigStore};
