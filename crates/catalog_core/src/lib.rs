//! Data-access layer for catalog categories.
//! This crate is the single source of truth for category invariants.

pub mod config;
pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;

pub use config::{AppConfig, ConfigError, ContextOptions, DataSource, LoggingConfig, OpenMode};
pub use context::{
    AppDbContext, Categories, CategoryListQuery, ContextError, ContextResult, EntryKey,
    EntryState, SaveSummary,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::category::{
    Category, CategoryField, CategoryId, ValidationErrors, ValidationIssue, ValidationRule,
    TITLE_MAX_CHARS, TITLE_MIN_CHARS,
};
pub use service::category_service::CategoryService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
