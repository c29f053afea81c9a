//! Persistence context: the data-access boundary for categories.
//!
//! # Responsibility
//! - Own one SQLite connection and one change tracker per session.
//! - Expose the typed `Categories` collection.
//! - Flush staged changes atomically on `save_changes`.
//!
//! # Invariants
//! - Every added or modified category is validated before any SQL runs.
//! - A failed commit rolls back and leaves the tracker untouched.
//! - Staged changes are invisible to other connections until commit.

use crate::config::{ConfigError, ContextOptions};
use crate::db::{open_db, DbError};
use crate::model::category::{CategoryId, ValidationErrors};
use log::{error, info, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

mod categories;
mod tracker;

pub use categories::{Categories, CategoryListQuery};
pub use tracker::{EntryKey, EntryState};

use tracker::{ChangeTracker, TrackedEntry};

pub type ContextResult<T> = Result<T, ContextError>;

/// Error surfaced by context operations and commits.
#[derive(Debug)]
pub enum ContextError {
    /// A staged category broke a field rule; nothing was written.
    Validation {
        key: EntryKey,
        errors: ValidationErrors,
    },
    Config(ConfigError),
    Db(DbError),
    NotFound(CategoryId),
    /// An update was requested for a category that was never committed.
    MissingId,
    InvalidData(String),
}

impl Display for ContextError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation { key, errors } => {
                write!(f, "category entry {key} failed validation: {errors}")
            }
            Self::Config(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "category not found: {id}"),
            Self::MissingId => write!(f, "category has no id; add it before updating"),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted category data: {message}")
            }
        }
    }
}

impl Error for ContextError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation { errors, .. } => Some(errors),
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::MissingId | Self::InvalidData(_) => None,
        }
    }
}

impl ContextError {
    /// Validation details when this is a rule violation.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

impl From<ConfigError> for ContextError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for ContextError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Open { target, source } => {
                Self::Config(ConfigError::Unreachable { target, source })
            }
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for ContextError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Row counts written by one successful commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl SaveSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }
}

/// Session over the catalog database.
///
/// Dropping the context closes its connection and discards staged changes.
pub struct AppDbContext {
    conn: Connection,
    tracker: ChangeTracker,
}

impl AppDbContext {
    /// Opens storage described by `options` and applies pending migrations.
    ///
    /// # Errors
    /// - `Config(Unreachable)` when the data source cannot be opened.
    /// - `Db` when bootstrap or migration fails.
    pub fn open(options: &ContextOptions) -> ContextResult<Self> {
        let conn = open_db(options)?;
        info!("event=context_open module=context status=ok");
        Ok(Self {
            conn,
            tracker: ChangeTracker::default(),
        })
    }

    /// Parses `connection_string` and opens it.
    pub fn from_connection_string(connection_string: &str) -> ContextResult<Self> {
        let options = ContextOptions::from_connection_string(connection_string)?;
        Self::open(&options)
    }

    /// Typed handle to the `Categories` collection.
    pub fn categories(&mut self) -> Categories<'_> {
        Categories::new(&self.conn, &mut self.tracker)
    }

    /// Returns whether any staged change awaits commit.
    pub fn has_changes(&self) -> bool {
        self.tracker.has_changes()
    }

    /// Forgets every staged change and tracked entry.
    pub fn discard_changes(&mut self) {
        self.tracker.clear();
    }

    /// Underlying connection, for callers that need raw SQL.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Commits all staged changes in one transaction.
    ///
    /// # Errors
    /// - `Validation` for the first invalid staged category; no SQL runs.
    /// - `NotFound` when an updated or deleted row no longer exists.
    /// - `Db` for any storage failure.
    ///
    /// On error nothing is written and staged changes are kept.
    pub fn save_changes(&mut self) -> ContextResult<SaveSummary> {
        let started_at = Instant::now();
        let pending = self.tracker.pending();
        if pending.is_empty() {
            return Ok(SaveSummary::default());
        }

        for (key, entry) in &pending {
            if !matches!(entry.state, EntryState::Added | EntryState::Modified) {
                continue;
            }
            if let Err(errors) = entry.category.validate() {
                warn!(
                    "event=save_changes module=context status=rejected error_code=validation_failed entry={} issues={}",
                    key,
                    errors.issues().len()
                );
                return Err(ContextError::Validation { key: *key, errors });
            }
        }

        match write_pending(&mut self.conn, &pending) {
            Ok((summary, assigned)) => {
                self.tracker.accept_changes(&assigned);
                info!(
                    "event=save_changes module=context status=ok inserted={} updated={} deleted={} duration_ms={}",
                    summary.inserted,
                    summary.updated,
                    summary.deleted,
                    started_at.elapsed().as_millis()
                );
                Ok(summary)
            }
            Err(err) => {
                error!(
                    "event=save_changes module=context status=error error_code=commit_failed duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Closes the connection, discarding staged changes.
    pub fn close(self) -> ContextResult<()> {
        let discarded = self.tracker.pending().len();
        if discarded > 0 {
            warn!("event=context_close module=context status=ok discarded_changes={discarded}");
        }
        self.conn
            .close()
            .map_err(|(_, err)| ContextError::Db(DbError::Sqlite(err)))
    }
}

fn write_pending(
    conn: &mut Connection,
    pending: &[(EntryKey, TrackedEntry)],
) -> ContextResult<(SaveSummary, Vec<(EntryKey, CategoryId)>)> {
    let tx = conn.transaction()?;
    let mut summary = SaveSummary::default();
    let mut assigned = Vec::new();

    // Deletes first so a re-added explicit id does not collide.
    for (_, entry) in pending.iter().filter(|(_, e)| e.state == EntryState::Deleted) {
        let id = entry.category.id.ok_or(ContextError::MissingId)?;
        categories::delete_category(&tx, id)?;
        summary.deleted += 1;
    }
    for (_, entry) in pending.iter().filter(|(_, e)| e.state == EntryState::Modified) {
        categories::update_category(&tx, &entry.category)?;
        summary.updated += 1;
    }
    for (key, entry) in pending.iter().filter(|(_, e)| e.state == EntryState::Added) {
        let id = categories::insert_category(&tx, &entry.category)?;
        assigned.push((*key, id));
        summary.inserted += 1;
    }

    tx.commit()?;
    Ok((summary, assigned))
}
