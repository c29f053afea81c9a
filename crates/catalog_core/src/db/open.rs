//! Connection bootstrap utilities for SQLite.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and the configured busy timeout.
//! - Returned connections have migrations fully applied.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use crate::config::{ContextOptions, DataSource};
use log::{error, info};
use rusqlite::Connection;
use std::time::Instant;

/// Opens the database described by `options` and applies pending migrations.
///
/// # Errors
/// - `DbError::Open` when the data source cannot be reached.
/// - `DbError::UnsupportedSchemaVersion` when the file is newer than this binary.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(options: &ContextOptions) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = if options.is_memory() { "memory" } else { "file" };
    info!("event=db_open module=db status=start mode={mode}");

    let flags = options.mode().open_flags();
    let opened = match options.data_source() {
        DataSource::File(path) if !options.is_memory() => Connection::open_with_flags(path, flags),
        _ => Connection::open_in_memory_with_flags(flags),
    };

    let mut conn = match opened {
        Ok(conn) => conn,
        Err(source) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                source
            );
            return Err(DbError::Open {
                target: options.data_source().to_string(),
                source,
            });
        }
    };

    match bootstrap_connection(&mut conn, options) {
        Ok(applied) => {
            info!(
                "event=db_open module=db status=ok mode={mode} migrations_applied={applied} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Opens a private in-memory database with all migrations applied.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_db(&ContextOptions::in_memory())
}

fn bootstrap_connection(conn: &mut Connection, options: &ContextOptions) -> DbResult<usize> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(options.busy_timeout())?;
    apply_migrations(conn)
}
