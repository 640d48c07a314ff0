//! Schema for the persisted store backend.
//!
//! # Invariants
//! - The schema version lives in `PRAGMA user_version`.
//! - Each step is applied at most once, inside one transaction with the
//!   version bump.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

/// `store_entries` keyed by `(store_name, key)`, ordered by `position`.
const SCHEMA_STEPS: &[(u32, &str)] = &[(1, include_str!("0001_stores.sql"))];

/// Schema version this build produces.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |(version, _)| *version)
}

/// Brings the store schema of `conn` up to `latest_version`.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file was written by a newer build.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let found = schema_version(conn)?;
    let latest = latest_version();
    if found > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: found,
            latest_supported: latest,
        });
    }

    let pending: Vec<_> = SCHEMA_STEPS
        .iter()
        .filter(|(version, _)| *version > found)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, sql) in pending {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from={found} to={latest}");
    Ok(())
}

/// Reads `PRAGMA user_version`.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}
