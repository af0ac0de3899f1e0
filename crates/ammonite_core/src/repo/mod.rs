//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define per-aggregate data access contracts (labware, decks, device lock).
//! - Define the read-snapshot contract the protocol compiler resolves against.
//! - Isolate SQLite query details from services and the compiler.
//!
//! # Invariants
//! - Write paths validate entities before persistence.
//! - Parent and children are written in one transaction.
//! - Repository APIs return semantic errors (`NotFound`, `DeviceBusy`) in
//!   addition to DB transport errors.

pub mod deck_repo;
pub mod error;
pub mod labware_repo;
pub mod lock_repo;
pub mod memory;
pub mod snapshot;

use crate::db::migrations::latest_version;
use error::{RepoError, RepoResult};
use rusqlite::Connection;

/// Rejects connections that did not go through `open_db*` bootstrap.
pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let actual_version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

pub(crate) fn bool_from_db(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}
