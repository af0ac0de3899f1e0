//! Device lock and activity log persistence.
//!
//! # Responsibility
//! - Serialize protocol runs on the single arm through one persisted lock row.
//! - Record every run in `activity_log` with its final status.
//!
//! # Invariants
//! - The lock row (`id = 1`) always exists after migrations.
//! - `lock.active = 1` implies `locked_by` names a `RUNNING` activity.
//! - Acquire and release each run in one immediate transaction.

use crate::repo::error::{RepoError, RepoResult};
use crate::repo::{bool_from_db, ensure_connection_ready};
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

/// Row id of one `activity_log` entry.
pub type ActivityId = i64;

const ACTIVITY_SELECT_SQL: &str =
    "SELECT id, \"start\", \"end\", program, status, status_message FROM activity_log";
const STALE_LOCK_MESSAGE: &str = "interrupted before completion";

/// Lifecycle status of one recorded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    Running,
    Failed,
    Completed,
}

impl ActivityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Failed => "FAILED",
            Self::Completed => "COMPLETED",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "RUNNING" => Some(Self::Running),
            "FAILED" => Some(Self::Failed),
            "COMPLETED" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Terminal outcome written when the lock is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityOutcome {
    Completed,
    Failed,
}

impl From<ActivityOutcome> for ActivityStatus {
    fn from(value: ActivityOutcome) -> Self {
        match value {
            ActivityOutcome::Completed => Self::Completed,
            ActivityOutcome::Failed => Self::Failed,
        }
    }
}

/// One `activity_log` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: ActivityId,
    /// Epoch ms when the lock was acquired.
    pub start_ms: i64,
    /// Epoch ms when the lock was released.
    pub end_ms: Option<i64>,
    /// Submitted protocol, as JSON.
    pub program: String,
    pub status: ActivityStatus,
    pub status_message: Option<String>,
}

/// Repository interface for the device lock.
pub trait DeviceLockRepository {
    /// Takes the lock for a new `RUNNING` activity.
    fn acquire_device_lock(&self, program: &str) -> RepoResult<ActivityId>;
    /// Finishes `activity` with `outcome` and frees the lock.
    fn release_device_lock(
        &self,
        activity: ActivityId,
        outcome: ActivityOutcome,
        message: Option<&str>,
    ) -> RepoResult<()>;
    /// Returns the activity currently holding the lock.
    fn lock_holder(&self) -> RepoResult<Option<ActivityId>>;
    /// Fails dangling `RUNNING` activities and frees the lock.
    ///
    /// Returns the number of activities marked failed.
    fn recover_stale_lock(&self) -> RepoResult<usize>;
    fn get_activity(&self, id: ActivityId) -> RepoResult<Option<ActivityRecord>>;
    /// Lists most recent activities first.
    fn list_activities(&self, limit: u32) -> RepoResult<Vec<ActivityRecord>>;
}

/// SQLite-backed device lock.
pub struct SqliteDeviceLockRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDeviceLockRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl DeviceLockRepository for SqliteDeviceLockRepository<'_> {
    fn acquire_device_lock(&self, program: &str) -> RepoResult<ActivityId> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let (active, locked_by) = read_lock_row(&tx)?;
        if active {
            warn!(
                "event=device_lock module=repo status=error error_code=device_busy locked_by={}",
                locked_by.map_or_else(|| "none".to_string(), |id| id.to_string())
            );
            return Err(RepoError::DeviceBusy { locked_by });
        }

        tx.execute(
            "INSERT INTO activity_log (\"start\", program, status)
             VALUES ((strftime('%s', 'now') * 1000), ?1, 'RUNNING');",
            [program],
        )?;
        let activity = tx.last_insert_rowid();
        tx.execute(
            "UPDATE lock SET active = 1, locked_by = ?1 WHERE id = 1;",
            [activity],
        )?;
        tx.commit()?;

        info!("event=device_lock module=repo status=ok action=acquire activity={activity}");
        Ok(activity)
    }

    fn release_device_lock(
        &self,
        activity: ActivityId,
        outcome: ActivityOutcome,
        message: Option<&str>,
    ) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let released = tx.execute(
            "UPDATE lock SET active = 0, locked_by = NULL
             WHERE id = 1 AND active = 1 AND locked_by = ?1;",
            [activity],
        )?;
        if released == 0 {
            return Err(RepoError::LockNotHeld(activity));
        }

        let status = ActivityStatus::from(outcome);
        let finished = tx.execute(
            "UPDATE activity_log
             SET \"end\" = (strftime('%s', 'now') * 1000), status = ?2, status_message = ?3
             WHERE id = ?1 AND status = 'RUNNING';",
            params![activity, status.as_str(), message],
        )?;
        if finished == 0 {
            return Err(RepoError::ActivityNotFound(activity));
        }
        tx.commit()?;

        info!(
            "event=device_lock module=repo status=ok action=release activity={} outcome={}",
            activity,
            status.as_str()
        );
        Ok(())
    }

    fn lock_holder(&self) -> RepoResult<Option<ActivityId>> {
        let (active, locked_by) = read_lock_row(self.conn)?;
        Ok(if active { locked_by } else { None })
    }

    fn recover_stale_lock(&self) -> RepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let failed = tx.execute(
            "UPDATE activity_log
             SET \"end\" = (strftime('%s', 'now') * 1000), status = 'FAILED', status_message = ?1
             WHERE status = 'RUNNING';",
            [STALE_LOCK_MESSAGE],
        )?;
        tx.execute(
            "UPDATE lock SET active = 0, locked_by = NULL WHERE id = 1;",
            [],
        )?;
        tx.commit()?;

        if failed > 0 {
            warn!("event=device_lock module=repo status=ok action=recover failed_activities={failed}");
        }
        Ok(failed)
    }

    fn get_activity(&self, id: ActivityId) -> RepoResult<Option<ActivityRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ACTIVITY_SELECT_SQL} WHERE id = ?1;"))?;
        let record = stmt
            .query_row([id], |row| Ok(parse_activity_row(row)))
            .optional()?
            .transpose()?;
        Ok(record)
    }

    fn list_activities(&self, limit: u32) -> RepoResult<Vec<ActivityRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ACTIVITY_SELECT_SQL} ORDER BY id DESC LIMIT ?1;"))?;
        let mut rows = stmt.query([i64::from(limit)])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_activity_row(row)?);
        }
        Ok(records)
    }
}

fn read_lock_row(conn: &Connection) -> RepoResult<(bool, Option<ActivityId>)> {
    let (active, locked_by): (i64, Option<ActivityId>) = conn.query_row(
        "SELECT active, locked_by FROM lock WHERE id = 1;",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok((bool_from_db(active, "lock.active")?, locked_by))
}

fn parse_activity_row(row: &Row<'_>) -> RepoResult<ActivityRecord> {
    let status_text: String = row.get("status")?;
    let status = ActivityStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in activity_log.status"
        ))
    })?;

    Ok(ActivityRecord {
        id: row.get("id")?,
        start_ms: row.get("start")?,
        end_ms: row.get("end")?,
        program: row.get("program")?,
        status,
        status_message: row.get("status_message")?,
    })
}
