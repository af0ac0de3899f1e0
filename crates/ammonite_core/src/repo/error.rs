//! Shared repository error type.

use crate::db::DbError;
use crate::model::validation::{EntityKind, EntityValidationError};
use crate::repo::lock_repo::ActivityId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for layout and device-lock persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(EntityValidationError),
    Db(DbError),
    NotFound {
        kind: EntityKind,
        name: String,
    },
    AlreadyExists {
        kind: EntityKind,
        name: String,
    },
    /// Device lock is held by another activity.
    DeviceBusy {
        locked_by: Option<ActivityId>,
    },
    /// Release attempted by an activity that does not hold the lock.
    LockNotHeld(ActivityId),
    ActivityNotFound(ActivityId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, name } => write!(f, "{kind} not found: {name}"),
            Self::AlreadyExists { kind, name } => write!(f, "{kind} already exists: {name}"),
            Self::DeviceBusy {
                locked_by: Some(id),
            } => write!(f, "device is locked by activity {id}"),
            Self::DeviceBusy { locked_by: None } => write!(f, "device is locked"),
            Self::LockNotHeld(id) => write!(f, "device lock is not held by activity {id}"),
            Self::ActivityNotFound(id) => write!(f, "running activity not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EntityValidationError> for RepoError {
    fn from(value: EntityValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
