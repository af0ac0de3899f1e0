//! Compile-time error taxonomy.

use crate::model::validation::EntityKind;
use crate::repo::error::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors that abort protocol compilation.
///
/// All variants are validation failures except `Repo`; none leave partial
/// state behind because compilation performs no writes.
#[derive(Debug)]
pub enum CompileError {
    /// Named deck or labware does not exist.
    EntityNotFound { kind: EntityKind, name: String },
    /// Deck exists but has no calibration transform.
    DeckNotCalibrated { deck: String },
    LocationNotFound { deck: String, location: String },
    WellNotFound { labware: String, address: String },
    /// Command tag is not one of `movexyz`, `move`, `wait`.
    UnknownCommand { tag: String },
    /// Command at `index` is missing its tag or has invalid fields.
    MalformedCommand { index: usize, message: String },
    /// Snapshot could not be opened, read or released.
    Repo(RepoError),
}

impl CompileError {
    /// Stable machine-readable code for logs and API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EntityNotFound { .. } => "entity_not_found",
            Self::DeckNotCalibrated { .. } => "deck_not_calibrated",
            Self::LocationNotFound { .. } => "location_not_found",
            Self::WellNotFound { .. } => "well_not_found",
            Self::UnknownCommand { .. } => "unknown_command",
            Self::MalformedCommand { .. } => "malformed_command",
            Self::Repo(_) => "repo_error",
        }
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EntityNotFound { kind, name } => write!(f, "{kind} not found: {name}"),
            Self::DeckNotCalibrated { deck } => {
                write!(f, "deck `{deck}` must be calibrated before moving to its wells")
            }
            Self::LocationNotFound { deck, location } => {
                write!(f, "location `{location}` not found on deck `{deck}`")
            }
            Self::WellNotFound { labware, address } => {
                write!(f, "well `{address}` not found in labware `{labware}`")
            }
            Self::UnknownCommand { tag } => write!(
                f,
                "unknown command `{tag}`; expected one of movexyz, move, wait"
            ),
            Self::MalformedCommand { index, message } => {
                write!(f, "command {index} is malformed: {message}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CompileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CompileError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}
