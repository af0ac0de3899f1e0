//! Entity kinds and write-path validation errors.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Kind of named layout entity, used in not-found and validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Deck,
    Labware,
    Location,
    Well,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deck => "deck",
            Self::Labware => "labware",
            Self::Location => "location",
            Self::Well => "well",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quaternion norm tolerance accepted for deck calibration rotations.
pub const UNIT_QUATERNION_TOLERANCE: f64 = 1e-3;

/// Validation errors raised before a layout entity is persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityValidationError {
    /// Name or well address is empty after trim.
    BlankName(EntityKind),
    /// A numeric field is NaN or infinite.
    NonFinite {
        kind: EntityKind,
        name: String,
        field: &'static str,
    },
    /// A dimension field is below zero.
    Negative {
        kind: EntityKind,
        name: String,
        field: &'static str,
    },
    /// Two children of the same parent share one name/address.
    DuplicateChild {
        kind: EntityKind,
        parent: String,
        name: String,
    },
    /// Location orientation quaternion has zero length.
    ZeroOrientation { deck: String, location: String },
    /// Calibration rotation is not a unit quaternion.
    NonUnitRotation { deck: String, norm: f64 },
}

impl Display for EntityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName(kind) => write!(f, "{kind} name must not be blank"),
            Self::NonFinite { kind, name, field } => {
                write!(f, "{kind} `{name}` has non-finite `{field}`")
            }
            Self::Negative { kind, name, field } => {
                write!(f, "{kind} `{name}` has negative `{field}`")
            }
            Self::DuplicateChild { kind, parent, name } => {
                write!(f, "duplicate {kind} `{name}` in `{parent}`")
            }
            Self::ZeroOrientation { deck, location } => write!(
                f,
                "location `{location}` on deck `{deck}` has a zero-length orientation"
            ),
            Self::NonUnitRotation { deck, norm } => write!(
                f,
                "calibration rotation for deck `{deck}` must be a unit quaternion, got norm {norm}"
            ),
        }
    }
}

impl Error for EntityValidationError {}

pub(crate) fn ensure_name(kind: EntityKind, name: &str) -> Result<(), EntityValidationError> {
    if name.trim().is_empty() {
        return Err(EntityValidationError::BlankName(kind));
    }
    Ok(())
}

pub(crate) fn ensure_finite(
    kind: EntityKind,
    name: &str,
    field: &'static str,
    value: f64,
) -> Result<(), EntityValidationError> {
    if !value.is_finite() {
        return Err(EntityValidationError::NonFinite {
            kind,
            name: name.to_string(),
            field,
        });
    }
    Ok(())
}

pub(crate) fn ensure_non_negative(
    kind: EntityKind,
    name: &str,
    field: &'static str,
    value: f64,
) -> Result<(), EntityValidationError> {
    ensure_finite(kind, name, field, value)?;
    if value < 0.0 {
        return Err(EntityValidationError::Negative {
            kind,
            name: name.to_string(),
            field,
        });
    }
    Ok(())
}
