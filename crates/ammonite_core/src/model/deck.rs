//! Deck domain model.
//!
//! # Responsibility
//! - Define decks, their mounting locations and calibration transform.
//! - Provide the calibration state transition (`uncalibrated -> calibrated`).
//!
//! # Invariants
//! - A deck without calibration has no transform; composing poses requires a
//!   `DeckCalibration` value, so uncalibrated decks cannot leak into motion.
//! - Location names are unique within one deck.
//! - Recalibration overwrites the previous transform; there is no reset.

use crate::model::pose::{is_zero_quat, quat_wxyz, quat_wxyz_serde};
use crate::model::validation::{
    ensure_finite, ensure_name, EntityKind, EntityValidationError, UNIT_QUATERNION_TOLERANCE,
};
use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Transform mapping deck-local coordinates into the arm base frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeckCalibration {
    pub translation: DVec3,
    /// Serialized as `[w, x, y, z]`.
    #[serde(with = "quat_wxyz_serde")]
    pub rotation: DQuat,
}

impl DeckCalibration {
    pub fn new(translation: DVec3, rotation: DQuat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Builds a calibration from raw `x, y, z, qw, qx, qy, qz` components.
    #[allow(clippy::too_many_arguments)]
    pub fn from_components(x: f64, y: f64, z: f64, qw: f64, qx: f64, qy: f64, qz: f64) -> Self {
        Self::new(DVec3::new(x, y, z), quat_wxyz(qw, qx, qy, qz))
    }

    /// Checks finiteness and unit rotation for the named deck.
    pub fn validate(&self, deck: &str) -> Result<(), EntityValidationError> {
        let components = [
            ("x", self.translation.x),
            ("y", self.translation.y),
            ("z", self.translation.z),
            ("qw", self.rotation.w),
            ("qx", self.rotation.x),
            ("qy", self.rotation.y),
            ("qz", self.rotation.z),
        ];
        for (field, value) in components {
            ensure_finite(EntityKind::Deck, deck, field, value)?;
        }

        let norm = self.rotation.length();
        if (norm - 1.0).abs() > UNIT_QUATERNION_TOLERANCE {
            return Err(EntityValidationError::NonUnitRotation {
                deck: deck.to_string(),
                norm,
            });
        }
        Ok(())
    }
}

/// Named mounting slot on a deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    /// Offset from the deck origin, in the deck frame.
    pub offset: DVec3,
    /// Tool orientation for this slot as `[w, x, y, z]`; `None` inherits the
    /// deck rotation.
    #[serde(default, with = "quat_wxyz_serde::option")]
    pub orientation: Option<DQuat>,
}

impl Location {
    pub fn new(name: impl Into<String>, offset: DVec3) -> Self {
        Self {
            name: name.into(),
            offset,
            orientation: None,
        }
    }

    pub fn with_orientation(mut self, orientation: DQuat) -> Self {
        self.orientation = Some(orientation);
        self
    }
}

/// Deck read model with its locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub name: String,
    /// `None` until `SetDeckCalibration` has been applied.
    pub calibration: Option<DeckCalibration>,
    /// Locations in creation order.
    pub locations: Vec<Location>,
}

impl Deck {
    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    /// Finds one location by name.
    pub fn location(&self, name: &str) -> Option<&Location> {
        self.locations.iter().find(|location| location.name == name)
    }
}

/// Create input for a deck; new decks always start uncalibrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDeck {
    pub name: String,
    #[serde(default)]
    pub locations: Vec<Location>,
}

impl NewDeck {
    pub fn new(name: impl Into<String>, locations: Vec<Location>) -> Self {
        Self {
            name: name.into(),
            locations,
        }
    }

    /// Validates write-path invariants.
    pub fn validate(&self) -> Result<(), EntityValidationError> {
        ensure_name(EntityKind::Deck, &self.name)?;

        let mut seen = HashSet::with_capacity(self.locations.len());
        for location in &self.locations {
            ensure_name(EntityKind::Location, &location.name)?;
            ensure_finite(EntityKind::Location, &location.name, "x", location.offset.x)?;
            ensure_finite(EntityKind::Location, &location.name, "y", location.offset.y)?;
            ensure_finite(EntityKind::Location, &location.name, "z", location.offset.z)?;
            if let Some(orientation) = location.orientation {
                if !orientation.is_finite() {
                    return Err(EntityValidationError::NonFinite {
                        kind: EntityKind::Location,
                        name: location.name.clone(),
                        field: "orientation",
                    });
                }
                if is_zero_quat(orientation) {
                    return Err(EntityValidationError::ZeroOrientation {
                        deck: self.name.clone(),
                        location: location.name.clone(),
                    });
                }
            }
            if !seen.insert(location.name.as_str()) {
                return Err(EntityValidationError::DuplicateChild {
                    kind: EntityKind::Location,
                    parent: self.name.clone(),
                    name: location.name.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{DeckCalibration, Location, NewDeck};
    use crate::model::pose::quat_wxyz;
    use crate::model::validation::EntityValidationError;
    use glam::DVec3;

    #[test]
    fn calibration_accepts_near_unit_rotation() {
        let calibration = DeckCalibration::from_components(
            132.0,
            158.0,
            121.0,
            0.8063737663657652,
            -0.575080903948282,
            -0.13494466363153904,
            0.02886590702694046,
        );
        calibration.validate("deck").unwrap();
    }

    #[test]
    fn calibration_rejects_zero_rotation() {
        let calibration = DeckCalibration::from_components(0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(matches!(
            calibration.validate("deck"),
            Err(EntityValidationError::NonUnitRotation { .. })
        ));
    }

    #[test]
    fn new_deck_rejects_duplicate_locations_and_zero_orientation() {
        let duplicated = NewDeck::new(
            "deck",
            vec![
                Location::new("1", DVec3::ZERO),
                Location::new("1", DVec3::ONE),
            ],
        );
        assert!(matches!(
            duplicated.validate(),
            Err(EntityValidationError::DuplicateChild { .. })
        ));

        let zero = NewDeck::new(
            "deck",
            vec![Location::new("1", DVec3::ZERO).with_orientation(quat_wxyz(0.0, 0.0, 0.0, 0.0))],
        );
        assert!(matches!(
            zero.validate(),
            Err(EntityValidationError::ZeroOrientation { .. })
        ));
    }

    #[test]
    fn deck_description_reads_orientation_w_first() {
        let deck: NewDeck = serde_json::from_str(
            r#"{
                "name": "bench",
                "locations": [
                    {"name": "1", "offset": [0, 0, 0], "orientation": [1, 0, 0, 0]},
                    {"name": "2", "offset": [132.5, 0, 0]}
                ]
            }"#,
        )
        .unwrap();

        let orientation = deck.locations[0].orientation.unwrap();
        assert_eq!(orientation, glam::DQuat::IDENTITY);
        assert_eq!(deck.locations[1].orientation, None);

        let encoded = serde_json::to_value(&deck).unwrap();
        assert_eq!(
            encoded["locations"][0]["orientation"],
            serde_json::json!([1.0, 0.0, 0.0, 0.0])
        );
        assert_eq!(serde_json::from_value::<NewDeck>(encoded).unwrap(), deck);
    }

    #[test]
    fn calibration_rotation_serializes_w_first() {
        let calibration = DeckCalibration::from_components(1.0, 2.0, 3.0, 0.0, 1.0, 0.0, 0.0);
        let value = serde_json::to_value(calibration).unwrap();
        assert_eq!(value["rotation"], serde_json::json!([0.0, 1.0, 0.0, 0.0]));
    }
}
