//! Frame composition for well-relative motion.
//!
//! # Responsibility
//! - Combine deck calibration, location offset, well offset and labware
//!   height into absolute arm-base-frame poses.
//! - Own the clearance constant and the approach/insert/retract sequence.
//!
//! # Invariants
//! - Pure functions: no I/O, no logging, deterministic for equal inputs.
//! - Only a `DeckCalibration` can be composed, never an uncalibrated deck.
//! - Offsets are added in the deck frame; the calibration rotation selects the
//!   tool orientation and is not applied to offsets.
//! - Orientation: the location's own quaternion when present, else the deck's
//!   calibrated quaternion.

use crate::model::deck::{DeckCalibration, Location};
use crate::model::labware::{Labware, Well};
use crate::model::pose::Pose;
use glam::{DQuat, DVec3};

/// Vertical clearance kept above the labware top before descending.
pub const WELL_CLEARANCE: f64 = 5.0;

/// Poses above and inside one well.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WellPoses {
    /// Above the labware top by `WELL_CLEARANCE`.
    pub top: Pose,
    /// `depth_from_bottom` above the well bottom.
    pub bottom: Pose,
}

impl WellPoses {
    /// Approach, act, retract: `[top, bottom, top]`.
    pub fn approach_sequence(&self) -> [Pose; 3] {
        [self.top, self.bottom, self.top]
    }
}

/// Picks the tool orientation for motion at `location`.
pub fn resolve_orientation(calibration: &DeckCalibration, location: &Location) -> DQuat {
    location.orientation.unwrap_or(calibration.rotation)
}

/// Computes the poses above and inside `well` of `labware` mounted at
/// `location` on a calibrated deck.
pub fn compose_well_pose(
    calibration: &DeckCalibration,
    location: &Location,
    labware: &Labware,
    well: &Well,
    depth_from_bottom: f64,
) -> WellPoses {
    let location_offset = calibration.translation + location.offset;
    let well_x = location_offset.x + well.offset.x;
    let well_y = location_offset.y + well.offset.y;
    let well_floor = location_offset.z + well.offset.z;

    let rotation = resolve_orientation(calibration, location);
    let top = Pose::new(
        DVec3::new(
            well_x,
            well_y,
            well_floor + labware.z_dimension + WELL_CLEARANCE,
        ),
        rotation,
    );
    let bottom = Pose::new(
        DVec3::new(well_x, well_y, well_floor + depth_from_bottom),
        rotation,
    );

    WellPoses { top, bottom }
}

#[cfg(test)]
mod tests {
    use super::{compose_well_pose, resolve_orientation, WELL_CLEARANCE};
    use crate::model::deck::{DeckCalibration, Location};
    use crate::model::labware::{Labware, Well};
    use crate::model::pose::quat_wxyz;
    use glam::{DQuat, DVec3};

    const EPSILON: f64 = 1e-9;

    fn deck_calibration() -> DeckCalibration {
        DeckCalibration::from_components(
            132.0,
            158.0,
            121.0,
            0.8063737663657652,
            -0.575080903948282,
            -0.13494466363153904,
            0.02886590702694046,
        )
    }

    fn plate() -> Labware {
        Labware::new(
            "plate",
            10.0,
            vec![Well {
                address: "A1".to_string(),
                depth: 9.0,
                diameter: 5.0,
                offset: DVec3::new(14.38, 74.24, 0.92),
            }],
        )
    }

    #[test]
    fn composes_calibrated_scenario() {
        let calibration = deck_calibration();
        let location = Location::new("1", DVec3::ZERO);
        let labware = plate();
        let poses = compose_well_pose(&calibration, &location, &labware, &labware.wells[0], 1.0);

        assert!((poses.top.position.x - 146.38).abs() < EPSILON);
        assert!((poses.top.position.y - 232.24).abs() < EPSILON);
        assert!((poses.top.position.z - 136.92).abs() < EPSILON);
        assert!((poses.bottom.position.z - 122.92).abs() < EPSILON);
        assert_eq!(poses.top.rotation, calibration.rotation);
    }

    #[test]
    fn location_offset_is_added_before_well_offset() {
        let calibration = DeckCalibration::new(DVec3::new(10.0, 20.0, 30.0), DQuat::IDENTITY);
        let location = Location::new("2", DVec3::new(100.0, 0.0, -2.0));
        let labware = plate();
        let poses = compose_well_pose(&calibration, &location, &labware, &labware.wells[0], 0.0);

        assert!((poses.bottom.position.x - 124.38).abs() < EPSILON);
        assert!((poses.bottom.position.y - 94.24).abs() < EPSILON);
        assert!((poses.bottom.position.z - 28.92).abs() < EPSILON);
    }

    #[test]
    fn vertical_travel_depends_only_on_height_clearance_and_depth() {
        let calibration = deck_calibration();
        let location = Location::new("1", DVec3::new(3.0, 4.0, 5.0));
        let labware = plate();
        for depth in [0.0, 0.5, 2.0, 7.5] {
            let poses =
                compose_well_pose(&calibration, &location, &labware, &labware.wells[0], depth);
            let travel = poses.top.position.z - poses.bottom.position.z;
            assert!((travel - (labware.z_dimension + WELL_CLEARANCE - depth)).abs() < EPSILON);
            assert_eq!(poses.top.position.truncate(), poses.bottom.position.truncate());
        }
    }

    #[test]
    fn location_orientation_overrides_deck_rotation() {
        let calibration = deck_calibration();
        let tilted = quat_wxyz(0.0, 1.0, 0.0, 0.0);
        let location = Location::new("1", DVec3::ZERO).with_orientation(tilted);

        assert_eq!(resolve_orientation(&calibration, &location), tilted);
        assert_eq!(
            resolve_orientation(&calibration, &Location::new("1", DVec3::ZERO)),
            calibration.rotation
        );
    }

    #[test]
    fn approach_sequence_returns_to_top() {
        let calibration = deck_calibration();
        let location = Location::new("1", DVec3::ZERO);
        let labware = plate();
        let poses = compose_well_pose(&calibration, &location, &labware, &labware.wells[0], 1.0);
        let [approach, insert, retract] = poses.approach_sequence();

        assert_eq!(approach, retract);
        assert_eq!(insert, poses.bottom);
    }
}
