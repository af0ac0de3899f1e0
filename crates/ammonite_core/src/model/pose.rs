//! Absolute arm poses and motion speed settings.
//!
//! Poses are expressed in the arm base frame. Position and rotation use
//! `glam` double-precision types; the arm controller owns kinematics.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// Absolute tool pose in the arm base frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: DVec3,
    /// Serialized as `[w, x, y, z]`.
    #[serde(with = "quat_wxyz_serde")]
    pub rotation: DQuat,
}

impl Pose {
    pub fn new(position: DVec3, rotation: DQuat) -> Self {
        Self { position, rotation }
    }
}

/// Speed and ramp settings passed with every move.
///
/// Units follow the arm controller: `speed` is a percentage of maximum joint
/// speed, ramp durations and speeds are percentages of the move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedProfile {
    pub speed: u8,
    pub accel_duration: u8,
    pub accel_speed: u8,
    pub decel_duration: u8,
    pub decel_speed: u8,
}

impl Default for SpeedProfile {
    fn default() -> Self {
        Self {
            speed: 25,
            accel_duration: 10,
            accel_speed: 10,
            decel_duration: 10,
            decel_speed: 10,
        }
    }
}

/// Builds a quaternion from `w, x, y, z` components, the order used in
/// storage and in command input.
pub fn quat_wxyz(w: f64, x: f64, y: f64, z: f64) -> DQuat {
    DQuat::from_xyzw(x, y, z, w)
}

/// Returns true when every component of `q` is exactly zero.
///
/// Zero quaternions mark "no orientation stored" in legacy rows.
pub fn is_zero_quat(q: DQuat) -> bool {
    q.x == 0.0 && q.y == 0.0 && q.z == 0.0 && q.w == 0.0
}

/// Serde adapter writing quaternions as `[w, x, y, z]` arrays.
///
/// Matches the component order of `quat_wxyz`, the `qw..qz` command fields
/// and the storage columns.
pub mod quat_wxyz_serde {
    use super::quat_wxyz;
    use glam::DQuat;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(q: &DQuat, serializer: S) -> Result<S::Ok, S::Error> {
        [q.w, q.x, q.y, q.z].serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DQuat, D::Error> {
        let [w, x, y, z] = <[f64; 4]>::deserialize(deserializer)?;
        Ok(quat_wxyz(w, x, y, z))
    }

    /// Same layout for optional quaternions; `null` is `None`.
    pub mod option {
        use super::super::quat_wxyz;
        use glam::DQuat;
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        pub fn serialize<S: Serializer>(
            q: &Option<DQuat>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            q.map(|q| [q.w, q.x, q.y, q.z]).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DQuat>, D::Error> {
            let components = Option::<[f64; 4]>::deserialize(deserializer)?;
            Ok(components.map(|[w, x, y, z]| quat_wxyz(w, x, y, z)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{is_zero_quat, quat_wxyz, Pose, SpeedProfile};
    use glam::DVec3;

    #[test]
    fn quat_wxyz_maps_components_in_order() {
        let q = quat_wxyz(0.5, 0.1, 0.2, 0.3);
        assert_eq!((q.w, q.x, q.y, q.z), (0.5, 0.1, 0.2, 0.3));
    }

    #[test]
    fn zero_quat_detection_ignores_identity() {
        assert!(is_zero_quat(quat_wxyz(0.0, 0.0, 0.0, 0.0)));
        assert!(!is_zero_quat(quat_wxyz(1.0, 0.0, 0.0, 0.0)));
    }

    #[test]
    fn default_speed_profile_matches_controller_defaults() {
        let profile = SpeedProfile::default();
        assert_eq!(profile.speed, 25);
        assert_eq!(profile.decel_speed, 10);
    }

    #[test]
    fn pose_rotation_serializes_w_first() {
        let pose = Pose::new(DVec3::new(1.0, 2.0, 3.0), quat_wxyz(0.5, 0.1, 0.2, 0.3));
        let value = serde_json::to_value(pose).unwrap();
        assert_eq!(value["rotation"], serde_json::json!([0.5, 0.1, 0.2, 0.3]));

        let decoded: Pose = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, pose);
    }
}
