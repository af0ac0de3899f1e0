//! Protocol command input.
//!
//! # Responsibility
//! - Decode the tagged JSON command list submitted by callers.
//! - Encode commands back to the same wire shape for the activity log.
//!
//! # Invariants
//! - The tag field is `command`; accepted tags are `movexyz`, `move`, `wait`.
//! - An unknown tag fails with `UnknownCommand`; any other shape problem fails
//!   with `MalformedCommand` naming the command index.
//! - `movexyz` without any quaternion field uses the identity orientation.

use crate::model::pose::{quat_wxyz, Pose};
use crate::protocol::error::CompileError;
use glam::{DQuat, DVec3};
use serde::Deserialize;
use serde_json::{json, Value};

const TAG_FIELD: &str = "command";
const MOVE_XYZ_TAG: &str = "movexyz";
const MOVE_TO_WELL_TAG: &str = "move";
const WAIT_TAG: &str = "wait";
const MIN_QUATERNION_NORM: f64 = 1e-9;

/// One protocol step.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Move directly to an absolute arm-frame pose.
    MoveXyz(Pose),
    /// Visit a well: approach from above, descend, retract.
    MoveToWell(MoveToWell),
    /// Pause the arm.
    Wait { duration_ms: u64 },
}

/// Target of a `move` command.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveToWell {
    pub deck: String,
    pub location: String,
    pub labware: String,
    pub address: String,
    /// Distance above the well bottom for the insert pose.
    pub depth_from_bottom: f64,
}

impl Command {
    /// Wire tag of this command.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::MoveXyz(_) => MOVE_XYZ_TAG,
            Self::MoveToWell(_) => MOVE_TO_WELL_TAG,
            Self::Wait { .. } => WAIT_TAG,
        }
    }

    /// Encodes this command in its wire shape.
    pub fn to_json(&self) -> Value {
        match self {
            Self::MoveXyz(pose) => json!({
                TAG_FIELD: MOVE_XYZ_TAG,
                "x": pose.position.x,
                "y": pose.position.y,
                "z": pose.position.z,
                "qw": pose.rotation.w,
                "qx": pose.rotation.x,
                "qy": pose.rotation.y,
                "qz": pose.rotation.z,
            }),
            Self::MoveToWell(target) => json!({
                TAG_FIELD: MOVE_TO_WELL_TAG,
                "deck": target.deck,
                "location": target.location,
                "labware_name": target.labware,
                "address": target.address,
                "depth_from_bottom": target.depth_from_bottom,
            }),
            Self::Wait { duration_ms } => json!({
                TAG_FIELD: WAIT_TAG,
                "duration_ms": duration_ms,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MoveXyzInput {
    x: f64,
    y: f64,
    z: f64,
    #[serde(default)]
    qw: Option<f64>,
    #[serde(default)]
    qx: Option<f64>,
    #[serde(default)]
    qy: Option<f64>,
    #[serde(default)]
    qz: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MoveToWellInput {
    #[serde(alias = "name")]
    deck: String,
    location: String,
    labware_name: String,
    address: String,
    depth_from_bottom: f64,
}

#[derive(Debug, Deserialize)]
struct WaitInput {
    duration_ms: u64,
}

/// Parses a JSON array of tagged commands.
pub fn parse_protocol(text: &str) -> Result<Vec<Command>, CompileError> {
    let value: Value = serde_json::from_str(text).map_err(|err| CompileError::MalformedCommand {
        index: 0,
        message: format!("protocol is not valid JSON: {err}"),
    })?;
    let Value::Array(items) = value else {
        return Err(CompileError::MalformedCommand {
            index: 0,
            message: "protocol must be a JSON array of commands".to_string(),
        });
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| parse_command(index, item))
        .collect()
}

/// Parses one tagged command object found at `index`.
pub fn parse_command(index: usize, value: Value) -> Result<Command, CompileError> {
    let malformed = |message: String| CompileError::MalformedCommand { index, message };

    let Value::Object(mut object) = value else {
        return Err(malformed("command must be a JSON object".to_string()));
    };
    let tag = match object.remove(TAG_FIELD) {
        Some(Value::String(tag)) => tag,
        Some(_) => return Err(malformed(format!("`{TAG_FIELD}` must be a string"))),
        None => return Err(malformed(format!("missing `{TAG_FIELD}` field"))),
    };
    let fields = Value::Object(object);

    match tag.as_str() {
        MOVE_XYZ_TAG => {
            let input: MoveXyzInput =
                serde_json::from_value(fields).map_err(|err| malformed(err.to_string()))?;
            move_xyz_pose(&input).map(Command::MoveXyz).map_err(malformed)
        }
        MOVE_TO_WELL_TAG => {
            let input: MoveToWellInput =
                serde_json::from_value(fields).map_err(|err| malformed(err.to_string()))?;
            if !input.depth_from_bottom.is_finite() || input.depth_from_bottom < 0.0 {
                return Err(malformed(format!(
                    "depth_from_bottom must be a finite non-negative number, got {}",
                    input.depth_from_bottom
                )));
            }
            Ok(Command::MoveToWell(MoveToWell {
                deck: input.deck,
                location: input.location,
                labware: input.labware_name,
                address: input.address,
                depth_from_bottom: input.depth_from_bottom,
            }))
        }
        WAIT_TAG => {
            let input: WaitInput =
                serde_json::from_value(fields).map_err(|err| malformed(err.to_string()))?;
            Ok(Command::Wait {
                duration_ms: input.duration_ms,
            })
        }
        _ => Err(CompileError::UnknownCommand { tag }),
    }
}

/// Encodes a command list as the JSON array accepted by `parse_protocol`.
pub fn protocol_to_json(commands: &[Command]) -> String {
    Value::Array(commands.iter().map(Command::to_json).collect()).to_string()
}

fn move_xyz_pose(input: &MoveXyzInput) -> Result<Pose, String> {
    let position = DVec3::new(input.x, input.y, input.z);
    if !position.is_finite() {
        return Err("x, y and z must be finite".to_string());
    }

    let rotation = match (input.qw, input.qx, input.qy, input.qz) {
        (None, None, None, None) => DQuat::IDENTITY,
        (Some(w), Some(x), Some(y), Some(z)) => {
            let q = quat_wxyz(w, x, y, z);
            if !q.is_finite() {
                return Err("qw, qx, qy and qz must be finite".to_string());
            }
            if q.length() < MIN_QUATERNION_NORM {
                return Err("orientation quaternion must not be zero".to_string());
            }
            q
        }
        _ => {
            return Err("orientation needs all of qw, qx, qy, qz or none of them".to_string());
        }
    };

    Ok(Pose::new(position, rotation))
}
