//! Recording arm used for dry runs and tests.

use crate::model::pose::{Pose, SpeedProfile};
use crate::protocol::executor::{MotionError, MotionExecutor};
use crate::protocol::plan::MotionInstruction;

/// In-process arm that records every accepted instruction.
///
/// Waits are recorded, not slept. A failure can be injected at a given
/// instruction index, and moves beyond `reach` from the base origin are
/// rejected as unreachable.
#[derive(Debug, Clone, Default)]
pub struct SimulatedArm {
    executed: Vec<MotionInstruction>,
    attempts: usize,
    fail_at: Option<(usize, String)>,
    reach: Option<f64>,
}

impl SimulatedArm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the instruction at `index` with a device error.
    pub fn with_failure_at(mut self, index: usize, message: impl Into<String>) -> Self {
        self.fail_at = Some((index, message.into()));
        self
    }

    /// Rejects moves farther than `radius` from the base origin.
    pub fn with_reach(mut self, radius: f64) -> Self {
        self.reach = Some(radius);
        self
    }

    pub fn executed(&self) -> &[MotionInstruction] {
        &self.executed
    }

    /// Pose of the last accepted move.
    pub fn current_pose(&self) -> Option<Pose> {
        self.executed.iter().rev().find_map(|instruction| match instruction {
            MotionInstruction::Move { pose, .. } => Some(*pose),
            MotionInstruction::Wait { .. } => None,
        })
    }

    /// Total wait time requested so far.
    pub fn waited_ms(&self) -> u64 {
        self.executed
            .iter()
            .map(|instruction| match instruction {
                MotionInstruction::Wait { duration_ms } => *duration_ms,
                MotionInstruction::Move { .. } => 0,
            })
            .sum()
    }

    fn begin_attempt(&mut self) -> Result<(), MotionError> {
        let index = self.attempts;
        self.attempts += 1;
        match &self.fail_at {
            Some((fail_index, message)) if *fail_index == index => {
                Err(MotionError::Device(message.clone()))
            }
            _ => Ok(()),
        }
    }
}

impl MotionExecutor for SimulatedArm {
    fn move_to(&mut self, speed: &SpeedProfile, pose: &Pose) -> Result<(), MotionError> {
        self.begin_attempt()?;
        if let Some(radius) = self.reach {
            let distance = pose.position.length();
            if distance > radius {
                return Err(MotionError::Unreachable(format!(
                    "distance {distance:.2} exceeds reach {radius:.2}"
                )));
            }
        }
        self.executed.push(MotionInstruction::Move {
            pose: *pose,
            speed: *speed,
        });
        Ok(())
    }

    fn wait(&mut self, duration_ms: u64) -> Result<(), MotionError> {
        self.begin_attempt()?;
        self.executed.push(MotionInstruction::Wait { duration_ms });
        Ok(())
    }
}
