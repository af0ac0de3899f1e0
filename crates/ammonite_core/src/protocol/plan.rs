//! Compiled motion plans.

use crate::model::pose::{Pose, SpeedProfile};
use serde::{Deserialize, Serialize};

/// One frame-resolved instruction for the motion executor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotionInstruction {
    Move { pose: Pose, speed: SpeedProfile },
    Wait { duration_ms: u64 },
}

impl MotionInstruction {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Wait { .. } => "wait",
        }
    }
}

/// Ordered, absolute instructions produced by one successful compilation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionPlan {
    instructions: Vec<MotionInstruction>,
}

impl MotionPlan {
    pub(crate) fn push(&mut self, instruction: MotionInstruction) {
        self.instructions.push(instruction);
    }

    pub fn instructions(&self) -> &[MotionInstruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MotionInstruction> {
        self.instructions.iter()
    }
}

impl<'a> IntoIterator for &'a MotionPlan {
    type Item = &'a MotionInstruction;
    type IntoIter = std::slice::Iter<'a, MotionInstruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}
