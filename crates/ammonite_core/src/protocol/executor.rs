//! Motion executor boundary.
//!
//! # Responsibility
//! - Define the arm-facing contract that consumes compiled instructions.
//! - Run a plan in order and report the first failing instruction.
//!
//! # Invariants
//! - Instructions are dispatched strictly in plan order.
//! - Dispatch stops at the first failure; later instructions are not sent.

use crate::model::pose::{Pose, SpeedProfile};
use crate::protocol::plan::{MotionInstruction, MotionPlan};
use log::{debug, error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Failure reported by an arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MotionError {
    /// Pose is outside the arm's workspace.
    Unreachable(String),
    /// Controller rejected or aborted the instruction.
    Device(String),
    Disconnected,
}

impl Display for MotionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreachable(message) => write!(f, "pose unreachable: {message}"),
            Self::Device(message) => write!(f, "arm error: {message}"),
            Self::Disconnected => write!(f, "arm is disconnected"),
        }
    }
}

impl Error for MotionError {}

/// Arm capable of running compiled instructions.
pub trait MotionExecutor {
    fn move_to(&mut self, speed: &SpeedProfile, pose: &Pose) -> Result<(), MotionError>;
    fn wait(&mut self, duration_ms: u64) -> Result<(), MotionError>;
}

impl<E: MotionExecutor + ?Sized> MotionExecutor for &mut E {
    fn move_to(&mut self, speed: &SpeedProfile, pose: &Pose) -> Result<(), MotionError> {
        (**self).move_to(speed, pose)
    }

    fn wait(&mut self, duration_ms: u64) -> Result<(), MotionError> {
        (**self).wait(duration_ms)
    }
}

/// First instruction of a plan that the arm failed to run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionError {
    /// Zero-based index into the plan.
    pub index: usize,
    pub instruction: MotionInstruction,
    pub cause: MotionError,
}

impl Display for ExecutionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "instruction {} ({}) failed: {}",
            self.index,
            self.instruction.kind(),
            self.cause
        )
    }
}

impl Error for ExecutionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.cause)
    }
}

/// Sends every instruction of `plan` to `executor` in order.
///
/// # Errors
/// Returns the index, instruction and cause of the first failure.
pub fn execute_plan<E: MotionExecutor + ?Sized>(
    executor: &mut E,
    plan: &MotionPlan,
) -> Result<(), ExecutionError> {
    let started_at = Instant::now();
    for (index, instruction) in plan.iter().enumerate() {
        debug!(
            "event=plan_step module=protocol index={} kind={}",
            index,
            instruction.kind()
        );
        let dispatched = match instruction {
            MotionInstruction::Move { pose, speed } => executor.move_to(speed, pose),
            MotionInstruction::Wait { duration_ms } => executor.wait(*duration_ms),
        };
        if let Err(cause) = dispatched {
            error!(
                "event=plan_execute module=protocol status=error duration_ms={} failed_index={} error={}",
                started_at.elapsed().as_millis(),
                index,
                cause
            );
            return Err(ExecutionError {
                index,
                instruction: *instruction,
                cause,
            });
        }
    }

    info!(
        "event=plan_execute module=protocol status=ok duration_ms={} instructions={}",
        started_at.elapsed().as_millis(),
        plan.len()
    );
    Ok(())
}
