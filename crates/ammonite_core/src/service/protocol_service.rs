//! Protocol run coordinator.
//!
//! # Responsibility
//! - Offer dry-run compilation without touching the device lock.
//! - Run protocols under the device lock and record their outcome.
//!
//! # Invariants
//! - A run holds the device lock from before compilation until its outcome
//!   is recorded.
//! - Every acquired lock is released, with `FAILED` when compilation or
//!   execution fails.
//! - The executor only sees fully compiled plans.

use crate::protocol::command::{protocol_to_json, Command};
use crate::protocol::compiler::ProtocolCompiler;
use crate::protocol::error::CompileError;
use crate::protocol::executor::{execute_plan, ExecutionError, MotionExecutor};
use crate::protocol::plan::MotionPlan;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::lock_repo::{ActivityId, ActivityOutcome, ActivityRecord, DeviceLockRepository};
use crate::repo::snapshot::EntityRepository;
use log::{error, info};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Result of one completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub activity: ActivityId,
    pub plan: MotionPlan,
}

/// Failure of one run.
#[derive(Debug)]
pub enum ProtocolRunError {
    /// Lock could not be acquired or released.
    Lock(RepoError),
    Compile {
        activity: ActivityId,
        source: CompileError,
    },
    Execution {
        activity: ActivityId,
        source: ExecutionError,
    },
}

impl ProtocolRunError {
    /// Activity recorded for this run, when the lock was acquired.
    pub fn activity(&self) -> Option<ActivityId> {
        match self {
            Self::Lock(_) => None,
            Self::Compile { activity, .. } | Self::Execution { activity, .. } => Some(*activity),
        }
    }
}

impl Display for ProtocolRunError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lock(err) => write!(f, "{err}"),
            Self::Compile { activity, source } => {
                write!(f, "activity {activity} failed to compile: {source}")
            }
            Self::Execution { activity, source } => {
                write!(f, "activity {activity} failed during execution: {source}")
            }
        }
    }
}

impl Error for ProtocolRunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Lock(err) => Some(err),
            Self::Compile { source, .. } => Some(source),
            Self::Execution { source, .. } => Some(source),
        }
    }
}

/// Coordinates compilation, the device lock and execution.
pub struct ProtocolService<R: EntityRepository, L: DeviceLockRepository> {
    entities: R,
    locks: L,
    compiler: ProtocolCompiler,
}

impl<R: EntityRepository, L: DeviceLockRepository> ProtocolService<R, L> {
    pub fn new(entities: R, locks: L) -> Self {
        Self::with_compiler(entities, locks, ProtocolCompiler::default())
    }

    pub fn with_compiler(entities: R, locks: L, compiler: ProtocolCompiler) -> Self {
        Self {
            entities,
            locks,
            compiler,
        }
    }

    /// Compiles without acquiring the device lock or executing.
    pub fn dry_run(&self, commands: &[Command]) -> Result<MotionPlan, CompileError> {
        self.compiler.compile(&self.entities, commands)
    }

    /// Runs `commands` on `executor` under the device lock.
    ///
    /// # Errors
    /// - `Lock(DeviceBusy)` when another activity holds the lock.
    /// - `Compile` / `Execution` after the activity was recorded as `FAILED`.
    pub fn run<E: MotionExecutor + ?Sized>(
        &self,
        commands: &[Command],
        executor: &mut E,
    ) -> Result<RunReport, ProtocolRunError> {
        let started_at = Instant::now();
        let activity = self
            .locks
            .acquire_device_lock(&protocol_to_json(commands))
            .map_err(ProtocolRunError::Lock)?;

        let plan = match self.compiler.compile(&self.entities, commands) {
            Ok(plan) => plan,
            Err(source) => {
                self.finish(activity, ActivityOutcome::Failed, Some(&source.to_string()));
                return Err(ProtocolRunError::Compile { activity, source });
            }
        };

        if let Err(source) = execute_plan(executor, &plan) {
            self.finish(activity, ActivityOutcome::Failed, Some(&source.to_string()));
            return Err(ProtocolRunError::Execution { activity, source });
        }

        self.locks
            .release_device_lock(activity, ActivityOutcome::Completed, None)
            .map_err(ProtocolRunError::Lock)?;
        info!(
            "event=protocol_run module=service status=ok activity={} duration_ms={} instructions={}",
            activity,
            started_at.elapsed().as_millis(),
            plan.len()
        );
        Ok(RunReport { activity, plan })
    }

    /// Clears a lock left behind by an interrupted process.
    pub fn recover_stale_lock(&self) -> RepoResult<usize> {
        self.locks.recover_stale_lock()
    }

    pub fn activity(&self, id: ActivityId) -> RepoResult<Option<ActivityRecord>> {
        self.locks.get_activity(id)
    }

    pub fn recent_activities(&self, limit: u32) -> RepoResult<Vec<ActivityRecord>> {
        self.locks.list_activities(limit)
    }

    // The run error takes precedence over a failed release.
    fn finish(&self, activity: ActivityId, outcome: ActivityOutcome, message: Option<&str>) {
        if let Err(err) = self.locks.release_device_lock(activity, outcome, message) {
            error!(
                "event=protocol_run module=service status=error activity={} error_code=release_failed error={}",
                activity, err
            );
        }
    }
}
