//! Protocol compilation and plan execution.
//!
//! # Responsibility
//! - Parse submitted command lists into the closed `Command` union.
//! - Compile commands against a read snapshot into an ordered `MotionPlan`.
//! - Drive a `MotionExecutor` through a compiled plan.
//!
//! # Invariants
//! - Compilation never writes and never touches hardware.
//! - Execution only ever receives a fully compiled plan.
//! - Instruction order is preserved from compilation through execution.

pub mod command;
pub mod compiler;
pub mod error;
pub mod executor;
pub mod plan;
pub mod simulated;
