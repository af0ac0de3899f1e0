//! Core of the pipetting-arm protocol compiler.
//! Stores deck and labware layouts and compiles protocols into motion plans.

pub mod config;
pub mod db;
pub mod frame;
pub mod logging;
pub mod model;
pub mod protocol;
pub mod repo;
pub mod service;

pub use config::{CoreConfig, DatabaseLocation};
pub use frame::{compose_well_pose, WellPoses, WELL_CLEARANCE};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::deck::{Deck, DeckCalibration, Location, NewDeck};
pub use model::labware::{Labware, LabwareImportError, Well};
pub use model::pose::{Pose, SpeedProfile};
pub use model::validation::{EntityKind, EntityValidationError};
pub use protocol::command::{parse_protocol, Command, MoveToWell};
pub use protocol::compiler::{compile, ProtocolCompiler};
pub use protocol::error::CompileError;
pub use protocol::executor::{execute_plan, ExecutionError, MotionError, MotionExecutor};
pub use protocol::plan::{MotionInstruction, MotionPlan};
pub use protocol::simulated::SimulatedArm;
pub use repo::deck_repo::{DeckRepository, SqliteDeckRepository};
pub use repo::error::{RepoError, RepoResult};
pub use repo::labware_repo::{LabwareRepository, SqliteLabwareRepository};
pub use repo::lock_repo::{
    ActivityId, ActivityOutcome, ActivityRecord, ActivityStatus, DeviceLockRepository,
    SqliteDeviceLockRepository,
};
pub use repo::memory::InMemoryEntityRepository;
pub use repo::snapshot::{EntityLookup, EntityRepository, ReadSnapshot, SqliteEntityRepository};
pub use service::deck_service::DeckService;
pub use service::labware_service::{LabwareImportServiceError, LabwareService, SeedReport};
pub use service::protocol_service::{ProtocolRunError, ProtocolService, RunReport};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
