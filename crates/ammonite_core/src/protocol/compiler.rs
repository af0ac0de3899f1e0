//! Protocol compiler.
//!
//! # Responsibility
//! - Resolve every named deck, location, labware and well against one read
//!   snapshot and emit a `MotionPlan`.
//!
//! # Invariants
//! - All lookups of one compilation see the same snapshot.
//! - The first failing command aborts compilation; no partial plan escapes.
//! - Equal commands against equal state compile to equal plans.
//! - Compilation performs no writes.

use crate::frame::compose_well_pose;
use crate::model::pose::{Pose, SpeedProfile};
use crate::model::validation::EntityKind;
use crate::protocol::command::{Command, MoveToWell};
use crate::protocol::error::CompileError;
use crate::protocol::plan::{MotionInstruction, MotionPlan};
use crate::repo::snapshot::{EntityLookup, EntityRepository, ReadSnapshot};
use log::{debug, info, warn};
use std::time::Instant;

/// Compiles protocols with one speed profile for every emitted move.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolCompiler {
    speed: SpeedProfile,
}

impl ProtocolCompiler {
    pub fn new(speed: SpeedProfile) -> Self {
        Self { speed }
    }

    pub fn speed(&self) -> SpeedProfile {
        self.speed
    }

    /// Opens one snapshot on `repo`, compiles `commands` against it, and
    /// releases the snapshot.
    ///
    /// # Errors
    /// - Lookup failures as the matching `CompileError` variant.
    /// - `CompileError::Repo` when the snapshot cannot be opened or released.
    pub fn compile<R: EntityRepository>(
        &self,
        repo: &R,
        commands: &[Command],
    ) -> Result<MotionPlan, CompileError> {
        let started_at = Instant::now();
        debug!(
            "event=protocol_compile module=protocol status=start commands={}",
            commands.len()
        );
        let result = self.compile_with_snapshot(repo, commands);
        let duration_ms = started_at.elapsed().as_millis();

        match &result {
            Ok(plan) => info!(
                "event=protocol_compile module=protocol status=ok duration_ms={} commands={} instructions={}",
                duration_ms,
                commands.len(),
                plan.len()
            ),
            Err(err) => warn!(
                "event=protocol_compile module=protocol status=error duration_ms={} commands={} error_code={} error={}",
                duration_ms,
                commands.len(),
                err.code(),
                err
            ),
        }
        result
    }

    fn compile_with_snapshot<R: EntityRepository>(
        &self,
        repo: &R,
        commands: &[Command],
    ) -> Result<MotionPlan, CompileError> {
        let snapshot = repo.read_snapshot()?;
        // On error the snapshot is dropped, which rolls back as well.
        let plan = self.compile_in(&snapshot, commands)?;
        snapshot.release()?;
        Ok(plan)
    }

    /// Compiles `commands` against an already-open lookup.
    pub fn compile_in<L: EntityLookup + ?Sized>(
        &self,
        lookup: &L,
        commands: &[Command],
    ) -> Result<MotionPlan, CompileError> {
        let mut plan = MotionPlan::default();
        for command in commands {
            match command {
                Command::MoveXyz(pose) => plan.push(MotionInstruction::Move {
                    pose: *pose,
                    speed: self.speed,
                }),
                Command::MoveToWell(target) => {
                    for pose in resolve_well_target(lookup, target)? {
                        plan.push(MotionInstruction::Move {
                            pose,
                            speed: self.speed,
                        });
                    }
                }
                Command::Wait { duration_ms } => plan.push(MotionInstruction::Wait {
                    duration_ms: *duration_ms,
                }),
            }
        }
        Ok(plan)
    }
}

/// Compiles with the default speed profile.
pub fn compile<R: EntityRepository>(
    repo: &R,
    commands: &[Command],
) -> Result<MotionPlan, CompileError> {
    ProtocolCompiler::default().compile(repo, commands)
}

fn resolve_well_target<L: EntityLookup + ?Sized>(
    lookup: &L,
    target: &MoveToWell,
) -> Result<[Pose; 3], CompileError> {
    let deck = lookup
        .get_deck(&target.deck)?
        .ok_or_else(|| CompileError::EntityNotFound {
            kind: EntityKind::Deck,
            name: target.deck.clone(),
        })?;
    let calibration = deck
        .calibration
        .ok_or_else(|| CompileError::DeckNotCalibrated {
            deck: deck.name.clone(),
        })?;
    let location = deck
        .location(&target.location)
        .ok_or_else(|| CompileError::LocationNotFound {
            deck: deck.name.clone(),
            location: target.location.clone(),
        })?;

    let labware = lookup
        .get_labware(&target.labware)?
        .ok_or_else(|| CompileError::EntityNotFound {
            kind: EntityKind::Labware,
            name: target.labware.clone(),
        })?;
    let well = labware
        .well(&target.address)
        .ok_or_else(|| CompileError::WellNotFound {
            labware: labware.name.clone(),
            address: target.address.clone(),
        })?;

    let poses = compose_well_pose(
        &calibration,
        location,
        &labware,
        well,
        target.depth_from_bottom,
    );
    Ok(poses.approach_sequence())
}

#[cfg(test)]
mod tests {
    use super::ProtocolCompiler;
    use crate::model::deck::{DeckCalibration, Location, NewDeck};
    use crate::model::labware::{Labware, Well};
    use crate::model::pose::SpeedProfile;
    use crate::protocol::command::{Command, MoveToWell};
    use crate::protocol::error::CompileError;
    use crate::protocol::plan::MotionInstruction;
    use crate::repo::deck_repo::DeckRepository;
    use crate::repo::labware_repo::LabwareRepository;
    use crate::repo::memory::InMemoryEntityRepository;
    use glam::{DQuat, DVec3};

    fn seeded_repo() -> InMemoryEntityRepository {
        let repo = InMemoryEntityRepository::new();
        repo.create_deck(&NewDeck::new("bench", vec![Location::new("1", DVec3::ZERO)]))
            .unwrap();
        repo.create_labware(&Labware::new(
            "plate",
            10.0,
            vec![Well {
                address: "A1".to_string(),
                depth: 9.0,
                diameter: 5.0,
                offset: DVec3::new(1.0, 2.0, 0.5),
            }],
        ))
        .unwrap();
        repo
    }

    fn visit(depth: f64) -> Command {
        Command::MoveToWell(MoveToWell {
            deck: "bench".to_string(),
            location: "1".to_string(),
            labware: "plate".to_string(),
            address: "A1".to_string(),
            depth_from_bottom: depth,
        })
    }

    #[test]
    fn uncalibrated_deck_is_rejected() {
        let repo = seeded_repo();
        let err = ProtocolCompiler::default()
            .compile(&repo, &[visit(1.0)])
            .unwrap_err();
        assert!(matches!(err, CompileError::DeckNotCalibrated { ref deck } if deck == "bench"));
    }

    #[test]
    fn custom_speed_profile_is_applied_to_every_move() {
        let repo = seeded_repo();
        repo.set_deck_calibration("bench", &DeckCalibration::new(DVec3::ZERO, DQuat::IDENTITY))
            .unwrap();
        let speed = SpeedProfile {
            speed: 50,
            ..SpeedProfile::default()
        };

        let plan = ProtocolCompiler::new(speed)
            .compile(&repo, &[visit(1.0), Command::Wait { duration_ms: 10 }])
            .unwrap();

        assert_eq!(plan.len(), 4);
        for instruction in plan.iter().take(3) {
            assert!(matches!(instruction, MotionInstruction::Move { speed: s, .. } if *s == speed));
        }
        assert_eq!(plan.instructions()[3], MotionInstruction::Wait { duration_ms: 10 });
    }
}
