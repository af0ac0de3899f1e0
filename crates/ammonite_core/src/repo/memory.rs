//! In-memory repository used as a storage-independent fake.
//!
//! # Responsibility
//! - Implement the labware, deck and snapshot contracts without SQLite.
//! - Count committed writes so callers can assert read-only behavior.
//!
//! # Invariants
//! - State is copy-on-write behind an `Arc`; a snapshot holds the `Arc` it
//!   was opened with and never observes later writes.
//! - Validation rules match the SQLite repositories.

use crate::model::deck::{Deck, DeckCalibration, NewDeck};
use crate::model::labware::Labware;
use crate::model::validation::EntityKind;
use crate::repo::deck_repo::DeckRepository;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::labware_repo::LabwareRepository;
use crate::repo::snapshot::{EntityLookup, EntityRepository, ReadSnapshot};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, Default)]
struct EntityState {
    decks: BTreeMap<String, Deck>,
    labware: BTreeMap<String, Labware>,
}

/// Thread-safe in-memory entity store.
#[derive(Debug, Default)]
pub struct InMemoryEntityRepository {
    state: RwLock<Arc<EntityState>>,
    writes: AtomicUsize,
}

impl InMemoryEntityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful mutations applied so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn current(&self) -> Arc<EntityState> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    fn mutate<T>(&self, apply: impl FnOnce(&mut EntityState) -> RepoResult<T>) -> RepoResult<T> {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = EntityState::clone(&guard);
        let value = apply(&mut next)?;
        *guard = Arc::new(next);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }
}

fn not_found(kind: EntityKind, name: &str) -> RepoError {
    RepoError::NotFound {
        kind,
        name: name.to_string(),
    }
}

impl LabwareRepository for InMemoryEntityRepository {
    fn create_labware(&self, labware: &Labware) -> RepoResult<()> {
        labware.validate()?;
        self.mutate(|state| {
            if state.labware.contains_key(&labware.name) {
                return Err(RepoError::AlreadyExists {
                    kind: EntityKind::Labware,
                    name: labware.name.clone(),
                });
            }
            state.labware.insert(labware.name.clone(), labware.clone());
            Ok(())
        })
    }

    fn get_labware(&self, name: &str) -> RepoResult<Option<Labware>> {
        Ok(self.current().labware.get(name).cloned())
    }

    fn list_labware(&self) -> RepoResult<Vec<Labware>> {
        Ok(self.current().labware.values().cloned().collect())
    }

    fn delete_labware(&self, name: &str) -> RepoResult<()> {
        self.mutate(|state| {
            state
                .labware
                .remove(name)
                .map(drop)
                .ok_or_else(|| not_found(EntityKind::Labware, name))
        })
    }
}

impl DeckRepository for InMemoryEntityRepository {
    fn create_deck(&self, deck: &NewDeck) -> RepoResult<()> {
        deck.validate()?;
        self.mutate(|state| {
            if state.decks.contains_key(&deck.name) {
                return Err(RepoError::AlreadyExists {
                    kind: EntityKind::Deck,
                    name: deck.name.clone(),
                });
            }
            state.decks.insert(
                deck.name.clone(),
                Deck {
                    name: deck.name.clone(),
                    calibration: None,
                    locations: deck.locations.clone(),
                },
            );
            Ok(())
        })
    }

    fn get_deck(&self, name: &str) -> RepoResult<Option<Deck>> {
        Ok(self.current().decks.get(name).cloned())
    }

    fn list_decks(&self) -> RepoResult<Vec<Deck>> {
        Ok(self.current().decks.values().cloned().collect())
    }

    fn set_deck_calibration(&self, name: &str, calibration: &DeckCalibration) -> RepoResult<()> {
        calibration.validate(name)?;
        self.mutate(|state| {
            let deck = state
                .decks
                .get_mut(name)
                .ok_or_else(|| not_found(EntityKind::Deck, name))?;
            deck.calibration = Some(*calibration);
            Ok(())
        })
    }

    fn delete_deck(&self, name: &str) -> RepoResult<()> {
        self.mutate(|state| {
            state
                .decks
                .remove(name)
                .map(drop)
                .ok_or_else(|| not_found(EntityKind::Deck, name))
        })
    }
}

impl EntityRepository for InMemoryEntityRepository {
    type Snapshot<'a> = InMemorySnapshot;

    fn read_snapshot(&self) -> RepoResult<Self::Snapshot<'_>> {
        Ok(InMemorySnapshot {
            state: self.current(),
        })
    }
}

/// Frozen view of the in-memory state.
#[derive(Debug, Clone)]
pub struct InMemorySnapshot {
    state: Arc<EntityState>,
}

impl EntityLookup for InMemorySnapshot {
    fn get_deck(&self, name: &str) -> RepoResult<Option<Deck>> {
        Ok(self.state.decks.get(name).cloned())
    }

    fn get_labware(&self, name: &str) -> RepoResult<Option<Labware>> {
        Ok(self.state.labware.get(name).cloned())
    }
}

impl ReadSnapshot for InMemorySnapshot {
    fn release(self) -> RepoResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryEntityRepository;
    use crate::model::deck::{DeckCalibration, Location, NewDeck};
    use crate::repo::deck_repo::DeckRepository;
    use crate::repo::error::RepoError;
    use crate::repo::snapshot::{EntityLookup, EntityRepository};
    use glam::{DQuat, DVec3};

    #[test]
    fn snapshot_does_not_observe_later_calibration() {
        let repo = InMemoryEntityRepository::new();
        repo.create_deck(&NewDeck::new("deck", vec![Location::new("1", DVec3::ZERO)]))
            .unwrap();

        let snapshot = repo.read_snapshot().unwrap();
        repo.set_deck_calibration(
            "deck",
            &DeckCalibration::new(DVec3::new(1.0, 2.0, 3.0), DQuat::IDENTITY),
        )
        .unwrap();

        let frozen = snapshot.get_deck("deck").unwrap().unwrap();
        assert!(!frozen.is_calibrated());
        let fresh = repo.read_snapshot().unwrap().get_deck("deck").unwrap().unwrap();
        assert!(fresh.is_calibrated());
    }

    #[test]
    fn failed_mutation_is_not_counted() {
        let repo = InMemoryEntityRepository::new();
        let err = repo
            .set_deck_calibration("missing", &DeckCalibration::new(DVec3::ZERO, DQuat::IDENTITY))
            .unwrap_err();
        assert!(matches!(err, RepoError::NotFound { .. }));
        assert_eq!(repo.write_count(), 0);
    }
}
