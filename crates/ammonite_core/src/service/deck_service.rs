//! Deck use-case service.

use crate::model::deck::{Deck, DeckCalibration, NewDeck};
use crate::repo::deck_repo::DeckRepository;
use crate::repo::error::RepoResult;

/// Use-case service wrapper for deck operations.
pub struct DeckService<R: DeckRepository> {
    repo: R,
}

impl<R: DeckRepository> DeckService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates an uncalibrated deck with its locations.
    pub fn create_deck(&self, deck: &NewDeck) -> RepoResult<()> {
        self.repo.create_deck(deck)
    }

    pub fn get_deck(&self, name: &str) -> RepoResult<Option<Deck>> {
        self.repo.get_deck(name)
    }

    pub fn list_decks(&self) -> RepoResult<Vec<Deck>> {
        self.repo.list_decks()
    }

    /// Installs the calibration transform of an existing deck.
    ///
    /// # Contract
    /// - Marks the deck calibrated.
    /// - Recalibration overwrites the previous transform.
    pub fn calibrate(&self, name: &str, calibration: &DeckCalibration) -> RepoResult<()> {
        self.repo.set_deck_calibration(name, calibration)
    }

    pub fn delete_deck(&self, name: &str) -> RepoResult<()> {
        self.repo.delete_deck(name)
    }
}
