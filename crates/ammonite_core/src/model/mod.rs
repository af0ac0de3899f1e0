//! Physical layout model for the pipetting arm.
//!
//! # Responsibility
//! - Define the persisted entities: labware with wells, decks with locations.
//! - Define the absolute pose and speed types that motion is expressed in.
//!
//! # Invariants
//! - Labware and decks are identified by unique names.
//! - Child records (wells, locations) are owned by exactly one parent and are
//!   unique by name/address within it.
//! - An uncalibrated deck carries no transform (`Deck::calibration == None`).

pub mod deck;
pub mod labware;
pub mod pose;
pub mod validation;
