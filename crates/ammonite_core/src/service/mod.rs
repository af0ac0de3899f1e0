//! Use-case services over repository contracts.

pub mod deck_service;
pub mod labware_service;
pub mod protocol_service;
