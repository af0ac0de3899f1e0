//! Deck repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/read/calibrate/delete APIs over `deck` and `location`.
//! - Map the stored `calibrated` flag and transform columns to
//!   `Option<DeckCalibration>`.
//!
//! # Invariants
//! - Transform columns of an uncalibrated row are never read into a model.
//! - Calibration applies only to an existing deck and always sets
//!   `calibrated = 1`.
//! - Location orientation columns are all NULL or all set; all-zero legacy
//!   values read as "inherit the deck rotation".

use crate::model::deck::{Deck, DeckCalibration, Location, NewDeck};
use crate::model::pose::{is_zero_quat, quat_wxyz};
use crate::model::validation::EntityKind;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::{bool_from_db, ensure_connection_ready};
use glam::{DQuat, DVec3};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashMap;

const DECK_SELECT_SQL: &str = "SELECT name, calibrated, x, y, z, qw, qx, qy, qz FROM deck";
const LOCATION_SELECT_SQL: &str = "SELECT deck, name, x, y, z, qw, qx, qy, qz FROM location";

/// Repository interface for deck operations.
pub trait DeckRepository {
    /// Creates one uncalibrated deck together with its locations.
    fn create_deck(&self, deck: &NewDeck) -> RepoResult<()>;
    /// Loads one deck with its locations.
    fn get_deck(&self, name: &str) -> RepoResult<Option<Deck>>;
    /// Lists all decks ordered by name.
    fn list_decks(&self) -> RepoResult<Vec<Deck>>;
    /// Installs or overwrites the calibration transform of an existing deck.
    fn set_deck_calibration(&self, name: &str, calibration: &DeckCalibration) -> RepoResult<()>;
    /// Deletes one deck and its locations.
    fn delete_deck(&self, name: &str) -> RepoResult<()>;
}

/// SQLite-backed deck repository.
pub struct SqliteDeckRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDeckRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl DeckRepository for SqliteDeckRepository<'_> {
    fn create_deck(&self, deck: &NewDeck) -> RepoResult<()> {
        deck.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let exists: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM deck WHERE name = ?1);",
            [deck.name.as_str()],
            |row| row.get(0),
        )?;
        if exists == 1 {
            return Err(RepoError::AlreadyExists {
                kind: EntityKind::Deck,
                name: deck.name.clone(),
            });
        }

        tx.execute(
            "INSERT INTO deck (name, calibrated) VALUES (?1, 0);",
            [deck.name.as_str()],
        )?;
        {
            let mut insert_location = tx.prepare(
                "INSERT INTO location (deck, name, x, y, z, qw, qx, qy, qz)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            )?;
            for location in &deck.locations {
                let orientation = location.orientation;
                insert_location.execute(params![
                    deck.name.as_str(),
                    location.name.as_str(),
                    location.offset.x,
                    location.offset.y,
                    location.offset.z,
                    orientation.map(|q| q.w),
                    orientation.map(|q| q.x),
                    orientation.map(|q| q.y),
                    orientation.map(|q| q.z),
                ])?;
            }
        }
        tx.commit()?;

        info!(
            "event=deck_create module=repo status=ok deck={} locations={}",
            deck.name,
            deck.locations.len()
        );
        Ok(())
    }

    fn get_deck(&self, name: &str) -> RepoResult<Option<Deck>> {
        load_deck(self.conn, name)
    }

    fn list_decks(&self) -> RepoResult<Vec<Deck>> {
        let mut locations_by_deck: HashMap<String, Vec<Location>> = HashMap::new();
        {
            let mut stmt = self
                .conn
                .prepare(&format!("{LOCATION_SELECT_SQL} ORDER BY deck ASC, rowid ASC;"))?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let deck: String = row.get("deck")?;
                let location = parse_location_row(row)?;
                locations_by_deck.entry(deck).or_default().push(location);
            }
        }

        let mut stmt = self
            .conn
            .prepare(&format!("{DECK_SELECT_SQL} ORDER BY name ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut decks = Vec::new();
        while let Some(row) = rows.next()? {
            let mut deck = parse_deck_row(row)?;
            deck.locations = locations_by_deck.remove(&deck.name).unwrap_or_default();
            decks.push(deck);
        }
        Ok(decks)
    }

    fn set_deck_calibration(&self, name: &str, calibration: &DeckCalibration) -> RepoResult<()> {
        calibration.validate(name)?;

        let changed = self.conn.execute(
            "UPDATE deck
             SET calibrated = 1, x = ?1, y = ?2, z = ?3, qw = ?4, qx = ?5, qy = ?6, qz = ?7
             WHERE name = ?8;",
            params![
                calibration.translation.x,
                calibration.translation.y,
                calibration.translation.z,
                calibration.rotation.w,
                calibration.rotation.x,
                calibration.rotation.y,
                calibration.rotation.z,
                name,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: EntityKind::Deck,
                name: name.to_string(),
            });
        }

        info!("event=deck_calibrate module=repo status=ok deck={name}");
        Ok(())
    }

    fn delete_deck(&self, name: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM deck WHERE name = ?1;", [name])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: EntityKind::Deck,
                name: name.to_string(),
            });
        }
        info!("event=deck_delete module=repo status=ok deck={name}");
        Ok(())
    }
}

/// Loads one deck with locations on any connection or open transaction.
pub(crate) fn load_deck(conn: &Connection, name: &str) -> RepoResult<Option<Deck>> {
    let mut stmt = conn.prepare(&format!("{DECK_SELECT_SQL} WHERE name = ?1;"))?;
    let deck = stmt
        .query_row([name], |row| Ok(parse_deck_row(row)))
        .optional()?
        .transpose()?;
    let Some(mut deck) = deck else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(&format!(
        "{LOCATION_SELECT_SQL} WHERE deck = ?1 ORDER BY rowid ASC;"
    ))?;
    let mut rows = stmt.query([name])?;
    while let Some(row) = rows.next()? {
        deck.locations.push(parse_location_row(row)?);
    }
    Ok(Some(deck))
}

fn parse_deck_row(row: &Row<'_>) -> RepoResult<Deck> {
    let name: String = row.get("name")?;
    let calibrated = bool_from_db(row.get("calibrated")?, "deck.calibrated")?;
    let calibration = if calibrated {
        Some(DeckCalibration::new(
            DVec3::new(row.get("x")?, row.get("y")?, row.get("z")?),
            quat_wxyz(row.get("qw")?, row.get("qx")?, row.get("qy")?, row.get("qz")?),
        ))
    } else {
        None
    };

    Ok(Deck {
        name,
        calibration,
        locations: Vec::new(),
    })
}

fn parse_location_row(row: &Row<'_>) -> RepoResult<Location> {
    let name: String = row.get("name")?;
    let components: [Option<f64>; 4] = [
        row.get("qw")?,
        row.get("qx")?,
        row.get("qy")?,
        row.get("qz")?,
    ];
    let orientation = match components {
        [Some(w), Some(x), Some(y), Some(z)] => {
            Some(quat_wxyz(w, x, y, z)).filter(|q: &DQuat| !is_zero_quat(*q))
        }
        [None, None, None, None] => None,
        _ => {
            return Err(RepoError::InvalidData(format!(
                "partial orientation for location `{name}` in location.q*"
            )));
        }
    };

    Ok(Location {
        offset: DVec3::new(row.get("x")?, row.get("y")?, row.get("z")?),
        name,
        orientation,
    })
}
