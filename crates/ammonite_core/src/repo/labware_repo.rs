//! Labware repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/read/delete APIs over `labware` and `well` storage.
//! - Keep well ordering stable (insertion order) on every read path.
//!
//! # Invariants
//! - `create_labware` inserts the labware and all wells in one transaction.
//! - Deleting a labware cascades to its wells via the foreign key.

use crate::model::labware::{Labware, Well};
use crate::model::validation::EntityKind;
use crate::repo::ensure_connection_ready;
use crate::repo::error::{RepoError, RepoResult};
use glam::DVec3;
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashMap;

const WELL_SELECT_SQL: &str = "SELECT labware, address, depth, diameter, x, y, z FROM well";

/// Repository interface for labware operations.
pub trait LabwareRepository {
    /// Creates one labware together with its wells.
    fn create_labware(&self, labware: &Labware) -> RepoResult<()>;
    /// Loads one labware with its wells.
    fn get_labware(&self, name: &str) -> RepoResult<Option<Labware>>;
    /// Lists all labware ordered by name.
    fn list_labware(&self) -> RepoResult<Vec<Labware>>;
    /// Deletes one labware and its wells.
    fn delete_labware(&self, name: &str) -> RepoResult<()>;
}

/// SQLite-backed labware repository.
pub struct SqliteLabwareRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLabwareRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl LabwareRepository for SqliteLabwareRepository<'_> {
    fn create_labware(&self, labware: &Labware) -> RepoResult<()> {
        labware.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if labware_exists(&tx, &labware.name)? {
            return Err(RepoError::AlreadyExists {
                kind: EntityKind::Labware,
                name: labware.name.clone(),
            });
        }

        tx.execute(
            "INSERT INTO labware (name, zdimension) VALUES (?1, ?2);",
            params![labware.name.as_str(), labware.z_dimension],
        )?;
        {
            let mut insert_well = tx.prepare(
                "INSERT INTO well (labware, address, depth, diameter, x, y, z)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            )?;
            for well in &labware.wells {
                insert_well.execute(params![
                    labware.name.as_str(),
                    well.address.as_str(),
                    well.depth,
                    well.diameter,
                    well.offset.x,
                    well.offset.y,
                    well.offset.z,
                ])?;
            }
        }
        tx.commit()?;

        info!(
            "event=labware_create module=repo status=ok labware={} wells={}",
            labware.name,
            labware.wells.len()
        );
        Ok(())
    }

    fn get_labware(&self, name: &str) -> RepoResult<Option<Labware>> {
        load_labware(self.conn, name)
    }

    fn list_labware(&self) -> RepoResult<Vec<Labware>> {
        let mut wells_by_labware: HashMap<String, Vec<Well>> = HashMap::new();
        {
            let mut stmt = self
                .conn
                .prepare(&format!("{WELL_SELECT_SQL} ORDER BY labware ASC, rowid ASC;"))?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let labware: String = row.get("labware")?;
                wells_by_labware
                    .entry(labware)
                    .or_default()
                    .push(parse_well_row(row)?);
            }
        }

        let mut stmt = self
            .conn
            .prepare("SELECT name, zdimension FROM labware ORDER BY name ASC;")?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let name: String = row.get("name")?;
            let wells = wells_by_labware.remove(&name).unwrap_or_default();
            items.push(Labware {
                z_dimension: row.get("zdimension")?,
                name,
                wells,
            });
        }
        Ok(items)
    }

    fn delete_labware(&self, name: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM labware WHERE name = ?1;", [name])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: EntityKind::Labware,
                name: name.to_string(),
            });
        }
        info!("event=labware_delete module=repo status=ok labware={name}");
        Ok(())
    }
}

/// Loads one labware with wells on any connection or open transaction.
pub(crate) fn load_labware(conn: &Connection, name: &str) -> RepoResult<Option<Labware>> {
    let z_dimension: Option<f64> = conn
        .query_row(
            "SELECT zdimension FROM labware WHERE name = ?1;",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    let Some(z_dimension) = z_dimension else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(&format!(
        "{WELL_SELECT_SQL} WHERE labware = ?1 ORDER BY rowid ASC;"
    ))?;
    let mut rows = stmt.query([name])?;
    let mut wells = Vec::new();
    while let Some(row) = rows.next()? {
        wells.push(parse_well_row(row)?);
    }

    Ok(Some(Labware {
        name: name.to_string(),
        z_dimension,
        wells,
    }))
}

fn labware_exists(conn: &Connection, name: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM labware WHERE name = ?1);",
        [name],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_well_row(row: &Row<'_>) -> RepoResult<Well> {
    Ok(Well {
        address: row.get("address")?,
        depth: row.get("depth")?,
        diameter: row.get("diameter")?,
        offset: DVec3::new(row.get("x")?, row.get("y")?, row.get("z")?),
    })
}
