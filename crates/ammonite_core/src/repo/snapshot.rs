//! Read-snapshot contracts consumed by the protocol compiler.
//!
//! # Responsibility
//! - Define the lookup surface the compiler resolves names against.
//! - Provide a SQLite snapshot backed by one read-only transaction.
//!
//! # Invariants
//! - A snapshot observes one consistent database state for its lifetime, so a
//!   concurrent recalibration is seen either entirely or not at all.
//! - Snapshots never commit; releasing (or dropping) one rolls back.

use crate::model::deck::Deck;
use crate::model::labware::Labware;
use crate::repo::deck_repo::load_deck;
use crate::repo::ensure_connection_ready;
use crate::repo::error::RepoResult;
use crate::repo::labware_repo::load_labware;
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Name-based entity lookup returning entities with their owned children.
pub trait EntityLookup {
    fn get_deck(&self, name: &str) -> RepoResult<Option<Deck>>;
    fn get_labware(&self, name: &str) -> RepoResult<Option<Labware>>;
}

/// Read-only unit of work over repository state.
pub trait ReadSnapshot: EntityLookup {
    /// Ends the unit of work without writing anything.
    fn release(self) -> RepoResult<()>;
}

/// Source of consistent read snapshots.
pub trait EntityRepository {
    type Snapshot<'a>: ReadSnapshot
    where
        Self: 'a;

    /// Opens one read snapshot.
    fn read_snapshot(&self) -> RepoResult<Self::Snapshot<'_>>;
}

/// SQLite-backed snapshot source.
pub struct SqliteEntityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl EntityRepository for SqliteEntityRepository<'_> {
    type Snapshot<'a>
        = SqliteReadSnapshot<'a>
    where
        Self: 'a;

    fn read_snapshot(&self) -> RepoResult<Self::Snapshot<'_>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        // A deferred transaction takes its snapshot at the first read.
        tx.query_row("SELECT COUNT(*) FROM deck;", [], |row| row.get::<_, i64>(0))?;
        Ok(SqliteReadSnapshot { tx })
    }
}

/// One open read transaction.
pub struct SqliteReadSnapshot<'conn> {
    tx: Transaction<'conn>,
}

impl EntityLookup for SqliteReadSnapshot<'_> {
    fn get_deck(&self, name: &str) -> RepoResult<Option<Deck>> {
        load_deck(&self.tx, name)
    }

    fn get_labware(&self, name: &str) -> RepoResult<Option<Labware>> {
        load_labware(&self.tx, name)
    }
}

impl ReadSnapshot for SqliteReadSnapshot<'_> {
    fn release(self) -> RepoResult<()> {
        self.tx.rollback()?;
        Ok(())
    }
}
