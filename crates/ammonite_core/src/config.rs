//! Environment-driven core configuration.
//!
//! # Responsibility
//! - Resolve the database location and logging settings from the environment.
//!
//! # Invariants
//! - `AMMONITE_DATABASE_URL` wins over the legacy `DATABASE_URL`.
//! - An unset, blank or `:memory:` database URL selects an in-memory database.

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::logging::default_log_level;
use rusqlite::Connection;
use std::path::PathBuf;

pub const DATABASE_URL_VAR: &str = "AMMONITE_DATABASE_URL";
pub const LEGACY_DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const LOG_LEVEL_VAR: &str = "AMMONITE_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "AMMONITE_LOG_DIR";
pub const LABWARE_DIR_VAR: &str = "AMMONITE_LABWARE_DIR";

const IN_MEMORY_URL: &str = ":memory:";

/// Where layouts and the activity log are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl DatabaseLocation {
    /// Interprets a database URL; `sqlite://` and `file:` prefixes are stripped.
    pub fn parse(url: &str) -> Self {
        let trimmed = url.trim();
        let path = trimmed
            .strip_prefix("sqlite://")
            .or_else(|| trimmed.strip_prefix("file:"))
            .unwrap_or(trimmed);
        if path.is_empty() || path == IN_MEMORY_URL {
            Self::Memory
        } else {
            Self::File(PathBuf::from(path))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub database: DatabaseLocation,
    pub log_level: String,
    /// File logging is off when unset.
    pub log_dir: Option<PathBuf>,
    /// Directory of Opentrons definitions seeded into every opened database.
    pub labware_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database: DatabaseLocation::Memory,
            log_level: default_log_level().to_string(),
            log_dir: None,
            labware_dir: None,
        }
    }
}

impl CoreConfig {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which returns a variable's value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database = non_blank(DATABASE_URL_VAR)
            .or_else(|| non_blank(LEGACY_DATABASE_URL_VAR))
            .map_or(DatabaseLocation::Memory, |url| DatabaseLocation::parse(&url));
        let log_level =
            non_blank(LOG_LEVEL_VAR).unwrap_or_else(|| default_log_level().to_string());
        let log_dir = non_blank(LOG_DIR_VAR).map(PathBuf::from);
        let labware_dir = non_blank(LABWARE_DIR_VAR).map(PathBuf::from);

        Self {
            database,
            log_level,
            log_dir,
            labware_dir,
        }
    }

    /// Opens and migrates the configured database.
    pub fn open_db(&self) -> DbResult<Connection> {
        match &self.database {
            DatabaseLocation::Memory => open_db_in_memory(),
            DatabaseLocation::File(path) => open_db(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, DatabaseLocation};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn config_from(pairs: &[(&str, &str)]) -> CoreConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        CoreConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_memory_database() {
        let config = config_from(&[]);
        assert_eq!(config, CoreConfig::default());
    }

    #[test]
    fn prefixed_variable_wins_over_legacy_one() {
        let config = config_from(&[
            ("AMMONITE_DATABASE_URL", "/var/lib/ammonite.db"),
            ("DATABASE_URL", "/tmp/legacy.db"),
        ]);
        assert_eq!(
            config.database,
            DatabaseLocation::File(PathBuf::from("/var/lib/ammonite.db"))
        );
    }

    #[test]
    fn legacy_memory_url_and_blank_values() {
        let config = config_from(&[("AMMONITE_DATABASE_URL", "  "), ("DATABASE_URL", ":memory:")]);
        assert_eq!(config.database, DatabaseLocation::Memory);
        assert_eq!(
            DatabaseLocation::parse("sqlite://arm.db"),
            DatabaseLocation::File(PathBuf::from("arm.db"))
        );
    }

    #[test]
    fn log_settings_are_read() {
        let config = config_from(&[
            ("AMMONITE_LOG_LEVEL", "warn"),
            ("AMMONITE_LOG_DIR", "/var/log/ammonite"),
            ("AMMONITE_LABWARE_DIR", "/usr/share/ammonite/labware"),
        ]);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/ammonite")));
        assert_eq!(
            config.labware_dir,
            Some(PathBuf::from("/usr/share/ammonite/labware"))
        );
    }

    #[test]
    fn configured_file_database_opens_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arm.db");
        let config = CoreConfig {
            database: DatabaseLocation::File(path.clone()),
            ..CoreConfig::default()
        };
        config.open_db().unwrap();
        assert!(path.exists());
    }
}
