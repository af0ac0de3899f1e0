//! Labware use-case service.
//!
//! # Responsibility
//! - Provide stable labware entry points for core callers.
//! - Import Opentrons-style labware definitions.
//! - Seed a database from a directory of definitions.
//!
//! # Invariants
//! - Service APIs never bypass repository validation.
//! - Service layer remains storage-agnostic.
//! - Seeding is idempotent: labware that already exists is left untouched.

use crate::model::labware::{Labware, LabwareImportError};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::labware_repo::LabwareRepository;
use log::{info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

/// Use-case service wrapper for labware operations.
pub struct LabwareService<R: LabwareRepository> {
    repo: R,
}

impl<R: LabwareRepository> LabwareService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one labware with all of its wells.
    pub fn create_labware(&self, labware: &Labware) -> RepoResult<()> {
        self.repo.create_labware(labware)
    }

    pub fn get_labware(&self, name: &str) -> RepoResult<Option<Labware>> {
        self.repo.get_labware(name)
    }

    pub fn list_labware(&self) -> RepoResult<Vec<Labware>> {
        self.repo.list_labware()
    }

    /// Deletes one labware; its wells go with it.
    pub fn delete_labware(&self, name: &str) -> RepoResult<()> {
        self.repo.delete_labware(name)
    }

    /// Parses an Opentrons labware definition and persists it.
    ///
    /// Returns the stored labware.
    pub fn import_opentrons(&self, definition: &str) -> Result<Labware, LabwareImportServiceError> {
        let labware = Labware::from_opentrons_json(definition)?;
        self.repo.create_labware(&labware)?;
        Ok(labware)
    }

    /// Imports every `*.json` definition found under `dir`, recursively.
    ///
    /// All files are read and parsed before anything is written, so one
    /// malformed definition leaves the database unchanged. Labware whose
    /// name is already stored is skipped.
    pub fn seed_defaults(&self, dir: &Path) -> Result<SeedReport, LabwareImportServiceError> {
        let result = self.seed_from(dir);
        match &result {
            Ok(report) => info!(
                "event=labware_seed module=service status=ok dir={} imported={} skipped={}",
                dir.display(),
                report.imported.len(),
                report.skipped.len()
            ),
            Err(err) => warn!(
                "event=labware_seed module=service status=error dir={} error={}",
                dir.display(),
                err
            ),
        }
        result
    }

    fn seed_from(&self, dir: &Path) -> Result<SeedReport, LabwareImportServiceError> {
        let mut files = Vec::new();
        collect_definition_files(dir, &mut files)?;
        files.sort();

        let mut definitions = Vec::with_capacity(files.len());
        for path in files {
            let text = fs::read_to_string(&path)
                .map_err(|source| LabwareImportServiceError::Io { path: path.clone(), source })?;
            let labware = Labware::from_opentrons_json(&text).map_err(|source| {
                LabwareImportServiceError::Definition { path, source }
            })?;
            definitions.push(labware);
        }

        let mut report = SeedReport::default();
        for labware in definitions {
            match self.repo.create_labware(&labware) {
                Ok(()) => report.imported.push(labware.name),
                Err(RepoError::AlreadyExists { .. }) => report.skipped.push(labware.name),
                Err(err) => return Err(err.into()),
            }
        }
        Ok(report)
    }
}

/// Names touched by one seeding pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub imported: Vec<String>,
    pub skipped: Vec<String>,
}

fn collect_definition_files(
    dir: &Path,
    files: &mut Vec<PathBuf>,
) -> Result<(), LabwareImportServiceError> {
    let io_error = |source| LabwareImportServiceError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_dir() {
            collect_definition_files(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    Ok(())
}

/// Failure while importing a labware definition.
#[derive(Debug)]
pub enum LabwareImportServiceError {
    Import(LabwareImportError),
    /// A seeded definition file failed to parse.
    Definition {
        path: PathBuf,
        source: LabwareImportError,
    },
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Repo(RepoError),
}

impl Display for LabwareImportServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Import(err) => write!(f, "{err}"),
            Self::Definition { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LabwareImportServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Import(err) => Some(err),
            Self::Definition { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<LabwareImportError> for LabwareImportServiceError {
    fn from(value: LabwareImportError) -> Self {
        Self::Import(value)
    }
}

impl From<RepoError> for LabwareImportServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}
