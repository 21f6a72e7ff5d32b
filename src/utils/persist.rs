//! Write-only-if-changed persistence for rendered artifacts.
//!
//! Each write goes to a temporary file in the target's directory and is
//! renamed into place, so a reader never observes a half-written artifact.

use log::{debug, info};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::PersistError;
use crate::render::Artifact;

/// What a persistence call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    Unchanged,
}

impl WriteOutcome {
    pub fn wrote(self) -> bool {
        !matches!(self, WriteOutcome::Unchanged)
    }
}

/// Destination for rendered artifacts.
pub trait ArtifactStore {
    /// Persist `artifact` unless identical bytes are already stored.
    fn write_if_changed(&mut self, artifact: &Artifact) -> Result<WriteOutcome, PersistError>;
}

/// Stores artifacts under a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn atomic_write(&self, path: &Path, body: &[u8]) -> Result<(), PersistError> {
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir).map_err(|e| PersistError::io(dir, e))?;

        let mut file = NamedTempFile::new_in(dir).map_err(|e| PersistError::io(dir, e))?;
        file.write_all(body).map_err(|e| PersistError::io(file.path(), e))?;
        file.as_file()
            .sync_all()
            .map_err(|e| PersistError::io(file.path(), e))?;
        file.persist(path).map_err(|source| PersistError::Rename {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

impl ArtifactStore for DirectoryStore {
    fn write_if_changed(&mut self, artifact: &Artifact) -> Result<WriteOutcome, PersistError> {
        let path = self.root.join(&artifact.path);

        let outcome = match fs::read(&path) {
            Ok(prev) if prev == artifact.body.as_bytes() => {
                debug!("unchanged: {}", path.display());
                return Ok(WriteOutcome::Unchanged);
            }
            Ok(_) => WriteOutcome::Updated,
            Err(e) if e.kind() == ErrorKind::NotFound => WriteOutcome::Created,
            Err(e) => return Err(PersistError::io(&path, e)),
        };

        self.atomic_write(&path, artifact.body.as_bytes())?;
        match outcome {
            WriteOutcome::Created => info!("writing new file: {}", path.display()),
            _ => info!("file has changed: {}", path.display()),
        }
        Ok(outcome)
    }
}
