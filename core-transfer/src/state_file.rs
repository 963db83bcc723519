//! JSON state files written atomically (temp file, then rename).
//!
//! A reader never observes a half-written file: either the previous contents
//! or the new ones. Missing or unreadable files load as `None` so a damaged
//! state file costs a rescan, never a failed run.

use crate::{Result, TransferError};
use bridge_traits::FileSystemAccess;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub(crate) struct StateFile {
    fs: Arc<dyn FileSystemAccess>,
    path: PathBuf,
}

impl StateFile {
    pub(crate) fn new(fs: Arc<dyn FileSystemAccess>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Reads and decodes the file, or `None` when it is missing or corrupt.
    pub(crate) async fn load<T: DeserializeOwned>(&self) -> Option<T> {
        match self.fs.exists(&self.path).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(path = %self.path.display(), "State file not found, starting empty");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cannot check state file, starting empty");
                return None;
            }
        }

        let data = match self.fs.read_file(&self.path).await {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cannot read state file, starting empty");
                return None;
            }
        };

        match serde_json::from_slice(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "State file is corrupt, starting empty");
                None
            }
        }
    }

    /// Encodes `value` and replaces the file atomically.
    pub(crate) async fn store<T: Serialize>(&self, value: &T) -> Result<()> {
        let data = serde_json::to_vec(value)?;
        let temp = self.temp_path();

        self.fs
            .write_file(&temp, Bytes::from(data))
            .await
            .map_err(|source| self.persistence_error(source))?;
        self.fs
            .rename(&temp, &self.path)
            .await
            .map_err(|source| self.persistence_error(source))?;

        debug!(path = %self.path.display(), "Persisted state file");
        Ok(())
    }

    fn persistence_error(&self, source: bridge_traits::BridgeError) -> TransferError {
        TransferError::Persistence {
            path: self.path.display().to_string(),
            source,
        }
    }
}
