//! Per-run scratch space for photos in flight.
//!
//! Every photo is downloaded into `<scratch_dir>/<run_id>/`, uploaded, and
//! deleted again. [`ScratchFile`] removes its file when explicitly asked and,
//! failing that, when dropped, so an early return on an upload error never
//! leaves the photo behind.

use crate::{Result, TransferError};
use bridge_traits::{BridgeError, FileSystemAccess};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Scratch directory owned by one run
pub struct ScratchDir {
    fs: Arc<dyn FileSystemAccess>,
    root: PathBuf,
}

impl ScratchDir {
    /// Creates `<base>/<run_id>`.
    pub async fn create(
        fs: Arc<dyn FileSystemAccess>,
        base: &Path,
        run_id: &str,
    ) -> Result<Self> {
        let root = base.join(run_id);
        fs.create_dir_all(&root)
            .await
            .map_err(|source| TransferError::Scratch {
                path: root.display().to_string(),
                source,
            })?;
        debug!(path = %root.display(), "Created scratch directory");
        Ok(Self { fs, root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Reserves `file_name` inside the scratch directory.
    ///
    /// Only the final path component of `file_name` is used.
    pub fn file(&self, file_name: &str) -> ScratchFile {
        let name = file_name.rsplit('/').next().unwrap_or(file_name);
        ScratchFile {
            fs: self.fs.clone(),
            path: self.root.join(name),
            removed: false,
        }
    }

    /// Deletes the directory and anything left in it.
    pub async fn remove(self) -> Result<()> {
        match self.fs.delete_dir_all(&self.root).await {
            Ok(()) => {
                debug!(path = %self.root.display(), "Removed scratch directory");
                Ok(())
            }
            Err(source) => Err(TransferError::Scratch {
                path: self.root.display().to_string(),
                source,
            }),
        }
    }
}

/// A file in the scratch directory, deleted when the guard goes away
pub struct ScratchFile {
    fs: Arc<dyn FileSystemAccess>,
    path: PathBuf,
    removed: bool,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the file if it exists.
    pub async fn remove(mut self) -> Result<()> {
        self.removed = true;
        delete_if_present(self.fs.as_ref(), &self.path)
            .await
            .map_err(|source| TransferError::Scratch {
                path: self.path.display().to_string(),
                source,
            })
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }

        // Dropped without remove(); clean up in the background if we can
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let fs = self.fs.clone();
                let path = std::mem::take(&mut self.path);
                handle.spawn(async move {
                    if let Err(e) = delete_if_present(fs.as_ref(), &path).await {
                        warn!(path = %path.display(), error = %e, "Failed to remove scratch file");
                    }
                });
            }
            Err(_) => {
                warn!(path = %self.path.display(), "Scratch file dropped outside a runtime, leaving it in place");
            }
        }
    }
}

async fn delete_if_present(
    fs: &dyn FileSystemAccess,
    path: &Path,
) -> std::result::Result<(), BridgeError> {
    if fs.exists(path).await? {
        fs.delete_file(path).await?;
        debug!(path = %path.display(), "Removed scratch file");
    }
    Ok(())
}
