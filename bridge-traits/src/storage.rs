//! File System Abstraction
//!
//! Local file I/O used for persisted transfer state and scratch copies of
//! photos in flight.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use crate::error::Result;

/// File system access trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn save_state(fs: &dyn FileSystemAccess, path: &Path, data: &[u8]) -> Result<()> {
///     let tmp = path.with_extension("tmp");
///     fs.write_file(&tmp, Bytes::copy_from_slice(data)).await?;
///     fs.rename(&tmp, path).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read entire file contents into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write data to a file, creating it (and its parent directory) if needed
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Rename a file, replacing the target if it exists
    ///
    /// On the same file system this is atomic, which is what persisted state
    /// relies on.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Delete a directory and all its contents
    async fn delete_dir_all(&self, path: &Path) -> Result<()>;
}
