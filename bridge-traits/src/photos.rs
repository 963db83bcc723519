//! Photo Service Abstractions
//!
//! The two capabilities the transfer core needs from the outside world: a
//! source it can walk and download from, and a destination it can inventory
//! and upload to. Both are paged; a `None` cursor in a page means the listing
//! is exhausted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// Image metadata as reported by a photo service.
///
/// Every field is optional because neither service guarantees them. The
/// capture time is kept as the provider rendered it; callers normalize it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoMetadata {
    pub height: Option<u32>,
    pub width: Option<u32>,
    pub capture_time: Option<String>,
}

impl PhotoMetadata {
    pub fn new(height: u32, width: u32, capture_time: impl Into<String>) -> Self {
        Self {
            height: Some(height),
            width: Some(width),
            capture_time: Some(capture_time.into()),
        }
    }
}

/// Kind of a source listing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

/// One entry of a source folder listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub kind: EntryKind,
    /// Full path of the entry at the source, usable with `list_folder`/`download`
    pub path: String,
    /// Media metadata, when the source returned it with the listing
    pub metadata: Option<PhotoMetadata>,
}

impl SourceEntry {
    pub fn folder(path: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Folder,
            path: path.into(),
            metadata: None,
        }
    }

    pub fn file(path: impl Into<String>, metadata: Option<PhotoMetadata>) -> Self {
        Self {
            kind: EntryKind::File,
            path: path.into(),
            metadata,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

/// One page of a source folder listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderPage {
    pub entries: Vec<SourceEntry>,
    pub next_cursor: Option<String>,
}

/// One photo known to the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationPhoto {
    pub id: String,
    /// Inline metadata, when the listing call already returned it
    pub metadata: Option<PhotoMetadata>,
}

/// One page of a destination photo listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoPage {
    pub entries: Vec<DestinationPhoto>,
    pub next_cursor: Option<String>,
}

/// Result of an upload that reached the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The destination accepted the file
    Uploaded { id: String },
    /// The destination answered with a non-success status
    Rejected { status: u16, message: String },
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Uploaded { .. })
    }
}

/// Source of photos (e.g. Dropbox)
///
/// # Example
///
/// ```ignore
/// use bridge_traits::photos::PhotoSource;
///
/// async fn count_entries(source: &dyn PhotoSource) -> Result<usize> {
///     let mut total = 0;
///     let mut cursor = None;
///     loop {
///         let page = source.list_folder("/Photos", cursor).await?;
///         total += page.entries.len();
///         cursor = page.next_cursor;
///         if cursor.is_none() {
///             return Ok(total);
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait PhotoSource: Send + Sync {
    /// List one page of a folder's direct children
    ///
    /// The first call for a folder passes `cursor = None`; follow-up calls pass
    /// the cursor returned by the previous page.
    async fn list_folder(&self, path: &str, cursor: Option<String>) -> Result<FolderPage>;

    /// Download the file at `path` into `local_destination`
    async fn download(&self, path: &str, local_destination: &Path) -> Result<()>;
}

/// Destination photo service (e.g. Google Drive)
#[async_trait]
pub trait PhotoDestination: Send + Sync {
    /// List one page of photos already stored at the destination
    async fn list_photos(&self, cursor: Option<String>) -> Result<PhotoPage>;

    /// Fetch metadata for one photo
    ///
    /// Returns `Ok(None)` when the photo no longer exists.
    async fn get_metadata(&self, id: &str) -> Result<Option<PhotoMetadata>>;

    /// Upload a local file under `display_name`
    ///
    /// Transport failures are errors; a response with a non-success status is
    /// reported as [`UploadOutcome::Rejected`] so callers can decide how fatal
    /// it is.
    async fn upload(&self, local_path: &Path, display_name: &str) -> Result<UploadOutcome>;
}
