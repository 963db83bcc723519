//! # Source Enumerator
//!
//! Lazily walks the configured source folders and yields every photo file,
//! depth-first in pre-order: a subfolder is walked to completion as soon as
//! it appears in its parent's listing, before the parent's remaining entries.
//!
//! The walk keeps an explicit stack of folder frames. Each frame holds the
//! buffered entries of the current listing page and the continuation cursor
//! for the next one, so pages are only fetched when the consumer asks for
//! more photos and page boundaries never change the yielded order.
//!
//! ```text
//! /Photos            stack after reading "/Photos/2019" from /Photos' page:
//! ├── a.jpg          ┌──────────────────────────────┐
//! ├── 2019/          │ /Photos/2019  buffer=[]  cur=∅│  <- listed next
//! │   └── b.jpg      │ /Photos       buffer=[c.jpg] │
//! └── c.jpg          └──────────────────────────────┘
//!
//! yields: a.jpg, 2019/b.jpg, c.jpg
//! ```

use crate::fingerprint::Fingerprint;
use crate::{Result, TransferError};
use bridge_traits::{PhotoSource, SourceEntry};
use core_runtime::config::has_photo_extension;
use futures::stream::{self, Stream};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};

/// A photo found at the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRef {
    /// Full source path
    pub path: String,
    /// `None` when the source reported no usable metadata for the file
    pub fingerprint: Option<Fingerprint>,
}

impl PhotoRef {
    /// Last path component
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

struct Frame {
    path: String,
    buffer: VecDeque<SourceEntry>,
    cursor: Option<String>,
    listed: bool,
}

impl Frame {
    fn new(path: String) -> Self {
        Self {
            path,
            buffer: VecDeque::new(),
            cursor: None,
            listed: false,
        }
    }

    fn is_exhausted(&self) -> bool {
        self.buffer.is_empty() && self.listed && self.cursor.is_none()
    }
}

/// Pull-based walk over the source folders
pub struct SourceEnumerator {
    source: Arc<dyn PhotoSource>,
    extensions: Vec<String>,
    pending_roots: VecDeque<String>,
    stack: Vec<Frame>,
}

impl SourceEnumerator {
    /// Walk `roots` in order, yielding files whose extension is in `extensions`.
    pub fn new(
        source: Arc<dyn PhotoSource>,
        roots: impl IntoIterator<Item = String>,
        extensions: Vec<String>,
    ) -> Self {
        Self {
            source,
            extensions,
            pending_roots: roots.into_iter().collect(),
            stack: Vec::new(),
        }
    }

    /// Returns the next photo, or `None` once every root has been walked.
    ///
    /// A listing error is returned as-is; the frame that failed keeps its
    /// cursor, so calling `next` again retries the same page.
    pub async fn next(&mut self) -> Result<Option<PhotoRef>> {
        loop {
            if self.stack.is_empty() {
                match self.pending_roots.pop_front() {
                    Some(root) => {
                        debug!(root = %root, "Walking source root");
                        self.stack.push(Frame::new(root));
                        continue;
                    }
                    None => return Ok(None),
                }
            }

            let frame = match self.stack.last_mut() {
                Some(frame) => frame,
                None => continue,
            };

            if let Some(entry) = frame.buffer.pop_front() {
                if entry.is_folder() {
                    trace!(path = %entry.path, "Descending into folder");
                    self.stack.push(Frame::new(entry.path));
                    continue;
                }

                let file_name = entry.path.rsplit('/').next().unwrap_or(&entry.path);
                if !has_photo_extension(file_name, &self.extensions) {
                    trace!(path = %entry.path, "Skipping non-photo file");
                    continue;
                }

                let fingerprint = entry.metadata.as_ref().and_then(Fingerprint::compute);
                return Ok(Some(PhotoRef {
                    path: entry.path,
                    fingerprint,
                }));
            }

            if frame.is_exhausted() {
                self.stack.pop();
                continue;
            }

            let page = self
                .source
                .list_folder(&frame.path, frame.cursor.clone())
                .await
                .map_err(|source| TransferError::SourceListing {
                    path: frame.path.clone(),
                    source,
                })?;

            trace!(
                path = %frame.path,
                entries = page.entries.len(),
                has_more = page.next_cursor.is_some(),
                "Listed source page"
            );
            frame.listed = true;
            frame.cursor = page.next_cursor;
            frame.buffer.extend(page.entries);
        }
    }

    /// Adapts the enumerator into a `Stream` of photos.
    pub fn into_stream(self) -> impl Stream<Item = Result<PhotoRef>> + Send {
        stream::try_unfold(self, |mut enumerator| async move {
            Ok(enumerator.next().await?.map(|photo| (photo, enumerator)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{BridgeError, FolderPage, PhotoMetadata};
    use futures::TryStreamExt;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    /// Folder tree served `page_size` entries at a time
    struct TreeSource {
        folders: HashMap<String, Vec<SourceEntry>>,
        page_size: usize,
        calls: Mutex<Vec<(String, Option<String>)>>,
        fail_on: Mutex<Option<String>>,
    }

    impl TreeSource {
        fn new(page_size: usize) -> Self {
            Self {
                folders: HashMap::new(),
                page_size,
                calls: Mutex::new(Vec::new()),
                fail_on: Mutex::new(None),
            }
        }

        fn folder(mut self, path: &str, entries: Vec<SourceEntry>) -> Self {
            self.folders.insert(path.to_string(), entries);
            self
        }
    }

    #[async_trait]
    impl PhotoSource for TreeSource {
        async fn list_folder(
            &self,
            path: &str,
            cursor: Option<String>,
        ) -> bridge_traits::error::Result<FolderPage> {
            self.calls
                .lock()
                .unwrap()
                .push((path.to_string(), cursor.clone()));
            if self.fail_on.lock().unwrap().as_deref() == Some(path) {
                return Err(BridgeError::OperationFailed("listing refused".to_string()));
            }

            let entries = self
                .folders
                .get(path)
                .ok_or_else(|| BridgeError::NotFound(path.to_string()))?;
            let start: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
            let end = (start + self.page_size).min(entries.len());
            Ok(FolderPage {
                entries: entries[start..end].to_vec(),
                next_cursor: (end < entries.len()).then(|| end.to_string()),
            })
        }

        async fn download(
            &self,
            _path: &str,
            _local_destination: &Path,
        ) -> bridge_traits::error::Result<()> {
            unreachable!("enumeration never downloads")
        }
    }

    fn photo(path: &str) -> SourceEntry {
        SourceEntry::file(path, Some(PhotoMetadata::new(10, 20, path)))
    }

    fn tree(page_size: usize) -> TreeSource {
        TreeSource::new(page_size)
            .folder(
                "/Photos",
                vec![
                    photo("/Photos/a.jpg"),
                    SourceEntry::folder("/Photos/2019"),
                    photo("/Photos/c.JPEG"),
                    SourceEntry::file("/Photos/notes.txt", None),
                ],
            )
            .folder(
                "/Photos/2019",
                vec![
                    SourceEntry::folder("/Photos/2019/empty"),
                    photo("/Photos/2019/b.jpg"),
                ],
            )
            .folder("/Photos/2019/empty", vec![])
            .folder("/Camera Uploads", vec![photo("/Camera Uploads/d.jpg")])
    }

    fn extensions() -> Vec<String> {
        vec!["jpg".to_string(), "jpeg".to_string()]
    }

    async fn collect(source: TreeSource, roots: &[&str]) -> Vec<String> {
        let enumerator = SourceEnumerator::new(
            Arc::new(source),
            roots.iter().map(|r| r.to_string()),
            extensions(),
        );
        enumerator
            .into_stream()
            .map_ok(|photo| photo.path)
            .try_collect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_walk_is_preorder_across_roots() {
        let paths = collect(tree(10), &["/Photos", "/Camera Uploads"]).await;
        assert_eq!(
            paths,
            vec![
                "/Photos/a.jpg",
                "/Photos/2019/b.jpg",
                "/Photos/c.JPEG",
                "/Camera Uploads/d.jpg",
            ]
        );
    }

    #[tokio::test]
    async fn test_page_size_does_not_change_order() {
        let unsplit = collect(tree(100), &["/Photos", "/Camera Uploads"]).await;
        for page_size in 1..4 {
            let split = collect(tree(page_size), &["/Photos", "/Camera Uploads"]).await;
            assert_eq!(split, unsplit, "page size {}", page_size);
        }
    }

    #[tokio::test]
    async fn test_pages_fetched_on_demand() {
        let source = Arc::new(tree(1));
        let mut enumerator =
            SourceEnumerator::new(source.clone(), vec!["/Photos".to_string()], extensions());

        let first = enumerator.next().await.unwrap().unwrap();
        assert_eq!(first.path, "/Photos/a.jpg");
        assert_eq!(
            *source.calls.lock().unwrap(),
            vec![("/Photos".to_string(), None)]
        );
    }

    #[tokio::test]
    async fn test_missing_metadata_yields_none_fingerprint() {
        let source = TreeSource::new(10).folder(
            "",
            vec![
                SourceEntry::file("/raw.jpg", None),
                SourceEntry::file(
                    "/half.jpg",
                    Some(PhotoMetadata {
                        height: Some(1),
                        width: None,
                        capture_time: None,
                    }),
                ),
            ],
        );
        let mut enumerator =
            SourceEnumerator::new(Arc::new(source), vec![String::new()], extensions());

        let raw = enumerator.next().await.unwrap().unwrap();
        assert_eq!(raw.file_name(), "raw.jpg");
        assert!(raw.fingerprint.is_none());
        let half = enumerator.next().await.unwrap().unwrap();
        assert!(half.fingerprint.is_none());
        assert!(enumerator.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listing_error_propagates_and_retries() {
        let source = Arc::new(tree(10));
        *source.fail_on.lock().unwrap() = Some("/Photos/2019".to_string());
        let mut enumerator =
            SourceEnumerator::new(source.clone(), vec!["/Photos".to_string()], extensions());

        assert_eq!(
            enumerator.next().await.unwrap().unwrap().path,
            "/Photos/a.jpg"
        );
        let err = enumerator.next().await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::SourceListing { ref path, .. } if path == "/Photos/2019"
        ));

        *source.fail_on.lock().unwrap() = None;
        assert_eq!(
            enumerator.next().await.unwrap().unwrap().path,
            "/Photos/2019/b.jpg"
        );
    }

    #[test]
    fn test_photo_ref_file_name() {
        let photo = PhotoRef {
            path: "/Photos/2019/b.jpg".to_string(),
            fingerprint: None,
        };
        assert_eq!(photo.file_name(), "b.jpg");
    }
}
