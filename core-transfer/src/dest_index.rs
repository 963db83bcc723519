//! # Destination Fingerprint Index
//!
//! The set of fingerprints already present at the destination, built from
//! the destination's paged photo listing.
//!
//! Listing a large photo library takes many requests, and each photo whose
//! listing entry lacks metadata costs one more. The index is therefore
//! persisted together with the pagination cursor after every page, and a
//! later run resumes from that cursor instead of starting over.
//!
//! ## File format
//!
//! ```json
//! { "fingerprints": ["0f3a...", "9b1c..."], "next_cursor": "token-or-null", "complete": false }
//! ```
//!
//! Files written by the older tool (`{"hashes": [...], "next_token": ...}`)
//! load too; they carry no completion flag and are treated as unfinished.
//!
//! ## Rescans
//!
//! A complete index goes stale as photos are added at the destination by
//! other means. By default a complete index is rescanned from the first
//! page, seeded with the fingerprints it already holds, so a rescan that
//! gets interrupted never loses knowledge.

use crate::checkpoint::parse_fingerprints;
use crate::fingerprint::Fingerprint;
use crate::state_file::StateFile;
use crate::{Result, TransferError};
use bridge_traits::{BridgeError, DestinationPhoto, FileSystemAccess, PhotoDestination};
use core_runtime::events::{EventBus, TransferEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Serialize)]
struct IndexRecord<'a> {
    fingerprints: &'a BTreeSet<Fingerprint>,
    next_cursor: Option<&'a str>,
    complete: bool,
}

#[derive(Deserialize)]
struct StoredIndex {
    #[serde(alias = "hashes", default)]
    fingerprints: Vec<Option<String>>,
    #[serde(alias = "next_token", default)]
    next_cursor: Option<String>,
    #[serde(default)]
    complete: bool,
}

/// Result of building the destination index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBuild {
    /// Fingerprints known at the destination
    pub fingerprints: BTreeSet<Fingerprint>,
    /// Whether the destination listing was followed to its end
    pub exhausted: bool,
    /// Listing pages fetched during this build
    pub pages_fetched: u32,
}

/// Builds and persists the destination fingerprint index
pub struct DestinationIndex {
    destination: Arc<dyn PhotoDestination>,
    state: StateFile,
    rescan_completed: bool,
    page_limit: Option<u32>,
    events: Option<(EventBus, String)>,
}

impl DestinationIndex {
    pub fn new(
        destination: Arc<dyn PhotoDestination>,
        fs: Arc<dyn FileSystemAccess>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            destination,
            state: StateFile::new(fs, path),
            rescan_completed: true,
            page_limit: None,
            events: None,
        }
    }

    /// Rescan an index that a previous run completed (default: true)
    pub fn with_rescan_completed(mut self, rescan: bool) -> Self {
        self.rescan_completed = rescan;
        self
    }

    /// Stop after this many pages; the rest is fetched by later runs
    pub fn with_page_limit(mut self, limit: Option<u32>) -> Self {
        self.page_limit = limit;
        self
    }

    /// Emit `IndexPageLoaded` events for the given run
    pub fn with_events(mut self, event_bus: EventBus, run_id: impl Into<String>) -> Self {
        self.events = Some((event_bus, run_id.into()));
        self
    }

    /// Loads the persisted index and continues the destination listing.
    #[instrument(skip(self), fields(path = %self.state.path().display()))]
    pub async fn build(&self) -> Result<IndexBuild> {
        let stored = self.state.load::<StoredIndex>().await;
        let (mut fingerprints, mut cursor, complete) = match stored {
            Some(stored) => (
                parse_fingerprints(stored.fingerprints, self.state.path()),
                stored.next_cursor,
                stored.complete,
            ),
            None => (BTreeSet::new(), None, false),
        };

        if complete {
            if !self.rescan_completed {
                info!(
                    count = fingerprints.len(),
                    "Destination index is complete, skipping listing"
                );
                return Ok(IndexBuild {
                    fingerprints,
                    exhausted: true,
                    pages_fetched: 0,
                });
            }
            info!(
                count = fingerprints.len(),
                "Rescanning complete destination index from the first page"
            );
            cursor = None;
        } else if cursor.is_some() {
            info!(
                count = fingerprints.len(),
                "Resuming destination index from persisted cursor"
            );
        }

        let mut pages_fetched = 0u32;
        loop {
            if let Some(limit) = self.page_limit {
                if pages_fetched >= limit {
                    info!(
                        pages = pages_fetched,
                        count = fingerprints.len(),
                        "Destination index page limit reached, listing continues next run"
                    );
                    return Ok(IndexBuild {
                        fingerprints,
                        exhausted: false,
                        pages_fetched,
                    });
                }
            }

            debug!(page = pages_fetched + 1, cursor = ?cursor, "Fetching destination page");
            let page = self
                .destination
                .list_photos(cursor.clone())
                .await
                .map_err(TransferError::Destination)?;
            pages_fetched += 1;

            let entries = page.entries.len();
            for entry in page.entries {
                if let Some(fingerprint) = self.fingerprint_of(entry).await? {
                    fingerprints.insert(fingerprint);
                }
            }

            cursor = page.next_cursor;
            let complete = cursor.is_none();
            self.state
                .store(&IndexRecord {
                    fingerprints: &fingerprints,
                    next_cursor: cursor.as_deref(),
                    complete,
                })
                .await?;

            info!(
                page = pages_fetched,
                entries,
                total = fingerprints.len(),
                has_more = !complete,
                "Indexed destination page"
            );

            if let Some((bus, run_id)) = &self.events {
                bus.emit(TransferEvent::IndexPageLoaded {
                    run_id: run_id.clone(),
                    page: pages_fetched,
                    fingerprints_total: fingerprints.len() as u64,
                    has_more: !complete,
                })
                .ok();
            }

            if complete {
                return Ok(IndexBuild {
                    fingerprints,
                    exhausted: true,
                    pages_fetched,
                });
            }
        }
    }

    async fn fingerprint_of(&self, entry: DestinationPhoto) -> Result<Option<Fingerprint>> {
        let metadata = match entry.metadata {
            Some(metadata) => metadata,
            None => match self.destination.get_metadata(&entry.id).await {
                Ok(Some(metadata)) => metadata,
                Ok(None) | Err(BridgeError::NotFound(_)) => {
                    warn!(id = %entry.id, "Unable to find metadata for destination photo");
                    return Ok(None);
                }
                Err(e) => return Err(TransferError::Destination(e)),
            },
        };

        let fingerprint = Fingerprint::compute(&metadata);
        if fingerprint.is_none() {
            debug!(id = %entry.id, "Destination photo has incomplete metadata");
        }
        Ok(fingerprint)
    }
}
