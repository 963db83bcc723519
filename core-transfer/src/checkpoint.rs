//! # Checkpoint Store
//!
//! Fingerprints of every photo this tool has copied, across all runs.
//!
//! The set is loaded once at the start of a run and written in full after
//! each successful copy, so a crash loses at most the photo in flight. It is
//! kept apart from the destination index: the index describes what the
//! destination reported, the checkpoint describes what this tool did.
//!
//! ## File format
//!
//! ```json
//! { "fingerprints": ["0f3a...", "9b1c..."] }
//! ```
//!
//! A bare JSON array of fingerprints (the older format) is also accepted and
//! rewritten in the current format on the next write.

use crate::fingerprint::Fingerprint;
use crate::state_file::StateFile;
use crate::Result;
use bridge_traits::FileSystemAccess;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Serialize)]
struct CheckpointRecord<'a> {
    fingerprints: &'a BTreeSet<Fingerprint>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredCheckpoint {
    Current { fingerprints: Vec<Option<String>> },
    Legacy(Vec<Option<String>>),
}

impl StoredCheckpoint {
    fn into_raw(self) -> Vec<Option<String>> {
        match self {
            StoredCheckpoint::Current { fingerprints } => fingerprints,
            StoredCheckpoint::Legacy(fingerprints) => fingerprints,
        }
    }
}

/// Parses stored fingerprint strings, dropping nulls and malformed entries.
pub(crate) fn parse_fingerprints(raw: Vec<Option<String>>, path: &Path) -> BTreeSet<Fingerprint> {
    let total = raw.len();
    let parsed: BTreeSet<Fingerprint> = raw
        .into_iter()
        .flatten()
        .filter_map(|s| s.parse().ok())
        .collect();

    if parsed.len() < total {
        debug!(
            path = %path.display(),
            stored = total,
            kept = parsed.len(),
            "Dropped duplicate or invalid fingerprints from state file"
        );
    }
    parsed
}

/// Persistent set of fingerprints already copied
pub struct CheckpointStore {
    state: StateFile,
    fingerprints: BTreeSet<Fingerprint>,
}

impl CheckpointStore {
    /// Loads the checkpoint at `path`.
    ///
    /// A missing or unreadable file yields an empty store; this never fails
    /// the run.
    pub async fn load(fs: Arc<dyn FileSystemAccess>, path: impl Into<PathBuf>) -> Result<Self> {
        let state = StateFile::new(fs, path);
        let fingerprints = match state.load::<StoredCheckpoint>().await {
            Some(stored) => parse_fingerprints(stored.into_raw(), state.path()),
            None => BTreeSet::new(),
        };

        info!(
            path = %state.path().display(),
            count = fingerprints.len(),
            "Loaded checkpoint"
        );

        Ok(Self {
            state,
            fingerprints,
        })
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    /// Adds a fingerprint and persists the whole set before returning.
    ///
    /// Recording a fingerprint that is already present does not write.
    /// When the write fails the fingerprint is not kept in memory either.
    pub async fn record(&mut self, fingerprint: Fingerprint) -> Result<()> {
        if !self.fingerprints.insert(fingerprint) {
            debug!(%fingerprint, "Fingerprint already recorded");
            return Ok(());
        }

        let record = CheckpointRecord {
            fingerprints: &self.fingerprints,
        };
        if let Err(e) = self.state.store(&record).await {
            warn!(%fingerprint, error = %e, "Failed to persist checkpoint");
            self.fingerprints.remove(&fingerprint);
            return Err(e);
        }

        debug!(%fingerprint, total = self.fingerprints.len(), "Recorded fingerprint");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    /// Recorded fingerprints in ascending order
    pub fn fingerprints(&self) -> impl Iterator<Item = &Fingerprint> {
        self.fingerprints.iter()
    }

    pub fn path(&self) -> &Path {
        self.state.path()
    }
}
