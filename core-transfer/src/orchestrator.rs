//! # Transfer Orchestrator
//!
//! Runs one pass of the photo transfer from source to destination.
//!
//! ## Workflow
//!
//! 1. Load the checkpoint of photos copied by earlier runs
//! 2. Build (or resume) the destination fingerprint index
//! 3. Walk the source folders; for every photo not already known, download
//!    it into the run's scratch directory, upload it, delete the local copy
//!    and record its fingerprint
//! 4. Remove the scratch directory and report
//!
//! Photos are handled one at a time in enumeration order. The first
//! download, upload or persistence failure stops the run; everything recorded
//! before it stays recorded.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_transfer::TransferOrchestrator;
//!
//! let orchestrator = TransferOrchestrator::new(config, source, destination, fs, event_bus);
//! let report = orchestrator.run().await?;
//! println!("copied {} photos", report.copied);
//! ```

use crate::checkpoint::CheckpointStore;
use crate::dest_index::DestinationIndex;
use crate::enumerator::{PhotoRef, SourceEnumerator};
use crate::fingerprint::Fingerprint;
use crate::job::{ItemOutcome, RunPhase, TransferReport, TransferRun};
use crate::scratch::{ScratchDir, ScratchFile};
use crate::{Result, TransferError};
use bridge_traits::{FileSystemAccess, PhotoDestination, PhotoSource, UploadOutcome};
use core_runtime::config::{TransferConfig, UnfingerprintedPolicy};
use core_runtime::events::{EventBus, SkipReason, TransferEvent};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Drives a transfer run end to end
pub struct TransferOrchestrator {
    config: TransferConfig,
    source: Arc<dyn PhotoSource>,
    destination: Arc<dyn PhotoDestination>,
    file_system: Arc<dyn FileSystemAccess>,
    event_bus: EventBus,
}

impl TransferOrchestrator {
    /// Create a new orchestrator
    ///
    /// # Arguments
    ///
    /// * `config` - Validated transfer configuration
    /// * `source` - Where photos are read from
    /// * `destination` - Where photos are uploaded to
    /// * `file_system` - Used for state files and scratch space
    /// * `event_bus` - Receives progress events
    pub fn new(
        config: TransferConfig,
        source: Arc<dyn PhotoSource>,
        destination: Arc<dyn PhotoDestination>,
        file_system: Arc<dyn FileSystemAccess>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            config,
            source,
            destination,
            file_system,
            event_bus,
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Executes one transfer run.
    ///
    /// # Errors
    ///
    /// Returns the first listing, download, upload or persistence failure.
    /// A `Failed` event carrying the number of photos copied so far is
    /// emitted before the error is returned.
    pub async fn run(&self) -> Result<TransferReport> {
        let mut run = TransferRun::new();
        let run_id = run.id.to_string();

        self.event_bus
            .emit(TransferEvent::Started {
                run_id: run_id.clone(),
                roots: self.config.source_roots.clone(),
            })
            .ok();

        match self.execute(&mut run).await {
            Ok(report) => {
                info!(
                    run_id = %run_id,
                    copied = report.copied,
                    skipped = report.skipped(),
                    duration_ms = report.duration.as_millis() as u64,
                    "Transfer completed"
                );
                self.event_bus
                    .emit(TransferEvent::Completed {
                        run_id,
                        copied: report.copied,
                        skipped: report.skipped(),
                        duration_secs: report.duration.as_secs(),
                    })
                    .ok();
                Ok(report)
            }
            Err(e) => {
                error!(run_id = %run_id, phase = %run.phase, error = %e, "Transfer failed");
                if let Err(state_err) = run.fail(e.to_string()) {
                    warn!(error = %state_err, "Could not mark run as failed");
                }
                self.event_bus
                    .emit(TransferEvent::Failed {
                        run_id,
                        message: e.to_string(),
                        copied: run.stats.copied,
                    })
                    .ok();
                Err(e)
            }
        }
    }

    #[instrument(skip_all, fields(run_id = %run.id))]
    async fn execute(&self, run: &mut TransferRun) -> Result<TransferReport> {
        // Phase 1: Load checkpoint
        run.advance(RunPhase::LoadingCheckpoints)?;
        info!("Phase 1: Loading checkpoint");
        let mut checkpoint =
            CheckpointStore::load(self.file_system.clone(), &self.config.checkpoint_path).await?;

        // Phase 2: Destination index
        run.advance(RunPhase::BuildingDestIndex)?;
        info!("Phase 2: Building destination index");
        let mut index = DestinationIndex::new(
            self.destination.clone(),
            self.file_system.clone(),
            &self.config.destination_index_path,
        )
        .with_rescan_completed(self.config.rescan_completed_index)
        .with_page_limit(self.config.index_page_limit)
        .with_events(self.event_bus.clone(), run.id.to_string())
        .build()
        .await?;

        if !index.exhausted {
            warn!(
                known = index.fingerprints.len(),
                "Destination index is incomplete; photos already at the destination may be copied again"
            );
        }
        let at_destination = std::mem::take(&mut index.fingerprints);
        info!(
            at_destination = at_destination.len(),
            already_copied = checkpoint.len(),
            "Skip set ready"
        );

        // Phase 3: Stream photos
        run.advance(RunPhase::Streaming)?;
        info!(roots = ?self.config.source_roots, "Phase 3: Streaming source photos");
        let scratch = ScratchDir::create(
            self.file_system.clone(),
            &self.config.scratch_dir,
            &run.id.to_string(),
        )
        .await?;

        let streamed = self
            .stream_photos(run, &at_destination, &mut checkpoint, &scratch)
            .await;
        if let Err(e) = scratch.remove().await {
            warn!(error = %e, "Failed to remove scratch directory");
        }
        streamed?;

        // Phase 4: Complete
        info!("Phase 4: Completing run");
        run.complete(index.exhausted)
    }

    async fn stream_photos(
        &self,
        run: &mut TransferRun,
        at_destination: &BTreeSet<Fingerprint>,
        checkpoint: &mut CheckpointStore,
        scratch: &ScratchDir,
    ) -> Result<()> {
        let mut photos = SourceEnumerator::new(
            self.source.clone(),
            self.config.source_roots.iter().cloned(),
            self.config.photo_extensions.clone(),
        );

        while let Some(photo) = photos.next().await? {
            let Some(fingerprint) = photo.fingerprint else {
                match self.config.unfingerprinted_policy {
                    UnfingerprintedPolicy::Skip => {
                        self.skip(run, &photo, SkipReason::Unfingerprinted)?;
                    }
                    UnfingerprintedPolicy::Copy => {
                        let name = photo.file_name().to_string();
                        let id = self.copy(run, &photo, scratch, &name, &name).await?;
                        run.finish_item(ItemOutcome::Copied)?;
                        self.copied(run, &photo, id);
                    }
                }
                continue;
            };

            if let Some(reason) = skip_reason(&fingerprint, at_destination, checkpoint) {
                self.skip(run, &photo, reason)?;
                continue;
            }

            let display_name = fingerprint.to_hex();
            let scratch_name = format!("{}.jpg", display_name);
            let id = self
                .copy(run, &photo, scratch, &scratch_name, &display_name)
                .await?;
            checkpoint.record(fingerprint).await?;
            run.finish_item(ItemOutcome::Copied)?;
            self.copied(run, &photo, id);
        }

        Ok(())
    }

    /// Downloads and uploads one photo, returning its destination id.
    ///
    /// The scratch file is removed whatever the outcome.
    #[instrument(skip(self, run, scratch), fields(path = %photo.path))]
    async fn copy(
        &self,
        run: &mut TransferRun,
        photo: &PhotoRef,
        scratch: &ScratchDir,
        scratch_name: &str,
        display_name: &str,
    ) -> Result<String> {
        run.begin_copy()?;
        let file = scratch.file(scratch_name);

        let uploaded = self.transfer_file(photo, &file, display_name).await;
        if let Err(e) = file.remove().await {
            warn!(error = %e, "Failed to remove scratch file");
        }
        let id = uploaded?;

        run.mark_uploaded()?;
        Ok(id)
    }

    async fn transfer_file(
        &self,
        photo: &PhotoRef,
        file: &ScratchFile,
        display_name: &str,
    ) -> Result<String> {
        debug!(to = %file.path().display(), "Downloading");
        self.source
            .download(&photo.path, file.path())
            .await
            .map_err(|source| TransferError::SourceDownload {
                path: photo.path.clone(),
                source,
            })?;

        debug!(name = display_name, "Uploading");
        let outcome = self
            .destination
            .upload(file.path(), display_name)
            .await
            .map_err(TransferError::Destination)?;

        match outcome {
            UploadOutcome::Uploaded { id } => Ok(id),
            UploadOutcome::Rejected { status, message } => Err(TransferError::DestinationUpload {
                path: photo.path.clone(),
                status,
                message,
            }),
        }
    }

    fn skip(&self, run: &mut TransferRun, photo: &PhotoRef, reason: SkipReason) -> Result<()> {
        run.finish_item(ItemOutcome::Skipped(reason))?;
        debug!(path = %photo.path, reason = %reason, "Skipping photo");
        self.event_bus
            .emit(TransferEvent::PhotoSkipped {
                run_id: run.id.to_string(),
                path: photo.path.clone(),
                fingerprint: photo.fingerprint.map(|f| f.to_hex()),
                reason,
            })
            .ok();
        Ok(())
    }

    fn copied(&self, run: &TransferRun, photo: &PhotoRef, destination_id: String) {
        info!(
            path = %photo.path,
            destination_id = %destination_id,
            copied = run.stats.copied,
            "Copied photo"
        );
        self.event_bus
            .emit(TransferEvent::PhotoCopied {
                run_id: run.id.to_string(),
                path: photo.path.clone(),
                fingerprint: photo.fingerprint.map(|f| f.to_hex()),
                destination_id,
            })
            .ok();
    }
}

/// Why a fingerprinted photo needs no copy, if it doesn't
fn skip_reason(
    fingerprint: &Fingerprint,
    at_destination: &BTreeSet<Fingerprint>,
    checkpoint: &CheckpointStore,
) -> Option<SkipReason> {
    if at_destination.contains(fingerprint) {
        Some(SkipReason::AtDestination)
    } else if checkpoint.contains(fingerprint) {
        Some(SkipReason::AlreadyCopied)
    } else {
        None
    }
}
