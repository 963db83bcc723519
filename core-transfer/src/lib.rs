//! # Core Transfer
//!
//! One-way photo transfer from a source service to a destination service,
//! deduplicated by a metadata fingerprint.
//!
//! ## Overview
//!
//! - [`Fingerprint`]: identity of a photo derived from its dimensions and
//!   capture time
//! - [`SourceEnumerator`]: lazy depth-first walk over the source folders
//! - [`DestinationIndex`]: resumable index of fingerprints already at the
//!   destination
//! - [`CheckpointStore`]: durable record of what this tool has copied
//! - [`TransferOrchestrator`]: ties them together for one run
//!
//! Services are reached through the `PhotoSource` and `PhotoDestination`
//! traits from `bridge-traits`, and all state files go through
//! `FileSystemAccess`, so the whole pipeline runs against in-memory fakes in
//! tests.

pub mod checkpoint;
pub mod dest_index;
pub mod enumerator;
pub mod error;
pub mod fingerprint;
pub mod job;
pub mod orchestrator;
pub mod scratch;
mod state_file;

pub use checkpoint::CheckpointStore;
pub use dest_index::{DestinationIndex, IndexBuild};
pub use enumerator::{PhotoRef, SourceEnumerator};
pub use error::{Result, TransferError};
pub use fingerprint::Fingerprint;
pub use job::{
    ItemOutcome, ItemStage, RunId, RunPhase, RunStats, TransferReport, TransferRun,
};
pub use orchestrator::TransferOrchestrator;
pub use scratch::{ScratchDir, ScratchFile};

pub use core_runtime::config::UnfingerprintedPolicy;
pub use core_runtime::events::SkipReason;
