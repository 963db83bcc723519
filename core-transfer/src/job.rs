//! # Transfer Run State Machine
//!
//! Tracks one invocation of the transfer with validated phase transitions.
//!
//! ## Run phases
//!
//! ```text
//! Init → LoadingCheckpoints → BuildingDestIndex → Streaming → Done
//!   │            │                    │               │
//!   └────────────┴────────────────────┴───────────────┴──→ Failed
//! ```
//!
//! ## Item stages
//!
//! While streaming, each photo is either skipped outright or goes through
//! `Copying` (download and upload) and `Recording` (checkpoint write) before
//! it counts as copied. Only one item is in flight at a time.
//!
//! ## Usage
//!
//! ```rust
//! use core_transfer::{ItemOutcome, RunPhase, TransferRun};
//!
//! let mut run = TransferRun::new();
//! run.advance(RunPhase::LoadingCheckpoints)?;
//! run.advance(RunPhase::BuildingDestIndex)?;
//! run.advance(RunPhase::Streaming)?;
//!
//! run.begin_copy()?;
//! run.mark_uploaded()?;
//! run.finish_item(ItemOutcome::Copied)?;
//!
//! let report = run.complete(true)?;
//! assert_eq!(report.copied, 1);
//! assert_eq!(report.phase, RunPhase::Done);
//! # Ok::<(), core_transfer::TransferError>(())
//! ```

use crate::{Result, TransferError};
use chrono::{DateTime, Utc};
use core_runtime::events::SkipReason;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a transfer run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a run ID from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TransferError::InvalidPhase(format!("invalid run id {}: {}", s, e)))
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Phase Types
// ============================================================================

/// Phase of a transfer run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Init,
    LoadingCheckpoints,
    BuildingDestIndex,
    Streaming,
    Done,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Init => "init",
            RunPhase::LoadingCheckpoints => "loading_checkpoints",
            RunPhase::BuildingDestIndex => "building_dest_index",
            RunPhase::Streaming => "streaming",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        }
    }
}

impl FromStr for RunPhase {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "init" => Ok(RunPhase::Init),
            "loading_checkpoints" => Ok(RunPhase::LoadingCheckpoints),
            "building_dest_index" => Ok(RunPhase::BuildingDestIndex),
            "streaming" => Ok(RunPhase::Streaming),
            "done" => Ok(RunPhase::Done),
            "failed" => Ok(RunPhase::Failed),
            _ => Err(TransferError::InvalidPhase(s.to_string())),
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stage of the photo currently being copied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStage {
    /// Downloading from the source and uploading to the destination
    Copying,
    /// Upload accepted, checkpoint not yet written
    Recording,
}

impl ItemStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStage::Copying => "copying",
            ItemStage::Recording => "recording",
        }
    }
}

/// Final outcome of one source photo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    Skipped(SkipReason),
    Copied,
}

// ============================================================================
// Stats
// ============================================================================

/// Counters collected while streaming
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Photos uploaded to the destination
    pub copied: u64,
    /// Photos skipped because the destination or checkpoint already had them
    pub skipped_known: u64,
    /// Photos skipped because no fingerprint could be computed
    pub skipped_unfingerprinted: u64,
}

impl RunStats {
    pub fn skipped(&self) -> u64 {
        self.skipped_known + self.skipped_unfingerprinted
    }

    /// Source photos seen
    pub fn total(&self) -> u64 {
        self.copied + self.skipped()
    }

    fn count(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Copied => self.copied += 1,
            ItemOutcome::Skipped(SkipReason::Unfingerprinted) => {
                self.skipped_unfingerprinted += 1
            }
            ItemOutcome::Skipped(_) => self.skipped_known += 1,
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReport {
    pub run_id: RunId,
    pub copied: u64,
    pub skipped_known: u64,
    pub skipped_unfingerprinted: u64,
    /// Whether the destination listing was followed to its end this run
    pub destination_index_complete: bool,
    pub phase: RunPhase,
    pub duration: Duration,
}

impl TransferReport {
    pub fn skipped(&self) -> u64 {
        self.skipped_known + self.skipped_unfingerprinted
    }
}

// ============================================================================
// Transfer Run
// ============================================================================

/// One transfer run with state machine semantics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRun {
    pub id: RunId,
    pub phase: RunPhase,
    /// Stage of the in-flight photo, if any
    pub item: Option<ItemStage>,
    pub stats: RunStats,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TransferRun {
    pub fn new() -> Self {
        Self {
            id: RunId::new(),
            phase: RunPhase::Init,
            item: None,
            stats: RunStats::default(),
            error_message: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move to the next phase
    ///
    /// # Errors
    ///
    /// Returns an error if the transition skips a phase, goes backwards, or
    /// leaves a terminal phase. `Failed` is reached through [`Self::fail`].
    pub fn advance(&mut self, to: RunPhase) -> Result<()> {
        if to == RunPhase::Failed {
            return Err(self.transition_error(to, "Use fail() to record a failure"));
        }
        self.validate_transition(to)?;
        if to == RunPhase::Done && self.item.is_some() {
            return Err(self.transition_error(to, "A photo is still in flight"));
        }
        self.phase = to;
        if to.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Start copying a photo
    pub fn begin_copy(&mut self) -> Result<()> {
        self.require_streaming("begin_copy")?;
        if let Some(stage) = self.item {
            return Err(TransferError::InvalidStateTransition {
                from: stage.as_str().to_string(),
                to: ItemStage::Copying.as_str().to_string(),
                reason: "Previous photo has not finished".to_string(),
            });
        }
        self.item = Some(ItemStage::Copying);
        Ok(())
    }

    /// The destination accepted the in-flight photo
    pub fn mark_uploaded(&mut self) -> Result<()> {
        self.require_streaming("mark_uploaded")?;
        match self.item {
            Some(ItemStage::Copying) => {
                self.item = Some(ItemStage::Recording);
                Ok(())
            }
            other => Err(TransferError::InvalidStateTransition {
                from: other.map_or("idle", |s| s.as_str()).to_string(),
                to: ItemStage::Recording.as_str().to_string(),
                reason: "No photo is being copied".to_string(),
            }),
        }
    }

    /// Count the outcome of a photo
    ///
    /// `Copied` closes the in-flight item and requires it to be recording;
    /// `Skipped` requires no item in flight.
    pub fn finish_item(&mut self, outcome: ItemOutcome) -> Result<()> {
        self.require_streaming("finish_item")?;
        let valid = match outcome {
            ItemOutcome::Copied => self.item == Some(ItemStage::Recording),
            ItemOutcome::Skipped(_) => self.item.is_none(),
        };
        if !valid {
            return Err(TransferError::InvalidStateTransition {
                from: self.item.map_or("idle", |s| s.as_str()).to_string(),
                to: match outcome {
                    ItemOutcome::Copied => "copied",
                    ItemOutcome::Skipped(_) => "skipped",
                }
                .to_string(),
                reason: "Item outcome does not match its stage".to_string(),
            });
        }
        self.item = None;
        self.stats.count(outcome);
        Ok(())
    }

    /// Finish the run successfully and build its report
    pub fn complete(&mut self, destination_index_complete: bool) -> Result<TransferReport> {
        self.advance(RunPhase::Done)?;
        Ok(self.report(destination_index_complete))
    }

    /// Mark the run as failed
    ///
    /// # Errors
    ///
    /// Returns an error if the run already reached a terminal phase
    pub fn fail(&mut self, error_message: impl Into<String>) -> Result<()> {
        self.validate_transition(RunPhase::Failed)?;
        self.phase = RunPhase::Failed;
        self.item = None;
        self.error_message = Some(error_message.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Time since the run started, or its total length once finished
    pub fn duration(&self) -> Duration {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).to_std().unwrap_or_default()
    }

    pub fn report(&self, destination_index_complete: bool) -> TransferReport {
        TransferReport {
            run_id: self.id,
            copied: self.stats.copied,
            skipped_known: self.stats.skipped_known,
            skipped_unfingerprinted: self.stats.skipped_unfingerprinted,
            destination_index_complete,
            phase: self.phase,
            duration: self.duration(),
        }
    }

    fn require_streaming(&self, operation: &str) -> Result<()> {
        if self.phase != RunPhase::Streaming {
            return Err(TransferError::InvalidStateTransition {
                from: self.phase.as_str().to_string(),
                to: operation.to_string(),
                reason: "Run must be streaming".to_string(),
            });
        }
        Ok(())
    }

    fn validate_transition(&self, to: RunPhase) -> Result<()> {
        let valid = match (self.phase, to) {
            (RunPhase::Init, RunPhase::LoadingCheckpoints) => true,
            (RunPhase::LoadingCheckpoints, RunPhase::BuildingDestIndex) => true,
            (RunPhase::BuildingDestIndex, RunPhase::Streaming) => true,
            (RunPhase::Streaming, RunPhase::Done) => true,

            // Terminal phases cannot transition
            (RunPhase::Done, _) | (RunPhase::Failed, _) => false,

            (_, RunPhase::Failed) => true,
            _ => false,
        };

        if !valid {
            return Err(self.transition_error(
                to,
                &format!("Cannot transition from {} to {}", self.phase, to),
            ));
        }
        Ok(())
    }

    fn transition_error(&self, to: RunPhase, reason: &str) -> TransferError {
        TransferError::InvalidStateTransition {
            from: self.phase.as_str().to_string(),
            to: to.as_str().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl Default for TransferRun {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
