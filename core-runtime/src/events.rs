//! # Event Bus System
//!
//! Provides an event-driven view of a transfer run using `tokio::sync::broadcast`.
//! The orchestrator publishes typed events; any number of subscribers (a
//! progress printer, a test, a metrics exporter) consume them independently.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐     subscribe    ┌────────────┐
//! │ Orchestrator ├──────────────>│ EventBus  ├─────────────────>│ Subscriber │
//! └──────────────┘               │ (broadcast│                  └────────────┘
//!                                │  channel) ├─────────────────>┌────────────┐
//!                                └───────────┘                  │ Subscriber │
//!                                                               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, TransferEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(TransferEvent::Started {
//!         run_id: "run-1".to_string(),
//!         roots: vec!["/Photos".to_string()],
//!     })
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Transfer started");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Publishing never blocks and never fails the run: `emit` returns an error
//! only when nobody is listening, and the orchestrator ignores it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Why a source photo was not copied
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The fingerprint is already in the destination index
    AtDestination,
    /// The fingerprint was copied by an earlier run (or earlier in this run)
    AlreadyCopied,
    /// The photo has no fingerprint and the policy is to skip it
    Unfingerprinted,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::AtDestination => "at_destination",
            SkipReason::AlreadyCopied => "already_copied",
            SkipReason::Unfingerprinted => "unfingerprinted",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted while a transfer run progresses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum TransferEvent {
    /// Run initiated.
    Started {
        /// Unique identifier for this run.
        run_id: String,
        /// Source folders that will be walked.
        roots: Vec<String>,
    },
    /// One page of the destination listing was indexed and persisted.
    IndexPageLoaded {
        run_id: String,
        /// 1-based page number within this run.
        page: u32,
        /// Fingerprints known after this page.
        fingerprints_total: u64,
        /// Whether more pages remain.
        has_more: bool,
    },
    /// A source photo was not copied.
    PhotoSkipped {
        run_id: String,
        path: String,
        fingerprint: Option<String>,
        reason: SkipReason,
    },
    /// A source photo was uploaded to the destination.
    PhotoCopied {
        run_id: String,
        path: String,
        /// `None` for photos copied under the unfingerprinted policy.
        fingerprint: Option<String>,
        destination_id: String,
    },
    /// Run finished successfully.
    Completed {
        run_id: String,
        copied: u64,
        skipped: u64,
        duration_secs: u64,
    },
    /// Run stopped on an error.
    Failed {
        run_id: String,
        message: String,
        /// Photos copied (and recorded) before the failure.
        copied: u64,
    },
}

impl TransferEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            TransferEvent::Started { .. } => "Transfer started",
            TransferEvent::IndexPageLoaded { .. } => "Destination index page loaded",
            TransferEvent::PhotoSkipped { .. } => "Photo skipped",
            TransferEvent::PhotoCopied { .. } => "Photo copied",
            TransferEvent::Completed { .. } => "Transfer completed successfully",
            TransferEvent::Failed { .. } => "Transfer failed",
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            TransferEvent::Failed { .. } => EventSeverity::Error,
            TransferEvent::Started { .. }
            | TransferEvent::PhotoCopied { .. }
            | TransferEvent::Completed { .. } => EventSeverity::Info,
            TransferEvent::IndexPageLoaded { .. } | TransferEvent::PhotoSkipped { .. } => {
                EventSeverity::Debug
            }
        }
    }

    /// Identifier of the run that produced the event.
    pub fn run_id(&self) -> &str {
        match self {
            TransferEvent::Started { run_id, .. }
            | TransferEvent::IndexPageLoaded { run_id, .. }
            | TransferEvent::PhotoSkipped { run_id, .. }
            | TransferEvent::PhotoCopied { run_id, .. }
            | TransferEvent::Completed { run_id, .. }
            | TransferEvent::Failed { run_id, .. } => run_id,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

/// Central event bus for publishing and subscribing to transfer events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TransferEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: TransferEvent) -> Result<usize, SendError<TransferEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all future events.
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<TransferEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&TransferEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, EventSeverity, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let important = EventStream::new(event_bus.subscribe())
///     .filter(|event| event.severity() >= EventSeverity::Info);
/// ```
pub struct EventStream {
    receiver: Receiver<TransferEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<TransferEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&TransferEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<TransferEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
