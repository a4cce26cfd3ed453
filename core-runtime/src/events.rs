//! # Event Bus System
//!
//! Broadcasts engine events to any number of observers using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: `CoreEvent` wrapping per-domain enums (`IndexEvent`)
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐   emit    ┌───────────┐   subscribe   ┌────────────┐
//! │ SyncCoordinator ├──────────>│ EventBus  ├──────────────>│ Subscriber │
//! └─────────────────┘           │ (broadcast│               └────────────┘
//!                               │  channel) │   subscribe   ┌────────────┐
//!                               │           ├──────────────>│ Subscriber │
//!                               └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, IndexEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Index(IndexEvent::PassStarted {
//!         pass_id: "pass-1".to_string(),
//!         kind: "delta".to_string(),
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Index(IndexEvent::PassStarted { .. })));
//! # }
//! ```
//!
//! ## Event Types
//!
//! ### Index Events
//! - `PassStarted`: A delta or full pass began on the worker
//! - `PassCompleted`: A pass finished; carries the pass statistics
//! - `PassFailed`: A pass aborted on a call-level failure (statistics included)
//! - `WatermarksReset`: Watermarks were zeroed after a corpus wipe
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Publishers ignore the error returned by `emit` when nobody is subscribed.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published and received through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Index synchronization events
    Index(IndexEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Index(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Index(IndexEvent::PassFailed { .. }) => EventSeverity::Error,
            CoreEvent::Index(IndexEvent::PassCompleted { stats, .. }) if stats.has_failures() => {
                EventSeverity::Warning
            }
            CoreEvent::Index(IndexEvent::PassCompleted { .. }) => EventSeverity::Info,
            CoreEvent::Index(IndexEvent::WatermarksReset) => EventSeverity::Info,
            _ => EventSeverity::Debug,
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

// ============================================================================
// Index Events
// ============================================================================

/// Aggregated counters of one pass, flattened for transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PassSummary {
    pub updates_succeeded: u64,
    pub updates_failed: u64,
    pub updates_skipped: u64,
    pub deletes_succeeded: u64,
    pub deletes_failed: u64,
    /// Index ids left unchecked because the source listing was truncated
    #[serde(default)]
    pub unreconciled_ids: u64,
    /// Deduplicated failure codes, sorted
    pub failure_codes: Vec<String>,
    pub duration_ms: u64,
}

impl PassSummary {
    pub fn has_failures(&self) -> bool {
        self.updates_failed > 0 || self.deletes_failed > 0 || !self.failure_codes.is_empty()
    }
}

/// Events related to index synchronization passes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum IndexEvent {
    /// A pass began executing on the worker.
    PassStarted {
        /// Unique identifier for this pass.
        pass_id: String,
        /// `"delta"` or `"full"`.
        kind: String,
    },
    /// A pass finished; per-id failures may still be present in `stats`.
    PassCompleted {
        pass_id: String,
        kind: String,
        stats: PassSummary,
    },
    /// A pass aborted on a call-level failure.
    PassFailed {
        pass_id: String,
        kind: String,
        /// Human-readable error message.
        message: String,
        stats: PassSummary,
    },
    /// Watermarks were zeroed; the next pass is a full pass.
    WatermarksReset,
}

impl IndexEvent {
    fn description(&self) -> &str {
        match self {
            IndexEvent::PassStarted { .. } => "Index pass started",
            IndexEvent::PassCompleted { .. } => "Index pass completed",
            IndexEvent::PassFailed { .. } => "Index pass failed",
            IndexEvent::WatermarksReset => "Index watermarks reset",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for engine events.
///
/// Cloning the bus yields another handle to the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
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

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    ///
    /// let _subscriber = event_bus.subscribe();
    /// assert_eq!(event_bus.subscriber_count(), 1);
    /// ```
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream, IndexEvent};
///
/// let event_bus = EventBus::new(100);
/// let completed = EventStream::new(event_bus.subscribe()).filter(|event| {
///     matches!(event, CoreEvent::Index(IndexEvent::PassCompleted { .. }))
/// });
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
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
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn matches(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
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

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn started(pass_id: &str, kind: &str) -> CoreEvent {
        CoreEvent::Index(IndexEvent::PassStarted {
            pass_id: pass_id.to_string(),
            kind: kind.to_string(),
        })
    }

    fn completed(failed: u64) -> CoreEvent {
        CoreEvent::Index(IndexEvent::PassCompleted {
            pass_id: "pass-1".to_string(),
            kind: "delta".to_string(),
            stats: PassSummary {
                updates_succeeded: 3,
                updates_failed: failed,
                ..Default::default()
            },
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(started("p", "delta")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = started("pass-7", "full");
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe()).filter(|event| {
            matches!(event, CoreEvent::Index(IndexEvent::PassCompleted { .. }))
        });

        bus.emit(started("pass-1", "delta")).ok();
        bus.emit(completed(0)).ok();

        assert_eq!(stream.recv().await.unwrap(), completed(0));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());

        for i in 0..5 {
            bus.emit(started(&format!("pass-{}", i), "delta")).ok();
        }

        assert!(matches!(stream.try_recv(), Some(Err(RecvError::Lagged(_)))));
    }

    #[test]
    fn test_severity() {
        assert_eq!(completed(0).severity(), EventSeverity::Info);
        assert_eq!(completed(2).severity(), EventSeverity::Warning);
        assert_eq!(started("p", "delta").severity(), EventSeverity::Debug);

        let failed = CoreEvent::Index(IndexEvent::PassFailed {
            pass_id: "p".to_string(),
            kind: "full".to_string(),
            message: "index unavailable".to_string(),
            stats: PassSummary::default(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);
        assert_eq!(failed.description(), "Index pass failed");
    }

    #[test]
    fn test_event_serialization() {
        let event = completed(1);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Index\""));
        assert!(json.contains("\"event\":\"PassCompleted\""));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }
}
