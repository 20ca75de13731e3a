//! # Event Bus System
//!
//! Broadcasts session lifecycle, KDM and playback events to any number of
//! observers (status bars, analytics, test harnesses) over
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! ```text
//! ┌───────────────┐     emit      ┌───────────┐    subscribe    ┌────────────┐
//! │    Session    ├──────────────>│ EventBus  ├────────────────>│ Subscriber │
//! └───────────────┘               │ (broadcast│                 └────────────┘
//! ┌───────────────┐     emit      │  channel) │    subscribe    ┌────────────┐
//! │ PlayerService ├──────────────>│           ├────────────────>│ Subscriber │
//! └───────────────┘               └───────────┘                 └────────────┘
//! ```
//!
//! Emitting never blocks, so the session can publish while it holds its
//! phase lock. Emitting with no subscribers returns an error that publishers
//! ignore.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Playback(PlaybackEvent::Seeked { position_ms: 2_000 }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Playback position changed");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events and can keep
//!   receiving.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Engine and session lifecycle
    Session(SessionEvent),
    /// KDM validation and binding
    Kdm(KdmEvent),
    /// Essence and playback
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Session(e) => e.description(),
            CoreEvent::Kdm(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Kdm(KdmEvent::ValidationFailed { .. })
            | CoreEvent::Kdm(KdmEvent::BindFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Kdm(KdmEvent::Validated { valid: false, .. }) => EventSeverity::Warning,
            CoreEvent::Session(SessionEvent::PhaseChanged { .. })
            | CoreEvent::Playback(PlaybackEvent::Seeked { .. }) => EventSeverity::Debug,
            _ => EventSeverity::Info,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Session Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// The decode engine came up.
    EngineInitialized { session_id: String },
    /// The decode engine was torn down.
    EngineReleased { session_id: String },
    /// The session moved between lifecycle phases.
    PhaseChanged {
        session_id: String,
        from: String,
        to: String,
    },
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::EngineInitialized { .. } => "Decode engine initialized",
            SessionEvent::EngineReleased { .. } => "Decode engine released",
            SessionEvent::PhaseChanged { .. } => "Session phase changed",
        }
    }
}

// ============================================================================
// KDM Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum KdmEvent {
    /// The engine parsed the KDM and ran its checks.
    Validated {
        kdm_id: String,
        content_title: String,
        /// Whether every check passed.
        valid: bool,
    },
    /// The KDM could not be parsed.
    ValidationFailed { file: String },
    /// The KDM was bound for decryption.
    Bound { file: String },
    /// The engine rejected the binding.
    BindFailed { file: String },
}

impl KdmEvent {
    fn description(&self) -> &str {
        match self {
            KdmEvent::Validated { valid: true, .. } => "KDM valid",
            KdmEvent::Validated { valid: false, .. } => "KDM rejected",
            KdmEvent::ValidationFailed { .. } => "KDM could not be parsed",
            KdmEvent::Bound { .. } => "KDM bound",
            KdmEvent::BindFailed { .. } => "KDM binding failed",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// An essence was opened.
    EssenceOpened {
        file: String,
        /// Essence duration (milliseconds).
        duration_ms: u64,
        encrypted: bool,
    },
    /// Frames started flowing.
    Started { file: String },
    /// Playback stopped.
    Stopped {
        /// Presentation time of the last delivered frame (milliseconds).
        position_ms: u64,
    },
    /// The playback position jumped.
    Seeked { position_ms: u64 },
    /// The engine ran out of frames.
    EndOfStream { position_ms: u64 },
    /// The essence was closed.
    EssenceClosed {
        file: String,
        /// Wall-clock seconds between first start and close, if played.
        played_secs: Option<u64>,
    },
    /// Playback error occurred.
    Error {
        /// Human-readable error message.
        message: String,
        /// Whether the session is still drivable.
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::EssenceOpened { .. } => "Essence opened",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Seeked { .. } => "Playback position changed",
            PlaybackEvent::EndOfStream { .. } => "Playback finished",
            PlaybackEvent::EssenceClosed { .. } => "Essence closed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender; every `subscribe()` call gets an
/// independent receiver that sees events emitted after it subscribed.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per
    /// subscriber before it starts lagging.
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
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

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

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A receiver that skips events not matching an optional filter.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let kdm_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Kdm(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events for which `predicate` returns `true` are delivered.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next matching event.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns the next matching event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
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
