//! Event types for the MIRP event system
//!
//! Provides the player event vocabulary and the EventBus used to fan it out to
//! front-ends (console, display layer, automation).

mod playback_types;

pub use playback_types::{FailureReason, PlaybackMode, PlaybackState};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Player event types
///
/// Events are broadcast via EventBus and serialize with a `type` tag so a
/// front-end can forward them verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Playback state changed (any transition of the controller's state machine)
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Active content source switched
    ModeChanged {
        old_mode: PlaybackMode,
        new_mode: PlaybackMode,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Selection index moved (next/previous/explicit jump/auto-advance/rescan clamp)
    SelectionChanged {
        mode: PlaybackMode,
        index: usize,
        name: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An item was opened and is now rendering
    ItemStarted {
        mode: PlaybackMode,
        index: usize,
        name: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The pipeline ran out of audio for the current item
    ///
    /// For local items this precedes the auto-advance; for streams it precedes
    /// a `PlaybackFailed` with `StreamLost`.
    ItemFinished {
        mode: PlaybackMode,
        index: usize,
        name: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A transition attempt failed
    PlaybackFailed {
        mode: PlaybackMode,
        index: usize,
        reason: FailureReason,
        /// Human-readable cause from the failing component
        detail: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Output level changed (0..=max)
    VolumeChanged {
        old_level: u8,
        new_level: u8,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Catalog snapshot replaced
    CatalogRescanned {
        local_count: usize,
        remote_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The pipeline did not reach a stopped state within the quiesce bound
    ///
    /// Playback proceeds best-effort; a following open failure is reported
    /// separately.
    HandoffHazard {
        waited_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlayerEvent {
    /// Short, stable name of the event variant (matches the serialized `type` tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            PlayerEvent::ModeChanged { .. } => "ModeChanged",
            PlayerEvent::SelectionChanged { .. } => "SelectionChanged",
            PlayerEvent::ItemStarted { .. } => "ItemStarted",
            PlayerEvent::ItemFinished { .. } => "ItemFinished",
            PlayerEvent::PlaybackFailed { .. } => "PlaybackFailed",
            PlayerEvent::VolumeChanged { .. } => "VolumeChanged",
            PlayerEvent::CatalogRescanned { .. } => "CatalogRescanned",
            PlayerEvent::HandoffHazard { .. } => "HandoffHazard",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the controller)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use mirp_common::events::{EventBus, PlayerEvent};
///
/// let event_bus = EventBus::new(16);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(PlayerEvent::VolumeChanged {
///     old_level: 10,
///     new_level: 12,
///     timestamp: chrono::Utc::now(),
/// });
///
/// let event = rx.try_recv().unwrap();
/// assert_eq!(event.event_type(), "VolumeChanged");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered per subscriber before the
    /// oldest ones are dropped.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PlayerEvent,
    ) -> Result<usize, broadcast::error::SendError<PlayerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(4);
        let result = bus.emit(PlayerEvent::HandoffHazard {
            waited_ms: 1000,
            timestamp: chrono::Utc::now(),
        });
        assert!(result.is_err());
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.capacity(), 4);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.emit_lossy(PlayerEvent::ModeChanged {
            old_mode: PlaybackMode::LocalCatalog,
            new_mode: PlaybackMode::RemoteStream,
            timestamp: chrono::Utc::now(),
        });
        bus.emit_lossy(PlayerEvent::PlaybackStateChanged {
            old_state: PlaybackState::Idle,
            new_state: PlaybackState::Transitioning,
            timestamp: chrono::Utc::now(),
        });

        assert_eq!(rx.recv().await.unwrap().event_type(), "ModeChanged");
        assert_eq!(rx.recv().await.unwrap().event_type(), "PlaybackStateChanged");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = PlayerEvent::PlaybackFailed {
            mode: PlaybackMode::RemoteStream,
            index: 3,
            reason: FailureReason::ConnectionRefused,
            detail: "HTTP 503".to_string(),
            timestamp: chrono::Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "PlaybackFailed");
        assert_eq!(value["mode"], "remote_stream");
        assert_eq!(value["reason"], "connection_refused");
        assert_eq!(value["index"], 3);
    }
}
