//! Shared player state
//!
//! Thread-safe status snapshot and event bus shared between the controller
//! and front-ends. The controller is the only writer; readers never wait on
//! an in-flight transition.

use mirp_common::config::MAX_VOLUME;
use mirp_common::time::{format_clock, format_remaining};
use mirp_common::{EventBus, PlaybackMode, PlaybackState, PlayerEvent};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};

/// Selected item of the active mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionInfo {
    pub index: usize,
    pub name: String,
}

/// Point-in-time view of the player
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerStatus {
    pub mode: PlaybackMode,
    pub state: PlaybackState,
    /// None when the active catalog is empty
    pub selection: Option<SelectionInfo>,
    /// Position in the current item (zero unless playing)
    pub elapsed: Duration,
    /// Length of the current local item; always None for streams
    pub total: Option<Duration>,
    pub volume: u8,
    pub max_volume: u8,
    pub local_count: usize,
    pub remote_count: usize,
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self {
            mode: PlaybackMode::default(),
            state: PlaybackState::default(),
            selection: None,
            elapsed: Duration::ZERO,
            total: None,
            volume: 0,
            max_volume: MAX_VOLUME,
            local_count: 0,
            remote_count: 0,
        }
    }
}

impl PlayerStatus {
    /// Fraction of the current local item played, 0.0..=1.0
    pub fn progress(&self) -> Option<f32> {
        if !self.state.is_playing() {
            return None;
        }
        let total = self.total?;
        if total.is_zero() {
            return None;
        }
        Some((self.elapsed.as_secs_f32() / total.as_secs_f32()).clamp(0.0, 1.0))
    }

    /// Clock shown next to the item name
    ///
    /// `--:--` when not playing, remaining time (`-MM:SS`) for local items of
    /// known length, elapsed time (`MM:SS`) otherwise.
    pub fn time_display(&self) -> String {
        if !self.state.is_playing() {
            return "--:--".to_string();
        }
        match self.total {
            Some(total) => format_remaining(self.elapsed, total),
            None => format_clock(self.elapsed),
        }
    }

    pub fn count(&self, mode: PlaybackMode) -> usize {
        match mode {
            PlaybackMode::LocalCatalog => self.local_count,
            PlaybackMode::RemoteStream => self.remote_count,
        }
    }
}

/// Shared state accessible by all components
///
/// Uses RwLock for concurrent read access with rare writes
pub struct SharedState {
    status: RwLock<PlayerStatus>,
    events: EventBus,
}

impl SharedState {
    /// Create new shared state with default values
    pub fn new() -> Self {
        Self::with_event_capacity(100)
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        Self {
            status: RwLock::new(PlayerStatus::default()),
            events: EventBus::new(capacity),
        }
    }

    /// Broadcast an event to all listeners
    pub fn broadcast_event(&self, event: PlayerEvent) {
        // No receivers is OK
        self.events.emit_lossy(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    /// Get the last published status
    pub async fn get_status(&self) -> PlayerStatus {
        self.status.read().await.clone()
    }

    /// Modify the published status in place
    pub async fn update_status<F>(&self, update: F)
    where
        F: FnOnce(&mut PlayerStatus),
    {
        let mut status = self.status.write().await;
        update(&mut status);
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirp_common::FailureReason;

    fn playing(elapsed: u64, total: Option<u64>) -> PlayerStatus {
        PlayerStatus {
            state: PlaybackState::Playing,
            elapsed: Duration::from_secs(elapsed),
            total: total.map(Duration::from_secs),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_update_status() {
        let state = SharedState::new();
        assert_eq!(state.get_status().await.state, PlaybackState::Idle);

        state
            .update_status(|s| {
                s.state = PlaybackState::Failed {
                    reason: FailureReason::Unreachable,
                };
                s.remote_count = 9;
            })
            .await;

        let status = state.get_status().await;
        assert_eq!(status.remote_count, 9);
        assert_eq!(status.count(PlaybackMode::RemoteStream), 9);
        assert_eq!(
            status.state.failure_reason(),
            Some(FailureReason::Unreachable)
        );
    }

    #[tokio::test]
    async fn test_events_reach_subscribers() {
        let state = SharedState::new();
        let mut rx = state.subscribe_events();
        state.broadcast_event(PlayerEvent::VolumeChanged {
            old_level: 10,
            new_level: 11,
            timestamp: chrono::Utc::now(),
        });
        assert_eq!(rx.recv().await.unwrap().event_type(), "VolumeChanged");
    }

    #[test]
    fn test_progress_and_clock() {
        let local = playing(30, Some(120));
        assert_eq!(local.progress(), Some(0.25));
        assert_eq!(local.time_display(), "-01:30");

        let radio = playing(75, None);
        assert_eq!(radio.progress(), None);
        assert_eq!(radio.time_display(), "01:15");

        let idle = PlayerStatus::default();
        assert_eq!(idle.progress(), None);
        assert_eq!(idle.time_display(), "--:--");
    }
}
