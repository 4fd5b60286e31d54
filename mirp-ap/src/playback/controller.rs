//! Playback controller
//!
//! Owns the playback state machine, the per-mode selection and the catalog
//! snapshot. Every command takes the controller lock for its whole
//! transition, so commands from one context are applied strictly in order.
//!
//! ```text
//! Idle ──play──> Transitioning ──ok──> Playing ──stop──> Idle
//!                      │                  │
//!                      └──err──> Failed   └──finished──> Idle (local: next + play)
//!                                  │                          (radio: Failed StreamLost)
//!                                  └──play──> Transitioning
//! ```
//!
//! The decode task never blocks on the lock. It reports pipeline activity
//! through [`PlaybackController::observe_pipeline`], which detects the
//! end-of-item edge, and the completion handler applies it through
//! [`PlaybackController::handle_finished`].

use super::handoff::{self, HandoffSettings, QuiesceOutcome};
use super::pipeline::DecodePipeline;
use super::selection::Selection;
use crate::catalog::{CatalogProvider, CatalogSnapshot, ItemRef};
use crate::error::{Error, Result};
use crate::gate::ConnectivityGate;
use crate::state::{PlayerStatus, SelectionInfo, SharedState};
use mirp_common::config::MAX_VOLUME;
use mirp_common::{FailureReason, PlaybackMode, PlaybackState, PlayerEvent};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Controller construction parameters
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub initial_mode: PlaybackMode,
    /// Starting output level (clamped to MAX_VOLUME)
    pub initial_volume: u8,
    pub handoff: HandoffSettings,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            initial_mode: PlaybackMode::LocalCatalog,
            initial_volume: 10,
            handoff: HandoffSettings::default(),
        }
    }
}

/// State guarded by the controller lock
struct ControllerInner {
    mode: PlaybackMode,
    state: PlaybackState,
    selection: Selection,
    catalog: CatalogSnapshot,
    /// Item opened by the last successful transition
    current: Option<ItemRef>,
    /// Pipeline seen active since the current item was opened
    was_active: bool,
    /// Incremented on every successful open; tags finished signals
    epoch: u64,
}

/// Playback state machine and command surface
pub struct PlaybackController {
    inner: Mutex<ControllerInner>,
    pipeline: Arc<dyn DecodePipeline>,
    catalog: Arc<dyn CatalogProvider>,
    gate: Arc<dyn ConnectivityGate>,
    shared: Arc<SharedState>,
    handoff: HandoffSettings,
    volume: AtomicU8,
}

impl PlaybackController {
    /// Create a controller and take the initial catalog snapshot
    ///
    /// A catalog that cannot be listed (for example, storage not mounted)
    /// starts empty; call [`rescan_catalog`](Self::rescan_catalog) later.
    pub async fn new(
        pipeline: Arc<dyn DecodePipeline>,
        catalog: Arc<dyn CatalogProvider>,
        gate: Arc<dyn ConnectivityGate>,
        shared: Arc<SharedState>,
        settings: ControllerSettings,
    ) -> Self {
        let snapshot = load_snapshot(catalog.as_ref()).await;
        let volume = settings.initial_volume.min(MAX_VOLUME);
        pipeline.set_level(volume);

        info!(
            "Playback controller ready: {} local items, {} stations, mode {}",
            snapshot.count(PlaybackMode::LocalCatalog),
            snapshot.count(PlaybackMode::RemoteStream),
            settings.initial_mode
        );

        let controller = Self {
            inner: Mutex::new(ControllerInner {
                mode: settings.initial_mode,
                state: PlaybackState::Idle,
                selection: Selection::default(),
                catalog: snapshot,
                current: None,
                was_active: false,
                epoch: 0,
            }),
            pipeline,
            catalog,
            gate,
            shared,
            handoff: settings.handoff,
            volume: AtomicU8::new(volume),
        };

        {
            let inner = controller.inner.lock().await;
            controller.publish(&inner).await;
        }
        controller
    }

    // ========================================
    // Commands
    // ========================================

    /// Switch the active content source
    ///
    /// Stops playback first and never starts it. A failure from the previous
    /// attempt is cleared back to `Idle`.
    pub async fn set_mode(&self, mode: PlaybackMode) {
        let mut inner = self.inner.lock().await;
        self.stop_locked(&mut inner).await;
        if matches!(inner.state, PlaybackState::Failed { .. }) {
            self.set_state(&mut inner, PlaybackState::Idle);
        }
        self.switch_mode_locked(&mut inner, mode);
        inner.was_active = false;
        self.publish(&inner).await;
    }

    /// Play the selected item of the active mode
    ///
    /// On failure the state is `Failed` with the matching reason and the
    /// error is returned; the selection is unchanged.
    pub async fn play(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.play_locked(&mut inner).await
    }

    /// Stop playback; a no-op unless playing
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        self.stop_locked(&mut inner).await;
    }

    /// Stop if playing, otherwise play
    ///
    /// Returns whether playback is running afterwards. There is no pause:
    /// resuming restarts the item (streams reconnect).
    pub async fn toggle_play_pause(&self) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner.state.is_playing() {
            self.stop_locked(&mut inner).await;
            Ok(false)
        } else {
            self.play_locked(&mut inner).await?;
            Ok(true)
        }
    }

    /// Select the next item of the active mode (wraps); does not play
    pub async fn next(&self) -> Result<usize> {
        self.step_selection(true).await
    }

    /// Select the previous item of the active mode (wraps); does not play
    pub async fn previous(&self) -> Result<usize> {
        self.step_selection(false).await
    }

    /// Play a specific local item, switching to local mode if needed
    pub async fn play_local(&self, index: usize) -> Result<()> {
        self.play_at(PlaybackMode::LocalCatalog, index).await
    }

    /// Play a specific station, switching to radio mode if needed
    pub async fn play_remote(&self, index: usize) -> Result<()> {
        self.play_at(PlaybackMode::RemoteStream, index).await
    }

    /// Set the output level, clamped to 0..=MAX_VOLUME
    ///
    /// Applied to the pipeline immediately, also while playing. Returns the
    /// level actually set.
    pub async fn set_volume(&self, level: i32) -> u8 {
        let new_level = level.clamp(0, MAX_VOLUME as i32) as u8;
        let old_level = self.volume.swap(new_level, Ordering::AcqRel);
        self.pipeline.set_level(new_level);

        if old_level != new_level {
            debug!("Volume {} -> {}", old_level, new_level);
            self.shared.update_status(|s| s.volume = new_level).await;
            self.shared.broadcast_event(PlayerEvent::VolumeChanged {
                old_level,
                new_level,
                timestamp: chrono::Utc::now(),
            });
        }
        new_level
    }

    /// Jump the selection of `mode` to `index` without starting playback
    pub async fn select_index(&self, mode: PlaybackMode, index: usize) -> Result<()> {
        let mut inner = self.inner.lock().await;
        check_index(&inner.catalog, mode, index)?;
        self.select_locked(&mut inner, mode, index);
        self.publish(&inner).await;
        Ok(())
    }

    /// Take a fresh catalog snapshot and clamp both selections into it
    ///
    /// Playback of the current item is not interrupted.
    pub async fn rescan_catalog(&self) -> Result<(usize, usize)> {
        // Listing may touch storage; keep it outside the lock
        let snapshot = load_snapshot(self.catalog.as_ref()).await;

        let mut inner = self.inner.lock().await;
        inner.catalog = snapshot;
        for mode in PlaybackMode::ALL {
            let count = inner.catalog.count(mode);
            if inner.selection.clamp(mode, count) {
                debug!("{} selection clamped to {}", mode, inner.selection.index(mode));
            }
        }

        let local_count = inner.catalog.count(PlaybackMode::LocalCatalog);
        let remote_count = inner.catalog.count(PlaybackMode::RemoteStream);
        info!("Catalog rescanned: {} local items, {} stations", local_count, remote_count);

        self.publish(&inner).await;
        self.shared.broadcast_event(PlayerEvent::CatalogRescanned {
            local_count,
            remote_count,
            timestamp: chrono::Utc::now(),
        });
        Ok((local_count, remote_count))
    }

    // ========================================
    // Decode task interface
    // ========================================

    /// Record pipeline activity and detect the end-of-item edge
    ///
    /// Called by the decode task once per cycle. Returns the epoch of the
    /// finished item exactly once per active-to-inactive transition while
    /// playing. Skips observation while a command holds the lock.
    pub fn observe_pipeline(&self, active: bool) -> Option<u64> {
        let mut inner = self.inner.try_lock().ok()?;

        if active {
            if inner.state.is_playing() {
                inner.was_active = true;
            }
            return None;
        }

        if !inner.was_active {
            return None;
        }
        inner.was_active = false;

        if inner.state.is_playing() {
            Some(inner.epoch)
        } else {
            None
        }
    }

    /// Apply an end-of-item signal from the decode task
    ///
    /// Ignored unless still playing the item the signal was raised for.
    /// Local items advance to the next item and play it; a finished stream
    /// means the connection dropped and is reported as `StreamLost`.
    pub async fn handle_finished(&self, epoch: u64) {
        let mut inner = self.inner.lock().await;
        if !inner.state.is_playing() || inner.epoch != epoch {
            debug!(
                "Ignoring stale finished signal (epoch {}, current {}, state {})",
                epoch, inner.epoch, inner.state
            );
            return;
        }

        let mode = inner.mode;
        let finished = inner.current.take();
        inner.was_active = false;
        self.set_state(&mut inner, PlaybackState::Idle);

        if let Some(item) = &finished {
            info!("Finished {} item {}: {}", mode, item.index, item.name);
            self.shared.broadcast_event(PlayerEvent::ItemFinished {
                mode,
                index: item.index,
                name: item.name.clone(),
                timestamp: chrono::Utc::now(),
            });
        }

        if mode.auto_advances() {
            let count = inner.catalog.count(mode);
            if let Some(index) = inner.selection.step(mode, count, true) {
                self.emit_selection(&inner, mode, index);
            }
            if let Err(e) = self.play_locked(&mut inner).await {
                warn!("Auto-advance failed: {}", e);
            }
        } else {
            let index = inner.selection.index(mode);
            warn!("Stream {} stopped delivering audio", index);
            self.set_state(
                &mut inner,
                PlaybackState::Failed {
                    reason: FailureReason::StreamLost,
                },
            );
            self.shared.broadcast_event(PlayerEvent::PlaybackFailed {
                mode,
                index,
                reason: FailureReason::StreamLost,
                detail: "stream ended".to_string(),
                timestamp: chrono::Utc::now(),
            });
            self.publish(&inner).await;
        }
    }

    // ========================================
    // Queries
    // ========================================

    /// Current status with live position and level
    pub async fn status(&self) -> PlayerStatus {
        let mut status = self.shared.get_status().await;
        status.volume = self.volume();
        if status.state.is_playing() {
            status.elapsed = self.pipeline.elapsed();
            status.total = match status.mode {
                PlaybackMode::LocalCatalog => self.pipeline.total_duration(),
                PlaybackMode::RemoteStream => None,
            };
        } else {
            status.elapsed = Duration::ZERO;
            status.total = None;
        }
        status
    }

    pub async fn state(&self) -> PlaybackState {
        self.shared.get_status().await.state
    }

    pub async fn mode(&self) -> PlaybackMode {
        self.shared.get_status().await.mode
    }

    pub fn volume(&self) -> u8 {
        self.volume.load(Ordering::Acquire)
    }

    /// Items of one mode from the current snapshot
    pub async fn items(&self, mode: PlaybackMode) -> Vec<ItemRef> {
        self.inner.lock().await.catalog.items(mode).to_vec()
    }

    pub fn shared_state(&self) -> &Arc<SharedState> {
        &self.shared
    }

    // ========================================
    // Transitions (lock held)
    // ========================================

    async fn play_at(&self, mode: PlaybackMode, index: usize) -> Result<()> {
        let mut inner = self.inner.lock().await;
        check_index(&inner.catalog, mode, index)?;
        if inner.mode != mode {
            self.stop_locked(&mut inner).await;
            self.switch_mode_locked(&mut inner, mode);
        }
        self.select_locked(&mut inner, mode, index);
        self.play_locked(&mut inner).await
    }

    async fn play_locked(&self, inner: &mut ControllerInner) -> Result<()> {
        let mode = inner.mode;
        let index = inner.selection.index(mode);
        self.set_state(inner, PlaybackState::Transitioning);
        self.publish(inner).await;

        self.pipeline.stop().await;
        inner.was_active = false;
        inner.current = None;

        let outcome = handoff::quiesce(self.pipeline.as_ref(), &self.handoff, mode).await;
        if let QuiesceOutcome::Busy { waited, .. } = outcome {
            self.shared.broadcast_event(PlayerEvent::HandoffHazard {
                waited_ms: waited.as_millis() as u64,
                timestamp: chrono::Utc::now(),
            });
        }

        let opened = match mode {
            PlaybackMode::LocalCatalog => self.open_local(inner, index).await,
            PlaybackMode::RemoteStream => self.open_remote(inner, index).await,
        };

        match opened {
            Ok(item) => {
                self.pipeline.set_level(self.volume());
                inner.epoch = inner.epoch.wrapping_add(1);
                inner.was_active = true;
                info!("Playing {} item {}: {}", mode, item.index, item.name);
                self.shared.broadcast_event(PlayerEvent::ItemStarted {
                    mode,
                    index: item.index,
                    name: item.name.clone(),
                    timestamp: chrono::Utc::now(),
                });
                inner.current = Some(item);
                self.set_state(inner, PlaybackState::Playing);
                self.publish(inner).await;
                Ok(())
            }
            Err(e) => {
                let reason = e.failure_reason();
                warn!("Cannot play {} item {}: {}", mode, index, e);
                self.set_state(inner, PlaybackState::Failed { reason });
                self.shared.broadcast_event(PlayerEvent::PlaybackFailed {
                    mode,
                    index,
                    reason,
                    detail: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                self.publish(inner).await;
                Err(e)
            }
        }
    }

    async fn open_local(&self, inner: &ControllerInner, index: usize) -> Result<ItemRef> {
        let item = lookup(&inner.catalog, PlaybackMode::LocalCatalog, index)?;

        if !self.catalog.item_exists(&item).await {
            return Err(Error::NotFound(item.source.to_string()));
        }

        self.pipeline.open(&item.source).await.map_err(|e| match e {
            Error::NotFound(_) | Error::OpenFailed(_) => e,
            other => Error::OpenFailed(format!("{}: {}", item.name, other)),
        })?;
        Ok(item)
    }

    async fn open_remote(&self, inner: &ControllerInner, index: usize) -> Result<ItemRef> {
        let item = lookup(&inner.catalog, PlaybackMode::RemoteStream, index)?;

        if !self.gate.is_available() {
            return Err(Error::Unreachable(format!(
                "no network route for {}",
                item.name
            )));
        }

        self.pipeline.open(&item.source).await.map_err(|e| match e {
            Error::ConnectionRefused(_) => e,
            other => Error::ConnectionRefused(format!("{}: {}", item.name, other)),
        })?;
        Ok(item)
    }

    async fn stop_locked(&self, inner: &mut ControllerInner) {
        if !matches!(inner.state, PlaybackState::Playing | PlaybackState::Transitioning) {
            return;
        }

        self.pipeline.stop().await;
        inner.was_active = false;
        if let Some(item) = inner.current.take() {
            info!("Stopped {}", item.name);
        }
        self.set_state(inner, PlaybackState::Idle);
        self.publish(inner).await;
    }

    fn switch_mode_locked(&self, inner: &mut ControllerInner, mode: PlaybackMode) {
        if inner.mode == mode {
            return;
        }
        let old_mode = inner.mode;
        inner.mode = mode;
        info!("Mode {} -> {}", old_mode, mode);
        self.shared.broadcast_event(PlayerEvent::ModeChanged {
            old_mode,
            new_mode: mode,
            timestamp: chrono::Utc::now(),
        });
    }

    async fn step_selection(&self, forward: bool) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        let mode = inner.mode;
        let count = inner.catalog.count(mode);
        let index = inner
            .selection
            .step(mode, count, forward)
            .ok_or(Error::EmptyCatalog(mode))?;

        self.emit_selection(&inner, mode, index);
        self.publish(&inner).await;
        Ok(index)
    }

    fn select_locked(&self, inner: &mut ControllerInner, mode: PlaybackMode, index: usize) {
        if inner.selection.index(mode) != index {
            inner.selection.set(mode, index);
            self.emit_selection(inner, mode, index);
        }
    }

    fn emit_selection(&self, inner: &ControllerInner, mode: PlaybackMode, index: usize) {
        let name = inner
            .catalog
            .get(mode, index)
            .map(|item| item.name.clone())
            .unwrap_or_default();
        debug!("{} selection -> {} ({})", mode, index, name);
        self.shared.broadcast_event(PlayerEvent::SelectionChanged {
            mode,
            index,
            name,
            timestamp: chrono::Utc::now(),
        });
    }

    fn set_state(&self, inner: &mut ControllerInner, new_state: PlaybackState) {
        let old_state = inner.state;
        if old_state == new_state {
            return;
        }
        inner.state = new_state;
        self.shared.broadcast_event(PlayerEvent::PlaybackStateChanged {
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Copy the locked state into the shared status snapshot
    async fn publish(&self, inner: &ControllerInner) {
        let mode = inner.mode;
        let index = inner.selection.index(mode);
        let selection = inner.catalog.get(mode, index).map(|item| SelectionInfo {
            index,
            name: item.name.clone(),
        });
        let state = inner.state;
        let local_count = inner.catalog.count(PlaybackMode::LocalCatalog);
        let remote_count = inner.catalog.count(PlaybackMode::RemoteStream);
        let volume = self.volume();

        self.shared
            .update_status(|s| {
                s.mode = mode;
                s.state = state;
                s.selection = selection;
                s.volume = volume;
                s.local_count = local_count;
                s.remote_count = remote_count;
            })
            .await;
    }
}

async fn load_snapshot(catalog: &dyn CatalogProvider) -> CatalogSnapshot {
    let local = catalog.list_local_items().await.unwrap_or_else(|e| {
        warn!("Local catalog unavailable: {}", e);
        Vec::new()
    });
    let remote = catalog.list_remote_items().await.unwrap_or_else(|e| {
        warn!("Station list unavailable: {}", e);
        Vec::new()
    });
    CatalogSnapshot::new(local, remote)
}

fn check_index(catalog: &CatalogSnapshot, mode: PlaybackMode, index: usize) -> Result<()> {
    let count = catalog.count(mode);
    if count == 0 {
        return Err(Error::EmptyCatalog(mode));
    }
    if index >= count {
        return Err(Error::InvalidIndex { mode, index, count });
    }
    Ok(())
}

fn lookup(catalog: &CatalogSnapshot, mode: PlaybackMode, index: usize) -> Result<ItemRef> {
    check_index(catalog, mode, index)?;
    catalog
        .get(mode, index)
        .cloned()
        .ok_or_else(|| Error::Internal(format!("{} item {} vanished from snapshot", mode, index)))
}
