//! Test doubles for controller-level integration tests
//!
//! - FakePipeline: scripted DecodePipeline that records every call
//! - FakeCatalog: in-memory CatalogProvider with switchable failures
//! - build_player: controller wired with immediate handoff timing

#![allow(dead_code)]

use async_trait::async_trait;
use mirp_ap::catalog::{CatalogProvider, ItemRef, SourceDescriptor};
use mirp_ap::error::{Error, Result};
use mirp_ap::gate::StaticGate;
use mirp_ap::playback::{
    ControllerSettings, DecodePipeline, HandoffSettings, PlaybackController, StepOutcome,
};
use mirp_ap::SharedState;
use mirp_common::{PlaybackMode, PlayerEvent};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// Builds the error an injected open failure returns
pub type ErrorFactory = fn(String) -> Error;

/// Scripted pipeline
///
/// Each opened item lasts `steps_per_item` calls of `drive_one_step`
/// (0 = never ends on its own). Every trait call is appended to `calls`.
#[derive(Default)]
pub struct FakePipeline {
    active: AtomicBool,
    steps_per_item: AtomicUsize,
    remaining: AtomicUsize,
    /// `stop` leaves the pipeline active
    stubborn: AtomicBool,
    step_error: AtomicBool,
    level: AtomicU8,
    open_failures: Mutex<HashMap<String, ErrorFactory>>,
    opened: Mutex<Vec<SourceDescriptor>>,
    calls: Mutex<Vec<String>>,
    pub stop_calls: AtomicUsize,
    pub step_calls: AtomicUsize,
    pub release_calls: AtomicUsize,
}

impl FakePipeline {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Pipeline whose items end after `steps` decode steps
    pub fn with_item_length(steps: usize) -> Arc<Self> {
        let pipeline = Self::default();
        pipeline.steps_per_item.store(steps, Ordering::SeqCst);
        Arc::new(pipeline)
    }

    /// Make `open` fail for a source (matched by its display string)
    pub fn fail_open(&self, source: &str, error: ErrorFactory) {
        self.open_failures
            .lock()
            .unwrap()
            .insert(source.to_string(), error);
    }

    pub fn clear_failures(&self) {
        self.open_failures.lock().unwrap().clear();
    }

    pub fn set_stubborn(&self, stubborn: bool) {
        self.stubborn.store(stubborn, Ordering::SeqCst);
    }

    pub fn set_step_error(&self, fail: bool) {
        self.step_error.store(fail, Ordering::SeqCst);
    }

    /// Drop the current item as if the source vanished
    pub fn end_item_now(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn opened(&self) -> Vec<SourceDescriptor> {
        self.opened.lock().unwrap().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn last_opened(&self) -> Option<SourceDescriptor> {
        self.opened.lock().unwrap().last().cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn is_active_now(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn level(&self) -> u8 {
        self.level.load(Ordering::SeqCst)
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl DecodePipeline for FakePipeline {
    async fn open(&self, source: &SourceDescriptor) -> Result<()> {
        let key = source.to_string();
        self.record(format!("open {}", key));

        let failure = self.open_failures.lock().unwrap().get(&key).copied();
        if let Some(make_error) = failure {
            return Err(make_error(format!("injected failure for {}", key)));
        }

        self.opened.lock().unwrap().push(source.clone());
        self.remaining
            .store(self.steps_per_item.load(Ordering::SeqCst), Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.record("stop");
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if !self.stubborn.load(Ordering::SeqCst) {
            self.active.store(false, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn drive_one_step(&self) -> Result<StepOutcome> {
        self.step_calls.fetch_add(1, Ordering::SeqCst);
        if !self.is_active() {
            return Ok(StepOutcome::Idle);
        }
        if self.step_error.load(Ordering::SeqCst) {
            self.active.store(false, Ordering::SeqCst);
            return Err(Error::Decode("injected step failure".to_string()));
        }
        if self.steps_per_item.load(Ordering::SeqCst) == 0 {
            return Ok(StepOutcome::Progressed);
        }

        let left = self.remaining.load(Ordering::SeqCst).saturating_sub(1);
        self.remaining.store(left, Ordering::SeqCst);
        if left == 0 {
            self.active.store(false, Ordering::SeqCst);
            Ok(StepOutcome::EndOfItem)
        } else {
            Ok(StepOutcome::Progressed)
        }
    }

    fn elapsed(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs(180))
    }

    fn set_level(&self, level: u8) {
        self.level.store(level, Ordering::SeqCst);
    }

    fn release_buffers(&self) -> usize {
        self.record("release");
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        1
    }
}

/// In-memory catalog
pub struct FakeCatalog {
    local: Mutex<Vec<ItemRef>>,
    remote: Mutex<Vec<ItemRef>>,
    missing: Mutex<HashSet<PathBuf>>,
    fail_local: AtomicBool,
}

impl FakeCatalog {
    pub fn new(local: &[&str], stations: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            local: Mutex::new(local_items(local)),
            remote: Mutex::new(remote_items(stations)),
            missing: Mutex::new(HashSet::new()),
            fail_local: AtomicBool::new(false),
        })
    }

    /// Three local files (a, b, c) and two stations (s1, s2)
    pub fn standard() -> Arc<Self> {
        Self::new(&["a.mp3", "b.mp3", "c.mp3"], &["s1", "s2"])
    }

    pub fn set_local(&self, names: &[&str]) {
        *self.local.lock().unwrap() = local_items(names);
    }

    pub fn set_remote(&self, names: &[&str]) {
        *self.remote.lock().unwrap() = remote_items(names);
    }

    /// Make a local file disappear from storage
    pub fn remove_file(&self, name: &str) {
        self.missing.lock().unwrap().insert(local_path(name));
    }

    pub fn restore_file(&self, name: &str) {
        self.missing.lock().unwrap().remove(&local_path(name));
    }

    pub fn set_fail_local(&self, fail: bool) {
        self.fail_local.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CatalogProvider for FakeCatalog {
    async fn list_local_items(&self) -> Result<Vec<ItemRef>> {
        if self.fail_local.load(Ordering::SeqCst) {
            return Err(Error::Catalog("storage not mounted".to_string()));
        }
        Ok(self.local.lock().unwrap().clone())
    }

    async fn list_remote_items(&self) -> Result<Vec<ItemRef>> {
        Ok(self.remote.lock().unwrap().clone())
    }

    async fn item_exists(&self, item: &ItemRef) -> bool {
        match &item.source {
            SourceDescriptor::LocalFile { path } => !self.missing.lock().unwrap().contains(path),
            SourceDescriptor::RemoteStream { .. } => true,
        }
    }
}

pub fn local_path(name: &str) -> PathBuf {
    PathBuf::from("/music").join(name)
}

pub fn station_uri(name: &str) -> String {
    format!("http://radio.test/{}", name)
}

pub fn local_source(name: &str) -> SourceDescriptor {
    SourceDescriptor::LocalFile {
        path: local_path(name),
    }
}

pub fn remote_source(name: &str) -> SourceDescriptor {
    SourceDescriptor::RemoteStream {
        uri: station_uri(name),
    }
}

fn local_items(names: &[&str]) -> Vec<ItemRef> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| ItemRef::local(i, *name, local_path(name)))
        .collect()
}

fn remote_items(names: &[&str]) -> Vec<ItemRef> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| ItemRef::remote(i, *name, station_uri(name)))
        .collect()
}

/// Controller plus handles to everything it was built from
pub struct TestPlayer {
    pub controller: Arc<PlaybackController>,
    pub pipeline: Arc<FakePipeline>,
    pub catalog: Arc<FakeCatalog>,
    pub gate: Arc<StaticGate>,
    pub shared: Arc<SharedState>,
}

pub async fn build_player(
    pipeline: Arc<FakePipeline>,
    catalog: Arc<FakeCatalog>,
    network_up: bool,
    initial_mode: PlaybackMode,
) -> TestPlayer {
    let gate = Arc::new(StaticGate::new(network_up));
    let shared = Arc::new(SharedState::new());
    let settings = ControllerSettings {
        initial_mode,
        initial_volume: 10,
        handoff: HandoffSettings::immediate(),
    };
    let controller = Arc::new(
        PlaybackController::new(
            Arc::clone(&pipeline) as Arc<dyn DecodePipeline>,
            Arc::clone(&catalog) as Arc<dyn CatalogProvider>,
            Arc::clone(&gate) as Arc<dyn mirp_ap::gate::ConnectivityGate>,
            Arc::clone(&shared),
            settings,
        )
        .await,
    );

    TestPlayer {
        controller,
        pipeline,
        catalog,
        gate,
        shared,
    }
}

/// Standard catalog, network up, local mode
pub async fn standard_player() -> TestPlayer {
    build_player(FakePipeline::new(), FakeCatalog::standard(), true, PlaybackMode::LocalCatalog).await
}

/// Collect every event already queued on a receiver
pub fn drain_events(rx: &mut broadcast::Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}

pub fn event_types(events: &[PlayerEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.event_type()).collect()
}
