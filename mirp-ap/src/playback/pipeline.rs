//! Decode/output pipeline abstraction
//!
//! The controller and the decode task only see this trait. The production
//! implementation is [`crate::audio::SymphoniaPipeline`]; tests use scripted
//! fakes.

use crate::catalog::SourceDescriptor;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Result of one unit of decode work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Audio was decoded or rendered
    Progressed,
    /// Nothing to do this cycle (output buffer full, or waiting on network data)
    Idle,
    /// The current item has no more audio; the pipeline is now inactive
    EndOfItem,
}

/// Opens, drives and stops audio playback for one item at a time
///
/// Contract:
/// - `open` acquires decoder and output resources for the source. On success
///   the pipeline is active.
/// - `drive_one_step` performs a bounded amount of work and is called
///   periodically by the decode task while the pipeline is active.
/// - After the last audio of an item has been rendered, or after a fatal
///   error, `is_active` reports `false`.
/// - `stop` must be honored promptly and is safe to call when inactive.
/// - `release_buffers` frees any buffers still held after a stop and
///   returns how many were released.
#[async_trait]
pub trait DecodePipeline: Send + Sync {
    async fn open(&self, source: &SourceDescriptor) -> Result<()>;

    async fn stop(&self);

    fn is_active(&self) -> bool;

    async fn drive_one_step(&self) -> Result<StepOutcome>;

    /// Playback position of the current item
    fn elapsed(&self) -> Duration;

    /// Total length of the current item, when known (never for live streams)
    fn total_duration(&self) -> Option<Duration>;

    /// Output level, 0..=MAX_VOLUME
    fn set_level(&self, level: u8);

    fn release_buffers(&self) -> usize;
}
