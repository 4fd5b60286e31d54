//! Resource handoff between items
//!
//! On constrained hardware a decoder and its network connection must be fully
//! torn down before the next item acquires its own. Before every open the
//! controller stops the pipeline and calls [`quiesce`], which waits for the
//! pipeline to report inactive, lets the system settle, and then releases any
//! buffers still held.

use super::pipeline::DecodePipeline;
use mirp_common::config::PlaybackSettings;
use mirp_common::PlaybackMode;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Handoff timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoffSettings {
    /// Settle interval before opening a local item
    pub settle: Duration,
    /// Settle interval before connecting to a stream
    pub remote_settle: Duration,
    /// Longest wait for the pipeline to report inactive
    pub quiesce_timeout: Duration,
    /// How often `is_active` is polled while waiting
    pub poll_interval: Duration,
}

impl Default for HandoffSettings {
    fn default() -> Self {
        Self::from_playback(&PlaybackSettings::default())
    }
}

impl HandoffSettings {
    pub fn from_playback(settings: &PlaybackSettings) -> Self {
        Self {
            settle: Duration::from_millis(settings.settle_ms),
            remote_settle: Duration::from_millis(settings.remote_settle_ms),
            quiesce_timeout: Duration::from_millis(settings.quiesce_timeout_ms),
            poll_interval: Duration::from_millis(10),
        }
    }

    /// No settle delay and a short quiesce bound, for tests and simulations
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            remote_settle: Duration::ZERO,
            quiesce_timeout: Duration::from_millis(20),
            poll_interval: Duration::from_millis(1),
        }
    }

    pub fn settle_for(&self, mode: PlaybackMode) -> Duration {
        match mode {
            PlaybackMode::LocalCatalog => self.settle,
            PlaybackMode::RemoteStream => self.remote_settle,
        }
    }
}

/// What happened while waiting for the pipeline to quiesce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuiesceOutcome {
    /// The pipeline reported inactive within the bound
    Quiesced { waited: Duration, released: usize },
    /// The bound was exceeded; the open proceeds anyway
    Busy { waited: Duration, released: usize },
}

impl QuiesceOutcome {
    pub fn is_busy(&self) -> bool {
        matches!(self, QuiesceOutcome::Busy { .. })
    }

    pub fn released(&self) -> usize {
        match self {
            QuiesceOutcome::Quiesced { released, .. } | QuiesceOutcome::Busy { released, .. } => {
                *released
            }
        }
    }
}

/// Wait for a stopped pipeline to drain, settle, then release its buffers
///
/// The caller must already have called `stop`. Never fails: exceeding the
/// quiesce bound is reported as [`QuiesceOutcome::Busy`].
pub async fn quiesce(
    pipeline: &dyn DecodePipeline,
    settings: &HandoffSettings,
    next_mode: PlaybackMode,
) -> QuiesceOutcome {
    let start = Instant::now();
    let deadline = start + settings.quiesce_timeout;
    let mut busy = false;

    while pipeline.is_active() {
        if Instant::now() >= deadline {
            busy = true;
            break;
        }
        tokio::time::sleep(settings.poll_interval).await;
    }
    let waited = start.elapsed();

    if busy {
        warn!(
            "Pipeline still active {} ms after stop, opening next item anyway",
            waited.as_millis()
        );
    }

    let settle = settings.settle_for(next_mode);
    if !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }

    let released = pipeline.release_buffers();
    debug!(
        "Handoff complete: waited {} ms, settled {} ms, released {} buffers",
        waited.as_millis(),
        settle.as_millis(),
        released
    );

    if busy {
        QuiesceOutcome::Busy { waited, released }
    } else {
        QuiesceOutcome::Quiesced { waited, released }
    }
}
