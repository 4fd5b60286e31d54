//! Periodic decode task
//!
//! Drives the pipeline one step per cycle and watches for the end-of-item
//! edge. The task never takes the controller lock for longer than a
//! `try_lock`, and never starts or stops playback itself: an edge becomes a
//! [`DecodeSignal::Finished`] in a single-slot `watch` channel, which the
//! completion handler applies to the controller from its own task. A newer
//! signal replaces one the handler has not seen yet, so only the latest
//! epoch is ever pending.

use super::controller::PlaybackController;
use super::pipeline::{DecodePipeline, StepOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Message from the decode task to the completion handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeSignal {
    /// The item opened at `epoch` ran out of audio while playing
    Finished { epoch: u64 },
}

/// One decode context
pub struct DecodeTask {
    controller: Arc<PlaybackController>,
    pipeline: Arc<dyn DecodePipeline>,
    finished_tx: watch::Sender<Option<DecodeSignal>>,
    cycles: u64,
    step_errors: u64,
}

impl DecodeTask {
    /// Create the task and the receiving end of its finished channel
    pub fn new(
        controller: Arc<PlaybackController>,
        pipeline: Arc<dyn DecodePipeline>,
    ) -> (Self, watch::Receiver<Option<DecodeSignal>>) {
        let (finished_tx, finished_rx) = watch::channel(None);
        (
            Self {
                controller,
                pipeline,
                finished_tx,
                cycles: 0,
                step_errors: 0,
            },
            finished_rx,
        )
    }

    /// Run one cycle
    ///
    /// Returns the signal emitted this cycle, if any.
    pub async fn run_cycle(&mut self) -> Option<DecodeSignal> {
        self.cycles += 1;

        if self.pipeline.is_active() {
            match self.pipeline.drive_one_step().await {
                Ok(StepOutcome::EndOfItem) => debug!("Pipeline reported end of item"),
                Ok(_) => {}
                Err(e) => {
                    self.step_errors += 1;
                    warn!("Decode step failed: {}", e);
                }
            }
        }

        let epoch = self.controller.observe_pipeline(self.pipeline.is_active())?;
        let signal = DecodeSignal::Finished { epoch };
        debug!("End of item for epoch {}", epoch);
        // Succeeds with or without a receiver; an unhandled older epoch is overwritten
        self.finished_tx.send_replace(Some(signal));
        Some(signal)
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn step_errors(&self) -> u64 {
        self.step_errors
    }

    async fn run(mut self, period: Duration, stop_flag: Arc<AtomicBool>) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !stop_flag.load(Ordering::Relaxed) {
            ticker.tick().await;
            self.run_cycle().await;
        }

        info!(
            "Decode task stopped after {} cycles ({} step errors)",
            self.cycles, self.step_errors
        );
    }
}

/// Apply finished signals until the decode task goes away
pub async fn run_completion_handler(
    controller: Arc<PlaybackController>,
    mut finished_rx: watch::Receiver<Option<DecodeSignal>>,
) {
    while finished_rx.changed().await.is_ok() {
        let signal = *finished_rx.borrow_and_update();
        if let Some(DecodeSignal::Finished { epoch }) = signal {
            controller.handle_finished(epoch).await;
        }
    }
    debug!("Completion handler stopped");
}

/// Running decode task and completion handler
pub struct DecodeRuntime {
    stop_flag: Arc<AtomicBool>,
    decode_handle: JoinHandle<()>,
    completion_handle: JoinHandle<()>,
}

/// Spawn the decode task with the given period, plus its completion handler
pub fn spawn_decode_runtime(
    controller: Arc<PlaybackController>,
    pipeline: Arc<dyn DecodePipeline>,
    period: Duration,
) -> DecodeRuntime {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let (task, finished_rx) = DecodeTask::new(Arc::clone(&controller), pipeline);

    info!("Decode task started ({} ms period)", period.as_millis());
    let decode_handle = tokio::spawn(task.run(period, Arc::clone(&stop_flag)));
    let completion_handle = tokio::spawn(run_completion_handler(controller, finished_rx));

    DecodeRuntime {
        stop_flag,
        decode_handle,
        completion_handle,
    }
}

impl DecodeRuntime {
    /// Stop the decode task, then let the completion handler drain
    pub async fn shutdown(self) {
        info!("Shutting down decode task");
        self.stop_flag.store(true, Ordering::Relaxed);

        if let Err(e) = self.decode_handle.await {
            error!("Decode task ended abnormally: {}", e);
        }
        // The finished sender was owned by the decode task, so the handler
        // exits once it has applied a signal still pending
        if let Err(e) = self.completion_handle.await {
            error!("Completion handler ended abnormally: {}", e);
        }
    }
}
