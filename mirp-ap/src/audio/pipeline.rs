//! Symphonia-backed decode pipeline
//!
//! One session exists per opened item: the decoder, its output stage and the
//! samples decoded but not yet accepted by the output buffer. Decoding and
//! probing run on the blocking pool because symphonia reads synchronously
//! (and a network source may wait for data).

use super::decoder::StreamDecoder;
use super::output::{OutputKind, OutputStage};
use super::source::{self, StreamSettings};
use crate::catalog::SourceDescriptor;
use crate::error::{Error, Result};
use crate::playback::{DecodePipeline, StepOutcome};
use async_trait::async_trait;
use mirp_common::config::{TomlConfig, MAX_VOLUME};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Packets decoded at most per step
const MAX_PACKETS_PER_STEP: usize = 8;

/// Marks an unknown total duration
const UNKNOWN_DURATION: u64 = u64::MAX;

/// Pipeline construction parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub output: OutputKind,
    /// Decoded audio buffered ahead of the sink
    pub output_buffer_ms: u64,
    pub stream: StreamSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&TomlConfig::default())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            output: OutputKind::default(),
            output_buffer_ms: config.playback.output_buffer_ms,
            stream: StreamSettings::from(&config.network),
        }
    }
}

/// Decoder, output and the samples in between for one item
struct Session {
    decoder: StreamDecoder,
    output: OutputStage,
    pending: Vec<f32>,
    pending_pos: usize,
    decoder_done: bool,
}

impl Session {
    /// Render, then top up the output buffer
    fn step(&mut self, gain: f32) -> Result<StepOutcome> {
        let rendered = self.output.render();
        let mut pushed = 0;

        for _ in 0..MAX_PACKETS_PER_STEP {
            if self.pending_pos < self.pending.len() {
                let n = self.output.push(&self.pending[self.pending_pos..]);
                self.pending_pos += n;
                pushed += n;
                if self.pending_pos < self.pending.len() {
                    break;
                }
            }
            if self.decoder_done || self.output.vacant_len() == 0 {
                break;
            }
            match self.decoder.next_chunk()? {
                Some(mut chunk) => {
                    apply_gain(&mut chunk, gain);
                    self.pending = chunk;
                    self.pending_pos = 0;
                }
                None => self.decoder_done = true,
            }
        }

        let exhausted = self.decoder_done && self.pending_pos >= self.pending.len();
        if exhausted && self.output.is_drained() {
            Ok(StepOutcome::EndOfItem)
        } else if rendered > 0 || pushed > 0 {
            Ok(StepOutcome::Progressed)
        } else {
            Ok(StepOutcome::Idle)
        }
    }
}

/// Scale samples by an output level gain
pub fn apply_gain(samples: &mut [f32], gain: f32) {
    if (gain - 1.0).abs() < f32::EPSILON {
        return;
    }
    for sample in samples.iter_mut() {
        *sample *= gain;
    }
}

/// Linear gain for a level in 0..=MAX_VOLUME
pub fn level_to_gain(level: u8) -> f32 {
    level.min(MAX_VOLUME) as f32 / MAX_VOLUME as f32
}

/// Production [`DecodePipeline`]
pub struct SymphoniaPipeline {
    settings: PipelineSettings,
    client: reqwest::Client,
    session: Mutex<Option<Session>>,
    /// Network fetch task of the current stream, kept outside the session
    /// lock so `stop` can end it while a step is blocked reading
    fetch: StdMutex<Option<JoinHandle<()>>>,
    active: AtomicBool,
    level: AtomicU8,
    elapsed_ms: AtomicU64,
    total_ms: AtomicU64,
}

impl SymphoniaPipeline {
    pub fn new(settings: PipelineSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.stream.connect_timeout)
            .user_agent(concat!("mirp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            settings,
            client,
            session: Mutex::new(None),
            fetch: StdMutex::new(None),
            active: AtomicBool::new(false),
            level: AtomicU8::new(0),
            elapsed_ms: AtomicU64::new(0),
            total_ms: AtomicU64::new(UNKNOWN_DURATION),
        })
    }

    fn abort_fetch(&self) -> bool {
        let handle = self
            .fetch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match handle {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    fn set_fetch(&self, handle: Option<JoinHandle<()>>) {
        *self.fetch.lock().unwrap_or_else(PoisonError::into_inner) = handle;
    }

    /// End the current item after a failure or the last sample
    fn finish(&self) {
        self.active.store(false, Ordering::Release);
        self.abort_fetch();
    }
}

#[async_trait]
impl DecodePipeline for SymphoniaPipeline {
    async fn open(&self, source: &SourceDescriptor) -> Result<()> {
        self.stop().await;

        let opened = match source {
            SourceDescriptor::LocalFile { path } => source::open_local(path)?,
            SourceDescriptor::RemoteStream { uri } => {
                source::open_remote(&self.client, uri, &self.settings.stream).await?
            }
        };
        self.set_fetch(opened.fetch);

        let media = opened.media;
        let hint = opened.hint;
        let output_kind = self.settings.output;
        let buffer_ms = self.settings.output_buffer_ms;

        let built = tokio::task::spawn_blocking(move || -> Result<Session> {
            let decoder = StreamDecoder::open(media, hint)?;
            let output = OutputStage::new(output_kind, decoder.sample_rate(), buffer_ms)?;
            Ok(Session {
                decoder,
                output,
                pending: Vec::new(),
                pending_pos: 0,
                decoder_done: false,
            })
        })
        .await
        .map_err(|e| Error::Internal(format!("Decoder setup task failed: {}", e)))
        .and_then(|result| result);

        let session = match built {
            Ok(session) => session,
            Err(e) => {
                self.abort_fetch();
                return Err(e);
            }
        };

        let total = session
            .decoder
            .total_duration()
            .map(|d| d.as_millis() as u64)
            .unwrap_or(UNKNOWN_DURATION);
        self.total_ms.store(total, Ordering::Release);
        self.elapsed_ms.store(0, Ordering::Release);

        *self.session.lock().await = Some(session);
        self.active.store(true, Ordering::Release);
        info!("Opened {}", source);
        Ok(())
    }

    async fn stop(&self) {
        let was_active = self.active.swap(false, Ordering::AcqRel);
        self.abort_fetch();
        let session = self.session.lock().await.take();
        drop(session);
        self.elapsed_ms.store(0, Ordering::Release);
        self.total_ms.store(UNKNOWN_DURATION, Ordering::Release);
        if was_active {
            debug!("Pipeline stopped");
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    async fn drive_one_step(&self) -> Result<StepOutcome> {
        if !self.is_active() {
            return Ok(StepOutcome::Idle);
        }

        let mut guard = self.session.lock().await;
        let Some(mut session) = guard.take() else {
            return Ok(StepOutcome::Idle);
        };

        let gain = level_to_gain(self.level.load(Ordering::Acquire));
        let (session, result) = tokio::task::spawn_blocking(move || {
            let result = session.step(gain);
            (session, result)
        })
        .await
        .map_err(|e| Error::Internal(format!("Decode step task failed: {}", e)))?;

        self.elapsed_ms
            .store(session.output.elapsed().as_millis() as u64, Ordering::Release);

        match result {
            Ok(StepOutcome::EndOfItem) => {
                debug!("End of item after {:?}", session.output.elapsed());
                self.finish();
                Ok(StepOutcome::EndOfItem)
            }
            Ok(outcome) => {
                // A stop during the step already cleared the active flag
                if self.is_active() {
                    *guard = Some(session);
                }
                Ok(outcome)
            }
            Err(e) => {
                warn!("Decoding stopped: {}", e);
                self.finish();
                Err(e)
            }
        }
    }

    fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms.load(Ordering::Acquire))
    }

    fn total_duration(&self) -> Option<Duration> {
        match self.total_ms.load(Ordering::Acquire) {
            UNKNOWN_DURATION => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    fn set_level(&self, level: u8) {
        self.level.store(level.min(MAX_VOLUME), Ordering::Release);
    }

    fn release_buffers(&self) -> usize {
        let mut released = 0;
        if self.abort_fetch() {
            released += 1;
        }
        if !self.is_active() {
            if let Ok(mut guard) = self.session.try_lock() {
                if guard.take().is_some() {
                    released += 1;
                }
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_to_gain() {
        assert_eq!(level_to_gain(0), 0.0);
        assert_eq!(level_to_gain(MAX_VOLUME), 1.0);
        assert_eq!(level_to_gain(255), 1.0);
        assert!((level_to_gain(10) - 10.0 / 21.0).abs() < 1e-6);
    }

    #[test]
    fn test_apply_gain() {
        let mut samples = vec![0.5, -0.5];
        apply_gain(&mut samples, 0.5);
        assert_eq!(samples, vec![0.25, -0.25]);
    }
}
