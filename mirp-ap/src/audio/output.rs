//! Audio output stage
//!
//! Decoded stereo samples go into a lock-free ring buffer sized from
//! `output_buffer_ms`. A sink drains it in real time: either the system audio
//! device (cpal, `device-output` feature) or a paced sink that consumes
//! samples at the item's sample rate without producing sound. Either way the
//! number of rendered frames drives the elapsed-time display.

use crate::error::{Error, Result};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[cfg(feature = "device-output")]
use std::sync::atomic::AtomicBool;
#[cfg(feature = "device-output")]
use tracing::error;

/// Smallest ring buffer, in samples
const MIN_CAPACITY: usize = 4096;

/// Which sink renders the output buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Consume samples at real-time rate without a device
    Paced,
    /// Render through the default system output device
    #[cfg(feature = "device-output")]
    Device,
}

impl Default for OutputKind {
    #[cfg(feature = "device-output")]
    fn default() -> Self {
        OutputKind::Device
    }

    #[cfg(not(feature = "device-output"))]
    fn default() -> Self {
        OutputKind::Paced
    }
}

/// Ring buffer plus the sink draining it
pub struct OutputStage {
    producer: HeapProd<f32>,
    sink: Sink,
    capacity: usize,
    /// Samples accepted into the buffer
    pushed: u64,
    /// Samples taken out of the buffer by the sink
    consumed: Arc<AtomicU64>,
    sample_rate: u32,
}

enum Sink {
    Paced(PacedSink),
    #[cfg(feature = "device-output")]
    Device(DeviceSink),
}

impl OutputStage {
    /// Allocate the output buffer and start the sink
    pub fn new(kind: OutputKind, sample_rate: u32, buffer_ms: u64) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::AudioOutput("sample rate must be non-zero".to_string()));
        }
        let frames = (sample_rate as u64 * buffer_ms / 1000) as usize;
        let capacity = (frames * 2).max(MIN_CAPACITY);
        let (producer, consumer) = HeapRb::<f32>::new(capacity).split();
        let consumed = Arc::new(AtomicU64::new(0));

        let sink = match kind {
            OutputKind::Paced => Sink::Paced(PacedSink::new(consumer, sample_rate)),
            #[cfg(feature = "device-output")]
            OutputKind::Device => Sink::Device(DeviceSink::start(
                consumer,
                sample_rate,
                Arc::clone(&consumed),
            )?),
        };

        debug!(
            "Output stage ready: {:?}, {} Hz, {} samples buffered max",
            kind, sample_rate, capacity
        );

        Ok(Self {
            producer,
            sink,
            capacity,
            pushed: 0,
            consumed,
            sample_rate,
        })
    }

    /// Queue samples; returns how many were accepted
    ///
    /// Only whole stereo frames are accepted.
    pub fn push(&mut self, samples: &[f32]) -> usize {
        let fits = samples.len().min(self.vacant_len()) & !1;
        let accepted = self.producer.push_slice(&samples[..fits]);
        self.pushed += accepted as u64;
        accepted
    }

    /// Let the paced sink consume what real time allows
    ///
    /// Returns the number of frames rendered by this call.
    pub fn render(&mut self) -> usize {
        let buffered = self.buffered_len();
        match &mut self.sink {
            Sink::Paced(sink) => {
                let samples = sink.render(buffered);
                self.consumed.fetch_add(samples as u64, Ordering::Relaxed);
                samples / 2
            }
            #[cfg(feature = "device-output")]
            Sink::Device(_) => 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn vacant_len(&self) -> usize {
        self.capacity - self.buffered_len()
    }

    pub fn buffered_len(&self) -> usize {
        let consumed = self.consumed.load(Ordering::Relaxed);
        self.pushed.saturating_sub(consumed) as usize
    }

    pub fn is_drained(&self) -> bool {
        self.buffered_len() == 0
    }

    /// Audio rendered so far
    pub fn elapsed(&self) -> Duration {
        let frames = self.consumed.load(Ordering::Relaxed) / 2;
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }
}

/// Drains the buffer at the sample rate using the wall clock
struct PacedSink {
    consumer: HeapCons<f32>,
    sample_rate: u32,
    last: Instant,
    /// Fractional frames owed from the previous render
    carry: f64,
    scratch: Vec<f32>,
}

impl PacedSink {
    fn new(consumer: HeapCons<f32>, sample_rate: u32) -> Self {
        Self {
            consumer,
            sample_rate,
            last: Instant::now(),
            carry: 0.0,
            scratch: Vec::new(),
        }
    }

    /// Consume up to `buffered` samples; returns the samples consumed
    fn render(&mut self, buffered: usize) -> usize {
        let now = Instant::now();
        let due = now.duration_since(self.last).as_secs_f64() * self.sample_rate as f64 + self.carry;
        self.last = now;

        let whole = due.floor();
        let frames = (whole as usize).min(buffered / 2);
        // An empty buffer plays silence; owed time is not carried over an underrun
        self.carry = if frames < whole as usize { 0.0 } else { due - whole };

        self.scratch.resize(frames * 2, 0.0);
        self.consumer.pop_slice(&mut self.scratch)
    }
}

/// cpal output stream owned by a dedicated thread
///
/// cpal streams cannot move between threads, so the stream lives on its own
/// thread until the sink is dropped.
#[cfg(feature = "device-output")]
struct DeviceSink {
    stop: Arc<AtomicBool>,
}

#[cfg(feature = "device-output")]
impl DeviceSink {
    fn start(consumer: HeapCons<f32>, sample_rate: u32, consumed: Arc<AtomicU64>) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();

        std::thread::Builder::new()
            .name("mirp-output".to_string())
            .spawn(move || {
                let stream = match build_stream(consumer, sample_rate, consumed) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                while !flag.load(Ordering::Relaxed) {
                    std::thread::sleep(Duration::from_millis(10));
                }
                drop(stream);
                debug!("Output stream closed");
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn output thread: {}", e)))?;

        ready_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Output thread exited during startup".to_string()))??;
        Ok(Self { stop })
    }
}

#[cfg(feature = "device-output")]
impl Drop for DeviceSink {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

#[cfg(feature = "device-output")]
fn build_stream(
    mut consumer: HeapCons<f32>,
    sample_rate: u32,
    consumed: Arc<AtomicU64>,
) -> Result<cpal::Stream> {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;

    let config = cpal::StreamConfig {
        channels: 2,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let n = consumer.pop_slice(data);
                data[n..].fill(0.0);
                consumed.fetch_add(n as u64, Ordering::Relaxed);
            },
            |err| error!("Audio output stream error: {}", err),
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build output stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| Error::AudioOutput(format!("Failed to start output stream: {}", e)))?;
    Ok(stream)
}
