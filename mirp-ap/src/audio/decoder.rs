//! Incremental audio decoder using symphonia
//!
//! Decodes MP3 (and whatever else the enabled symphonia features cover) one
//! packet at a time into interleaved stereo f32 samples.

use crate::error::{Error, Result};
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Output channel count of every decoded chunk
pub const OUTPUT_CHANNELS: usize = 2;

/// Packet-at-a-time decoder for one item
pub struct StreamDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    total_frames: Option<u64>,
}

impl StreamDecoder {
    /// Probe the container and create a decoder for its first audio track
    ///
    /// Probing reads from `source`, so for network streams this blocks until
    /// enough data has arrived. Call it from a blocking context.
    pub fn open(source: Box<dyn MediaSource>, hint: Hint) -> Result<Self> {
        let mss = MediaSourceStream::new(source, Default::default());

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        debug!(
            "Audio format: sample_rate={}, channels={:?}, frames={:?}",
            sample_rate,
            codec_params.channels.map(|c| c.count()),
            codec_params.n_frames
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            total_frames: codec_params.n_frames,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length of the item, when the container declares it
    pub fn total_duration(&self) -> Option<Duration> {
        self.total_frames
            .map(|frames| Duration::from_secs_f64(frames as f64 / self.sample_rate as f64))
    }

    /// Decode the next packet
    ///
    /// Returns interleaved stereo samples, or `None` once the source is
    /// exhausted. Corrupt packets are skipped; I/O failures (such as a
    /// stalled network stream) are errors.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<f32>>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!("Reached end of stream");
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    debug!("Stream parameters changed, ending item");
                    return Ok(None);
                }
                Err(e) => return Err(Error::Decode(format!("Error reading packet: {}", e))),
            };

            // Skip packets for other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let channels = decoded.spec().channels.count();
                    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
                    buffer.copy_interleaved_ref(decoded);
                    return Ok(Some(to_stereo(buffer.samples(), channels)));
                }
                Err(SymphoniaError::DecodeError(msg)) => {
                    warn!("Decode error, skipping packet: {}", msg);
                    continue;
                }
                Err(e) => return Err(Error::Decode(format!("Decoder failed: {}", e))),
            }
        }
    }
}

/// Convert interleaved samples with any channel count to interleaved stereo
///
/// Mono is duplicated; extra channels beyond the first two are dropped.
pub fn to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        2 => samples.to_vec(),
        n => samples
            .chunks_exact(n)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}
