//! Byte sources for the decoder
//!
//! Local items are plain files. Network streams are fetched by an async
//! `reqwest` task that forwards body chunks through a bounded channel; the
//! decoder reads them on a blocking thread through [`HttpStreamReader`].

use crate::error::{Error, Result};
use mirp_common::config::NetworkSettings;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use symphonia::core::io::MediaSource;
use symphonia::core::probe::Hint;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Network stream connection behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    pub connect_timeout: Duration,
    pub connect_attempts: u32,
    pub connect_backoff: Duration,
    pub read_timeout: Duration,
    pub chunk_queue_depth: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self::from(&NetworkSettings::default())
    }
}

impl From<&NetworkSettings> for StreamSettings {
    fn from(settings: &NetworkSettings) -> Self {
        Self {
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            connect_attempts: settings.connect_attempts.max(1),
            connect_backoff: Duration::from_millis(settings.connect_backoff_ms),
            read_timeout: Duration::from_millis(settings.stream_read_timeout_ms),
            chunk_queue_depth: settings.chunk_queue_depth.max(1),
        }
    }
}

/// A source ready for probing
pub struct OpenedSource {
    pub media: Box<dyn MediaSource>,
    pub hint: Hint,
    /// Network fetch task; aborting it ends the stream
    pub fetch: Option<JoinHandle<()>>,
}

/// Open a local file
pub fn open_local(path: &Path) -> Result<OpenedSource> {
    let file = std::fs::File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
        _ => Error::OpenFailed(format!("{}: {}", path.display(), e)),
    })?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    Ok(OpenedSource {
        media: Box::new(file),
        hint,
        fetch: None,
    })
}

/// Connect to a network stream and start fetching it
///
/// Makes up to `connect_attempts` attempts, each bounded by
/// `connect_timeout`, waiting `connect_backoff` (doubling) in between.
pub async fn open_remote(
    client: &reqwest::Client,
    uri: &str,
    settings: &StreamSettings,
) -> Result<OpenedSource> {
    let mut last_error = String::new();
    let mut backoff = settings.connect_backoff;

    for attempt in 1..=settings.connect_attempts {
        match tokio::time::timeout(settings.connect_timeout, client.get(uri).send()).await {
            Ok(Ok(response)) if response.status().is_success() => {
                info!("Connected to {} (attempt {})", uri, attempt);
                return Ok(start_fetch(response, uri, settings));
            }
            Ok(Ok(response)) => last_error = format!("HTTP {}", response.status()),
            Ok(Err(e)) => last_error = e.to_string(),
            Err(_) => {
                last_error = format!(
                    "no response within {} ms",
                    settings.connect_timeout.as_millis()
                )
            }
        }

        warn!(
            "Connect attempt {}/{} to {} failed: {}",
            attempt, settings.connect_attempts, uri, last_error
        );
        if attempt < settings.connect_attempts {
            tokio::time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2);
        }
    }

    Err(Error::ConnectionRefused(format!("{}: {}", uri, last_error)))
}

fn start_fetch(mut response: reqwest::Response, uri: &str, settings: &StreamSettings) -> OpenedSource {
    let mut hint = Hint::new();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_ascii_lowercase());
    match content_type.as_deref().and_then(extension_for_mime) {
        Some(ext) => {
            hint.with_extension(ext);
        }
        None => {
            if let Some(ext) = extension_for_uri(uri) {
                hint.with_extension(&ext);
            }
        }
    }

    let (tx, rx) = mpsc::channel::<Vec<u8>>(settings.chunk_queue_depth);
    let uri_owned = uri.to_string();
    let fetch = tokio::spawn(async move {
        let mut received: u64 = 0;
        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    received += bytes.len() as u64;
                    if tx.send(bytes.to_vec()).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("Stream {} ended by server", uri_owned);
                    break;
                }
                Err(e) => {
                    warn!("Stream {} read error: {}", uri_owned, e);
                    break;
                }
            }
        }
        debug!("Fetch task for {} done after {} bytes", uri_owned, received);
    });

    OpenedSource {
        media: Box::new(HttpStreamReader::new(rx, settings.read_timeout)),
        hint,
        fetch: Some(fetch),
    }
}

/// Map a stream content type to a container extension symphonia understands
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    match essence {
        "audio/mpeg" | "audio/mp3" | "audio/mpeg3" => Some("mp3"),
        "audio/aac" | "audio/aacp" | "audio/x-aac" => Some("aac"),
        "audio/ogg" | "application/ogg" => Some("ogg"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        _ => None,
    }
}

/// File extension of the last path segment of a stream URL, if it has one
pub fn extension_for_uri(uri: &str) -> Option<String> {
    let url = reqwest::Url::parse(uri).ok()?;
    let segment = url.path_segments()?.last()?;
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 4 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Blocking reader over the chunks delivered by the fetch task
///
/// Returns end-of-file once the fetch task has finished and every chunk is
/// consumed, and `TimedOut` if no data arrives for `read_timeout`.
pub struct HttpStreamReader {
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    chunk: Vec<u8>,
    pos: usize,
    read_timeout: Duration,
}

impl HttpStreamReader {
    const POLL_INTERVAL: Duration = Duration::from_millis(5);

    pub fn new(rx: mpsc::Receiver<Vec<u8>>, read_timeout: Duration) -> Self {
        Self {
            rx: Mutex::new(rx),
            chunk: Vec::new(),
            pos: 0,
            read_timeout,
        }
    }
}

impl Read for HttpStreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let waiting_since = Instant::now();
        while self.pos >= self.chunk.len() {
            let rx = self
                .rx
                .get_mut()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "stream receiver poisoned"))?;
            match rx.try_recv() {
                Ok(chunk) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Err(TryRecvError::Disconnected) => return Ok(0),
                Err(TryRecvError::Empty) => {
                    if waiting_since.elapsed() >= self.read_timeout {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "no stream data received",
                        ));
                    }
                    std::thread::sleep(Self::POLL_INTERVAL);
                }
            }
        }

        let available = &self.chunk[self.pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl Seek for HttpStreamReader {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "live streams are not seekable",
        ))
    }
}

impl MediaSource for HttpStreamReader {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}
