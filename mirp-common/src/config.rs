//! Configuration loading and music root resolution
//!
//! The player reads one optional TOML file. A missing file is never fatal: the
//! compiled defaults (which mirror the original device firmware) are used and a
//! warning is logged. A file that exists but fails to parse or validate is an
//! error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Highest output level accepted by the decode/output pipeline
pub const MAX_VOLUME: u8 = 21;

/// Environment variable overriding the music root
pub const MUSIC_ROOT_ENV: &str = "MIRP_MUSIC_ROOT";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder scanned for local items
    pub music_root: Option<PathBuf>,
    pub playback: PlaybackSettings,
    pub catalog: CatalogSettings,
    pub network: NetworkSettings,
    pub logging: LoggingConfig,
    /// Static list of streaming endpoints
    pub stations: Stations,
}

/// Playback timing and level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Initial output level (0..=MAX_VOLUME)
    pub volume: u8,
    /// Decode task scheduling period
    pub decode_period_ms: u64,
    /// Settle interval after stopping, before opening a local file
    pub settle_ms: u64,
    /// Settle interval after stopping, before connecting to a stream
    pub remote_settle_ms: u64,
    /// Upper bound on waiting for the pipeline to report stopped
    pub quiesce_timeout_ms: u64,
    /// Decoded audio buffered ahead of the output, in milliseconds
    pub output_buffer_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            volume: 10,
            decode_period_ms: 10,
            settle_ms: 300,
            remote_settle_ms: 500,
            quiesce_timeout_ms: 1000,
            output_buffer_ms: 500,
        }
    }
}

impl PlaybackSettings {
    pub fn decode_period(&self) -> Duration {
        Duration::from_millis(self.decode_period_ms)
    }
}

/// Local catalog scan settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// File extensions (without dot) accepted as playable, case-insensitive
    pub extensions: Vec<String>,
    /// Maximum number of local items kept in one snapshot
    pub max_items: usize,
    /// Directory depth scanned below the music root (1 = root only)
    pub scan_depth: usize,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            extensions: vec!["mp3".to_string()],
            max_items: 50,
            scan_depth: 1,
        }
    }
}

/// Connectivity probing and stream connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// `host:port` probed to decide whether the network route is usable
    pub probe_addr: String,
    pub probe_interval_secs: u64,
    pub probe_timeout_ms: u64,
    /// Timeout for a single stream connection attempt
    pub connect_timeout_ms: u64,
    /// Connection attempts made inside one open (1 = no retry)
    pub connect_attempts: u32,
    /// Delay before the second attempt; doubles for each further attempt
    pub connect_backoff_ms: u64,
    /// A stream delivering no data for this long is considered dropped
    pub stream_read_timeout_ms: u64,
    /// Network chunks buffered between the fetcher and the decoder
    pub chunk_queue_depth: usize,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            probe_addr: "1.1.1.1:53".to_string(),
            probe_interval_secs: 60,
            probe_timeout_ms: 3000,
            connect_timeout_ms: 5000,
            connect_attempts: 3,
            connect_backoff_ms: 500,
            stream_read_timeout_ms: 5000,
            chunk_queue_depth: 32,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level for the player crates when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// One streaming endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationConfig {
    pub name: String,
    pub url: String,
}

/// Station list; defaults to the stations shipped with the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stations(pub Vec<StationConfig>);

impl Default for Stations {
    fn default() -> Self {
        const BUILT_IN: [(&str, &str); 9] = [
            ("BBC World Service", "http://stream.live.vc.bbcmedia.co.uk/bbc_world_service"),
            ("Smooth Jazz", "http://ice1.somafm.com/smoothjazz-128-mp3"),
            ("Classic FM", "http://media-ice.musicradio.com/ClassicFMMP3"),
            ("Chill Radio", "http://ice1.somafm.com/defcon-128-mp3"),
            ("80s Hits", "http://ice1.somafm.com/u80s-128-mp3"),
            ("Jazz Radio", "http://ice1.somafm.com/gsclassic-128-mp3"),
            ("Classical", "http://stream.srg-ssr.ch/m/rsc_de/mp3_128"),
            ("Lounge", "http://ice1.somafm.com/lush-128-mp3"),
            ("Rock", "http://stream.rockantenne.de/rockantenne/stream/mp3"),
        ];
        Stations(
            BUILT_IN
                .iter()
                .map(|(name, url)| StationConfig {
                    name: name.to_string(),
                    url: url.to_string(),
                })
                .collect(),
        )
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Load configuration with graceful degradation
    ///
    /// An explicitly requested file must exist. Without one, the platform
    /// locations are searched; if none exists the defaults are returned.
    /// Returns the config and the path it was loaded from, if any.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            let config = Self::load(path)?;
            return Ok((config, Some(path.to_path_buf())));
        }

        match find_config_file() {
            Some(path) => {
                let config = Self::load(&path)?;
                Ok((config, Some(path)))
            }
            None => {
                warn!("No config file found, using compiled defaults");
                Ok((Self::default(), None))
            }
        }
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.playback.volume > MAX_VOLUME {
            return Err(Error::Config(format!(
                "playback.volume {} exceeds maximum {}",
                self.playback.volume, MAX_VOLUME
            )));
        }
        if self.playback.decode_period_ms == 0 {
            return Err(Error::Config(
                "playback.decode_period_ms must be greater than zero".to_string(),
            ));
        }
        if self.playback.output_buffer_ms == 0 {
            return Err(Error::Config(
                "playback.output_buffer_ms must be greater than zero".to_string(),
            ));
        }
        if self.catalog.extensions.is_empty() {
            return Err(Error::Config(
                "catalog.extensions must list at least one extension".to_string(),
            ));
        }
        if self.catalog.max_items == 0 || self.catalog.scan_depth == 0 {
            return Err(Error::Config(
                "catalog.max_items and catalog.scan_depth must be at least 1".to_string(),
            ));
        }
        if self.network.connect_attempts == 0 || self.network.chunk_queue_depth == 0 {
            return Err(Error::Config(
                "network.connect_attempts and network.chunk_queue_depth must be at least 1"
                    .to_string(),
            ));
        }
        for station in &self.stations.0 {
            if station.name.trim().is_empty() {
                return Err(Error::Config(format!(
                    "station with url {} has an empty name",
                    station.url
                )));
            }
            if !(station.url.starts_with("http://") || station.url.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "station '{}' url must start with http:// or https://",
                    station.name
                )));
            }
        }
        Ok(())
    }
}

/// Music root resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_music_root(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.music_root {
        return path.clone();
    }

    let fallback = default_music_root();
    info!("Music root not configured, using {}", fallback.display());
    fallback
}

/// OS-dependent default music folder
pub fn default_music_root() -> PathBuf {
    dirs::audio_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Music")))
        .unwrap_or_else(|| PathBuf::from("./music"))
}

/// Config file locations searched when none is given explicitly
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("mirp").join("config.toml"));
    }
    if cfg!(unix) {
        paths.push(PathBuf::from("/etc/mirp/config.toml"));
    }
    paths
}

fn find_config_file() -> Option<PathBuf> {
    config_search_paths().into_iter().find(|path| path.exists())
}
