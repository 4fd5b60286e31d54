//! Runtime settings for the player binary
//!
//! Combines the TOML configuration with command-line overrides into the
//! settings each component is constructed from.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--music-root, --volume, --mode, --offline)
//! 2. Environment variables (MIRP_MUSIC_ROOT)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::audio::PipelineSettings;
use crate::error::{Error, Result};
use crate::playback::{ControllerSettings, HandoffSettings};
use mirp_common::config::{resolve_music_root, NetworkSettings, TomlConfig, MAX_VOLUME, MUSIC_ROOT_ENV};
use mirp_common::PlaybackMode;
use std::path::PathBuf;
use std::time::Duration;

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub music_root: Option<PathBuf>,
    pub volume: Option<u8>,
    pub mode: Option<PlaybackMode>,
    /// Treat the network as permanently unavailable
    pub offline: bool,
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub music_root: PathBuf,
    pub controller: ControllerSettings,
    pub pipeline: PipelineSettings,
    pub network: NetworkSettings,
    pub decode_period: Duration,
    pub offline: bool,
}

impl PlayerSettings {
    pub fn resolve(config: &TomlConfig, overrides: &Overrides) -> Result<Self> {
        let volume = overrides.volume.unwrap_or(config.playback.volume);
        if volume > MAX_VOLUME {
            return Err(Error::Config(format!(
                "volume {} exceeds maximum {}",
                volume, MAX_VOLUME
            )));
        }

        Ok(Self {
            music_root: resolve_music_root(overrides.music_root.as_deref(), MUSIC_ROOT_ENV, config),
            controller: ControllerSettings {
                initial_mode: overrides.mode.unwrap_or_default(),
                initial_volume: volume,
                handoff: HandoffSettings::from_playback(&config.playback),
            },
            pipeline: PipelineSettings::from_config(config),
            network: config.network.clone(),
            decode_period: config.playback.decode_period(),
            offline: overrides.offline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve() {
        let overrides = Overrides {
            music_root: Some(PathBuf::from("/media/sd")),
            ..Default::default()
        };
        let settings = PlayerSettings::resolve(&TomlConfig::default(), &overrides).unwrap();

        assert_eq!(settings.music_root, PathBuf::from("/media/sd"));
        assert_eq!(settings.controller.initial_volume, 10);
        assert_eq!(settings.controller.initial_mode, PlaybackMode::LocalCatalog);
        assert_eq!(settings.controller.handoff.settle, Duration::from_millis(300));
        assert_eq!(settings.controller.handoff.remote_settle, Duration::from_millis(500));
        assert_eq!(settings.decode_period, Duration::from_millis(10));
        assert_eq!(settings.pipeline.output_buffer_ms, 500);
        assert!(!settings.offline);
    }

    #[test]
    fn test_cli_overrides_win() {
        let overrides = Overrides {
            music_root: Some(PathBuf::from("/tmp/music")),
            volume: Some(21),
            mode: Some(PlaybackMode::RemoteStream),
            offline: true,
        };
        let settings = PlayerSettings::resolve(&TomlConfig::default(), &overrides).unwrap();

        assert_eq!(settings.controller.initial_volume, 21);
        assert_eq!(settings.controller.initial_mode, PlaybackMode::RemoteStream);
        assert!(settings.offline);
    }

    #[test]
    fn test_volume_override_out_of_range() {
        let overrides = Overrides {
            music_root: Some(PathBuf::from("/tmp/music")),
            volume: Some(22),
            ..Default::default()
        };
        assert!(matches!(
            PlayerSettings::resolve(&TomlConfig::default(), &overrides),
            Err(Error::Config(_))
        ));
    }
}
