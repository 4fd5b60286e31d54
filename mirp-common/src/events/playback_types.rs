//! Playback-related type definitions
//!
//! Supporting types for playback mode, state and failure reporting.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Content source the player is currently driven from
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// Files resolved from the removable storage volume
    #[default]
    LocalCatalog,
    /// Live network audio streams from the station list
    RemoteStream,
}

impl PlaybackMode {
    /// Both modes, local first
    pub const ALL: [PlaybackMode; 2] = [PlaybackMode::LocalCatalog, PlaybackMode::RemoteStream];

    /// Whether "end of item" is meaningful (and auto-advance allowed) in this mode
    pub fn auto_advances(self) -> bool {
        matches!(self, PlaybackMode::LocalCatalog)
    }
}

impl std::fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackMode::LocalCatalog => write!(f, "local"),
            PlaybackMode::RemoteStream => write!(f, "radio"),
        }
    }
}

impl FromStr for PlaybackMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "music" | "sd" | "local_catalog" => Ok(PlaybackMode::LocalCatalog),
            "radio" | "remote" | "stream" | "remote_stream" => Ok(PlaybackMode::RemoteStream),
            other => Err(Error::InvalidInput(format!(
                "unknown playback mode '{}' (expected local or radio)",
                other
            ))),
        }
    }
}

/// Why the last transition attempt failed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Selected local item is no longer resolvable on storage
    NotFound,
    /// Remote item attempted while the network route is unavailable
    Unreachable,
    /// Pipeline could not open a remote source despite an available route
    ConnectionRefused,
    /// Pipeline could not open a local source
    OpenFailed,
    /// The active mode's catalog has no items
    EmptyCatalog,
    /// A live stream stopped delivering audio while playing
    StreamLost,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::NotFound => write!(f, "item not found on storage"),
            FailureReason::Unreachable => write!(f, "network unreachable"),
            FailureReason::ConnectionRefused => write!(f, "connection refused"),
            FailureReason::OpenFailed => write!(f, "could not open item"),
            FailureReason::EmptyCatalog => write!(f, "nothing to play"),
            FailureReason::StreamLost => write!(f, "stream lost"),
        }
    }
}

/// Playback state enumeration
///
/// A single instance exists per player; only the playback controller mutates it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Transitioning,
    Failed { reason: FailureReason },
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            PlaybackState::Failed { reason } => Some(*reason),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Transitioning => write!(f, "transitioning"),
            PlaybackState::Failed { reason } => write!(f, "failed ({})", reason),
        }
    }
}
