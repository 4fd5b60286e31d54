//! # MIRP Common Library
//!
//! Shared code for the music & internet radio player:
//! - Playback mode/state vocabulary and the `PlayerEvent` bus
//! - TOML configuration loading and music root resolution
//! - Clock and display-name formatting helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::{EventBus, FailureReason, PlaybackMode, PlaybackState, PlayerEvent};
