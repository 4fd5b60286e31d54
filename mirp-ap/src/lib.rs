//! # MIRP Audio Player Library (mirp-ap)
//!
//! Playback core of a music and internet radio player for constrained
//! hardware.
//!
//! **Purpose:** Keep one playback state machine in charge of two content
//! sources (local files and network streams), drive decoding from a periodic
//! task, and hand decoder and connection resources over cleanly between
//! items.
//!
//! **Architecture:** `PlaybackController` (commands, state machine) +
//! `DecodeTask` (periodic pipeline driving, end-of-item detection) +
//! `SymphoniaPipeline` (symphonia decode, ring-buffered output).

pub mod audio;
pub mod catalog;
pub mod config;
pub mod console;
pub mod error;
pub mod gate;
pub mod playback;
pub mod state;

pub use error::{Error, Result};
pub use playback::PlaybackController;
pub use state::{PlayerStatus, SharedState};
