//! Error types for mirp-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use mirp_common::{FailureReason, PlaybackMode};
use thiserror::Error;

/// Main error type for mirp-ap module
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog listing errors
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Selected local item no longer present on storage
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote item requested while the network route is down
    #[error("Network unreachable: {0}")]
    Unreachable(String),

    /// Remote endpoint could not be opened although the route is up
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// Local source could not be opened by the pipeline
    #[error("Open failed: {0}")]
    OpenFailed(String),

    /// Active mode's catalog has no items
    #[error("No items available in {0} mode")]
    EmptyCatalog(PlaybackMode),

    /// Index outside the mode's catalog
    #[error("Index {index} out of range for {mode} catalog of {count} items")]
    InvalidIndex {
        mode: PlaybackMode,
        index: usize,
        count: usize,
    },

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Errors surfaced from the shared library
    #[error(transparent)]
    Common(#[from] mirp_common::Error),
}

impl Error {
    /// Failure reason recorded in the state machine when a transition fails with this error
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            Error::NotFound(_) => FailureReason::NotFound,
            Error::Unreachable(_) => FailureReason::Unreachable,
            Error::ConnectionRefused(_) => FailureReason::ConnectionRefused,
            Error::EmptyCatalog(_) => FailureReason::EmptyCatalog,
            _ => FailureReason::OpenFailed,
        }
    }
}

/// Convenience Result type using mirp-ap Error
pub type Result<T> = std::result::Result<T, Error>;
