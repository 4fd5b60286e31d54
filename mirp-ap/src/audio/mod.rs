//! Audio decode and output
//!
//! [`SymphoniaPipeline`] implements the playback [`DecodePipeline`] for local
//! files and HTTP streams.
//!
//! [`DecodePipeline`]: crate::playback::DecodePipeline

pub mod decoder;
pub mod output;
pub mod pipeline;
pub mod source;

pub use decoder::StreamDecoder;
pub use output::{OutputKind, OutputStage};
pub use pipeline::{PipelineSettings, SymphoniaPipeline};
pub use source::StreamSettings;
