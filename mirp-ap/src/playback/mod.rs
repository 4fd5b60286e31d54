//! Playback orchestration: controller state machine, decode task and the
//! resource handoff between items

pub mod controller;
pub mod decode_task;
pub mod handoff;
pub mod pipeline;
pub mod selection;

pub use controller::{ControllerSettings, PlaybackController};
pub use decode_task::{spawn_decode_runtime, DecodeRuntime, DecodeSignal, DecodeTask};
pub use handoff::{HandoffSettings, QuiesceOutcome};
pub use pipeline::{DecodePipeline, StepOutcome};
pub use selection::Selection;
