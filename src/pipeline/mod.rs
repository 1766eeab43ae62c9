//! Processing orchestrator: the single entry point external callers use to
//! turn an audio asset into a remote analysis result, with stage/progress
//! callbacks and cooperative cancellation.

pub mod orchestrator;
pub mod progress;

pub use orchestrator::{Orchestrator, DEFAULT_GRACE_DELAY};
pub use progress::{
    PipelineState, ProcessingReport, ProgressFn, ProgressUpdate, Stage,
};
