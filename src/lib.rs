pub mod capture;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod remote;
pub mod transcode;

pub use capture::{
    AudioAsset, BufferedDevice, CaptureChunk, CaptureController, CaptureDevice, DeviceConstraints,
    SessionState, SessionStats, CANONICAL_MIME,
};
pub use config::Config;
pub use error::{ErrorKind, PipelineError, PipelineResult};
pub use pipeline::{
    Orchestrator, PipelineState, ProcessingReport, ProgressFn, ProgressUpdate, Stage,
};
pub use remote::{
    FetchOutcome, HttpSummaryService, JobClient, JobStatus, PollProgress, RetryPolicy,
    SubmitReceipt, SummaryService, UploadJob,
};
pub use transcode::{AudioDecoder, PcmBuffer, SymphoniaDecoder, Transcoder};
