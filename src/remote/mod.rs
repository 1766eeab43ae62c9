//! Async job client: upload an audio asset, then poll the remote service for
//! the eventual result under a bounded exponential-backoff policy.

pub mod api;
pub mod job;

pub use api::{FetchOutcome, HttpSummaryService, SubmitReceipt, SummaryService};
pub use job::{JobClient, JobStatus, PollProgress, PollProgressFn, RetryPolicy, UploadJob};
