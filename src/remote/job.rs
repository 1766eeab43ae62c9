use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::api::{FetchOutcome, SummaryService};
use crate::capture::AudioAsset;
use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Uploading,
    AwaitingStart,
    Polling,
    Completed,
    Failed,
}

/// One upload and its polling lifecycle. Created at upload time, mutated
/// only by the client's retry loop, terminal at Completed or Failed, never
/// reused across uploads.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub remote_id: String,
    pub status: JobStatus,
    pub attempt: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
}

/// Bounded exponential backoff for the poll loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            initial_delay: Duration::from_millis(3000),
            backoff_multiplier: 1.5,
            max_delay: Duration::from_millis(10000),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows `attempt` (1-based):
    /// `min(initial * multiplier^(attempt-1), max)`, floored to whole
    /// milliseconds.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let initial = self.initial_delay.as_millis() as f64;
        let cap = self.max_delay.as_millis() as f64;
        let exponent = attempt.saturating_sub(1) as i32;
        let ms = (initial * self.backoff_multiplier.powi(exponent)).min(cap);
        Duration::from_millis(ms.floor() as u64)
    }
}

/// Progress report passed to the caller before each retry suspension.
#[derive(Debug, Clone)]
pub struct PollProgress {
    pub attempt: u32,
    pub max_attempts: u32,
    pub message: String,
}

pub type PollProgressFn = dyn Fn(PollProgress) + Send + Sync;

/// Drives the upload/poll/fetch protocol against a `SummaryService`.
///
/// Only the "not ready yet" condition is retried, and only up to the
/// policy's attempt budget; every other error is terminal on first
/// occurrence.
pub struct JobClient {
    service: Arc<dyn SummaryService>,
}

impl JobClient {
    pub fn new(service: Arc<dyn SummaryService>) -> Self {
        Self { service }
    }

    /// Upload the asset and wrap the returned handle into a fresh job.
    pub async fn submit(
        &self,
        asset: &AudioAsset,
        policy: &RetryPolicy,
    ) -> PipelineResult<UploadJob> {
        let receipt = self.service.submit(asset).await?;
        Ok(UploadJob {
            remote_id: receipt.remote_id,
            status: JobStatus::AwaitingStart,
            attempt: 0,
            max_attempts: policy.max_attempts,
            last_error: None,
        })
    }

    /// Poll fetch-result until the payload is ready, the attempt budget is
    /// exhausted, a hard error occurs, or the token is cancelled.
    ///
    /// Poll attempts are strictly sequential; the progress callback runs
    /// synchronously before each backoff suspension.
    pub async fn await_result(
        &self,
        job: &mut UploadJob,
        policy: &RetryPolicy,
        on_progress: &(dyn Fn(PollProgress) + Send + Sync),
        cancel: &CancellationToken,
    ) -> PipelineResult<serde_json::Value> {
        job.status = JobStatus::Polling;
        let wait_started = Instant::now();
        let mut attempt: u32 = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(self.fail(job, PipelineError::Cancelled));
            }

            job.attempt = attempt;
            debug!(
                "Fetching result for {} (attempt {}/{})",
                job.remote_id, attempt, policy.max_attempts
            );

            match self.service.fetch_result(&job.remote_id).await {
                Ok(FetchOutcome::Ready(payload)) => {
                    job.status = JobStatus::Completed;
                    info!(
                        "Result for {} ready after {} attempt(s) ({:.1}s)",
                        job.remote_id,
                        attempt,
                        wait_started.elapsed().as_secs_f64()
                    );
                    return Ok(payload);
                }
                Ok(FetchOutcome::NotReady) => {
                    if attempt >= policy.max_attempts {
                        let message = format!(
                            "result still not ready after {} attempts ({:.0}s of waiting); \
                             the audio may be very long or the server overloaded",
                            attempt,
                            wait_started.elapsed().as_secs_f64()
                        );
                        warn!("Polling {} timed out: {}", job.remote_id, message);
                        return Err(self.fail(job, PipelineError::ResultTimeout(message)));
                    }

                    let delay = policy.delay_for(attempt);
                    on_progress(PollProgress {
                        attempt,
                        max_attempts: policy.max_attempts,
                        message: format!(
                            "result not ready, retrying in {:.1}s ({}/{})",
                            delay.as_secs_f64(),
                            attempt,
                            policy.max_attempts
                        ),
                    });

                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return Err(self.fail(job, PipelineError::Cancelled));
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }

                    attempt += 1;
                }
                Err(e) => {
                    warn!("Polling {} hit a terminal error: {}", job.remote_id, e);
                    return Err(self.fail(job, e));
                }
            }
        }
    }

    fn fail(&self, job: &mut UploadJob, error: PipelineError) -> PipelineError {
        job.status = JobStatus::Failed;
        job.last_error = Some(error.to_string());
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_sequence_matches_contract() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=6)
            .map(|a| policy.delay_for(a).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![3000, 4500, 6750, 10000, 10000, 10000]);
    }

    #[test]
    fn backoff_floors_fractional_milliseconds() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 1.5,
            max_delay: Duration::from_millis(10000),
        };
        // 100 * 1.5^2 = 225, 100 * 1.5^3 = 337.5 -> 337
        assert_eq!(policy.delay_for(3).as_millis(), 225);
        assert_eq!(policy.delay_for(4).as_millis(), 337);
    }
}
