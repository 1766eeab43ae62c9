use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::progress::{PipelineState, ProgressFn, ProgressUpdate, Stage};
use crate::capture::AudioAsset;
use crate::error::{PipelineError, PipelineResult};
use crate::remote::{JobClient, PollProgress, RetryPolicy, SummaryService};
use crate::transcode::Transcoder;

/// Delay between a successful upload and the first poll, giving the remote
/// service time to begin work instead of burning early poll attempts.
pub const DEFAULT_GRACE_DELAY: Duration = Duration::from_millis(3000);

/// Composes transcoder and job client into one workflow:
/// accept asset → transcode if needed → upload → grace wait → poll → result.
///
/// One workflow runs at a time per instance, and callers own their
/// instances; there is no process-wide shared orchestrator. Cancellation is
/// cooperative and takes effect at the next suspension point; a cancelled
/// instance stays cancelled.
pub struct Orchestrator {
    transcoder: Transcoder,
    client: JobClient,
    policy: RetryPolicy,
    grace_delay: Duration,
    cancel: CancellationToken,
    state: Mutex<PipelineState>,
}

impl Orchestrator {
    pub fn new(service: Arc<dyn SummaryService>) -> Self {
        Self::with_options(service, RetryPolicy::default(), DEFAULT_GRACE_DELAY)
    }

    pub fn with_options(
        service: Arc<dyn SummaryService>,
        policy: RetryPolicy,
        grace_delay: Duration,
    ) -> Self {
        Self {
            transcoder: Transcoder::default(),
            client: JobClient::new(service),
            policy,
            grace_delay,
            cancel: CancellationToken::new(),
            state: Mutex::new(PipelineState::Idle),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark the workflow cancelled. The next suspension point (grace timer
    /// or poll backoff) resolves as `Cancelled`; an in-flight network call
    /// completes but its result is discarded.
    pub fn cancel(&self) {
        info!("Cancellation requested");
        self.cancel.cancel();
    }

    /// Run the full workflow for one asset. Errors from any stage surface
    /// here unchanged; nothing is retried at this level.
    pub async fn process(
        &self,
        asset: AudioAsset,
        on_progress: &ProgressFn,
    ) -> PipelineResult<serde_json::Value> {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match *state {
                PipelineState::Idle | PipelineState::Completed | PipelineState::Failed => {}
                _ => {
                    return Err(PipelineError::InvalidState(
                        "a workflow is already in flight".into(),
                    ))
                }
            }
            *state = PipelineState::Uploading;
        }

        let result = self.run(asset, on_progress).await;

        match &result {
            Ok(_) => {
                info!("Workflow completed");
                self.set_state(PipelineState::Completed);
            }
            Err(e) => {
                warn!("Workflow failed: {}", e);
                self.set_state(PipelineState::Failed);
            }
        }

        result
    }

    async fn run(
        &self,
        asset: AudioAsset,
        on_progress: &ProgressFn,
    ) -> PipelineResult<serde_json::Value> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        on_progress(ProgressUpdate::stage(Stage::Uploading, "Uploading audio"));
        let canonical = self.transcoder.ensure_canonical(asset)?;
        let mut job = self.client.submit(&canonical, &self.policy).await?;

        if self.cancel.is_cancelled() {
            // The upload completed, but its result is discarded.
            return Err(PipelineError::Cancelled);
        }

        self.set_state(PipelineState::WaitingForStart);
        on_progress(ProgressUpdate::stage(
            Stage::WaitingForStart,
            "Processing started",
        ));
        tokio::select! {
            _ = self.cancel.cancelled() => return Err(PipelineError::Cancelled),
            _ = tokio::time::sleep(self.grace_delay) => {}
        }

        self.set_state(PipelineState::Polling);
        on_progress(ProgressUpdate::stage(Stage::Polling, "Waiting for results"));

        let forward = |p: PollProgress| {
            on_progress(ProgressUpdate {
                stage: Stage::Polling,
                attempt: Some(p.attempt),
                max_attempts: Some(p.max_attempts),
                message: p.message,
            });
        };
        let payload = self
            .client
            .await_result(&mut job, &self.policy, &forward, &self.cancel)
            .await?;

        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        Ok(payload)
    }

    fn set_state(&self, next: PipelineState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        debug!("Pipeline state: {:?} -> {:?}", *state, next);
        *state = next;
    }
}
