// End-to-end workflow tests over a scripted remote service: stage ordering,
// failure surfacing, and cooperative cancellation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use consult_scribe::transcode::wav;
use consult_scribe::{
    AudioAsset, FetchOutcome, Orchestrator, PcmBuffer, PipelineError, PipelineState, ProgressUpdate,
    RetryPolicy, Stage, SubmitReceipt, SummaryService, CANONICAL_MIME,
};
use serde_json::json;

enum Fetch {
    NotReady,
    Ready(serde_json::Value),
}

struct FakeRemote {
    reject_upload: Option<String>,
    submitted_mime: Mutex<Option<String>>,
    fetch_calls: AtomicU32,
    fetches: Mutex<VecDeque<Fetch>>,
}

impl FakeRemote {
    fn new(fetches: Vec<Fetch>) -> Arc<Self> {
        Arc::new(Self {
            reject_upload: None,
            submitted_mime: Mutex::new(None),
            fetch_calls: AtomicU32::new(0),
            fetches: Mutex::new(fetches.into_iter().collect()),
        })
    }

    fn rejecting(detail: &str) -> Arc<Self> {
        Arc::new(Self {
            reject_upload: Some(detail.to_string()),
            submitted_mime: Mutex::new(None),
            fetch_calls: AtomicU32::new(0),
            fetches: Mutex::new(VecDeque::new()),
        })
    }
}

#[async_trait]
impl SummaryService for FakeRemote {
    async fn submit(&self, asset: &AudioAsset) -> Result<SubmitReceipt, PipelineError> {
        if let Some(detail) = &self.reject_upload {
            return Err(PipelineError::UploadRejected(detail.clone()));
        }
        *self.submitted_mime.lock().unwrap() = Some(asset.mime_type().to_string());
        Ok(SubmitReceipt {
            remote_id: asset.file_name().to_string(),
        })
    }

    async fn fetch_result(&self, _remote_id: &str) -> Result<FetchOutcome, PipelineError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        match self.fetches.lock().unwrap().pop_front() {
            Some(Fetch::Ready(payload)) => Ok(FetchOutcome::Ready(payload)),
            Some(Fetch::NotReady) | None => Ok(FetchOutcome::NotReady),
        }
    }
}

fn short_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        initial_delay: Duration::from_millis(1),
        backoff_multiplier: 1.5,
        max_delay: Duration::from_millis(2),
    }
}

fn canonical_asset() -> AudioAsset {
    let pcm = PcmBuffer::new(16000, vec![vec![0.05; 160]]).expect("valid pcm");
    AudioAsset::new(wav::encode(&pcm), CANONICAL_MIME, "visit.wav")
}

fn progress_sink() -> (
    Arc<Mutex<Vec<Stage>>>,
    impl Fn(ProgressUpdate) + Send + Sync,
) {
    let stages: Arc<Mutex<Vec<Stage>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stages);
    let on_progress = move |update: ProgressUpdate| {
        sink.lock().unwrap().push(update.stage);
    };
    (stages, on_progress)
}

#[tokio::test]
async fn happy_path_reports_stages_and_returns_payload() -> Result<()> {
    let payload = json!({"summary": "routine check-up", "follow_up": "none"});
    let remote = FakeRemote::new(vec![Fetch::NotReady, Fetch::Ready(payload.clone())]);
    let orchestrator = Orchestrator::with_options(
        remote.clone(),
        short_policy(),
        Duration::from_millis(5),
    );

    let (stages, on_progress) = progress_sink();
    let result = orchestrator.process(canonical_asset(), &on_progress).await?;

    assert_eq!(result, payload);
    assert_eq!(orchestrator.state(), PipelineState::Completed);
    assert_eq!(remote.fetch_calls.load(Ordering::SeqCst), 2);

    let stages = stages.lock().unwrap();
    assert_eq!(stages[0], Stage::Uploading);
    assert_eq!(stages[1], Stage::WaitingForStart);
    assert_eq!(stages[2], Stage::Polling);
    Ok(())
}

#[tokio::test]
async fn non_canonical_input_is_transcoded_before_upload() -> Result<()> {
    // WAV payload labeled webm: the orchestrator must re-encode it and
    // upload canonical bytes.
    let pcm = PcmBuffer::new(16000, vec![vec![0.1; 80]]).expect("valid pcm");
    let asset = AudioAsset::new(wav::encode(&pcm), "audio/webm", "visit.webm");

    let remote = FakeRemote::new(vec![Fetch::Ready(json!({"ok": true}))]);
    let orchestrator = Orchestrator::with_options(
        remote.clone(),
        short_policy(),
        Duration::from_millis(1),
    );

    orchestrator.process(asset, &|_| {}).await?;

    assert_eq!(
        remote.submitted_mime.lock().unwrap().as_deref(),
        Some(CANONICAL_MIME)
    );
    Ok(())
}

#[tokio::test]
async fn upload_rejection_fails_the_workflow_without_polling() {
    let remote = FakeRemote::rejecting("unsupported container");
    let orchestrator = Orchestrator::with_options(
        remote.clone(),
        short_policy(),
        Duration::from_millis(1),
    );

    let result = orchestrator.process(canonical_asset(), &|_| {}).await;

    assert!(matches!(result, Err(PipelineError::UploadRejected(_))));
    assert_eq!(orchestrator.state(), PipelineState::Failed);
    assert_eq!(remote.fetch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn polling_timeout_surfaces_as_failed() {
    let remote = FakeRemote::new(vec![]);
    let orchestrator = Orchestrator::with_options(
        remote.clone(),
        short_policy(),
        Duration::from_millis(1),
    );

    let result = orchestrator.process(canonical_asset(), &|_| {}).await;

    assert!(matches!(result, Err(PipelineError::ResultTimeout(_))));
    assert_eq!(orchestrator.state(), PipelineState::Failed);
    assert_eq!(remote.fetch_calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn cancel_during_grace_delay_issues_no_poll() -> Result<()> {
    let remote = FakeRemote::new(vec![Fetch::Ready(json!({"ok": true}))]);
    let orchestrator = Arc::new(Orchestrator::with_options(
        remote.clone(),
        short_policy(),
        Duration::from_secs(30),
    ));

    let worker = Arc::clone(&orchestrator);
    let handle = tokio::spawn(async move {
        let on_progress = |_: ProgressUpdate| {};
        worker.process(canonical_asset(), &on_progress).await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(orchestrator.state(), PipelineState::WaitingForStart);
    orchestrator.cancel();

    let result = handle.await?;
    assert!(matches!(result, Err(PipelineError::Cancelled)));
    assert_eq!(remote.fetch_calls.load(Ordering::SeqCst), 0, "no poll issued");
    assert_eq!(orchestrator.state(), PipelineState::Failed);
    Ok(())
}

#[tokio::test]
async fn a_cancelled_orchestrator_fails_fast() {
    let remote = FakeRemote::new(vec![]);
    let orchestrator = Orchestrator::with_options(
        remote,
        short_policy(),
        Duration::from_millis(1),
    );

    orchestrator.cancel();
    let result = orchestrator.process(canonical_asset(), &|_| {}).await;
    assert!(matches!(result, Err(PipelineError::Cancelled)));
}

#[tokio::test]
async fn concurrent_process_calls_are_rejected() -> Result<()> {
    let remote = FakeRemote::new(vec![]);
    let orchestrator = Arc::new(Orchestrator::with_options(
        remote,
        short_policy(),
        Duration::from_secs(30),
    ));

    let worker = Arc::clone(&orchestrator);
    let handle = tokio::spawn(async move {
        worker.process(canonical_asset(), &|_: ProgressUpdate| {}).await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = orchestrator.process(canonical_asset(), &|_| {}).await;
    assert!(matches!(second, Err(PipelineError::InvalidState(_))));

    orchestrator.cancel();
    let first = handle.await?;
    assert!(matches!(first, Err(PipelineError::Cancelled)));
    Ok(())
}

#[tokio::test]
async fn polling_progress_carries_attempt_counters() -> Result<()> {
    let remote = FakeRemote::new(vec![
        Fetch::NotReady,
        Fetch::NotReady,
        Fetch::Ready(json!({"ok": true})),
    ]);
    let orchestrator = Orchestrator::with_options(
        remote,
        short_policy(),
        Duration::from_millis(1),
    );

    let attempts: Arc<Mutex<Vec<(u32, u32)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&attempts);
    let on_progress = move |update: ProgressUpdate| {
        if let (Some(attempt), Some(max)) = (update.attempt, update.max_attempts) {
            sink.lock().unwrap().push((attempt, max));
        }
    };

    orchestrator.process(canonical_asset(), &on_progress).await?;
    assert_eq!(*attempts.lock().unwrap(), vec![(1, 5), (2, 5)]);
    Ok(())
}
