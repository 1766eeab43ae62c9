use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::asset::AudioAsset;
use super::device::{negotiate_encoding, CaptureDevice, DeviceConstraints};
use crate::error::{PipelineError, PipelineResult};

/// Lifecycle state of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    /// Chunks are frozen (device disconnected) but the session has not been
    /// consumed by `stop` or `discard` yet.
    Stopped,
}

/// Snapshot of the active session for callers that display progress.
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub state: SessionState,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    pub encoding: Option<String>,
    pub chunk_count: usize,
    pub byte_count: usize,
}

struct ActiveSession {
    encoding: String,
    started_at: DateTime<Utc>,
    started: Instant,
    /// Encoded chunks in arrival order
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
    /// Set before closing the device so the accumulator can tell a requested
    /// stop from a disconnection
    stopping: Arc<AtomicBool>,
    device_lost: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Turns a live capture device into a finished `AudioAsset`.
///
/// At most one session records at a time per controller. The device is
/// released on every exit path: normal stop, error, and discard.
pub struct CaptureController {
    device: Box<dyn CaptureDevice>,
    session: Option<ActiveSession>,
}

impl CaptureController {
    pub fn new(device: Box<dyn CaptureDevice>) -> Self {
        Self {
            device,
            session: None,
        }
    }

    /// Acquire the device and start accumulating chunks.
    pub async fn start(&mut self, constraints: DeviceConstraints) -> PipelineResult<()> {
        if self.session.is_some() {
            return Err(PipelineError::InvalidState(
                "a recording session is already active".into(),
            ));
        }

        let encoding = negotiate_encoding(&*self.device);
        info!(
            "Starting capture on '{}' using {}",
            self.device.name(),
            encoding
        );

        let mut rx = self.device.open(&constraints, &encoding).await?;

        let chunks = Arc::new(Mutex::new(Vec::new()));
        let stopping = Arc::new(AtomicBool::new(false));
        let device_lost = Arc::new(AtomicBool::new(false));

        let task_chunks = Arc::clone(&chunks);
        let task_stopping = Arc::clone(&stopping);
        let task_lost = Arc::clone(&device_lost);

        let task = tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                if chunk.bytes.is_empty() {
                    continue;
                }
                task_chunks.lock().await.push(chunk.bytes);
            }

            // End-of-stream without a requested stop means the device went
            // away underneath us.
            if !task_stopping.load(Ordering::SeqCst) {
                warn!("Capture stream ended unexpectedly (device lost)");
                task_lost.store(true, Ordering::SeqCst);
            }
        });

        self.session = Some(ActiveSession {
            encoding,
            started_at: Utc::now(),
            started: Instant::now(),
            chunks,
            stopping,
            device_lost,
            task,
        });

        Ok(())
    }

    /// Stop capturing and assemble the recorded chunks into one asset.
    pub async fn stop(&mut self) -> PipelineResult<AudioAsset> {
        let session = self.session.take().ok_or_else(|| {
            PipelineError::InvalidState("stop requested with no active recording".into())
        })?;

        session.stopping.store(true, Ordering::SeqCst);
        self.release_device().await;

        // The close above drops the device's sender; wait for the
        // accumulator to drain the remaining chunks.
        if let Err(e) = session.task.await {
            error!("Capture accumulator task panicked: {}", e);
        }

        let collected: Vec<Vec<u8>> = {
            let mut guard = session.chunks.lock().await;
            guard.drain(..).collect()
        };
        let chunk_count = collected.len();
        let bytes = collected.concat();

        info!(
            "Capture stopped after {:.1}s: {} chunks, {} bytes",
            session.started.elapsed().as_secs_f64(),
            chunk_count,
            bytes.len()
        );

        if session.device_lost.load(Ordering::SeqCst) {
            let partial = if bytes.is_empty() {
                None
            } else {
                Some(Self::assemble(bytes, &session.encoding))
            };
            return Err(PipelineError::DeviceUnavailable {
                reason: "capture device disconnected during recording".into(),
                partial,
            });
        }

        if bytes.is_empty() {
            return Err(PipelineError::EmptyRecording);
        }

        Ok(Self::assemble(bytes, &session.encoding))
    }

    /// Release the device and drop any captured data. Idempotent.
    pub async fn discard(&mut self) -> PipelineResult<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };

        session.stopping.store(true, Ordering::SeqCst);
        self.release_device().await;

        if let Err(e) = session.task.await {
            error!("Capture accumulator task panicked: {}", e);
        }

        info!("Recording discarded");
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        match &self.session {
            None => SessionState::Idle,
            Some(s) if s.device_lost.load(Ordering::SeqCst) => SessionState::Stopped,
            Some(_) => SessionState::Recording,
        }
    }

    pub async fn stats(&self) -> SessionStats {
        match &self.session {
            None => SessionStats {
                state: SessionState::Idle,
                started_at: None,
                duration_seconds: 0.0,
                encoding: None,
                chunk_count: 0,
                byte_count: 0,
            },
            Some(s) => {
                let guard = s.chunks.lock().await;
                SessionStats {
                    state: self.state(),
                    started_at: Some(s.started_at),
                    duration_seconds: s.started.elapsed().as_secs_f64(),
                    encoding: Some(s.encoding.clone()),
                    chunk_count: guard.len(),
                    byte_count: guard.iter().map(|c| c.len()).sum(),
                }
            }
        }
    }

    async fn release_device(&mut self) {
        if let Err(e) = self.device.close().await {
            warn!("Failed to close capture device cleanly: {}", e);
        }
    }

    fn assemble(bytes: Vec<u8>, encoding: &str) -> AudioAsset {
        let file_name = format!("recording-{}", Uuid::new_v4());
        AudioAsset::new(bytes, encoding.to_string(), file_name)
    }
}
