use std::fmt;

use crate::error::{ErrorKind, PipelineError};

/// Workflow stage reported to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Uploading,
    WaitingForStart,
    Polling,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Uploading => "uploading",
            Stage::WaitingForStart => "waiting_for_start",
            Stage::Polling => "polling",
        };
        write!(f, "{label}")
    }
}

/// Observable state of an orchestrator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Uploading,
    WaitingForStart,
    Polling,
    Completed,
    Failed,
}

/// Progress report forwarded to the caller. Attempt counters are only
/// present during the polling stage.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub stage: Stage,
    pub attempt: Option<u32>,
    pub max_attempts: Option<u32>,
    pub message: String,
}

impl ProgressUpdate {
    pub fn stage(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            attempt: None,
            max_attempts: None,
            message: message.into(),
        }
    }
}

pub type ProgressFn = dyn Fn(ProgressUpdate) + Send + Sync;

/// Terminal outcome in callback form: either the opaque result payload or
/// an error kind with a human-readable detail string.
#[derive(Debug, Clone)]
pub struct ProcessingReport {
    pub ok: bool,
    pub payload: Option<serde_json::Value>,
    pub error_kind: Option<ErrorKind>,
    pub detail: Option<String>,
}

impl ProcessingReport {
    pub fn success(payload: serde_json::Value) -> Self {
        Self {
            ok: true,
            payload: Some(payload),
            error_kind: None,
            detail: None,
        }
    }

    pub fn failure(error: &PipelineError) -> Self {
        Self {
            ok: false,
            payload: None,
            error_kind: Some(error.kind()),
            detail: Some(error.to_string()),
        }
    }
}

impl From<Result<serde_json::Value, PipelineError>> for ProcessingReport {
    fn from(result: Result<serde_json::Value, PipelineError>) -> Self {
        match result {
            Ok(payload) => Self::success(payload),
            Err(e) => Self::failure(&e),
        }
    }
}
