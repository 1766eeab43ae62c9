use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use crate::capture::AudioAsset;
use crate::error::{PipelineError, PipelineResult};

/// Handle assigned by the remote service at upload time.
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub remote_id: String,
}

/// Outcome of one fetch-result call. "Not found yet" is the canonical
/// not-ready signal; every other non-success response is a hard error.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    NotReady,
    /// Opaque result payload; guaranteed to be a keyed record.
    Ready(serde_json::Value),
}

/// Remote analysis service: submit an asset, fetch the eventual result.
///
/// The retry policy lives in `JobClient`, not here; implementations perform
/// exactly one network operation per call.
#[async_trait]
pub trait SummaryService: Send + Sync {
    async fn submit(&self, asset: &AudioAsset) -> PipelineResult<SubmitReceipt>;
    async fn fetch_result(&self, remote_id: &str) -> PipelineResult<FetchOutcome>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    audio_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP implementation of the remote service contract:
/// `POST /upload-audio` (multipart field `file`) and `GET /summary/{id}`.
pub struct HttpSummaryService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSummaryService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Unreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl SummaryService for HttpSummaryService {
    async fn submit(&self, asset: &AudioAsset) -> PipelineResult<SubmitReceipt> {
        info!(
            "Uploading {} ({} bytes, {})",
            asset.file_name(),
            asset.size_bytes(),
            asset.mime_type()
        );

        let part = Part::bytes(asset.bytes().to_vec())
            .file_name(asset.file_name().to_string())
            .mime_str(asset.mime_type())
            .map_err(|e| {
                PipelineError::UnsupportedFormat(format!(
                    "invalid mime type '{}': {e}",
                    asset.mime_type()
                ))
            })?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/upload-audio", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::Unreachable(format!("upload failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = extract_detail(response).await;
            return Err(PipelineError::UploadRejected(format!(
                "HTTP {status}: {detail}"
            )));
        }

        let body: UploadResponse = response.json().await.map_err(|e| {
            PipelineError::RemoteProcessingError(format!("invalid upload response: {e}"))
        })?;
        let remote_id = body.audio_name.ok_or_else(|| {
            PipelineError::RemoteProcessingError("server did not return an audio name".into())
        })?;

        info!("Upload accepted, remote id: {}", remote_id);
        Ok(SubmitReceipt { remote_id })
    }

    async fn fetch_result(&self, remote_id: &str) -> PipelineResult<FetchOutcome> {
        let response = self
            .client
            .get(format!("{}/summary/{}", self.base_url, remote_id))
            .send()
            .await
            .map_err(|e| PipelineError::Unreachable(format!("result fetch failed: {e}")))?;

        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => {
                debug!("Result for {} not ready yet", remote_id);
                Ok(FetchOutcome::NotReady)
            }
            s if s.is_success() => {
                let payload: serde_json::Value = response.json().await.map_err(|e| {
                    PipelineError::RemoteProcessingError(format!("result is not valid JSON: {e}"))
                })?;
                if !payload.is_object() {
                    return Err(PipelineError::RemoteProcessingError(
                        "result payload is not a keyed record".into(),
                    ));
                }
                Ok(FetchOutcome::Ready(payload))
            }
            s => {
                let detail = extract_detail(response).await;
                Err(PipelineError::RemoteProcessingError(format!(
                    "HTTP {s}: {detail}"
                )))
            }
        }
    }
}

/// Pull a human-readable detail string out of an error response body.
async fn extract_detail(response: reqwest::Response) -> String {
    match response.json::<ErrorBody>().await {
        Ok(body) => body
            .detail
            .or(body.message)
            .unwrap_or_else(|| "no detail provided".to_string()),
        Err(_) => "no detail provided".to_string(),
    }
}
