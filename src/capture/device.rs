use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{PipelineError, PipelineResult};

/// One buffer of encoded audio delivered by a capture device.
#[derive(Debug, Clone)]
pub struct CaptureChunk {
    /// Encoded audio bytes in the negotiated encoding
    pub bytes: Vec<u8>,
    /// Timestamp in milliseconds since recording started
    pub timestamp_ms: u64,
}

/// Constraints requested when opening a capture device.
#[derive(Debug, Clone)]
pub struct DeviceConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    /// Preferred capture sample rate in Hz
    pub sample_rate: u32,
}

impl Default for DeviceConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            sample_rate: 44100,
        }
    }
}

/// Encoding candidates in preference order: most compressed with best
/// compatibility first.
pub const PREFERRED_ENCODINGS: &[&str] = &[
    "audio/webm;codecs=opus",
    "audio/webm",
    "audio/mp4",
    "audio/ogg;codecs=opus",
];

/// Baseline encoding assumed recordable everywhere.
pub const FALLBACK_ENCODING: &str = "audio/webm";

/// Audio capture device capability
///
/// Any implementation that can negotiate an encoding and stream encoded
/// chunks is substitutable: a native OS audio API, a platform media
/// framework, or a scripted device for tests.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Acquire the device and start capturing in the given encoding.
    ///
    /// Returns a channel receiver that will receive encoded chunks in
    /// arrival order. The sender side is dropped when the device stops or
    /// disconnects.
    async fn open(
        &mut self,
        constraints: &DeviceConstraints,
        encoding: &str,
    ) -> PipelineResult<mpsc::Receiver<CaptureChunk>>;

    /// Flush pending data and release the device.
    async fn close(&mut self) -> PipelineResult<()>;

    /// Whether the device can record in the given encoding.
    fn supports(&self, encoding: &str) -> bool;

    /// Whether the device is currently acquired
    fn is_open(&self) -> bool;

    /// Device name for logging
    fn name(&self) -> &str;
}

/// Pick the first supported encoding from the preference list, falling back
/// to the guaranteed baseline.
pub fn negotiate_encoding(device: &dyn CaptureDevice) -> String {
    PREFERRED_ENCODINGS
        .iter()
        .find(|enc| device.supports(enc))
        .map(|enc| enc.to_string())
        .unwrap_or_else(|| FALLBACK_ENCODING.to_string())
}

/// In-memory capture device that plays back preloaded encoded chunks.
///
/// Stands in for a real device in tests and batch processing, where the
/// audio already exists as encoded bytes.
pub struct BufferedDevice {
    chunks: Vec<Vec<u8>>,
    encodings: Vec<String>,
    // Held while open so the chunk channel stays alive until close()
    keepalive: Option<mpsc::Sender<CaptureChunk>>,
}

impl BufferedDevice {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks,
            encodings: vec![FALLBACK_ENCODING.to_string()],
            keepalive: None,
        }
    }

    pub fn with_encodings(mut self, encodings: Vec<String>) -> Self {
        self.encodings = encodings;
        self
    }
}

#[async_trait]
impl CaptureDevice for BufferedDevice {
    async fn open(
        &mut self,
        _constraints: &DeviceConstraints,
        _encoding: &str,
    ) -> PipelineResult<mpsc::Receiver<CaptureChunk>> {
        if self.keepalive.is_some() {
            return Err(PipelineError::DeviceUnavailable {
                reason: "device already in use".into(),
                partial: None,
            });
        }

        let (tx, rx) = mpsc::channel(64);
        let chunks = self.chunks.clone();
        let feeder = tx.clone();
        tokio::spawn(async move {
            for (i, bytes) in chunks.into_iter().enumerate() {
                let chunk = CaptureChunk {
                    bytes,
                    timestamp_ms: i as u64 * 100,
                };
                if feeder.send(chunk).await.is_err() {
                    break;
                }
            }
        });

        // The retained sender keeps the stream open until close() drops it.
        self.keepalive = Some(tx);
        Ok(rx)
    }

    async fn close(&mut self) -> PipelineResult<()> {
        self.keepalive = None;
        Ok(())
    }

    fn supports(&self, encoding: &str) -> bool {
        self.encodings.iter().any(|e| e == encoding)
    }

    fn is_open(&self) -> bool {
        self.keepalive.is_some()
    }

    fn name(&self) -> &str {
        "buffered"
    }
}
