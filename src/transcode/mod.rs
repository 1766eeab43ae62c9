//! PCM transcoding: whatever asset leaves this stage is in the canonical
//! uncompressed WAV container the remote service requires.

pub mod decode;
pub mod pcm;
pub mod wav;

pub use decode::{AudioDecoder, SymphoniaDecoder};
pub use pcm::PcmBuffer;

use tracing::info;

use crate::capture::{AudioAsset, CANONICAL_MIME};
use crate::error::PipelineResult;

/// Decodes arbitrary input audio and re-encodes it into the canonical
/// container. The only entry point the orchestrator calls is
/// `ensure_canonical`.
pub struct Transcoder {
    decoder: Box<dyn AudioDecoder>,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new(Box::new(SymphoniaDecoder))
    }
}

impl Transcoder {
    pub fn new(decoder: Box<dyn AudioDecoder>) -> Self {
        Self { decoder }
    }

    /// Decode the asset's payload into linear PCM.
    pub fn decode(&self, asset: &AudioAsset) -> PipelineResult<PcmBuffer> {
        self.decoder.decode(asset)
    }

    /// Serialize a PCM buffer into a canonical WAV asset. The file name's
    /// extension is rewritten to `.wav`.
    pub fn encode_canonical(&self, pcm: &PcmBuffer, file_name: &str) -> AudioAsset {
        AudioAsset::new(wav::encode(pcm), CANONICAL_MIME, file_name)
    }

    /// No-op for assets already in the canonical container; otherwise
    /// decode-then-encode. Deterministic: same input bytes produce the same
    /// output bytes.
    pub fn ensure_canonical(&self, asset: AudioAsset) -> PipelineResult<AudioAsset> {
        if asset.is_canonical() {
            return Ok(asset);
        }

        info!(
            "Converting {} ({}) to canonical WAV",
            asset.file_name(),
            asset.mime_type()
        );

        let pcm = self.decode(&asset)?;
        let canonical = self.encode_canonical(&pcm, asset.file_name());

        info!(
            "Conversion complete: {} -> {} ({} bytes, {:.2}s, {} ch @ {} Hz)",
            asset.file_name(),
            canonical.file_name(),
            canonical.size_bytes(),
            pcm.duration_seconds(),
            pcm.channel_count(),
            pcm.sample_rate()
        );

        Ok(canonical)
    }
}
