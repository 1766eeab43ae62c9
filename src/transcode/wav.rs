//! Canonical WAV container: 44-byte little-endian header, 16-bit PCM data.
//!
//! The encoder is a binary contract: for a buffer of `n` samples over `c`
//! channels the output is exactly `44 + n * c * 2` bytes, and the header
//! fields are byte-exact. The writer is hand-rolled for that reason; reading
//! goes through hound.

use std::io::Cursor;

use hound::{SampleFormat, WavReader};

use super::pcm::PcmBuffer;
use crate::error::{PipelineError, PipelineResult};

pub const HEADER_LEN: usize = 44;

/// Serialize PCM into the canonical container.
///
/// Channels are interleaved sample-by-sample; each float is clamped to
/// [-1.0, 1.0] and quantized to signed 16-bit with the asymmetric
/// two's-complement range (negative scaled by 32768, non-negative by 32767).
pub fn encode(pcm: &PcmBuffer) -> Vec<u8> {
    let channel_count = pcm.channel_count() as u16;
    let sample_count = pcm.sample_count();
    let data_len = (sample_count * channel_count as usize * 2) as u32;
    let byte_rate = pcm.sample_rate() * channel_count as u32 * 2;
    let block_align = channel_count * 2;

    let mut out = Vec::with_capacity(HEADER_LEN + data_len as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size (PCM)
    out.extend_from_slice(&1u16.to_le_bytes()); // audio format code: PCM
    out.extend_from_slice(&channel_count.to_le_bytes());
    out.extend_from_slice(&pcm.sample_rate().to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());

    for i in 0..sample_count {
        for channel in pcm.channels() {
            out.extend_from_slice(&quantize(channel[i]).to_le_bytes());
        }
    }

    out
}

/// Parse a canonical (or any 16-bit / float PCM) WAV back into a PcmBuffer.
pub fn decode(bytes: &[u8]) -> PipelineResult<PcmBuffer> {
    let reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| PipelineError::CorruptAudio(format!("invalid WAV container: {e}")))?;
    let spec = reader.spec();
    let channel_count = spec.channels as usize;
    if channel_count == 0 {
        return Err(PipelineError::CorruptAudio(
            "WAV header declares zero channels".into(),
        ));
    }

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .map(|s| s.map(dequantize))
            .collect::<Result<_, _>>()
            .map_err(|e| PipelineError::CorruptAudio(format!("failed to read samples: {e}")))?,
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| PipelineError::CorruptAudio(format!("failed to read samples: {e}")))?,
        (format, bits) => {
            return Err(PipelineError::UnsupportedFormat(format!(
                "unsupported WAV sample format: {format:?}/{bits}-bit"
            )))
        }
    };

    if interleaved.len() % channel_count != 0 {
        return Err(PipelineError::CorruptAudio(
            "WAV data is not a whole number of frames".into(),
        ));
    }

    let mut channels = vec![Vec::with_capacity(interleaved.len() / channel_count); channel_count];
    for (i, sample) in interleaved.into_iter().enumerate() {
        channels[i % channel_count].push(sample);
    }

    PcmBuffer::new(spec.sample_rate, channels)
}

/// Sniff for the RIFF/WAVE magic that opens the canonical container.
pub fn looks_like_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

fn quantize(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0).round() as i16
    } else {
        (s * 32767.0).round() as i16
    }
}

fn dequantize(sample: i16) -> f32 {
    if sample < 0 {
        sample as f32 / 32768.0
    } else {
        sample as f32 / 32767.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_uses_asymmetric_range() {
        assert_eq!(quantize(-1.0), -32768);
        assert_eq!(quantize(1.0), 32767);
        assert_eq!(quantize(0.0), 0);
    }

    #[test]
    fn quantize_clamps_out_of_range() {
        assert_eq!(quantize(2.0), 32767);
        assert_eq!(quantize(-2.0), -32768);
    }

    #[test]
    fn dequantize_inverts_extremes() {
        assert!((dequantize(-32768) + 1.0).abs() < f32::EPSILON);
        assert!((dequantize(32767) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn wav_magic_sniffing() {
        let pcm = PcmBuffer::new(8000, vec![vec![0.0; 4]]).unwrap();
        assert!(looks_like_wav(&encode(&pcm)));
        assert!(!looks_like_wav(b"\x1a\x45\xdf\xa3 webm"));
        assert!(!looks_like_wav(b"RIFF"));
    }
}
