use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use super::pcm::PcmBuffer;
use super::wav;
use crate::capture::{extension_for_mime, AudioAsset};
use crate::error::{PipelineError, PipelineResult};

/// Compressed-audio decoding capability.
///
/// The transcoder depends only on this seam; the default implementation is
/// symphonia-backed, but tests can substitute anything that turns an asset
/// into PCM.
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, asset: &AudioAsset) -> PipelineResult<PcmBuffer>;
}

/// Default decoder: RIFF-sniffed WAV goes through the hound reader, every
/// other container through symphonia's probe.
#[derive(Debug, Default)]
pub struct SymphoniaDecoder;

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, asset: &AudioAsset) -> PipelineResult<PcmBuffer> {
        if wav::looks_like_wav(asset.bytes()) {
            debug!("Decoding '{}' via WAV fast path", asset.file_name());
            return wav::decode(asset.bytes());
        }
        decode_compressed(asset)
    }
}

fn decode_compressed(asset: &AudioAsset) -> PipelineResult<PcmBuffer> {
    let cursor = Cursor::new(asset.bytes().to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(extension_for_mime(asset.mime_type()));

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| {
            PipelineError::UnsupportedFormat(format!(
                "no local decoder for {}: {e}",
                asset.mime_type()
            ))
        })?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| {
            PipelineError::UnsupportedFormat(format!(
                "no audio track found in {}",
                asset.file_name()
            ))
        })?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| {
            PipelineError::UnsupportedFormat(format!(
                "codec in {} cannot be decoded locally: {e}",
                asset.file_name()
            ))
        })?;

    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let mut channels: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // End of stream surfaces as an I/O error in symphonia
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => {
                return Err(PipelineError::CorruptAudio(format!(
                    "demux failed partway through {}: {e}",
                    asset.file_name()
                )))
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                let channel_count = spec.channels.count();
                if channels.is_empty() {
                    channels = vec![Vec::new(); channel_count];
                } else if channels.len() != channel_count {
                    return Err(PipelineError::CorruptAudio(format!(
                        "channel count changed mid-stream in {}",
                        asset.file_name()
                    )));
                }

                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                for (i, sample) in buf.samples().iter().enumerate() {
                    channels[i % channel_count].push(*sample);
                }
            }
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => {
                return Err(PipelineError::CorruptAudio(format!(
                    "decode failed partway through {}: {e}",
                    asset.file_name()
                )))
            }
        }
    }

    if channels.is_empty() || channels[0].is_empty() {
        return Err(PipelineError::CorruptAudio(format!(
            "no audio frames decoded from {}",
            asset.file_name()
        )));
    }

    debug!(
        "Decoded {}: {} channels, {} samples at {} Hz",
        asset.file_name(),
        channels.len(),
        channels[0].len(),
        sample_rate
    );

    PcmBuffer::new(sample_rate, channels)
}
