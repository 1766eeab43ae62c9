use crate::error::{PipelineError, PipelineResult};

/// Decoded linear PCM, one sample sequence per channel.
///
/// Samples are nominally in [-1.0, 1.0]; anything outside is clamped at
/// encode time. All channels hold the same number of samples.
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl PcmBuffer {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> PipelineResult<Self> {
        if channels.is_empty() {
            return Err(PipelineError::InvalidState(
                "pcm buffer requires at least one channel".into(),
            ));
        }
        let len = channels[0].len();
        if channels.iter().any(|c| c.len() != len) {
            return Err(PipelineError::InvalidState(
                "pcm channels must have equal sample counts".into(),
            ));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel
    pub fn sample_count(&self) -> usize {
        self.channels[0].len()
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn duration_seconds(&self) -> f64 {
        self.sample_count() as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_channels() {
        assert!(PcmBuffer::new(44100, vec![]).is_err());
    }

    #[test]
    fn rejects_ragged_channels() {
        let result = PcmBuffer::new(44100, vec![vec![0.0; 10], vec![0.0; 9]]);
        assert!(result.is_err());
    }

    #[test]
    fn duration_from_rate_and_count() {
        let pcm = PcmBuffer::new(44100, vec![vec![0.0; 44100]]).unwrap();
        assert!((pcm.duration_seconds() - 1.0).abs() < f64::EPSILON);
    }
}
