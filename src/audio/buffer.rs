//! Mono sample buffer shared by the renderer and the similarity oracle.

use serde::{Deserialize, Serialize};

use super::AudioError;

/// Mono audio signal with its sample rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioBuffer {
    /// Samples, nominally in [-1, 1].
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer from raw samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Create a silent buffer of the given length.
    pub fn silence(len: usize, sample_rate: u32) -> Self {
        Self::new(vec![0.0; len], sample_rate)
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// First `seconds` of audio as a borrowed slice.
    pub fn head(&self, seconds: f32) -> &[f32] {
        let count = (seconds.max(0.0) * self.sample_rate as f32) as usize;
        &self.samples[..count.min(self.samples.len())]
    }

    /// Keep only the first `seconds` of audio.
    pub fn trim_to_seconds(&mut self, seconds: f32) {
        let count = self.head(seconds).len();
        self.samples.truncate(count);
    }

    /// Linearly resample to `target_rate`.
    pub fn resample(&self, target_rate: u32) -> Result<AudioBuffer, AudioError> {
        if target_rate == 0 {
            return Err(AudioError::InvalidSampleRate(target_rate));
        }
        if self.sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate(self.sample_rate));
        }
        if target_rate == self.sample_rate || self.samples.is_empty() {
            return Ok(AudioBuffer::new(self.samples.clone(), target_rate));
        }

        let ratio = self.sample_rate as f64 / target_rate as f64;
        let out_len = ((self.samples.len() as f64) / ratio).round().max(1.0) as usize;
        let last = self.samples.len() - 1;

        let samples = (0..out_len)
            .map(|i| {
                let pos = i as f64 * ratio;
                let idx = (pos.floor() as usize).min(last);
                let next = (idx + 1).min(last);
                let frac = (pos - idx as f64) as f32;
                self.samples[idx] * (1.0 - frac) + self.samples[next] * frac
            })
            .collect();

        Ok(AudioBuffer::new(samples, target_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_to_seconds() {
        let mut buffer = AudioBuffer::silence(1000, 100);
        buffer.trim_to_seconds(2.5);
        assert_eq!(buffer.len(), 250);

        // Trimming past the end is a no-op
        buffer.trim_to_seconds(100.0);
        assert_eq!(buffer.len(), 250);
    }

    #[test]
    fn test_resample_halves_length() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let buffer = AudioBuffer::new(samples, 200);

        let resampled = buffer.resample(100).unwrap();
        assert_eq!(resampled.sample_rate, 100);
        assert_eq!(resampled.len(), 50);
        assert!((resampled.samples[10] - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_resample_same_rate() {
        let buffer = AudioBuffer::new(vec![0.1, 0.2, 0.3], 44100);
        let resampled = buffer.resample(44100).unwrap();
        assert_eq!(resampled, buffer);
    }

    #[test]
    fn test_resample_rejects_zero_rate() {
        let buffer = AudioBuffer::new(vec![0.1, 0.2], 44100);
        assert!(matches!(
            buffer.resample(0),
            Err(AudioError::InvalidSampleRate(0))
        ));
    }
}
