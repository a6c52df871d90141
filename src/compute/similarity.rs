//! Acoustic similarity between a rendered candidate and the target recording.
//!
//! Two measures are combined by weight:
//!
//! - time domain: `1 - mean(|a - b|)` over the leading window
//! - frequency domain: `1 / (1 + mean_frame_distance / tolerance)` over STFT magnitudes
//!
//! STFT frames are centered: the signal is reflect-padded by `N_FFT / 2` on
//! each side, giving `1 + len / HOP_LENGTH` frames. Signals too short to
//! reflect fall back to zero padding where the mirror runs out.

use std::sync::Arc;

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::audio::{AudioBuffer, AudioError};
use crate::schema::{SimilarityConfig, SimilarityMetric};

/// STFT frame size.
pub const N_FFT: usize = 2048;
/// STFT hop size.
pub const HOP_LENGTH: usize = 512;

/// Errors raised while scoring.
#[derive(Debug, thiserror::Error)]
pub enum SimilarityError {
    #[error("Cannot score an empty signal")]
    EmptySignal,
    #[error("No similarity metrics configured")]
    NoMetrics,
    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Scores how close a candidate sounds to a target. Higher is better.
pub trait SimilarityOracle: Send + Sync {
    fn score(&self, candidate: &AudioBuffer, target: &AudioBuffer)
    -> Result<f32, SimilarityError>;
}

/// Weighted combination of time- and frequency-domain similarity.
pub struct SimilarityScorer {
    config: SimilarityConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
}

impl SimilarityScorer {
    /// Create a scorer with a cached FFT plan.
    pub fn new(config: SimilarityConfig) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(N_FFT);
        Self {
            config,
            fft,
            window: hann_window(N_FFT),
        }
    }

    /// Score a single metric.
    pub fn metric_score(
        &self,
        metric: &SimilarityMetric,
        candidate: &[f32],
        target: &[f32],
    ) -> f32 {
        match metric {
            SimilarityMetric::TimeDomain => time_domain_similarity(candidate, target),
            SimilarityMetric::FrequencyDomain { tolerance } => {
                let a = self.stft_magnitudes(candidate);
                let b = self.stft_magnitudes(target);
                spectral_similarity(&a, &b, *tolerance)
            }
        }
    }

    /// Magnitude spectrogram of centered frames, one `Vec` of `N_FFT / 2 + 1`
    /// bins per frame.
    pub fn stft_magnitudes(&self, samples: &[f32]) -> Vec<Vec<f32>> {
        let frames = 1 + samples.len() / HOP_LENGTH;
        let bins = N_FFT / 2 + 1;
        let pad = (N_FFT / 2) as isize;

        let mut buffer = vec![Complex::new(0.0f32, 0.0); N_FFT];
        let mut spectrogram = Vec::with_capacity(frames);

        for frame in 0..frames {
            let start = (frame * HOP_LENGTH) as isize - pad;
            for (i, slot) in buffer.iter_mut().enumerate() {
                let sample = reflected(samples, start + i as isize);
                *slot = Complex::new(sample * self.window[i], 0.0);
            }

            self.fft.process(&mut buffer);
            spectrogram.push(buffer[..bins].iter().map(|c| c.norm()).collect());
        }

        spectrogram
    }
}

/// Sample at `index`, mirrored about the first and last samples when out of
/// range (the edge sample itself is not repeated). Zero past the mirror.
fn reflected(samples: &[f32], index: isize) -> f32 {
    let len = samples.len() as isize;
    let mirrored = if index < 0 {
        -index
    } else if index >= len {
        2 * (len - 1) - index
    } else {
        index
    };

    if (0..len).contains(&mirrored) {
        samples[mirrored as usize]
    } else {
        0.0
    }
}

impl SimilarityOracle for SimilarityScorer {
    fn score(
        &self,
        candidate: &AudioBuffer,
        target: &AudioBuffer,
    ) -> Result<f32, SimilarityError> {
        if self.config.metrics.is_empty() {
            return Err(SimilarityError::NoMetrics);
        }
        if candidate.is_empty() || target.is_empty() {
            return Err(SimilarityError::EmptySignal);
        }

        let resampled;
        let candidate = if candidate.sample_rate != target.sample_rate {
            resampled = candidate.resample(target.sample_rate)?;
            &resampled
        } else {
            candidate
        };

        let duration = self.config.duration_seconds;
        let a = candidate.head(duration);
        let b = target.head(duration);
        let len = a.len().min(b.len());
        if len == 0 {
            return Err(SimilarityError::EmptySignal);
        }
        let (a, b) = (&a[..len], &b[..len]);

        let total_weight: f32 = self.config.metrics.iter().map(|m| m.weight).sum();
        let combined = self
            .config
            .metrics
            .iter()
            .map(|m| self.metric_score(&m.metric, a, b) * m.weight)
            .sum::<f32>()
            / total_weight.max(1e-6);

        Ok(combined)
    }
}

/// `1 - mean(|a - b|)` over the common length.
pub fn time_domain_similarity(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }
    let total: f32 = a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum();
    1.0 - total / len as f32
}

/// `1 / (1 + mean_frame_l2 / tolerance)` over the common frame count.
pub fn spectral_similarity(a: &[Vec<f32>], b: &[Vec<f32>], tolerance: f32) -> f32 {
    let frames = a.len().min(b.len());
    if frames == 0 {
        return 0.0;
    }

    let mean_distance = a
        .iter()
        .zip(b)
        .map(|(fa, fb)| {
            fa.iter()
                .zip(fb)
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f32>()
                .sqrt()
        })
        .sum::<f32>()
        / frames as f32;

    1.0 / (1.0 + mean_distance / tolerance.max(1e-6))
}

/// Periodic Hann window.
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = std::f32::consts::TAU * i as f32 / size as f32;
            0.5 - 0.5 * phase.cos()
        })
        .collect()
}
