//! Cabinet simulation by FFT convolution with a recorded impulse response.
//!
//! Applied to finished renders only; fitness scoring never sees it.

use std::path::Path;

use num_complex::Complex;
use rustfft::FftPlanner;

use crate::audio::{AudioBuffer, AudioError, load_wav};

/// Speaker cabinet impulse response.
#[derive(Debug, Clone)]
pub struct Cabinet {
    ir: AudioBuffer,
}

impl Cabinet {
    /// Wrap an impulse response. Rejects an empty one.
    pub fn new(ir: AudioBuffer) -> Result<Self, AudioError> {
        if ir.is_empty() {
            return Err(AudioError::Empty);
        }
        Ok(Self { ir })
    }

    /// Load an impulse response from a WAV file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AudioError> {
        Self::new(load_wav(path)?)
    }

    pub fn impulse_response(&self) -> &AudioBuffer {
        &self.ir
    }

    /// Convolve `audio` with the impulse response, resampled to the audio's
    /// rate. The output keeps the input length; the reverb tail past the end
    /// is dropped.
    pub fn apply(&self, audio: &AudioBuffer) -> Result<AudioBuffer, AudioError> {
        let ir = self.ir.resample(audio.sample_rate)?;
        let samples = fft_convolve(&audio.samples, &ir.samples);
        Ok(AudioBuffer::new(samples, audio.sample_rate))
    }
}

/// Linear convolution of `signal` with `kernel`, truncated to `signal.len()`.
pub fn fft_convolve(signal: &[f32], kernel: &[f32]) -> Vec<f32> {
    if signal.is_empty() || kernel.is_empty() {
        return signal.to_vec();
    }

    // Zero-pad past the full output length so the circular product is linear
    let size = (signal.len() + kernel.len() - 1).next_power_of_two();
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(size);
    let ifft = planner.plan_fft_inverse(size);

    let padded = |data: &[f32]| -> Vec<Complex<f32>> {
        let mut out = vec![Complex::new(0.0, 0.0); size];
        for (slot, &x) in out.iter_mut().zip(data) {
            *slot = Complex::new(x, 0.0);
        }
        out
    };

    let mut signal_freq = padded(signal);
    let mut kernel_freq = padded(kernel);
    fft.process(&mut signal_freq);
    fft.process(&mut kernel_freq);

    for (a, b) in signal_freq.iter_mut().zip(&kernel_freq) {
        *a *= *b;
    }
    ifft.process(&mut signal_freq);

    let scale = 1.0 / size as f32;
    signal_freq[..signal.len()]
        .iter()
        .map(|c| c.re * scale)
        .collect()
}
