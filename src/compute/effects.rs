//! Effect registry and DSP processors.
//!
//! Each [`EffectKind`] owns a fixed parameter schema. A genome slice of
//! normalized values in [0, 1] is mapped onto that schema and applied to a
//! mono buffer in place.

use serde::{Deserialize, Serialize};

/// A single effect parameter with its physical range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
}

impl ParamSpec {
    const fn new(name: &'static str, min: f32, max: f32) -> Self {
        Self { name, min, max }
    }

    /// Map a normalized value onto this parameter's range.
    pub fn denormalize(&self, value: f32) -> f32 {
        self.min + value.clamp(0.0, 1.0) * (self.max - self.min)
    }
}

const COMPRESSOR: &[ParamSpec] = &[
    ParamSpec::new("threshold_db", -60.0, 0.0),
    ParamSpec::new("ratio", 1.0, 20.0),
    ParamSpec::new("attack_ms", 0.1, 100.0),
    ParamSpec::new("release_ms", 10.0, 1000.0),
];

const DISTORTION: &[ParamSpec] = &[ParamSpec::new("drive_db", 0.0, 50.0)];

const CHORUS: &[ParamSpec] = &[
    ParamSpec::new("rate_hz", 0.1, 10.0),
    ParamSpec::new("depth", 0.0, 1.0),
    ParamSpec::new("centre_delay_ms", 1.0, 30.0),
    ParamSpec::new("feedback", 0.0, 0.9),
    ParamSpec::new("mix", 0.0, 1.0),
];

const DELAY: &[ParamSpec] = &[
    ParamSpec::new("delay_seconds", 0.01, 2.0),
    ParamSpec::new("feedback", 0.0, 0.95),
    ParamSpec::new("mix", 0.0, 1.0),
];

const REVERB: &[ParamSpec] = &[
    ParamSpec::new("room_size", 0.0, 1.0),
    ParamSpec::new("damping", 0.0, 1.0),
    ParamSpec::new("wet_level", 0.0, 1.0),
    ParamSpec::new("dry_level", 0.0, 1.0),
];

const GAIN: &[ParamSpec] = &[ParamSpec::new("gain_db", -24.0, 24.0)];

/// Effects available in a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    Compressor,
    Distortion,
    Chorus,
    Delay,
    Reverb,
    Gain,
}

impl EffectKind {
    /// All registered effects.
    pub const ALL: [EffectKind; 6] = [
        EffectKind::Compressor,
        EffectKind::Distortion,
        EffectKind::Chorus,
        EffectKind::Delay,
        EffectKind::Reverb,
        EffectKind::Gain,
    ];

    /// Parameter schema for this effect.
    pub fn params(&self) -> &'static [ParamSpec] {
        match self {
            EffectKind::Compressor => COMPRESSOR,
            EffectKind::Distortion => DISTORTION,
            EffectKind::Chorus => CHORUS,
            EffectKind::Delay => DELAY,
            EffectKind::Reverb => REVERB,
            EffectKind::Gain => GAIN,
        }
    }

    /// Number of genes this effect consumes.
    pub fn parameter_count(&self) -> usize {
        self.params().len()
    }

    /// Map normalized genes onto physical parameter values.
    pub fn denormalize(&self, genes: &[f32]) -> Vec<f32> {
        self.params()
            .iter()
            .zip(genes)
            .map(|(spec, &g)| spec.denormalize(g))
            .collect()
    }

    /// Apply the effect in place. `genes` must hold `parameter_count()` values.
    pub fn apply(&self, genes: &[f32], samples: &mut [f32], sample_rate: u32) {
        debug_assert_eq!(genes.len(), self.parameter_count());
        let p = self.denormalize(genes);
        let sr = sample_rate as f32;

        match self {
            EffectKind::Compressor => compress(samples, sr, p[0], p[1], p[2], p[3]),
            EffectKind::Distortion => distort(samples, p[0]),
            EffectKind::Chorus => chorus(samples, sr, p[0], p[1], p[2], p[3], p[4]),
            EffectKind::Delay => delay(samples, sr, p[0], p[1], p[2]),
            EffectKind::Reverb => reverb(samples, sr, p[0], p[1], p[2], p[3]),
            EffectKind::Gain => {
                let gain = db_to_gain(p[0]);
                samples.iter_mut().for_each(|s| *s *= gain);
            }
        }
    }
}

impl std::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

fn db_to_gain(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// One-pole smoothing coefficient for a time constant in milliseconds.
fn time_coefficient(ms: f32, sample_rate: f32) -> f32 {
    let samples = (ms * 0.001 * sample_rate).max(1.0);
    (-1.0 / samples).exp()
}

/// Feed-forward peak compressor with attack/release envelope.
fn compress(
    samples: &mut [f32],
    sample_rate: f32,
    threshold_db: f32,
    ratio: f32,
    attack_ms: f32,
    release_ms: f32,
) {
    let attack = time_coefficient(attack_ms, sample_rate);
    let release = time_coefficient(release_ms, sample_rate);
    let mut envelope_db = -120.0f32;

    for s in samples.iter_mut() {
        let level_db = 20.0 * s.abs().max(1e-6).log10();
        let coeff = if level_db > envelope_db {
            attack
        } else {
            release
        };
        envelope_db = coeff * envelope_db + (1.0 - coeff) * level_db;

        let over = envelope_db - threshold_db;
        if over > 0.0 {
            let reduction_db = over - over / ratio;
            *s *= db_to_gain(-reduction_db);
        }
    }
}

/// Hyperbolic-tangent waveshaper.
fn distort(samples: &mut [f32], drive_db: f32) {
    let drive = db_to_gain(drive_db);
    for s in samples.iter_mut() {
        *s = (*s * drive).tanh();
    }
}

/// Read from a circular buffer `delay` samples behind `write`, with linear interpolation.
fn read_fractional(line: &[f32], write: usize, delay: f32) -> f32 {
    let len = line.len();
    let pos = write as f32 - delay;
    let pos = pos.rem_euclid(len as f32);
    let i0 = pos.floor() as usize % len;
    let i1 = (i0 + 1) % len;
    let frac = pos - pos.floor();
    line[i0] * (1.0 - frac) + line[i1] * frac
}

/// LFO-modulated delay line mixed with the dry signal.
fn chorus(
    samples: &mut [f32],
    sample_rate: f32,
    rate_hz: f32,
    depth: f32,
    centre_delay_ms: f32,
    feedback: f32,
    mix: f32,
) {
    let centre = centre_delay_ms * 0.001 * sample_rate;
    let swing = centre * depth;
    let len = (centre + swing).ceil() as usize + 2;
    let mut line = vec![0.0f32; len];
    let phase_step = std::f32::consts::TAU * rate_hz / sample_rate;

    for (n, s) in samples.iter_mut().enumerate() {
        let write = n % len;
        let lfo = (n as f32 * phase_step).sin();
        let delay = (centre + swing * lfo).max(1.0);
        let wet = read_fractional(&line, write, delay);

        line[write] = *s + wet * feedback;
        *s = *s * (1.0 - mix) + wet * mix;
    }
}

/// Feedback echo.
fn delay(samples: &mut [f32], sample_rate: f32, delay_seconds: f32, feedback: f32, mix: f32) {
    let len = ((delay_seconds * sample_rate) as usize).max(1);
    let mut line = vec![0.0f32; len];

    for (n, s) in samples.iter_mut().enumerate() {
        let idx = n % len;
        let wet = line[idx];
        line[idx] = *s + wet * feedback;
        *s = *s * (1.0 - mix) + wet * mix;
    }
}

/// Comb filter with a damped feedback path.
struct Comb {
    line: Vec<f32>,
    idx: usize,
    store: f32,
}

impl Comb {
    fn new(len: usize) -> Self {
        Self {
            line: vec![0.0; len.max(1)],
            idx: 0,
            store: 0.0,
        }
    }

    fn process(&mut self, input: f32, feedback: f32, damping: f32) -> f32 {
        let out = self.line[self.idx];
        self.store = out * (1.0 - damping) + self.store * damping;
        self.line[self.idx] = input + self.store * feedback;
        self.idx = (self.idx + 1) % self.line.len();
        out
    }
}

struct Allpass {
    line: Vec<f32>,
    idx: usize,
}

impl Allpass {
    fn new(len: usize) -> Self {
        Self {
            line: vec![0.0; len.max(1)],
            idx: 0,
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.line[self.idx];
        let out = buffered - input;
        self.line[self.idx] = input + buffered * 0.5;
        self.idx = (self.idx + 1) % self.line.len();
        out
    }
}

/// Tuning in samples at 44.1kHz.
const COMB_TUNING: [usize; 4] = [1116, 1188, 1277, 1356];
const ALLPASS_TUNING: [usize; 2] = [556, 441];

/// Mono Schroeder-style reverb: parallel combs into serial allpasses.
fn reverb(
    samples: &mut [f32],
    sample_rate: f32,
    room_size: f32,
    damping: f32,
    wet_level: f32,
    dry_level: f32,
) {
    let scale = sample_rate / 44100.0;
    let mut combs: Vec<Comb> = COMB_TUNING
        .iter()
        .map(|&t| Comb::new((t as f32 * scale) as usize))
        .collect();
    let mut allpasses: Vec<Allpass> = ALLPASS_TUNING
        .iter()
        .map(|&t| Allpass::new((t as f32 * scale) as usize))
        .collect();

    let feedback = 0.7 + room_size * 0.28;
    let damp = damping * 0.4;
    let input_gain = 0.015;

    for s in samples.iter_mut() {
        let input = *s * input_gain;
        let mut wet: f32 = combs
            .iter_mut()
            .map(|c| c.process(input, feedback, damp))
            .sum();
        for ap in allpasses.iter_mut() {
            wet = ap.process(wet);
        }
        *s = *s * dry_level + wet * wet_level * 3.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse(len: usize) -> Vec<f32> {
        let mut v = vec![0.0; len];
        v[0] = 1.0;
        v
    }

    #[test]
    fn test_parameter_counts() {
        assert_eq!(EffectKind::Compressor.parameter_count(), 4);
        assert_eq!(EffectKind::Distortion.parameter_count(), 1);
        assert_eq!(EffectKind::Chorus.parameter_count(), 5);
        assert_eq!(EffectKind::Delay.parameter_count(), 3);
        assert_eq!(EffectKind::Reverb.parameter_count(), 4);
        assert_eq!(EffectKind::Gain.parameter_count(), 1);
    }

    #[test]
    fn test_denormalize_bounds() {
        for kind in EffectKind::ALL {
            let lows = kind.denormalize(&vec![0.0; kind.parameter_count()]);
            let highs = kind.denormalize(&vec![1.0; kind.parameter_count()]);
            for ((spec, lo), hi) in kind.params().iter().zip(lows).zip(highs) {
                assert!((lo - spec.min).abs() < 1e-4, "{}::{}", kind, spec.name);
                assert!((hi - spec.max).abs() < 1e-4, "{}::{}", kind, spec.name);
            }
        }
    }

    #[test]
    fn test_gain_unity_at_midpoint() {
        let mut samples = vec![0.5, -0.25];
        EffectKind::Gain.apply(&[0.5], &mut samples, 44100);
        assert!((samples[0] - 0.5).abs() < 1e-6);
        assert!((samples[1] + 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_distortion_bounded() {
        let mut samples = vec![0.9, -0.9, 0.1];
        EffectKind::Distortion.apply(&[1.0], &mut samples, 44100);
        assert!(samples.iter().all(|s| s.abs() <= 1.0));
        assert!(samples[2] > 0.9);
    }

    #[test]
    fn test_delay_echo_position() {
        // Shortest delay, no feedback, fully wet
        let mut samples = impulse(40);
        EffectKind::Delay.apply(&[0.0, 0.0, 1.0], &mut samples, 1000);
        let echo_at = (DELAY[0].min * 1000.0) as usize;
        assert_eq!(samples[0], 0.0);
        assert!((samples[echo_at] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_compressor_reduces_loud_signal() {
        let mut samples = vec![0.9f32; 4410];
        // Lowest threshold, max ratio, fastest attack
        EffectKind::Compressor.apply(&[0.0, 1.0, 0.0, 0.5], &mut samples, 44100);
        assert!(samples[4409] < 0.1);
    }

    #[test]
    fn test_reverb_adds_tail() {
        let mut samples = impulse(44100);
        EffectKind::Reverb.apply(&[0.8, 0.2, 1.0, 0.0], &mut samples, 44100);
        let tail: f32 = samples[2000..].iter().map(|s| s.abs()).sum();
        assert!(tail > 0.0);
        assert!(samples.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_chorus_finite() {
        let mut samples: Vec<f32> = (0..4410).map(|i| (i as f32 * 0.05).sin()).collect();
        EffectKind::Chorus.apply(&[0.5, 1.0, 1.0, 1.0, 0.5], &mut samples, 44100);
        assert!(samples.iter().all(|s| s.is_finite()));
    }
}
