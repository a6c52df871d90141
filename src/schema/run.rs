//! Run configuration: audio references, effect chain, scoring and output.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{EvolutionConfig, EvolutionConfigError};
use crate::compute::{EffectChain, EffectKind};

/// Everything needed to match an input recording to a target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Dry input recording fed through the effect chain.
    pub input_audio: PathBuf,
    /// Recording the processed input should sound like.
    pub target_audio: PathBuf,
    /// Effects in processing order.
    pub effects: Vec<EffectKind>,
    /// Similarity scoring.
    #[serde(default)]
    pub similarity: SimilarityConfig,
    /// Genetic algorithm parameters.
    pub evolution: EvolutionConfig,
    /// Where best-of-generation records go.
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        let effects = vec![
            EffectKind::Compressor,
            EffectKind::Distortion,
            EffectKind::Reverb,
        ];
        Self {
            input_audio: PathBuf::from("input.wav"),
            target_audio: PathBuf::from("target.wav"),
            evolution: EvolutionConfig {
                genome_length: EffectChain::parameter_count_of(&effects),
                ..Default::default()
            },
            effects,
            similarity: SimilarityConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Similarity configuration with weighted metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Only the first `duration_seconds` of each signal are compared.
    #[serde(default = "default_duration")]
    pub duration_seconds: f32,
    /// Metrics and their weights.
    #[serde(default = "default_metrics")]
    pub metrics: Vec<WeightedMetric>,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            duration_seconds: default_duration(),
            metrics: default_metrics(),
        }
    }
}

fn default_duration() -> f32 {
    10.0
}

fn default_metrics() -> Vec<WeightedMetric> {
    vec![
        WeightedMetric {
            metric: SimilarityMetric::TimeDomain,
            weight: 1.0,
        },
        WeightedMetric {
            metric: SimilarityMetric::FrequencyDomain {
                tolerance: default_tolerance(),
            },
            weight: 1.0,
        },
    ]
}

fn default_tolerance() -> f32 {
    10.0
}

/// A similarity metric with associated weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedMetric {
    /// The metric.
    pub metric: SimilarityMetric,
    /// Weight for this metric in the combined score.
    pub weight: f32,
}

/// Individual similarity measures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SimilarityMetric {
    /// Sample-wise amplitude difference.
    TimeDomain,
    /// Per-frame distance between STFT magnitude spectra.
    FrequencyDomain {
        /// Distance at which the score drops to one half.
        #[serde(default = "default_tolerance")]
        tolerance: f32,
    },
}

/// Output settings for best-of-generation artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for history, best genome and rendered audio. Nothing is
    /// written when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// File name, inside `dir`, of the per-generation JSON lines log.
    #[serde(default = "default_history_file")]
    pub history_file: String,
    /// Render each generation's best genome to `best_gen{N}.wav`.
    #[serde(default)]
    pub render_best: bool,
    /// Write every candidate render to a per-run scratch WAV and score the
    /// decoded file, so candidate and target share the same decoding path.
    #[serde(default)]
    pub materialize_renders: bool,
    /// Parent directory for the per-run scratch space (system temp when unset).
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
    /// Cabinet impulse response WAV convolved into rendered output files.
    /// Scoring always uses the dry chain output.
    #[serde(default)]
    pub cabinet_ir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            history_file: default_history_file(),
            render_best: false,
            materialize_renders: false,
            scratch_dir: None,
            cabinet_ir: None,
        }
    }
}

fn default_history_file() -> String {
    "history.jsonl".to_string()
}

/// Run configuration validation errors.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RunConfigError {
    #[error("Effect chain expects {expected} genes but genome_length is {actual}")]
    InvalidGenomeLength { expected: usize, actual: usize },
    #[error("Effect chain is empty")]
    NoEffects,
    #[error("No similarity metrics specified")]
    NoMetrics,
    #[error("Invalid metric weight: {0}")]
    InvalidWeight(f32),
    #[error("Similarity duration must be positive, got {0}")]
    InvalidDuration(f32),
    #[error("Evolution config: {0}")]
    Evolution(#[from] EvolutionConfigError),
}

impl RunConfig {
    /// Validate run configuration.
    pub fn validate(&self) -> Result<(), RunConfigError> {
        if self.effects.is_empty() {
            return Err(RunConfigError::NoEffects);
        }

        let expected = EffectChain::parameter_count_of(&self.effects);
        if self.evolution.genome_length != expected {
            return Err(RunConfigError::InvalidGenomeLength {
                expected,
                actual: self.evolution.genome_length,
            });
        }

        if self.similarity.metrics.is_empty() {
            return Err(RunConfigError::NoMetrics);
        }
        for m in &self.similarity.metrics {
            if m.weight.is_nan() || m.weight < 0.0 {
                return Err(RunConfigError::InvalidWeight(m.weight));
            }
        }
        let duration = self.similarity.duration_seconds;
        if duration.is_nan() || duration <= 0.0 {
            return Err(RunConfigError::InvalidDuration(duration));
        }

        self.evolution.validate()?;
        Ok(())
    }
}
