//! Error types for the evolutionary search.

use crate::audio::AudioError;
use crate::compute::{RenderError, SimilarityError};
use crate::schema::EvolutionConfigError;

/// Failure of a single fitness evaluation.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),
    #[error("Scoring failed: {0}")]
    Similarity(#[from] SimilarityError),
    #[error("Audio IO failed: {0}")]
    Audio(#[from] AudioError),
    #[error("Fitness is not a finite number: {0}")]
    NonFinite(f32),
    #[error("{0}")]
    Other(String),
}

/// Errors raised by the evolution engine and its operators.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Genome has {actual} genes, run expects {expected}")]
    InvalidGenomeLength { expected: usize, actual: usize },
    #[error("Genome of length {0} cannot be split by single-point crossover")]
    GenomeTooShort(usize),
    #[error("Parent genomes differ in length: {left} vs {right}")]
    GenomeLengthMismatch { left: usize, right: usize },
    #[error("Tournament of {tournament} drawn from population of {population}")]
    InsufficientPopulation {
        population: usize,
        tournament: usize,
    },
    #[error("Evaluation of individual {individual_id} failed: {source}")]
    EvaluationFailure {
        individual_id: u64,
        #[source]
        source: EvaluationError,
    },
    #[error("Every individual of the initial population failed evaluation")]
    NoViableIndividuals,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] EvolutionConfigError),
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
