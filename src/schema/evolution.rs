//! Evolution configuration types for the effect-chain search.
//!
//! This module provides the immutable run parameters of the genetic
//! algorithm, their validation, and the progress/result types reported
//! while a search runs.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the evolutionary search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Number of genes per genome. Fixed for the whole run.
    pub genome_length: usize,
    /// Population and generation settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Selection and variation settings.
    #[serde(default)]
    pub genetic: GeneticAlgorithmConfig,
    /// Evaluation settings (worker pool, failure handling).
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            genome_length: 4,
            population: PopulationConfig::default(),
            genetic: GeneticAlgorithmConfig::default(),
            evaluation: EvaluationConfig::default(),
            random_seed: None,
        }
    }
}

/// Genetic Algorithm configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticAlgorithmConfig {
    /// Elitism: number of best individuals copied unchanged into the next generation.
    #[serde(default = "default_elitism")]
    pub elitism: usize,
    /// Individuals drawn per tournament.
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    /// Probability that a child is produced by crossover rather than copied from
    /// its first parent (0.0-1.0).
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f32,
    /// Probability that a child is mutated at all (0.0-1.0).
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f32,
    /// Probability per gene of a mutated child (0.0-1.0).
    #[serde(default = "default_gene_mutation_rate")]
    pub gene_mutation_rate: f32,
    /// Mutation strength (standard deviation for Gaussian mutation).
    #[serde(default = "default_mutation_strength")]
    pub mutation_strength: f32,
}

impl Default for GeneticAlgorithmConfig {
    fn default() -> Self {
        Self {
            elitism: default_elitism(),
            tournament_size: default_tournament_size(),
            crossover_rate: default_crossover_rate(),
            mutation_rate: default_mutation_rate(),
            gene_mutation_rate: default_gene_mutation_rate(),
            mutation_strength: default_mutation_strength(),
        }
    }
}

fn default_elitism() -> usize {
    5
}
fn default_tournament_size() -> usize {
    5
}
fn default_crossover_rate() -> f32 {
    1.0
}
fn default_mutation_rate() -> f32 {
    0.8
}
fn default_gene_mutation_rate() -> f32 {
    0.5
}
fn default_mutation_strength() -> f32 {
    0.05
}

/// Population and generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of individuals in population.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Maximum number of generations.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    /// Target fitness to stop early.
    #[serde(default)]
    pub target_fitness: Option<f32>,
    /// Stagnation limit: stop if no improvement for N generations.
    #[serde(default)]
    pub stagnation_limit: Option<usize>,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            max_generations: default_max_generations(),
            target_fitness: None,
            stagnation_limit: None,
        }
    }
}

fn default_population_size() -> usize {
    100
}
fn default_max_generations() -> usize {
    50
}

/// What to do when a single fitness evaluation fails.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the run with the first failure (in population order).
    FailFast,
    /// Assign the worst possible fitness and keep ranking the rest.
    #[default]
    Sentinel,
}

/// Evaluation settings for fitness computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Number of parallel evaluations (0 = auto-detect).
    #[serde(default)]
    pub parallel_workers: usize,
    /// Failure handling, fixed for the whole run.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            parallel_workers: 0,
            failure_policy: FailurePolicy::default(),
        }
    }
}

// ============================================================================
// Progress and Result Types
// ============================================================================

/// Snapshot of an individual for reporting and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSnapshot {
    /// Identifier within the run.
    pub id: u64,
    /// Fitness score.
    pub fitness: f32,
    /// Normalized genes.
    pub genome: Vec<f32>,
}

/// Per-generation progress record: the externally observable result of a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Generation index (0 = initial random population).
    pub generation: usize,
    /// Total generations planned.
    pub total_generations: usize,
    /// Best individual of this generation.
    pub best: CandidateSnapshot,
    /// Average fitness over successfully evaluated individuals.
    pub avg_fitness: f32,
    /// Evaluations that failed and received the sentinel fitness.
    pub failed_evaluations: usize,
    /// Generations since last improvement.
    pub stagnation_count: usize,
}

/// Evolution history for plotting.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EvolutionHistory {
    /// Best fitness per generation.
    pub best_fitness: Vec<f32>,
    /// Average fitness per generation.
    pub avg_fitness: Vec<f32>,
    /// Standard deviation per generation.
    pub fitness_std: Vec<f32>,
    /// Diversity metric per generation.
    pub diversity: Vec<f32>,
}

/// Final result of evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Best candidate of the last fully evaluated generation.
    pub best: CandidateSnapshot,
    /// Statistics from the run.
    pub stats: EvolutionStats,
    /// Full history for analysis.
    pub history: EvolutionHistory,
}

/// Statistics from evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Generations completed after the initial population.
    pub generations: usize,
    /// Total evaluations performed.
    pub total_evaluations: u64,
    /// Evaluations that failed.
    pub failed_evaluations: u64,
    /// Best fitness achieved.
    pub best_fitness: f32,
    /// Average fitness of final population.
    pub final_avg_fitness: f32,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Evaluations per second.
    pub evaluations_per_second: f64,
    /// Reason for stopping.
    pub stop_reason: StopReason,
}

/// Reason evolution stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Reached maximum generations.
    MaxGenerations,
    /// Reached target fitness.
    TargetReached,
    /// Stagnation limit hit.
    Stagnation,
    /// User cancelled.
    Cancelled,
}

// ============================================================================
// Validation
// ============================================================================

/// Evolution configuration validation errors.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EvolutionConfigError {
    #[error("Genome length must be at least 2, got {0}")]
    GenomeTooShort(usize),
    #[error("Population size must be at least 1")]
    PopulationTooSmall,
    #[error("Elite count {elitism} exceeds population size {population}")]
    TooManyElites { elitism: usize, population: usize },
    #[error("Tournament size must be at least 1")]
    EmptyTournament,
    #[error("Tournament size {tournament} exceeds population size {population}")]
    InsufficientPopulation {
        population: usize,
        tournament: usize,
    },
    #[error("Invalid probability for {name}: {value}")]
    InvalidProbability { name: &'static str, value: f32 },
    #[error("Mutation strength must be finite and non-negative, got {0}")]
    InvalidMutationStrength(f32),
}

impl EvolutionConfig {
    /// Validate evolution configuration.
    pub fn validate(&self) -> Result<(), EvolutionConfigError> {
        if self.genome_length < 2 {
            return Err(EvolutionConfigError::GenomeTooShort(self.genome_length));
        }

        let population = self.population.size;
        if population < 1 {
            return Err(EvolutionConfigError::PopulationTooSmall);
        }

        let ga = &self.genetic;
        if ga.elitism > population {
            return Err(EvolutionConfigError::TooManyElites {
                elitism: ga.elitism,
                population,
            });
        }

        if ga.tournament_size == 0 {
            return Err(EvolutionConfigError::EmptyTournament);
        }
        if ga.tournament_size > population {
            return Err(EvolutionConfigError::InsufficientPopulation {
                population,
                tournament: ga.tournament_size,
            });
        }

        let check_probability = |value: f32, name: &'static str| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(EvolutionConfigError::InvalidProbability { name, value })
            }
        };

        check_probability(ga.crossover_rate, "crossover_rate")?;
        check_probability(ga.mutation_rate, "mutation_rate")?;
        check_probability(ga.gene_mutation_rate, "gene_mutation_rate")?;

        if !ga.mutation_strength.is_finite() || ga.mutation_strength < 0.0 {
            return Err(EvolutionConfigError::InvalidMutationStrength(
                ga.mutation_strength,
            ));
        }

        Ok(())
    }
}
