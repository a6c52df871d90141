//! Individuals and per-run identity.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::schema::CandidateSnapshot;

use super::error::{EvaluationError, EvolutionError};
use super::fitness::{EvaluationContext, FitnessEvaluator, ScratchSpace};
use super::genome::{Genome, GenomeRng};

/// Per-run source of individual ids.
///
/// Clones share the same counter, so one sequence can be handed to several
/// components of a run while separate runs stay independent.
#[derive(Debug, Clone, Default)]
pub struct IdSequence {
    next: Arc<AtomicU64>,
}

impl IdSequence {
    /// Start counting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting at `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: Arc::new(AtomicU64::new(first)),
        }
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// A candidate individual in the population.
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    id: u64,
    genome: Genome,
    fitness: Option<f32>,
}

impl Individual {
    /// Create an individual with uniformly random genes.
    pub fn random(id: u64, genome_length: usize, rng: &mut GenomeRng) -> Self {
        Self {
            id,
            genome: rng.random_genome(genome_length),
            fitness: None,
        }
    }

    /// Wrap an existing genome, checking it against the run's genome length.
    pub fn from_genome(
        id: u64,
        genome: Genome,
        expected_length: usize,
    ) -> Result<Self, EvolutionError> {
        if genome.len() != expected_length {
            return Err(EvolutionError::InvalidGenomeLength {
                expected: expected_length,
                actual: genome.len(),
            });
        }
        Ok(Self {
            id,
            genome,
            fitness: None,
        })
    }

    /// Produce a child by single-point crossover of two parents.
    pub fn crossover(
        parent1: &Individual,
        parent2: &Individual,
        id: u64,
        rng: &mut GenomeRng,
    ) -> Result<Self, EvolutionError> {
        let genome = rng.crossover(&parent1.genome, &parent2.genome)?;
        Ok(Self {
            id,
            genome,
            fitness: None,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// Fitness, if evaluated.
    pub fn fitness(&self) -> Option<f32> {
        self.fitness
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    /// Fitness for ranking: unevaluated individuals rank below everything.
    pub fn rank_fitness(&self) -> f32 {
        self.fitness.unwrap_or(f32::NEG_INFINITY)
    }

    /// Evaluate with the given evaluator and store the result.
    ///
    /// Fitness is set at most once: an already evaluated individual returns
    /// its stored score without calling the evaluator. A non-finite score
    /// counts as a failure and leaves fitness unset.
    pub fn evaluate<E: FitnessEvaluator + ?Sized>(
        &mut self,
        evaluator: &E,
        scratch: Option<&ScratchSpace>,
    ) -> Result<f32, EvaluationError> {
        if let Some(fitness) = self.fitness {
            return Ok(fitness);
        }

        let ctx = EvaluationContext {
            individual_id: self.id,
            scratch,
        };
        let fitness = evaluator.evaluate(&self.genome, &ctx)?;
        if !fitness.is_finite() {
            return Err(EvaluationError::NonFinite(fitness));
        }
        self.fitness = Some(fitness);
        Ok(fitness)
    }

    /// Mark as failed: worse than any finite score.
    pub(crate) fn assign_sentinel(&mut self) {
        self.fitness = Some(f32::NEG_INFINITY);
    }

    /// Gaussian-mutate genes in place and invalidate fitness.
    pub fn mutate(&mut self, rate_per_gene: f32, strength: f32, rng: &mut GenomeRng) {
        rng.mutate(&mut self.genome, rate_per_gene, strength);
        self.fitness = None;
    }

    /// Snapshot for reporting. `None` until evaluated.
    pub fn snapshot(&self) -> Option<CandidateSnapshot> {
        self.fitness.map(|fitness| CandidateSnapshot {
            id: self.id,
            fitness,
            genome: self.genome.genes().to_vec(),
        })
    }
}
