//! Population container: evaluation, ranking and selection.

use rayon::prelude::*;

use crate::schema::FailurePolicy;

use super::error::{EvaluationError, EvolutionError};
use super::fitness::{FitnessEvaluator, ScratchSpace};
use super::genome::{GenomeRng, genome_distance};
use super::individual::{IdSequence, Individual};

/// How evaluations are scheduled.
#[derive(Clone, Copy)]
pub enum Concurrency<'a> {
    /// One at a time on the calling thread.
    Sequential,
    /// On rayon's global pool.
    Parallel,
    /// On a dedicated pool.
    Pool(&'a rayon::ThreadPool),
}

/// Counts from one evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    /// Individuals that were evaluated (fitness was unset).
    pub evaluated: usize,
    /// Evaluations that failed and received the sentinel.
    pub failed: usize,
}

/// Ordered collection of individuals.
///
/// After [`Population::evaluate`] the individuals are sorted by descending
/// fitness, ties keeping their previous relative order.
#[derive(Debug, Clone, Default)]
pub struct Population {
    individuals: Vec<Individual>,
}

impl Population {
    /// Empty population with room for `capacity` individuals.
    pub fn new_empty(capacity: usize) -> Self {
        Self {
            individuals: Vec::with_capacity(capacity),
        }
    }

    /// Population of uniformly random, unevaluated individuals.
    pub fn new_random(
        size: usize,
        genome_length: usize,
        ids: &IdSequence,
        rng: &mut GenomeRng,
    ) -> Self {
        let individuals = (0..size)
            .map(|_| Individual::random(ids.next_id(), genome_length, rng))
            .collect();
        Self { individuals }
    }

    pub fn push(&mut self, individual: Individual) {
        self.individuals.push(individual);
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Individual> {
        self.individuals.iter()
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    /// Evaluate every individual without a fitness, then sort.
    ///
    /// Under [`FailurePolicy::FailFast`] the first failure in population order
    /// is returned. Under [`FailurePolicy::Sentinel`] failed individuals get
    /// the worst possible fitness and the pass continues.
    pub fn evaluate<E: FitnessEvaluator + ?Sized>(
        &mut self,
        evaluator: &E,
        policy: FailurePolicy,
        concurrency: Concurrency<'_>,
        scratch: Option<&ScratchSpace>,
    ) -> Result<EvaluationSummary, EvolutionError> {
        let evaluate_one = |individual: &mut Individual| -> Option<Result<f32, EvaluationError>> {
            if individual.is_evaluated() {
                None
            } else {
                Some(individual.evaluate(evaluator, scratch))
            }
        };

        let outcomes: Vec<_> = match concurrency {
            Concurrency::Sequential => self.individuals.iter_mut().map(evaluate_one).collect(),
            Concurrency::Parallel => self.individuals.par_iter_mut().map(evaluate_one).collect(),
            Concurrency::Pool(pool) => {
                pool.install(|| self.individuals.par_iter_mut().map(evaluate_one).collect())
            }
        };

        let mut summary = EvaluationSummary::default();
        for (individual, outcome) in self.individuals.iter_mut().zip(outcomes) {
            let Some(outcome) = outcome else {
                continue;
            };
            summary.evaluated += 1;

            if let Err(source) = outcome {
                match policy {
                    FailurePolicy::FailFast => {
                        return Err(EvolutionError::EvaluationFailure {
                            individual_id: individual.id(),
                            source,
                        });
                    }
                    FailurePolicy::Sentinel => {
                        log::warn!(
                            "Evaluation of individual {} failed: {}",
                            individual.id(),
                            source
                        );
                        individual.assign_sentinel();
                        summary.failed += 1;
                    }
                }
            }
        }

        self.sort_by_fitness();
        Ok(summary)
    }

    /// Stable sort, best first.
    pub fn sort_by_fitness(&mut self) {
        self.individuals
            .sort_by(|a, b| b.rank_fitness().total_cmp(&a.rank_fitness()));
    }

    /// Tournament selection over distinct members.
    ///
    /// Draws `size` distinct individuals and returns the fittest; on ties the
    /// first drawn wins.
    pub fn tournament_select(
        &self,
        size: usize,
        rng: &mut GenomeRng,
    ) -> Result<&Individual, EvolutionError> {
        if size == 0 || size > self.individuals.len() {
            return Err(EvolutionError::InsufficientPopulation {
                population: self.individuals.len(),
                tournament: size,
            });
        }

        let indices = rng.sample_indices(self.individuals.len(), size);
        let mut winner = &self.individuals[indices.index(0)];
        for idx in indices.iter().skip(1) {
            let contender = &self.individuals[idx];
            if contender.rank_fitness() > winner.rank_fitness() {
                winner = contender;
            }
        }

        Ok(winner)
    }

    /// Fittest individual. Unevaluated individuals rank last.
    pub fn best(&self) -> Option<&Individual> {
        self.individuals
            .iter()
            .reduce(|best, c| if c.rank_fitness() > best.rank_fitness() { c } else { best })
    }

    /// Mean fitness over individuals with a finite score.
    pub fn avg_fitness(&self) -> f32 {
        let (sum, count) = self.finite_fitness().fold((0.0, 0usize), |(s, n), f| (s + f, n + 1));
        if count == 0 { 0.0 } else { sum / count as f32 }
    }

    /// Standard deviation of finite fitness scores.
    pub fn fitness_std(&self) -> f32 {
        let avg = self.avg_fitness();
        let (sum_sq, count) = self
            .finite_fitness()
            .fold((0.0, 0usize), |(s, n), f| (s + (f - avg).powi(2), n + 1));
        if count == 0 {
            0.0
        } else {
            (sum_sq / count as f32).sqrt()
        }
    }

    /// Mean pairwise genome distance.
    pub fn diversity(&self) -> f32 {
        let n = self.individuals.len();
        if n < 2 {
            return 0.0;
        }

        let mut total = 0.0;
        let mut count = 0;
        for i in 0..n {
            for j in (i + 1)..n {
                total += genome_distance(self.individuals[i].genome(), self.individuals[j].genome());
                count += 1;
            }
        }

        total / count as f32
    }

    fn finite_fitness(&self) -> impl Iterator<Item = f32> + '_ {
        self.individuals
            .iter()
            .filter_map(Individual::fitness)
            .filter(|f| f.is_finite())
    }
}
