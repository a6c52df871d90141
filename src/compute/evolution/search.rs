//! Evolution engine: generational loop with elitism and tournament selection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::schema::{
    EvolutionConfig, EvolutionHistory, EvolutionResult, EvolutionStats, GenerationReport,
    StopReason,
};

use super::error::EvolutionError;
use super::fitness::{FitnessEvaluator, ScratchSpace};
use super::genome::GenomeRng;
use super::individual::{IdSequence, Individual};
use super::population::{Concurrency, EvaluationSummary, Population};

/// Evolution engine.
///
/// Generation 0 is the evaluated initial population; each later generation
/// carries the top `elitism` individuals over unchanged and fills the rest
/// with tournament-selected, recombined and mutated children.
pub struct EvolutionEngine<E> {
    config: EvolutionConfig,
    rng: GenomeRng,
    evaluator: E,
    population: Population,
    history: EvolutionHistory,
    generation: usize,
    best_fitness: f32,
    stagnation_count: usize,
    total_evaluations: u64,
    failed_evaluations: u64,
    ids: IdSequence,
    cancelled: Arc<AtomicBool>,
    pool: Option<rayon::ThreadPool>,
    scratch: Option<ScratchSpace>,
}

impl<E: FitnessEvaluator> EvolutionEngine<E> {
    /// Create a new evolution engine.
    pub fn new(config: EvolutionConfig, evaluator: E) -> Result<Self, EvolutionError> {
        config.validate()?;

        if let Some(expected) = evaluator.expected_genome_length()
            && expected != config.genome_length
        {
            return Err(EvolutionError::InvalidGenomeLength {
                expected,
                actual: config.genome_length,
            });
        }

        let seed = config.random_seed.unwrap_or_else(rand::random);
        log::debug!("Evolution seed: {}", seed);
        let rng = GenomeRng::new(seed);

        let workers = config.evaluation.parallel_workers;
        let pool = if workers > 0 {
            Some(rayon::ThreadPoolBuilder::new().num_threads(workers).build()?)
        } else {
            None
        };

        Ok(Self {
            config,
            rng,
            evaluator,
            population: Population::default(),
            history: EvolutionHistory::default(),
            generation: 0,
            best_fitness: f32::NEG_INFINITY,
            stagnation_count: 0,
            total_evaluations: 0,
            failed_evaluations: 0,
            ids: IdSequence::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
            pool,
            scratch: None,
        })
    }

    /// Use the given id sequence instead of a fresh one.
    pub fn with_id_sequence(mut self, ids: IdSequence) -> Self {
        self.ids = ids;
        self
    }

    /// Provide a scratch space that evaluators can write intermediate files to.
    pub fn with_scratch_space(mut self, scratch: ScratchSpace) -> Self {
        self.scratch = Some(scratch);
        self
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Current population, best first once evaluated.
    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn history(&self) -> &EvolutionHistory {
        &self.history
    }

    /// Create and evaluate the initial population (generation 0).
    pub fn initialize(&mut self) -> Result<GenerationReport, EvolutionError> {
        self.generation = 0;
        self.best_fitness = f32::NEG_INFINITY;
        self.stagnation_count = 0;
        self.history = EvolutionHistory::default();

        let mut population = Population::new_random(
            self.config.population.size,
            self.config.genome_length,
            &self.ids,
            &mut self.rng,
        );
        let summary = self.evaluate(&mut population)?;
        if summary.failed == population.len() {
            return Err(EvolutionError::NoViableIndividuals);
        }

        self.population = population;
        self.record(summary)
    }

    /// Breed and evaluate the next generation.
    pub fn step(&mut self) -> Result<GenerationReport, EvolutionError> {
        let mut next = self.breed()?;
        let summary = self.evaluate(&mut next)?;

        self.population = next;
        self.generation += 1;
        self.record(summary)
    }

    /// Build the next population from the current, evaluated one.
    fn breed(&mut self) -> Result<Population, EvolutionError> {
        let size = self.config.population.size;
        let length = self.config.genome_length;
        let ga = &self.config.genetic;

        let mut next = Population::new_empty(size);

        // Elitism: carried over with id and fitness intact
        for elite in self.population.iter().take(ga.elitism.min(size)) {
            next.push(elite.clone());
        }

        while next.len() < size {
            let parent1 = self
                .population
                .tournament_select(ga.tournament_size, &mut self.rng)?;
            let parent2 = self
                .population
                .tournament_select(ga.tournament_size, &mut self.rng)?;
            let id = self.ids.next_id();

            let mut child = if self.rng.chance(ga.crossover_rate) {
                Individual::crossover(parent1, parent2, id, &mut self.rng)?
            } else {
                Individual::from_genome(id, parent1.genome().clone(), length)?
            };

            if self.rng.chance(ga.mutation_rate) {
                child.mutate(ga.gene_mutation_rate, ga.mutation_strength, &mut self.rng);
            }

            next.push(child);
        }

        Ok(next)
    }

    fn evaluate(&mut self, population: &mut Population) -> Result<EvaluationSummary, EvolutionError> {
        let concurrency = match &self.pool {
            Some(pool) => Concurrency::Pool(pool),
            None => Concurrency::Parallel,
        };

        let summary = population.evaluate(
            &self.evaluator,
            self.config.evaluation.failure_policy,
            concurrency,
            self.scratch.as_ref(),
        )?;

        self.total_evaluations += summary.evaluated as u64;
        self.failed_evaluations += summary.failed as u64;
        Ok(summary)
    }

    /// Update stagnation tracking and history for the current population.
    fn record(&mut self, summary: EvaluationSummary) -> Result<GenerationReport, EvolutionError> {
        let best = self
            .population
            .best()
            .and_then(Individual::snapshot)
            .ok_or(EvolutionError::NoViableIndividuals)?;

        if best.fitness > self.best_fitness {
            self.best_fitness = best.fitness;
            self.stagnation_count = 0;
        } else {
            self.stagnation_count += 1;
        }

        let avg_fitness = self.population.avg_fitness();
        self.history.best_fitness.push(best.fitness);
        self.history.avg_fitness.push(avg_fitness);
        self.history.fitness_std.push(self.population.fitness_std());
        self.history.diversity.push(self.population.diversity());

        log::info!(
            "Generation {}/{}: best={:.4} avg={:.4} failed={}",
            self.generation,
            self.config.population.max_generations,
            best.fitness,
            avg_fitness,
            summary.failed
        );

        Ok(GenerationReport {
            generation: self.generation,
            total_generations: self.config.population.max_generations,
            best,
            avg_fitness,
            failed_evaluations: summary.failed,
            stagnation_count: self.stagnation_count,
        })
    }

    /// Check if evolution should stop.
    fn should_stop(&self) -> Option<StopReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }

        if self.generation >= self.config.population.max_generations {
            return Some(StopReason::MaxGenerations);
        }

        if let Some(target) = self.config.population.target_fitness
            && self.best_fitness >= target
        {
            return Some(StopReason::TargetReached);
        }

        if let Some(limit) = self.config.population.stagnation_limit
            && self.stagnation_count >= limit
        {
            return Some(StopReason::Stagnation);
        }

        None
    }

    /// Run evolution, reporting each generation (including generation 0)
    /// to `callback` as it completes.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> Result<EvolutionResult, EvolutionError>
    where
        F: FnMut(&GenerationReport),
    {
        let start_time = std::time::Instant::now();

        let report = self.initialize()?;
        callback(&report);

        let stop_reason = loop {
            if let Some(reason) = self.should_stop() {
                break reason;
            }

            let report = self.step()?;
            callback(&report);
        };

        let elapsed = start_time.elapsed().as_secs_f64();
        let best = self
            .population
            .best()
            .and_then(Individual::snapshot)
            .ok_or(EvolutionError::NoViableIndividuals)?;

        log::info!(
            "Evolution stopped after {} generations ({:?}): best={:.4}",
            self.generation,
            stop_reason,
            best.fitness
        );

        Ok(EvolutionResult {
            best,
            stats: EvolutionStats {
                generations: self.generation,
                total_evaluations: self.total_evaluations,
                failed_evaluations: self.failed_evaluations,
                best_fitness: self.best_fitness,
                final_avg_fitness: self.population.avg_fitness(),
                elapsed_seconds: elapsed,
                evaluations_per_second: if elapsed > 0.0 {
                    self.total_evaluations as f64 / elapsed
                } else {
                    0.0
                },
                stop_reason,
            },
            history: self.history.clone(),
        })
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> Result<EvolutionResult, EvolutionError> {
        self.run_with_callback(|_| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::evolution::{FnEvaluator, Genome};
    use crate::schema::{FailurePolicy, GeneticAlgorithmConfig, PopulationConfig};

    fn sphere(g: &Genome) -> f32 {
        -g.genes().iter().map(|x| (x - 0.7).powi(2)).sum::<f32>()
    }

    fn test_config(size: usize, max_generations: usize) -> EvolutionConfig {
        EvolutionConfig {
            genome_length: 4,
            population: PopulationConfig {
                size,
                max_generations,
                ..Default::default()
            },
            genetic: GeneticAlgorithmConfig {
                elitism: 2,
                tournament_size: 3,
                ..Default::default()
            },
            random_seed: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn test_evolution_engine_creation() {
        let mut engine = EvolutionEngine::new(test_config(10, 5), FnEvaluator(sphere)).unwrap();
        let report = engine.initialize().unwrap();

        assert_eq!(engine.population().len(), 10);
        assert_eq!(report.generation, 0);
        assert!(engine.population().iter().all(Individual::is_evaluated));
    }

    #[test]
    fn test_evolution_run() {
        let mut engine = EvolutionEngine::new(test_config(8, 3), FnEvaluator(sphere)).unwrap();
        let mut generations = Vec::new();
        let result = engine
            .run_with_callback(|report| generations.push(report.generation))
            .unwrap();

        assert_eq!(generations, vec![0, 1, 2, 3]);
        assert_eq!(result.stats.generations, 3);
        assert_eq!(result.stats.stop_reason, StopReason::MaxGenerations);
        assert_eq!(result.history.best_fitness.len(), 4);
        // Elites are not re-evaluated
        assert_eq!(result.stats.total_evaluations, 8 + 3 * 6);
    }

    #[test]
    fn test_elite_fitness_never_decreases() {
        let mut engine = EvolutionEngine::new(test_config(12, 10), FnEvaluator(sphere)).unwrap();
        let result = engine.run().unwrap();
        assert!(
            result
                .history
                .best_fitness
                .windows(2)
                .all(|w| w[1] >= w[0])
        );
    }

    #[test]
    fn test_cancellation() {
        let mut engine = EvolutionEngine::new(test_config(5, 100), FnEvaluator(sphere)).unwrap();
        let cancel = engine.cancel_handle();

        // Cancel immediately
        cancel.store(true, Ordering::Relaxed);

        let result = engine.run().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
        assert_eq!(result.stats.generations, 0);
    }

    #[test]
    fn test_cancel_from_callback() {
        let mut engine = EvolutionEngine::new(test_config(6, 100), FnEvaluator(sphere)).unwrap();
        let cancel = engine.cancel_handle();

        let result = engine
            .run_with_callback(|report| {
                if report.generation == 2 {
                    cancel.store(true, Ordering::Relaxed);
                }
            })
            .unwrap();

        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
        assert_eq!(result.stats.generations, 2);
    }

    #[test]
    fn test_target_fitness_stops_early() {
        let mut config = test_config(10, 100);
        config.population.target_fitness = Some(-10.0);
        let mut engine = EvolutionEngine::new(config, FnEvaluator(sphere)).unwrap();

        let result = engine.run().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::TargetReached);
        assert_eq!(result.stats.generations, 0);
    }

    #[test]
    fn test_stagnation_limit() {
        let mut config = test_config(6, 100);
        config.population.stagnation_limit = Some(3);
        let mut engine = EvolutionEngine::new(config, FnEvaluator(|_: &Genome| 1.0)).unwrap();

        let result = engine.run().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::Stagnation);
        assert_eq!(result.stats.generations, 3);
    }

    #[test]
    fn test_evaluator_length_mismatch() {
        struct Fixed;
        impl FitnessEvaluator for Fixed {
            fn evaluate(
                &self,
                _genome: &Genome,
                _ctx: &crate::compute::evolution::EvaluationContext<'_>,
            ) -> Result<f32, crate::compute::evolution::EvaluationError> {
                Ok(0.0)
            }

            fn expected_genome_length(&self) -> Option<usize> {
                Some(9)
            }
        }

        assert!(matches!(
            EvolutionEngine::new(test_config(10, 1), Fixed),
            Err(EvolutionError::InvalidGenomeLength {
                expected: 9,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = test_config(10, 1);
        config.genetic.tournament_size = 11;
        assert!(matches!(
            EvolutionEngine::new(config, FnEvaluator(sphere)),
            Err(EvolutionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_all_failures_in_initial_population() {
        let mut config = test_config(6, 3);
        config.evaluation.failure_policy = FailurePolicy::Sentinel;
        let mut engine = EvolutionEngine::new(config, FnEvaluator(|_: &Genome| f32::NAN)).unwrap();
        assert!(matches!(engine.run(), Err(EvolutionError::NoViableIndividuals)));
    }

    #[test]
    fn test_shared_id_sequence() {
        let ids = IdSequence::starting_at(1000);
        let mut engine = EvolutionEngine::new(test_config(6, 1), FnEvaluator(sphere))
            .unwrap()
            .with_id_sequence(ids.clone());
        engine.run().unwrap();

        assert!(engine.population().iter().all(|i| i.id() >= 1000));
        // 6 initial + 4 children
        assert_eq!(ids.next_id(), 1010);
    }

    #[test]
    fn test_dedicated_pool() {
        let mut config = test_config(10, 2);
        config.evaluation.parallel_workers = 2;
        let mut engine = EvolutionEngine::new(config, FnEvaluator(sphere)).unwrap();
        let result = engine.run().unwrap();
        assert_eq!(result.stats.generations, 2);
    }
}
