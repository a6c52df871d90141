//! End-to-end behaviour of the evolutionary search.

use std::sync::atomic::{AtomicUsize, Ordering};

use fx_evolve::{
    audio::AudioBuffer,
    compute::{
        EffectChain, EffectKind, Renderer, SimilarityScorer,
        evolution::{
            AudioFitness, Concurrency, EvaluationContext, EvaluationError, EvolutionEngine,
            EvolutionError, FitnessEvaluator, FnEvaluator, Genome, GenomeRng, IdSequence,
            Population, ScratchSpace,
        },
    },
    schema::{
        EvolutionConfig, FailurePolicy, GenerationReport, GeneticAlgorithmConfig,
        PopulationConfig, SimilarityConfig, StopReason,
    },
};

fn sphere(g: &Genome) -> f32 {
    -g.genes().iter().map(|x| (x - 0.7).powi(2)).sum::<f32>()
}

fn mse_to_target(genome: &[f32]) -> f32 {
    genome.iter().map(|x| (x - 0.7).powi(2)).sum::<f32>() / genome.len() as f32
}

fn config(
    genome_length: usize,
    size: usize,
    elitism: usize,
    tournament_size: usize,
    max_generations: usize,
    seed: u64,
) -> EvolutionConfig {
    EvolutionConfig {
        genome_length,
        population: PopulationConfig {
            size,
            max_generations,
            ..Default::default()
        },
        genetic: GeneticAlgorithmConfig {
            elitism,
            tournament_size,
            ..Default::default()
        },
        random_seed: Some(seed),
        ..Default::default()
    }
}

fn collect_reports<E: FitnessEvaluator>(
    engine: &mut EvolutionEngine<E>,
) -> Result<Vec<GenerationReport>, EvolutionError> {
    let mut reports = Vec::new();
    engine.run_with_callback(|r| reports.push(r.clone()))?;
    Ok(reports)
}

/// Fails whenever the first gene is below 0.3.
struct Flaky;

impl FitnessEvaluator for Flaky {
    fn evaluate(&self, genome: &Genome, _ctx: &EvaluationContext<'_>) -> Result<f32, EvaluationError> {
        if genome.genes()[0] < 0.3 {
            Err(EvaluationError::Other("renderer crashed".to_string()))
        } else {
            Ok(sphere(genome))
        }
    }
}

#[test]
fn test_converges_towards_target() {
    // Generations 0 through 9
    let mut engine = EvolutionEngine::new(config(4, 20, 2, 3, 9, 42), FnEvaluator(sphere)).unwrap();
    let reports = collect_reports(&mut engine).unwrap();

    assert_eq!(reports.len(), 10);
    assert_eq!(reports[0].generation, 0);
    assert_eq!(reports[9].generation, 9);

    let first = mse_to_target(&reports[0].best.genome);
    let last = mse_to_target(&reports[9].best.genome);
    assert!(last < first, "mse {} -> {}", first, last);

    assert!(
        reports
            .windows(2)
            .all(|w| w[1].best.fitness >= w[0].best.fitness)
    );
    assert!(
        reports
            .iter()
            .flat_map(|r| &r.best.genome)
            .all(|g| (0.0..=1.0).contains(g))
    );
}

#[test]
fn test_same_seed_same_run() {
    let run = || {
        let mut engine =
            EvolutionEngine::new(config(6, 16, 2, 3, 8, 1234), FnEvaluator(sphere)).unwrap();
        collect_reports(&mut engine).unwrap()
    };

    let a = run();
    let b = run();
    assert_eq!(a.len(), b.len());
    for (ra, rb) in a.iter().zip(&b) {
        assert_eq!(ra.best, rb.best);
        assert_eq!(ra.avg_fitness, rb.avg_fitness);
    }
}

#[test]
fn test_worker_count_does_not_change_results() {
    let run = |workers: usize| {
        let mut cfg = config(6, 24, 2, 3, 5, 77);
        cfg.evaluation.parallel_workers = workers;
        let mut engine = EvolutionEngine::new(cfg, FnEvaluator(sphere)).unwrap();
        engine.run().unwrap()
    };

    let single = run(1);
    let several = run(4);
    assert_eq!(single.stats.stop_reason, StopReason::MaxGenerations);
    assert_eq!(single.best, several.best);
    assert_eq!(single.history, several.history);
}

#[test]
fn test_elites_fill_population() {
    let calls = AtomicUsize::new(0);
    let evaluator = FnEvaluator(|g: &Genome| {
        calls.fetch_add(1, Ordering::Relaxed);
        sphere(g)
    });

    let mut engine = EvolutionEngine::new(config(4, 5, 5, 2, 4, 3), evaluator).unwrap();
    let reports = collect_reports(&mut engine).unwrap();

    assert_eq!(reports.len(), 5);
    assert_eq!(engine.population().len(), 5);
    // Only the initial population is ever evaluated
    assert_eq!(calls.load(Ordering::Relaxed), 5);
    assert!(reports.iter().all(|r| r.best == reports[0].best));
}

#[test]
fn test_tournament_of_one_keeps_elite_progress() {
    let mut engine = EvolutionEngine::new(config(5, 10, 1, 1, 15, 8), FnEvaluator(sphere)).unwrap();
    let result = engine.run().unwrap();

    assert_eq!(result.history.best_fitness.len(), 16);
    assert!(
        result
            .history
            .best_fitness
            .windows(2)
            .all(|w| w[1] >= w[0])
    );
}

#[test]
fn test_full_tournament_selects_global_best() {
    let mut rng = GenomeRng::new(5);
    let mut population = Population::new_random(15, 4, &IdSequence::new(), &mut rng);
    population
        .evaluate(
            &FnEvaluator(sphere),
            FailurePolicy::FailFast,
            Concurrency::Parallel,
            None,
        )
        .unwrap();

    let best = population.best().unwrap().fitness();
    for _ in 0..10 {
        let winner = population.tournament_select(15, &mut rng).unwrap();
        assert_eq!(winner.fitness(), best);
        assert!(population.iter().any(|i| i.id() == winner.id()));
    }
}

#[test]
fn test_tournament_larger_than_population_rejected() {
    let result = EvolutionEngine::new(config(4, 3, 1, 4, 5, 0), FnEvaluator(sphere));
    assert!(matches!(result, Err(EvolutionError::InvalidConfig(_))));
}

#[test]
fn test_fail_fast_aborts_run() {
    let mut cfg = config(4, 20, 2, 3, 5, 11);
    cfg.evaluation.failure_policy = FailurePolicy::FailFast;
    let mut engine = EvolutionEngine::new(cfg, Flaky).unwrap();

    match engine.run() {
        Err(EvolutionError::EvaluationFailure { source, .. }) => {
            assert!(matches!(source, EvaluationError::Other(_)));
        }
        other => panic!("expected evaluation failure, got {:?}", other.map(|r| r.stats)),
    }
}

#[test]
fn test_sentinel_policy_continues() {
    let mut cfg = config(4, 20, 2, 3, 5, 11);
    cfg.evaluation.failure_policy = FailurePolicy::Sentinel;
    let mut engine = EvolutionEngine::new(cfg, Flaky).unwrap();

    let result = engine.run().unwrap();
    assert_eq!(result.stats.generations, 5);
    assert!(result.stats.failed_evaluations > 0);
    assert!(result.best.fitness.is_finite());
    assert!(result.best.genome[0] >= 0.3);
}

#[test]
fn test_audio_search_with_scratch_files() {
    let sample_rate = 8_000;
    let samples: Vec<f32> = (0..4_000)
        .map(|i| (i as f32 * 220.0 * std::f32::consts::TAU / sample_rate as f32).sin() * 0.3)
        .collect();
    let input = AudioBuffer::new(samples, sample_rate);

    let effects = vec![EffectKind::Gain, EffectKind::Distortion];
    let chain = EffectChain::new(effects, input);
    let target = chain.render(&[0.75, 0.2]).unwrap();

    let scratch_parent = tempfile::tempdir().unwrap();
    let fitness = AudioFitness::new(
        chain.clone(),
        SimilarityScorer::new(SimilarityConfig::default()),
        target,
    )
    .with_materialized_renders(true);

    let mut engine = EvolutionEngine::new(config(2, 12, 2, 3, 6, 21), fitness)
        .unwrap()
        .with_scratch_space(ScratchSpace::new_in(scratch_parent.path()).unwrap());

    let result = engine.run().unwrap();
    assert_eq!(result.stats.failed_evaluations, 0);
    assert!(
        result
            .history
            .best_fitness
            .windows(2)
            .all(|w| w[1] >= w[0])
    );

    // No per-candidate files survive evaluation
    let scratch_dir = std::fs::read_dir(scratch_parent.path())
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .path();
    assert_eq!(std::fs::read_dir(&scratch_dir).unwrap().count(), 0);

    // The scratch space goes away with the engine
    drop(engine);
    assert_eq!(std::fs::read_dir(scratch_parent.path()).unwrap().count(), 0);
}

#[test]
fn test_genome_length_must_match_chain() {
    let chain = EffectChain::new(
        vec![EffectKind::Compressor, EffectKind::Reverb],
        AudioBuffer::new(vec![0.1; 100], 8_000),
    );
    let fitness = AudioFitness::new(
        chain,
        SimilarityScorer::new(SimilarityConfig::default()),
        AudioBuffer::new(vec![0.1; 100], 8_000),
    );

    assert!(matches!(
        EvolutionEngine::new(config(4, 10, 2, 3, 1, 0), fitness),
        Err(EvolutionError::InvalidGenomeLength {
            expected: 8,
            actual: 4
        })
    ));
}
