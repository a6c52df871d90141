//! Evolutionary search over effect-chain parameters.
//!
//! # Overview
//!
//! The evolutionary search system consists of:
//!
//! - **Genome Operations** (`genome`): Random generation, crossover, and mutation
//! - **Individuals** (`individual`): Genome plus fitness and a per-run id
//! - **Population** (`population`): Parallel evaluation, ranking, tournament selection
//! - **Fitness** (`fitness`): The evaluator seam, audio matching, scratch files
//! - **Search** (`search`): The generational loop
//!
//! # Example
//!
//! ```rust,no_run
//! use fx_evolve::compute::evolution::{EvolutionEngine, FnEvaluator, Genome};
//! use fx_evolve::schema::EvolutionConfig;
//!
//! let config = EvolutionConfig {
//!     genome_length: 4,
//!     ..Default::default()
//! };
//!
//! // Maximize closeness of every gene to 0.7
//! let evaluator = FnEvaluator(|g: &Genome| {
//!     -g.genes().iter().map(|x| (x - 0.7).powi(2)).sum::<f32>()
//! });
//!
//! let mut engine = EvolutionEngine::new(config, evaluator)?;
//! let result = engine.run_with_callback(|report| {
//!     println!("Generation {}: best fitness = {:.3}",
//!         report.generation, report.best.fitness);
//! })?;
//!
//! println!("Best genome: {:?}", result.best.genome);
//! # Ok::<(), fx_evolve::compute::evolution::EvolutionError>(())
//! ```

mod error;
mod fitness;
mod genome;
mod individual;
mod population;
mod search;

pub use error::{EvaluationError, EvolutionError};
pub use fitness::{
    AudioFitness, EvaluationContext, FitnessEvaluator, FnEvaluator, ScratchFile, ScratchSpace,
};
pub use genome::{Genome, GenomeRng, genome_distance};
pub use individual::{IdSequence, Individual};
pub use population::{Concurrency, EvaluationSummary, Population};
pub use search::EvolutionEngine;
