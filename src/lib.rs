//! fx-evolve - Evolutionary search for audio effect-chain parameters.
//!
//! Given a dry input recording and a processed target recording, this crate
//! searches for the effect-chain settings that make the input sound like the
//! target, using a genetic algorithm over normalized parameter vectors.
//!
//! # Architecture
//!
//! The crate is split into three main modules:
//!
//! - `schema`: Configuration, progress and result types
//! - `compute`: Effect chain rendering, similarity scoring, evolutionary search
//! - `audio`: Sample buffers and WAV I/O
//!
//! # Example
//!
//! ```rust,no_run
//! use fx_evolve::{
//!     audio::load_wav,
//!     compute::{EffectChain, SimilarityScorer, evolution::{AudioFitness, EvolutionEngine}},
//!     schema::RunConfig,
//! };
//!
//! let config = RunConfig::default();
//! config.validate()?;
//!
//! let input = load_wav(&config.input_audio)?;
//! let target = load_wav(&config.target_audio)?;
//!
//! let chain = EffectChain::new(config.effects.clone(), input);
//! let scorer = SimilarityScorer::new(config.similarity.clone());
//! let fitness = AudioFitness::new(chain, scorer, target);
//!
//! let mut engine = EvolutionEngine::new(config.evolution.clone(), fitness)?;
//! let result = engine.run()?;
//!
//! println!("Best fitness: {:.4}", result.best.fitness);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod audio;
pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use audio::AudioBuffer;
pub use compute::evolution::{EvolutionEngine, FitnessEvaluator, Genome};
pub use compute::{EffectChain, EffectKind};
pub use schema::{EvolutionConfig, RunConfig};
