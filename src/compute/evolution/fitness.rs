//! Fitness evaluation for candidate genomes.
//!
//! The engine only sees [`FitnessEvaluator`]. Audio matching plugs in through
//! [`AudioFitness`], which renders a genome through an effect chain and scores
//! the result against a target recording; tests and synthetic problems wrap a
//! plain closure in [`FnEvaluator`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::audio::{AudioBuffer, load_wav, save_wav};
use crate::compute::{Renderer, SimilarityOracle, SimilarityScorer};

use super::error::EvaluationError;
use super::genome::Genome;

/// Per-evaluation context handed to the evaluator.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Id of the individual being evaluated; unique among concurrent evaluations.
    pub individual_id: u64,
    /// Run-scoped scratch space, if the run has one.
    pub scratch: Option<&'a ScratchSpace>,
}

/// Maps a genome to a fitness score; higher is better.
///
/// Implementations are called concurrently from worker threads and must not
/// rely on shared mutable state.
pub trait FitnessEvaluator: Send + Sync {
    fn evaluate(&self, genome: &Genome, ctx: &EvaluationContext<'_>) -> Result<f32, EvaluationError>;

    /// Genome length this evaluator accepts, when it is fixed.
    fn expected_genome_length(&self) -> Option<usize> {
        None
    }
}

/// Evaluator backed by an infallible closure.
pub struct FnEvaluator<F>(pub F);

impl<F> FitnessEvaluator for FnEvaluator<F>
where
    F: Fn(&Genome) -> f32 + Send + Sync,
{
    fn evaluate(&self, genome: &Genome, _ctx: &EvaluationContext<'_>) -> Result<f32, EvaluationError> {
        Ok((self.0)(genome))
    }
}

/// Per-run temporary directory for intermediate files.
///
/// The directory and anything left in it are removed when the space drops.
#[derive(Debug)]
pub struct ScratchSpace {
    dir: tempfile::TempDir,
}

impl ScratchSpace {
    /// Create a scratch directory under the system temp dir.
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("fx-evolve-").tempdir()?;
        Ok(Self { dir })
    }

    /// Create a scratch directory under `parent`.
    pub fn new_in<P: AsRef<Path>>(parent: P) -> io::Result<Self> {
        fs::create_dir_all(parent.as_ref())?;
        let dir = tempfile::Builder::new()
            .prefix("fx-evolve-")
            .tempdir_in(parent)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Reserve a file path derived from an individual id.
    ///
    /// Ids are unique among in-flight evaluations, so concurrent claims never
    /// collide. The file is deleted when the returned guard drops.
    pub fn claim(&self, individual_id: u64, extension: &str) -> ScratchFile {
        let path = self
            .dir
            .path()
            .join(format!("candidate_{individual_id}.{extension}"));
        ScratchFile { path }
    }
}

/// Guard over a scratch file path; removes the file on drop.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            log::debug!("Failed to remove {}: {}", self.path.display(), e);
        }
    }
}

/// Scores a genome by how closely its render matches a target recording.
pub struct AudioFitness<R, S = SimilarityScorer> {
    renderer: R,
    oracle: S,
    target: AudioBuffer,
    materialize: bool,
}

impl<R: Renderer, S: SimilarityOracle> AudioFitness<R, S> {
    pub fn new(renderer: R, oracle: S, target: AudioBuffer) -> Self {
        Self {
            renderer,
            oracle,
            target,
            materialize: false,
        }
    }

    /// Round-trip each render through a WAV file in the run's scratch space
    /// before scoring. Has no effect when the run has no scratch space.
    pub fn with_materialized_renders(mut self, materialize: bool) -> Self {
        self.materialize = materialize;
        self
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn target(&self) -> &AudioBuffer {
        &self.target
    }
}

impl<R: Renderer, S: SimilarityOracle> FitnessEvaluator for AudioFitness<R, S> {
    fn evaluate(&self, genome: &Genome, ctx: &EvaluationContext<'_>) -> Result<f32, EvaluationError> {
        let rendered = self.renderer.render(genome.genes())?;

        let candidate = match ctx.scratch {
            Some(scratch) if self.materialize => {
                let file = scratch.claim(ctx.individual_id, "wav");
                save_wav(file.path(), &rendered)?;
                load_wav(file.path())?
            }
            _ => rendered,
        };

        Ok(self.oracle.score(&candidate, &self.target)?)
    }

    fn expected_genome_length(&self) -> Option<usize> {
        Some(self.renderer.parameter_count())
    }
}
