//! Genome representation and variation operators.
//!
//! Provides random generation, single-point crossover, and clamped Gaussian
//! mutation over fixed-length vectors of normalized genes.

use rand::prelude::*;
use rand::seq::index::{self, IndexVec};
use serde::{Deserialize, Serialize};

use super::error::EvolutionError;

/// Fixed-length sequence of normalized genes, each in [0, 1].
///
/// Every way of building one, deserialization included, goes through
/// [`Genome::new`], so the range holds for any genome in existence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f32>", into = "Vec<f32>")]
pub struct Genome {
    genes: Vec<f32>,
}

impl Genome {
    /// Wrap raw genes, clamping each into [0, 1]. NaN becomes 0.
    pub fn new(genes: Vec<f32>) -> Self {
        let genes = genes
            .into_iter()
            .map(|g| if g.is_nan() { 0.0 } else { g.clamp(0.0, 1.0) })
            .collect();
        Self { genes }
    }

    /// Number of genes.
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Genes as a slice.
    pub fn genes(&self) -> &[f32] {
        &self.genes
    }

    /// Consume into the raw gene vector.
    pub fn into_genes(self) -> Vec<f32> {
        self.genes
    }
}

impl From<Vec<f32>> for Genome {
    fn from(genes: Vec<f32>) -> Self {
        Self::new(genes)
    }
}

impl From<Genome> for Vec<f32> {
    fn from(genome: Genome) -> Self {
        genome.genes
    }
}

/// Random number generator wrapper for genome operations.
///
/// Every stochastic decision of a run goes through one instance so that a
/// fixed seed reproduces the run exactly.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate a genome of independent uniform genes.
    pub fn random_genome(&mut self, length: usize) -> Genome {
        let genes = (0..length).map(|_| self.rng.r#gen::<f32>()).collect();
        Genome { genes }
    }

    /// Bernoulli trial. Always consumes exactly one draw.
    pub fn chance(&mut self, probability: f32) -> bool {
        self.rng.r#gen::<f32>() < probability
    }

    /// Draw `amount` distinct indices from `0..length`.
    pub fn sample_indices(&mut self, length: usize, amount: usize) -> IndexVec {
        index::sample(&mut self.rng, length, amount)
    }

    /// Gaussian mutation: add noise to a gene and clamp to [0, 1].
    pub fn gaussian_mutate(&mut self, value: f32, strength: f32) -> f32 {
        let noise: f32 = self.rng.sample(rand_distr::StandardNormal);
        (value + noise * strength).clamp(0.0, 1.0)
    }

    /// Single-point crossover.
    ///
    /// The cut point is uniform in `1..len`, so the child always takes at
    /// least one gene from each parent.
    pub fn crossover(&mut self, parent1: &Genome, parent2: &Genome) -> Result<Genome, EvolutionError> {
        if parent1.len() != parent2.len() {
            return Err(EvolutionError::GenomeLengthMismatch {
                left: parent1.len(),
                right: parent2.len(),
            });
        }
        let len = parent1.len();
        if len < 2 {
            return Err(EvolutionError::GenomeTooShort(len));
        }

        let point = self.rng.gen_range(1..len);
        let genes = parent1.genes[..point]
            .iter()
            .chain(&parent2.genes[point..])
            .copied()
            .collect();

        Ok(Genome { genes })
    }

    /// Mutate a genome in place: each gene mutates with probability `rate`.
    pub fn mutate(&mut self, genome: &mut Genome, rate: f32, strength: f32) {
        for i in 0..genome.genes.len() {
            if self.chance(rate) {
                genome.genes[i] = self.gaussian_mutate(genome.genes[i], strength);
            }
        }
    }
}

/// Mean absolute per-gene difference between two genomes.
pub fn genome_distance(g1: &Genome, g2: &Genome) -> f32 {
    let count = g1.len().min(g2.len());
    if count == 0 {
        return 0.0;
    }

    let distance: f32 = g1
        .genes
        .iter()
        .zip(&g2.genes)
        .map(|(a, b)| (a - b).abs())
        .sum();

    distance / count as f32
}
