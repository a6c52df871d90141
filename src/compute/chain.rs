//! Effect chain renderer.

use crate::audio::AudioBuffer;

use super::effects::EffectKind;

/// Errors raised while rendering a genome.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Genome has {actual} genes but the effect chain expects {expected}")]
    UnsupportedConfiguration { expected: usize, actual: usize },
    #[error("Input audio is empty")]
    EmptyInput,
}

/// Turns a normalized genome into audio.
pub trait Renderer: Send + Sync {
    /// Number of genes a genome must carry.
    fn parameter_count(&self) -> usize;

    /// Render the input through the effect chain described by `genes`.
    fn render(&self, genes: &[f32]) -> Result<AudioBuffer, RenderError>;
}

/// Ordered chain of effects applied to a fixed input recording.
#[derive(Debug, Clone)]
pub struct EffectChain {
    effects: Vec<EffectKind>,
    input: AudioBuffer,
}

impl EffectChain {
    /// Create a chain over the given input.
    pub fn new(effects: Vec<EffectKind>, input: AudioBuffer) -> Self {
        Self { effects, input }
    }

    /// Effects in processing order.
    pub fn effects(&self) -> &[EffectKind] {
        &self.effects
    }

    /// Total genes consumed by a list of effects.
    pub fn parameter_count_of(effects: &[EffectKind]) -> usize {
        effects.iter().map(EffectKind::parameter_count).sum()
    }

    /// Human-readable parameter values for a genome, one line per effect.
    pub fn describe(&self, genes: &[f32]) -> Result<Vec<String>, RenderError> {
        self.check_length(genes)?;

        let mut offset = 0;
        let lines = self
            .effects
            .iter()
            .map(|effect| {
                let count = effect.parameter_count();
                let values = effect.denormalize(&genes[offset..offset + count]);
                offset += count;

                let params: Vec<String> = effect
                    .params()
                    .iter()
                    .zip(values)
                    .map(|(spec, v)| format!("{}={:.3}", spec.name, v))
                    .collect();
                format!("{}: {}", effect, params.join(", "))
            })
            .collect();

        Ok(lines)
    }

    fn check_length(&self, genes: &[f32]) -> Result<(), RenderError> {
        let expected = self.parameter_count();
        if genes.len() != expected {
            return Err(RenderError::UnsupportedConfiguration {
                expected,
                actual: genes.len(),
            });
        }
        Ok(())
    }
}

impl Renderer for EffectChain {
    fn parameter_count(&self) -> usize {
        Self::parameter_count_of(&self.effects)
    }

    fn render(&self, genes: &[f32]) -> Result<AudioBuffer, RenderError> {
        self.check_length(genes)?;
        if self.input.is_empty() {
            return Err(RenderError::EmptyInput);
        }

        let mut output = self.input.clone();
        let mut offset = 0;
        for effect in &self.effects {
            let count = effect.parameter_count();
            effect.apply(
                &genes[offset..offset + count],
                &mut output.samples,
                output.sample_rate,
            );
            offset += count;
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_input() -> AudioBuffer {
        let samples = (0..1000).map(|i| (i as f32 * 0.03).sin() * 0.5).collect();
        AudioBuffer::new(samples, 8000)
    }

    #[test]
    fn test_parameter_count() {
        let chain = EffectChain::new(
            vec![EffectKind::Compressor, EffectKind::Reverb],
            test_input(),
        );
        assert_eq!(chain.parameter_count(), 8);
    }

    #[test]
    fn test_render_rejects_wrong_length() {
        let chain = EffectChain::new(vec![EffectKind::Gain], test_input());
        let result = chain.render(&[0.5, 0.5]);
        assert!(matches!(
            result,
            Err(RenderError::UnsupportedConfiguration {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_render_applies_in_order() {
        let input = test_input();
        let chain = EffectChain::new(vec![EffectKind::Gain, EffectKind::Gain], input.clone());

        // +24dB then -24dB cancels out
        let out = chain.render(&[1.0, 0.0]).unwrap();
        assert_eq!(out.sample_rate, input.sample_rate);
        for (a, b) in out.samples.iter().zip(&input.samples) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let input = test_input();
        let chain = EffectChain::new(Vec::new(), input.clone());
        assert_eq!(chain.render(&[]).unwrap(), input);
    }

    #[test]
    fn test_describe() {
        let chain = EffectChain::new(vec![EffectKind::Gain], test_input());
        let lines = chain.describe(&[0.5]).unwrap();
        assert_eq!(lines, vec!["Gain: gain_db=0.000".to_string()]);
    }
}
