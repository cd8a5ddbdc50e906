//! Adaptive echo cancellation
//!
//! Two canceller variants behind one interface, chosen once at construction:
//!
//! - [`EchoCanceller::Adaptive`] — LMS adaptive filter driven by a far-end
//!   reference signal (speaker playout). While the reference is shorter than
//!   the filter, a flat bootstrap attenuation is applied instead of
//!   adaptation.
//! - [`EchoCanceller::Suppressor`] — reference-less heuristic that subtracts
//!   a fraction of a self-convolved echo estimate. This is suppression, not
//!   true cancellation; it exists for callers that cannot supply a reference.
//!
//! Coefficient growth is bounded only by the leak factor. Divergence shows up
//! as non-finite output and is reported as an error so the orchestrator can
//! fall back to the unprocessed frame.

use serde::Serialize;

use livescribe_config::EchoConfig;

use crate::dsp;
use crate::PipelineError;

/// Snapshot of canceller parameters for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct EchoStats {
    pub strategy: &'static str,
    pub filter_taps: usize,
    pub step_size: f32,
    pub leak_factor: f32,
    /// Number of LMS updates applied so far
    pub adaptations: u64,
}

/// Echo canceller, one of a closed set of strategies
#[derive(Debug)]
pub enum EchoCanceller {
    Adaptive(AdaptiveLms),
    Suppressor(ReferencelessSuppressor),
}

impl EchoCanceller {
    /// Construct the variant selected in configuration
    pub fn from_config(config: &EchoConfig) -> Self {
        match config.strategy {
            livescribe_config::EchoStrategy::Adaptive => {
                EchoCanceller::Adaptive(AdaptiveLms::new(config))
            }
            livescribe_config::EchoStrategy::Suppressor => {
                EchoCanceller::Suppressor(ReferencelessSuppressor::new(config))
            }
        }
    }

    /// Process one chunk; output length always equals input length
    pub fn process(
        &mut self,
        input: &[f32],
        reference: Option<&[f32]>,
    ) -> Result<Vec<f32>, PipelineError> {
        let output = match self {
            EchoCanceller::Adaptive(lms) => lms.process(input, reference),
            EchoCanceller::Suppressor(sup) => sup.process(input),
        };

        if output.iter().any(|s| !s.is_finite()) {
            return Err(PipelineError::EchoDiverged(
                "non-finite sample in canceller output".to_string(),
            ));
        }
        Ok(output)
    }

    /// Push far-end samples into the reference history
    pub fn update_reference(&mut self, reference: &[f32]) {
        match self {
            EchoCanceller::Adaptive(lms) => lms.update_reference(reference),
            // The suppressor has no use for a reference signal.
            EchoCanceller::Suppressor(_) => {}
        }
    }

    /// Clear filter coefficients and reference history
    pub fn reset(&mut self) {
        match self {
            EchoCanceller::Adaptive(lms) => lms.reset(),
            EchoCanceller::Suppressor(sup) => sup.reset(),
        }
    }

    pub fn stats(&self) -> EchoStats {
        match self {
            EchoCanceller::Adaptive(lms) => EchoStats {
                strategy: "adaptive",
                filter_taps: lms.taps.len(),
                step_size: lms.step_size,
                leak_factor: lms.leak_factor,
                adaptations: lms.adaptations,
            },
            EchoCanceller::Suppressor(sup) => EchoStats {
                strategy: "suppressor",
                filter_taps: sup.taps.len(),
                step_size: 0.0,
                leak_factor: 1.0,
                adaptations: 0,
            },
        }
    }
}

/// LMS adaptive canceller with far-end reference
#[derive(Debug)]
pub struct AdaptiveLms {
    taps: Vec<f32>,
    history: Vec<f32>,
    step_size: f32,
    leak_factor: f32,
    bootstrap_attenuation: f32,
    adaptations: u64,
}

impl AdaptiveLms {
    fn new(config: &EchoConfig) -> Self {
        Self {
            taps: vec![0.0; config.filter_taps],
            history: vec![0.0; config.filter_taps],
            step_size: config.step_size,
            leak_factor: config.leak_factor,
            bootstrap_attenuation: config.bootstrap_attenuation,
            adaptations: 0,
        }
    }

    fn process(&mut self, input: &[f32], reference: Option<&[f32]>) -> Vec<f32> {
        let Some(reference) = reference else {
            // No reference yet: attenuate flat rather than adapt blind.
            return input.iter().map(|s| s * self.bootstrap_attenuation).collect();
        };

        if reference.len() < self.taps.len() {
            return input.iter().map(|s| s * self.bootstrap_attenuation).collect();
        }

        // The most recent filter-length reference samples become the history.
        let tail = &reference[reference.len() - self.taps.len()..];
        self.history.copy_from_slice(tail);

        // Echo estimate over the fully-overlapped region.
        let estimate = dsp::convolve_valid(&self.history, &self.taps);
        let overlap = estimate.len().min(input.len());

        // Near-end error signal.
        let error: Vec<f32> = input[..overlap]
            .iter()
            .zip(estimate.iter())
            .map(|(x, e)| x - e)
            .collect();

        // Stochastic-gradient coefficient update, then leak.
        let update = dsp::convolve_valid(&error, &self.history);
        for (tap, delta) in self.taps.iter_mut().zip(update.iter()) {
            *tap = (*tap + self.step_size * delta) * self.leak_factor;
        }
        self.adaptations += 1;

        // Overlap region carries the error signal; the tail passes through.
        let mut output = input.to_vec();
        output[..overlap].copy_from_slice(&error);
        output
    }

    fn update_reference(&mut self, reference: &[f32]) {
        if reference.is_empty() {
            return;
        }
        let n = reference.len().min(self.history.len());
        let hist_len = self.history.len().max(1);
        self.history.rotate_left(n % hist_len);
        let len = self.history.len();
        self.history[len - n..].copy_from_slice(&reference[..n]);
    }

    fn reset(&mut self) {
        self.taps.iter_mut().for_each(|t| *t = 0.0);
        self.history.iter_mut().for_each(|h| *h = 0.0);
        self.adaptations = 0;
    }
}

/// Reference-less echo suppressor
///
/// Convolves a zero-seeded filter with the incoming frame and subtracts a
/// fraction of the estimate. Without a far-end reference there is nothing to
/// adapt against, so this is a heuristic with no cancellation guarantee.
#[derive(Debug)]
pub struct ReferencelessSuppressor {
    taps: Vec<f32>,
    weight: f32,
}

impl ReferencelessSuppressor {
    fn new(config: &EchoConfig) -> Self {
        Self {
            taps: vec![0.0; config.filter_taps],
            weight: config.suppression_weight,
        }
    }

    fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if input.is_empty() {
            return Vec::new();
        }

        let taps = &self.taps[..self.taps.len().min(input.len())];
        let estimate = dsp::convolve_same(input, taps);
        input
            .iter()
            .zip(estimate.iter())
            .map(|(x, e)| x - self.weight * e)
            .collect()
    }

    fn reset(&mut self) {
        self.taps.iter_mut().for_each(|t| *t = 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livescribe_config::{EchoConfig, EchoStrategy};

    fn small_config(strategy: EchoStrategy) -> EchoConfig {
        EchoConfig {
            strategy,
            filter_taps: 8,
            ..EchoConfig::default()
        }
    }

    #[test]
    fn test_adaptive_preserves_length_with_reference() {
        let mut canceller = EchoCanceller::from_config(&small_config(EchoStrategy::Adaptive));
        let input: Vec<f32> = (0..32).map(|i| (i as f32 * 0.1).sin() * 0.5).collect();
        let reference: Vec<f32> = (0..16).map(|i| (i as f32 * 0.2).cos() * 0.5).collect();

        let out = canceller.process(&input, Some(&reference)).unwrap();
        assert_eq!(out.len(), input.len());
        assert_eq!(canceller.stats().adaptations, 1);
    }

    #[test]
    fn test_adaptive_without_reference_attenuates_flat() {
        let mut canceller = EchoCanceller::from_config(&small_config(EchoStrategy::Adaptive));
        let input = vec![0.5; 16];

        let out = canceller.process(&input, None).unwrap();
        assert_eq!(out.len(), input.len());
        for &s in &out {
            assert!((s - 0.4).abs() < 1e-6);
        }
    }

    #[test]
    fn test_adaptive_short_reference_attenuates_flat() {
        let mut canceller = EchoCanceller::from_config(&small_config(EchoStrategy::Adaptive));
        let input = vec![0.5; 16];
        let short_reference = vec![0.1; 4]; // shorter than the 8-tap filter

        let out = canceller.process(&input, Some(&short_reference)).unwrap();
        for &s in &out {
            assert!((s - 0.4).abs() < 1e-6);
        }
        assert_eq!(canceller.stats().adaptations, 0);
    }

    #[test]
    fn test_suppressor_preserves_length() {
        let mut canceller = EchoCanceller::from_config(&small_config(EchoStrategy::Suppressor));
        let input: Vec<f32> = (0..64).map(|i| (i as f32 * 0.05).sin()).collect();

        let out = canceller.process(&input, None).unwrap();
        assert_eq!(out.len(), input.len());
    }

    #[test]
    fn test_suppressor_with_zero_filter_is_identity() {
        // Freshly constructed, the estimate is all zeros.
        let mut canceller = EchoCanceller::from_config(&small_config(EchoStrategy::Suppressor));
        let input = vec![0.25, -0.5, 0.75, -0.125];

        let out = canceller.process(&input, None).unwrap();
        for (x, y) in input.iter().zip(out.iter()) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_non_finite_output_is_an_error() {
        let mut canceller = EchoCanceller::from_config(&small_config(EchoStrategy::Adaptive));
        let mut input = vec![0.5; 16];
        input[0] = f32::INFINITY;
        let reference = vec![0.1; 16];

        assert!(canceller.process(&input, Some(&reference)).is_err());
    }

    #[test]
    fn test_reset_zeroes_adaptation() {
        let mut canceller = EchoCanceller::from_config(&small_config(EchoStrategy::Adaptive));
        let input = vec![0.5; 16];
        let reference = vec![0.3; 16];
        canceller.process(&input, Some(&reference)).unwrap();
        assert!(canceller.stats().adaptations > 0);

        canceller.reset();
        assert_eq!(canceller.stats().adaptations, 0);
    }

    #[test]
    fn test_update_reference_rolls_history() {
        let config = small_config(EchoStrategy::Adaptive);
        let mut lms = AdaptiveLms::new(&config);
        lms.update_reference(&[1.0, 2.0, 3.0]);
        assert_eq!(&lms.history[5..], &[1.0, 2.0, 3.0]);

        lms.update_reference(&[4.0, 5.0]);
        assert_eq!(&lms.history[3..], &[1.0, 2.0, 3.0, 4.0, 5.0]);
    }
}
