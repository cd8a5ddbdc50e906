//! Automatic gain control stage
//!
//! Normalizes chunk loudness toward a target RMS. Very loud input is softened
//! with a compression curve instead of hard attenuation, and samples pushed
//! past the compression threshold are rounded off gently.

use livescribe_config::GainConfig;

use crate::dsp;

/// Automatic gain controller
#[derive(Debug)]
pub struct GainController {
    target_rms: f32,
    min_gain: f32,
    max_gain: f32,
    compress_threshold: f32,
    compress_ratio: f32,
}

impl GainController {
    pub fn new(config: &GainConfig) -> Self {
        Self {
            target_rms: config.target_rms,
            min_gain: config.min_gain,
            max_gain: config.max_gain,
            compress_threshold: config.compress_threshold,
            compress_ratio: config.compress_ratio,
        }
    }

    /// Raw gain for a measured RMS, clamped to the configured range
    ///
    /// This is the value before the soft-compression adjustment in
    /// [`process`](Self::process).
    pub fn compute_gain(&self, current_rms: f32) -> f32 {
        (self.target_rms / current_rms).clamp(self.min_gain, self.max_gain)
    }

    /// Apply gain to one chunk; output length equals input length
    pub fn process(&self, input: &[f32]) -> Vec<f32> {
        let current_rms = dsp::rms(input);
        if current_rms == 0.0 {
            return input.to_vec();
        }

        let mut gain = self.compute_gain(current_rms);
        if gain < 0.5 {
            // Very loud input: compress toward unity instead of slamming the
            // level down.
            gain = 0.5 + 0.5 * (gain / 0.5);
        }

        input
            .iter()
            .map(|x| self.compress(x * gain))
            .collect()
    }

    /// Gentle dynamic-range compression above the threshold
    fn compress(&self, sample: f32) -> f32 {
        let magnitude = sample.abs();
        if magnitude <= self.compress_threshold {
            return sample;
        }
        let compressed =
            self.compress_threshold + (magnitude - self.compress_threshold) / self.compress_ratio;
        compressed.copysign(sample)
    }
}
