//! Noise suppression stage
//!
//! Short-time-energy noise gate. A smoothed RMS envelope is compared against
//! a percentile-based floor estimate; the resulting gate ratio is smoothed
//! again and clamped so the gate attenuates but never fully mutes.

use livescribe_config::NoiseConfig;

use crate::dsp;

/// Percentile noise gate
#[derive(Debug)]
pub struct NoiseSuppressor {
    window: usize,
    floor_percentile: f32,
    floor_scale: f32,
    min_gate: f32,
}

/// Floor substitute used when the estimated noise floor is zero
const FLOOR_EPSILON: f32 = 1e-3;

impl NoiseSuppressor {
    pub fn new(config: &NoiseConfig) -> Self {
        Self {
            window: config.window,
            floor_percentile: config.floor_percentile,
            floor_scale: config.floor_scale,
            min_gate: config.min_gate,
        }
    }

    /// Gate one chunk; output length equals input length
    pub fn process(&self, input: &[f32]) -> Vec<f32> {
        if input.is_empty() {
            return Vec::new();
        }

        // Smoothed short-time RMS envelope.
        let squared: Vec<f32> = input.iter().map(|s| s * s).collect();
        let envelope: Vec<f32> = dsp::moving_average(&squared, self.window)
            .iter()
            .map(|e| e.max(0.0).sqrt())
            .collect();

        let noise_floor = dsp::percentile(&envelope, self.floor_percentile);

        let divisor = if noise_floor > 0.0 {
            noise_floor * self.floor_scale
        } else {
            FLOOR_EPSILON
        };

        let raw_gate: Vec<f32> = envelope
            .iter()
            .map(|e| (e / divisor).clamp(0.0, 1.0))
            .collect();

        let gate: Vec<f32> = dsp::moving_average(&raw_gate, self.window)
            .iter()
            .map(|g| g.clamp(self.min_gate, 1.0))
            .collect();

        input.iter().zip(gate.iter()).map(|(x, g)| x * g).collect()
    }

    pub fn reset(&self) {
        // The gate is computed per chunk; there is no carried state.
    }
}
