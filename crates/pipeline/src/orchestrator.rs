//! Pipeline orchestrator
//!
//! Sequences the conditioning stages per chunk:
//! normalize → high-pass → echo cancel → noise gate → AGC → lookback update.
//!
//! Stage failure is an explicit, observable decision rather than a caught
//! panic: the echo canceller reports divergence through its result type and
//! the orchestrator records a [`Degradation`] and continues with the
//! pre-cancellation frame. One bad chunk degrades quality; it never aborts
//! the session.

use std::time::Duration;

use serde::Serialize;

use livescribe_config::PipelineConfig;
use livescribe_core::{AudioBuffer, SampleRate};

use crate::echo::{EchoCanceller, EchoStats};
use crate::gain::GainController;
use crate::highpass::HighPassFilter;
use crate::noise::NoiseSuppressor;
use crate::normalize;

/// Pipeline sample rate; the wire protocol is fixed at 16 kHz mono
const SAMPLE_RATE: SampleRate = SampleRate::Hz16000;

/// Record of a stage that fell back for one chunk
#[derive(Debug, Clone, Serialize)]
pub struct Degradation {
    pub stage: &'static str,
    pub reason: String,
}

/// Output of one pipeline pass
#[derive(Debug)]
pub struct ProcessedChunk {
    pub samples: Vec<f32>,
    pub degradations: Vec<Degradation>,
}

/// Diagnostic snapshot of an active pipeline
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub enabled: bool,
    pub high_pass_enabled: bool,
    pub echo_enabled: bool,
    pub noise_enabled: bool,
    pub gain_enabled: bool,
    pub echo: EchoStats,
    /// Seconds of audio currently held in the lookback buffer
    pub lookback_seconds: f32,
    /// Lookback buffer capacity in seconds
    pub lookback_capacity_seconds: f32,
    /// Chunks that completed with at least one stage degraded
    pub degraded_chunks: u64,
}

/// Per-session conditioning pipeline
///
/// Owns all mutable filter state for one session. Instances are never shared
/// across sessions, so no synchronization is needed.
pub struct AudioPipeline {
    config: PipelineConfig,
    high_pass: HighPassFilter,
    echo: EchoCanceller,
    noise: NoiseSuppressor,
    gain: GainController,
    lookback: AudioBuffer,
    degraded_chunks: u64,
}

impl AudioPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            high_pass: HighPassFilter::new(SAMPLE_RATE.as_u32(), config.high_pass.cutoff_hz),
            echo: EchoCanceller::from_config(&config.echo),
            noise: NoiseSuppressor::new(&config.noise),
            gain: GainController::new(&config.gain),
            lookback: AudioBuffer::new(
                SAMPLE_RATE,
                Duration::from_secs_f32(config.lookback_seconds),
            ),
            degraded_chunks: 0,
            config: config.clone(),
        }
    }

    /// Condition one chunk of audio
    ///
    /// Empty input yields empty output. With the master toggle off the chunk
    /// passes through untouched.
    pub fn process(&mut self, input: &[f32], reference: Option<&[f32]>) -> ProcessedChunk {
        if input.is_empty() {
            return ProcessedChunk {
                samples: Vec::new(),
                degradations: Vec::new(),
            };
        }

        if !self.config.enabled {
            return ProcessedChunk {
                samples: input.to_vec(),
                degradations: Vec::new(),
            };
        }

        let mut degradations = Vec::new();
        let mut samples = normalize::clip_to_unit(input);

        if self.config.high_pass.enabled {
            samples = self.high_pass.process(&samples);
        }

        if self.config.echo.enabled {
            match self.echo.process(&samples, reference) {
                Ok(cancelled) => samples = cancelled,
                Err(e) => {
                    tracing::warn!(error = %e, "echo cancellation degraded, keeping unprocessed chunk");
                    degradations.push(Degradation {
                        stage: "echo",
                        reason: e.to_string(),
                    });
                    // keep the pre-cancellation samples
                }
            }
        }

        if self.config.noise.enabled {
            samples = self.noise.process(&samples);
        }

        if self.config.gain.enabled {
            samples = self.gain.process(&samples);
        }

        self.lookback.extend(&samples);
        if !degradations.is_empty() {
            self.degraded_chunks += 1;
        }

        ProcessedChunk {
            samples,
            degradations,
        }
    }

    /// Push far-end (speaker) samples into the echo reference history
    pub fn update_reference(&mut self, reference: &[f32]) {
        self.echo.update_reference(reference);
    }

    /// Most recent conditioned audio, up to `duration`, for diagnostics
    pub fn lookback(&self, duration: Duration) -> &[f32] {
        self.lookback.recent(duration)
    }

    /// Clear all stage state; used on session re-initialization
    pub fn reset(&mut self) {
        self.high_pass.reset();
        self.echo.reset();
        self.noise.reset();
        self.lookback.clear();
        self.degraded_chunks = 0;
    }

    /// Diagnostic snapshot; has no effect on processing
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            enabled: self.config.enabled,
            high_pass_enabled: self.config.high_pass.enabled,
            echo_enabled: self.config.echo.enabled,
            noise_enabled: self.config.noise.enabled,
            gain_enabled: self.config.gain.enabled,
            echo: self.echo.stats(),
            lookback_seconds: self.lookback.duration().as_secs_f32(),
            lookback_capacity_seconds: self.lookback.capacity().as_secs_f32(),
            degraded_chunks: self.degraded_chunks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livescribe_config::PipelineConfig;

    fn synthetic_frame(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16000.0).sin() * 0.4)
            .collect()
    }

    #[test]
    fn test_empty_chunk() {
        let mut pipeline = AudioPipeline::new(&PipelineConfig::default());
        let out = pipeline.process(&[], None);
        assert!(out.samples.is_empty());
        assert!(out.degradations.is_empty());
    }

    #[test]
    fn test_disabled_pipeline_passes_through() {
        let mut config = PipelineConfig::default();
        config.enabled = false;
        let mut pipeline = AudioPipeline::new(&config);

        let input = synthetic_frame(320);
        let out = pipeline.process(&input, None);
        assert_eq!(out.samples, input);
    }

    #[test]
    fn test_output_length_and_range() {
        let mut pipeline = AudioPipeline::new(&PipelineConfig::default());
        let input = synthetic_frame(1600);

        let out = pipeline.process(&input, None);
        assert_eq!(out.samples.len(), 1600);
        for &s in &out.samples {
            assert!((-1.0..=1.0).contains(&s), "sample {} out of range", s);
        }
    }

    #[test]
    fn test_divergence_degrades_without_aborting() {
        let mut pipeline = AudioPipeline::new(&PipelineConfig::default());
        let mut input = synthetic_frame(2048);
        input[0] = f32::NAN;

        // NaN survives normalization clipping and trips the canceller's
        // divergence check; the chunk must still come back.
        let reference = vec![0.1; 2048];
        let out = pipeline.process(&input, Some(&reference));
        assert_eq!(out.samples.len(), input.len());
        assert_eq!(out.degradations.len(), 1);
        assert_eq!(out.degradations[0].stage, "echo");
        assert_eq!(pipeline.stats().degraded_chunks, 1);
    }

    #[test]
    fn test_lookback_accumulates_and_caps() {
        let mut pipeline = AudioPipeline::new(&PipelineConfig::default());
        // 3 seconds of audio into a 2 second buffer
        for _ in 0..30 {
            pipeline.process(&synthetic_frame(1600), None);
        }
        let stats = pipeline.stats();
        assert!((stats.lookback_seconds - 2.0).abs() < 0.01);
        assert!((stats.lookback_capacity_seconds - 2.0).abs() < 0.01);
    }

    #[test]
    fn test_lookback_returns_recent_audio() {
        let mut pipeline = AudioPipeline::new(&PipelineConfig::default());
        pipeline.process(&synthetic_frame(1600), None);

        let recent = pipeline.lookback(Duration::from_millis(50));
        assert_eq!(recent.len(), 800);
    }

    #[test]
    fn test_reset_clears_lookback() {
        let mut pipeline = AudioPipeline::new(&PipelineConfig::default());
        pipeline.process(&synthetic_frame(1600), None);
        assert!(pipeline.stats().lookback_seconds > 0.0);

        pipeline.reset();
        assert_eq!(pipeline.stats().lookback_seconds, 0.0);
    }
}
