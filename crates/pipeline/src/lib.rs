//! Streaming audio conditioning pipeline
//!
//! Conditions raw microphone audio before it reaches a transcription engine:
//! normalization, high-pass filtering, adaptive echo cancellation, noise
//! suppression, and automatic gain control. Stages are sequenced by
//! [`AudioPipeline`]; per-session filter state lives inside the pipeline
//! instance and is never shared across sessions.

pub mod dsp;
pub mod echo;
pub mod gain;
pub mod highpass;
pub mod noise;
pub mod normalize;
pub mod orchestrator;

pub use echo::{EchoCanceller, EchoStats};
pub use gain::GainController;
pub use highpass::HighPassFilter;
pub use noise::NoiseSuppressor;
pub use orchestrator::{AudioPipeline, Degradation, PipelineStats, ProcessedChunk};

use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("echo canceller diverged: {0}")]
    EchoDiverged(String),
}
