//! Core types for the streaming transcription front-end
//!
//! This crate provides the foundational pieces shared by the pipeline and
//! server crates:
//! - Audio frame types and the rolling audio buffer
//! - The `TranscriptionEngine` trait for pluggable transcription backends
//! - Error types

pub mod audio;
pub mod engine;
pub mod error;

pub use audio::{AudioBuffer, AudioFrame, Channels, SampleRate};
pub use engine::{SessionDescriptor, TranscriptionEngine};
pub use error::{Error, Result};
