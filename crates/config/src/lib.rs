//! Configuration management for the transcription front-end
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default`, then `config/{env}`)
//! - Environment variables (`LIVESCRIBE__` prefix, `__` separator)
//!
//! Environment variables override files, so the conditioning pipeline can be
//! switched off with `LIVESCRIBE__PIPELINE__ENABLED=false` without touching
//! any file.

pub mod pipeline;
pub mod settings;

pub use pipeline::{
    EchoConfig, EchoStrategy, GainConfig, HighPassConfig, NoiseConfig, PipelineConfig,
};
pub use settings::{
    load_settings, ObservabilityConfig, RuntimeEnvironment, ServerConfig, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
}
