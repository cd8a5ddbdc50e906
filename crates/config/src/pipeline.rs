//! Audio conditioning pipeline configuration

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Conditioning pipeline configuration
///
/// Each stage can be toggled independently; `enabled` switches the whole
/// pipeline into pass-through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Master toggle for the conditioning pipeline
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// High-pass filter stage
    #[serde(default)]
    pub high_pass: HighPassConfig,

    /// Echo cancellation stage
    #[serde(default)]
    pub echo: EchoConfig,

    /// Noise suppression stage
    #[serde(default)]
    pub noise: NoiseConfig,

    /// Automatic gain control stage
    #[serde(default)]
    pub gain: GainConfig,

    /// Rolling lookback buffer length in seconds
    #[serde(default = "default_lookback_seconds")]
    pub lookback_seconds: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            high_pass: HighPassConfig::default(),
            echo: EchoConfig::default(),
            noise: NoiseConfig::default(),
            gain: GainConfig::default(),
            lookback_seconds: default_lookback_seconds(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookback_seconds <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.lookback_seconds".to_string(),
                message: "must be positive".to_string(),
            });
        }
        self.echo.validate()?;
        self.noise.validate()?;
        self.gain.validate()?;
        Ok(())
    }
}

/// High-pass filter stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighPassConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cutoff frequency in Hz
    #[serde(default = "default_cutoff_hz")]
    pub cutoff_hz: f32,
}

impl Default for HighPassConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cutoff_hz: default_cutoff_hz(),
        }
    }
}

/// Echo canceller strategy
///
/// A closed set: `Adaptive` runs the LMS filter against a caller-supplied
/// reference signal; `Suppressor` is the reference-less heuristic used when
/// no reference is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EchoStrategy {
    #[default]
    Adaptive,
    Suppressor,
}

/// Echo cancellation stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EchoConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Which canceller variant to construct
    #[serde(default)]
    pub strategy: EchoStrategy,

    /// Adaptive filter length in taps
    #[serde(default = "default_filter_taps")]
    pub filter_taps: usize,

    /// LMS adaptation step size
    #[serde(default = "default_step_size")]
    pub step_size: f32,

    /// Forgetting factor applied to coefficients after each update
    #[serde(default = "default_leak_factor")]
    pub leak_factor: f32,

    /// Fraction of the echo estimate subtracted in suppressor mode
    #[serde(default = "default_suppression_weight")]
    pub suppression_weight: f32,

    /// Flat attenuation applied while the reference is too short to adapt
    #[serde(default = "default_bootstrap_attenuation")]
    pub bootstrap_attenuation: f32,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: EchoStrategy::default(),
            filter_taps: default_filter_taps(),
            step_size: default_step_size(),
            leak_factor: default_leak_factor(),
            suppression_weight: default_suppression_weight(),
            bootstrap_attenuation: default_bootstrap_attenuation(),
        }
    }
}

impl EchoConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.filter_taps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.echo.filter_taps".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !(0.0..1.0).contains(&self.step_size) || self.step_size == 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.echo.step_size".to_string(),
                message: format!("must be in (0, 1), got {}", self.step_size),
            });
        }
        if !(0.0..=1.0).contains(&self.leak_factor) {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.echo.leak_factor".to_string(),
                message: format!("must be in [0, 1], got {}", self.leak_factor),
            });
        }
        Ok(())
    }
}

/// Noise suppression stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Moving-average window in samples for the energy envelope
    #[serde(default = "default_noise_window")]
    pub window: usize,

    /// Percentile of the envelope taken as the noise floor
    #[serde(default = "default_floor_percentile")]
    pub floor_percentile: f32,

    /// Multiplier applied to the noise floor when computing the gate
    #[serde(default = "default_floor_scale")]
    pub floor_scale: f32,

    /// Lower bound of the gate ratio; the gate never fully mutes
    #[serde(default = "default_min_gate")]
    pub min_gate: f32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: default_noise_window(),
            floor_percentile: default_floor_percentile(),
            floor_scale: default_floor_scale(),
            min_gate: default_min_gate(),
        }
    }
}

impl NoiseConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.window == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.noise.window".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=100.0).contains(&self.floor_percentile) {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.noise.floor_percentile".to_string(),
                message: format!("must be in [0, 100], got {}", self.floor_percentile),
            });
        }
        if !(0.0..=1.0).contains(&self.min_gate) || self.min_gate == 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.noise.min_gate".to_string(),
                message: format!("must be in (0, 1], got {}", self.min_gate),
            });
        }
        Ok(())
    }
}

/// Automatic gain control stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GainConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Target RMS level (~ -20 dBFS)
    #[serde(default = "default_target_rms")]
    pub target_rms: f32,

    /// Gain clamp lower bound
    #[serde(default = "default_min_gain")]
    pub min_gain: f32,

    /// Gain clamp upper bound
    #[serde(default = "default_max_gain")]
    pub max_gain: f32,

    /// Amplitude above which samples are compressed after gain
    #[serde(default = "default_compress_threshold")]
    pub compress_threshold: f32,

    /// Compression ratio applied above the threshold
    #[serde(default = "default_compress_ratio")]
    pub compress_ratio: f32,
}

impl Default for GainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_rms: default_target_rms(),
            min_gain: default_min_gain(),
            max_gain: default_max_gain(),
            compress_threshold: default_compress_threshold(),
            compress_ratio: default_compress_ratio(),
        }
    }
}

impl GainConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_gain <= 0.0 || self.min_gain >= self.max_gain {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.gain.min_gain".to_string(),
                message: format!(
                    "must be positive and below max_gain, got {} / {}",
                    self.min_gain, self.max_gain
                ),
            });
        }
        if self.target_rms <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.gain.target_rms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.compress_ratio < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.gain.compress_ratio".to_string(),
                message: format!("must be at least 1.0, got {}", self.compress_ratio),
            });
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_lookback_seconds() -> f32 {
    2.0
}

fn default_cutoff_hz() -> f32 {
    120.0
}

fn default_filter_taps() -> usize {
    1024
}

fn default_step_size() -> f32 {
    0.005
}

fn default_leak_factor() -> f32 {
    0.99
}

fn default_suppression_weight() -> f32 {
    0.3
}

fn default_bootstrap_attenuation() -> f32 {
    0.8
}

fn default_noise_window() -> usize {
    256
}

fn default_floor_percentile() -> f32 {
    15.0
}

fn default_floor_scale() -> f32 {
    1.5
}

fn default_min_gate() -> f32 {
    0.1
}

fn default_target_rms() -> f32 {
    0.1
}

fn default_min_gain() -> f32 {
    0.1
}

fn default_max_gain() -> f32 {
    10.0
}

fn default_compress_threshold() -> f32 {
    0.8
}

fn default_compress_ratio() -> f32 {
    2.0
}
