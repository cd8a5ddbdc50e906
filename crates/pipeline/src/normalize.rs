//! Sample normalization
//!
//! Converts fixed-width integer and floating encodings to f32 in [-1, 1].
//! All functions are pure; clipping an already-normalized signal is a no-op.

/// Clip f32 samples to [-1.0, 1.0]
pub fn clip_to_unit(samples: &[f32]) -> Vec<f32> {
    samples.iter().map(|s| s.clamp(-1.0, 1.0)).collect()
}

/// Convert 16-bit signed PCM to normalized f32
pub fn from_i16(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Convert 32-bit signed PCM to normalized f32
pub fn from_i32(samples: &[i32]) -> Vec<f32> {
    samples
        .iter()
        .map(|&s| (s as f64 / 2147483648.0) as f32)
        .collect()
}

/// Convert 64-bit float samples to clipped f32
pub fn from_f64(samples: &[f64]) -> Vec<f32> {
    samples.iter().map(|&s| (s as f32).clamp(-1.0, 1.0)).collect()
}
