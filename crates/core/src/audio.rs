//! Audio frame types and utilities

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Supported audio sample rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SampleRate {
    /// 8kHz - Telephony
    Hz8000,
    /// 16kHz - Standard speech recognition
    #[default]
    Hz16000,
    /// 44.1kHz - CD quality
    Hz44100,
    /// 48kHz - Professional audio
    Hz48000,
}

impl SampleRate {
    /// Get sample rate as u32
    pub fn as_u32(&self) -> u32 {
        match self {
            SampleRate::Hz8000 => 8000,
            SampleRate::Hz16000 => 16000,
            SampleRate::Hz44100 => 44100,
            SampleRate::Hz48000 => 48000,
        }
    }

    /// Get samples per millisecond
    pub fn samples_per_ms(&self) -> usize {
        self.as_u32() as usize / 1000
    }
}

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Channels {
    #[default]
    Mono,
    Stereo,
}

impl Channels {
    pub fn count(&self) -> usize {
        match self {
            Channels::Mono => 1,
            Channels::Stereo => 2,
        }
    }
}

/// Audio frame with metadata
///
/// Samples are stored as f32 normalized to [-1.0, 1.0]. Frames are immutable
/// once built; conditioning stages produce new frames instead of mutating.
#[derive(Clone)]
pub struct AudioFrame {
    /// Raw audio samples (f32, normalized to [-1.0, 1.0])
    pub samples: Arc<[f32]>,
    /// Sample rate
    pub sample_rate: SampleRate,
    /// Number of channels
    pub channels: Channels,
    /// Frame sequence number for ordering
    pub sequence: u64,
    /// Duration of this frame
    pub duration: Duration,
    /// Energy level in dB
    pub energy_db: f32,
}

impl std::fmt::Debug for AudioFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFrame")
            .field("samples_len", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("sequence", &self.sequence)
            .field("duration", &self.duration)
            .field("energy_db", &self.energy_db)
            .finish()
    }
}

impl AudioFrame {
    /// Create a new audio frame from f32 samples
    pub fn new(
        samples: Vec<f32>,
        sample_rate: SampleRate,
        channels: Channels,
        sequence: u64,
    ) -> Self {
        let duration = Duration::from_secs_f64(
            samples.len() as f64 / (sample_rate.as_u32() as f64 * channels.count() as f64),
        );
        let energy_db = Self::calculate_energy_db(&samples);

        Self {
            samples: samples.into(),
            sample_rate,
            channels,
            sequence,
            duration,
            energy_db,
        }
    }

    /// Calculate RMS energy in decibels
    fn calculate_energy_db(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return -96.0; // Minimum dB (silence)
        }

        let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
        let rms = (sum_squares / samples.len() as f32).sqrt();

        if rms > 0.0 {
            20.0 * rms.log10()
        } else {
            -96.0
        }
    }

    /// Get duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }

    /// Check if frame is likely silence based on energy
    pub fn is_likely_silence(&self, threshold_db: f32) -> bool {
        self.energy_db < threshold_db
    }
}

/// Rolling audio buffer bounded by duration
///
/// Holds the most recent samples up to `max_duration`; older samples are
/// dropped from the front once the buffer is full.
#[derive(Debug)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: SampleRate,
    max_samples: usize,
}

impl AudioBuffer {
    pub fn new(sample_rate: SampleRate, max_duration: Duration) -> Self {
        let max_samples = (sample_rate.as_u32() as f64 * max_duration.as_secs_f64()) as usize;

        Self {
            samples: Vec::with_capacity(max_samples),
            sample_rate,
            max_samples,
        }
    }

    /// Append samples, dropping the oldest data once over capacity
    pub fn extend(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);

        if self.samples.len() > self.max_samples {
            let excess = self.samples.len() - self.max_samples;
            self.samples.drain(0..excess);
        }
    }

    /// Get all buffered samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Get buffer duration
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate.as_u32() as f64)
    }

    /// Buffer capacity as a duration
    pub fn capacity(&self) -> Duration {
        Duration::from_secs_f64(self.max_samples as f64 / self.sample_rate.as_u32() as f64)
    }

    /// Get the most recent samples covering `duration` (or all if shorter)
    pub fn recent(&self, duration: Duration) -> &[f32] {
        let needed = (duration.as_secs_f64() * self.sample_rate.as_u32() as f64) as usize;
        if self.samples.len() >= needed {
            &self.samples[self.samples.len() - needed..]
        } else {
            &self.samples
        }
    }

    /// Clear buffer
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rate_conversions() {
        assert_eq!(SampleRate::Hz16000.as_u32(), 16000);
        assert_eq!(SampleRate::Hz16000.samples_per_ms(), 16);
    }

    #[test]
    fn test_audio_frame_duration() {
        let frame = AudioFrame::new(vec![0.0; 1600], SampleRate::Hz16000, Channels::Mono, 0);
        assert_eq!(frame.duration_ms(), 100);
    }

    #[test]
    fn test_energy_calculation() {
        // Silence
        let silent = AudioFrame::new(vec![0.0; 160], SampleRate::Hz16000, Channels::Mono, 0);
        assert!(silent.energy_db < -90.0);
        assert!(silent.is_likely_silence(-50.0));

        // Loud constant signal
        let loud = AudioFrame::new(vec![0.5; 160], SampleRate::Hz16000, Channels::Mono, 0);
        assert!(loud.energy_db > -10.0);
        assert!(!loud.is_likely_silence(-50.0));
    }

    #[test]
    fn test_audio_buffer_drops_oldest() {
        let mut buffer = AudioBuffer::new(SampleRate::Hz16000, Duration::from_millis(10));
        // Capacity is 160 samples; push 200 and expect the first 40 gone.
        let data: Vec<f32> = (0..200).map(|i| i as f32).collect();
        buffer.extend(&data);

        assert_eq!(buffer.samples().len(), 160);
        assert_eq!(buffer.samples()[0], 40.0);
    }

    #[test]
    fn test_audio_buffer_recent() {
        let mut buffer = AudioBuffer::new(SampleRate::Hz16000, Duration::from_secs(1));
        buffer.extend(&vec![0.25; 320]);

        let recent = buffer.recent(Duration::from_millis(10));
        assert_eq!(recent.len(), 160);

        // Asking for more than is buffered returns everything
        let recent = buffer.recent(Duration::from_secs(5));
        assert_eq!(recent.len(), 320);
    }
}
