//! Transcription engine collaborator trait
//!
//! The actual speech-to-text and translation backends live outside this
//! repository; this module defines the boundary they plug into. The server
//! hands each engine a per-session descriptor and an outbound channel for
//! messages it wants delivered to the client (transcript segments, progress
//! notifications).

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::audio::AudioFrame;
use crate::error::Result;

/// Per-session configuration handed to the transcription engine
///
/// Mirrors the fields of the client handshake message, minus transport
/// concerns.
#[derive(Debug, Clone)]
pub struct SessionDescriptor {
    /// Opaque client identity
    pub uid: String,
    /// Source language; `None` requests auto-detection
    pub language: Option<String>,
    /// Task, e.g. "transcribe" or "translate"
    pub task: String,
    /// Model identifier
    pub model: String,
    /// Whether voice-activity gating should be applied by the engine
    pub use_vad: bool,
    /// Probability threshold below which a segment counts as non-speech
    pub no_speech_thresh: Option<f32>,
    /// Number of identical decodes before a segment is frozen
    pub same_output_threshold: Option<u32>,
    /// How many trailing segments to resend with each update
    pub send_last_n_segments: Option<u32>,
    /// Whether a translation worker should run alongside transcription
    pub enable_translation: bool,
    /// Target language for translation
    pub target_language: Option<String>,
}

impl SessionDescriptor {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            language: None,
            task: "transcribe".to_string(),
            model: "base".to_string(),
            use_vad: true,
            no_speech_thresh: None,
            same_output_threshold: None,
            send_last_n_segments: None,
            enable_translation: false,
            target_language: None,
        }
    }
}

/// Pluggable transcription backend
///
/// Engines receive conditioned audio frames for each active session and emit
/// client-bound JSON messages through the outbound sender supplied at session
/// start. Implementations are driven behind a shared mutex (one in-flight
/// call at a time), so methods take `&mut self`.
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    /// Begin a session; called once after the client handshake
    async fn start_session(
        &mut self,
        session: &SessionDescriptor,
        outbound: mpsc::Sender<String>,
    ) -> Result<()>;

    /// Feed one conditioned audio frame
    async fn accept_frame(&mut self, uid: &str, frame: &AudioFrame) -> Result<()>;

    /// End a session; called on end-of-audio, timeout, or disconnect
    async fn finish_session(&mut self, uid: &str) -> Result<()>;

    /// Engine name for logging
    fn name(&self) -> &str;
}
