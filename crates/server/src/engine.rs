//! Engine wiring
//!
//! [`SharedEngine`] wraps one engine instance shared across every session —
//! a deliberate memory/throughput trade-off. The inner mutex makes the
//! critical section explicit: one in-flight engine call at a time, and the
//! only cross-session contention point besides the session registry.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use livescribe_core::{AudioFrame, Error, Result, SessionDescriptor, TranscriptionEngine};

/// Shared, mutually-exclusive handle to the transcription engine
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<Box<dyn TranscriptionEngine>>>,
}

impl SharedEngine {
    pub fn new(engine: Box<dyn TranscriptionEngine>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    pub async fn start_session(
        &self,
        session: &SessionDescriptor,
        outbound: mpsc::Sender<String>,
    ) -> Result<()> {
        self.inner.lock().await.start_session(session, outbound).await
    }

    pub async fn accept_frame(&self, uid: &str, frame: &AudioFrame) -> Result<()> {
        self.inner.lock().await.accept_frame(uid, frame).await
    }

    pub async fn finish_session(&self, uid: &str) -> Result<()> {
        self.inner.lock().await.finish_session(uid).await
    }

    pub async fn name(&self) -> String {
        self.inner.lock().await.name().to_string()
    }
}

/// Engine that accepts audio and produces nothing
///
/// Stands in when no transcription backend is wired up, so the conditioning
/// front-end can run (and be load-tested) on its own.
#[derive(Default)]
pub struct PassthroughEngine {
    sessions: HashSet<String>,
    frames: u64,
}

#[async_trait]
impl TranscriptionEngine for PassthroughEngine {
    async fn start_session(
        &mut self,
        session: &SessionDescriptor,
        _outbound: mpsc::Sender<String>,
    ) -> Result<()> {
        if !self.sessions.insert(session.uid.clone()) {
            return Err(Error::Engine(format!(
                "session '{}' already active",
                session.uid
            )));
        }
        tracing::info!(
            uid = %session.uid,
            model = %session.model,
            task = %session.task,
            language = session.language.as_deref().unwrap_or("auto"),
            "passthrough engine session started"
        );
        Ok(())
    }

    async fn accept_frame(&mut self, uid: &str, frame: &AudioFrame) -> Result<()> {
        if !self.sessions.contains(uid) {
            return Err(Error::Session(format!("unknown session '{}'", uid)));
        }
        self.frames += 1;
        if self.frames % 100 == 0 {
            tracing::debug!(
                uid,
                frames = self.frames,
                energy_db = frame.energy_db,
                "accepted audio frame"
            );
        }
        Ok(())
    }

    async fn finish_session(&mut self, uid: &str) -> Result<()> {
        // Idempotent: teardown may race the streaming loop's own finish.
        self.sessions.remove(uid);
        tracing::info!(uid, frames = self.frames, "passthrough engine session finished");
        Ok(())
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livescribe_core::{Channels, SampleRate};

    #[tokio::test]
    async fn test_passthrough_engine_lifecycle() {
        let engine = SharedEngine::new(Box::new(PassthroughEngine::default()));
        assert_eq!(engine.name().await, "passthrough");

        let (tx, _rx) = mpsc::channel(8);
        let descriptor = SessionDescriptor::new("test-uid");
        engine.start_session(&descriptor, tx).await.unwrap();

        let frame = AudioFrame::new(vec![0.1; 160], SampleRate::Hz16000, Channels::Mono, 0);
        engine.accept_frame("test-uid", &frame).await.unwrap();
        engine.finish_session("test-uid").await.unwrap();
    }

    #[tokio::test]
    async fn test_shared_engine_is_cloneable() {
        let engine = SharedEngine::new(Box::new(PassthroughEngine::default()));
        let clone = engine.clone();

        // Both handles drive the same underlying engine.
        let (tx, _rx) = mpsc::channel(8);
        engine
            .start_session(&SessionDescriptor::new("a"), tx)
            .await
            .unwrap();

        let frame = AudioFrame::new(vec![0.0; 160], SampleRate::Hz16000, Channels::Mono, 0);
        engine.accept_frame("a", &frame).await.unwrap();
        clone.accept_frame("a", &frame).await.unwrap();
    }

    #[tokio::test]
    async fn test_frames_for_unknown_session_rejected() {
        let engine = SharedEngine::new(Box::new(PassthroughEngine::default()));
        let frame = AudioFrame::new(vec![0.0; 160], SampleRate::Hz16000, Channels::Mono, 0);
        assert!(engine.accept_frame("ghost", &frame).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_session_rejected() {
        let engine = SharedEngine::new(Box::new(PassthroughEngine::default()));
        let descriptor = SessionDescriptor::new("a");

        let (tx, _rx) = mpsc::channel(8);
        engine.start_session(&descriptor, tx).await.unwrap();

        let (tx, _rx) = mpsc::channel(8);
        assert!(engine.start_session(&descriptor, tx).await.is_err());
    }
}
