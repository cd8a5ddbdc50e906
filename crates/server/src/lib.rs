//! Streaming transcription front-end server
//!
//! Accepts WebSocket connections carrying raw 16 kHz mono audio, conditions
//! each chunk through the audio pipeline, and forwards it to the configured
//! transcription engine. Session admission, timeouts, and teardown are
//! handled by [`SessionManager`].

pub mod connection;
pub mod engine;
pub mod http;
pub mod metrics;
pub mod session;
pub mod state;

pub use connection::{ws_handler, ClientConfig, ConnectionPhase};
pub use engine::{PassthroughEngine, SharedEngine};
pub use http::create_router;
pub use metrics::init_metrics;
pub use session::{AdmissionError, Session, SessionHandle, SessionManager};
pub use state::AppState;

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("session error: {0}")]
    Session(String),

    #[error("handshake error: {0}")]
    Handshake(String),

    #[error("engine error: {0}")]
    Engine(String),
}
