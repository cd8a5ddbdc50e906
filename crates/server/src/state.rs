//! Application state
//!
//! Shared state across all handlers: settings, the session registry, and the
//! shared engine handle. Everything a connection task needs is reached
//! through this struct; there is no ambient global state.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use livescribe_config::Settings;
use livescribe_core::TranscriptionEngine;

use crate::engine::SharedEngine;
use crate::session::SessionManager;

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: Arc<RwLock<Settings>>,
    /// Session admission and timeout manager
    pub sessions: Arc<SessionManager>,
    /// Shared transcription engine (one in-flight call at a time)
    pub engine: SharedEngine,
}

impl AppState {
    pub fn new(config: Settings, engine: Box<dyn TranscriptionEngine>) -> Self {
        let sessions = SessionManager::with_config(
            config.server.max_clients,
            Duration::from_secs(config.server.max_connection_time),
        );

        Self {
            config: Arc::new(RwLock::new(config)),
            sessions: Arc::new(sessions),
            engine: SharedEngine::new(engine),
        }
    }
}
