//! Session admission and timeout management
//!
//! [`SessionManager`] owns the registry of active sessions behind a single
//! lock; all mutation goes through `admit`, `check_timeout`, and `release`.
//! A session appears in the registry exactly while its connection loop is
//! alive. Timeouts are soft: `check_timeout` is called once per loop
//! iteration, and the first detection fires the session's disconnect latch
//! exactly once.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use livescribe_pipeline::PipelineStats;

/// Bounded wait for a session's worker task during release
const CLEANUP_WAIT: Duration = Duration::from_secs(2);

/// Admission failures
#[derive(Error, Debug)]
pub enum AdmissionError {
    /// All slots are taken; `wait_minutes` estimates when one frees up
    #[error("server at capacity, estimated wait {wait_minutes:.1} minutes")]
    AtCapacity { wait_minutes: f64 },

    /// A session with this uid is already active
    #[error("session '{0}' already connected")]
    DuplicateUid(String),
}

/// Shared per-session handle
///
/// Carries the disconnect latch, the optional worker task joined at release,
/// and the latest pipeline diagnostics snapshot.
pub struct SessionHandle {
    disconnect_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stats: Mutex<Option<PipelineStats>>,
}

impl SessionHandle {
    fn new() -> Self {
        let (disconnect_tx, _) = watch::channel(false);
        Self {
            disconnect_tx,
            worker: Mutex::new(None),
            stats: Mutex::new(None),
        }
    }

    /// Fire the disconnect latch; returns true only on the first call
    pub fn disconnect(&self) -> bool {
        !self.disconnect_tx.send_replace(true)
    }

    pub fn is_disconnected(&self) -> bool {
        *self.disconnect_tx.borrow()
    }

    /// Watch the latch; `changed()` resolves once `disconnect` fires
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.disconnect_tx.subscribe()
    }

    /// Attach the session's worker task (joined with a bound at release)
    pub fn set_worker(&self, handle: JoinHandle<()>) {
        *self.worker.lock() = Some(handle);
    }

    fn take_worker(&self) -> Option<JoinHandle<()>> {
        self.worker.lock().take()
    }

    /// Publish a pipeline diagnostics snapshot
    pub fn record_stats(&self, stats: PipelineStats) {
        *self.stats.lock() = Some(stats);
    }

    pub fn stats(&self) -> Option<PipelineStats> {
        self.stats.lock().clone()
    }
}

/// One admitted session
pub struct Session {
    pub uid: String,
    pub started_at: Instant,
    pub handle: Arc<SessionHandle>,
}

/// Admission control and per-session timers
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Session>>,
    max_clients: usize,
    max_connection_time: Duration,
}

impl SessionManager {
    pub fn new(max_clients: usize) -> Self {
        Self::with_config(max_clients, Duration::from_secs(600))
    }

    pub fn with_config(max_clients: usize, max_connection_time: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_clients,
            max_connection_time,
        }
    }

    /// Admit a new session
    ///
    /// Rejects when the registry is full, with an estimated wait derived from
    /// the remaining time of the longest-running slot closest to expiry.
    pub fn admit(&self, uid: &str) -> Result<Arc<SessionHandle>, AdmissionError> {
        let mut sessions = self.sessions.write();

        if sessions.contains_key(uid) {
            return Err(AdmissionError::DuplicateUid(uid.to_string()));
        }

        if sessions.len() >= self.max_clients {
            let wait_minutes = self.estimate_wait_locked(&sessions);
            metrics::counter!("livescribe_rejections_total").increment(1);
            return Err(AdmissionError::AtCapacity { wait_minutes });
        }

        let handle = Arc::new(SessionHandle::new());
        sessions.insert(
            uid.to_string(),
            Session {
                uid: uid.to_string(),
                started_at: Instant::now(),
                handle: handle.clone(),
            },
        );
        metrics::gauge!("livescribe_active_sessions").set(sessions.len() as f64);
        tracing::info!(uid, active = sessions.len(), "session admitted");

        Ok(handle)
    }

    /// Minimum remaining connection time across active sessions, in minutes
    ///
    /// 0 when no session is active, which means a slot is actually free and
    /// the caller should have tried `admit` first.
    fn estimate_wait_locked(&self, sessions: &HashMap<String, Session>) -> f64 {
        sessions
            .values()
            .map(|s| {
                let remaining =
                    self.max_connection_time.as_secs_f64() - s.started_at.elapsed().as_secs_f64();
                remaining.max(0.0) / 60.0
            })
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    /// Check whether a session has outlived its allowance
    ///
    /// Returns false for unknown uids (no timeout without a start time). On
    /// first detection the session's disconnect latch fires, exactly once.
    pub fn check_timeout(&self, uid: &str) -> bool {
        let sessions = self.sessions.read();
        let Some(session) = sessions.get(uid) else {
            return false;
        };

        if session.started_at.elapsed() >= self.max_connection_time {
            if session.handle.disconnect() {
                metrics::counter!("livescribe_timeouts_total").increment(1);
                tracing::warn!(uid, "session exceeded maximum connection time, disconnecting");
            }
            true
        } else {
            false
        }
    }

    /// Remove a session and run its cleanup contract
    ///
    /// Fires the disconnect latch, then joins the session worker for at most
    /// two seconds before declaring cleanup complete regardless.
    pub async fn release(&self, uid: &str) {
        let session = self.sessions.write().remove(uid);
        let Some(session) = session else {
            return;
        };
        metrics::gauge!("livescribe_active_sessions").set(self.count() as f64);

        session.handle.disconnect();
        if let Some(worker) = session.handle.take_worker() {
            let abort = worker.abort_handle();
            if tokio::time::timeout(CLEANUP_WAIT, worker).await.is_err() {
                tracing::warn!(uid, "session worker did not stop in time, aborting");
                abort.abort();
            }
        }
        tracing::info!(uid, "session released");
    }

    /// Number of active sessions
    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn capacity(&self) -> usize {
        self.max_clients
    }

    /// Diagnostics snapshot for every active session
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        self.sessions
            .read()
            .values()
            .map(|s| SessionSnapshot {
                uid: s.uid.clone(),
                elapsed_seconds: s.started_at.elapsed().as_secs_f64(),
                pipeline: s.handle.stats(),
            })
            .collect()
    }
}

/// Per-session diagnostics entry
#[derive(Debug, serde::Serialize)]
pub struct SessionSnapshot {
    pub uid: String,
    pub elapsed_seconds: f64,
    pub pipeline: Option<PipelineStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_until_capacity() {
        let manager = SessionManager::new(2);
        manager.admit("a").unwrap();
        manager.admit("b").unwrap();

        match manager.admit("c") {
            Err(AdmissionError::AtCapacity { wait_minutes }) => {
                assert!(wait_minutes > 0.0);
            }
            other => panic!("expected capacity rejection, got {:?}", other.is_ok()),
        }
        assert_eq!(manager.count(), 2);
    }

    #[test]
    fn test_duplicate_uid_rejected() {
        let manager = SessionManager::new(4);
        manager.admit("a").unwrap();
        assert!(matches!(
            manager.admit("a"),
            Err(AdmissionError::DuplicateUid(_))
        ));
    }

    #[test]
    fn test_unknown_uid_never_times_out() {
        let manager = SessionManager::with_config(1, Duration::from_millis(1));
        assert!(!manager.check_timeout("ghost"));
    }

    #[test]
    fn test_timeout_fires_after_allowance() {
        let manager = SessionManager::with_config(1, Duration::from_millis(30));
        let handle = manager.admit("a").unwrap();

        assert!(!manager.check_timeout("a"));
        std::thread::sleep(Duration::from_millis(50));
        assert!(manager.check_timeout("a"));
        assert!(handle.is_disconnected());
    }

    #[test]
    fn test_disconnect_latch_fires_once() {
        let manager = SessionManager::new(1);
        let handle = manager.admit("a").unwrap();

        assert!(handle.disconnect());
        assert!(!handle.disconnect());
        assert!(handle.is_disconnected());
    }

    #[tokio::test]
    async fn test_release_removes_session() {
        let manager = SessionManager::new(1);
        manager.admit("a").unwrap();
        assert_eq!(manager.count(), 1);

        manager.release("a").await;
        assert_eq!(manager.count(), 0);

        // Releasing twice is harmless.
        manager.release("a").await;
    }

    #[tokio::test]
    async fn test_release_joins_worker_within_bound() {
        let manager = SessionManager::new(1);
        let handle = manager.admit("a").unwrap();

        let mut rx = handle.subscribe();
        handle.set_worker(tokio::spawn(async move {
            // Worker exits when the latch fires.
            let _ = rx.changed().await;
        }));

        let started = Instant::now();
        manager.release("a").await;
        assert!(started.elapsed() < CLEANUP_WAIT);
    }
}
