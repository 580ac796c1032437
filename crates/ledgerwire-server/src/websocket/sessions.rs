//! Live session tracking.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ledgerwire_core::ids::SessionId;
use metrics::gauge;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::metrics::SESSIONS_ACTIVE;
use crate::websocket::session::Session;

/// Tracks every open session so shutdown can close them.
pub struct SessionManager {
    /// Open sessions indexed by ID.
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    /// Atomic counter tracking open sessions (avoids read-locking for count queries).
    active_count: AtomicUsize,
}

impl SessionManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Track a session.
    pub async fn add(&self, session: Arc<Session>) {
        let mut sessions = self.sessions.write().await;
        if sessions.insert(session.id().clone(), session).is_none() {
            let n = self.active_count.fetch_add(1, Ordering::Relaxed) + 1;
            gauge!(SESSIONS_ACTIVE).set(n as f64);
        }
    }

    /// Stop tracking a session. Does not close it.
    pub async fn remove(&self, id: &SessionId) -> Option<Arc<Session>> {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            let n = self.active_count.fetch_sub(1, Ordering::Relaxed) - 1;
            gauge!(SESSIONS_ACTIVE).set(n as f64);
        }
        removed
    }

    /// Look up a session.
    pub async fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Number of tracked sessions.
    pub fn session_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Close and forget every session.
    pub async fn close_all(&self) {
        let drained: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().map(|(_, s)| s).collect()
        };
        self.active_count.store(0, Ordering::Relaxed);
        gauge!(SESSIONS_ACTIVE).set(0.0);
        if drained.is_empty() {
            debug!("no sessions to close");
            return;
        }
        info!(count = drained.len(), "closing sessions");
        for session in drained {
            session.close().await;
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
