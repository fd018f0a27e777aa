//! In-memory sessions.
//!
//! A session owns its history behind an async mutex, so turns within a
//! session run one at a time while independent sessions run concurrently.
//! Nothing outlives the process.

use careerchat_core::message::{ConversationTurn, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct Session {
    pub id: SessionId,
    /// Held for the whole of a turn
    pub history: Mutex<Vec<ConversationTurn>>,
    /// Cancelled when the session ends
    pub cancel: CancellationToken,
    last_active: std::sync::Mutex<Instant>,
}

impl Session {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            history: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
            last_active: std::sync::Mutex::new(Instant::now()),
        }
    }

    pub fn touch(&self) {
        if let Ok(mut last) = self.last_active.lock() {
            *last = Instant::now();
        }
    }

    pub fn last_active(&self) -> Instant {
        self.last_active.lock().map(|t| *t).unwrap_or_else(|_| Instant::now())
    }

    /// No turn is in flight.
    fn is_idle(&self) -> bool {
        self.history.try_lock().is_ok()
    }
}

/// Live sessions, capped at `max_sessions`.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Fetch a session, creating it if needed.
    ///
    /// At capacity the least-recently-used idle session is evicted. If every
    /// session has a turn in flight the store grows past the cap rather than
    /// cancel one.
    pub async fn get_or_create(&self, id: &SessionId) -> Arc<Session> {
        if let Some(session) = self.sessions.read().await.get(&id.0) {
            session.touch();
            return session.clone();
        }

        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(&id.0) {
            session.touch();
            return session.clone();
        }

        if sessions.len() >= self.max_sessions {
            let victim = sessions
                .values()
                .filter(|s| s.is_idle())
                .min_by_key(|s| s.last_active())
                .map(|s| s.id.0.clone());
            if let Some(victim) = victim
                && let Some(evicted) = sessions.remove(&victim)
            {
                evicted.cancel.cancel();
                debug!(session_id = %victim, "Evicted idle session");
            }
        }

        let session = Arc::new(Session::new(id.clone()));
        sessions.insert(id.0.clone(), session.clone());
        debug!(session_id = %id, live = sessions.len(), "Session created");
        session
    }

    /// End a session: cancel any in-flight turn and forget the history.
    /// Returns whether the session existed.
    pub async fn end(&self, id: &SessionId) -> bool {
        match self.sessions.write().await.remove(&id.0) {
            Some(session) => {
                session.cancel.cancel();
                debug!(session_id = %id, "Session ended");
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_id_returns_same_session() {
        let store = SessionStore::new(10);
        let id = SessionId::from("a");
        let first = store.get_or_create(&id).await;
        first.history.lock().await.push(ConversationTurn::user("hi"));

        let again = store.get_or_create(&id).await;
        assert_eq!(again.history.lock().await.len(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn end_cancels_and_removes() {
        let store = SessionStore::new(10);
        let id = SessionId::from("a");
        let session = store.get_or_create(&id).await;

        assert!(store.end(&id).await);
        assert!(session.cancel.is_cancelled());
        assert!(store.is_empty().await);
        assert!(!store.end(&id).await);
    }

    #[tokio::test]
    async fn evicts_least_recently_used_idle_session() {
        let store = SessionStore::new(2);
        let a = store.get_or_create(&SessionId::from("a")).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.get_or_create(&SessionId::from("b")).await;
        store.get_or_create(&SessionId::from("c")).await;

        assert_eq!(store.len().await, 2);
        assert!(a.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn busy_sessions_are_not_evicted() {
        let store = SessionStore::new(1);
        let a = store.get_or_create(&SessionId::from("a")).await;
        let _turn = a.history.lock().await;

        store.get_or_create(&SessionId::from("b")).await;
        assert_eq!(store.len().await, 2);
        assert!(!a.cancel.is_cancelled());
    }
}
