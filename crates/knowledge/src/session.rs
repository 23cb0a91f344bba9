//! Conversation history per session.

use async_trait::async_trait;
use citewise_llm::ChatMessage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Stores the message history of each session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Full retained history, oldest first.
    async fn history(&self, session_id: &str) -> Vec<ChatMessage>;

    /// Append one question/answer exchange, keeping the last `retention`
    /// messages.
    async fn append(&self, session_id: &str, exchange: [ChatMessage; 2], retention: usize);

    async fn evict(&self, session_id: &str);
}

/// Session store held in process memory.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn append(&self, session_id: &str, exchange: [ChatMessage; 2], retention: usize) {
        let mut sessions = self.sessions.write().await;
        let history = sessions.entry(session_id.to_string()).or_default();
        history.extend(exchange);

        let excess = history.len().saturating_sub(retention);
        history.drain(..excess);
    }

    async fn evict(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }
}

/// The most recent `window` messages of a history.
pub fn history_window(history: &[ChatMessage], window: usize) -> &[ChatMessage] {
    &history[history.len().saturating_sub(window)..]
}

/// Serializes answers within one session; distinct sessions never wait on
/// each other.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `session_id`.
    ///
    /// Entries nobody holds or waits on are pruned first, so the map only
    /// tracks sessions with answers in flight.
    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(session_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Sessions currently tracked.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
