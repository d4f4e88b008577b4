
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::Result;
use crate::database::sqlite::{SessionDatabase, SessionMessage};

/// Handle to one conversation's persisted dialogue history.
///
/// Concurrent turns on the same conversation serialize through the append
/// lock; the history itself is append-only.
pub struct Session {
    conversation_id: String,
    database: SessionDatabase,
    append_lock: Mutex<()>,
}

impl Session {
    #[inline]
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Ordered prior turns, oldest first
    #[inline]
    pub async fn history(&self) -> Result<Vec<SessionMessage>> {
        self.database.history(&self.conversation_id).await
    }

    /// Persist a completed turn (user input plus assistant answer)
    #[inline]
    pub async fn record_turn(&self, user_input: &str, assistant_answer: &str) -> Result<()> {
        let _guard = self.append_lock.lock().await;
        self.database
            .append_message(&self.conversation_id, "user", user_input)
            .await?;
        self.database
            .append_message(&self.conversation_id, "assistant", assistant_answer)
            .await
    }
}

/// Bounded process-local cache of session handles.
///
/// Lookup-or-insert happens under a single lock, so concurrent first use of
/// one conversation id yields the same handle. Least-recently-used entries
/// are evicted once the capacity bound is reached; eviction never touches
/// the persisted history.
pub struct SessionRegistry {
    database: SessionDatabase,
    capacity: usize,
    inner: Mutex<RegistryInner>,
}

struct RegistryInner {
    sessions: HashMap<String, Arc<Session>>,
    // Recency order, least recently used first
    order: Vec<String>,
}

impl SessionRegistry {
    #[inline]
    pub fn new(database: SessionDatabase, capacity: usize) -> Self {
        Self {
            database,
            capacity: capacity.max(1),
            inner: Mutex::new(RegistryInner {
                sessions: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    #[inline]
    pub fn database(&self) -> &SessionDatabase {
        &self.database
    }

    /// Get the session for a conversation id, creating it on first use
    #[inline]
    pub async fn get_or_create(&self, conversation_id: &str) -> Arc<Session> {
        let mut inner = self.inner.lock().await;

        if let Some(session) = inner.sessions.get(conversation_id) {
            let session = Arc::clone(session);
            touch(&mut inner.order, conversation_id);
            return session;
        }

        let session = Arc::new(Session {
            conversation_id: conversation_id.to_string(),
            database: self.database.clone(),
            append_lock: Mutex::new(()),
        });

        inner
            .sessions
            .insert(conversation_id.to_string(), Arc::clone(&session));
        inner.order.push(conversation_id.to_string());

        while inner.sessions.len() > self.capacity {
            let evicted = inner.order.remove(0);
            inner.sessions.remove(&evicted);
            debug!("Evicted cached session for conversation {}", evicted);
        }

        session
    }

    /// Drop the cached handle for a conversation; returns whether it existed
    #[inline]
    pub async fn remove(&self, conversation_id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        inner.order.retain(|id| id != conversation_id);
        inner.sessions.remove(conversation_id).is_some()
    }

    /// Conversation ids currently cached in this process
    #[inline]
    pub async fn active_ids(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        let mut ids: Vec<String> = inner.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn touch(order: &mut Vec<String>, conversation_id: &str) {
    if let Some(pos) = order.iter().position(|id| id == conversation_id) {
        let id = order.remove(pos);
        order.push(id);
    }
}
