use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::models::conversation::Conversation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(SessionId)
    }
}

/// One client's conversation. The mutex is held for the whole of a turn, so
/// turns on the same session are serialized.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    conversation: Mutex<Conversation>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            conversation: Mutex::new(Conversation::new()),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn conversation(&self) -> &Mutex<Conversation> {
        &self.conversation
    }

    /// Copy of the turns recorded so far.
    pub async fn snapshot(&self) -> Conversation {
        self.conversation.lock().await.clone()
    }

    fn is_busy(&self) -> bool {
        self.conversation.try_lock().is_err()
    }
}

pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
struct Entry {
    session: Arc<Session>,
    last_active: Instant,
}

/// Sessions issued by this process. Ids are only ever minted here; entries
/// idle for longer than the ttl are dropped on the next sweep.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, Entry>>,
    idle_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_ttl(DEFAULT_IDLE_TTL)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_ttl,
        }
    }

    pub async fn create(&self) -> Arc<Session> {
        let session = Arc::new(Session::new(SessionId::new()));
        let mut sessions = self.sessions.lock().await;
        self.sweep(&mut sessions);
        sessions.insert(
            session.id(),
            Entry {
                session: session.clone(),
                last_active: Instant::now(),
            },
        );
        session
    }

    /// Looks up a session and marks it active.
    pub async fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.get_mut(&id)?;
        entry.last_active = Instant::now();
        Some(entry.session.clone())
    }

    /// Drops idle sessions and returns how many were removed.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        self.sweep(&mut sessions)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    // A session in the middle of a turn is never dropped.
    fn sweep(&self, sessions: &mut HashMap<SessionId, Entry>) -> usize {
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, entry| {
            now.duration_since(entry.last_active) < self.idle_ttl || entry.session.is_busy()
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = sessions.len(), "evicted idle sessions");
        }
        evicted
    }
}
