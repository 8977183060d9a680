use flashzap_core::ReviewQueue;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;
use uuid::Uuid;

pub type SessionId = Uuid;
pub type SharedQueue = Arc<AsyncMutex<ReviewQueue>>;

struct Entry {
    queue: SharedQueue,
    last_seen: Instant,
}

/// Live review queues for HTTP clients, keyed by an opaque token.
///
/// Sessions idle for longer than the TTL are swept on every access.
pub struct SessionRegistry {
    ttl: Duration,
    sessions: Mutex<HashMap<SessionId, Entry>>,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, queue: ReviewQueue) -> (SessionId, SharedQueue) {
        self.insert_at(queue, Instant::now())
    }

    pub fn get(&self, id: SessionId) -> Option<SharedQueue> {
        self.get_at(id, Instant::now())
    }

    pub fn remove(&self, id: SessionId) -> bool {
        self.sessions.lock().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    fn insert_at(&self, queue: ReviewQueue, now: Instant) -> (SessionId, SharedQueue) {
        let id = Uuid::new_v4();
        let queue = Arc::new(AsyncMutex::new(queue));
        let mut m = self.sessions.lock();
        self.sweep(&mut m, now);
        m.insert(
            id,
            Entry {
                queue: queue.clone(),
                last_seen: now,
            },
        );
        (id, queue)
    }

    fn get_at(&self, id: SessionId, now: Instant) -> Option<SharedQueue> {
        let mut m = self.sessions.lock();
        self.sweep(&mut m, now);
        let entry = m.get_mut(&id)?;
        entry.last_seen = now;
        Some(entry.queue.clone())
    }

    fn sweep(&self, m: &mut HashMap<SessionId, Entry>, now: Instant) {
        let before = m.len();
        m.retain(|_, e| now.saturating_duration_since(e.last_seen) <= self.ttl);
        let evicted = before - m.len();
        if evicted > 0 {
            debug!(evicted, "expired review sessions evicted");
        }
    }
}
