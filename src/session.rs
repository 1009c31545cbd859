//! Per-admin conversation sessions.
//!
//! One entry per user id, alive for the duration of one flow. Handlers for
//! different users never contend for anything beyond the map lock itself;
//! for the *same* user, every check-then-act runs as a single critical
//! section so two rapid inputs cannot observe a half-updated session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::types::ConversationState;

struct Entry {
    state: ConversationState,
    created_at: Instant,
}

/// Shared map of live conversation states with lazy TTL eviction.
///
/// Abandoned flows would otherwise linger forever and swallow the user's
/// next unrelated message; entries older than `ttl` are treated as absent.
#[derive(Clone)]
pub struct SessionStore {
    entries: Arc<Mutex<HashMap<u64, Entry>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    pub async fn get(&self, user_id: u64) -> Option<ConversationState> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get(&user_id)?;
        if entry.created_at.elapsed() < self.ttl {
            return Some(entry.state);
        }
        entries.remove(&user_id);
        None
    }

    /// Start (or restart) a flow. Overwrites unconditionally: starting a new
    /// flow silently abandons any unfinished one.
    pub async fn set(&self, user_id: u64, state: ConversationState) {
        self.entries.lock().await.insert(
            user_id,
            Entry {
                state,
                created_at: Instant::now(),
            },
        );
    }

    pub async fn delete(&self, user_id: u64) {
        self.entries.lock().await.remove(&user_id);
    }

    /// Patch a live session in place (page advancement). The entry keeps its
    /// original creation time, so pagination does not extend the TTL.
    pub async fn update(&self, user_id: u64, patch: impl FnOnce(&mut ConversationState)) {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(&user_id) else {
            return;
        };
        if entry.created_at.elapsed() >= self.ttl {
            entries.remove(&user_id);
            return;
        }
        patch(&mut entry.state);
    }

    /// Atomically consume the session if `pred` accepts it.
    ///
    /// This is how a flow's terminal input is claimed: the entry is gone
    /// before any handling happens, so cleanup cannot be skipped by an error
    /// path, and a concurrent second input for the same user finds no
    /// session instead of re-running the flow.
    pub async fn take_if(
        &self,
        user_id: u64,
        pred: impl FnOnce(&ConversationState) -> bool,
    ) -> Option<ConversationState> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get(&user_id)?;
        if entry.created_at.elapsed() >= self.ttl {
            entries.remove(&user_id);
            return None;
        }
        if !pred(&entry.state) {
            return None;
        }
        entries.remove(&user_id).map(|e| e.state)
    }
}
