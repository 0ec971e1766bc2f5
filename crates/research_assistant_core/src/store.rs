//! crates/research_assistant_core/src/store.rs
//!
//! The single authoritative session collection.
//!
//! Every mutation is a transactional read-modify-write of the whole collection
//! performed under one lock, and the resulting snapshot is published to
//! subscribers before the lock is released, so observers see updates in the
//! order they were applied.

use tokio::sync::{watch, Mutex};

use crate::domain::Session;

pub struct SessionStore {
    sessions: Mutex<Vec<Session>>,
    changes: watch::Sender<Vec<Session>>,
}

impl SessionStore {
    pub fn new(sessions: Vec<Session>) -> Self {
        let (changes, _) = watch::channel(sessions.clone());
        Self {
            sessions: Mutex::new(sessions),
            changes,
        }
    }

    /// A copy of the current collection.
    pub async fn snapshot(&self) -> Vec<Session> {
        self.sessions.lock().await.clone()
    }

    /// Receives a fresh snapshot after every published change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Session>> {
        self.changes.subscribe()
    }

    /// Applies `f` atomically and always publishes the result.
    pub async fn update<R>(&self, f: impl FnOnce(&mut Vec<Session>) -> R) -> R {
        let mut sessions = self.sessions.lock().await;
        let result = f(&mut sessions);
        self.changes.send_replace(sessions.clone());
        result
    }

    /// Applies `f` atomically and publishes only when it reports a change.
    pub async fn try_update(&self, f: impl FnOnce(&mut Vec<Session>) -> bool) -> bool {
        let mut sessions = self.sessions.lock().await;
        let changed = f(&mut sessions);
        if changed {
            self.changes.send_replace(sessions.clone());
        }
        changed
    }
}
