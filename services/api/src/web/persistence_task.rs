//! services/api/src/web/persistence_task.rs
//!
//! Loads the session collection at startup and mirrors it into the configured
//! `SessionRepository` after every change.

use research_assistant_core::{
    domain::Session, exchange::finalize_interrupted, ports::SessionRepository,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Reads the persisted sessions to seed the store.
///
/// A failed load starts the service with an empty collection. Answers that were
/// still generating when the previous process stopped are finalized as failures.
pub async fn restore(repository: &dyn SessionRepository) -> Vec<Session> {
    let mut sessions = match repository.load().await {
        Ok(sessions) => sessions,
        Err(e) => {
            error!("Failed to load sessions, starting empty: {:?}", e);
            return Vec::new();
        }
    };
    let interrupted = finalize_interrupted(&mut sessions);
    info!(
        "Restored {} session(s), {} interrupted answer(s) finalized.",
        sessions.len(),
        interrupted
    );
    sessions
}

/// Saves the latest snapshot each time the store publishes one.
///
/// Bursts of changes collapse into a single write of the newest collection.
/// Failures are logged and the task keeps running. Ends when the store is dropped.
pub async fn persistence_process(
    repository: Arc<dyn SessionRepository>,
    mut changes: watch::Receiver<Vec<Session>>,
) {
    info!("Persistence task started.");
    while changes.changed().await.is_ok() {
        let snapshot = changes.borrow_and_update().clone();
        match repository.save(&snapshot).await {
            Ok(()) => debug!("Persisted {} session(s).", snapshot.len()),
            Err(e) => error!("Failed to persist sessions: {:?}", e),
        }
    }
    info!("Session store closed. Persistence task exiting.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use research_assistant_core::{
        domain::Message,
        exchange::FAILURE_NOTICE,
        ports::{PortError, PortResult},
        store::SessionStore,
    };
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingRepository {
        stored: Option<Vec<Session>>,
        saved: StdMutex<Vec<Vec<Session>>>,
        fail_next: AtomicBool,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl SessionRepository for RecordingRepository {
        async fn load(&self) -> PortResult<Vec<Session>> {
            self.stored
                .clone()
                .ok_or_else(|| PortError::Unexpected("corrupt sessions file".to_string()))
        }

        async fn save(&self, sessions: &[Session]) -> PortResult<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(PortError::Unexpected("disk full".to_string()));
            }
            self.saved.lock().unwrap().push(sessions.to_vec());
            Ok(())
        }
    }

    #[tokio::test]
    async fn saves_latest_snapshot_and_survives_failures() {
        let repository = Arc::new(RecordingRepository::default());
        repository.fail_next.store(true, Ordering::SeqCst);
        let store = SessionStore::new(Vec::new());
        let task = tokio::spawn(persistence_process(repository.clone(), store.subscribe()));

        store.update(|sessions| sessions.push(Session::new("first"))).await;
        while repository.attempts.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        store.update(|sessions| sessions.push(Session::new("second"))).await;

        drop(store);
        task.await.unwrap();

        let saved = repository.saved.lock().unwrap();
        let last = saved.last().expect("at least one successful save");
        let titles: Vec<&str> = last.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn restore_starts_empty_when_load_fails() {
        let repository = RecordingRepository::default();
        assert!(restore(&repository).await.is_empty());
    }

    #[tokio::test]
    async fn restore_finalizes_answers_left_generating() {
        let mut session = Session::opened_by("left running");
        session.messages.push(Message::user("left running", Vec::new()));
        session
            .messages
            .push(Message::placeholder("Searching the web...", false));
        let repository = RecordingRepository {
            stored: Some(vec![session]),
            ..Default::default()
        };

        let sessions = restore(&repository).await;

        assert_eq!(sessions.len(), 1);
        let last = sessions[0].last_message().unwrap();
        assert!(!last.is_in_progress());
        assert!(last.thinking.is_none());
        assert_eq!(last.content, FAILURE_NOTICE);
    }
}
