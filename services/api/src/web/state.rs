//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the process-wide generation gate.

use crate::config::Config;
use research_assistant_core::attachment::StagingArea;
use research_assistant_core::ports::AnswerService;
use research_assistant_core::store::SessionStore;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<SessionStore>,
    pub answer_adapter: Arc<dyn AnswerService>,
    pub generation: Arc<GenerationGate>,
    /// Images staged for the next question.
    pub staging: Arc<Mutex<StagingArea>>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<SessionStore>,
        answer_adapter: Arc<dyn AnswerService>,
    ) -> Self {
        Self {
            config,
            store,
            answer_adapter,
            generation: Arc::new(GenerationGate::default()),
            staging: Arc::new(Mutex::new(StagingArea::default())),
        }
    }
}

//=========================================================================================
// GenerationGate (The "generating" Flag)
//=========================================================================================

/// Allows one request in flight at a time and holds its cancellation token.
#[derive(Default)]
pub struct GenerationGate {
    current: StdMutex<Option<CancellationToken>>,
}

impl GenerationGate {
    fn slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claims the gate for a new request, or returns `None` while one is running.
    pub fn try_begin(self: &Arc<Self>) -> Option<GenerationGuard> {
        let mut slot = self.slot();
        if slot.is_some() {
            return None;
        }
        let token = CancellationToken::new();
        *slot = Some(token.clone());
        Some(GenerationGuard {
            gate: Arc::clone(self),
            token,
        })
    }

    pub fn is_generating(&self) -> bool {
        self.slot().is_some()
    }

    /// Raises the cancellation signal of the outstanding request, if any.
    pub fn stop(&self) -> bool {
        match self.slot().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Proof of holding the gate. Dropping it clears the "generating" flag and
/// releases the cancellation handle, exactly once, on every exit path.
pub struct GenerationGuard {
    gate: Arc<GenerationGate>,
    token: CancellationToken,
}

impl GenerationGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.gate.slot().take();
    }
}
