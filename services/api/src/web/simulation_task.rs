//! services/api/src/web/simulation_task.rs
//!
//! This module contains the background "worker" that animates the thinking
//! timeline of a pending answer while the provider call is outstanding.

use research_assistant_core::{
    simulator::{ThinkingSimulator, TickOutcome},
    store::SessionStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Ticks `simulator` against the store every `period` until cancelled.
///
/// The first tick fires one full period after start. Cancellation is checked
/// again inside the store transaction, so once `cancel` fires no further
/// mutation is applied.
///
/// The loop also ends early once the session or its placeholder is gone:
/// targets are resolved by id and never come back, so later ticks could only
/// be no-ops.
pub async fn simulation_process(
    store: Arc<SessionStore>,
    mut simulator: ThinkingSimulator,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let mut outcome = TickOutcome::Exhausted;
        store
            .try_update(|sessions| {
                if cancel.is_cancelled() {
                    return false;
                }
                outcome = simulator.tick(sessions);
                outcome.mutated()
            })
            .await;

        if outcome == TickOutcome::TargetMissing {
            debug!(
                "Thinking target in session {} is gone. Stopping simulation.",
                simulator.session_id()
            );
            break;
        }
    }
    debug!(
        "Simulation for session {} ended at phase {}.",
        simulator.session_id(),
        simulator.phase_index()
    );
}

/// Owns a running simulation. Dropping the handle aborts the task.
pub struct SimulationHandle {
    stop: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SimulationHandle {
    /// Starts ticking. The simulation also halts as soon as `request` is cancelled.
    pub fn spawn(
        store: Arc<SessionStore>,
        simulator: ThinkingSimulator,
        period: Duration,
        request: &CancellationToken,
    ) -> Self {
        let stop = request.child_token();
        let task = tokio::spawn(simulation_process(store, simulator, period, stop.clone()));
        Self {
            stop,
            task: Some(task),
        }
    }

    /// Stops the simulation and waits until it can no longer touch the store.
    pub async fn stop(mut self) {
        self.stop.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_assistant_core::{
        domain::{Message, Session},
        script::{Script, FAST_TICK},
    };

    fn store_with_placeholder(query: &str) -> (Arc<SessionStore>, uuid::Uuid) {
        let mut session = Session::opened_by(query);
        let script = Script::fast(query);
        session.messages.push(Message::user(query, Vec::new()));
        session
            .messages
            .push(Message::placeholder(script.first_phase_text(), false));
        let id = session.id;
        (Arc::new(SessionStore::new(vec![session])), id)
    }

    fn steps_of(sessions: &[Session]) -> Vec<(String, usize)> {
        sessions[0]
            .last_message()
            .and_then(|m| m.thinking.as_ref())
            .map(|t| t.steps.iter().map(|s| (s.text.clone(), s.logs.len())).collect())
            .unwrap_or_default()
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let query = "What is the capital of France?";
        let (store, id) = store_with_placeholder(query);
        let handle = SimulationHandle::spawn(
            store.clone(),
            ThinkingSimulator::new(id, Script::fast(query)),
            FAST_TICK,
            &CancellationToken::new(),
        );

        tokio::time::sleep(FAST_TICK * 3 + Duration::from_millis(50)).await;
        handle.stop().await;

        assert_eq!(
            steps_of(&store.snapshot().await),
            vec![
                ("Searching the web...".to_string(), 2),
                ("Reading sources...".to_string(), 0),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn no_mutation_after_stop() {
        let query = "quantum computing";
        let (store, id) = store_with_placeholder(query);
        let handle = SimulationHandle::spawn(
            store.clone(),
            ThinkingSimulator::new(id, Script::fast(query)),
            FAST_TICK,
            &CancellationToken::new(),
        );

        tokio::time::sleep(FAST_TICK + Duration::from_millis(50)).await;
        handle.stop().await;
        let stopped_at = store.snapshot().await;

        tokio::time::sleep(FAST_TICK * 10).await;
        assert_eq!(store.snapshot().await, stopped_at);
        assert_eq!(steps_of(&stopped_at), vec![("Searching the web...".to_string(), 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn request_cancellation_freezes_the_timeline() {
        let query = "quantum computing";
        let (store, id) = store_with_placeholder(query);
        let request = CancellationToken::new();
        let handle = SimulationHandle::spawn(
            store.clone(),
            ThinkingSimulator::new(id, Script::fast(query)),
            FAST_TICK,
            &request,
        );

        tokio::time::sleep(FAST_TICK + Duration::from_millis(50)).await;
        request.cancel();
        tokio::time::sleep(FAST_TICK * 5).await;

        assert_eq!(
            steps_of(&store.snapshot().await),
            vec![("Searching the web...".to_string(), 1)]
        );
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn ends_on_its_own_when_the_session_is_deleted() {
        let query = "rust";
        let (store, id) = store_with_placeholder(query);
        let task = tokio::spawn(simulation_process(
            store.clone(),
            ThinkingSimulator::new(id, Script::fast(query)),
            FAST_TICK,
            CancellationToken::new(),
        ));

        store.update(|sessions| sessions.clear()).await;

        assert!(tokio::time::timeout(FAST_TICK * 2, task).await.is_ok());
        assert!(store.snapshot().await.is_empty());
    }
}
