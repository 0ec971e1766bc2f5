//! services/api/src/web/answer_task.rs
//!
//! This module contains the asynchronous "worker" function responsible for
//! handling a single question-and-answer cycle, from opening the exchange to
//! resolving it as answered, stopped or failed.

use crate::web::{
    protocol::{Resolution, ServerMessage},
    simulation_task::SimulationHandle,
    state::{AppState, GenerationGuard},
};
use research_assistant_core::{
    domain::{Attachment, FocusMode, ModelId},
    exchange::{open_exchange, resolve_answered, resolve_failed, resolve_stopped},
    ports::{AnswerRequest, PortError},
    script::Script,
    simulator::ThinkingSimulator,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// A validated question, ready to be answered.
#[derive(Debug, Clone)]
pub struct AskInput {
    pub query: String,
    pub attachments: Vec<Attachment>,
    pub focus_mode: FocusMode,
    pub pro_mode: bool,
    pub model: ModelId,
    /// The session the UI is showing. Unknown ids open a new session.
    pub session_id: Option<Uuid>,
}

/// Represents the outcome of the `answer_process` task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub session_id: Uuid,
    pub resolution: Resolution,
}

/// The main asynchronous task for answering one question.
///
/// Holding `guard` is what makes the request the one in flight. It is released
/// before `GenerationFinished` goes out, whatever the outcome.
pub async fn answer_process(
    app_state: Arc<AppState>,
    input: AskInput,
    guard: GenerationGuard,
    events: UnboundedSender<ServerMessage>,
) -> AnswerOutcome {
    let start_time = Instant::now();
    let AskInput {
        query,
        attachments,
        focus_mode,
        pro_mode,
        model,
        session_id,
    } = input;
    info!(
        "Answer process started ({}, {}, pro: {}).",
        focus_mode.label(),
        model.as_str(),
        pro_mode
    );

    // --- 1. Open the exchange: user message plus in-progress placeholder ---
    let script = Script::for_mode(&query, pro_mode);
    let request_attachments = attachments.clone();
    let exchange = app_state
        .store
        .update(|sessions| {
            open_exchange(
                sessions,
                session_id,
                &query,
                attachments,
                script.first_phase_text(),
                pro_mode,
            )
        })
        .await;
    let _ = events.send(ServerMessage::GenerationStarted {
        session_id: exchange.session_id,
    });

    // --- 2. Animate the timeline while the provider works ---
    let simulation = SimulationHandle::spawn(
        app_state.store.clone(),
        ThinkingSimulator::new(exchange.session_id, script),
        app_state.config.tick_period(pro_mode),
        guard.token(),
    );

    let request = AnswerRequest {
        query,
        attachments: request_attachments,
        focus_mode,
        pro_mode,
        model,
        history: exchange.history.clone(),
    };
    let result = app_state
        .answer_adapter
        .answer(request, guard.token().clone())
        .await;

    simulation.stop().await;
    let latency = start_time.elapsed();

    // A stop that lands after the provider returned still wins.
    let result = if guard.token().is_cancelled() {
        Err(PortError::Cancelled)
    } else {
        result
    };

    // --- 3. Resolve the exchange ---
    let store = &app_state.store;
    let (resolution, applied) = match result {
        Ok(answer) => {
            info!(
                "Answer received in {:.1}s with {} source(s).",
                latency.as_secs_f64(),
                answer.sources.len()
            );
            let applied = store
                .try_update(|sessions| {
                    resolve_answered(sessions, &exchange, answer, pro_mode, latency)
                })
                .await;
            (Resolution::Answered, applied)
        }
        Err(PortError::Cancelled) => {
            info!("Answer process stopped by the user.");
            let applied = store
                .try_update(|sessions| resolve_stopped(sessions, &exchange))
                .await;
            (Resolution::Stopped, applied)
        }
        Err(e) => {
            error!("Answer provider failed: {:?}", e);
            let applied = store
                .try_update(|sessions| resolve_failed(sessions, &exchange))
                .await;
            (Resolution::Failed, applied)
        }
    };
    if !applied {
        warn!(
            "Session {} was deleted before its answer could be recorded.",
            exchange.session_id
        );
    }

    // --- 4. Release the gate, then tell the client ---
    drop(guard);
    let _ = events.send(ServerMessage::GenerationFinished {
        session_id: exchange.session_id,
        outcome: resolution,
    });

    AnswerOutcome {
        session_id: exchange.session_id,
        resolution,
    }
}
