//! crates/research_assistant_core/src/exchange.rs
//!
//! The data-state transitions of one question/answer exchange: opening it
//! (user message plus placeholder) and resolving it as answered, stopped or
//! failed. Each function works on the collection it is handed and re-resolves
//! the session and placeholder by id, so a vanished target is a no-op.

use std::time::Duration;

use tracing::warn;
use uuid::Uuid;

use crate::domain::{
    find_session_mut, Attachment, HistoryTurn, Message, Session, Step, StepStatus,
};
use crate::ports::Answer;

/// Text of the terminal step appended to a completed timeline.
pub const COMPLETE_STEP_TEXT: &str = "Complete";
pub const COMPLETE_STEP_ID: &str = "done";
pub const STOPPED_NOTICE: &str = "Generation stopped.";
pub const FAILURE_NOTICE: &str = "I encountered an error while processing. Please try again.";

/// Identity of an opened exchange, plus the history captured when it opened.
#[derive(Debug, Clone)]
pub struct OpenedExchange {
    pub session_id: Uuid,
    pub placeholder_id: Uuid,
    pub history: Vec<HistoryTurn>,
}

/// Reuses the active session (or creates one titled after the query), then
/// appends the user message and an in-progress placeholder seeded with `first_phase`.
pub fn open_exchange(
    sessions: &mut Vec<Session>,
    active_session: Option<Uuid>,
    query: &str,
    attachments: Vec<Attachment>,
    first_phase: &str,
    pro_mode: bool,
) -> OpenedExchange {
    let index = match active_session.and_then(|id| sessions.iter().position(|s| s.id == id)) {
        Some(index) => index,
        None => {
            sessions.push(Session::opened_by(query));
            sessions.len() - 1
        }
    };
    let session = &mut sessions[index];
    session.retitle_if_empty(query);

    let history = session.history();
    let placeholder = Message::placeholder(first_phase, pro_mode);
    let placeholder_id = placeholder.id;
    session.messages.push(Message::user(query, attachments));
    session.messages.push(placeholder);

    OpenedExchange {
        session_id: session.id,
        placeholder_id,
        history,
    }
}

/// Completes the simulator's steps without discarding any of their logs, and
/// closes the timeline with a "Complete" step unless it already ends in one.
pub fn complete_steps(mut steps: Vec<Step>, latency: Duration) -> Vec<Step> {
    for step in &mut steps {
        step.status = StepStatus::Completed;
    }
    let ends_complete = steps.last().map(|s| s.text == COMPLETE_STEP_TEXT);
    if ends_complete == Some(false) {
        steps.push(Step {
            id: COMPLETE_STEP_ID.to_string(),
            text: COMPLETE_STEP_TEXT.to_string(),
            status: StepStatus::Completed,
            logs: vec![
                "[SYS] Output generated successfully".to_string(),
                format!("[SYS] Latency: {:.1}s", latency.as_secs_f64()),
            ],
        });
    }
    steps
}

/// Replaces the placeholder with the finalized answer. Returns false when the
/// session no longer exists.
pub fn resolve_answered(
    sessions: &mut [Session],
    exchange: &OpenedExchange,
    answer: Answer,
    pro_mode: bool,
    latency: Duration,
) -> bool {
    let Some(session) = find_session_mut(sessions, exchange.session_id) else {
        return false;
    };
    let steps = session
        .take_message(exchange.placeholder_id)
        .and_then(|placeholder| placeholder.thinking)
        .map(|thinking| thinking.steps)
        .unwrap_or_default();
    session.messages.push(Message::answer(
        answer.text,
        answer.sources,
        complete_steps(steps, latency),
        pro_mode,
    ));
    true
}

/// Drops the placeholder and its timeline, leaving a short stop notice.
pub fn resolve_stopped(sessions: &mut [Session], exchange: &OpenedExchange) -> bool {
    replace_with_notice(sessions, exchange, STOPPED_NOTICE)
}

/// Drops the placeholder, leaving the generic failure notice.
pub fn resolve_failed(sessions: &mut [Session], exchange: &OpenedExchange) -> bool {
    replace_with_notice(sessions, exchange, FAILURE_NOTICE)
}

fn replace_with_notice(sessions: &mut [Session], exchange: &OpenedExchange, notice: &str) -> bool {
    let Some(session) = find_session_mut(sessions, exchange.session_id) else {
        return false;
    };
    session.take_message(exchange.placeholder_id);
    session.messages.push(Message::notice(notice));
    true
}

/// Replaces placeholders a previous run left in progress with the failure
/// notice, in place. Returns how many were replaced.
pub fn finalize_interrupted(sessions: &mut [Session]) -> usize {
    let mut finalized = 0;
    for session in sessions.iter_mut() {
        let mut interrupted = 0;
        for message in session.messages.iter_mut().filter(|m| m.is_in_progress()) {
            *message = Message::notice(FAILURE_NOTICE);
            interrupted += 1;
        }
        if interrupted > 0 {
            warn!("Session {} held an interrupted answer.", session.id);
        }
        finalized += interrupted;
    }
    finalized
}
