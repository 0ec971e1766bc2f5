//! crates/research_assistant_core/src/simulator.rs
//!
//! The thinking simulator: a cursor over a [`Script`] that, one tick at a time,
//! appends log lines to the active step of a placeholder message and opens the
//! next phase when the current one runs dry.
//!
//! The simulator never holds a reference to a message. Every tick re-resolves
//! the target session by id from the collection it is handed, so deletions or
//! replacements between ticks simply turn the tick into a no-op.

use tracing::debug;
use uuid::Uuid;

use crate::domain::{find_session_mut, Session, Step, StepStatus};
use crate::script::Script;

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The next log line was appended to the active step.
    Logged,
    /// The active step was completed and the next phase's step opened.
    Advanced,
    /// The script has nothing left to emit.
    Exhausted,
    /// The session or its in-progress placeholder is gone.
    TargetMissing,
}

impl TickOutcome {
    pub fn mutated(self) -> bool {
        matches!(self, TickOutcome::Logged | TickOutcome::Advanced)
    }
}

#[derive(Debug, Clone)]
pub struct ThinkingSimulator {
    session_id: Uuid,
    script: Script,
    phase_index: usize,
    log_index: usize,
}

impl ThinkingSimulator {
    pub fn new(session_id: Uuid, script: Script) -> Self {
        Self {
            session_id,
            script,
            phase_index: 0,
            log_index: 0,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn phase_index(&self) -> usize {
        self.phase_index
    }

    /// Advances the timeline of the target session's trailing placeholder by one tick.
    /// Cursors only move when the collection is actually mutated.
    pub fn tick(&mut self, sessions: &mut [Session]) -> TickOutcome {
        let Some(session) = find_session_mut(sessions, self.session_id) else {
            return TickOutcome::TargetMissing;
        };
        let Some(message) = session.last_message_mut() else {
            return TickOutcome::TargetMissing;
        };
        if !message.is_in_progress() {
            return TickOutcome::TargetMissing;
        }
        let Some(thinking) = message.thinking.as_mut() else {
            return TickOutcome::TargetMissing;
        };
        let Some(phase) = self.script.phase(self.phase_index) else {
            return TickOutcome::Exhausted;
        };

        if let Some(line) = phase.logs.get(self.log_index) {
            let Some(active) = thinking.active_step_mut() else {
                return TickOutcome::TargetMissing;
            };
            active.logs.push(line.clone());
            self.log_index += 1;
            return TickOutcome::Logged;
        }

        let next_index = self.phase_index + 1;
        let Some(next_phase) = self.script.phase(next_index) else {
            return TickOutcome::Exhausted;
        };
        let Some(active) = thinking.active_step_mut() else {
            return TickOutcome::TargetMissing;
        };
        active.status = StepStatus::Completed;
        thinking
            .steps
            .push(Step::active(format!("step-{next_index}"), next_phase.text.clone()));
        self.phase_index = next_index;
        self.log_index = 0;
        debug!("Session {} advanced to phase {}.", self.session_id, next_index);
        TickOutcome::Advanced
    }
}
