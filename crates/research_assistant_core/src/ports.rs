//! crates/research_assistant_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the concrete AI provider and storage backend.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{Attachment, FocusMode, HistoryTurn, ModelId, Session, Source};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The request was abandoned because its cancellation token fired.
    /// Never reported to the user as an error.
    #[error("The operation was cancelled")]
    Cancelled,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// AI Answer Port
//=========================================================================================

/// Everything the provider needs to answer one query.
#[derive(Debug, Clone)]
pub struct AnswerRequest {
    pub query: String,
    pub attachments: Vec<Attachment>,
    pub focus_mode: FocusMode,
    pub pro_mode: bool,
    pub model: ModelId,
    /// Prior finalized turns, oldest first. Excludes the query itself.
    pub history: Vec<HistoryTurn>,
}

/// The provider's single final answer. An empty source list is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Source>,
}

#[async_trait]
pub trait AnswerService: Send + Sync {
    /// Produces one grounded answer. Implementations should return
    /// `PortError::Cancelled` once `cancel` fires.
    async fn answer(&self, request: AnswerRequest, cancel: CancellationToken)
        -> PortResult<Answer>;
}

//=========================================================================================
// Persistence Port
//=========================================================================================

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Loads the whole session collection, in order.
    async fn load(&self) -> PortResult<Vec<Session>>;

    /// Replaces the stored collection with `sessions`.
    async fn save(&self, sessions: &[Session]) -> PortResult<()>;
}
