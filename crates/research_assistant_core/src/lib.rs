pub mod attachment;
pub mod domain;
pub mod exchange;
pub mod ports;
pub mod script;
pub mod simulator;
pub mod store;

pub use domain::{
    Attachment, AttachmentKind, Feedback, FocusMode, HistoryTurn, Message, ModelId, Role, Session,
    Source, Step, StepStatus, ThinkingState,
};
pub use ports::{Answer, AnswerRequest, AnswerService, PortError, PortResult, SessionRepository};
pub use script::Script;
pub use simulator::{ThinkingSimulator, TickOutcome};
pub use store::SessionStore;
