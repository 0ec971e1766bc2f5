pub mod answer_task;
pub mod persistence_task;
pub mod protocol;
pub mod rest;
pub mod simulation_task;
pub mod state;
pub mod ws_handler;

// Re-export the handlers the binary mounts on the router.
pub use rest::{
    attachment_content_handler, create_session_handler, delete_attachment_handler,
    delete_session_handler, feedback_handler, list_attachments_handler, list_sessions_handler,
    upload_attachment_handler,
};
pub use ws_handler::ws_handler;
