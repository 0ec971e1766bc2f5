//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for the research chat.

use research_assistant_core::domain::{FocusMode, ModelId, Session};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================
// NOTE: Images are staged beforehand through the REST attachment endpoints.
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Submits a question, together with whatever images are currently staged.
    Ask {
        query: String,
        #[serde(default)]
        focus_mode: FocusMode,
        #[serde(default)]
        pro_mode: bool,
        #[serde(default)]
        model: ModelId,
        /// The session shown in the UI, if any.
        #[serde(default)]
        session_id: Option<Uuid>,
    },

    /// Stops the request that is currently being generated.
    Stop,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// How a request ended.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Answered,
    Stopped,
    Failed,
}

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The full session collection. Sent on connect and after every change.
    Sessions { sessions: Vec<Session> },

    /// The question was accepted. The client clears its input and shows `session_id`.
    GenerationStarted { session_id: Uuid },

    /// The request is over and a new one may be submitted.
    GenerationFinished {
        session_id: Uuid,
        outcome: Resolution,
    },

    /// Reports a rejected client message, which the UI should display.
    Error { message: String },
}

impl ServerMessage {
    /// A session snapshot for the wire. Image payloads are left out; clients
    /// fetch them once from the attachment content endpoint.
    pub fn sessions(snapshot: &[Session]) -> Self {
        let mut sessions = snapshot.to_vec();
        for attachment in sessions
            .iter_mut()
            .flat_map(|s| s.messages.iter_mut())
            .flat_map(|m| m.attachments.iter_mut())
        {
            attachment.data.clear();
        }
        ServerMessage::Sessions { sessions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_assistant_core::{attachment::image_attachment, domain::Message};

    #[test]
    fn ask_defaults_to_fast_web_search() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"ask","query":"What is the capital of France?"}"#)
                .unwrap();
        match msg {
            ClientMessage::Ask {
                query,
                focus_mode,
                pro_mode,
                model,
                session_id,
            } => {
                assert_eq!(query, "What is the capital of France?");
                assert_eq!(focus_mode, FocusMode::Web);
                assert!(!pro_mode);
                assert_eq!(model, ModelId::Gemini3ProPreview);
                assert!(session_id.is_none());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn ask_accepts_wire_mode_and_model_names() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"ask","query":"q","focus_mode":"youtubeSearch","pro_mode":true,"model":"gemini-2.0-pro"}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Ask { focus_mode: FocusMode::Youtube, pro_mode: true, model: ModelId::Gemini20Pro, .. }
        ));
    }

    #[test]
    fn finished_message_is_tagged() {
        let id = Uuid::nil();
        let json = serde_json::to_value(ServerMessage::GenerationFinished {
            session_id: id,
            outcome: Resolution::Stopped,
        })
        .unwrap();
        assert_eq!(json["type"], "generation_finished");
        assert_eq!(json["outcome"], "stopped");
    }

    #[test]
    fn session_snapshots_leave_out_image_payloads() {
        let image = image_attachment("cat.png", "image/png", b"meow").unwrap();
        let mut session = Session::opened_by("");
        session.messages.push(Message::user("", vec![image.clone()]));
        let snapshot = vec![session];

        let ServerMessage::Sessions { sessions } = ServerMessage::sessions(&snapshot) else {
            panic!("expected a sessions message");
        };

        let sent = &sessions[0].messages[0].attachments[0];
        assert!(sent.data.is_empty());
        assert_eq!(sent.id, image.id);
        assert_eq!(sent.name, "cat.png");
        assert_eq!(sent.mime_type, "image/png");
        assert_eq!(snapshot[0].messages[0].attachments[0].data, image.data);
    }
}
