//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! It streams the session collection to the client and delegates questions
//! to the answer task.

use crate::web::{
    answer_task::{answer_process, AskInput},
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use research_assistant_core::domain::{FocusMode, ModelId};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{error, info, warn};
use uuid::Uuid;

pub const BUSY_MESSAGE: &str = "A response is already being generated.";
pub const EMPTY_ASK_MESSAGE: &str = "Type a question or attach an image first.";

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New WebSocket connection established.");

    let (sender, mut receiver) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();

    // --- 1. Writer: outbound events plus every published session snapshot ---
    let writer = tokio::spawn(write_loop(sender, outbound_rx, app_state.clone()));

    // --- 2. Main Message Loop ---
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_text_message(text.as_str(), &app_state, &outbound_tx).await;
            }
            Ok(Message::Close(_)) => {
                info!("Client sent close message.");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    // --- 3. Cleanup ---
    // A running answer task keeps its own sender, so the request still resolves.
    writer.abort();
    info!("WebSocket connection closed.");
}

async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound_rx: UnboundedReceiver<ServerMessage>,
    app_state: Arc<AppState>,
) {
    let mut changes = app_state.store.subscribe();
    let initial = ServerMessage::sessions(&changes.borrow_and_update());
    if send_message(&mut sender, &initial).await.is_err() {
        return;
    }

    loop {
        let msg = tokio::select! {
            Some(msg) = outbound_rx.recv() => msg,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                ServerMessage::sessions(&changes.borrow_and_update())
            }
            else => break,
        };
        if send_message(&mut sender, &msg).await.is_err() {
            info!("Client went away. Writer exiting.");
            break;
        }
    }
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(json.into())).await
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: &str,
    app_state: &Arc<AppState>,
    outbound_tx: &UnboundedSender<ServerMessage>,
) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Ask {
            query,
            focus_mode,
            pro_mode,
            model,
            session_id,
        }) => {
            if let Err(message) = start_answer(
                app_state,
                query,
                focus_mode,
                pro_mode,
                model,
                session_id,
                outbound_tx,
            )
            .await
            {
                let _ = outbound_tx.send(ServerMessage::Error {
                    message: message.to_string(),
                });
            }
        }
        Ok(ClientMessage::Stop) => {
            if app_state.generation.stop() {
                info!("Stop requested. Cancelling the outstanding request.");
            } else {
                info!("Stop requested while idle. Ignored.");
            }
        }
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
        }
    }
}

/// Validates an ask and spawns the answer task. Rejections change no state.
async fn start_answer(
    app_state: &Arc<AppState>,
    query: String,
    focus_mode: FocusMode,
    pro_mode: bool,
    model: ModelId,
    session_id: Option<Uuid>,
    outbound_tx: &UnboundedSender<ServerMessage>,
) -> Result<(), &'static str> {
    let query = query.trim().to_string();

    let mut staging = app_state.staging.lock().await;
    if query.is_empty() && staging.is_empty() {
        return Err(EMPTY_ASK_MESSAGE);
    }
    let Some(guard) = app_state.generation.try_begin() else {
        return Err(BUSY_MESSAGE);
    };
    let attachments = staging.drain();
    drop(staging);

    let input = AskInput {
        query,
        attachments,
        focus_mode,
        pro_mode,
        model,
        session_id,
    };
    let app_state = app_state.clone();
    let events = outbound_tx.clone();
    tokio::spawn(async move {
        let outcome = answer_process(app_state, input, guard, events).await;
        info!(
            "Answer process for session {} finished: {:?}.",
            outcome.session_id, outcome.resolution
        );
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnswerProvider, Config};
    use async_trait::async_trait;
    use research_assistant_core::{
        attachment::image_attachment,
        ports::{Answer, AnswerRequest, AnswerService, PortError, PortResult},
        script::{FAST_TICK, PRO_TICK},
        store::SessionStore,
    };
    use std::path::PathBuf;
    use tokio_util::sync::CancellationToken;
    use tracing::Level;

    struct NeverAnswers;

    #[async_trait]
    impl AnswerService for NeverAnswers {
        async fn answer(
            &self,
            _request: AnswerRequest,
            cancel: CancellationToken,
        ) -> PortResult<Answer> {
            cancel.cancelled().await;
            Err(PortError::Cancelled)
        }
    }

    fn test_app() -> Arc<AppState> {
        let config = Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            log_level: Level::INFO,
            answer_provider: AnswerProvider::Gemini,
            gemini_api_key: Some("test-key".to_string()),
            openai_api_key: None,
            openai_model: "gpt-4o".to_string(),
            database_url: None,
            sessions_path: PathBuf::from("unused.json"),
            cors_origin: "http://localhost:3000".to_string(),
            fast_tick: FAST_TICK,
            pro_tick: PRO_TICK,
        };
        Arc::new(AppState::new(
            Arc::new(config),
            Arc::new(SessionStore::new(Vec::new())),
            Arc::new(NeverAnswers),
        ))
    }

    fn ask_json(query: &str) -> String {
        format!(r#"{{"type":"ask","query":"{}"}}"#, query)
    }

    #[tokio::test]
    async fn empty_ask_is_rejected_without_state_change() {
        let app = test_app();
        let (tx, mut rx) = mpsc::unbounded_channel();

        handle_text_message(&ask_json("   "), &app, &tx).await;

        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::Error { message }) if message == EMPTY_ASK_MESSAGE
        ));
        assert!(!app.generation.is_generating());
        assert!(app.store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn second_ask_while_generating_is_rejected() {
        let app = test_app();
        let (tx, mut rx) = mpsc::unbounded_channel();

        handle_text_message(&ask_json("first"), &app, &tx).await;
        assert!(app.generation.is_generating());
        handle_text_message(&ask_json("second"), &app, &tx).await;

        let mut saw_busy = false;
        while let Ok(msg) = rx.try_recv() {
            if matches!(&msg, ServerMessage::Error { message } if message == BUSY_MESSAGE) {
                saw_busy = true;
            }
        }
        assert!(saw_busy);

        handle_text_message(r#"{"type":"stop"}"#, &app, &tx).await;
        loop {
            if let Some(ServerMessage::GenerationFinished { .. }) = rx.recv().await {
                break;
            }
        }
        assert!(!app.generation.is_generating());
        let sessions = app.store.snapshot().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "first");
    }

    #[tokio::test]
    async fn image_only_ask_takes_the_staged_attachments() {
        let app = test_app();
        let image = image_attachment("chart.png", "image/png", b"fake png bytes").unwrap();
        app.staging.lock().await.stage(image.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        handle_text_message(&ask_json(""), &app, &tx).await;
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::GenerationStarted { .. })
        ));
        assert!(app.staging.lock().await.is_empty());

        let sessions = app.store.snapshot().await;
        assert_eq!(sessions[0].title, "Image Analysis");
        assert_eq!(sessions[0].messages[0].attachments, vec![image]);
        app.generation.stop();
    }
}
