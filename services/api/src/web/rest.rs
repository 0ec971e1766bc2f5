//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use research_assistant_core::{
    attachment::{decode, image_attachment, AttachmentError},
    domain::{find_session_mut, Attachment, Feedback, Role, Session, NEW_SESSION_TITLE},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_sessions_handler,
        create_session_handler,
        delete_session_handler,
        feedback_handler,
        attachment_content_handler,
        list_attachments_handler,
        upload_attachment_handler,
        delete_attachment_handler,
    ),
    components(
        schemas(SessionSummary, FeedbackChoice, FeedbackRequest, FeedbackResponse, StagedAttachment)
    ),
    tags(
        (name = "Research Assistant API", description = "Session and attachment endpoints for the research chat.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A session as listed in the sidebar. Full message content arrives over the WebSocket.
#[derive(Serialize, ToSchema)]
pub struct SessionSummary {
    id: Uuid,
    title: String,
    created_at: DateTime<Utc>,
    message_count: usize,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            title: session.title.clone(),
            created_at: session.created_at,
            message_count: session.messages.len(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackChoice {
    Like,
    Dislike,
}

impl From<FeedbackChoice> for Feedback {
    fn from(choice: FeedbackChoice) -> Self {
        match choice {
            FeedbackChoice::Like => Feedback::Like,
            FeedbackChoice::Dislike => Feedback::Dislike,
        }
    }
}

impl From<Feedback> for FeedbackChoice {
    fn from(feedback: Feedback) -> Self {
        match feedback {
            Feedback::Like => FeedbackChoice::Like,
            Feedback::Dislike => FeedbackChoice::Dislike,
        }
    }
}

/// The rating a user clicked. Repeating the current rating clears it.
#[derive(Deserialize, ToSchema)]
pub struct FeedbackRequest {
    feedback: FeedbackChoice,
}

/// The message's rating after the toggle.
#[derive(Serialize, ToSchema, Debug)]
pub struct FeedbackResponse {
    feedback: Option<FeedbackChoice>,
}

/// A staged attachment, without its encoded payload.
#[derive(Serialize, ToSchema)]
pub struct StagedAttachment {
    id: Uuid,
    name: String,
    mime_type: String,
}

impl From<&Attachment> for StagedAttachment {
    fn from(attachment: &Attachment) -> Self {
        Self {
            id: attachment.id,
            name: attachment.name.clone(),
            mime_type: attachment.mime_type.clone(),
        }
    }
}

//=========================================================================================
// Session Handlers
//=========================================================================================

/// List all sessions, newest first.
#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "All sessions", body = [SessionSummary])
    )
)]
pub async fn list_sessions_handler(
    State(app_state): State<Arc<AppState>>,
) -> Json<Vec<SessionSummary>> {
    let sessions = app_state.store.snapshot().await;
    Json(sessions.iter().rev().map(SessionSummary::from).collect())
}

/// Create a new, empty session.
#[utoipa::path(
    post,
    path = "/sessions",
    responses(
        (status = 201, description = "Session created successfully", body = SessionSummary)
    )
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let summary = app_state
        .store
        .update(|sessions| {
            let session = Session::new(NEW_SESSION_TITLE);
            let summary = SessionSummary::from(&session);
            sessions.push(session);
            summary
        })
        .await;
    info!("Created session {}.", summary.id);
    (StatusCode::CREATED, Json(summary))
}

/// Delete a session and all of its messages.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(
        ("id" = Uuid, Path, description = "The session to delete.")
    ),
    responses(
        (status = 204, description = "Session deleted"),
        (status = 404, description = "Session not found")
    )
)]
pub async fn delete_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let removed = app_state
        .store
        .try_update(|sessions| {
            let before = sessions.len();
            sessions.retain(|s| s.id != session_id);
            sessions.len() != before
        })
        .await;
    if removed {
        info!("Deleted session {}.", session_id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "Session not found".to_string()))
    }
}

enum FeedbackResult {
    Applied(Option<Feedback>),
    NotFound,
    NotAnAnswer,
}

/// Like or dislike an assistant answer.
#[utoipa::path(
    post,
    path = "/sessions/{id}/messages/{message_id}/feedback",
    request_body = FeedbackRequest,
    params(
        ("id" = Uuid, Path, description = "The session holding the message."),
        ("message_id" = Uuid, Path, description = "The answer being rated.")
    ),
    responses(
        (status = 200, description = "Feedback toggled", body = FeedbackResponse),
        (status = 400, description = "The message is not a finalized answer"),
        (status = 404, description = "Session or message not found")
    )
)]
pub async fn feedback_handler(
    State(app_state): State<Arc<AppState>>,
    Path((session_id, message_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, (StatusCode, String)> {
    let mut result = FeedbackResult::NotFound;
    app_state
        .store
        .try_update(|sessions| {
            let Some(message) = find_session_mut(sessions, session_id)
                .and_then(|session| session.find_message_mut(message_id))
            else {
                return false;
            };
            if message.role != Role::Assistant || message.is_in_progress() {
                result = FeedbackResult::NotAnAnswer;
                return false;
            }
            message.toggle_feedback(payload.feedback.into());
            result = FeedbackResult::Applied(message.feedback);
            true
        })
        .await;

    match result {
        FeedbackResult::Applied(feedback) => Ok(Json(FeedbackResponse {
            feedback: feedback.map(FeedbackChoice::from),
        })),
        FeedbackResult::NotFound => Err((StatusCode::NOT_FOUND, "Message not found".to_string())),
        FeedbackResult::NotAnAnswer => Err((
            StatusCode::BAD_REQUEST,
            "Only finished answers can be rated".to_string(),
        )),
    }
}

/// Fetch the image sent with a message. Session snapshots carry only its metadata.
#[utoipa::path(
    get,
    path = "/sessions/{id}/messages/{message_id}/attachments/{attachment_id}",
    params(
        ("id" = Uuid, Path, description = "The session holding the message."),
        ("message_id" = Uuid, Path, description = "The message the image was sent with."),
        ("attachment_id" = Uuid, Path, description = "The attachment to fetch.")
    ),
    responses(
        (status = 200, description = "The raw image, served with its MIME type"),
        (status = 404, description = "Session, message or attachment not found"),
        (status = 500, description = "The stored payload could not be decoded")
    )
)]
pub async fn attachment_content_handler(
    State(app_state): State<Arc<AppState>>,
    Path((session_id, message_id, attachment_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let attachment = app_state
        .store
        .snapshot()
        .await
        .into_iter()
        .find(|s| s.id == session_id)
        .and_then(|s| s.messages.into_iter().find(|m| m.id == message_id))
        .and_then(|m| m.attachments.into_iter().find(|a| a.id == attachment_id))
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Attachment not found".to_string()))?;

    let bytes = decode(&attachment.data).map_err(attachment_error)?;
    Ok(([(CONTENT_TYPE, attachment.mime_type)], bytes))
}

//=========================================================================================
// Attachment Handlers
//=========================================================================================

/// List the images staged for the next question, in submission order.
#[utoipa::path(
    get,
    path = "/attachments",
    responses(
        (status = 200, description = "Staged attachments", body = [StagedAttachment])
    )
)]
pub async fn list_attachments_handler(
    State(app_state): State<Arc<AppState>>,
) -> Json<Vec<StagedAttachment>> {
    let staging = app_state.staging.lock().await;
    Json(staging.list().iter().map(StagedAttachment::from).collect())
}

/// Stage an image for the next question.
///
/// Accepts a multipart/form-data request with a single file part.
#[utoipa::path(
    post,
    path = "/attachments",
    request_body(content_type = "multipart/form-data", description = "The image to stage."),
    responses(
        (status = 201, description = "Image staged", body = StagedAttachment),
        (status = 400, description = "Unsupported type, too large, or missing file"),
        (status = 500, description = "The file could not be read")
    )
)]
pub async fn upload_attachment_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| attachment_error(AttachmentError::Conversion(e.to_string())))?
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "Multipart form must include a file".to_string(),
            )
        })?;

    let name = field.file_name().unwrap_or("image").to_string();
    let mime_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = field
        .bytes()
        .await
        .map_err(|e| attachment_error(AttachmentError::Conversion(e.to_string())))?;

    let attachment = image_attachment(name, &mime_type, &data).map_err(attachment_error)?;
    let staged = StagedAttachment::from(&attachment);
    app_state.staging.lock().await.stage(attachment);
    info!("Staged attachment {} ({}).", staged.name, staged.mime_type);
    Ok((StatusCode::CREATED, Json(staged)))
}

/// Remove a staged image before it is sent.
#[utoipa::path(
    delete,
    path = "/attachments/{id}",
    params(
        ("id" = Uuid, Path, description = "The staged attachment to remove.")
    ),
    responses(
        (status = 204, description = "Attachment removed"),
        (status = 404, description = "Attachment not found")
    )
)]
pub async fn delete_attachment_handler(
    State(app_state): State<Arc<AppState>>,
    Path(attachment_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if app_state.staging.lock().await.remove(attachment_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "Attachment not found".to_string()))
    }
}

fn attachment_error(e: AttachmentError) -> (StatusCode, String) {
    match e {
        AttachmentError::Conversion(_) => {
            error!("Failed to read uploaded file: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        other => {
            warn!("Rejected upload: {}", other);
            (StatusCode::BAD_REQUEST, other.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnswerProvider, Config};
    use async_trait::async_trait;
    use research_assistant_core::{
        domain::Message,
        ports::{Answer, AnswerRequest, AnswerService, PortError, PortResult},
        script::{FAST_TICK, PRO_TICK},
        store::SessionStore,
    };
    use std::path::PathBuf;
    use tokio_util::sync::CancellationToken;
    use tracing::Level;

    struct Unused;

    #[async_trait]
    impl AnswerService for Unused {
        async fn answer(&self, _: AnswerRequest, _: CancellationToken) -> PortResult<Answer> {
            Err(PortError::Unexpected("not used".to_string()))
        }
    }

    fn app_with(sessions: Vec<Session>) -> Arc<AppState> {
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
            Arc::new(SessionStore::new(sessions)),
            Arc::new(Unused),
        ))
    }

    fn answered_session() -> (Session, Uuid, Uuid) {
        let mut session = Session::opened_by("Capital of France?");
        session
            .messages
            .push(Message::user("Capital of France?", Vec::new()));
        let answer = Message::answer("Paris.", Vec::new(), Vec::new(), false);
        let answer_id = answer.id;
        session.messages.push(answer);
        let id = session.id;
        (session, id, answer_id)
    }

    #[tokio::test]
    async fn create_then_delete_session() {
        let app = app_with(Vec::new());

        let _ = create_session_handler(State(app.clone())).await;
        let sessions = app.store.snapshot().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, NEW_SESSION_TITLE);

        let id = sessions[0].id;
        assert_eq!(
            delete_session_handler(State(app.clone()), Path(id)).await.unwrap(),
            StatusCode::NO_CONTENT
        );
        let missing = delete_session_handler(State(app.clone()), Path(id)).await;
        assert_eq!(missing.unwrap_err().0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn feedback_toggles_and_clears() {
        let (session, session_id, answer_id) = answered_session();
        let app = app_with(vec![session]);
        let like = || Json(FeedbackRequest { feedback: FeedbackChoice::Like });

        let Json(first) =
            feedback_handler(State(app.clone()), Path((session_id, answer_id)), like())
                .await
                .unwrap();
        assert_eq!(first.feedback, Some(FeedbackChoice::Like));

        let Json(second) =
            feedback_handler(State(app.clone()), Path((session_id, answer_id)), like())
                .await
                .unwrap();
        assert_eq!(second.feedback, None);
    }

    #[tokio::test]
    async fn feedback_on_unknown_message_is_not_found() {
        let (session, session_id, _) = answered_session();
        let app = app_with(vec![session]);

        let err = feedback_handler(
            State(app),
            Path((session_id, Uuid::new_v4())),
            Json(FeedbackRequest { feedback: FeedbackChoice::Dislike }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_failures_are_bad_requests() {
        let (status, message) = attachment_error(AttachmentError::TooLarge(6 * 1024 * 1024));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "File size must be less than 5MB.");

        let (status, _) = attachment_error(AttachmentError::Conversion("eof".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn message_images_are_served_with_their_type() {
        let image = image_attachment("cat.png", "image/png", b"meow").unwrap();
        let image_id = image.id;
        let mut session = Session::opened_by("");
        let message = Message::user("", vec![image]);
        let message_id = message.id;
        session.messages.push(message);
        let session_id = session.id;
        let app = app_with(vec![session]);

        let response = attachment_content_handler(
            State(app.clone()),
            Path((session_id, message_id, image_id)),
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"meow");

        let missing = attachment_content_handler(
            State(app),
            Path((session_id, message_id, Uuid::new_v4())),
        )
        .await;
        assert_eq!(missing.err().unwrap().0, StatusCode::NOT_FOUND);
    }
}
