//! crates/research_assistant_core/src/domain.rs
//!
//! Defines the core data structures for the research chat: sessions, their
//! messages, and the fabricated thinking timeline attached to assistant replies.
//! The serde derives double as the persisted and wire representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of characters of the first query kept in a derived session title.
pub const TITLE_MAX_CHARS: usize = 30;
/// Marker appended to a derived title when the query was truncated.
pub const TITLE_ELLIPSIS: &str = "...";
/// Title used when the first message carries only images.
pub const IMAGE_ONLY_TITLE: &str = "Image Analysis";
/// Title of a session created explicitly, before anything has been asked.
pub const NEW_SESSION_TITLE: &str = "New Thread";

//=========================================================================================
// Sessions
//=========================================================================================

/// One chat thread and its ordered messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Creates a session titled after the query that opens it.
    pub fn opened_by(query: &str) -> Self {
        Self::new(derive_title(query))
    }

    /// Derives the title from `query`, but only while the session is still empty.
    /// Once a message exists the title is never recomputed.
    pub fn retitle_if_empty(&mut self, query: &str) {
        if self.messages.is_empty() {
            self.title = derive_title(query);
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn last_message_mut(&mut self) -> Option<&mut Message> {
        self.messages.last_mut()
    }

    pub fn find_message_mut(&mut self, message_id: Uuid) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }

    /// Removes a message by id and returns it.
    pub fn take_message(&mut self, message_id: Uuid) -> Option<Message> {
        let index = self.messages.iter().position(|m| m.id == message_id)?;
        Some(self.messages.remove(index))
    }

    /// The conversation as the provider should see it: every finalized message,
    /// with in-progress thinking placeholders filtered out.
    pub fn history(&self) -> Vec<HistoryTurn> {
        self.messages
            .iter()
            .filter(|m| !m.is_in_progress())
            .map(|m| HistoryTurn {
                role: m.role,
                text: m.content.clone(),
            })
            .collect()
    }
}

/// Builds a title from the first 30 characters of a query.
pub fn derive_title(query: &str) -> String {
    if query.is_empty() {
        return IMAGE_ONLY_TITLE.to_string();
    }
    let mut title: String = query.chars().take(TITLE_MAX_CHARS).collect();
    if query.chars().count() > TITLE_MAX_CHARS {
        title.push_str(TITLE_ELLIPSIS);
    }
    title
}

/// Looks up a session by id inside a collection.
pub fn find_session_mut(sessions: &mut [Session], session_id: Uuid) -> Option<&mut Session> {
    sessions.iter_mut().find(|s| s.id == session_id)
}

//=========================================================================================
// Messages
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Like,
    Dislike,
}

/// A single chat message. Finalized messages only ever change their feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub pro_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
}

impl Message {
    fn base(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            attachments: Vec::new(),
            thinking: None,
            sources: Vec::new(),
            timestamp: Utc::now(),
            pro_mode: false,
            feedback: None,
        }
    }

    pub fn user(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            attachments,
            ..Self::base(Role::User, content)
        }
    }

    /// The in-progress assistant message shown while the real answer is pending.
    /// Its timeline starts with exactly one active step for the script's first phase.
    pub fn placeholder(first_phase: impl Into<String>, pro_mode: bool) -> Self {
        Self {
            thinking: Some(ThinkingState {
                steps: vec![Step::active(INITIAL_STEP_ID, first_phase)],
                in_progress: true,
            }),
            pro_mode,
            ..Self::base(Role::Assistant, "")
        }
    }

    /// A finalized assistant answer carrying its sources and completed timeline.
    pub fn answer(
        content: impl Into<String>,
        sources: Vec<Source>,
        steps: Vec<Step>,
        pro_mode: bool,
    ) -> Self {
        Self {
            sources,
            thinking: Some(ThinkingState {
                steps,
                in_progress: false,
            }),
            pro_mode,
            ..Self::base(Role::Assistant, content)
        }
    }

    /// A plain assistant message without timeline, used for stop and failure notices.
    pub fn notice(content: impl Into<String>) -> Self {
        Self::base(Role::Assistant, content)
    }

    pub fn is_in_progress(&self) -> bool {
        self.role == Role::Assistant && self.thinking.as_ref().is_some_and(|t| t.in_progress)
    }

    /// Applies a like/dislike click. Repeating the current value clears it.
    pub fn toggle_feedback(&mut self, feedback: Feedback) {
        self.feedback = if self.feedback == Some(feedback) {
            None
        } else {
            Some(feedback)
        };
    }
}

/// One (role, text) pair of prior conversation sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    pub role: Role,
    pub text: String,
}

//=========================================================================================
// Thinking timeline
//=========================================================================================

/// Id given to the step seeded into a fresh placeholder.
pub const INITIAL_STEP_ID: &str = "init";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Active,
    Completed,
}

/// The live record of a message's progress through one script phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub text: String,
    pub status: StepStatus,
    #[serde(default)]
    pub logs: Vec<String>,
}

impl Step {
    pub fn active(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            status: StepStatus::Active,
            logs: Vec::new(),
        }
    }
}

/// Steps plus the "still in progress" flag. At most one step is active while
/// in progress; none once finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingState {
    pub steps: Vec<Step>,
    pub in_progress: bool,
}

impl ThinkingState {
    pub fn active_step_mut(&mut self) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.status == StepStatus::Active)
    }

    pub fn active_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Active)
            .count()
    }
}

//=========================================================================================
// Attachments, sources and request options
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// The only kind carried end to end.
    Image,
}

/// A staged file, carried base64-encoded on exactly one outgoing user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: Uuid,
    pub kind: AttachmentKind,
    pub name: String,
    pub mime_type: String,
    pub data: String,
}

/// A grounding citation returned alongside an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
}

impl Source {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Steers what kind of material the provider searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusMode {
    #[default]
    #[serde(rename = "webSearch")]
    Web,
    #[serde(rename = "academicSearch")]
    Academic,
    #[serde(rename = "writing")]
    Writing,
    #[serde(rename = "youtubeSearch")]
    Youtube,
    #[serde(rename = "redditSearch")]
    Reddit,
}

impl FocusMode {
    pub const ALL: [FocusMode; 5] = [
        FocusMode::Web,
        FocusMode::Academic,
        FocusMode::Writing,
        FocusMode::Youtube,
        FocusMode::Reddit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FocusMode::Web => "Web Search",
            FocusMode::Academic => "Academic",
            FocusMode::Writing => "Writing",
            FocusMode::Youtube => "YouTube",
            FocusMode::Reddit => "Reddit",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            FocusMode::Web => "Searches the entire internet for the best answer.",
            FocusMode::Academic => "Searches published academic papers and research.",
            FocusMode::Writing => "Pure generation without web search.",
            FocusMode::Youtube => "Finds relevant videos and channels.",
            FocusMode::Reddit => "Searches discussions and opinions on Reddit.",
        }
    }

    /// Writing mode is pure generation; every other mode is web-grounded.
    pub fn uses_web_search(self) -> bool {
        self != FocusMode::Writing
    }
}

/// The three models offered by the model picker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelId {
    #[default]
    #[serde(rename = "gemini-3-pro-preview")]
    Gemini3ProPreview,
    #[serde(rename = "gemini-2.5-pro-preview")]
    Gemini25ProPreview,
    #[serde(rename = "gemini-2.0-pro")]
    Gemini20Pro,
}

impl ModelId {
    pub const ALL: [ModelId; 3] = [
        ModelId::Gemini3ProPreview,
        ModelId::Gemini25ProPreview,
        ModelId::Gemini20Pro,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelId::Gemini3ProPreview => "gemini-3-pro-preview",
            ModelId::Gemini25ProPreview => "gemini-2.5-pro-preview",
            ModelId::Gemini20Pro => "gemini-2.0-pro",
        }
    }
}
