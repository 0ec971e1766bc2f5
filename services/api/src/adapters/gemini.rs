//! services/api/src/adapters/gemini.rs
//!
//! This module contains the adapter for the Gemini `generateContent` REST API.
//! It implements the `AnswerService` port, enabling the `google_search` tool for
//! grounded focus modes and reading citations from the grounding metadata.

use async_trait::async_trait;
use chrono::Utc;
use research_assistant_core::domain::{Role, Source};
use research_assistant_core::ports::{Answer, AnswerRequest, AnswerService, PortError, PortResult};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::adapters::instructions::system_instruction;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
/// Reasoning budget requested in pro mode.
const PRO_THINKING_BUDGET: u32 = 32_768;
const EMPTY_ANSWER: &str = "I couldn't generate a text response.";
const DEFAULT_SOURCE_TITLE: &str = "Web Source";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `AnswerService` using Gemini with Google Search grounding.
#[derive(Clone)]
pub struct GeminiAnswerAdapter {
    client: Client,
    api_key: String,
}

impl GeminiAnswerAdapter {
    /// Creates a new `GeminiAnswerAdapter`.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
        }
    }

    async fn send_request(&self, model: &str, body: &GenerateContentRequest) -> PortResult<Answer> {
        let url = format!(
            "{}/{model}:generateContent?key={api_key}",
            BASE_URL,
            model = model,
            api_key = self.api_key
        );

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Gemini API request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            return Err(map_http_error(status, &body_text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to parse Gemini response: {e}")))?;

        Ok(extract_answer(parsed))
    }
}

//=========================================================================================
// `AnswerService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AnswerService for GeminiAnswerAdapter {
    async fn answer(
        &self,
        request: AnswerRequest,
        cancel: CancellationToken,
    ) -> PortResult<Answer> {
        let body = build_request(&request, Utc::now().date_naive());
        info!(
            "Sending Gemini request: model={}, pro_mode={}, history_turns={}",
            request.model.as_str(),
            request.pro_mode,
            request.history.len()
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PortError::Cancelled),
            result = self.send_request(request.model.as_str(), &body) => {
                if let Err(e) = &result {
                    error!("Gemini API Error: {}", e);
                }
                result
            }
        }
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Debug)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineDataPayload,
    },
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct InlineDataPayload {
    mime_type: String,
    data: String,
}

#[derive(Serialize, Debug, Default)]
struct Tool {
    google_search: GoogleSearchConfig,
}

#[derive(Serialize, Debug, Default)]
struct GoogleSearchConfig {}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    thinking_config: ThinkingConfig,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Deserialize, Debug)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ContentResponse>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize, Debug)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize, Debug)]
struct PartResponse {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize, Debug)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Deserialize, Debug)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

//=========================================================================================
// Request Building and Response Parsing
//=========================================================================================

fn build_request(request: &AnswerRequest, today: chrono::NaiveDate) -> GenerateContentRequest {
    let mut contents: Vec<Content> = request
        .history
        .iter()
        .map(|turn| Content {
            role: Some(match turn.role {
                Role::Assistant => "model",
                Role::User => "user",
            }),
            parts: vec![Part::Text {
                text: turn.text.clone(),
            }],
        })
        .collect();

    let mut parts = Vec::new();
    if !request.query.is_empty() {
        parts.push(Part::Text {
            text: request.query.clone(),
        });
    }
    for attachment in &request.attachments {
        parts.push(Part::InlineData {
            inline_data: InlineDataPayload {
                mime_type: attachment.mime_type.clone(),
                data: attachment.data.clone(),
            },
        });
    }
    // The API rejects a turn without parts.
    if parts.is_empty() {
        parts.push(Part::Text {
            text: " ".to_string(),
        });
    }
    contents.push(Content {
        role: Some("user"),
        parts,
    });

    let tools = if request.focus_mode.uses_web_search() {
        vec![Tool::default()]
    } else {
        Vec::new()
    };

    let generation_config = request.pro_mode.then(|| GenerationConfig {
        thinking_config: ThinkingConfig {
            thinking_budget: PRO_THINKING_BUDGET,
        },
    });

    GenerateContentRequest {
        contents,
        system_instruction: Content {
            role: None,
            parts: vec![Part::Text {
                text: system_instruction(request.focus_mode, request.pro_mode, today),
            }],
        },
        tools,
        generation_config,
    }
}

fn extract_answer(response: GenerateContentResponse) -> Answer {
    let Some(candidate) = response.candidates.and_then(|c| c.into_iter().next()) else {
        return Answer {
            text: EMPTY_ANSWER.to_string(),
            sources: Vec::new(),
        };
    };

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|part| !part.thought)
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    let sources = candidate
        .grounding_metadata
        .map(|metadata| {
            metadata
                .grounding_chunks
                .into_iter()
                .filter_map(|chunk| chunk.web)
                .filter_map(|web| {
                    let url = web.uri?;
                    let title = web.title.unwrap_or_else(|| DEFAULT_SOURCE_TITLE.to_string());
                    Some(Source::new(title, url))
                })
                .collect()
        })
        .unwrap_or_default();

    Answer {
        text: if text.is_empty() {
            EMPTY_ANSWER.to_string()
        } else {
            text
        },
        sources,
    }
}

fn map_http_error(status: StatusCode, body: &str) -> PortError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        })
        .unwrap_or_else(|_| body.to_string());
    PortError::Unexpected(format!("Gemini API returned {}: {}", status.as_u16(), message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use research_assistant_core::domain::{Attachment, AttachmentKind, FocusMode, HistoryTurn, ModelId};
    use serde_json::json;
    use uuid::Uuid;

    fn request(focus_mode: FocusMode, pro_mode: bool) -> AnswerRequest {
        AnswerRequest {
            query: "What is the capital of France?".to_string(),
            attachments: vec![Attachment {
                id: Uuid::new_v4(),
                kind: AttachmentKind::Image,
                name: "map.png".to_string(),
                mime_type: "image/png".to_string(),
                data: "aGVsbG8=".to_string(),
            }],
            focus_mode,
            pro_mode,
            model: ModelId::default(),
            history: vec![
                HistoryTurn { role: Role::User, text: "hi".to_string() },
                HistoryTurn { role: Role::Assistant, text: "hello".to_string() },
            ],
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    #[test]
    fn request_maps_history_roles_and_inline_images() {
        let body = serde_json::to_value(build_request(&request(FocusMode::Web, false), today())).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][2]["parts"][0]["text"], "What is the capital of France?");
        assert_eq!(body["contents"][2]["parts"][1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(body["tools"], json!([{ "google_search": {} }]));
        assert!(body.get("generationConfig").is_none());
        assert!(body["systemInstruction"].get("role").is_none());
    }

    #[test]
    fn writing_mode_has_no_search_and_pro_mode_sets_budget() {
        let body = serde_json::to_value(build_request(&request(FocusMode::Writing, true), today())).unwrap();

        assert!(body.get("tools").is_none());
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingBudget"], 32768);
    }

    #[test]
    fn empty_turn_gets_a_single_space_part() {
        let mut req = request(FocusMode::Web, false);
        req.query.clear();
        req.attachments.clear();
        let body = serde_json::to_value(build_request(&req, today())).unwrap();
        assert_eq!(body["contents"][2]["parts"], json!([{ "text": " " }]));
    }

    #[test]
    fn answer_and_sources_come_from_first_candidate() {
        let raw = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "planning", "thought": true },
                    { "text": "Paris is the capital " },
                    { "text": "of France." }
                ]},
                "groundingMetadata": { "groundingChunks": [
                    { "web": { "uri": "https://example.com/atlas", "title": "Global Atlas" } },
                    { "web": { "uri": "https://example.com/untitled" } },
                    { "retrievedContext": {} }
                ]}
            }]
        });
        let parsed: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        let answer = extract_answer(parsed);

        assert_eq!(answer.text, "Paris is the capital of France.");
        assert_eq!(
            answer.sources,
            vec![
                Source::new("Global Atlas", "https://example.com/atlas"),
                Source::new("Web Source", "https://example.com/untitled"),
            ]
        );
    }

    #[test]
    fn missing_text_falls_back_to_notice() {
        let parsed: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        let answer = extract_answer(parsed);
        assert_eq!(answer.text, EMPTY_ANSWER);
        assert!(answer.sources.is_empty());
    }

    #[test]
    fn http_errors_surface_provider_message() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = map_http_error(StatusCode::TOO_MANY_REQUESTS, body);
        assert_eq!(
            err.to_string(),
            "An unexpected error occurred: Gemini API returned 429: RESOURCE_EXHAUSTED: Quota exceeded"
        );
    }
}
