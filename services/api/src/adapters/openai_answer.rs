//! services/api/src/adapters/openai_answer.rs
//!
//! This module contains the adapter for answering through the OpenAI Responses API
//! with its web search tool. It implements the `AnswerService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::responses::{CreateResponseArgs, Tool, WebSearchTool},
    Client,
};
use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use research_assistant_core::domain::{Role, Source};
use research_assistant_core::ports::{Answer, AnswerRequest, AnswerService, PortError, PortResult};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::adapters::instructions::system_instruction;

/// Markdown citations the web search tool appends inline, e.g. `([bbc.com](https://...))`.
const CITATION_PATTERN: &str = r"\(\[([^\]]*)\]\(([^)\s]+)\)\)";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `AnswerService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiAnswerAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiAnswerAdapter {
    /// Creates a new `OpenAiAnswerAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    async fn create_response(&self, request: &AnswerRequest) -> PortResult<Answer> {
        let tools = if request.focus_mode.uses_web_search() {
            vec![Tool::WebSearch(WebSearchTool::default())]
        } else {
            Vec::new()
        };

        let instructions =
            system_instruction(request.focus_mode, request.pro_mode, Utc::now().date_naive());

        let response_request = CreateResponseArgs::default()
            .model(&self.model)
            .instructions(instructions)
            .input(transcript(request))
            .tools(tools)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .responses()
            .create(response_request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let raw_answer = response.output_text().unwrap_or_default();
        extract_citations(&raw_answer)
    }
}

//=========================================================================================
// `AnswerService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AnswerService for OpenAiAnswerAdapter {
    async fn answer(
        &self,
        request: AnswerRequest,
        cancel: CancellationToken,
    ) -> PortResult<Answer> {
        if !request.attachments.is_empty() {
            warn!(
                "OpenAI adapter does not forward images; ignoring {} attachment(s).",
                request.attachments.len()
            );
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PortError::Cancelled),
            result = self.create_response(&request) => {
                if let Err(e) = &result {
                    error!("OpenAI API Error: {}", e);
                }
                result
            }
        }
    }
}

/// Folds prior turns and the query into the single input text the Responses API takes.
fn transcript(request: &AnswerRequest) -> String {
    let mut input = String::new();
    if !request.history.is_empty() {
        input.push_str("PREVIOUS CONVERSATION:\n");
        for turn in &request.history {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            input.push_str(&format!("{}: {}\n", speaker, turn.text));
        }
        input.push_str("\nQUESTION:\n");
    }
    input.push_str(&request.query);
    input
}

/// Pulls inline markdown citations out of the answer text as sources.
fn extract_citations(raw: &str) -> PortResult<Answer> {
    let citation_regex =
        Regex::new(CITATION_PATTERN).map_err(|e| PortError::Unexpected(e.to_string()))?;

    let mut sources: Vec<Source> = Vec::new();
    for captures in citation_regex.captures_iter(raw) {
        let title = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        let url = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
        if sources.iter().any(|s| s.url == url) {
            continue;
        }
        let title = if title.is_empty() { url } else { title };
        sources.push(Source::new(title, url));
    }

    let stripped = citation_regex.replace_all(raw, "");
    let text = stripped
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    Ok(Answer { text, sources })
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_assistant_core::domain::{FocusMode, HistoryTurn, ModelId};

    #[test]
    fn citations_become_deduplicated_sources() {
        let raw = "Paris is the capital ([atlas.com](https://atlas.com/fr)).\nIt sits on the Seine ([atlas.com](https://atlas.com/fr)) ([rivers](https://rivers.org/seine))";
        let answer = extract_citations(raw).unwrap();

        assert_eq!(answer.text, "Paris is the capital .\nIt sits on the Seine");
        assert_eq!(
            answer.sources,
            vec![
                Source::new("atlas.com", "https://atlas.com/fr"),
                Source::new("rivers", "https://rivers.org/seine"),
            ]
        );
    }

    #[test]
    fn plain_answers_have_no_sources() {
        let answer = extract_citations("  A poem about autumn.  ").unwrap();
        assert_eq!(answer.text, "A poem about autumn.");
        assert!(answer.sources.is_empty());
    }

    #[test]
    fn transcript_includes_history_before_the_question() {
        let request = AnswerRequest {
            query: "And Germany?".to_string(),
            attachments: Vec::new(),
            focus_mode: FocusMode::Web,
            pro_mode: false,
            model: ModelId::default(),
            history: vec![
                HistoryTurn { role: Role::User, text: "Capital of France?".to_string() },
                HistoryTurn { role: Role::Assistant, text: "Paris.".to_string() },
            ],
        };
        assert_eq!(
            transcript(&request),
            "PREVIOUS CONVERSATION:\nUser: Capital of France?\nAssistant: Paris.\n\nQUESTION:\nAnd Germany?"
        );
    }
}
