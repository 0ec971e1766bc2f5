//! services/api/src/adapters/instructions.rs
//!
//! System instructions shared by every answer adapter. The focus mode and pro
//! flag shape the provider's behavior here; they never affect the core's
//! control flow.

use chrono::NaiveDate;
use research_assistant_core::FocusMode;

const BASE_INSTRUCTIONS: &str = r#"You are Perplexica, an advanced AI search engine capable of deep research.
Your primary goal is to provide answers based on the LATEST information available on the web.

CRITICAL RULES:
1. PRIORITIZE SEARCH RESULTS: Always prefer information found in the search tools over your internal knowledge cutoff.
2. BE UP-TO-DATE: If the user asks for news, weather, stock prices, or recent events, use the search tool to find the exact current status.
3. CITE SOURCES: You must base your answers on the search results provided.
4. DATE AWARENESS: Today's date is {today}."#;

const DEEP_RESEARCH_INSTRUCTIONS: &str = r#"
==================================================
MODE: PURE DEEP RESEARCH (GROUND UP)
==================================================
You are currently in "Deep Research" mode. The user expects an EXHAUSTIVE, ACADEMIC, and FIRST-PRINCIPLES analysis.

MANDATORY PROCESS (FROM GROUND UP):
1. **First Principles:** Do not assume common knowledge. Start from the fundamental truths of the query.
2. **Exhaustive Search:** If you find a fact, verify it against a second source. If sources conflict, find a third.
3. **Recursive Reasoning:** Think about the "Why" and "How" deeply. Spend significant tokens on the reasoning process.
4. **Counter-Arguments:** Actively look for evidence that disproves your initial findings.
5. **No Shortcuts:** Do not summarize until you have analyzed the entire context.

OUTPUT FORMAT:
- Provide a "Deep Dive" structured response.
- Use multiple headers.
- Cite every single claim.
- Include a "Methodology" or "Reasoning" section if the topic is complex."#;

/// Builds the system instruction for one request.
pub fn system_instruction(mode: FocusMode, pro_mode: bool, today: NaiveDate) -> String {
    let mut instruction = BASE_INSTRUCTIONS.replace("{today}", &today.format("%Y-%m-%d").to_string());
    if pro_mode {
        instruction.push_str(DEEP_RESEARCH_INSTRUCTIONS);
    }
    instruction.push('\n');
    instruction.push_str(focus_instruction(mode));
    instruction
}

fn focus_instruction(mode: FocusMode) -> &'static str {
    match mode {
        FocusMode::Web => "Provide comprehensive, accurate, and LATEST answers.",
        FocusMode::Academic => "Focus on academic papers, research, and scientific consensus. Prioritize .edu and .org sources.",
        FocusMode::Writing => "You are a creative writing assistant. Do not use web search unless explicitly asked for facts. Focus on style, tone, and structure.",
        FocusMode::Youtube => "Focus on finding educational or relevant YouTube videos. Summarize video content if possible.",
        FocusMode::Reddit => "Focus on searching Reddit threads to find community opinions, personal experiences, and discussions.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn instruction_carries_date_and_focus() {
        let text = system_instruction(FocusMode::Academic, false, today());
        assert!(text.contains("Today's date is 2025-03-14."));
        assert!(text.ends_with("Prioritize .edu and .org sources."));
        assert!(!text.contains("DEEP RESEARCH"));
    }

    #[test]
    fn pro_mode_adds_deep_research_block() {
        let text = system_instruction(FocusMode::Web, true, today());
        assert!(text.contains("MODE: PURE DEEP RESEARCH (GROUND UP)"));
    }
}
