//! crates/research_assistant_core/src/script.rs
//!
//! The two fixed "thinking" scripts played while a real answer is pending.
//! The query is only interpolated into log lines; it never changes the shape
//! of a script.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::time::Duration;

/// Cadence of the fast script.
pub const FAST_TICK: Duration = Duration::from_millis(300);
/// Cadence of the pro script, slow enough to read like a long investigation.
pub const PRO_TICK: Duration = Duration::from_millis(1200);

/// One named segment of a script: what the step shows and the log lines it emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub text: String,
    pub logs: Vec<String>,
}

impl Phase {
    fn new(text: &str, logs: Vec<String>) -> Self {
        Self {
            text: text.to_string(),
            logs,
        }
    }
}

/// An ordered, never-empty list of phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    phases: Vec<Phase>,
}

impl Script {
    pub fn for_mode(query: &str, pro_mode: bool) -> Self {
        if pro_mode {
            Self::pro(query)
        } else {
            Self::fast(query)
        }
    }

    /// Search, read, generate.
    pub fn fast(query: &str) -> Self {
        let phases = vec![
            Phase::new(
                "Searching the web...",
                vec![
                    format!("[NET] Searching google for \"{}...\"", prefix(query, 10)),
                    "[DATA] Retrieving top results".to_string(),
                ],
            ),
            Phase::new(
                "Reading sources...",
                lines(&["[PARSER] Extracting text content", "[LLM] Processing search snippets"]),
            ),
            Phase::new(
                "Generating response...",
                lines(&["[LLM] Synthesizing answer", "[SYS] Formatting output"]),
            ),
        ];
        Self { phases }
    }

    /// Kernel start-up, first principles, broad search, deep reading,
    /// recursive fact checking, counter-arguments, synthesis.
    pub fn pro(query: &str) -> Self {
        let phases = vec![
            Phase::new(
                "Initializing Deep Research Kernel...",
                vec![
                    "[SYS] Setting Thinking Budget: 32,768 tokens".to_string(),
                    "[AUTH] Verifying API credentials for Gemini 3 Pro".to_string(),
                    "[MODE] PURE_DEEP_RESEARCH (Ground Up)".to_string(),
                    format!("[NLP] Deconstructing query semantics: \"{}...\"", prefix(query, 20)),
                ],
            ),
            Phase::new(
                "First Principles Analysis...",
                lines(&[
                    "[LOGIC] Discarding prior assumptions",
                    "[LOGIC] Identifying fundamental axioms of the query",
                    "[PLAN] Building knowledge graph from scratch",
                    "[PLAN] Strategy: Multi-vector exhaustive search",
                ]),
            ),
            Phase::new(
                "Executing Broad Spectrum Search (Layer 1)...",
                vec![
                    format!("[NET] GET google.search?q={}&depth=1", encode_uri_component(query)),
                    "[NET] Retrieving 25 candidate URLs".to_string(),
                    "[FILTER] Removing low-authority domains".to_string(),
                    "[DATA] Parsing metadata from primary sources".to_string(),
                ],
            ),
            Phase::new(
                "Deep Reading & Contextual Extraction...",
                lines(&[
                    "[CRAWL] Fetching full text from Source #1",
                    "[CRAWL] Fetching full text from Source #2",
                    "[CRAWL] Fetching full text from Source #3",
                    "[LLM] Ingesting 45,000 context tokens",
                    "[NLP] Extracting statistical claims and temporal data",
                ]),
            ),
            Phase::new(
                "Recursive Fact Checking (Layer 2)...",
                vec![
                    "[VERIFY] Cross-referencing Claim A against Source #4".to_string(),
                    "[VERIFY] Detecting potential bias in Source #1".to_string(),
                    "[SEARCH] Executing secondary query for verification".to_string(),
                    format!(
                        "[NET] GET google.search?q=verify+{}",
                        encode_uri_component(&prefix(query, 10))
                    ),
                ],
            ),
            Phase::new(
                "Analyzing Counter-Arguments...",
                lines(&[
                    "[LOGIC] Simulating opposing viewpoints",
                    "[LOGIC] Stress-testing generated hypothesis",
                    "[DATA] Looking for recent contradictions (News/Science)",
                    "[SYS] Resolving conflicting data points",
                ]),
            ),
            Phase::new(
                "Synthesizing Ground-Up Report...",
                lines(&[
                    "[DRAFT] Structuring arguments from first principles",
                    "[DRAFT] Compiling citation matrix",
                    "[STYLE] Applying academic rigor formatting",
                    "[SYS] Finalizing output generation",
                ]),
            ),
        ];
        Self { phases }
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn phase(&self, index: usize) -> Option<&Phase> {
        self.phases.get(index)
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Text of the step a fresh placeholder is seeded with.
    pub fn first_phase_text(&self) -> &str {
        self.phases.first().map(|p| p.text.as_str()).unwrap_or_default()
    }
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn prefix(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

/// Everything a browser's `encodeURIComponent` leaves alone:
/// `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn encode_uri_component(text: &str) -> String {
    utf8_percent_encode(text, URI_COMPONENT).to_string()
}
