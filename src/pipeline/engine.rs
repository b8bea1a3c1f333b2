//! The extraction engine: one strategy, fixed at construction.
//!
//! Each extraction operation (title, sections, each table, each equation)
//! exists in two interchangeable implementations behind one contract: the
//! rule-based functions in [`crate::pipeline::heuristics`] and the
//! LLM-backed ones here. The mode is chosen once when the engine is built
//! and never mixed within a document.
//!
//! ## Fallback state machine
//!
//! Every LLM-assisted call runs `LLM_REQUESTED → LLM_OK | LLM_FAILED →
//! RULE_FALLBACK` independently: a failure is resolved *at the call site* by
//! substituting the rule-based result for that one call, and the next call
//! still attempts the LLM (no circuit breaker — each call is an independent
//! trial). The terminal state is always a concrete value; callers never see
//! a [`RemoteCallError`](crate::error::RemoteCallError). With an
//! always-failing transport the engine's output is byte-identical to
//! rule-based mode, which is exactly how the property is tested.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{Mode, ProcessConfig};
use crate::document::{RawTable, Section};
use crate::patterns::PatternLibrary;
use crate::pipeline::heuristics;
use crate::pipeline::llm::{AnthropicClient, RemoteCompletion};
use crate::prompts;

/// How many table rows are serialised into an LLM description request.
/// Keeps per-table cost bounded on very long tables.
const TABLE_PROMPT_MAX_ROWS: usize = 20;

/// Mode-polymorphic extraction engine for one processing run.
pub struct ExtractionEngine {
    mode: Mode,
    remote: Option<Arc<dyn RemoteCompletion>>,
    patterns: PatternLibrary,
    title_max_tokens: u32,
    sections_max_tokens: u32,
    description_max_tokens: u32,
    title_prefix_chars: usize,
    sections_max_chars: usize,
    llm_calls: AtomicU32,
    llm_fallbacks: AtomicU32,
}

/// Wire shape of one section in the LLM's JSON response.
#[derive(Debug, Deserialize)]
struct SectionJson {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    content: String,
}

impl ExtractionEngine {
    /// Build an engine from the run configuration.
    ///
    /// Transport resolution, most-specific first (mirroring the credential
    /// policy: explicit beats configured, and nothing here reads the
    /// environment):
    ///
    /// 1. a pre-built `config.remote` transport (tests, middleware);
    /// 2. an [`AnthropicClient`] from `config.api_key`;
    /// 3. none — rule-based mode.
    pub fn new(config: &ProcessConfig) -> Self {
        let remote: Option<Arc<dyn RemoteCompletion>> = match config.mode {
            Mode::RuleBased => None,
            Mode::LlmAssisted => config.remote.clone().or_else(|| {
                config.api_key.as_ref().map(|key| {
                    Arc::new(AnthropicClient::new(
                        key,
                        &config.model,
                        config.api_timeout_secs,
                    )) as Arc<dyn RemoteCompletion>
                })
            }),
        };

        Self {
            mode: config.mode,
            remote,
            patterns: config.patterns.clone(),
            title_max_tokens: config.title_max_tokens,
            sections_max_tokens: config.sections_max_tokens,
            description_max_tokens: config.description_max_tokens,
            title_prefix_chars: config.title_prefix_chars,
            sections_max_chars: config.sections_max_chars,
            llm_calls: AtomicU32::new(0),
            llm_fallbacks: AtomicU32::new(0),
        }
    }

    /// The mode this engine was built with.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// LLM calls attempted so far.
    pub fn llm_calls(&self) -> u32 {
        self.llm_calls.load(Ordering::Relaxed)
    }

    /// LLM calls resolved by rule-based fallback so far.
    pub fn llm_fallbacks(&self) -> u32 {
        self.llm_fallbacks.load(Ordering::Relaxed)
    }

    /// Regex tables in use (shared with the normalizer).
    pub fn patterns(&self) -> &PatternLibrary {
        &self.patterns
    }

    // ── Operations ───────────────────────────────────────────────────────

    /// Extract the paper title.
    pub async fn title(&self, text: &str) -> String {
        if let Some(prefix) = self.prefix_on_char_boundary(text, self.title_prefix_chars) {
            let prompt = format!("{}{}", prompts::TITLE_PROMPT, prefix);
            if let Some(response) = self.attempt("title", prompt, self.title_max_tokens).await {
                // One line only; a multi-line response keeps its first line.
                let title = response.lines().next().unwrap_or("").trim().to_string();
                if !title.is_empty() {
                    return title;
                }
            }
        }
        heuristics::extract_title(text, &self.patterns)
    }

    /// Parse the cleaned body text into sections.
    pub async fn sections(&self, text: &str) -> Vec<Section> {
        if let Some(payload) = self.prefix_on_char_boundary(text, self.sections_max_chars) {
            let prompt = format!("{}{}", prompts::SECTIONS_PROMPT, payload);
            if let Some(response) = self
                .attempt("sections", prompt, self.sections_max_tokens)
                .await
            {
                match parse_sections_response(&response) {
                    Some(sections) => return sections,
                    None => {
                        warn!("sections: malformed LLM response, falling back to rule-based");
                        self.llm_fallbacks.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
        heuristics::parse_sections(text, &self.patterns)
    }

    /// Describe one table grid as plain text.
    pub async fn describe_table(&self, table: &RawTable) -> String {
        if self.remote.is_some() && !table.rows.is_empty() {
            let grid = serialize_grid(table);
            let prompt = format!("{}{}", prompts::TABLE_PROMPT, grid);
            if let Some(response) = self
                .attempt("table", prompt, self.description_max_tokens)
                .await
            {
                // One flowing paragraph regardless of how the model wrapped it.
                return response.split_whitespace().collect::<Vec<_>>().join(" ");
            }
        }
        heuristics::describe_table(table)
    }

    /// Describe one equation span as plain text.
    ///
    /// Both paths return the full bracketed replacement so the normalizer
    /// substitutes uniformly.
    pub async fn describe_equation(&self, raw_span: &str) -> String {
        if self.remote.is_some() {
            let prompt = format!("{}{}", prompts::EQUATION_PROMPT, raw_span);
            if let Some(response) = self
                .attempt("equation", prompt, self.description_max_tokens)
                .await
            {
                let paraphrase = response.split_whitespace().collect::<Vec<_>>().join(" ");
                return format!("[Equation: {paraphrase}]");
            }
        }
        heuristics::describe_equation(raw_span)
    }

    // ── Fallback wrapper ─────────────────────────────────────────────────

    /// Try the remote strategy once; `None` means "use the rule-based
    /// result" — either no transport is configured or the call failed and
    /// was absorbed here.
    async fn attempt(&self, call: &str, prompt: String, max_tokens: u32) -> Option<String> {
        let remote = self.remote.as_ref()?;
        self.llm_calls.fetch_add(1, Ordering::Relaxed);
        match remote.complete(prompt, max_tokens).await {
            Ok(response) if !response.trim().is_empty() => {
                debug!("{call}: LLM response ({} chars)", response.len());
                Some(response.trim().to_string())
            }
            Ok(_) => {
                warn!("{call}: empty LLM response, falling back to rule-based");
                self.llm_fallbacks.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                warn!("{call}: LLM call failed ({e}), falling back to rule-based");
                self.llm_fallbacks.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// First `max_chars` of `text`, cut on a char boundary. `None` when no
    /// transport is configured (callers then skip straight to rule-based).
    fn prefix_on_char_boundary<'a>(&self, text: &'a str, max_chars: usize) -> Option<&'a str> {
        self.remote.as_ref()?;
        let mut end = max_chars.min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        Some(&text[..end])
    }
}

/// Extract and parse the first JSON array in the response.
///
/// Models often wrap the array in prose or fences; anything between the
/// first `[` and the last `]` is tried. `None` on any parse failure.
fn parse_sections_response(response: &str) -> Option<Vec<Section>> {
    let start = response.find('[')?;
    let end = response.rfind(']')?;
    if end <= start {
        return None;
    }
    let raw: Vec<SectionJson> = serde_json::from_str(&response[start..=end]).ok()?;
    Some(
        raw.into_iter()
            .map(|s| Section::new(s.heading.trim(), s.content.trim()))
            .collect(),
    )
}

/// Pipe-separated grid serialization for the table prompt.
fn serialize_grid(table: &RawTable) -> String {
    table
        .rows
        .iter()
        .take(TABLE_PROMPT_MAX_ROWS)
        .map(|row| row.join(" | "))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteCallError;
    use std::future::Future;
    use std::pin::Pin;

    /// Transport that fails every call.
    struct FailingTransport;

    impl RemoteCompletion for FailingTransport {
        fn complete(
            &self,
            _prompt: String,
            _max_tokens: u32,
        ) -> Pin<Box<dyn Future<Output = Result<String, RemoteCallError>> + Send + '_>> {
            Box::pin(async { Err(RemoteCallError::Timeout { secs: 30 }) })
        }
    }

    /// Transport that returns a fixed response.
    struct CannedTransport(String);

    impl RemoteCompletion for CannedTransport {
        fn complete(
            &self,
            _prompt: String,
            _max_tokens: u32,
        ) -> Pin<Box<dyn Future<Output = Result<String, RemoteCallError>> + Send + '_>> {
            let response = self.0.clone();
            Box::pin(async move { Ok(response) })
        }
    }

    fn rule_based_engine() -> ExtractionEngine {
        ExtractionEngine::new(&ProcessConfig::default())
    }

    fn engine_with(transport: Arc<dyn RemoteCompletion>) -> ExtractionEngine {
        let config = ProcessConfig::builder().remote(transport).build().unwrap();
        ExtractionEngine::new(&config)
    }

    const SCENARIO: &str = "Paper Title\n\nJohn Doe, Jane Roe\nUniversity X\n\nAbstract\nThis is the abstract.\n\n1. Introduction\nSome intro text.\n\n2. Methods\nSome methods text.";

    fn sample_table() -> RawTable {
        RawTable {
            page: 0,
            index: 0,
            rows: vec![
                vec!["Name".into(), "Score".into()],
                vec!["A".into(), "1".into()],
            ],
        }
    }

    #[tokio::test]
    async fn failing_remote_is_byte_identical_to_rule_based() {
        let rule = rule_based_engine();
        let llm = engine_with(Arc::new(FailingTransport));

        assert_eq!(llm.title(SCENARIO).await, rule.title(SCENARIO).await);
        assert_eq!(llm.sections(SCENARIO).await, rule.sections(SCENARIO).await);
        assert_eq!(
            llm.describe_table(&sample_table()).await,
            rule.describe_table(&sample_table()).await
        );
        assert_eq!(
            llm.describe_equation("$E = mc^2$").await,
            rule.describe_equation("$E = mc^2$").await
        );

        // Every attempted call was counted and fell back.
        assert_eq!(llm.llm_calls(), 4);
        assert_eq!(llm.llm_fallbacks(), 4);
        assert_eq!(rule.llm_calls(), 0);
    }

    #[tokio::test]
    async fn rule_based_engine_never_calls_remote() {
        let engine = rule_based_engine();
        let title = engine.title(SCENARIO).await;
        assert_eq!(title, "Paper Title");
        assert_eq!(engine.llm_calls(), 0);
    }

    #[tokio::test]
    async fn canned_title_used_verbatim() {
        let engine = engine_with(Arc::new(CannedTransport(
            "A Multi Line Title Recovered By The Model".into(),
        )));
        assert_eq!(
            engine.title(SCENARIO).await,
            "A Multi Line Title Recovered By The Model"
        );
        assert_eq!(engine.llm_fallbacks(), 0);
    }

    #[tokio::test]
    async fn canned_sections_parsed_from_json() {
        let engine = engine_with(Arc::new(CannedTransport(
            r#"Here you go: [{"heading": "Intro", "content": "body text"}]"#.into(),
        )));
        let sections = engine.sections(SCENARIO).await;
        assert_eq!(sections, vec![Section::new("Intro", "body text")]);
    }

    #[tokio::test]
    async fn malformed_sections_response_falls_back() {
        let engine = engine_with(Arc::new(CannedTransport("no json in here".into())));
        let sections = engine.sections(SCENARIO).await;
        // Identical to the rule-based parse of the same input.
        let rule = rule_based_engine();
        assert_eq!(sections, rule.sections(SCENARIO).await);
        assert_eq!(engine.llm_fallbacks(), 1);
    }

    #[tokio::test]
    async fn empty_response_falls_back() {
        let engine = engine_with(Arc::new(CannedTransport("   ".into())));
        let title = engine.title(SCENARIO).await;
        assert_eq!(title, "Paper Title");
        assert_eq!(engine.llm_fallbacks(), 1);
    }

    #[tokio::test]
    async fn llm_table_description_collapsed_to_one_paragraph() {
        let engine = engine_with(Arc::new(CannedTransport(
            "The table lists\nscores\n\nper participant.".into(),
        )));
        let desc = engine.describe_table(&sample_table()).await;
        assert_eq!(desc, "The table lists scores per participant.");
    }

    #[tokio::test]
    async fn llm_equation_description_is_bracketed() {
        let engine = engine_with(Arc::new(CannedTransport(
            "Energy equals mass times the speed of light squared.".into(),
        )));
        let desc = engine.describe_equation("$E = mc^2$").await;
        assert_eq!(
            desc,
            "[Equation: Energy equals mass times the speed of light squared.]"
        );
    }

    #[test]
    fn grid_serialization_bounded() {
        let table = RawTable {
            page: 0,
            index: 0,
            rows: (0..50)
                .map(|i| vec![format!("r{i}"), "x".into()])
                .collect(),
        };
        let grid = serialize_grid(&table);
        assert_eq!(grid.lines().count(), TABLE_PROMPT_MAX_ROWS);
        assert!(grid.contains("r0 | x"));
    }

    #[test]
    fn sections_json_with_fences_parses() {
        let response = "```json\n[{\"heading\": \"A\", \"content\": \"b\"}]\n```";
        let sections = parse_sections_response(response).unwrap();
        assert_eq!(sections, vec![Section::new("A", "b")]);
    }
}
