//! Configuration types for PDF cleanup runs.
//!
//! All behaviour is controlled through [`ProcessConfig`], built via its
//! [`ProcessConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across batch workers, serialise the printable
//! parts for logging, and diff two runs to understand why their outputs
//! differ.
//!
//! The API credential is resolved exactly once, here — leaf functions never
//! read the environment. Absence of a credential is not an error; it simply
//! selects rule-based mode.

use crate::error::ProcessError;
use crate::patterns::PatternLibrary;
use crate::pipeline::llm::RemoteCompletion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Extraction strategy, fixed once per engine instance.
///
/// Every extraction call (title, sections, each table, each equation) is
/// polymorphic over this choice; modes are never mixed within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Fixed heuristics and patterns only; no network calls.
    #[default]
    RuleBased,
    /// Hosted language-model calls with mandatory rule-based fallback on any
    /// failure.
    LlmAssisted,
}

/// Configuration for a processing run.
///
/// Built via [`ProcessConfig::builder()`] or [`ProcessConfig::from_env()`].
///
/// # Example
/// ```rust
/// use papertidy::ProcessConfig;
///
/// let config = ProcessConfig::builder()
///     .api_timeout_secs(20)
///     .model("claude-sonnet-4-20250514")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ProcessConfig {
    /// Extraction strategy. Default: [`Mode::RuleBased`]; setting an API key
    /// (or calling [`ProcessConfig::from_env`] with `ANTHROPIC_API_KEY` set)
    /// switches to [`Mode::LlmAssisted`].
    pub mode: Mode,

    /// Anthropic API key. `None` is valid and selects rule-based mode.
    pub api_key: Option<String>,

    /// Model identifier for LLM-assisted calls.
    pub model: String,

    /// Per-call timeout in seconds. Default: 30.
    ///
    /// Applies to every individual LLM call; a timed-out call falls back to
    /// the rule-based result for that call only.
    pub api_timeout_secs: u64,

    /// Token budget for the title call. Default: 256.
    ///
    /// Titles are one line; a small budget keeps the call cheap and fast.
    pub title_max_tokens: u32,

    /// Token budget for the section-parsing call. Default: 4096.
    ///
    /// This is the one large call per document — the model returns the full
    /// `[{heading, content}]` structure.
    pub sections_max_tokens: u32,

    /// Token budget for each table/equation description. Default: 300.
    ///
    /// Issued once per table and once per equation; identical inputs are not
    /// cached across calls (correctness-neutral, cost-relevant).
    pub description_max_tokens: u32,

    /// How many characters of the document prefix the title call sees.
    /// Default: 2000.
    pub title_prefix_chars: usize,

    /// Upper bound on the text sent to the section-parsing call. Default: 15000.
    ///
    /// Keeps the request inside model context limits; the rule-based parser
    /// always sees the full text.
    pub sections_max_chars: usize,

    /// Pre-constructed remote completion transport. Takes precedence over
    /// `api_key`. Useful in tests (stub transports) or when the caller needs
    /// custom middleware (caching, rate-limiting).
    pub remote: Option<Arc<dyn RemoteCompletion>>,

    /// Regex heuristic tables. Override via [`crate::patterns::PatternLibraryBuilder`].
    pub patterns: PatternLibrary,

    /// Typographic rules for the rendered output.
    pub style: StyleConfig,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            mode: Mode::RuleBased,
            api_key: None,
            model: "claude-sonnet-4-20250514".to_string(),
            api_timeout_secs: 30,
            title_max_tokens: 256,
            sections_max_tokens: 4096,
            description_max_tokens: 300,
            title_prefix_chars: 2000,
            sections_max_chars: 15_000,
            remote: None,
            patterns: PatternLibrary::default(),
            style: StyleConfig::default(),
        }
    }
}

impl fmt::Debug for ProcessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessConfig")
            .field("mode", &self.mode)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("title_max_tokens", &self.title_max_tokens)
            .field("sections_max_tokens", &self.sections_max_tokens)
            .field("description_max_tokens", &self.description_max_tokens)
            .field("remote", &self.remote.as_ref().map(|_| "<dyn RemoteCompletion>"))
            .field("style", &self.style)
            .finish()
    }
}

impl ProcessConfig {
    /// Create a new builder for `ProcessConfig`.
    pub fn builder() -> ProcessConfigBuilder {
        ProcessConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a config with the mode derived from the environment.
    ///
    /// `ANTHROPIC_API_KEY` present and non-empty selects LLM-assisted mode;
    /// otherwise rule-based. This is the only place the library touches the
    /// environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            if !key.is_empty() {
                config.api_key = Some(key);
                config.mode = Mode::LlmAssisted;
            }
        }
        config
    }
}

/// Builder for [`ProcessConfig`].
#[derive(Debug)]
pub struct ProcessConfigBuilder {
    config: ProcessConfig,
}

impl ProcessConfigBuilder {
    /// Set the API key and switch to LLM-assisted mode.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self.config.mode = Mode::LlmAssisted;
        self
    }

    /// Force a mode regardless of credential presence.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn title_max_tokens(mut self, n: u32) -> Self {
        self.config.title_max_tokens = n.max(1);
        self
    }

    pub fn sections_max_tokens(mut self, n: u32) -> Self {
        self.config.sections_max_tokens = n.max(1);
        self
    }

    pub fn description_max_tokens(mut self, n: u32) -> Self {
        self.config.description_max_tokens = n.max(1);
        self
    }

    pub fn title_prefix_chars(mut self, n: usize) -> Self {
        self.config.title_prefix_chars = n.max(100);
        self
    }

    pub fn sections_max_chars(mut self, n: usize) -> Self {
        self.config.sections_max_chars = n.max(1000);
        self
    }

    /// Inject a pre-built remote transport (tests, middleware). Switches to
    /// LLM-assisted mode.
    pub fn remote(mut self, remote: Arc<dyn RemoteCompletion>) -> Self {
        self.config.remote = Some(remote);
        self.config.mode = Mode::LlmAssisted;
        self
    }

    pub fn patterns(mut self, patterns: PatternLibrary) -> Self {
        self.config.patterns = patterns;
        self
    }

    pub fn style(mut self, style: StyleConfig) -> Self {
        self.config.style = style;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessConfig, ProcessError> {
        let c = &self.config;
        if c.mode == Mode::LlmAssisted && c.api_key.is_none() && c.remote.is_none() {
            return Err(ProcessError::InvalidConfig(
                "LLM-assisted mode requires an API key or a remote transport".into(),
            ));
        }
        if c.model.is_empty() {
            return Err(ProcessError::InvalidConfig("Model must not be empty".into()));
        }
        Ok(self.config)
    }
}

// ── Style types ──────────────────────────────────────────────────────────

/// Typographic rules the renderer applies.
///
/// Deliberately small: page size, four margins, and per-role size/alignment.
/// Structural validation (margins vs. page dimensions, positive sizes) lives
/// in the renderer, which is where a violation becomes a
/// [`crate::error::RenderError::InvalidStyle`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleConfig {
    pub page_size: PageSize,
    pub margins: Margins,
    pub title: RoleStyle,
    pub heading: RoleStyle,
    pub abstract_body: RoleStyle,
    pub body: RoleStyle,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::Letter,
            margins: Margins::default(),
            title: RoleStyle {
                font_size: 16.0,
                alignment: Alignment::Center,
                bold: true,
            },
            heading: RoleStyle {
                font_size: 12.0,
                alignment: Alignment::Left,
                bold: true,
            },
            abstract_body: RoleStyle {
                font_size: 10.0,
                alignment: Alignment::Justify,
                bold: false,
            },
            body: RoleStyle {
                font_size: 10.0,
                alignment: Alignment::Justify,
                bold: false,
            },
        }
    }
}

/// Output page dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSize {
    /// US Letter, 612 × 792 pt. (default)
    #[default]
    Letter,
    /// ISO A4, 595 × 842 pt.
    A4,
}

impl PageSize {
    /// (width, height) in PDF points.
    pub fn dimensions(self) -> (f32, f32) {
        match self {
            PageSize::Letter => (612.0, 792.0),
            PageSize::A4 => (595.0, 842.0),
        }
    }
}

/// Page margins in PDF points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Default for Margins {
    fn default() -> Self {
        // One inch on three sides, a tighter bottom margin for body flow.
        Self {
            top: 72.0,
            right: 72.0,
            bottom: 18.0,
            left: 72.0,
        }
    }
}

/// Font size and alignment for one text role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoleStyle {
    pub font_size: f32,
    pub alignment: Alignment,
    pub bold: bool,
}

/// Horizontal alignment for a text role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    Left,
    Center,
    /// Full justification via word-spacing; the last line of a paragraph
    /// stays left-aligned.
    Justify,
}
