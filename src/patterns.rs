//! Pattern library: every regex heuristic used by the pipeline, in one place.
//!
//! Keeping the patterns in a table separate from the control flow that
//! applies them serves two purposes:
//!
//! 1. **Independent testability** — each pattern can be exercised directly
//!    without running the extraction pipeline around it.
//! 2. **External configurability** — callers with unusual corpora (e.g.
//!    non-English heading conventions) can override individual patterns via
//!    [`PatternLibraryBuilder`] without forking the heuristics.
//!
//! All regex fields hold compiled [`Regex`] values; the builder accepts
//! string patterns and fails fast with `regex::Error` on invalid input.

use once_cell::sync::Lazy;
use regex::Regex;

// ── Default patterns ─────────────────────────────────────────────────────

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s<>]+").unwrap());

static WWW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bwww\.[^\s<>]+").unwrap());

// Bare DOIs plus the `doi:`-prefixed form used in reference lists.
static DOI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bdoi:\s*\S+|\b10\.\d{4,9}/\S+").unwrap());

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap());

// Numbered heading: "1. Introduction", "2.3 Results", "4 Discussion".
static NUMBERED_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+)*\.?\s+[A-Z].*").unwrap());

// Title-case heading: every word capitalized except short connectives.
// Length limits are enforced by the classifier, not the pattern.
static TITLE_CASE_HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z][A-Za-z'\-]*(?:\s+(?:[A-Z][A-Za-z'\-]*|of|and|the|in|on|for|to|a|an|with))*$")
        .unwrap()
});

// Abstract marker as a heading-like token anchored at line start; tolerates
// "Abstract", "ABSTRACT:", "Abstract—" and same-line abstract bodies.
// Mid-sentence uses of the word never match.
static ABSTRACT_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*abstract\b[ \t]*[:.\u{2014}]?[ \t]*").unwrap());

static KEYWORDS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*keywords?\b").unwrap());

static INTRODUCTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:\d+\s*\.?\s*)?introduction\b").unwrap());

// Figure/table caption lines are never section headings.
static CAPTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:figure|fig\.?|table)\s+\d").unwrap());

// Equation delimiters. Display math is matched before inline math so that
// `$$…$$` is never split into two empty `$…$` spans (longest-match-first).
static DISPLAY_MATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\$\$.+?\$\$").unwrap());

static INLINE_MATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$[^$\n]+\$").unwrap());

static LATEX_ENV_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)\\begin\{(?:equation|align|eqnarray)\*?\}.*?\\end\{(?:equation|align|eqnarray)\*?\}",
    )
    .unwrap()
});

// Lines the title scanner skips outright: running headers, identifiers,
// page furniture, front-matter metadata.
static DEFAULT_TITLE_NOISE: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^\d+$").unwrap(),
        Regex::new(r"(?i)copyright|©|\(c\)\s*\d{4}").unwrap(),
        Regex::new(r"(?i)arxiv|issn|isbn|preprint|proceedings|journal|\bvol\b|volume").unwrap(),
        Regex::new(r"(?i)doi:|https?://|www\.|@").unwrap(),
        Regex::new(r"\b(?:19|20)\d{2}\b").unwrap(),
        Regex::new(r"(?i)\bpage\b|\bpp\.\s*\d").unwrap(),
        Regex::new(r"(?i)\babstract\b|author|university|department|institute|received|accepted|published|editor").unwrap(),
    ]
});

static MULTI_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());

static BLANK_LINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

// ── Library ──────────────────────────────────────────────────────────────

/// Controls how a list of patterns is overridden from its defaults.
#[derive(Debug, Clone, Default)]
pub enum ListOverride<T> {
    /// Use the built-in defaults.
    #[default]
    Default,
    /// Completely replace the defaults with these values.
    Replace(Vec<T>),
    /// Append these values to the defaults.
    Extend(Vec<T>),
}

/// Compiled regex tables driving the heuristics and the normalizer.
///
/// Construct with [`PatternLibrary::default()`] or override individual
/// patterns through [`PatternLibraryBuilder`].
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    pub(crate) url_re: Regex,
    pub(crate) www_re: Regex,
    pub(crate) doi_re: Regex,
    pub(crate) email_re: Regex,
    pub(crate) numbered_heading_re: Regex,
    pub(crate) title_case_heading_re: Regex,
    pub(crate) abstract_marker_re: Regex,
    pub(crate) keywords_re: Regex,
    pub(crate) introduction_re: Regex,
    pub(crate) caption_re: Regex,
    pub(crate) display_math_re: Regex,
    pub(crate) inline_math_re: Regex,
    pub(crate) latex_env_re: Regex,
    pub(crate) title_noise: Vec<Regex>,
    pub(crate) multi_space_re: Regex,
    pub(crate) blank_lines_re: Regex,
}

impl Default for PatternLibrary {
    fn default() -> Self {
        Self {
            url_re: URL_RE.clone(),
            www_re: WWW_RE.clone(),
            doi_re: DOI_RE.clone(),
            email_re: EMAIL_RE.clone(),
            numbered_heading_re: NUMBERED_HEADING_RE.clone(),
            title_case_heading_re: TITLE_CASE_HEADING_RE.clone(),
            abstract_marker_re: ABSTRACT_MARKER_RE.clone(),
            keywords_re: KEYWORDS_RE.clone(),
            introduction_re: INTRODUCTION_RE.clone(),
            caption_re: CAPTION_RE.clone(),
            display_math_re: DISPLAY_MATH_RE.clone(),
            inline_math_re: INLINE_MATH_RE.clone(),
            latex_env_re: LATEX_ENV_RE.clone(),
            title_noise: DEFAULT_TITLE_NOISE.clone(),
            multi_space_re: MULTI_SPACE_RE.clone(),
            blank_lines_re: BLANK_LINES_RE.clone(),
        }
    }
}

impl PatternLibrary {
    /// Regex matching a textual reference to table `n` (1-indexed), e.g.
    /// "Table 3". Used to anchor table-description insertion.
    pub(crate) fn table_reference(&self, n: usize) -> Regex {
        // n is a number, never regex metacharacters; the pattern is valid
        // for every usize.
        Regex::new(&format!(r"(?i)\btable\s+{n}\b")).unwrap()
    }
}

/// Builder for [`PatternLibrary`].
///
/// Accepts string patterns, compiled in [`build()`](Self::build); fails fast
/// with `regex::Error` if any pattern is invalid.
#[derive(Debug, Clone, Default)]
pub struct PatternLibraryBuilder {
    url: Option<String>,
    doi: Option<String>,
    email: Option<String>,
    numbered_heading: Option<String>,
    title_case_heading: Option<String>,
    abstract_marker: Option<String>,
    caption: Option<String>,
    title_noise: ListOverride<String>,
}

impl PatternLibraryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url_regex(mut self, pattern: &str) -> Self {
        self.url = Some(pattern.to_string());
        self
    }

    pub fn doi_regex(mut self, pattern: &str) -> Self {
        self.doi = Some(pattern.to_string());
        self
    }

    pub fn email_regex(mut self, pattern: &str) -> Self {
        self.email = Some(pattern.to_string());
        self
    }

    pub fn numbered_heading_regex(mut self, pattern: &str) -> Self {
        self.numbered_heading = Some(pattern.to_string());
        self
    }

    pub fn title_case_heading_regex(mut self, pattern: &str) -> Self {
        self.title_case_heading = Some(pattern.to_string());
        self
    }

    pub fn abstract_marker_regex(mut self, pattern: &str) -> Self {
        self.abstract_marker = Some(pattern.to_string());
        self
    }

    pub fn caption_regex(mut self, pattern: &str) -> Self {
        self.caption = Some(pattern.to_string());
        self
    }

    /// Replace the title-noise pattern list entirely.
    pub fn set_title_noise_patterns(mut self, patterns: Vec<String>) -> Self {
        self.title_noise = ListOverride::Replace(patterns);
        self
    }

    /// Append one pattern to the default title-noise list.
    pub fn add_title_noise_pattern(mut self, pattern: String) -> Self {
        match &mut self.title_noise {
            ListOverride::Extend(v) => v.push(pattern),
            _ => self.title_noise = ListOverride::Extend(vec![pattern]),
        }
        self
    }

    /// Compile all string patterns and produce a [`PatternLibrary`].
    pub fn build(self) -> Result<PatternLibrary, regex::Error> {
        let compile = |opt: Option<String>, default: &Regex| -> Result<Regex, regex::Error> {
            match opt {
                Some(p) => Regex::new(&p),
                None => Ok(default.clone()),
            }
        };

        let title_noise = match &self.title_noise {
            ListOverride::Default => DEFAULT_TITLE_NOISE.clone(),
            ListOverride::Replace(patterns) => patterns
                .iter()
                .map(|p| Regex::new(p))
                .collect::<Result<Vec<_>, _>>()?,
            ListOverride::Extend(patterns) => {
                let mut compiled = DEFAULT_TITLE_NOISE.clone();
                for p in patterns {
                    compiled.push(Regex::new(p)?);
                }
                compiled
            }
        };

        Ok(PatternLibrary {
            url_re: compile(self.url, &URL_RE)?,
            www_re: WWW_RE.clone(),
            doi_re: compile(self.doi, &DOI_RE)?,
            email_re: compile(self.email, &EMAIL_RE)?,
            numbered_heading_re: compile(self.numbered_heading, &NUMBERED_HEADING_RE)?,
            title_case_heading_re: compile(self.title_case_heading, &TITLE_CASE_HEADING_RE)?,
            abstract_marker_re: compile(self.abstract_marker, &ABSTRACT_MARKER_RE)?,
            keywords_re: KEYWORDS_RE.clone(),
            introduction_re: INTRODUCTION_RE.clone(),
            caption_re: compile(self.caption, &CAPTION_RE)?,
            display_math_re: DISPLAY_MATH_RE.clone(),
            inline_math_re: INLINE_MATH_RE.clone(),
            latex_env_re: LATEX_ENV_RE.clone(),
            title_noise,
            multi_space_re: MULTI_SPACE_RE.clone(),
            blank_lines_re: BLANK_LINES_RE.clone(),
        })
    }
}
