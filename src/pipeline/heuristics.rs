//! Rule-based extraction heuristics.
//!
//! Every function here is pure: text in, structure out, no I/O and no
//! network. They are the default implementations in rule-based mode and the
//! mandatory fallback targets in LLM-assisted mode, so they must never fail
//! — degenerate inputs produce degenerate (but valid) outputs, e.g. an empty
//! title for empty text.
//!
//! The regexes applied here all come from the injected
//! [`PatternLibrary`](crate::patterns::PatternLibrary) so they can be tested
//! and overridden independently of this control flow.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

use crate::document::{RawTable, Section};
use crate::patterns::PatternLibrary;

/// Hard cap on abstract length when no boundary heading follows the marker.
pub(crate) const ABSTRACT_MAX_CHARS: usize = 2000;

/// How many lines from the top the title scanner considers.
const TITLE_SCAN_LINES: usize = 15;

/// Plausible title length band, in characters.
const TITLE_MIN_CHARS: usize = 3;
const TITLE_MAX_CHARS: usize = 300;

/// Upper bound on heading line length for every heading shape.
const HEADING_MAX_CHARS: usize = 80;

/// Maximum word count for a title-case heading line.
const TITLE_CASE_MAX_WORDS: usize = 6;

static NUMBER_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(\.\d+)*\.?\s+").unwrap());

// ── Title ────────────────────────────────────────────────────────────────

/// Extract the paper title from the top of the text.
///
/// Scans the first few lines, skipping blanks, noise lines (page furniture,
/// identifiers, front-matter metadata) and recognized section headings, and
/// returns the first line inside the plausible length band with trailing
/// punctuation trimmed.
///
/// Empty input yields an empty title — not an error. Titles spanning
/// multiple physical lines are not reassembled here; only the LLM path can
/// recover those.
pub fn extract_title(text: &str, patterns: &PatternLibrary) -> String {
    let lines: Vec<&str> = text.lines().collect();

    for line in lines.iter().take(TITLE_SCAN_LINES) {
        let line = line.trim();
        if line.len() < TITLE_MIN_CHARS || line.len() > TITLE_MAX_CHARS {
            continue;
        }
        if patterns.title_noise.iter().any(|re| re.is_match(line)) {
            continue;
        }
        // A heading line is body structure, not a title. `followed_by_blank`
        // is irrelevant for this check, so pass false (the title-case shape
        // never fires).
        if classify_heading(line, false, patterns).is_some() {
            continue;
        }
        return line.trim_end_matches(['.', ',', ';', ':']).to_string();
    }

    // Fallback: the longest early line, which in noisy front matter is most
    // often the typeset title.
    let longest = lines
        .iter()
        .take(5)
        .map(|l| l.trim())
        .max_by_key(|l| l.len())
        .unwrap_or("");
    if longest.len() > TITLE_MIN_CHARS {
        return longest.trim_end_matches(['.', ',', ';', ':']).to_string();
    }

    // Last resort: first non-empty line, so the title is non-empty whenever
    // the input is.
    lines
        .iter()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .to_string()
}

// ── Abstract / front matter ──────────────────────────────────────────────

/// Byte span of the abstract within the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AbstractSpan {
    /// Start of the "Abstract" marker itself.
    pub marker_start: usize,
    /// First byte after the marker (start of the abstract body).
    pub body_start: usize,
    /// End of the abstract body.
    pub body_end: usize,
}

/// Locate the abstract marker and body bounds.
///
/// The body runs from just after the marker to the first subsequent line
/// that reads as a body-section boundary (a heading of any shape, an
/// "Introduction", or a "Keywords" line), or to [`ABSTRACT_MAX_CHARS`] when
/// no boundary exists. Returns `None` when there is no standalone
/// "Abstract" marker — a valid outcome, not every paper has one.
pub(crate) fn find_abstract_span(text: &str, patterns: &PatternLibrary) -> Option<AbstractSpan> {
    let marker = patterns.abstract_marker_re.find(text)?;
    let body_start = marker.end();
    let rest = &text[body_start..];

    let mut body_end = None;
    let mut offset = 0;
    let lines: Vec<&str> = rest.split('\n').collect();
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if !trimmed.is_empty() && offset > 0 {
            let followed_by_blank = lines
                .get(i + 1)
                .map(|next| next.trim().is_empty())
                .unwrap_or(true);
            if patterns.keywords_re.is_match(trimmed)
                || patterns.introduction_re.is_match(trimmed)
                || classify_heading(trimmed, followed_by_blank, patterns).is_some()
            {
                body_end = Some(body_start + offset);
                break;
            }
        }
        offset += line.len() + 1; // +1 for the split newline
    }

    let body_end = body_end.unwrap_or_else(|| {
        let mut cap = (body_start + ABSTRACT_MAX_CHARS).min(text.len());
        while !text.is_char_boundary(cap) {
            cap -= 1;
        }
        cap
    });

    Some(AbstractSpan {
        marker_start: marker.start(),
        body_start,
        body_end,
    })
}

/// Extract the abstract body text.
///
/// The "Abstract" heading token is consumed by the marker match and never
/// appears in the returned text. No marker → empty string.
pub fn extract_abstract(text: &str, patterns: &PatternLibrary) -> String {
    match find_abstract_span(text, patterns) {
        Some(span) => text[span.body_start..span.body_end].trim().to_string(),
        None => String::new(),
    }
}

/// Delete everything before the abstract marker (authors, affiliations,
/// running headers).
///
/// When no abstract marker exists the input is returned unchanged —
/// front-matter removal is skippable, never destructive by default.
pub fn remove_before_abstract<'a>(text: &'a str, patterns: &PatternLibrary) -> &'a str {
    match find_abstract_span(text, patterns) {
        Some(span) => &text[span.marker_start..],
        None => text,
    }
}

// ── Section parsing ──────────────────────────────────────────────────────

/// Classify a line as a section heading, returning the normalized heading
/// text.
///
/// Three shapes, tried in priority order (first match wins):
///
/// 1. numbered — `1. Introduction`, `2.3 Results`; the numeric prefix is
///    stripped from the returned heading
/// 2. all-caps — short uppercase line without a terminal period
/// 3. title-case — short capitalized line, only when followed by a blank line
///
/// Numbered beats all-caps on lines matching both (the more specific
/// signal). Figure/table caption lines and abstract markers are never
/// headings.
pub(crate) fn classify_heading(
    line: &str,
    followed_by_blank: bool,
    patterns: &PatternLibrary,
) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.len() > HEADING_MAX_CHARS {
        return None;
    }
    if patterns.caption_re.is_match(line) {
        return None;
    }
    // The abstract marker is handled by the front-matter stage; letting it
    // through here would turn the abstract into a body section.
    if patterns.abstract_marker_re.is_match(line) {
        return None;
    }

    if patterns.numbered_heading_re.is_match(line) {
        return Some(NUMBER_PREFIX_RE.replace(line, "").trim().to_string());
    }

    if is_all_caps_heading(line) {
        return Some(line.to_string());
    }

    if followed_by_blank
        && !line.ends_with('.')
        && line.split_whitespace().count() <= TITLE_CASE_MAX_WORDS
        && patterns.title_case_heading_re.is_match(line)
    {
        return Some(line.to_string());
    }

    None
}

fn is_all_caps_heading(line: &str) -> bool {
    let alpha = line.chars().filter(|c| c.is_alphabetic()).count();
    alpha >= 3
        && line.len() <= 60
        && !line.ends_with('.')
        && !line.chars().any(|c| c.is_lowercase())
}

/// Parse cleaned body text into sections with a single forward pass.
///
/// Body lines attach to the currently open section; lines before the first
/// heading are dropped. Consecutive headings with identical text are NOT
/// merged — duplicates become separate sections.
pub fn parse_sections(text: &str, patterns: &PatternLibrary) -> Vec<Section> {
    let lines: Vec<&str> = text.lines().collect();
    let mut sections: Vec<Section> = Vec::new();
    let mut open: Option<(String, String)> = None;

    for (i, line) in lines.iter().enumerate() {
        let followed_by_blank = lines
            .get(i + 1)
            .map(|next| next.trim().is_empty())
            .unwrap_or(true);

        if let Some(heading) = classify_heading(line, followed_by_blank, patterns) {
            if let Some((h, c)) = open.take() {
                sections.push(Section::new(h, c.trim()));
            }
            open = Some((heading, String::new()));
        } else if let Some((_, content)) = open.as_mut() {
            content.push_str(line);
            content.push('\n');
        }
        // No open section yet: text between abstract and first heading is
        // dropped.
    }

    if let Some((h, c)) = open.take() {
        sections.push(Section::new(h, c.trim()));
    }
    sections
}

// ── Tables ───────────────────────────────────────────────────────────────

/// Rule-based table description.
///
/// States row count, column count and, when the first row looks like a
/// header (no purely-numeric cells), the header cell values plus a sample of
/// the first data row. Cell semantics are never interpreted.
///
/// Row-count convention: **total rows, header included** — a grid with a
/// header row and two data rows reports "3 rows".
pub fn describe_table(table: &RawTable) -> String {
    if table.rows.is_empty() {
        return String::new();
    }

    let rows = table.rows.len();
    let cols = table.column_count();
    let mut description = format!("Table with {rows} rows and {cols} columns.");

    let header = &table.rows[0];
    if looks_like_header(header) {
        let header_text: Vec<&str> = header
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        if !header_text.is_empty() {
            description.push_str(&format!(" Columns include: {}.", header_text.join(", ")));
        }
    }

    if table.rows.len() > 1 {
        let sample: Vec<&str> = table.rows[1]
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .take(3)
            .collect();
        if !sample.is_empty() {
            description.push_str(&format!(" Sample data: {}.", sample.join(", ")));
        }
    }

    description
}

/// A row is a header when none of its non-empty cells is purely numeric.
fn looks_like_header(row: &[String]) -> bool {
    let mut saw_cell = false;
    for cell in row {
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        saw_cell = true;
        if cell.parse::<f64>().is_ok() {
            return false;
        }
    }
    saw_cell
}

// ── Equations ────────────────────────────────────────────────────────────

/// Find all equation spans in the text: `$$…$$`, `$…$` and LaTeX
/// environments.
///
/// Spans are computed once, non-overlapping, with the more specific
/// delimiters taking precedence (environment > display > inline) so that
/// `$$…$$` is never split into two empty inline spans. The returned spans
/// are sorted by start offset — callers substitute them in a single
/// left-to-right pass.
pub fn find_equation_spans(text: &str, patterns: &PatternLibrary) -> Vec<Range<usize>> {
    let mut accepted: Vec<Range<usize>> = Vec::new();

    for re in [
        &patterns.latex_env_re,
        &patterns.display_math_re,
        &patterns.inline_math_re,
    ] {
        for m in re.find_iter(text) {
            let candidate = m.start()..m.end();
            let overlaps = accepted
                .iter()
                .any(|r| candidate.start < r.end && r.start < candidate.end);
            if !overlaps {
                accepted.push(candidate);
            }
        }
    }

    accepted.sort_by_key(|r| r.start);
    accepted
}

/// Rule-based equation description: a verbatim-preserving placeholder, not
/// an interpretation.
///
/// Delimiters are stripped and interior whitespace collapsed:
/// `$E = mc^2$` → `[Equation: E = mc^2]`.
pub fn describe_equation(raw_span: &str) -> String {
    let inner = strip_equation_delimiters(raw_span);
    let collapsed = inner.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("[Equation: {collapsed}]")
}

static ENV_DELIM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(?:begin|end)\{(?:equation|align|eqnarray)\*?\}").unwrap()
});

fn strip_equation_delimiters(raw: &str) -> String {
    let s = ENV_DELIM_RE.replace_all(raw, "");
    s.trim().trim_matches('$').to_string()
}
