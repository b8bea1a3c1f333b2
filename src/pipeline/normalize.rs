//! Content normalization: deterministic cleanup of the body text.
//!
//! ## Order of operations
//!
//! The three passes must run in exactly this order, because the first two
//! are positional and the third changes offsets freely:
//!
//! 1. Replace equation spans with their descriptions — spans were computed
//!    once up front (non-overlapping, sorted), so a single left-to-right
//!    pass substitutes all of them without offset drift. Re-scanning after
//!    each edit is the classic latent bug here; this module never does it.
//! 2. Insert table descriptions — anchored after the first "Table N"
//!    reference in the text, appended at the end when no reference exists
//!    (the original table position is only known by page/order, a documented
//!    approximation). Insertion points are all computed before any text is
//!    built.
//! 3. Strip URLs, DOIs and email addresses, then collapse the whitespace
//!    the removals leave behind (runs of spaces to one space, 3+ newlines
//!    to a blank line, trailing whitespace per line).
//!
//! Each pass is a pure `&str → String` function with no shared state, and
//! the full pipeline is idempotent on already-clean text.

use std::ops::Range;

use crate::patterns::PatternLibrary;

/// Apply the full normalization pipeline.
///
/// `equations` pairs each span (byte range into `text`) with its
/// description; spans must be sorted and non-overlapping, which is what
/// [`crate::pipeline::heuristics::find_equation_spans`] produces.
/// `table_descriptions` is in table order; entry `i` describes table `i + 1`
/// as referenced in the text ("Table 1" is the first table).
pub fn normalize(
    text: &str,
    equations: &[(Range<usize>, String)],
    table_descriptions: &[String],
    patterns: &PatternLibrary,
) -> String {
    let s = replace_equation_spans(text, equations);
    let s = insert_table_descriptions(&s, table_descriptions, patterns);
    let s = strip_identifiers(&s, patterns);
    collapse_whitespace(&s, patterns)
}

// ── Pass 1: equation spans ───────────────────────────────────────────────

/// Substitute precomputed spans in one left-to-right pass.
fn replace_equation_spans(text: &str, equations: &[(Range<usize>, String)]) -> String {
    if equations.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (span, description) in equations {
        // Spans are sorted and non-overlapping; anything else is a caller
        // bug we'd rather surface in tests than silently garble.
        debug_assert!(span.start >= cursor && span.end <= text.len());
        out.push_str(&text[cursor..span.start]);
        out.push_str(description);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

// ── Pass 2: table descriptions ───────────────────────────────────────────

/// Insert each table description as its own bracketed paragraph.
///
/// All insertion points are resolved against the input before any output is
/// built, then applied in one ascending pass — later insertions can never
/// shift earlier anchors.
fn insert_table_descriptions(
    text: &str,
    descriptions: &[String],
    patterns: &PatternLibrary,
) -> String {
    // (position, paragraph) pairs; usize::MAX means "append at the end".
    let mut insertions: Vec<(usize, String)> = Vec::new();

    for (i, description) in descriptions.iter().enumerate() {
        if description.is_empty() {
            continue;
        }
        let n = i + 1;
        let paragraph = format!("\n\n[Table {n}: {description}]\n\n");
        match patterns.table_reference(n).find(text) {
            Some(m) => insertions.push((m.end(), paragraph)),
            None => insertions.push((usize::MAX, paragraph)),
        }
    }

    if insertions.is_empty() {
        return text.to_string();
    }
    insertions.sort_by_key(|(pos, _)| *pos);

    let mut out = String::with_capacity(text.len() + 256);
    let mut cursor = 0;
    for (pos, paragraph) in &insertions {
        let pos = (*pos).min(text.len());
        out.push_str(&text[cursor..pos]);
        out.push_str(paragraph);
        cursor = pos;
    }
    out.push_str(&text[cursor..]);
    out
}

// ── Pass 3: identifier stripping + whitespace collapse ───────────────────

fn strip_identifiers(text: &str, patterns: &PatternLibrary) -> String {
    let s = patterns.url_re.replace_all(text, "");
    let s = patterns.www_re.replace_all(&s, "");
    let s = patterns.doi_re.replace_all(&s, "");
    let s = patterns.email_re.replace_all(&s, "");
    s.into_owned()
}

fn collapse_whitespace(text: &str, patterns: &PatternLibrary) -> String {
    let s = patterns.multi_space_re.replace_all(text, " ");
    let s = patterns.blank_lines_re.replace_all(&s, "\n\n");
    let s: String = s
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::heuristics::{describe_equation, find_equation_spans};

    fn lib() -> PatternLibrary {
        PatternLibrary::default()
    }

    fn normalize_plain(text: &str) -> String {
        normalize(text, &[], &[], &lib())
    }

    #[test]
    fn url_removed_and_spacing_collapsed() {
        let out = normalize_plain("Visit https://example.com/paper for details.");
        assert_eq!(out, "Visit for details.");
    }

    #[test]
    fn no_url_survives_normalization() {
        let inputs = [
            "plain http://a.b/c text",
            "secure https://a.b/c?d=e#f text",
            "bare www.example.org/path text",
        ];
        let url_re = &lib().url_re;
        let www_re = &lib().www_re;
        for input in inputs {
            let out = normalize_plain(input);
            assert!(!url_re.is_match(&out), "url survived in: {out}");
            assert!(!www_re.is_match(&out), "www survived in: {out}");
        }
    }

    #[test]
    fn doi_and_email_removed() {
        let out = normalize_plain("See doi:10.1234/xyz or mail jane@univ.edu now.");
        assert!(!out.contains("10.1234"));
        assert!(!out.contains("@"));
        assert!(out.contains("See"));
        assert!(out.contains("now."));
    }

    #[test]
    fn idempotent_on_clean_text() {
        let clean = normalize_plain("Some already clean text.\n\nWith two paragraphs.");
        assert_eq!(normalize_plain(&clean), clean);
    }

    #[test]
    fn equation_spans_replaced_in_one_pass() {
        let text = "a $x$ b $$y + z$$ c";
        let spans = find_equation_spans(text, &lib());
        let equations: Vec<_> = spans
            .into_iter()
            .map(|s| {
                let desc = describe_equation(&text[s.clone()]);
                (s, desc)
            })
            .collect();
        let out = normalize(text, &equations, &[], &lib());
        assert_eq!(out, "a [Equation: x] b [Equation: y + z] c");
    }

    #[test]
    fn no_delimiter_survives_after_replacement() {
        let text = "intro $a$ then $$b$$ and \\begin{equation}c\\end{equation} done";
        let spans = find_equation_spans(text, &lib());
        let equations: Vec<_> = spans
            .into_iter()
            .map(|s| (s.clone(), describe_equation(&text[s])))
            .collect();
        let out = normalize(text, &equations, &[], &lib());
        assert!(!out.contains('$'));
        assert!(!out.contains("\\begin"));
    }

    #[test]
    fn table_description_inserted_after_reference() {
        let text = "Results are in Table 1 below.\nMore prose.";
        let out = normalize(text, &[], &["Table with 3 rows and 2 columns.".into()], &lib());
        let ref_pos = out.find("Table 1 ").unwrap();
        let desc_pos = out.find("[Table 1: Table with 3 rows").unwrap();
        assert!(desc_pos > ref_pos);
    }

    #[test]
    fn unreferenced_table_appended_at_end() {
        let text = "No reference to any table here.";
        let out = normalize(text, &[], &["A 2 by 2 grid.".into()], &lib());
        assert!(out.ends_with("[Table 1: A 2 by 2 grid.]"));
    }

    #[test]
    fn empty_table_description_skipped() {
        let text = "Prose only.";
        let out = normalize(text, &[], &[String::new()], &lib());
        assert_eq!(out, "Prose only.");
    }

    #[test]
    fn blank_lines_collapse_to_one() {
        let out = normalize_plain("para one\n\n\n\n\npara two");
        assert_eq!(out, "para one\n\npara two");
    }

    #[test]
    fn two_tables_insert_in_ascending_order() {
        let text = "First see Table 2 and then Table 1 in the text.";
        let out = normalize(
            text,
            &[],
            &["first grid.".into(), "second grid.".into()],
            &lib(),
        );
        // Table 2's description anchors earlier in the text than Table 1's;
        // both must land after their own references.
        let t2_ref = out.find("Table 2 ").unwrap();
        let t2_desc = out.find("[Table 2: second grid.]").unwrap();
        let t1_desc = out.find("[Table 1: first grid.]").unwrap();
        assert!(t2_desc > t2_ref);
        assert!(t1_desc > t2_desc);
    }
}
