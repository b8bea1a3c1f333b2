//! Instruction prompts for LLM-assisted extraction.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — tweaking how sections are requested or
//!    how tables are summarised requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without a
//!    live API, making prompt regressions easy to catch.
//!
//! Each prompt corresponds to one extraction call type; the engine pairs it
//! with the matching token budget from [`crate::config::ProcessConfig`].

/// Title extraction: the model sees a bounded prefix of the document.
pub const TITLE_PROMPT: &str = "Extract ONLY the title of this academic paper. \
Return just the title text, nothing else.\n\nPaper excerpt:\n";

/// Section parsing: the model returns a JSON array of heading/content pairs.
///
/// The engine extracts the first JSON array from the response, so prose
/// around the array is tolerated; a response with no parseable array falls
/// back to the rule-based parser.
pub const SECTIONS_PROMPT: &str = "Parse this academic paper into sections. For each \
section, extract the heading and content.\n\
Return ONLY a JSON array with format: \
[{\"heading\": \"Section Name\", \"content\": \"Section text...\"}]\n\n\
Paper text:\n";

/// Table description: one flowing paragraph, no markup.
pub const TABLE_PROMPT: &str = "Describe this table in ONE comprehensive paragraph. Include:\n\
- What type of data the table contains\n\
- The main columns and what they represent\n\
- Key findings or patterns in the data\n\n\
Keep it to one flowing paragraph. Do not use bullet points or multiple paragraphs.\n\n\
Table data:\n";

/// Equation description: plain-language paraphrase, no math notation.
pub const EQUATION_PROMPT: &str = "Describe this mathematical equation or formula in ONE \
clear paragraph. Explain what it represents, what each variable means, and what it is \
used for. Keep it to one flowing paragraph in plain English. Do not use mathematical \
notation in your description.\n\nEquation: ";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_prompt_requests_json_array() {
        assert!(SECTIONS_PROMPT.contains("JSON array"));
        assert!(SECTIONS_PROMPT.contains("\"heading\""));
    }

    #[test]
    fn prompts_end_ready_for_payload() {
        // Each prompt is concatenated directly with the payload text.
        assert!(TITLE_PROMPT.ends_with('\n'));
        assert!(SECTIONS_PROMPT.ends_with('\n'));
        assert!(TABLE_PROMPT.ends_with('\n'));
        assert!(EQUATION_PROMPT.ends_with(' '));
    }
}
