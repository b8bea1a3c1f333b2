//! Document rendering: the second collaborator boundary.
//!
//! Takes the final [`ExtractedDocument`] plus a [`StyleConfig`] and emits
//! PDF bytes through `lopdf`. Fixed typographic rules per role: the title
//! is centered, headings sit flush left, body text is justified by
//! distributing leftover line width over word gaps (`Tw`). Only the two
//! built-in Helvetica faces are used, so no font data is embedded and no
//! image data ever enters the output.
//!
//! Text measurement uses approximate Helvetica metrics (a coarse per-char
//! width table). That is enough for wrapping and justification of plain
//! descriptive text; it does not try to be typographically exact.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

use crate::config::{Alignment, RoleStyle, StyleConfig};
use crate::document::ExtractedDocument;
use crate::error::RenderError;

/// Line height as a multiple of the font size.
const LEADING_FACTOR: f32 = 1.4;

/// Vertical gap after a paragraph, as a multiple of the font size.
const PARAGRAPH_GAP_FACTOR: f32 = 0.6;

/// Vertical gap after the title block, in points.
const TITLE_GAP: f32 = 24.0;

/// Cap on justification stretch: gaps wider than this multiple of the font
/// size read as holes, so such lines fall back to left alignment.
const MAX_JUSTIFY_STRETCH: f32 = 3.0;

/// Render the document to PDF bytes.
///
/// Zero sections is a valid degenerate input — the output is then a
/// title/abstract-only document, never an error.
pub fn render(document: &ExtractedDocument, style: &StyleConfig) -> Result<Vec<u8>, RenderError> {
    validate_style(style)?;

    let mut composer = PageComposer::new(style);

    if !document.title.is_empty() {
        composer.paragraph(&document.title, &style.title);
        composer.gap(TITLE_GAP);
    }

    if !document.abstract_text.is_empty() {
        composer.paragraph("Abstract", &style.heading);
        for para in paragraphs(&document.abstract_text) {
            composer.paragraph(para, &style.abstract_body);
        }
    }

    for section in &document.sections {
        if !section.heading.is_empty() {
            composer.paragraph(&section.heading, &style.heading);
        }
        for para in paragraphs(&section.content) {
            composer.paragraph(para, &style.body);
        }
    }

    assemble(composer.finish(), style)
}

fn validate_style(style: &StyleConfig) -> Result<(), RenderError> {
    let (width, height) = style.page_size.dimensions();
    let m = &style.margins;
    if m.left < 0.0 || m.right < 0.0 || m.top < 0.0 || m.bottom < 0.0 {
        return Err(RenderError::InvalidStyle("negative margin".into()));
    }
    if m.left + m.right >= width - 50.0 {
        return Err(RenderError::InvalidStyle(format!(
            "horizontal margins ({} + {}) leave no usable width on a {width}pt page",
            m.left, m.right
        )));
    }
    if m.top + m.bottom >= height - 50.0 {
        return Err(RenderError::InvalidStyle(format!(
            "vertical margins ({} + {}) leave no usable height on a {height}pt page",
            m.top, m.bottom
        )));
    }
    for role in [
        &style.title,
        &style.heading,
        &style.abstract_body,
        &style.body,
    ] {
        if role.font_size <= 0.0 || role.font_size > 200.0 {
            return Err(RenderError::InvalidStyle(format!(
                "font size {} out of range",
                role.font_size
            )));
        }
    }
    Ok(())
}

/// Split section content into paragraphs on blank lines.
fn paragraphs(content: &str) -> impl Iterator<Item = &str> {
    content.split("\n\n").map(str::trim).filter(|p| !p.is_empty())
}

// ── Page composition ─────────────────────────────────────────────────────

struct PageComposer<'a> {
    style: &'a StyleConfig,
    pages: Vec<Vec<Operation>>,
    ops: Vec<Operation>,
    y: f32,
}

impl<'a> PageComposer<'a> {
    fn new(style: &'a StyleConfig) -> Self {
        let (_, height) = style.page_size.dimensions();
        Self {
            style,
            pages: Vec::new(),
            ops: Vec::new(),
            y: height - style.margins.top,
        }
    }

    fn usable_width(&self) -> f32 {
        let (width, _) = self.style.page_size.dimensions();
        width - self.style.margins.left - self.style.margins.right
    }

    fn break_page(&mut self) {
        let (_, height) = self.style.page_size.dimensions();
        self.pages.push(std::mem::take(&mut self.ops));
        self.y = height - self.style.margins.top;
    }

    fn ensure_room(&mut self, needed: f32) {
        if !self.ops.is_empty() && self.y - needed < self.style.margins.bottom {
            self.break_page();
        }
    }

    fn gap(&mut self, points: f32) {
        self.y -= points;
    }

    /// Lay out one paragraph: wrap, align, emit text operations.
    fn paragraph(&mut self, text: &str, role: &RoleStyle) {
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return;
        }

        let leading = role.font_size * LEADING_FACTOR;
        let lines = wrap(&text, role, self.usable_width());
        let last = lines.len() - 1;

        for (i, line) in lines.iter().enumerate() {
            self.ensure_room(leading);
            self.y -= leading;

            let line_width = measure(line, role);
            let slack = self.usable_width() - line_width;
            let gaps = line.matches(' ').count();

            let (x, word_spacing) = match role.alignment {
                Alignment::Left => (self.style.margins.left, 0.0),
                Alignment::Center => (self.style.margins.left + (slack.max(0.0)) / 2.0, 0.0),
                Alignment::Justify => {
                    // The last line of a paragraph stays ragged.
                    if i == last || gaps == 0 {
                        (self.style.margins.left, 0.0)
                    } else {
                        let extra = slack / gaps as f32;
                        if extra > role.font_size * MAX_JUSTIFY_STRETCH {
                            (self.style.margins.left, 0.0)
                        } else {
                            (self.style.margins.left, extra)
                        }
                    }
                }
            };

            let font = if role.bold { "F2" } else { "F1" };
            self.ops.push(Operation::new("BT", vec![]));
            self.ops
                .push(Operation::new("Tf", vec![font.into(), real(role.font_size)]));
            self.ops
                .push(Operation::new("Td", vec![real(x), real(self.y)]));
            self.ops.push(Operation::new("Tw", vec![real(word_spacing)]));
            self.ops.push(Operation::new(
                "Tj",
                vec![Object::String(encode_text(line), StringFormat::Literal)],
            ));
            self.ops.push(Operation::new("ET", vec![]));
        }

        self.y -= role.font_size * PARAGRAPH_GAP_FACTOR;
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        // Always emit at least one page, even for an empty document.
        self.pages.push(std::mem::take(&mut self.ops));
        self.pages
    }
}

// ── Text metrics ─────────────────────────────────────────────────────────

/// Approximate Helvetica advance width for one char, in em units.
fn char_width_em(c: char, bold: bool) -> f32 {
    let base = match c {
        'i' | 'l' | 'j' | '!' | '\'' | '|' | '.' | ',' | ':' | ';' => 0.28,
        't' | 'f' | 'I' | '(' | ')' | '[' | ']' | '-' => 0.33,
        'm' | 'w' => 0.82,
        'M' | 'W' => 0.94,
        ' ' => 0.278,
        'A'..='Z' => 0.70,
        '0'..='9' => 0.556,
        _ => 0.52,
    };
    if bold {
        base * 1.06
    } else {
        base
    }
}

fn measure(text: &str, role: &RoleStyle) -> f32 {
    text.chars()
        .map(|c| char_width_em(c, role.bold))
        .sum::<f32>()
        * role.font_size
}

/// Greedy word wrap against the usable width.
fn wrap(text: &str, role: &RoleStyle, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if measure(&candidate, role) <= max_width || current.is_empty() {
            current = candidate;
        } else {
            lines.push(current);
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Encode text for a PDF literal string: escape delimiters, map to Latin-1,
/// replace anything outside it with '?'.
fn encode_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 4);
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                out.push(b'\\');
                out.push(c as u8);
            }
            _ if (c as u32) < 0x100 => out.push(c as u32 as u8),
            _ => out.push(b'?'),
        }
    }
    out
}

fn real(v: f32) -> Object {
    Object::Real(v.into())
}

// ── Document assembly ────────────────────────────────────────────────────

fn assemble(pages: Vec<Vec<Operation>>, style: &StyleConfig) -> Result<Vec<u8>, RenderError> {
    let (width, height) = style.page_size.dimensions();

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let encoded = content
            .encode()
            .map_err(|e| RenderError::Assembly(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![real(0.0), real(0.0), real(width), real(height)],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| RenderError::Assembly(e.to_string()))?;
    Ok(bytes)
}
