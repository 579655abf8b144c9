//! Front matter: title page, dedication, about the author, table of contents.
//!
//! Every page built here has the `FrontMatter` role and therefore no folio.
//! The table of contents is built last, once the folio of every chapter
//! opening is known.

use tracing::warn;

use crate::layout::flow::{flow, Align, Face, FlowBlock, FlowFonts, FlowSettings, LineKind, LineRecord};
use crate::layout::font_metrics::FontStyle;
use crate::layout::paginator::{paginate, BodyFrame, Section};
use crate::layout::EPSILON;
use crate::models::{
    split_paragraphs, BoxContent, BoxKind, Emphasis, PageDiagnostic, PageDraft, PageRole,
    Paragraph, PlacedBox, TextRun,
};

pub const ABOUT_HEADING: &str = "About the Author";
pub const CONTENTS_HEADING: &str = "Table of Contents";

/// Vertical rhythm of the front-matter pages, in points.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontMatterStyle {
    /// Space above the title on the title page.
    pub title_drop: f32,
    /// Space between title and byline.
    pub title_gap: f32,
    /// Space between byline and genre.
    pub byline_gap: f32,
    /// Space above the dedication.
    pub dedication_drop: f32,
    pub contents_heading_gap: f32,
    pub contents_entry_gap: f32,
    /// Minimum space between an entry's title and its folio.
    pub contents_folio_gap: f32,
    pub line_spacing: f32,
}

/// Faces used on the title page.
#[derive(Debug, Clone)]
pub struct TitlePageFonts {
    pub title: Face,
    pub byline: Face,
}

/// One table-of-contents line.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentsEntry {
    pub title: String,
    pub folio: u32,
}

// ────────────────────────────────────────────────────────────────────────────
// Pages
// ────────────────────────────────────────────────────────────────────────────

pub fn title_page(
    title: &str,
    author: &str,
    genre: Option<&str>,
    fonts: &TitlePageFonts,
    frame: BodyFrame,
    style: &FrontMatterStyle,
) -> PageDraft {
    let mut stack = Stack::new(frame);
    stack.gap(style.title_drop);
    stack.push(
        centered(&Paragraph::plain(title), &fonts.title, frame.width, style.line_spacing),
        BoxKind::Heading,
    );

    if !author.trim().is_empty() {
        stack.gap(style.title_gap);
        stack.push(
            centered(
                &Paragraph::plain(format!("by {}", author.trim())),
                &fonts.byline,
                frame.width,
                style.line_spacing,
            ),
            BoxKind::Text,
        );
    }

    if let Some(genre) = genre.map(str::trim).filter(|g| !g.is_empty()) {
        stack.gap(style.byline_gap);
        stack.push(
            centered(&Paragraph::plain(genre), &fonts.byline, frame.width, style.line_spacing),
            BoxKind::Text,
        );
    }

    stack.finish()
}

/// Centered italic dedication.
pub fn dedication_page(
    text: &str,
    face: &Face,
    frame: BodyFrame,
    style: &FrontMatterStyle,
) -> PageDraft {
    let text = text.trim();
    let paragraph = Paragraph::with_emphasis(
        text,
        vec![Emphasis {
            start: 0,
            end: text.len(),
            style: FontStyle::Italic,
        }],
    );

    let mut stack = Stack::new(frame);
    stack.gap(style.dedication_drop);
    stack.push(
        centered(&paragraph, face, frame.width, style.line_spacing),
        BoxKind::Text,
    );
    stack.finish()
}

/// "About the Author" heading and paragraphs, paginated like a chapter body.
pub fn about_author_pages(
    text: &str,
    fonts: &FlowFonts,
    settings: &FlowSettings,
    frame: BodyFrame,
) -> Vec<PageDraft> {
    let paragraphs = split_paragraphs(text);
    let mut blocks = vec![FlowBlock::Heading(vec![ABOUT_HEADING.to_string()])];
    blocks.extend(paragraphs.iter().map(FlowBlock::Paragraph));
    let pages: Vec<PageDraft> =
        paginate(flow(blocks, fonts, settings), frame, Section::FrontMatter).collect();
    pages
}

/// Table of contents: titles on the left, folios right-aligned. Long titles
/// wrap; an entry is never split across pages.
pub fn contents_pages(
    entries: &[ContentsEntry],
    fonts: &FlowFonts,
    frame: BodyFrame,
    style: &FrontMatterStyle,
) -> Vec<PageDraft> {
    let mut pages = Vec::new();
    let mut stack = Stack::new(frame);
    stack.push(
        centered(
            &Paragraph::plain(CONTENTS_HEADING),
            &fonts.heading,
            frame.width,
            style.line_spacing,
        ),
        BoxKind::Heading,
    );
    stack.gap(style.contents_heading_gap);

    let font = fonts.body.regular();
    for entry in entries {
        let folio = entry.folio.to_string();
        let folio_width = font.measure(&folio);
        let title_width = (frame.width - folio_width - style.contents_folio_gap).max(1.0);
        let lines = left_aligned(&entry.title, &fonts.body, title_width, style.line_spacing);
        let height: f32 = lines.iter().map(|l| l.height).sum();

        if stack.has_content() && stack.cursor + height > frame.height + EPSILON {
            pages.push(stack.finish());
            stack = Stack::new(frame);
        }

        let last = stack.push(lines, BoxKind::Text);
        if let Some((y, h)) = last {
            stack.draft.boxes.push(PlacedBox {
                kind: BoxKind::Text,
                x: frame.width - folio_width,
                y,
                w: folio_width,
                h,
                content: BoxContent::Text {
                    font: font.spec().clone(),
                    runs: vec![TextRun {
                        text: folio,
                        style: FontStyle::Regular,
                    }],
                },
            });
        }
        stack.gap(style.contents_entry_gap);
    }

    pages.push(stack.finish());
    pages
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn centered(paragraph: &Paragraph, face: &Face, width: f32, line_spacing: f32) -> Vec<LineRecord> {
    flow_single(paragraph, face, width, line_spacing, Align::Center)
}

fn left_aligned(text: &str, face: &Face, width: f32, line_spacing: f32) -> Vec<LineRecord> {
    flow_single(&Paragraph::plain(text), face, width, line_spacing, Align::Left)
}

fn flow_single(
    paragraph: &Paragraph,
    face: &Face,
    width: f32,
    line_spacing: f32,
    align: Align,
) -> Vec<LineRecord> {
    let fonts = FlowFonts {
        body: face.clone(),
        heading: face.clone(),
    };
    let settings = FlowSettings {
        width,
        line_spacing,
        paragraph_spacing: 0.0,
        paragraph_indent: 0.0,
        heading_gap: 0.0,
        align,
    };
    let lines: Vec<LineRecord> =
        flow(vec![FlowBlock::Paragraph(paragraph)], &fonts, &settings).collect();
    lines
}

/// Top-down placement of line groups on a single page. Lines that do not fit
/// are counted and reported as overflow.
struct Stack {
    frame: BodyFrame,
    cursor: f32,
    draft: PageDraft,
    dropped: usize,
}

impl Stack {
    fn new(frame: BodyFrame) -> Self {
        Self {
            frame,
            cursor: 0.0,
            draft: PageDraft::new(PageRole::FrontMatter),
            dropped: 0,
        }
    }

    fn has_content(&self) -> bool {
        !self.draft.boxes.is_empty()
    }

    fn gap(&mut self, pt: f32) {
        self.cursor += pt.max(0.0);
    }

    /// Places the lines and returns the position of the last one placed.
    fn push(&mut self, lines: Vec<LineRecord>, kind: BoxKind) -> Option<(f32, f32)> {
        let mut last = None;
        for line in lines {
            if self.cursor + line.height > self.frame.height + EPSILON {
                if line.kind != LineKind::Spacing {
                    self.dropped += 1;
                }
                continue;
            }
            let y = self.frame.top + self.cursor;
            self.cursor += line.height;
            if line.kind == LineKind::Spacing {
                continue;
            }
            last = Some((y, line.height));
            self.draft.boxes.push(PlacedBox {
                kind,
                x: line.x,
                y,
                w: line.width,
                h: line.height,
                content: BoxContent::Text {
                    font: line.font,
                    runs: line.runs,
                },
            });
        }
        last
    }

    fn finish(mut self) -> PageDraft {
        if self.dropped > 0 {
            warn!(lines_dropped = self.dropped, "Front matter does not fit its page");
            self.draft.diagnostics.push(PageDiagnostic::TextOverflow {
                lines_dropped: self.dropped,
            });
        }
        self.draft
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
