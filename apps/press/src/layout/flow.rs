//! Flow engine: wraps headings and paragraphs into line records.
//!
//! Greedy word wrap: words are accumulated while the line, including the
//! separating space, stays within the available width. A word wider than the
//! line sits alone on its own line; nothing is truncated or dropped.
//!
//! `flow` is lazy: a paragraph is only wrapped when the consumer pulls past
//! the lines already produced. Each chapter gets its own flow.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::layout::font_metrics::{FontSpec, FontStyle, ScaledFont};
use crate::layout::EPSILON;
use crate::models::{Paragraph, TextRun};

// ────────────────────────────────────────────────────────────────────────────
// Inputs
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    Left,
    Center,
}

/// One font in its three styles, resolved once per job.
#[derive(Debug, Clone)]
pub struct Face {
    regular: ScaledFont,
    italic: ScaledFont,
    bold: ScaledFont,
}

impl Face {
    pub fn new(font: ScaledFont) -> Self {
        let regular = font.styled(FontStyle::Regular);
        Self {
            italic: font.styled(FontStyle::Italic),
            bold: font.styled(FontStyle::Bold),
            regular,
        }
    }

    pub fn get(&self, style: FontStyle) -> &ScaledFont {
        match style {
            FontStyle::Regular => &self.regular,
            FontStyle::Italic => &self.italic,
            FontStyle::Bold => &self.bold,
        }
    }

    pub fn regular(&self) -> &ScaledFont {
        &self.regular
    }
}

#[derive(Debug, Clone)]
pub struct FlowFonts {
    pub body: Face,
    pub heading: Face,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowSettings {
    /// Line width available to text.
    pub width: f32,
    /// Multiplier applied to the font's natural line height.
    pub line_spacing: f32,
    /// Gap between paragraphs, in body lines.
    pub paragraph_spacing: f32,
    /// First-line indent of left-aligned paragraphs, in points.
    pub paragraph_indent: f32,
    /// Gap after a heading, in body lines.
    pub heading_gap: f32,
    pub align: Align,
}

/// A logical block to be flowed.
#[derive(Debug, Clone)]
pub enum FlowBlock<'a> {
    /// Heading parts (e.g. "Chapter 3", then the title), each centered and
    /// wrapped on its own.
    Heading(Vec<String>),
    Paragraph(&'a Paragraph),
}

// ────────────────────────────────────────────────────────────────────────────
// Output
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Heading,
    Body,
    /// Vertical advance with no ink (paragraph and heading gaps).
    Spacing,
}

/// One line of flowed text and the vertical advance it consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct LineRecord {
    pub kind: LineKind,
    pub runs: Vec<TextRun>,
    pub font: FontSpec,
    pub width: f32,
    pub height: f32,
    /// Horizontal offset from the left edge of the text area.
    pub x: f32,
    /// Paragraph ordinal within this flow, for body lines.
    pub paragraph: Option<usize>,
    pub line_in_paragraph: usize,
}

impl LineRecord {
    pub fn text(&self) -> String {
        self.runs
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn spacing(height: f32, font: &ScaledFont) -> Self {
        Self {
            kind: LineKind::Spacing,
            runs: Vec::new(),
            font: font.spec().clone(),
            width: 0.0,
            height,
            x: 0.0,
            paragraph: None,
            line_in_paragraph: 0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Flow
// ────────────────────────────────────────────────────────────────────────────

/// Starts a fresh flow over `blocks`.
pub fn flow<'a>(
    blocks: Vec<FlowBlock<'a>>,
    fonts: &'a FlowFonts,
    settings: &'a FlowSettings,
) -> LineFlow<'a> {
    LineFlow {
        blocks: blocks.into_iter(),
        fonts,
        settings,
        pending: VecDeque::new(),
        next_paragraph: 0,
        after_paragraph: false,
    }
}

/// Lazy line iterator returned by [`flow`].
pub struct LineFlow<'a> {
    blocks: std::vec::IntoIter<FlowBlock<'a>>,
    fonts: &'a FlowFonts,
    settings: &'a FlowSettings,
    pending: VecDeque<LineRecord>,
    next_paragraph: usize,
    after_paragraph: bool,
}

impl<'a> LineFlow<'a> {
    fn body_advance(&self) -> f32 {
        self.fonts.body.regular().line_height() * self.settings.line_spacing
    }

    fn expand_heading(&mut self, parts: &[String]) {
        let fonts = self.fonts;
        let face = &fonts.heading;
        let advance = face.regular().line_height() * self.settings.line_spacing;
        let width = self.settings.width;

        for part in parts {
            let words: Vec<(&str, FontStyle)> = part
                .split_whitespace()
                .map(|w| (w, FontStyle::Regular))
                .collect();
            for (words, line_width) in wrap(&words, face, width, width) {
                self.pending.push_back(LineRecord {
                    kind: LineKind::Heading,
                    runs: merge_runs(&words),
                    font: face.regular().spec().clone(),
                    width: line_width,
                    height: advance,
                    x: ((width - line_width) / 2.0).max(0.0),
                    paragraph: None,
                    line_in_paragraph: 0,
                });
            }
        }

        if self.settings.heading_gap > 0.0 {
            let gap = self.settings.heading_gap * self.body_advance();
            self.pending
                .push_back(LineRecord::spacing(gap, self.fonts.body.regular()));
        }
        self.after_paragraph = false;
    }

    fn expand_paragraph(&mut self, paragraph: &Paragraph) {
        let words = paragraph.words();
        if words.is_empty() {
            return;
        }

        let advance = self.body_advance();
        if self.after_paragraph && self.settings.paragraph_spacing > 0.0 {
            let gap = self.settings.paragraph_spacing * advance;
            self.pending
                .push_back(LineRecord::spacing(gap, self.fonts.body.regular()));
        }

        let width = self.settings.width;
        let indent = match self.settings.align {
            Align::Left => self.settings.paragraph_indent.clamp(0.0, width),
            Align::Center => 0.0,
        };
        let fonts = self.fonts;
        let face = &fonts.body;
        let id = self.next_paragraph;

        for (i, (words, line_width)) in wrap(&words, face, width - indent, width)
            .into_iter()
            .enumerate()
        {
            let x = match self.settings.align {
                Align::Left if i == 0 => indent,
                Align::Left => 0.0,
                Align::Center => ((width - line_width) / 2.0).max(0.0),
            };
            self.pending.push_back(LineRecord {
                kind: LineKind::Body,
                runs: merge_runs(&words),
                font: face.regular().spec().clone(),
                width: line_width,
                height: advance,
                x,
                paragraph: Some(id),
                line_in_paragraph: i,
            });
        }

        self.next_paragraph += 1;
        self.after_paragraph = true;
    }
}

impl<'a> Iterator for LineFlow<'a> {
    type Item = LineRecord;

    fn next(&mut self) -> Option<LineRecord> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Some(line);
            }
            match self.blocks.next()? {
                FlowBlock::Heading(parts) => self.expand_heading(&parts),
                FlowBlock::Paragraph(paragraph) => self.expand_paragraph(paragraph),
            }
        }
    }
}

/// Greedy wrap. The first line may be narrower (indent). Returns each line's
/// words and its measured width.
fn wrap<'w>(
    words: &[(&'w str, FontStyle)],
    face: &Face,
    first_width: f32,
    width: f32,
) -> Vec<(Vec<(&'w str, FontStyle)>, f32)> {
    let mut lines = Vec::new();
    let mut current: Vec<(&'w str, FontStyle)> = Vec::new();
    let mut current_width = 0.0_f32;

    for &(word, style) in words {
        let font = face.get(style);
        let word_w = font.measure(word);

        if current.is_empty() {
            // A word always starts a line, even one wider than the line.
            current.push((word, style));
            current_width = word_w;
            continue;
        }

        let limit = if lines.is_empty() { first_width } else { width };
        let candidate = current_width + font.space_width() + word_w;
        if candidate <= limit + EPSILON {
            current.push((word, style));
            current_width = candidate;
        } else {
            lines.push((std::mem::take(&mut current), current_width));
            current.push((word, style));
            current_width = word_w;
        }
    }
    if !current.is_empty() {
        lines.push((current, current_width));
    }
    lines
}

/// Joins consecutive same-style words into runs.
fn merge_runs(words: &[(&str, FontStyle)]) -> Vec<TextRun> {
    let mut runs: Vec<TextRun> = Vec::new();
    for &(word, style) in words {
        match runs.last_mut() {
            Some(run) if run.style == style => {
                run.text.push(' ');
                run.text.push_str(word);
            }
            _ => runs.push(TextRun {
                text: word.to_string(),
                style,
            }),
        }
    }
    runs
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
