//! Logical book model: the input to the book layout pipeline.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::layout::font_metrics::FontStyle;

/// A bold/italic range over a paragraph's text, in byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emphasis {
    pub start: usize,
    pub end: usize,
    pub style: FontStyle,
}

/// A flat run of prose with optional emphasis spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawParagraph")]
pub struct Paragraph {
    text: String,
    emphasis: Vec<Emphasis>,
}

/// Wire form of a paragraph; spans are checked on the way in.
#[derive(Deserialize)]
struct RawParagraph {
    text: String,
    #[serde(default)]
    emphasis: Vec<Emphasis>,
}

impl From<RawParagraph> for Paragraph {
    fn from(raw: RawParagraph) -> Self {
        Paragraph::with_emphasis(raw.text, raw.emphasis)
    }
}

impl Paragraph {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasis: Vec::new(),
        }
    }

    /// Builds a paragraph, keeping only spans that are in bounds, non-empty,
    /// on char boundaries, and do not overlap an earlier span.
    pub fn with_emphasis(text: impl Into<String>, mut spans: Vec<Emphasis>) -> Self {
        let text = text.into();
        spans.sort_by_key(|s| (s.start, s.end));

        let mut kept: Vec<Emphasis> = Vec::with_capacity(spans.len());
        for span in spans {
            let in_bounds = span.start < span.end
                && span.end <= text.len()
                && text.is_char_boundary(span.start)
                && text.is_char_boundary(span.end);
            let overlaps = kept.last().is_some_and(|prev| span.start < prev.end);
            if in_bounds && !overlaps {
                kept.push(span);
            } else {
                warn!(
                    start = span.start,
                    end = span.end,
                    "Dropping invalid emphasis span"
                );
            }
        }

        Self {
            text,
            emphasis: kept,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn emphasis(&self) -> &[Emphasis] {
        &self.emphasis
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Whitespace-separated words with the style of the span covering each
    /// word's first byte.
    pub fn words(&self) -> Vec<(&str, FontStyle)> {
        let mut bounds: Vec<(usize, usize)> = Vec::new();
        let mut start: Option<usize> = None;
        for (i, c) in self.text.char_indices() {
            match (c.is_whitespace(), start) {
                (true, Some(from)) => {
                    bounds.push((from, i));
                    start = None;
                }
                (false, None) => start = Some(i),
                _ => {}
            }
        }
        if let Some(from) = start {
            bounds.push((from, self.text.len()));
        }

        let mut spans = self.emphasis.iter().peekable();
        bounds
            .into_iter()
            .map(|(from, to)| {
                while spans.next_if(|s| s.end <= from).is_some() {}
                let style = match spans.peek() {
                    Some(s) if s.start <= from => s.style,
                    _ => FontStyle::Regular,
                };
                (&self.text[from..to], style)
            })
            .collect()
    }
}

/// Splits raw chapter content into paragraphs on blank lines.
pub fn split_paragraphs(content: &str) -> Vec<Paragraph> {
    content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(Paragraph::plain)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub number: u32,
    pub title: String,
    pub body: Vec<Paragraph>,
}

impl Chapter {
    pub fn new(number: u32, title: impl Into<String>, body: Vec<Paragraph>) -> Self {
        Self {
            number,
            title: title.into(),
            body,
        }
    }

    pub fn has_body(&self) -> bool {
        self.body.iter().any(|p| !p.is_blank())
    }
}

/// A complete book ready for layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub dedication: Option<String>,
    pub about_author: Option<String>,
    pub chapters: Vec<Chapter>,
}

impl Document {
    pub fn new(title: impl Into<String>, author: impl Into<String>, chapters: Vec<Chapter>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            genre: None,
            dedication: None,
            about_author: None,
            chapters,
        }
    }
}
