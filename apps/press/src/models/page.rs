//! Physical page model: the display list handed to the rendering backend.

use serde::{Deserialize, Serialize};

use crate::layout::font_metrics::{FontFallback, FontSpec, FontStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxKind {
    /// Chapter or section heading line.
    Heading,
    Text,
    Image,
    PageNumber,
    RunningHeader,
}

/// A contiguous piece of a line set in one style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub style: FontStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoxContent {
    Text { font: FontSpec, runs: Vec<TextRun> },
    Image {
        url: String,
        width_px: u32,
        height_px: u32,
    },
}

impl BoxContent {
    /// Plain text of a text box; empty for images.
    pub fn text(&self) -> String {
        match self {
            BoxContent::Text { runs, .. } => runs
                .iter()
                .map(|r| r.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            BoxContent::Image { .. } => String::new(),
        }
    }
}

/// A box positioned in content-box coordinates (origin top-left, y down).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedBox {
    pub kind: BoxKind,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub content: BoxContent,
}

impl PlacedBox {
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }
}

/// Non-fatal conditions recorded on the page they affected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageDiagnostic {
    FontFallback(FontFallback),
    ImageUnavailable { url: String, reason: String },
    TextOverflow { lines_dropped: usize },
    EmptyChapter { chapter: u32 },
}

/// What a page belongs to; drives furniture decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageRole {
    FrontMatter,
    Chapter { number: u32, title: String, opening: bool },
    Illustrated,
}

/// A page under construction, before it has an index.
#[derive(Debug, Clone, PartialEq)]
pub struct PageDraft {
    pub role: PageRole,
    pub boxes: Vec<PlacedBox>,
    pub diagnostics: Vec<PageDiagnostic>,
}

impl PageDraft {
    pub fn new(role: PageRole) -> Self {
        Self {
            role,
            boxes: Vec::new(),
            diagnostics: Vec::new(),
        }
    }
}

/// A finished page. Body boxes are fixed; only furniture may be appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    index: u32,
    folio: Option<u32>,
    role: PageRole,
    boxes: Vec<PlacedBox>,
    diagnostics: Vec<PageDiagnostic>,
}

impl Page {
    pub(crate) fn from_draft(index: u32, folio: Option<u32>, draft: PageDraft) -> Self {
        Self {
            index,
            folio,
            role: draft.role,
            boxes: draft.boxes,
            diagnostics: draft.diagnostics,
        }
    }

    pub(crate) fn append_furniture(&mut self, furniture: PlacedBox) {
        self.boxes.push(furniture);
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn folio(&self) -> Option<u32> {
        self.folio
    }

    pub fn role(&self) -> &PageRole {
        &self.role
    }

    pub fn boxes(&self) -> &[PlacedBox] {
        &self.boxes
    }

    pub fn diagnostics(&self) -> &[PageDiagnostic] {
        &self.diagnostics
    }

    pub fn has_font_fallback(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| matches!(d, PageDiagnostic::FontFallback(_)))
    }

    /// Body boxes, i.e. everything except page furniture.
    pub fn body(&self) -> impl Iterator<Item = &PlacedBox> {
        self.boxes
            .iter()
            .filter(|b| !matches!(b.kind, BoxKind::PageNumber | BoxKind::RunningHeader))
    }
}
