//! Job files: the request payload for one book, as JSON.
//!
//! Field names follow the payload the book service has always accepted.
//! Unknown trim sizes and page colors fall back with a warning; the font size
//! is clamped to the printable range.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::engine::BookStyle;
use crate::errors::{PressError, PressResult};
use crate::layout::FontSpec;
use crate::models::{
    split_paragraphs, Chapter, ChildPageSpec, Document, Margins, PageColor, PageGeometry, TrimSize,
};

pub const DEFAULT_FONT_SIZE: f32 = 11.0;
pub const MIN_FONT_SIZE: f32 = 8.0;
pub const MAX_FONT_SIZE: f32 = 24.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum JobRequest {
    Book(BookRequest),
    Childrens(ChildrensRequest),
}

impl JobRequest {
    pub fn from_json(raw: &str) -> PressResult<Self> {
        serde_json::from_str(raw).map_err(|e| PressError::InvalidJob(e.to_string()))
    }

    /// Reads and parses a job file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Invalid job file {}", path.display()))
    }

    pub fn title(&self) -> &str {
        match self {
            JobRequest::Book(book) => &book.book_title,
            JobRequest::Childrens(kids) => &kids.title,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Book
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookRequest {
    #[serde(default = "untitled")]
    pub book_title: String,
    #[serde(default = "default_author")]
    pub author_name: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub dedication: Option<String>,
    #[serde(default)]
    pub about_author: Option<String>,
    #[serde(default)]
    pub chapters: Vec<ChapterRequest>,
    #[serde(default)]
    pub trim_size: Option<String>,
    #[serde(default, deserialize_with = "lenient_font_size")]
    pub font_size: Option<f32>,
    #[serde(default)]
    pub page_color: Option<String>,
    #[serde(default)]
    pub font_family: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterRequest {
    #[serde(default)]
    pub number: Option<u32>,
    #[serde(default)]
    pub title: String,
    /// Paragraphs separated by blank lines.
    #[serde(default)]
    pub content: String,
}

impl BookRequest {
    pub fn document(&self) -> Document {
        let chapters = self
            .chapters
            .iter()
            .enumerate()
            .map(|(i, c)| {
                Chapter::new(
                    c.number.unwrap_or(i as u32 + 1),
                    c.title.clone(),
                    split_paragraphs(&c.content),
                )
            })
            .collect();

        let mut document = Document::new(&self.book_title, &self.author_name, chapters);
        document.genre = non_blank(&self.genre);
        document.dedication = non_blank(&self.dedication);
        document.about_author = non_blank(&self.about_author);
        document
    }

    pub fn trim(&self) -> TrimSize {
        TrimSize::from_request(self.trim_size.as_deref())
    }

    pub fn geometry(&self) -> PressResult<PageGeometry> {
        PageGeometry::from_trim(self.trim(), Margins::book())
    }

    /// Requested body font; `default_family` when none is named.
    pub fn font(&self, default_family: &str) -> FontSpec {
        let family = self
            .font_family
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(default_family);
        FontSpec::new(family, clamp_font_size(self.font_size))
    }

    pub fn style(&self) -> BookStyle {
        BookStyle {
            page_color: PageColor::from_request(self.page_color.as_deref()),
            ..BookStyle::default()
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Children's book
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildrensRequest {
    #[serde(default = "untitled")]
    pub title: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub pages: Vec<ChildPageSpec>,
}

/// Clamps a requested body size into the printable range.
pub fn clamp_font_size(requested: Option<f32>) -> f32 {
    match requested {
        None => DEFAULT_FONT_SIZE,
        Some(size) if !size.is_finite() => {
            warn!(font_size = size, "Font size is not a number, using default");
            DEFAULT_FONT_SIZE
        }
        Some(size) => {
            let clamped = size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
            if clamped != size {
                warn!(requested = size, clamped, "Font size out of range");
            }
            clamped
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f32),
    Text(String),
}

/// Accepts `12`, `"12"` or `"12pt"`. Text that is not a number is treated as
/// absent, so the default size applies.
fn lenient_font_size<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NumberOrText>::deserialize(deserializer)? {
        None => None,
        Some(NumberOrText::Number(size)) => Some(size),
        Some(NumberOrText::Text(raw)) => {
            let trimmed = raw.trim();
            let digits = trimmed.strip_suffix("pt").unwrap_or(trimmed).trim();
            match digits.parse::<f32>() {
                Ok(size) => Some(size),
                Err(_) => {
                    warn!(font_size = %raw, "Font size is not a number, using default");
                    None
                }
            }
        }
    })
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn untitled() -> String {
    "Untitled".to_string()
}

fn default_author() -> String {
    "Author".to_string()
}
