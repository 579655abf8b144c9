//! Physical page geometry: trim sizes, margins, and page paint.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{PressError, PressResult};

pub const POINTS_PER_INCH: f32 = 72.0;

// ────────────────────────────────────────────────────────────────────────────
// Trim sizes
// ────────────────────────────────────────────────────────────────────────────

/// Final physical page dimensions offered to authors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrimSize {
    #[serde(rename = "5x8")]
    FiveByEight,
    #[serde(rename = "5.25x8")]
    DigestSmall,
    #[serde(rename = "5.5x8.5")]
    Digest,
    #[serde(rename = "6x9")]
    SixByNine,
    #[serde(rename = "7x10")]
    SevenByTen,
    #[serde(rename = "8.5x11")]
    Letter,
}

impl TrimSize {
    pub const ALL: [TrimSize; 6] = [
        TrimSize::FiveByEight,
        TrimSize::DigestSmall,
        TrimSize::Digest,
        TrimSize::SixByNine,
        TrimSize::SevenByTen,
        TrimSize::Letter,
    ];

    /// Width and height in inches.
    pub fn inches(self) -> (f32, f32) {
        match self {
            TrimSize::FiveByEight => (5.0, 8.0),
            TrimSize::DigestSmall => (5.25, 8.0),
            TrimSize::Digest => (5.5, 8.5),
            TrimSize::SixByNine => (6.0, 9.0),
            TrimSize::SevenByTen => (7.0, 10.0),
            TrimSize::Letter => (8.5, 11.0),
        }
    }

    /// Width and height in points.
    pub fn points(self) -> (f32, f32) {
        let (w, h) = self.inches();
        (w * POINTS_PER_INCH, h * POINTS_PER_INCH)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrimSize::FiveByEight => "5x8",
            TrimSize::DigestSmall => "5.25x8",
            TrimSize::Digest => "5.5x8.5",
            TrimSize::SixByNine => "6x9",
            TrimSize::SevenByTen => "7x10",
            TrimSize::Letter => "8.5x11",
        }
    }

    /// Parses a request value, falling back to 6x9 for anything unrecognised.
    pub fn from_request(value: Option<&str>) -> Self {
        match value {
            None => TrimSize::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(trim_size = raw, "Unknown trim size, using 6x9");
                TrimSize::default()
            }),
        }
    }
}

impl Default for TrimSize {
    fn default() -> Self {
        TrimSize::SixByNine
    }
}

impl FromStr for TrimSize {
    type Err = PressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(' ', "");
        TrimSize::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| PressError::InvalidJob(format!("unknown trim size '{s}'")))
    }
}

impl fmt::Display for TrimSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Page paint
// ────────────────────────────────────────────────────────────────────────────

/// Background paint for every page. Has no effect on layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageColor {
    White,
    Cream,
    OffWhite,
}

impl PageColor {
    /// RGB components in 0.0..=1.0.
    pub fn rgb(self) -> [f32; 3] {
        match self {
            PageColor::White => [1.0, 1.0, 1.0],
            PageColor::Cream => [1.0, 0.996, 0.941],
            PageColor::OffWhite => [0.973, 0.973, 0.973],
        }
    }

    /// Parses a request value; unknown names paint cream.
    pub fn from_request(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None | Some("cream") => PageColor::Cream,
            Some("white") => PageColor::White,
            Some("off-white") | Some("offwhite") => PageColor::OffWhite,
            Some(other) => {
                warn!(page_color = other, "Unknown page color, using cream");
                PageColor::Cream
            }
        }
    }
}

impl Default for PageColor {
    fn default() -> Self {
        PageColor::Cream
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Margins {
    pub fn uniform(pt: f32) -> Self {
        Self {
            top: pt,
            bottom: pt,
            left: pt,
            right: pt,
        }
    }

    /// Book margins: 0.75" top, bottom and gutter, 0.5" outside.
    pub fn book() -> Self {
        Self {
            top: 0.75 * POINTS_PER_INCH,
            bottom: 0.75 * POINTS_PER_INCH,
            left: 0.75 * POINTS_PER_INCH,
            right: 0.5 * POINTS_PER_INCH,
        }
    }

    /// Children's book margins: 0.5" all round.
    pub fn childrens() -> Self {
        Self::uniform(0.5 * POINTS_PER_INCH)
    }
}

/// Trim size plus margins. The content box is whatever the margins leave.
///
/// Only constructible through [`PageGeometry::new`], which rejects an empty
/// content box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageGeometry {
    trim_width: f32,
    trim_height: f32,
    margins: Margins,
}

impl PageGeometry {
    pub fn new(trim_width: f32, trim_height: f32, margins: Margins) -> PressResult<Self> {
        let geometry = Self {
            trim_width,
            trim_height,
            margins,
        };
        let (w, h) = (geometry.content_width(), geometry.content_height());
        if !(w.is_finite() && h.is_finite()) || w <= 0.0 || h <= 0.0 {
            return Err(PressError::InvalidGeometry(format!(
                "content box {w}x{h}pt from trim {trim_width}x{trim_height}pt"
            )));
        }
        Ok(geometry)
    }

    pub fn from_trim(trim: TrimSize, margins: Margins) -> PressResult<Self> {
        let (w, h) = trim.points();
        Self::new(w, h, margins)
    }

    /// Geometry with a given content box and no margins.
    pub fn content_box(width: f32, height: f32) -> PressResult<Self> {
        Self::new(width, height, Margins::uniform(0.0))
    }

    pub fn trim_width(&self) -> f32 {
        self.trim_width
    }

    pub fn trim_height(&self) -> f32 {
        self.trim_height
    }

    pub fn content_width(&self) -> f32 {
        self.trim_width - self.margins.left - self.margins.right
    }

    pub fn content_height(&self) -> f32 {
        self.trim_height - self.margins.top - self.margins.bottom
    }
}
