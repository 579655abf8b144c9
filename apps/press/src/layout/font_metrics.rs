//! Metrics provider: static font-metric tables for the built-in families.
//!
//! Character widths are in em units (relative to font size), taken from the
//! Adobe core-font AFM files. Bold and italic are approximated by scaling the
//! regular widths; this is close enough for line breaking, which only needs
//! to agree with itself, not with a glyph rasterizer.
//! Characters outside printable ASCII measure at the family's average width.
//!
//! Resolution of a [`FontSpec`] to a table is cached process-wide in the
//! [`MetricsProvider`]; the cache is the only state shared between jobs.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{PressError, PressResult};

// ────────────────────────────────────────────────────────────────────────────
// Font specs
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontStyle {
    #[default]
    Regular,
    Italic,
    Bold,
}

impl FontStyle {
    /// Horizontal scale applied to regular widths.
    fn width_factor(self) -> f32 {
        match self {
            FontStyle::Regular => 1.0,
            FontStyle::Italic => 0.97,
            FontStyle::Bold => 1.06,
        }
    }
}

/// A requested face: family name, size, and style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: String,
    pub size_pt: f32,
    #[serde(default)]
    pub style: FontStyle,
}

impl FontSpec {
    pub fn new(family: impl Into<String>, size_pt: f32) -> Self {
        Self {
            family: family.into(),
            size_pt,
            style: FontStyle::Regular,
        }
    }

    pub fn with_style(&self, style: FontStyle) -> Self {
        Self {
            style,
            ..self.clone()
        }
    }

}

impl fmt::Display for FontSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}pt {:?}", self.family, self.size_pt, self.style)
    }
}

/// Record of a family substitution. Size and style are never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontFallback {
    pub requested: String,
    pub substituted: String,
    pub size_pt: f32,
}

/// Ordered candidate families, tried first to last.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackChain(Vec<String>);

impl FallbackChain {
    pub fn new<I, S>(families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(families.into_iter().map(Into::into).collect())
    }

    /// The requested family followed by the standard serif substitute.
    pub fn with_serif_fallback(requested: &str, serif: &str) -> Self {
        if requested.eq_ignore_ascii_case(serif) {
            Self::new([requested])
        } else {
            Self::new([requested, serif])
        }
    }

    pub fn families(&self) -> &[String] {
        &self.0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Font metric table
// ────────────────────────────────────────────────────────────────────────────

/// Per-family advance widths in em units, indexed by `byte - 0x20` for the
/// printable ASCII range (space at 0, tilde at 94). Digits start at 16,
/// capitals at 33, lowercase at 65.
pub struct FontMetricTable {
    pub family: &'static str,
    /// Lowercase names this table answers to.
    aliases: &'static [&'static str],
    widths: [f32; 95],
    /// Width used for anything outside the table.
    pub average_char_width: f32,
    pub ascent: f32,
    pub descent: f32,
    /// Baseline-to-baseline distance at 1em.
    pub line_height: f32,
}

impl FontMetricTable {
    /// Measures the width of a string in em units.
    pub fn measure_str(&self, s: &str) -> f32 {
        s.chars()
            .map(|c| {
                let code = c as usize;
                if (32..=126).contains(&code) {
                    self.widths[code - 32]
                } else {
                    self.average_char_width
                }
            })
            .sum()
    }

    pub fn space_width(&self) -> f32 {
        self.widths[0]
    }

    fn answers_to(&self, name: &str) -> bool {
        self.aliases.contains(&name)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in families
// ────────────────────────────────────────────────────────────────────────────

/// Times Roman: the standard serif, and the substitute of last resort.
static TIMES_TABLE: FontMetricTable = FontMetricTable {
    family: "Times",
    aliases: &["times", "times-roman", "times roman", "times new roman", "serif"],
    #[rustfmt::skip]
    widths: [
        // sp     !      "      #      $      %      &      '      (      )      *      +      ,      -      .      /
        0.250, 0.333, 0.408, 0.500, 0.500, 0.833, 0.778, 0.180, 0.333, 0.333, 0.500, 0.564, 0.250, 0.333, 0.250, 0.278,
        // 0      1      2      3      4      5      6      7      8      9
        0.500, 0.500, 0.500, 0.500, 0.500, 0.500, 0.500, 0.500, 0.500, 0.500,
        // :      ;      <      =      >      ?      @
        0.278, 0.278, 0.564, 0.564, 0.564, 0.444, 0.921,
        // A      B      C      D      E      F      G      H      I      J      K      L      M
        0.722, 0.667, 0.667, 0.722, 0.611, 0.556, 0.722, 0.722, 0.333, 0.389, 0.722, 0.611, 0.889,
        // N      O      P      Q      R      S      T      U      V      W      X      Y      Z
        0.722, 0.722, 0.556, 0.722, 0.667, 0.556, 0.611, 0.722, 0.722, 0.944, 0.722, 0.722, 0.611,
        // [      \      ]      ^      _      `
        0.333, 0.278, 0.333, 0.469, 0.500, 0.333,
        // a      b      c      d      e      f      g      h      i      j      k      l      m
        0.444, 0.500, 0.444, 0.500, 0.444, 0.333, 0.500, 0.500, 0.278, 0.278, 0.500, 0.278, 0.778,
        // n      o      p      q      r      s      t      u      v      w      x      y      z
        0.500, 0.500, 0.500, 0.500, 0.333, 0.389, 0.278, 0.500, 0.500, 0.722, 0.500, 0.500, 0.444,
        // {      |      }      ~
        0.480, 0.200, 0.480, 0.541,
    ],
    average_char_width: 0.45,
    ascent: 0.683,
    descent: 0.217,
    line_height: 1.2,
};

/// Helvetica.
static HELVETICA_TABLE: FontMetricTable = FontMetricTable {
    family: "Helvetica",
    aliases: &["helvetica", "arial", "sans-serif"],
    #[rustfmt::skip]
    widths: [
        // sp     !      "      #      $      %      &      '      (      )      *      +      ,      -      .      /
        0.278, 0.278, 0.355, 0.556, 0.556, 0.889, 0.667, 0.191, 0.333, 0.333, 0.389, 0.584, 0.278, 0.333, 0.278, 0.278,
        // 0      1      2      3      4      5      6      7      8      9
        0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556,
        // :      ;      <      =      >      ?      @
        0.278, 0.278, 0.584, 0.584, 0.584, 0.556, 1.015,
        // A      B      C      D      E      F      G      H      I      J      K      L      M
        0.667, 0.667, 0.722, 0.722, 0.667, 0.611, 0.778, 0.722, 0.278, 0.500, 0.667, 0.556, 0.833,
        // N      O      P      Q      R      S      T      U      V      W      X      Y      Z
        0.722, 0.778, 0.667, 0.778, 0.722, 0.667, 0.611, 0.722, 0.667, 0.944, 0.667, 0.667, 0.611,
        // [      \      ]      ^      _      `
        0.278, 0.278, 0.278, 0.469, 0.556, 0.333,
        // a      b      c      d      e      f      g      h      i      j      k      l      m
        0.556, 0.556, 0.500, 0.556, 0.556, 0.278, 0.556, 0.556, 0.222, 0.222, 0.500, 0.222, 0.833,
        // n      o      p      q      r      s      t      u      v      w      x      y      z
        0.556, 0.556, 0.556, 0.556, 0.333, 0.500, 0.278, 0.556, 0.500, 0.722, 0.500, 0.500, 0.500,
        // {      |      }      ~
        0.334, 0.260, 0.334, 0.584,
    ],
    average_char_width: 0.53,
    ascent: 0.718,
    descent: 0.207,
    line_height: 1.2,
};

/// New Century Schoolbook, a wide open serif for picture books.
static SCHOOLBOOK_TABLE: FontMetricTable = FontMetricTable {
    family: "Schoolbook",
    aliases: &["schoolbook", "century schoolbook", "new century schoolbook"],
    #[rustfmt::skip]
    widths: [
        // sp     !      "      #      $      %      &      '      (      )      *      +      ,      -      .      /
        0.278, 0.296, 0.389, 0.556, 0.556, 0.833, 0.815, 0.204, 0.333, 0.333, 0.500, 0.606, 0.278, 0.333, 0.278, 0.278,
        // 0      1      2      3      4      5      6      7      8      9
        0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556,
        // :      ;      <      =      >      ?      @
        0.278, 0.278, 0.606, 0.606, 0.606, 0.444, 0.737,
        // A      B      C      D      E      F      G      H      I      J      K      L      M
        0.722, 0.722, 0.722, 0.778, 0.722, 0.667, 0.778, 0.833, 0.407, 0.556, 0.778, 0.667, 0.944,
        // N      O      P      Q      R      S      T      U      V      W      X      Y      Z
        0.815, 0.778, 0.667, 0.778, 0.722, 0.630, 0.667, 0.815, 0.722, 0.981, 0.704, 0.704, 0.611,
        // [      \      ]      ^      _      `
        0.333, 0.606, 0.333, 0.606, 0.500, 0.333,
        // a      b      c      d      e      f      g      h      i      j      k      l      m
        0.556, 0.556, 0.444, 0.574, 0.500, 0.333, 0.537, 0.611, 0.315, 0.296, 0.593, 0.315, 0.889,
        // n      o      p      q      r      s      t      u      v      w      x      y      z
        0.611, 0.500, 0.574, 0.556, 0.444, 0.463, 0.389, 0.611, 0.537, 0.778, 0.537, 0.537, 0.481,
        // {      |      }      ~
        0.333, 0.606, 0.333, 0.606,
    ],
    average_char_width: 0.54,
    ascent: 0.737,
    descent: 0.205,
    line_height: 1.2,
};

/// Courier: every glyph is 600 units.
static COURIER_TABLE: FontMetricTable = FontMetricTable {
    family: "Courier",
    aliases: &["courier", "courier new", "monospace"],
    widths: [0.6; 95],
    average_char_width: 0.6,
    ascent: 0.629,
    descent: 0.157,
    line_height: 1.2,
};

static BUILTIN_TABLES: [&FontMetricTable; 4] = [
    &TIMES_TABLE,
    &HELVETICA_TABLE,
    &SCHOOLBOOK_TABLE,
    &COURIER_TABLE,
];

// ────────────────────────────────────────────────────────────────────────────
// Scaled fonts
// ────────────────────────────────────────────────────────────────────────────

/// A metric table bound to a concrete size and style. This is the measuring
/// interface of the layout stages: `measure` gives the width of a string,
/// `ascent`, `descent` and `line_height` the vertical metrics. Measuring is
/// infallible; only resolution can fail.
#[derive(Debug, Clone)]
pub struct ScaledFont {
    spec: FontSpec,
    table: &'static FontMetricTable,
}

impl fmt::Debug for FontMetricTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontMetricTable")
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}

impl ScaledFont {
    /// The face as resolved: canonical family name, requested size and style.
    pub fn spec(&self) -> &FontSpec {
        &self.spec
    }

    pub fn size_pt(&self) -> f32 {
        self.spec.size_pt
    }

    pub fn measure(&self, text: &str) -> f32 {
        self.table.measure_str(text) * self.spec.size_pt * self.spec.style.width_factor()
    }

    pub fn space_width(&self) -> f32 {
        self.table.space_width() * self.spec.size_pt * self.spec.style.width_factor()
    }

    pub fn line_height(&self) -> f32 {
        self.table.line_height * self.spec.size_pt
    }

    pub fn ascent(&self) -> f32 {
        self.table.ascent * self.spec.size_pt
    }

    pub fn descent(&self) -> f32 {
        self.table.descent * self.spec.size_pt
    }

    /// Same family and size in another style.
    pub fn styled(&self, style: FontStyle) -> ScaledFont {
        ScaledFont {
            spec: self.spec.with_style(style),
            table: self.table,
        }
    }
}

/// A chain resolution: the font to use and, if a substitute was taken, the
/// record of it.
#[derive(Debug, Clone)]
pub struct ResolvedFont {
    pub font: ScaledFont,
    pub fallback: Option<FontFallback>,
}

// ────────────────────────────────────────────────────────────────────────────
// Provider
// ────────────────────────────────────────────────────────────────────────────

/// Font backend held by the engine. Every face the layout stages measure with
/// comes out of `resolve`; `resolve_chain` walks a fallback chain over it.
pub trait TextMeasurer: Send + Sync {
    /// Resolves one face exactly, with no fallback.
    fn resolve(&self, spec: &FontSpec) -> PressResult<ScaledFont>;

    /// Tries each family of `chain` in order at the given size and style.
    fn resolve_chain(
        &self,
        chain: &FallbackChain,
        size_pt: f32,
        style: FontStyle,
    ) -> PressResult<ResolvedFont> {
        let families = chain.families();
        let requested = families.first().cloned().unwrap_or_default();

        for (position, family) in families.iter().enumerate() {
            let spec = FontSpec {
                family: family.clone(),
                size_pt,
                style,
            };
            match self.resolve(&spec) {
                Ok(font) => {
                    let fallback = (position > 0).then(|| {
                        warn!(
                            requested = %requested,
                            substituted = %font.spec.family,
                            size_pt,
                            "Requested font unavailable, using fallback"
                        );
                        FontFallback {
                            requested: requested.clone(),
                            substituted: font.spec.family.clone(),
                            size_pt,
                        }
                    });
                    return Ok(ResolvedFont { font, fallback });
                }
                Err(PressError::FontUnavailable { .. }) => continue,
                Err(other) => return Err(other),
            }
        }

        Err(PressError::FontUnavailable {
            requested,
            tried: families.to_vec(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FontKey {
    family: String,
    centipoints: u32,
    style: FontStyle,
}

impl FontKey {
    fn of(spec: &FontSpec) -> Self {
        Self {
            family: spec.family.trim().to_ascii_lowercase(),
            centipoints: (spec.size_pt * 100.0).round() as u32,
            style: spec.style,
        }
    }
}

/// Resolves font specs against the available families.
///
/// Safe to share across jobs behind an `Arc`. Concurrent misses on the same
/// key may both compute; both produce the same value and the first insert
/// wins.
pub struct MetricsProvider {
    tables: Vec<&'static FontMetricTable>,
    cache: RwLock<HashMap<FontKey, ScaledFont>>,
}

impl MetricsProvider {
    /// Provider with every built-in family.
    pub fn builtin() -> Self {
        Self {
            tables: BUILTIN_TABLES.to_vec(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Provider restricted to the named built-in families. Unknown names are
    /// ignored.
    pub fn with_families(families: &[&str]) -> Self {
        let tables = BUILTIN_TABLES
            .iter()
            .copied()
            .filter(|t| families.iter().any(|f| t.family.eq_ignore_ascii_case(f)))
            .collect();
        Self {
            tables,
            cache: RwLock::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn cached_entries(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for MetricsProvider {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TextMeasurer for MetricsProvider {
    fn resolve(&self, spec: &FontSpec) -> PressResult<ScaledFont> {
        if !(spec.size_pt.is_finite() && spec.size_pt > 0.0) {
            return Err(PressError::InvalidJob(format!(
                "font size {} is not printable",
                spec.size_pt
            )));
        }

        let key = FontKey::of(spec);
        if let Ok(cache) = self.cache.read() {
            if let Some(hit) = cache.get(&key) {
                return Ok(hit.clone());
            }
        }

        let table = self
            .tables
            .iter()
            .copied()
            .find(|t| t.answers_to(&key.family))
            .ok_or_else(|| PressError::FontUnavailable {
                requested: spec.family.clone(),
                tried: vec![spec.family.clone()],
            })?;

        let font = ScaledFont {
            spec: FontSpec {
                family: table.family.to_string(),
                size_pt: spec.size_pt,
                style: spec.style,
            },
            table,
        };
        debug!(font = %font.spec, "Font metrics cache fill");

        if let Ok(mut cache) = self.cache.write() {
            return Ok(cache.entry(key).or_insert(font).clone());
        }
        Ok(font)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
