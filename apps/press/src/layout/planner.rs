//! Children's-book layout planner: one fixed-size page per input spec.
//!
//! Each page is self-contained: the upper share of the body frame holds the
//! illustration (aspect-fit, never upscaled, centered) and the remainder holds
//! a centered text block. The text is flowed and measured before it is
//! placed, so it can be positioned inside its area.
//!
//! When the text needs more room than its area, the illustration area shrinks
//! first. Text that still does not fit the whole frame is cut and the page is
//! flagged with `TextOverflow`.

use tracing::warn;

use crate::layout::flow::{flow, Align, FlowBlock, FlowFonts, FlowSettings, LineKind, LineRecord};
use crate::layout::font_metrics::FontFallback;
use crate::layout::paginator::BodyFrame;
use crate::layout::EPSILON;
use crate::models::{
    split_paragraphs, BoxContent, BoxKind, ChildPageSpec, ImageAsset, ImageSlot, PageDiagnostic,
    PageDraft, PageRole, PlacedBox, TextPosition, POINTS_PER_INCH,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PlannerSettings {
    /// Fraction of the body frame height given to the illustration.
    pub image_share: f32,
    /// Vertical gap between illustration and text, in points.
    pub image_gap: f32,
    /// Resolution at which an image prints at its native size.
    pub image_dpi: f32,
    /// Text flow; `width` is replaced by the frame width and alignment is
    /// always centered.
    pub flow: FlowSettings,
}

/// Plans every spec in order. Lazy; one draft per spec.
pub fn plan<'a>(
    specs: &'a [ChildPageSpec],
    frame: BodyFrame,
    fonts: &'a FlowFonts,
    settings: &'a PlannerSettings,
    fallback: Option<&'a FontFallback>,
) -> impl Iterator<Item = PageDraft> + 'a {
    specs
        .iter()
        .map(move |spec| plan_page(spec, frame, fonts, settings, fallback))
}

/// Lays out one illustrated page.
pub fn plan_page(
    spec: &ChildPageSpec,
    frame: BodyFrame,
    fonts: &FlowFonts,
    settings: &PlannerSettings,
    fallback: Option<&FontFallback>,
) -> PageDraft {
    let mut draft = PageDraft::new(PageRole::Illustrated);
    if let Some(fallback) = fallback {
        draft
            .diagnostics
            .push(PageDiagnostic::FontFallback(fallback.clone()));
    }

    let paragraphs = split_paragraphs(&spec.text);
    let flow_settings = FlowSettings {
        width: frame.width,
        align: Align::Center,
        paragraph_indent: 0.0,
        ..settings.flow.clone()
    };
    let lines: Vec<LineRecord> = flow(
        paragraphs.iter().map(FlowBlock::Paragraph).collect(),
        fonts,
        &flow_settings,
    )
    .collect();
    let text_height: f32 = lines.iter().map(|l| l.height).sum();

    let image = match &spec.image {
        ImageSlot::Ready(asset) => Some(asset),
        ImageSlot::Failed { url, reason } => {
            warn!(url = %url, reason = %reason, "Illustration unavailable, laying out text only");
            draft.diagnostics.push(PageDiagnostic::ImageUnavailable {
                url: url.clone(),
                reason: reason.clone(),
            });
            None
        }
        ImageSlot::NotRequested => {
            if let Some(url) = &spec.image_url {
                draft.diagnostics.push(PageDiagnostic::ImageUnavailable {
                    url: url.clone(),
                    reason: "image was never fetched".to_string(),
                });
            }
            None
        }
    };

    // (top, height) of the text area, relative to the frame.
    let mut text_area = (0.0_f32, frame.height);

    if let Some(asset) = image {
        let gap = if lines.is_empty() { 0.0 } else { settings.image_gap };
        let preferred = frame.height * settings.image_share.clamp(0.0, 1.0);
        let area_height = preferred.min(frame.height - text_height - gap).max(0.0);
        let (w, h) = aspect_fit(asset, frame.width, area_height, settings.image_dpi);

        if w > EPSILON && h > EPSILON {
            draft.boxes.push(PlacedBox {
                kind: BoxKind::Image,
                x: (frame.width - w) / 2.0,
                y: frame.top + (area_height - h) / 2.0,
                w,
                h,
                content: BoxContent::Image {
                    url: asset.url.clone(),
                    width_px: asset.width_px,
                    height_px: asset.height_px,
                },
            });
            text_area = (area_height + gap, frame.height - area_height - gap);
        } else {
            draft.diagnostics.push(PageDiagnostic::ImageUnavailable {
                url: asset.url.clone(),
                reason: "no room left for the illustration".to_string(),
            });
        }
    }

    place_text_block(&mut draft, lines, text_height, text_area, frame, spec.text_position);
    draft
}

fn place_text_block(
    draft: &mut PageDraft,
    lines: Vec<LineRecord>,
    text_height: f32,
    (area_top, area_height): (f32, f32),
    frame: BodyFrame,
    position: TextPosition,
) {
    let offset = if text_height > area_height {
        0.0
    } else {
        match position {
            TextPosition::Top => 0.0,
            TextPosition::Middle => (area_height - text_height) / 2.0,
            TextPosition::Bottom => area_height - text_height,
        }
    };

    let mut cursor = 0.0_f32;
    let mut dropped = 0usize;
    for line in lines {
        if cursor + line.height > area_height + EPSILON {
            if line.kind != LineKind::Spacing {
                dropped += 1;
            }
            continue;
        }
        let y = frame.top + area_top + offset + cursor;
        cursor += line.height;
        if line.kind == LineKind::Spacing {
            continue;
        }
        draft.boxes.push(PlacedBox {
            kind: BoxKind::Text,
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

    if dropped > 0 {
        warn!(lines_dropped = dropped, "Page text does not fit its frame");
        draft.diagnostics.push(PageDiagnostic::TextOverflow {
            lines_dropped: dropped,
        });
    }
}

/// Largest size preserving aspect ratio that fits the box without exceeding
/// the image's native print size.
pub fn aspect_fit(asset: &ImageAsset, box_width: f32, box_height: f32, dpi: f32) -> (f32, f32) {
    if asset.width_px == 0 || asset.height_px == 0 || box_width <= 0.0 || box_height <= 0.0 {
        return (0.0, 0.0);
    }
    let points_per_px = POINTS_PER_INCH / dpi.max(1.0);
    let native_w = asset.width_px as f32 * points_per_px;
    let native_h = asset.height_px as f32 * points_per_px;
    let scale = (box_width / native_w).min(box_height / native_h).min(1.0);
    (native_w * scale, native_h * scale)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
