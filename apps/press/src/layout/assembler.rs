//! Document assembler: turns page drafts into numbered pages.
//!
//! Pages are appended in reading order. Each gets a 1-based contiguous index;
//! body pages also get a folio counted from 1. Furniture (page number, running
//! header) is added here and only here, inside the bands the body frame left
//! free, so no box ever crosses the content box.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::errors::{PressError, PressResult};
use crate::layout::font_metrics::{FontStyle, ScaledFont};
use crate::layout::paginator::BodyFrame;
use crate::layout::EPSILON;
use crate::models::{BoxContent, BoxKind, Page, PageDraft, PageGeometry, PageRole, PlacedBox, TextRun};

/// Shared cancellation signal, checked once per page.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the flag is raised.
    pub fn check(&self, pages: usize) -> PressResult<()> {
        if self.is_cancelled() {
            return Err(PressError::Cancelled { pages });
        }
        Ok(())
    }
}

/// Which furniture a mode prints, and the bands reserved for it.
#[derive(Debug, Clone, PartialEq)]
pub struct FurniturePolicy {
    pub page_numbers: bool,
    /// Book title on even folios, chapter title on odd ones. Never on a
    /// chapter's opening page.
    pub running_header: bool,
    /// Height reserved at the top of the content box.
    pub header_band: f32,
    /// Height reserved at the bottom of the content box.
    pub footer_band: f32,
}

impl FurniturePolicy {
    pub fn book() -> Self {
        Self {
            page_numbers: true,
            running_header: true,
            header_band: 24.0,
            footer_band: 24.0,
        }
    }

    pub fn childrens() -> Self {
        Self {
            page_numbers: true,
            running_header: false,
            header_band: 0.0,
            footer_band: 24.0,
        }
    }

    pub fn none() -> Self {
        Self {
            page_numbers: false,
            running_header: false,
            header_band: 0.0,
            footer_band: 0.0,
        }
    }

    /// Body frame left over once the bands are reserved.
    pub fn frame(&self, geometry: &PageGeometry) -> PressResult<BodyFrame> {
        BodyFrame::new(geometry, self.header_band, self.footer_band)
    }
}

pub struct Assembler<'a> {
    geometry: &'a PageGeometry,
    policy: &'a FurniturePolicy,
    font: ScaledFont,
    book_title: String,
    cancel: &'a CancelFlag,
    pages: Vec<Page>,
    next_folio: u32,
}

impl<'a> Assembler<'a> {
    /// Fails with `InvalidGeometry` when an enabled band cannot hold one line
    /// of the furniture font.
    pub fn new(
        geometry: &'a PageGeometry,
        policy: &'a FurniturePolicy,
        font: ScaledFont,
        book_title: impl Into<String>,
        cancel: &'a CancelFlag,
    ) -> PressResult<Self> {
        let needed = font.line_height();
        if policy.page_numbers && policy.footer_band + EPSILON < needed {
            return Err(PressError::InvalidGeometry(format!(
                "footer band of {}pt cannot hold {needed:.1}pt page numbers",
                policy.footer_band
            )));
        }
        if policy.running_header && policy.header_band + EPSILON < needed {
            return Err(PressError::InvalidGeometry(format!(
                "header band of {}pt cannot hold a {needed:.1}pt running header",
                policy.header_band
            )));
        }

        Ok(Self {
            geometry,
            policy,
            font,
            book_title: book_title.into(),
            cancel,
            pages: Vec::new(),
            next_folio: 1,
        })
    }

    /// Folio the next body page will carry.
    pub fn next_folio(&self) -> u32 {
        self.next_folio
    }

    /// Appends an unnumbered page. Returns its index.
    pub fn push_front_matter(&mut self, draft: PageDraft) -> PressResult<u32> {
        self.push(draft, None)
    }

    /// Appends a numbered page. Returns its folio.
    pub fn push_body(&mut self, draft: PageDraft) -> PressResult<u32> {
        let folio = self.next_folio;
        self.push(draft, Some(folio))?;
        self.next_folio += 1;
        Ok(folio)
    }

    pub fn extend_front_matter<I>(&mut self, drafts: I) -> PressResult<()>
    where
        I: IntoIterator<Item = PageDraft>,
    {
        for draft in drafts {
            self.push_front_matter(draft)?;
        }
        Ok(())
    }

    pub fn extend_body<I>(&mut self, drafts: I) -> PressResult<()>
    where
        I: IntoIterator<Item = PageDraft>,
    {
        for draft in drafts {
            self.push_body(draft)?;
        }
        Ok(())
    }

    pub fn finish(self) -> Vec<Page> {
        debug!(pages = self.pages.len(), "Assembly complete");
        self.pages
    }

    fn push(&mut self, draft: PageDraft, folio: Option<u32>) -> PressResult<u32> {
        self.cancel.check(self.pages.len())?;

        let index = self.pages.len() as u32 + 1;
        let header = folio.and_then(|f| self.running_header_text(&draft.role, f));
        let mut page = Page::from_draft(index, folio, draft);

        if let Some(text) = header {
            let line = self.line_box(BoxKind::RunningHeader, text, FontStyle::Italic, 0.0);
            page.append_furniture(line);
        }
        if let (true, Some(folio)) = (self.policy.page_numbers, folio) {
            let band_top = self.geometry.content_height() - self.policy.footer_band;
            let number = self.line_box(BoxKind::PageNumber, folio.to_string(), FontStyle::Regular, band_top);
            page.append_furniture(number);
        }

        self.pages.push(page);
        Ok(index)
    }

    fn running_header_text(&self, role: &PageRole, folio: u32) -> Option<String> {
        if !self.policy.running_header {
            return None;
        }
        match role {
            PageRole::Chapter { opening: true, .. } => None,
            PageRole::Chapter { title, .. } if folio % 2 == 1 => Some(title.clone()),
            PageRole::Chapter { .. } => Some(self.book_title.clone()),
            _ => None,
        }
        .filter(|t| !t.trim().is_empty())
    }

    /// One centered furniture line, vertically centered in a band starting
    /// at `band_top`.
    fn line_box(&self, kind: BoxKind, text: String, style: FontStyle, band_top: f32) -> PlacedBox {
        let font = self.font.styled(style);
        let band = match kind {
            BoxKind::RunningHeader => self.policy.header_band,
            _ => self.policy.footer_band,
        };
        let width = self.geometry.content_width();
        let w = font.measure(&text).min(width);
        let h = font.line_height();
        PlacedBox {
            kind,
            x: (width - w) / 2.0,
            y: band_top + ((band - h) / 2.0).max(0.0),
            w,
            h,
            content: BoxContent::Text {
                font: font.spec().clone(),
                runs: vec![TextRun { text, style }],
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
