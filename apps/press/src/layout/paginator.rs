//! Paginator: slices a chapter's line stream into page drafts.
//!
//! # State machine (per chapter)
//! - NEW_PAGE: cursor at the top of the body frame. On the chapter's first
//!   page the heading lines come first because the flow emits them first.
//! - FILLING: a line is placed while `y + h` stays within the frame height.
//!   Spacing lines are dropped at the top of a page.
//! - PAGE_FULL: orphan/widow adjustment, then the page is emitted. Lines
//!   pushed off the page are carried to the top of the next one; headings are
//!   never re-placed.
//!
//! # Orphan rule
//! A paragraph that starts on a page must leave at least two lines on it;
//! otherwise its lines move to the next page. The exception is a paragraph
//! that is the only body content on the page.
//!
//! # Widow rule
//! The final line of a paragraph that began earlier must not open a page
//! alone; one more line is carried along with it. Knowing whether the
//! overflowing line is a paragraph's last needs one line of lookahead, which
//! lives in [`LineBuffer`] and nowhere else.
//!
//! Neither rule may empty a page of body text. When a page has room for a
//! single body line (a chapter opening whose heading fills the rest), that
//! line stays even if the paragraph's final line then opens the next page
//! alone: a widow is preferred over a heading stranded on its own page.

use std::collections::VecDeque;
use std::iter::Peekable;

use crate::errors::{PressError, PressResult};
use crate::layout::flow::{LineKind, LineRecord};
use crate::layout::EPSILON;
use crate::models::{BoxContent, BoxKind, PageDraft, PageGeometry, PageRole, PlacedBox};

// ────────────────────────────────────────────────────────────────────────────
// Body frame
// ────────────────────────────────────────────────────────────────────────────

/// The part of the content box available to body text, after the header and
/// footer bands are reserved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyFrame {
    /// Offset of the frame from the top of the content box.
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl BodyFrame {
    pub fn new(geometry: &PageGeometry, header_band: f32, footer_band: f32) -> PressResult<Self> {
        let height = geometry.content_height() - header_band - footer_band;
        if header_band < 0.0 || footer_band < 0.0 || height <= 0.0 {
            return Err(PressError::InvalidGeometry(format!(
                "no room for body text: content height {}pt, header {header_band}pt, footer {footer_band}pt",
                geometry.content_height()
            )));
        }
        Ok(Self {
            top: header_band,
            width: geometry.content_width(),
            height,
        })
    }

    /// Rejects frames that cannot hold a single line of the given height.
    pub fn require_line(&self, line_height: f32, what: &str) -> PressResult<()> {
        if line_height > self.height + EPSILON {
            return Err(PressError::InvalidGeometry(format!(
                "{what} line of {line_height:.1}pt does not fit a {:.1}pt body frame",
                self.height
            )));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Lookahead buffer
// ────────────────────────────────────────────────────────────────────────────

/// Line source with one line of lookahead beyond the front line.
struct LineBuffer<I: Iterator<Item = LineRecord>> {
    inner: Peekable<I>,
    held: Option<LineRecord>,
}

impl<I: Iterator<Item = LineRecord>> LineBuffer<I> {
    fn new(inner: I) -> Self {
        Self {
            inner: inner.peekable(),
            held: None,
        }
    }

    fn peek(&mut self) -> Option<&LineRecord> {
        if self.held.is_some() {
            self.held.as_ref()
        } else {
            self.inner.peek()
        }
    }

    fn take(&mut self) -> Option<LineRecord> {
        self.held.take().or_else(|| self.inner.next())
    }

    /// True when the front line is the final line of its paragraph.
    fn front_closes_paragraph(&mut self) -> bool {
        if self.held.is_none() {
            self.held = self.inner.next();
        }
        let Some(paragraph) = self.held.as_ref().and_then(|l| l.paragraph) else {
            return false;
        };
        match self.inner.peek() {
            Some(next) => next.paragraph != Some(paragraph),
            None => true,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Page builder
// ────────────────────────────────────────────────────────────────────────────

struct PageBuilder {
    frame: BodyFrame,
    placed: Vec<(LineRecord, f32)>,
    cursor: f32,
}

impl PageBuilder {
    fn new(frame: BodyFrame) -> Self {
        Self {
            frame,
            placed: Vec::new(),
            cursor: 0.0,
        }
    }

    fn is_empty(&self) -> bool {
        self.placed.is_empty()
    }

    fn fits(&self, height: f32) -> bool {
        self.cursor + height <= self.frame.height + EPSILON
    }

    fn place(&mut self, line: LineRecord) {
        let y = self.cursor;
        self.cursor += line.height;
        self.placed.push((line, y));
    }

    fn pop(&mut self) -> Option<LineRecord> {
        let (line, y) = self.placed.pop()?;
        self.cursor = y;
        Some(line)
    }

    fn trim_trailing_spacing(&mut self) {
        while self
            .placed
            .last()
            .is_some_and(|(l, _)| l.kind == LineKind::Spacing)
        {
            self.pop();
        }
    }

    /// Number of consecutive body lines of `paragraph` at the end of the page.
    fn trailing_lines_of(&self, paragraph: usize) -> usize {
        self.placed
            .iter()
            .rev()
            .take_while(|(l, _)| l.paragraph == Some(paragraph))
            .count()
    }

    fn body_line_count(&self) -> usize {
        self.placed
            .iter()
            .filter(|(l, _)| l.kind == LineKind::Body)
            .count()
    }

    fn finish(self, role: PageRole) -> PageDraft {
        let top = self.frame.top;
        let mut draft = PageDraft::new(role);
        draft.boxes = self
            .placed
            .into_iter()
            .filter(|(l, _)| l.kind != LineKind::Spacing)
            .map(|(line, y)| PlacedBox {
                kind: if line.kind == LineKind::Heading {
                    BoxKind::Heading
                } else {
                    BoxKind::Text
                },
                x: line.x,
                y: top + y,
                w: line.width,
                h: line.height,
                content: BoxContent::Text {
                    font: line.font,
                    runs: line.runs,
                },
            })
            .collect();
        draft
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Paginator
// ────────────────────────────────────────────────────────────────────────────

/// What the pages being cut belong to.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Chapter { number: u32, title: String },
    FrontMatter,
}

/// Starts paginating one chapter (or front-matter section).
pub fn paginate<I>(lines: I, frame: BodyFrame, section: Section) -> ChapterPages<I::IntoIter>
where
    I: IntoIterator<Item = LineRecord>,
{
    ChapterPages {
        lines: LineBuffer::new(lines.into_iter()),
        frame,
        section,
        carry: VecDeque::new(),
        emitted: 0,
        done: false,
    }
}

/// Lazy iterator of page drafts for one chapter.
pub struct ChapterPages<I: Iterator<Item = LineRecord>> {
    lines: LineBuffer<I>,
    frame: BodyFrame,
    section: Section,
    carry: VecDeque<LineRecord>,
    emitted: usize,
    done: bool,
}

impl<I: Iterator<Item = LineRecord>> ChapterPages<I> {
    fn role(&self) -> PageRole {
        match &self.section {
            Section::Chapter { number, title } => PageRole::Chapter {
                number: *number,
                title: title.clone(),
                opening: self.emitted == 0,
            },
            Section::FrontMatter => PageRole::FrontMatter,
        }
    }

    /// PAGE_FULL: decide which trailing lines move to the next page.
    fn close_page(&mut self, page: &mut PageBuilder) {
        let (paragraph, line_in_paragraph) = match self.lines.peek() {
            Some(front) => (front.paragraph, front.line_in_paragraph),
            None => (None, 0),
        };

        if let Some(p) = paragraph {
            let closes = self.lines.front_closes_paragraph();
            let on_page = page.trailing_lines_of(p);
            let started_here = on_page > 0
                && page.placed[page.placed.len() - on_page].0.line_in_paragraph == 0;
            let other_body = page.body_line_count() > on_page;
            let widow = line_in_paragraph > 0 && closes;

            let mut carry = if widow { on_page.min(1) } else { 0 };
            if started_here && on_page - carry == 1 {
                carry = on_page;
            }
            if carry > 0 && carry == on_page && !other_body {
                // Moving everything would leave the page without body text.
                // With a single line on the page the widow is accepted.
                carry = if widow && on_page >= 3 { 1 } else { 0 };
            }

            for _ in 0..carry {
                if let Some(line) = page.pop() {
                    self.carry.push_front(line);
                }
            }
        }

        page.trim_trailing_spacing();
    }
}

impl<I: Iterator<Item = LineRecord>> Iterator for ChapterPages<I> {
    type Item = PageDraft;

    fn next(&mut self) -> Option<PageDraft> {
        if self.done {
            return None;
        }

        let mut page = PageBuilder::new(self.frame);
        while let Some(line) = self.carry.pop_front() {
            page.place(line);
        }

        loop {
            let (kind, height) = match self.lines.peek() {
                Some(front) => (front.kind, front.height),
                None => {
                    self.done = true;
                    page.trim_trailing_spacing();
                    break;
                }
            };

            if kind == LineKind::Spacing && page.is_empty() {
                self.lines.take();
                continue;
            }

            // An empty page always accepts its first line so the flow advances.
            if page.fits(height) || page.is_empty() {
                if let Some(line) = self.lines.take() {
                    page.place(line);
                }
                continue;
            }

            self.close_page(&mut page);
            break;
        }

        if page.is_empty() && self.emitted > 0 {
            return None;
        }
        let draft = page.finish(self.role());
        self.emitted += 1;
        Some(draft)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::font_metrics::FontSpec;
    use crate::models::TextRun;

    fn make_frame(height: f32) -> BodyFrame {
        BodyFrame {
            top: 0.0,
            width: 300.0,
            height,
        }
    }

    fn line(kind: LineKind, paragraph: Option<usize>, index: usize, height: f32) -> LineRecord {
        let text = match paragraph {
            Some(p) => format!("p{p}l{index}"),
            None => String::new(),
        };
        LineRecord {
            kind,
            runs: vec![TextRun {
                text,
                style: Default::default(),
            }],
            font: FontSpec::new("Times", 10.0),
            width: 100.0,
            height,
            x: 0.0,
            paragraph,
            line_in_paragraph: index,
        }
    }

    fn paragraph(id: usize, count: usize) -> Vec<LineRecord> {
        (0..count)
            .map(|i| line(LineKind::Body, Some(id), i, 10.0))
            .collect()
    }

    fn spacing(height: f32) -> LineRecord {
        line(LineKind::Spacing, None, 0, height)
    }

    fn heading() -> LineRecord {
        let mut l = line(LineKind::Heading, None, 0, 10.0);
        l.runs[0].text = "Chapter 1".into();
        l
    }

    fn texts(page: &PageDraft) -> Vec<String> {
        page.boxes.iter().map(|b| b.content.text()).collect()
    }

    fn chapter() -> Section {
        Section::Chapter {
            number: 1,
            title: "One".into(),
        }
    }

    #[test]
    fn test_body_frame_reserves_bands() {
        let geometry = PageGeometry::content_box(300.0, 400.0).unwrap();
        let frame = BodyFrame::new(&geometry, 20.0, 30.0).unwrap();
        assert_eq!(frame.top, 20.0);
        assert_eq!(frame.height, 350.0);
        assert!(BodyFrame::new(&geometry, 200.0, 200.0).is_err());
        assert!(frame.require_line(351.0, "body").is_err());
    }

    #[test]
    fn test_lookahead_detects_final_line() {
        let mut lines = paragraph(0, 2);
        lines.push(spacing(10.0));
        lines.extend(paragraph(1, 1));
        let mut buffer = LineBuffer::new(lines.into_iter());
        assert!(!buffer.front_closes_paragraph());
        assert_eq!(buffer.take().unwrap().line_in_paragraph, 0);
        assert!(buffer.front_closes_paragraph());
        buffer.take();
        assert!(!buffer.front_closes_paragraph(), "spacing has no paragraph");
        buffer.take();
        assert!(buffer.front_closes_paragraph(), "end of stream closes");
    }

    #[test]
    fn test_fills_pages_in_order() {
        let mut lines = paragraph(0, 10);
        lines.extend(paragraph(1, 10));
        lines.extend(paragraph(2, 5));
        let pages: Vec<PageDraft> = paginate(lines, make_frame(100.0), chapter()).collect();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].boxes.len(), 10);
        assert_eq!(pages[2].boxes.len(), 5);
        assert_eq!(pages[1].boxes[0].y, 0.0);
        assert_eq!(pages[1].boxes[9].y, 90.0);
        for page in &pages {
            assert!(page.boxes.iter().all(|b| b.bottom() <= 100.0));
        }
    }

    #[test]
    fn test_opening_flag_only_on_first_page() {
        let mut lines = vec![heading()];
        lines.extend(paragraph(0, 30));
        let pages: Vec<PageDraft> = paginate(lines, make_frame(100.0), chapter()).collect();
        assert_eq!(pages[0].boxes[0].kind, BoxKind::Heading);
        assert!(matches!(pages[0].role, PageRole::Chapter { opening: true, .. }));
        for page in &pages[1..] {
            assert!(matches!(page.role, PageRole::Chapter { opening: false, .. }));
            assert!(page.boxes.iter().all(|b| b.kind != BoxKind::Heading));
        }
    }

    #[test]
    fn test_orphan_first_line_moves_to_next_page() {
        let mut lines = paragraph(0, 8);
        lines.push(spacing(10.0));
        lines.extend(paragraph(1, 5));
        let pages: Vec<PageDraft> = paginate(lines, make_frame(100.0), chapter()).collect();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].boxes.len(), 8);
        assert_eq!(texts(&pages[0]).last().unwrap(), "p0l7");
        assert_eq!(texts(&pages[1])[0], "p1l0");
        assert_eq!(pages[1].boxes[0].y, 0.0);
        assert_eq!(pages[1].boxes.len(), 5);
    }

    #[test]
    fn test_widow_pulls_previous_line_forward() {
        let lines = paragraph(0, 11);
        let pages: Vec<PageDraft> = paginate(lines, make_frame(100.0), chapter()).collect();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].boxes.len(), 9);
        assert_eq!(texts(&pages[1]), vec!["p0l9", "p0l10"]);
    }

    #[test]
    fn test_widow_and_orphan_together_move_whole_paragraph() {
        let mut lines = paragraph(0, 7);
        lines.push(spacing(10.0));
        lines.extend(paragraph(1, 3));
        let pages: Vec<PageDraft> = paginate(lines, make_frame(100.0), chapter()).collect();
        assert_eq!(pages[0].boxes.len(), 7);
        assert_eq!(texts(&pages[1]), vec!["p1l0", "p1l1", "p1l2"]);
    }

    #[test]
    fn test_single_line_allowed_when_paragraph_is_all_content() {
        let mut lines = vec![heading(), spacing(80.0)];
        lines.extend(paragraph(0, 4));
        let pages: Vec<PageDraft> = paginate(lines, make_frame(100.0), chapter()).collect();
        assert_eq!(texts(&pages[0]), vec!["Chapter 1", "p0l0"]);
        assert_eq!(texts(&pages[1]), vec!["p0l1", "p0l2", "p0l3"]);
    }

    #[test]
    fn test_one_line_opening_keeps_line_over_widow() {
        // Heading and gap leave room for exactly one body line.
        let mut lines = vec![heading(), spacing(80.0)];
        lines.extend(paragraph(0, 2));
        lines.push(spacing(10.0));
        lines.extend(paragraph(1, 3));
        let pages: Vec<PageDraft> = paginate(lines, make_frame(100.0), chapter()).collect();
        assert_eq!(texts(&pages[0]), vec!["Chapter 1", "p0l0"]);
        assert_eq!(texts(&pages[1]), vec!["p0l1", "p1l0", "p1l1", "p1l2"]);
    }

    #[test]
    fn test_spacing_dropped_at_page_top() {
        let mut lines = paragraph(0, 10);
        lines.push(spacing(10.0));
        lines.extend(paragraph(1, 3));
        let pages: Vec<PageDraft> = paginate(lines, make_frame(100.0), chapter()).collect();
        assert_eq!(pages.len(), 2);
        assert_eq!(texts(&pages[1])[0], "p1l0");
        assert_eq!(pages[1].boxes[0].y, 0.0);
    }

    #[test]
    fn test_heading_only_chapter_emits_one_page() {
        let lines = vec![heading(), spacing(10.0)];
        let pages: Vec<PageDraft> = paginate(lines, make_frame(100.0), chapter()).collect();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].boxes.len(), 1);
        assert_eq!(pages[0].boxes[0].kind, BoxKind::Heading);
    }

    #[test]
    fn test_frame_top_offsets_boxes() {
        let frame = BodyFrame {
            top: 15.0,
            width: 300.0,
            height: 100.0,
        };
        let pages: Vec<PageDraft> = paginate(paragraph(0, 3), frame, Section::FrontMatter).collect();
        assert_eq!(pages[0].boxes[0].y, 15.0);
        assert_eq!(pages[0].role, PageRole::FrontMatter);
    }
}
