//! Layout engine entry points.
//!
//! `Engine` owns the shared font backend and the rendering backend. A
//! render call is synchronous and atomic: it either returns the bytes of the
//! whole document or an error, never a partial sequence. Callers on an async
//! runtime go through [`crate::pool::RenderPool`].

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, instrument, warn};

use crate::errors::PressResult;
use crate::layout::front_matter::{
    about_author_pages, contents_pages, dedication_page, title_page, ContentsEntry,
    FrontMatterStyle, TitlePageFonts,
};
use crate::layout::{
    flow, paginate, plan, Align, Assembler, BodyFrame, CancelFlag, Face, FallbackChain,
    FlowBlock, FlowFonts, FlowSettings, FontFallback, FontSpec, FontStyle, FurniturePolicy,
    PlannerSettings, ScaledFont, Section, TextMeasurer,
};
use crate::models::{
    Chapter, ChildPageSpec, Document, Margins, Page, PageColor, PageDiagnostic, PageDraft,
    PageGeometry, TrimSize, POINTS_PER_INCH,
};
use crate::render::{BookMode, DocumentInfo, PageRenderer};

/// Serif family used when a requested face is missing.
pub const DEFAULT_SERIF: &str = "Times";
pub const DEFAULT_DECORATIVE: &str = "Schoolbook";

// ────────────────────────────────────────────────────────────────────────────
// Styles
// ────────────────────────────────────────────────────────────────────────────

/// Everything about a book's look besides geometry and the body font.
#[derive(Debug, Clone, PartialEq)]
pub struct BookStyle {
    pub page_color: PageColor,
    /// Line advance as a multiple of the font's line height.
    pub line_spacing: f32,
    /// Space between paragraphs, in body line advances.
    pub paragraph_spacing: f32,
    pub paragraph_indent: f32,
    pub heading_size: f32,
    /// Space after a chapter heading, in body line advances.
    pub heading_gap: f32,
    pub title_size: f32,
    pub byline_size: f32,
    pub dedication_size: f32,
    pub furniture: FurniturePolicy,
    pub furniture_size: f32,
    pub front_matter: FrontMatterStyle,
}

impl Default for BookStyle {
    fn default() -> Self {
        Self {
            page_color: PageColor::Cream,
            line_spacing: 1.25,
            paragraph_spacing: 1.0,
            paragraph_indent: 0.3 * POINTS_PER_INCH,
            heading_size: 18.0,
            heading_gap: 1.5,
            title_size: 24.0,
            byline_size: 16.0,
            dedication_size: 12.0,
            furniture: FurniturePolicy::book(),
            furniture_size: 9.0,
            front_matter: FrontMatterStyle {
                title_drop: 2.0 * POINTS_PER_INCH,
                title_gap: 12.0,
                byline_gap: 30.0,
                dedication_drop: 2.0 * POINTS_PER_INCH,
                contents_heading_gap: 12.0,
                contents_entry_gap: 6.0,
                contents_folio_gap: 18.0,
                line_spacing: 1.0,
            },
        }
    }
}

/// Fixed look of an illustrated children's book.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildrensStyle {
    pub trim: TrimSize,
    pub margins: Margins,
    pub page_color: PageColor,
    pub font_size: f32,
    pub title_page: bool,
    pub title_size: f32,
    pub byline_size: f32,
    pub furniture: FurniturePolicy,
    pub furniture_size: f32,
    pub front_matter: FrontMatterStyle,
    pub planner: PlannerSettings,
}

impl Default for ChildrensStyle {
    fn default() -> Self {
        Self {
            trim: TrimSize::Letter,
            margins: Margins::childrens(),
            page_color: PageColor::White,
            font_size: 16.0,
            title_page: true,
            title_size: 32.0,
            byline_size: 18.0,
            furniture: FurniturePolicy::childrens(),
            furniture_size: 10.0,
            front_matter: FrontMatterStyle {
                title_drop: 3.0 * POINTS_PER_INCH,
                title_gap: 0.5 * POINTS_PER_INCH,
                byline_gap: 12.0,
                dedication_drop: 2.0 * POINTS_PER_INCH,
                contents_heading_gap: 12.0,
                contents_entry_gap: 6.0,
                contents_folio_gap: 18.0,
                line_spacing: 1.0,
            },
            planner: PlannerSettings {
                image_share: 0.6,
                image_gap: 18.0,
                image_dpi: 72.0,
                // 16pt on 24pt leading.
                flow: FlowSettings {
                    width: 0.0,
                    line_spacing: 1.25,
                    paragraph_spacing: 1.0,
                    paragraph_indent: 0.0,
                    heading_gap: 0.0,
                    align: Align::Center,
                },
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

pub struct Engine {
    metrics: Arc<dyn TextMeasurer>,
    renderer: Arc<dyn PageRenderer>,
    serif: String,
    decorative: String,
    childrens: ChildrensStyle,
}

impl Engine {
    pub fn new(metrics: Arc<dyn TextMeasurer>, renderer: Arc<dyn PageRenderer>) -> Self {
        Self {
            metrics,
            renderer,
            serif: DEFAULT_SERIF.to_string(),
            decorative: DEFAULT_DECORATIVE.to_string(),
            childrens: ChildrensStyle::default(),
        }
    }

    /// Family substituted when a requested face is missing.
    pub fn with_serif(mut self, family: impl Into<String>) -> Self {
        self.serif = family.into();
        self
    }

    /// Family used for children's-book text.
    pub fn with_decorative(mut self, family: impl Into<String>) -> Self {
        self.decorative = family.into();
        self
    }

    pub fn with_childrens_style(mut self, style: ChildrensStyle) -> Self {
        self.childrens = style;
        self
    }

    /// Lays out a prose book and hands it to the rendering backend.
    pub fn render_book(
        &self,
        document: &Document,
        geometry: &PageGeometry,
        font: &FontSpec,
        style: &BookStyle,
        cancel: &CancelFlag,
    ) -> PressResult<Bytes> {
        let pages = self.layout_book(document, geometry, font, style, cancel)?;
        let info = DocumentInfo::new(
            BookMode::Book,
            &document.title,
            &document.author,
            *geometry,
            style.page_color,
        );
        self.renderer.render_pages(&info, &pages)
    }

    /// Lays out an illustrated book on the fixed children's trim.
    pub fn render_childrens_book(
        &self,
        title: &str,
        author: &str,
        specs: &[ChildPageSpec],
        cancel: &CancelFlag,
    ) -> PressResult<Bytes> {
        let (geometry, pages) = self.layout_childrens_book(title, author, specs, cancel)?;
        let info = DocumentInfo::new(
            BookMode::Childrens,
            title,
            author,
            geometry,
            self.childrens.page_color,
        );
        self.renderer.render_pages(&info, &pages)
    }

    // ── Book ────────────────────────────────────────────────────────────────

    #[instrument(skip_all, fields(title = %document.title, chapters = document.chapters.len()))]
    pub fn layout_book(
        &self,
        document: &Document,
        geometry: &PageGeometry,
        font: &FontSpec,
        style: &BookStyle,
        cancel: &CancelFlag,
    ) -> PressResult<Vec<Page>> {
        let chain = FallbackChain::with_serif_fallback(&font.family, &self.serif);
        let resolved = self.metrics.resolve_chain(&chain, font.size_pt, font.style)?;
        let family = resolved.font.spec().family.clone();
        let fallback = resolved.fallback;

        let body = Face::new(resolved.font);
        let heading = Face::new(self.sized(&family, style.heading_size)?);
        let frame = style.furniture.frame(geometry)?;
        frame.require_line(body.regular().line_height() * style.line_spacing, "body")?;
        frame.require_line(heading.regular().line_height() * style.line_spacing, "heading")?;

        let fonts = FlowFonts { body, heading };
        let settings = FlowSettings {
            width: frame.width,
            line_spacing: style.line_spacing,
            paragraph_spacing: style.paragraph_spacing,
            paragraph_indent: style.paragraph_indent,
            heading_gap: style.heading_gap,
            align: Align::Left,
        };

        // Chapters go first: the contents pages need their folios.
        let mut body_drafts: Vec<PageDraft> = Vec::new();
        let mut contents = Vec::with_capacity(document.chapters.len());
        for chapter in &document.chapters {
            contents.push(ContentsEntry {
                title: chapter_label(chapter),
                folio: body_drafts.len() as u32 + 1,
            });
            let drafts = layout_chapter(chapter, &fonts, &settings, frame, cancel, body_drafts.len())
                .map_err(|e| e.in_chapter(chapter.number))?;
            body_drafts.extend(drafts);
        }

        let mut front = vec![title_page(
            &document.title,
            &document.author,
            document.genre.as_deref(),
            &TitlePageFonts {
                title: Face::new(self.sized(&family, style.title_size)?),
                byline: Face::new(self.sized(&family, style.byline_size)?),
            },
            frame,
            &style.front_matter,
        )];
        if let Some(dedication) = document.dedication.as_deref().filter(|d| !d.trim().is_empty()) {
            let face = Face::new(self.sized(&family, style.dedication_size)?);
            front.push(dedication_page(dedication, &face, frame, &style.front_matter));
        }
        if let Some(about) = document.about_author.as_deref().filter(|a| !a.trim().is_empty()) {
            front.extend(about_author_pages(about, &fonts, &settings, frame));
        }
        front.extend(contents_pages(&contents, &fonts, frame, &style.front_matter));

        let furniture_font = self.sized(&family, style.furniture_size)?;
        let mut assembler = Assembler::new(
            geometry,
            &style.furniture,
            furniture_font,
            &document.title,
            cancel,
        )?;
        assembler.extend_front_matter(flagged(front, fallback.as_ref()))?;
        assembler.extend_body(flagged(body_drafts, fallback.as_ref()))?;
        let pages = assembler.finish();

        info!(
            pages = pages.len(),
            font = %family,
            fallback = fallback.is_some(),
            "Book laid out"
        );
        Ok(pages)
    }

    // ── Children's book ─────────────────────────────────────────────────────

    #[instrument(skip_all, fields(title = %title, pages = specs.len()))]
    pub fn layout_childrens_book(
        &self,
        title: &str,
        author: &str,
        specs: &[ChildPageSpec],
        cancel: &CancelFlag,
    ) -> PressResult<(PageGeometry, Vec<Page>)> {
        let style = &self.childrens;
        let geometry = PageGeometry::from_trim(style.trim, style.margins)?;

        let chain = FallbackChain::with_serif_fallback(&self.decorative, &self.serif);
        let resolved = self
            .metrics
            .resolve_chain(&chain, style.font_size, FontStyle::Regular)?;
        let family = resolved.font.spec().family.clone();
        let fallback = resolved.fallback;

        let face = Face::new(resolved.font);
        let frame = style.furniture.frame(&geometry)?;
        frame.require_line(
            face.regular().line_height() * style.planner.flow.line_spacing,
            "page text",
        )?;
        let fonts = FlowFonts {
            body: face.clone(),
            heading: face,
        };

        let mut front = Vec::new();
        if style.title_page && !title.trim().is_empty() {
            front.push(title_page(
                title,
                author,
                None,
                &TitlePageFonts {
                    title: Face::new(self.sized(&family, style.title_size)?),
                    byline: Face::new(self.sized(&family, style.byline_size)?),
                },
                frame,
                &style.front_matter,
            ));
        }

        let furniture_font = self.sized(&family, style.furniture_size)?;
        let mut assembler =
            Assembler::new(&geometry, &style.furniture, furniture_font, title, cancel)?;
        assembler.extend_front_matter(flagged(front, fallback.as_ref()))?;
        // Planned lazily; the assembler checks the cancel flag per page.
        assembler.extend_body(plan(specs, frame, &fonts, &style.planner, fallback.as_ref()))?;
        let pages = assembler.finish();

        info!(
            pages = pages.len(),
            font = %family,
            fallback = fallback.is_some(),
            "Children's book laid out"
        );
        Ok((geometry, pages))
    }

    fn sized(&self, family: &str, size_pt: f32) -> PressResult<ScaledFont> {
        self.metrics.resolve(&FontSpec::new(family, size_pt))
    }
}

/// One chapter's pages. `pages_before` is only used to report how far a
/// cancelled job got.
fn layout_chapter(
    chapter: &Chapter,
    fonts: &FlowFonts,
    settings: &FlowSettings,
    frame: BodyFrame,
    cancel: &CancelFlag,
    pages_before: usize,
) -> PressResult<Vec<PageDraft>> {
    let mut heading = vec![format!("Chapter {}", chapter.number)];
    if !chapter.title.trim().is_empty() {
        heading.push(chapter.title.trim().to_string());
    }
    let mut blocks = vec![FlowBlock::Heading(heading)];
    blocks.extend(chapter.body.iter().map(FlowBlock::Paragraph));

    let section = Section::Chapter {
        number: chapter.number,
        title: chapter_label(chapter),
    };
    let mut drafts = Vec::new();
    for draft in paginate(flow(blocks, fonts, settings), frame, section) {
        cancel.check(pages_before + drafts.len())?;
        drafts.push(draft);
    }

    if !chapter.has_body() {
        warn!(chapter = chapter.number, "Chapter has no body text");
        if let Some(first) = drafts.first_mut() {
            first.diagnostics.push(PageDiagnostic::EmptyChapter {
                chapter: chapter.number,
            });
        }
    }
    Ok(drafts)
}

/// Chapter title as shown in running headers and the contents.
fn chapter_label(chapter: &Chapter) -> String {
    match chapter.title.trim() {
        "" => format!("Chapter {}", chapter.number),
        title => title.to_string(),
    }
}

fn flagged<'a, I>(drafts: I, fallback: Option<&'a FontFallback>) -> impl Iterator<Item = PageDraft> + 'a
where
    I: IntoIterator<Item = PageDraft>,
    I::IntoIter: 'a,
{
    drafts.into_iter().map(move |mut draft| {
        if let Some(fallback) = fallback {
            draft
                .diagnostics
                .push(PageDiagnostic::FontFallback(fallback.clone()));
        }
        draft
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::errors::PressError;
    use crate::layout::MetricsProvider;
    use crate::models::{BoxContent, BoxKind, PageRole, Paragraph};
    use crate::render::JsonRenderer;

    fn make_engine(metrics: MetricsProvider) -> Engine {
        Engine::new(Arc::new(metrics), Arc::new(JsonRenderer::new()))
    }

    fn make_chapter(number: u32, words: usize) -> Chapter {
        let body = if words == 0 {
            Vec::new()
        } else {
            vec![Paragraph::plain(vec!["word"; words].join(" "))]
        };
        Chapter::new(number, format!("Part {number}"), body)
    }

    fn make_prose(paragraphs: usize) -> Vec<Paragraph> {
        (0..paragraphs)
            .map(|i| {
                Paragraph::plain(format!(
                    "Paragraph {i} tells of the river and the mill, of the miller's daughter \
                     who kept the ledgers, and of the winter the water froze solid and the \
                     wheel stood still for eleven weeks while the village waited."
                ))
            })
            .collect()
    }

    fn make_document() -> Document {
        let mut doc = Document::new(
            "The Mill",
            "J. Doe",
            (1..=4)
                .map(|n| Chapter::new(n, format!("Chapter title {n}"), make_prose(12)))
                .collect(),
        );
        doc.dedication = Some("For everyone at the mill".into());
        doc.about_author = Some("J. Doe lives near a river.".into());
        doc
    }

    fn make_geometry(trim: TrimSize) -> PageGeometry {
        PageGeometry::from_trim(trim, Margins::book()).unwrap()
    }

    /// Paragraphs of one to five sentences, so short paragraphs meet page
    /// breaks as often as long ones.
    fn make_uneven_prose(paragraphs: usize) -> Vec<Paragraph> {
        let sentence = "The wheel turned slowly while the miller counted sacks of grain.";
        (0..paragraphs)
            .map(|i| {
                let sentences = vec![sentence; (i * 7) % 5 + 1].join(" ");
                Paragraph::plain(format!("Paragraph {i}. {sentences}"))
            })
            .collect()
    }

    fn body_pages(pages: &[Page]) -> Vec<&Page> {
        pages.iter().filter(|p| p.folio().is_some()).collect()
    }

    fn assert_consistent(pages: &[Page], geometry: &PageGeometry) {
        for (i, page) in pages.iter().enumerate() {
            assert_eq!(page.index(), i as u32 + 1);
            for b in page.boxes() {
                assert!(
                    b.bottom() <= geometry.content_height() + 1e-3,
                    "box {:?} on page {} ends at {}",
                    b.kind,
                    page.index(),
                    b.bottom()
                );
                assert!(b.y >= -1e-3);
            }
        }
    }

    /// Checks orphan and widow rules on laid-out pages. Each body line is
    /// matched back to its source paragraph by word count.
    fn assert_orphans_and_widows(pages: &[Page], doc: &Document, label: &str) {
        for chapter in &doc.chapters {
            let word_counts: Vec<usize> = chapter
                .body
                .iter()
                .map(|p| p.text().split_whitespace().count())
                .collect();

            // (page, words) for every body line of the chapter, in order.
            let lines: Vec<(u32, usize)> = pages
                .iter()
                .filter(|p| {
                    matches!(p.role(), PageRole::Chapter { number, .. } if *number == chapter.number)
                })
                .flat_map(|p| {
                    p.body()
                        .filter(|b| b.kind == BoxKind::Text)
                        .map(move |b| (p.index(), b.content.text().split_whitespace().count()))
                })
                .collect();

            // (page, paragraph, line in paragraph)
            let mut tagged = Vec::with_capacity(lines.len());
            let mut line_counts = vec![0usize; word_counts.len()];
            let (mut paragraph, mut line, mut used) = (0, 0, 0);
            for (page, words) in lines {
                assert!(paragraph < word_counts.len(), "{label}: extra lines");
                tagged.push((page, paragraph, line));
                line_counts[paragraph] += 1;
                used += words;
                line += 1;
                if used == word_counts[paragraph] {
                    paragraph += 1;
                    line = 0;
                    used = 0;
                }
            }
            assert_eq!(paragraph, word_counts.len(), "{label}: words lost");

            for (i, &(page, p, l)) in tagged.iter().enumerate() {
                let ends_page = tagged.get(i + 1).map_or(true, |next| next.0 != page);
                let starts_page = i == 0 || tagged[i - 1].0 != page;
                if ends_page && l == 0 && line_counts[p] > 1 {
                    assert_eq!(
                        i, 0,
                        "{label}: page {page} ends with the first line of paragraph {p}"
                    );
                }
                if starts_page && l > 0 && l + 1 == line_counts[p] {
                    panic!("{label}: page {page} starts with the last line of paragraph {p}");
                }
            }
        }
    }

    #[test]
    fn test_scenario_five_hundred_words_three_pages() {
        let engine = make_engine(MetricsProvider::builtin());
        let geometry = PageGeometry::content_box(300.0, 400.0).unwrap();
        let style = BookStyle {
            // 12.5pt × 1.2 × 4/3 = 20pt advance.
            line_spacing: 20.0 / 15.0,
            paragraph_indent: 0.0,
            heading_gap: 1.0,
            furniture: FurniturePolicy::none(),
            ..BookStyle::default()
        };
        let doc = Document::new("Words", "Counter", vec![make_chapter(1, 500)]);
        let pages = engine
            .layout_book(&doc, &geometry, &FontSpec::new("Times", 12.5), &style, &CancelFlag::new())
            .unwrap();

        let chapter: Vec<&Page> = body_pages(&pages);
        assert_eq!(chapter.len(), 3);
        let text_lines: usize = chapter
            .iter()
            .flat_map(|p| p.boxes())
            .filter(|b| b.kind == BoxKind::Text)
            .count();
        assert_eq!(text_lines, 50);
        assert_consistent(&pages, &geometry);
    }

    #[test]
    fn test_chapter_openings_start_with_heading() {
        let engine = make_engine(MetricsProvider::builtin());
        let geometry = make_geometry(TrimSize::SixByNine);
        let pages = engine
            .layout_book(
                &make_document(),
                &geometry,
                &FontSpec::new("Times", 11.0),
                &BookStyle::default(),
                &CancelFlag::new(),
            )
            .unwrap();

        let openings: Vec<&Page> = pages
            .iter()
            .filter(|p| matches!(p.role(), PageRole::Chapter { opening: true, .. }))
            .collect();
        assert_eq!(openings.len(), 4);
        for page in openings {
            let first = page.body().next().unwrap();
            assert_eq!(first.kind, BoxKind::Heading);
            assert!(first.content.text().starts_with("Chapter"));
            assert!(page
                .boxes()
                .iter()
                .all(|b| b.kind != BoxKind::RunningHeader));
        }
        assert_consistent(&pages, &geometry);
    }

    #[test]
    fn test_front_matter_order_and_contents_folios() {
        let engine = make_engine(MetricsProvider::builtin());
        let geometry = make_geometry(TrimSize::SixByNine);
        let pages = engine
            .layout_book(
                &make_document(),
                &geometry,
                &FontSpec::new("Times", 11.0),
                &BookStyle::default(),
                &CancelFlag::new(),
            )
            .unwrap();

        let first_texts: Vec<String> = pages
            .iter()
            .take(4)
            .map(|p| p.body().next().unwrap().content.text())
            .collect();
        assert_eq!(
            first_texts,
            vec![
                "The Mill",
                "For everyone at the mill",
                "About the Author",
                "Table of Contents"
            ]
        );

        let contents = &pages[3];
        for n in 1..=4u32 {
            let title = format!("Chapter title {n}");
            let entry = contents
                .boxes()
                .iter()
                .find(|b| b.content.text() == title)
                .unwrap();
            let folio_box = contents
                .boxes()
                .iter()
                .find(|b| b.y == entry.y && b.x > entry.x)
                .unwrap();
            let folio: u32 = folio_box.content.text().parse().unwrap();
            let opening = pages
                .iter()
                .find(|p| matches!(p.role(), PageRole::Chapter { number, opening: true, .. } if *number == n))
                .unwrap();
            assert_eq!(opening.folio(), Some(folio));
        }
        assert_eq!(body_pages(&pages)[0].folio(), Some(1));
    }

    #[test]
    fn test_missing_font_falls_back_same_size() {
        let engine = make_engine(MetricsProvider::with_families(&["Times"]));
        let geometry = make_geometry(TrimSize::SixByNine);
        let pages = engine
            .layout_book(
                &make_document(),
                &geometry,
                &FontSpec::new("Bembo", 11.0),
                &BookStyle::default(),
                &CancelFlag::new(),
            )
            .unwrap();

        assert!(!pages.is_empty());
        assert!(pages.iter().all(|p| p.has_font_fallback()));
        let body_text = pages
            .iter()
            .flat_map(|p| p.body())
            .find(|b| b.kind == BoxKind::Text && b.content.text().starts_with("Paragraph"))
            .unwrap();
        match &body_text.content {
            BoxContent::Text { font, .. } => {
                assert_eq!(font.family, "Times");
                assert_eq!(font.size_pt, 11.0);
            }
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[test]
    fn test_no_candidate_font_fails_job() {
        let engine = make_engine(MetricsProvider::with_families(&["Courier"]));
        let err = engine
            .render_book(
                &make_document(),
                &make_geometry(TrimSize::SixByNine),
                &FontSpec::new("Bembo", 11.0),
                &BookStyle::default(),
                &CancelFlag::new(),
            )
            .unwrap_err();
        assert_eq!(err.code(), "FONT_UNAVAILABLE");
    }

    #[test]
    fn test_trim_size_changes_page_count() {
        let engine = make_engine(MetricsProvider::builtin());
        let doc = make_document();
        let font = FontSpec::new("Times", 11.0);
        let style = BookStyle::default();

        let small_geometry = make_geometry(TrimSize::SixByNine);
        let large_geometry = make_geometry(TrimSize::Letter);
        let small = engine
            .layout_book(&doc, &small_geometry, &font, &style, &CancelFlag::new())
            .unwrap();
        let large = engine
            .layout_book(&doc, &large_geometry, &font, &style, &CancelFlag::new())
            .unwrap();

        assert!(small.len() > large.len());
        assert_consistent(&small, &small_geometry);
        assert_consistent(&large, &large_geometry);
        assert_orphans_and_widows(&small, &doc, "6x9");
        assert_orphans_and_widows(&large, &doc, "8.5x11");
    }

    #[test]
    fn test_real_prose_keeps_orphan_and_widow_rules() {
        let engine = make_engine(MetricsProvider::builtin());
        let doc = Document::new(
            "Ledgers",
            "M. Ill",
            (1..=3)
                .map(|n| Chapter::new(n, format!("Season {n}"), make_uneven_prose(40)))
                .collect(),
        );
        let style = BookStyle::default();

        for trim in TrimSize::ALL {
            let geometry = make_geometry(trim);
            for size_pt in [9.0, 11.0, 14.0, 18.0] {
                let pages = engine
                    .layout_book(
                        &doc,
                        &geometry,
                        &FontSpec::new("Times", size_pt),
                        &style,
                        &CancelFlag::new(),
                    )
                    .unwrap();
                let label = format!("{trim:?} at {size_pt}pt");
                assert_consistent(&pages, &geometry);
                assert_orphans_and_widows(&pages, &doc, &label);
            }
        }
    }

    /// Font backend that counts resolutions and delegates to the built-in
    /// tables.
    #[derive(Default)]
    struct CountingMeasurer {
        inner: MetricsProvider,
        resolved: AtomicUsize,
    }

    impl TextMeasurer for CountingMeasurer {
        fn resolve(&self, spec: &FontSpec) -> PressResult<ScaledFont> {
            self.resolved.fetch_add(1, Ordering::SeqCst);
            self.inner.resolve(spec)
        }
    }

    #[test]
    fn test_engine_measures_through_supplied_backend() {
        let measurer = Arc::new(CountingMeasurer::default());
        let engine = Engine::new(measurer.clone(), Arc::new(JsonRenderer::new()));
        let pages = engine
            .layout_book(
                &make_document(),
                &make_geometry(TrimSize::SixByNine),
                &FontSpec::new("Bembo", 11.0),
                &BookStyle::default(),
                &CancelFlag::new(),
            )
            .unwrap();
        assert!(!pages.is_empty());
        // "Bembo" misses, then every face of the job comes from the backend.
        assert!(measurer.resolved.load(Ordering::SeqCst) >= 3);
        assert!(pages.iter().all(|p| p.has_font_fallback()));
    }

    #[test]
    fn test_empty_chapter_is_flagged_not_fatal() {
        let engine = make_engine(MetricsProvider::builtin());
        let doc = Document::new(
            "Thin",
            "A",
            vec![make_chapter(1, 0), make_chapter(2, 40)],
        );
        let pages = engine
            .layout_book(
                &doc,
                &make_geometry(TrimSize::SixByNine),
                &FontSpec::new("Times", 11.0),
                &BookStyle::default(),
                &CancelFlag::new(),
            )
            .unwrap();
        let empty = body_pages(&pages)[0];
        assert!(empty
            .diagnostics()
            .contains(&PageDiagnostic::EmptyChapter { chapter: 1 }));
        assert!(empty.body().all(|b| b.kind == BoxKind::Heading));
    }

    #[test]
    fn test_cancelled_before_start() {
        let engine = make_engine(MetricsProvider::builtin());
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = engine
            .render_book(
                &make_document(),
                &make_geometry(TrimSize::SixByNine),
                &FontSpec::new("Times", 11.0),
                &BookStyle::default(),
                &cancel,
            )
            .unwrap_err();
        assert!(matches!(err, PressError::Cancelled { pages: 0 }));
    }

    #[test]
    fn test_render_book_emits_display_list() {
        let engine = make_engine(MetricsProvider::builtin());
        let bytes = engine
            .render_book(
                &make_document(),
                &make_geometry(TrimSize::Digest),
                &FontSpec::new("Times", 11.0),
                &BookStyle::default(),
                &CancelFlag::new(),
            )
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["document"]["mode"], "book");
        assert_eq!(
            value["page_count"].as_u64().unwrap() as usize,
            value["pages"].as_array().unwrap().len()
        );
    }

    #[test]
    fn test_childrens_book_title_then_one_page_per_spec() {
        let engine = make_engine(MetricsProvider::builtin());
        let specs = vec![
            ChildPageSpec::text_only("The cat sat.").with_image(2000, 1500),
            ChildPageSpec::text_only("The cat slept."),
            ChildPageSpec::text_only("The end."),
        ];
        let (geometry, pages) = engine
            .layout_childrens_book("Cat Tales", "Kit", &specs, &CancelFlag::new())
            .unwrap();

        assert_eq!(pages.len(), 4);
        assert_eq!(pages[0].folio(), None);
        assert_eq!(pages[1].folio(), Some(1));
        assert!(pages[1..]
            .iter()
            .all(|p| *p.role() == PageRole::Illustrated));
        assert_eq!((geometry.trim_width(), geometry.trim_height()), (612.0, 792.0));
        assert_consistent(&pages, &geometry);

        let image = pages[1]
            .boxes()
            .iter()
            .find(|b| b.kind == BoxKind::Image)
            .unwrap();
        assert!((image.w / image.h - 2000.0 / 1500.0).abs() < 1e-3);
        assert!(!pages.iter().any(|p| p.has_font_fallback()));
    }

    #[test]
    fn test_childrens_book_decorative_fallback_flags_every_page() {
        let engine = make_engine(MetricsProvider::with_families(&["Times", "Helvetica"]));
        let specs = vec![
            ChildPageSpec::text_only("One."),
            ChildPageSpec::text_only("Two."),
        ];
        let (_, pages) = engine
            .layout_childrens_book("Numbers", "N", &specs, &CancelFlag::new())
            .unwrap();
        assert_eq!(pages.len(), 3);
        assert!(pages.iter().all(|p| p.has_font_fallback()));
        let text = pages[1].body().find(|b| b.kind == BoxKind::Text).unwrap();
        match &text.content {
            BoxContent::Text { font, .. } => assert_eq!(font.size_pt, 16.0),
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[test]
    fn test_childrens_book_without_title_page() {
        let style = ChildrensStyle {
            title_page: false,
            ..ChildrensStyle::default()
        };
        let engine = make_engine(MetricsProvider::builtin()).with_childrens_style(style);
        let specs = vec![ChildPageSpec::text_only("Only page.")];
        let (_, pages) = engine
            .layout_childrens_book("Untitled", "", &specs, &CancelFlag::new())
            .unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].folio(), Some(1));
    }
}
