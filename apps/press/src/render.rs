//! Rendering backends. The engine hands a finished page sequence to a
//! [`PageRenderer`] and returns whatever bytes it produces.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::{PressError, PressResult};
use crate::models::{Page, PageColor, PageGeometry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookMode {
    Book,
    Childrens,
}

/// Document-level facts a backend needs besides the pages.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub job_id: Uuid,
    pub mode: BookMode,
    pub title: String,
    pub author: String,
    pub geometry: PageGeometry,
    pub page_color: PageColor,
    pub rendered_at: DateTime<Utc>,
}

impl DocumentInfo {
    pub fn new(
        mode: BookMode,
        title: impl Into<String>,
        author: impl Into<String>,
        geometry: PageGeometry,
        page_color: PageColor,
    ) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            mode,
            title: title.into(),
            author: author.into(),
            geometry,
            page_color,
            rendered_at: Utc::now(),
        }
    }
}

pub trait PageRenderer: Send + Sync {
    /// Serialises the whole sequence. Never called with a partial sequence.
    fn render_pages(&self, info: &DocumentInfo, pages: &[Page]) -> PressResult<Bytes>;
}

/// Writes the display list as JSON.
#[derive(Debug, Clone, Default)]
pub struct JsonRenderer {
    pretty: bool,
}

impl JsonRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

#[derive(Serialize)]
struct DisplayList<'a> {
    document: &'a DocumentInfo,
    page_count: usize,
    pages: &'a [Page],
}

impl PageRenderer for JsonRenderer {
    fn render_pages(&self, info: &DocumentInfo, pages: &[Page]) -> PressResult<Bytes> {
        let list = DisplayList {
            document: info,
            page_count: pages.len(),
            pages,
        };
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(&list)
        } else {
            serde_json::to_vec(&list)
        }
        .map_err(|e| PressError::Backend(format!("display list encoding failed: {e}")))?;
        Ok(Bytes::from(encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Margins, PageDraft, PageRole, TrimSize};

    fn make_info() -> DocumentInfo {
        DocumentInfo::new(
            BookMode::Book,
            "Title",
            "Author",
            PageGeometry::from_trim(TrimSize::SixByNine, Margins::book()).unwrap(),
            PageColor::OffWhite,
        )
    }

    #[test]
    fn test_json_display_list_shape() {
        let pages = vec![
            Page::from_draft(1, None, PageDraft::new(PageRole::FrontMatter)),
            Page::from_draft(2, Some(1), PageDraft::new(PageRole::Illustrated)),
        ];
        let bytes = JsonRenderer::new().render_pages(&make_info(), &pages).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["page_count"], 2);
        assert_eq!(value["document"]["mode"], "book");
        assert_eq!(value["document"]["page_color"], "off-white");
        assert_eq!(value["pages"][1]["folio"], 1);
        assert_eq!(value["pages"][0]["role"]["type"], "front_matter");
    }
}
