pub mod childrens;
pub mod document;
pub mod geometry;
pub mod page;

pub use childrens::{ChildPageSpec, ImageAsset, ImageSlot, TextPosition};
pub use document::{split_paragraphs, Chapter, Document, Emphasis, Paragraph};
pub use geometry::{Margins, PageColor, PageGeometry, TrimSize, POINTS_PER_INCH};
pub use page::{
    BoxContent, BoxKind, Page, PageDiagnostic, PageDraft, PageRole, PlacedBox, TextRun,
};
