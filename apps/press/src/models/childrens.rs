//! Illustrated children's-book page specs.

use serde::{Deserialize, Serialize};

/// Where the text block sits inside its area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPosition {
    Top,
    #[default]
    Middle,
    Bottom,
}

/// An illustration after the fetch collaborator has looked at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub url: String,
    pub width_px: u32,
    pub height_px: u32,
}

/// Resolution state of a page's illustration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImageSlot {
    /// The page has no image, or it has not been fetched.
    #[default]
    NotRequested,
    Ready(ImageAsset),
    Failed { url: String, reason: String },
}

/// One input page of an illustrated book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildPageSpec {
    pub text: String,
    /// Carried through for the caller; layout never reads it.
    #[serde(default)]
    pub illustration_prompt: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub text_position: TextPosition,
    #[serde(skip)]
    pub image: ImageSlot,
}

impl ChildPageSpec {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            illustration_prompt: None,
            image_url: None,
            text_position: TextPosition::default(),
            image: ImageSlot::NotRequested,
        }
    }

    pub fn with_image(mut self, width_px: u32, height_px: u32) -> Self {
        let url = self
            .image_url
            .clone()
            .unwrap_or_else(|| "inline://illustration".to_string());
        self.image_url = Some(url.clone());
        self.image = ImageSlot::Ready(ImageAsset {
            url,
            width_px,
            height_px,
        });
        self
    }
}
