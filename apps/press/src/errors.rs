use thiserror::Error;

/// Engine-level error type.
///
/// Every variant maps to a stable `code()` so an outer service can report
/// failures without matching on display strings.
#[derive(Debug, Error)]
pub enum PressError {
    #[error("Font unavailable: {requested} (tried {tried:?})")]
    FontUnavailable { requested: String, tried: Vec<String> },

    #[error("Image fetch failed for {url}: {reason}")]
    ImageFetchFailed { url: String, reason: String },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Chapter {number}: {source}")]
    Chapter {
        number: u32,
        #[source]
        source: Box<PressError>,
    },

    #[error("Render cancelled after {pages} pages")]
    Cancelled { pages: usize },

    #[error("Rendering backend error: {0}")]
    Backend(String),

    #[error("Invalid job: {0}")]
    InvalidJob(String),
}

impl PressError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            PressError::FontUnavailable { .. } => "FONT_UNAVAILABLE",
            PressError::ImageFetchFailed { .. } => "IMAGE_FETCH_FAILED",
            PressError::InvalidGeometry(_) => "INVALID_GEOMETRY",
            PressError::Chapter { source, .. } => source.code(),
            PressError::Cancelled { .. } => "CANCELLED",
            PressError::Backend(_) => "BACKEND_ERROR",
            PressError::InvalidJob(_) => "INVALID_JOB",
        }
    }

    /// Wraps an error with the number of the chapter being laid out.
    pub fn in_chapter(self, number: u32) -> Self {
        match self {
            // Cancellation is not a chapter fault.
            PressError::Cancelled { .. } => self,
            other => PressError::Chapter {
                number,
                source: Box::new(other),
            },
        }
    }
}

pub type PressResult<T> = Result<T, PressError>;
