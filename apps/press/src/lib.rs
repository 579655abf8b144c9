//! press: lays out prose books and illustrated children's books into
//! print-ready page sequences.

pub mod config;
pub mod engine;
pub mod errors;
pub mod fetch;
pub mod jobs;
pub mod layout;
pub mod models;
pub mod pool;
pub mod render;

pub use engine::{BookStyle, ChildrensStyle, Engine};
pub use errors::{PressError, PressResult};
pub use layout::{CancelFlag, FontSpec, MetricsProvider, TextMeasurer};
pub use render::{JsonRenderer, PageRenderer};
