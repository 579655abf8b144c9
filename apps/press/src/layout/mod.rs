// Layout engine: metrics → flow → pagination / planning → assembly.
// Everything here is synchronous and CPU-bound; callers on an async runtime
// run it inside tokio::task::spawn_blocking.

pub mod assembler;
pub mod flow;
pub mod font_metrics;
pub mod front_matter;
pub mod paginator;
pub mod planner;

/// Tolerance for float comparisons against frame bounds, in points.
pub const EPSILON: f32 = 1e-3;

// Re-export the public API consumed by the engine.
pub use assembler::{Assembler, CancelFlag, FurniturePolicy};
pub use flow::{flow, Align, Face, FlowBlock, FlowFonts, FlowSettings, LineKind, LineRecord};
pub use font_metrics::{
    FallbackChain, FontFallback, FontSpec, FontStyle, MetricsProvider, ResolvedFont, ScaledFont,
    TextMeasurer,
};
pub use paginator::{paginate, BodyFrame, Section};
pub use planner::{plan, PlannerSettings};
