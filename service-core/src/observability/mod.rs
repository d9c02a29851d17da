pub mod logging;
pub mod metrics;
pub mod trace_context;

pub use logging::init_tracing;
pub use metrics::{MetricsHandle, init_metrics};
pub use trace_context::TracedRequestExt;
