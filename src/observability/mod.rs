//! Observability for ClassSense
//!
//! - Structured logging through `tracing`, installed by [`init_logging`]
//! - Operation counters in [`MetricsRegistry`], exposed over HTTP
//!
//! ```ignore
//! use classsense::observability::{init_logging, MetricsRegistry};
//!
//! init_logging();
//! let metrics = MetricsRegistry::new();
//! metrics.increment_classes_created();
//! ```

mod logging;
mod metrics;

pub use logging::{init_logging, DEFAULT_FILTER};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
