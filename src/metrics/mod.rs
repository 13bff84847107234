//! Prometheus metrics for debate sessions.
//!
//! ```ignore
//! use symposium::metrics::{export_metrics, init_metrics};
//!
//! init_metrics()?;
//! // ... run a debate ...
//! println!("{}", export_metrics());
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::MetricsCollector;
pub use prometheus::{export_metrics, init_metrics};

pub use prometheus::{
    DEBATES_TOTAL, INVOCATION_LATENCY, REGISTRY, RESOURCES_ACTIVE, RESOURCE_RELEASES_TOTAL,
    TERMINATION_CHECKS_TOTAL, TURNS_TOTAL,
};
