//! Prometheus metrics registration and export.
//!
//! Metric handles live in `OnceLock` statics so recording sites never need a
//! registry reference; until [`init_metrics`] runs every recording call is a
//! no-op.

use prometheus::{CounterVec, Encoder, GaugeVec, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all symposium metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Debate sessions finished, labeled by outcome.
pub static DEBATES_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Completed or failed turns, labeled by participant and status.
pub static TURNS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Capability invocation latency in seconds, labeled by participant.
pub static INVOCATION_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// External resources currently held, labeled by kind.
pub static RESOURCES_ACTIVE: OnceLock<GaugeVec> = OnceLock::new();

/// Resource release attempts, labeled by kind and status.
pub static RESOURCE_RELEASES_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Termination strategy evaluations, labeled by result.
pub static TERMINATION_CHECKS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Calling this more than once leaves the first set of handles in place.
///
/// # Errors
///
/// Returns a `prometheus::Error` if a metric definition is invalid.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    let debates_total = CounterVec::new(
        Opts::new("symposium_debates_total", "Debate sessions finished"),
        &["outcome"],
    )?;

    let turns_total = CounterVec::new(
        Opts::new("symposium_turns_total", "Debate turns by participant"),
        &["participant", "status"],
    )?;

    let invocation_latency = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "symposium_invocation_latency_seconds",
            "Participant capability latency in seconds",
        )
        .buckets(vec![0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["participant"],
    )?;

    let resources_active = GaugeVec::new(
        Opts::new(
            "symposium_resources_active",
            "External session resources currently held",
        ),
        &["kind"],
    )?;

    let resource_releases_total = CounterVec::new(
        Opts::new(
            "symposium_resource_releases_total",
            "Resource release attempts",
        ),
        &["kind", "status"],
    )?;

    let termination_checks_total = CounterVec::new(
        Opts::new(
            "symposium_termination_checks_total",
            "Termination strategy evaluations",
        ),
        &["result"],
    )?;

    registry.register(Box::new(debates_total.clone()))?;
    registry.register(Box::new(turns_total.clone()))?;
    registry.register(Box::new(invocation_latency.clone()))?;
    registry.register(Box::new(resources_active.clone()))?;
    registry.register(Box::new(resource_releases_total.clone()))?;
    registry.register(Box::new(termination_checks_total.clone()))?;

    // Already-set cells mean a previous call won; keep its handles.
    let _ = REGISTRY.set(registry);
    let _ = DEBATES_TOTAL.set(debates_total);
    let _ = TURNS_TOTAL.set(turns_total);
    let _ = INVOCATION_LATENCY.set(invocation_latency);
    let _ = RESOURCES_ACTIVE.set(resources_active);
    let _ = RESOURCE_RELEASES_TOTAL.set(resource_releases_total);
    let _ = TERMINATION_CHECKS_TOTAL.set(termination_checks_total);

    tracing::debug!("Prometheus metrics initialized");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
