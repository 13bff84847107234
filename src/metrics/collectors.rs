//! High-level recording interface over the raw Prometheus handles.

use super::prometheus::{
    DEBATES_TOTAL, INVOCATION_LATENCY, RESOURCES_ACTIVE, RESOURCE_RELEASES_TOTAL,
    TERMINATION_CHECKS_TOTAL, TURNS_TOTAL,
};

/// Records debate operational metrics.
///
/// Zero-sized and freely copied into every component that records. Each
/// method silently does nothing when `init_metrics()` has not been called,
/// so library users who do not care about Prometheus pay nothing.
///
/// # Example
///
/// ```ignore
/// use symposium::metrics::{init_metrics, MetricsCollector};
///
/// init_metrics()?;
/// let collector = MetricsCollector::new();
/// collector.record_turn("Socrates", true, 1.8);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Records one participant invocation.
    ///
    /// # Arguments
    ///
    /// * `participant` - Name of the speaker
    /// * `success` - Whether the capability produced an utterance
    /// * `latency_secs` - Wall time spent in the capability
    pub fn record_turn(&self, participant: &str, success: bool, latency_secs: f64) {
        let status = if success { "success" } else { "failure" };

        if let Some(turns) = TURNS_TOTAL.get() {
            turns.with_label_values(&[participant, status]).inc();
        }

        if let Some(latency) = INVOCATION_LATENCY.get() {
            latency
                .with_label_values(&[participant])
                .observe(latency_secs);
        }

        tracing::trace!(
            participant = participant,
            status = status,
            latency_secs = latency_secs,
            "Recorded turn metric"
        );
    }

    /// Records the end of a session (`completed`, `failed`, or `cancelled`).
    pub fn record_debate(&self, outcome: &str) {
        if let Some(debates) = DEBATES_TOTAL.get() {
            debates.with_label_values(&[outcome]).inc();
        }
        tracing::trace!(outcome = outcome, "Recorded debate metric");
    }

    /// Records a termination check result (`stop`, `continue`, or `error`).
    pub fn record_termination_check(&self, result: &str) {
        if let Some(checks) = TERMINATION_CHECKS_TOTAL.get() {
            checks.with_label_values(&[result]).inc();
        }
    }

    /// Marks a resource of `kind` as acquired.
    pub fn resource_acquired(&self, kind: &str) {
        if let Some(active) = RESOURCES_ACTIVE.get() {
            active.with_label_values(&[kind]).inc();
        }
    }

    /// Records a release attempt. The resource stops counting as held
    /// either way, since it is never retried.
    pub fn resource_released(&self, kind: &str, success: bool) {
        let status = if success { "success" } else { "failure" };

        if let Some(active) = RESOURCES_ACTIVE.get() {
            active.with_label_values(&[kind]).dec();
        }

        if let Some(releases) = RESOURCE_RELEASES_TOTAL.get() {
            releases.with_label_values(&[kind, status]).inc();
        }

        tracing::trace!(kind = kind, status = status, "Recorded resource release");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::init_metrics;

    fn ensure_metrics_init() {
        let _ = init_metrics();
    }

    #[test]
    fn test_collector_is_zero_sized() {
        let collector = MetricsCollector::new();
        assert_eq!(std::mem::size_of_val(&collector), 0);
    }

    #[test]
    fn test_record_turn_and_debate() {
        ensure_metrics_init();
        let collector = MetricsCollector::new();

        collector.record_turn("Socrates", true, 1.2);
        collector.record_turn("Plato", false, 30.0);
        collector.record_debate("completed");
        collector.record_termination_check("continue");

        let text = crate::metrics::export_metrics();
        assert!(text.contains("symposium_turns_total"));
        assert!(text.contains("Socrates"));
    }

    #[test]
    fn test_resource_gauge_round_trip() {
        ensure_metrics_init();
        let collector = MetricsCollector::new();

        collector.resource_acquired("test_kind");
        collector.resource_released("test_kind", true);

        let value = RESOURCES_ACTIVE
            .get()
            .map(|g| g.with_label_values(&["test_kind"]).get())
            .unwrap_or_default();
        assert_eq!(value, 0.0);
    }
}
