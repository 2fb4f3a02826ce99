//! Observability for the recommendation engine
//!
//! Provides:
//! - Prometheus metrics (price lookups by tier, cache hit rate, search size,
//!   recommendation outcomes and latency, potential savings per pool)
//! - Structured event logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    Encoder, GaugeVec, Histogram, IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for per-pool recommendation latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    price_lookups: IntCounterVec,
    cache_hits: IntCounter,
    cache_misses: IntCounter,
    candidates_evaluated: IntCounter,
    recommendations: IntCounterVec,
    recommendation_latency_seconds: Histogram,
    potential_hourly_savings: GaugeVec,
    collaborator_failures: IntCounterVec,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            price_lookups: register_int_counter_vec!(
                "fleet_advisor_price_lookups_total",
                "Resolved price lookups by source tier",
                &["source"]
            )
            .expect("Failed to register price_lookups"),

            cache_hits: register_int_counter!(
                "fleet_advisor_price_cache_hits_total",
                "Price cache hits"
            )
            .expect("Failed to register cache_hits"),

            cache_misses: register_int_counter!(
                "fleet_advisor_price_cache_misses_total",
                "Price cache misses"
            )
            .expect("Failed to register cache_misses"),

            candidates_evaluated: register_int_counter!(
                "fleet_advisor_fleet_candidates_evaluated_total",
                "Fleet candidates costed by the selector"
            )
            .expect("Failed to register candidates_evaluated"),

            recommendations: register_int_counter_vec!(
                "fleet_advisor_recommendations_total",
                "Recommendations by outcome",
                &["outcome"]
            )
            .expect("Failed to register recommendations"),

            recommendation_latency_seconds: register_histogram!(
                "fleet_advisor_recommendation_latency_seconds",
                "Time spent producing one NodePool recommendation",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register recommendation_latency_seconds"),

            potential_hourly_savings: register_gauge_vec!(
                "fleet_advisor_potential_hourly_savings_usd",
                "Hourly savings of the latest recommendation per NodePool",
                &["nodepool"]
            )
            .expect("Failed to register potential_hourly_savings"),

            collaborator_failures: register_int_counter_vec!(
                "fleet_advisor_collaborator_failures_total",
                "Failed calls to external collaborators",
                &["collaborator"]
            )
            .expect("Failed to register collaborator_failures"),
        }
    }
}

/// Handle to the process-wide engine metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn inc_price_lookup(&self, source: &str) {
        self.inner().price_lookups.with_label_values(&[source]).inc();
    }

    pub fn inc_cache_hit(&self) {
        self.inner().cache_hits.inc();
    }

    pub fn inc_cache_miss(&self) {
        self.inner().cache_misses.inc();
    }

    pub fn add_candidates_evaluated(&self, count: u64) {
        self.inner().candidates_evaluated.inc_by(count);
    }

    /// `outcome` is one of "recommended", "no_change", "no_candidates", "empty_pool"
    pub fn inc_recommendation(&self, outcome: &str) {
        self.inner().recommendations.with_label_values(&[outcome]).inc();
    }

    pub fn observe_recommendation_latency(&self, duration_secs: f64) {
        self.inner().recommendation_latency_seconds.observe(duration_secs);
    }

    pub fn set_potential_savings(&self, nodepool: &str, hourly_savings: f64) {
        self.inner()
            .potential_hourly_savings
            .with_label_values(&[nodepool])
            .set(hourly_savings);
    }

    pub fn inc_collaborator_failure(&self, collaborator: &str) {
        self.inner()
            .collaborator_failures
            .with_label_values(&[collaborator])
            .inc();
    }

    /// Encode every registered metric in the Prometheus text format
    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Structured logger for engine events
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn log_analysis_started(&self, nodepools: usize) {
        info!(
            event = "analysis_started",
            component = %self.component,
            nodepools = nodepools,
            "Fleet analysis started"
        );
    }

    pub fn log_analysis_finished(
        &self,
        nodepools: usize,
        with_recommendation: usize,
        hourly_savings: f64,
        elapsed_ms: u64,
    ) {
        info!(
            event = "analysis_finished",
            component = %self.component,
            nodepools = nodepools,
            with_recommendation = with_recommendation,
            hourly_savings = hourly_savings,
            elapsed_ms = elapsed_ms,
            "Fleet analysis finished"
        );
    }

    #[allow(clippy::too_many_arguments)]
    pub fn log_recommendation(
        &self,
        nodepool: &str,
        has_recommendation: bool,
        current_nodes: u32,
        recommended_nodes: u32,
        pricing_class: &str,
        current_hourly_cost: f64,
        recommended_hourly_cost: f64,
        savings_percent: f64,
    ) {
        info!(
            event = "recommendation_generated",
            component = %self.component,
            nodepool = %nodepool,
            has_recommendation = has_recommendation,
            current_nodes = current_nodes,
            recommended_nodes = recommended_nodes,
            pricing_class = %pricing_class,
            current_hourly_cost = current_hourly_cost,
            recommended_hourly_cost = recommended_hourly_cost,
            savings_percent = savings_percent,
            "Generated NodePool recommendation"
        );
    }

    pub fn log_cost_guard(
        &self,
        nodepool: &str,
        current_hourly_cost: f64,
        candidate_hourly_cost: f64,
    ) {
        warn!(
            event = "cost_guard_tripped",
            component = %self.component,
            nodepool = %nodepool,
            current_hourly_cost = current_hourly_cost,
            candidate_hourly_cost = candidate_hourly_cost,
            "Candidate would raise cost beyond the regression margin, keeping current fleet"
        );
    }

    pub fn log_pricing_fallback(&self, instance_type: &str, pricing_class: &str, source: &str) {
        warn!(
            event = "pricing_fallback",
            component = %self.component,
            instance_type = %instance_type,
            pricing_class = %pricing_class,
            source = %source,
            "Price resolved from a fallback tier"
        );
    }

    pub fn log_pool_failed(&self, nodepool: &str, reason: &str) {
        warn!(
            event = "nodepool_failed",
            component = %self.component,
            nodepool = %nodepool,
            reason = %reason,
            "NodePool analysis failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_metrics_exposition() {
        let metrics = EngineMetrics::new();
        metrics.inc_price_lookup("static-table");
        metrics.inc_cache_hit();
        metrics.inc_cache_miss();
        metrics.add_candidates_evaluated(42);
        metrics.inc_recommendation("recommended");
        metrics.observe_recommendation_latency(0.02);
        metrics.set_potential_savings("default", 1.25);

        let text = EngineMetrics::new().gather_text();
        assert!(text.contains("fleet_advisor_price_lookups_total"));
        assert!(text.contains("fleet_advisor_potential_hourly_savings_usd"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("engine");
        assert_eq!(logger.component, "engine");
        logger.log_analysis_started(3);
    }
}
