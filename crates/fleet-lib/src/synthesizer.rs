//! Recommendation synthesis
//!
//! Compares the current fleet with the selected candidate, applies the cost
//! regression guard and writes the rationale. An optional [`Explainer`] may
//! turn the rationale into prose; its failures never affect the result.

use crate::capacity::{format_cores, format_gib};
use crate::error::CollaboratorError;
use crate::models::{FleetCandidate, NodePoolState, PricingClass, Recommendation};
use crate::observability::StructuredLogger;
use crate::sizing::CapacityAssessment;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A candidate costing more than current cost times this is discarded
pub const COST_REGRESSION_MARGIN: f64 = 1.1;

/// Structured input handed to the explanation collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplanationContext {
    pub nodepool: String,
    pub rationale: String,
    pub has_recommendation: bool,
    pub current_nodes: u32,
    pub recommended_nodes: u32,
    pub recommended_instance_types: Vec<String>,
    pub pricing_class: PricingClass,
    pub current_hourly_cost: f64,
    pub recommended_hourly_cost: f64,
    pub savings_percent: f64,
    pub cpu_utilization_percent: f64,
    pub memory_utilization_percent: f64,
}

impl ExplanationContext {
    pub fn from_recommendation(rec: &Recommendation, assessment: &CapacityAssessment) -> Self {
        Self {
            nodepool: rec.nodepool.clone(),
            rationale: rec.rationale.clone(),
            has_recommendation: rec.has_recommendation,
            current_nodes: rec.current.node_count,
            recommended_nodes: rec.recommended.node_count,
            recommended_instance_types: rec.recommended.instance_types.clone(),
            pricing_class: rec.recommended.pricing_class,
            current_hourly_cost: rec.current_hourly_cost,
            recommended_hourly_cost: rec.recommended_hourly_cost,
            savings_percent: rec.savings_percent,
            cpu_utilization_percent: assessment.cpu_utilization_percent,
            memory_utilization_percent: assessment.memory_utilization_percent,
        }
    }
}

/// Optional text-enhancement collaborator
#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(&self, context: &ExplanationContext) -> Result<String, CollaboratorError>;
}

pub struct RecommendationSynthesizer {
    explainer: Option<Arc<dyn Explainer>>,
    explainer_timeout: Duration,
    logger: StructuredLogger,
}

impl Default for RecommendationSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecommendationSynthesizer {
    pub const DEFAULT_EXPLAINER_TIMEOUT: Duration = Duration::from_secs(20);

    pub fn new() -> Self {
        Self {
            explainer: None,
            explainer_timeout: Self::DEFAULT_EXPLAINER_TIMEOUT,
            logger: StructuredLogger::new("synthesizer"),
        }
    }

    pub fn with_explainer(mut self, explainer: Arc<dyn Explainer>, timeout: Duration) -> Self {
        self.explainer = Some(explainer);
        self.explainer_timeout = timeout;
        self
    }

    /// Build the recommendation for one pool
    pub fn synthesize(
        &self,
        current: &NodePoolState,
        assessment: &CapacityAssessment,
        candidate: FleetCandidate,
        generated_at: DateTime<Utc>,
    ) -> Recommendation {
        let current_cost = current.current_hourly_cost;
        let echo = FleetCandidate::from_current(current);

        let (recommended, has_recommendation, note) = if candidate.is_empty() {
            let note = if assessment.is_zero() {
                "Pool is empty and idle; nothing to change.".to_string()
            } else {
                "No priced candidate fleet could be found; keeping the current fleet.".to_string()
            };
            (echo, false, note)
        } else if candidate.hourly_cost > current_cost * COST_REGRESSION_MARGIN {
            self.logger
                .log_cost_guard(&current.name, current_cost, candidate.hourly_cost);
            let note = format!(
                "Cheapest candidate ({}) would cost more than {:.0}% of the current fleet; \
                 keeping the current fleet.",
                format_cost(candidate.hourly_cost),
                COST_REGRESSION_MARGIN * 100.0
            );
            (echo, false, note)
        } else if candidate.hourly_cost < current_cost {
            let note = describe_change(current, &candidate);
            (candidate, true, note)
        } else {
            let note = format!(
                "Current fleet is already cost-optimal ({} vs best candidate {}).",
                format_cost(current_cost),
                format_cost(candidate.hourly_cost)
            );
            (echo, false, note)
        };

        let recommended_cost = recommended.hourly_cost;
        let cost_savings = current_cost - recommended_cost;
        let savings_percent = if current_cost > 0.0 {
            cost_savings / current_cost * 100.0
        } else {
            0.0
        };

        let rationale = format!("{} {}", describe_utilization(assessment), note);

        Recommendation {
            nodepool: current.name.clone(),
            current: current.clone(),
            recommended,
            current_hourly_cost: current_cost,
            recommended_hourly_cost: recommended_cost,
            cost_savings,
            savings_percent,
            rationale,
            explanation: None,
            has_recommendation,
            generated_at,
        }
    }

    /// Ask the explainer for prose; failures and timeouts leave `rec` as is
    pub async fn enhance(&self, rec: &mut Recommendation, assessment: &CapacityAssessment) {
        let Some(explainer) = &self.explainer else {
            return;
        };

        let context = ExplanationContext::from_recommendation(rec, assessment);
        match tokio::time::timeout(self.explainer_timeout, explainer.explain(&context)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => rec.explanation = Some(text),
            Ok(Ok(_)) => debug!(nodepool = %rec.nodepool, "Explainer returned empty text"),
            Ok(Err(err)) => debug!(nodepool = %rec.nodepool, error = %err, "Explainer failed"),
            Err(_) => debug!(nodepool = %rec.nodepool, "Explainer timed out"),
        }
    }
}

fn format_cost(hourly: f64) -> String {
    format!("${:.4}/h", hourly)
}

fn describe_utilization(assessment: &CapacityAssessment) -> String {
    let mut text = format!(
        "CPU utilization {:.1}%, memory utilization {:.1}%",
        assessment.cpu_utilization_percent, assessment.memory_utilization_percent
    );
    if assessment.over_provisioned {
        text.push_str(" (over-provisioned)");
    }
    if assessment.consolidations_per_day > 0.0 {
        text.push_str(&format!(
            ", {:.1} consolidations/day",
            assessment.consolidations_per_day
        ));
    }
    text.push('.');
    text
}

fn describe_change(current: &NodePoolState, candidate: &FleetCandidate) -> String {
    let fleet = candidate
        .instance_types
        .iter()
        .zip(&candidate.nodes_per_type)
        .map(|(t, n)| format!("{} x {}", n, t))
        .collect::<Vec<_>>()
        .join(" + ");

    let mut text = format!("Recommend {} on {}", fleet, candidate.pricing_class);

    let on_demand = current.nodes_with_class(PricingClass::OnDemand);
    let spot = current.nodes_with_class(PricingClass::Spot);
    match candidate.pricing_class {
        PricingClass::Spot if on_demand > 0 => {
            text.push_str(&format!(", converting {} on-demand nodes to spot", on_demand));
        }
        PricingClass::OnDemand if spot > 0 => {
            text.push_str(&format!(", moving {} spot nodes to on-demand", spot));
        }
        _ => {}
    }

    text.push_str(&format!(
        ". Capacity {} nodes / {} vCPU / {} -> {} nodes / {} vCPU / {}. \
         Hourly cost {} -> {} ({:.1}% lower).",
        current.node_count,
        format_cores(current.cpu_allocatable),
        format_gib(current.memory_allocatable),
        candidate.node_count,
        format_cores(candidate.total_cpu),
        format_gib(candidate.total_memory_gib),
        format_cost(current.current_hourly_cost),
        format_cost(candidate.hourly_cost),
        if current.current_hourly_cost > 0.0 {
            let saved = current.current_hourly_cost - candidate.hourly_cost;
            saved / current.current_hourly_cost * 100.0
        } else {
            0.0
        }
    ));
    text
}
