//! Recommendation engine
//!
//! Drives the per-pool pipeline: current cost, capacity assessment,
//! candidate resolution, price book, fleet search and synthesis. Pools are
//! processed one at a time so progress events arrive in a stable order.


use crate::catalog::{
    CandidateList, CatalogResolver, HttpCatalogConfig, HttpPricingCatalog, PricingCatalog,
};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::inventory::InventoryClient;
use crate::models::{
    Architecture, DisruptionEvent, DisruptionSummary, FleetCandidate, FleetSummary,
    NodePoolState, PricingClass, Recommendation, Workload,
};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::pricing::{InMemoryPriceCache, PriceCache, PriceEstimator, PriceQuote, PricingResolver};
use crate::retry::{CancelSignal, RetryPolicy};
use crate::selector::{order_pricing_classes, FleetSelector};
use crate::sizing::CapacityCalculator;
use crate::synthesizer::{Explainer, RecommendationSynthesizer};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

/// Capacity of the progress channel
const PROGRESS_BUFFER: usize = 64;

/// Progress of one analysis run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started {
        nodepools: usize,
    },
    PoolStarted {
        nodepool: String,
        index: usize,
        total: usize,
    },
    PoolCompleted {
        index: usize,
        total: usize,
        recommendation: Box<Recommendation>,
    },
    Failed {
        error: String,
    },
    Finished {
        summary: FleetSummary,
    },
}

/// Result of a full analysis
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub recommendations: Vec<Recommendation>,
    pub summary: FleetSummary,
    pub generated_at: DateTime<Utc>,
}

struct InventoryView {
    pools: Vec<NodePoolState>,
    disruptions: Vec<DisruptionEvent>,
    workloads: Vec<Workload>,
}

pub struct RecommendationEngine {
    inventory: Arc<dyn InventoryClient>,
    catalog: CatalogResolver,
    pricing: PricingResolver,
    calculator: CapacityCalculator,
    selector: FleetSelector,
    synthesizer: RecommendationSynthesizer,
    clock: Arc<dyn Clock>,
    inventory_retry: RetryPolicy,
    disruption_window: chrono::Duration,
    cancel: CancelSignal,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl RecommendationEngine {
    pub fn builder() -> RecommendationEngineBuilder {
        RecommendationEngineBuilder::new()
    }

    /// Signal that aborts in-flight collaborator calls of this engine
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// Analyse every NodePool
    pub async fn analyze(&self) -> Result<AnalysisReport, EngineError> {
        self.run(None).await
    }

    /// Analyse every NodePool, reporting progress as a stream
    ///
    /// The stream ends after `Finished` or `Failed`.
    pub fn stream(self: Arc<Self>) -> ReceiverStream<ProgressEvent> {
        let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
        tokio::spawn(async move {
            let _ = self.run(Some(&tx)).await;
        });
        ReceiverStream::new(rx)
    }

    async fn run(
        &self,
        progress: Option<&mpsc::Sender<ProgressEvent>>,
    ) -> Result<AnalysisReport, EngineError> {
        let started = Instant::now();

        let view = match self.load_inventory().await {
            Ok(view) => view,
            Err(err) => {
                self.logger.log_pool_failed("*", &err.to_string());
                report(progress, ProgressEvent::Failed { error: err.to_string() }).await;
                return Err(err);
            }
        };

        let total = view.pools.len();
        self.logger.log_analysis_started(total);
        report(progress, ProgressEvent::Started { nodepools: total }).await;

        let mut recommendations = Vec::with_capacity(total);
        for (index, state) in view.pools.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                let error = EngineError::Cancelled.to_string();
                report(progress, ProgressEvent::Failed { error }).await;
                return Err(EngineError::Cancelled);
            }

            report(
                progress,
                ProgressEvent::PoolStarted {
                    nodepool: state.name.clone(),
                    index,
                    total,
                },
            )
            .await;

            let rec = match self
                .recommend_pool(state, &view.disruptions, &view.workloads)
                .await
            {
                Ok(rec) => rec,
                Err(err) => {
                    report(progress, ProgressEvent::Failed { error: err.to_string() }).await;
                    return Err(err);
                }
            };

            report(
                progress,
                ProgressEvent::PoolCompleted {
                    index,
                    total,
                    recommendation: Box::new(rec.clone()),
                },
            )
            .await;
            recommendations.push(rec);
        }

        let summary = FleetSummary::from_recommendations(&recommendations);
        self.logger.log_analysis_finished(
            total,
            summary.pools_with_recommendation as usize,
            summary.hourly_savings,
            started.elapsed().as_millis() as u64,
        );
        report(progress, ProgressEvent::Finished { summary: summary.clone() }).await;

        Ok(AnalysisReport {
            recommendations,
            summary,
            generated_at: self.clock.now(),
        })
    }

    async fn load_inventory(&self) -> Result<InventoryView, EngineError> {
        let inventory = &self.inventory;
        let window = self.disruption_window;

        let pools = self
            .inventory_retry
            .run("list_node_pools", &self.cancel, move || inventory.list_node_pools())
            .await
            .map_err(|e| self.inventory_failure(e))?;
        let disruptions = self
            .inventory_retry
            .run("list_disruptions", &self.cancel, move || inventory.list_disruptions(window))
            .await
            .map_err(|e| self.inventory_failure(e))?;
        let workloads = self
            .inventory_retry
            .run("list_workloads", &self.cancel, move || inventory.list_workloads())
            .await
            .map_err(|e| self.inventory_failure(e))?;

        debug!(
            nodepools = pools.len(),
            disruptions = disruptions.len(),
            workloads = workloads.len(),
            "Loaded inventory"
        );
        Ok(InventoryView {
            pools,
            disruptions,
            workloads,
        })
    }

    fn inventory_failure(&self, err: crate::error::CollaboratorError) -> EngineError {
        self.metrics.inc_collaborator_failure("inventory");
        EngineError::from_inventory(err)
    }

    /// Produce the recommendation for a single pool
    ///
    /// Fails only with [`EngineError::Cancelled`]; prices looked up after
    /// cancellation are unresolved and the pool is abandoned.
    pub async fn recommend_pool(
        &self,
        mut state: NodePoolState,
        disruptions: &[DisruptionEvent],
        workloads: &[Workload],
    ) -> Result<Recommendation, EngineError> {
        let started = Instant::now();

        state.current_hourly_cost = self.estimate_current_cost(&state).await;
        self.ensure_not_cancelled(&state.name)?;

        let summary = DisruptionSummary::for_pool(disruptions, &state.name, self.disruption_window);
        let gpus: u32 = workloads
            .iter()
            .filter(|w| w.nodepool() == Some(state.name.as_str()))
            .map(|w| w.gpu_count)
            .sum();

        let assessment = self.calculator.calculate(&state, &summary, gpus);

        let (candidate, outcome_hint) = if assessment.is_zero() {
            (FleetCandidate::empty(), Some("empty_pool"))
        } else {
            let target = &assessment.target;
            let candidates = if gpus > 0 {
                self.catalog.gpu_candidates(state.architecture)
            } else {
                self.catalog
                    .candidate_types(
                        state.architecture,
                        target.cpu_cores,
                        target.memory_gib,
                        &self.cancel,
                    )
                    .await
            };

            let classes = order_pricing_classes(&state, &state.allowed_pricing_classes);
            let book = self.pricing.price_book(&candidates.names(), &classes).await;
            self.ensure_not_cancelled(&state.name)?;
            let selection = self.selector.select(target, &candidates.types, &classes, &book);
            self.metrics.add_candidates_evaluated(selection.evaluated);

            debug!(
                nodepool = %state.name,
                source = ?candidates.source,
                candidates = candidates.types.len(),
                evaluated = selection.evaluated,
                "Fleet search complete"
            );

            let hint = selection.best.is_empty().then_some("no_candidates");
            (selection.best, hint)
        };

        let mut rec = self
            .synthesizer
            .synthesize(&state, &assessment, candidate, self.clock.now());
        self.synthesizer.enhance(&mut rec, &assessment).await;

        let outcome = match outcome_hint {
            Some(hint) => hint,
            None if rec.has_recommendation => "recommended",
            None => "no_change",
        };
        self.metrics.inc_recommendation(outcome);
        self.metrics.set_potential_savings(
            &rec.nodepool,
            if rec.has_recommendation { rec.cost_savings } else { 0.0 },
        );
        self.metrics
            .observe_recommendation_latency(started.elapsed().as_secs_f64());
        self.logger.log_recommendation(
            &rec.nodepool,
            rec.has_recommendation,
            rec.current.node_count,
            rec.recommended.node_count,
            rec.recommended.pricing_class.as_str(),
            rec.current_hourly_cost,
            rec.recommended_hourly_cost,
            rec.savings_percent,
        );

        Ok(rec)
    }

    fn ensure_not_cancelled(&self, nodepool: &str) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            self.logger.log_pool_failed(nodepool, &EngineError::Cancelled.to_string());
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    /// Sum of node prices; nodes that cannot be priced are skipped
    pub async fn estimate_current_cost(&self, state: &NodePoolState) -> f64 {
        let mut total = 0.0;
        let mut unpriced = 0u32;
        for node in &state.nodes {
            let quote = self.pricing.price(&node.instance_type, node.pricing_class).await;
            if quote.is_resolved() {
                total += quote.hourly_price;
            } else {
                unpriced += 1;
            }
        }
        if unpriced > 0 {
            info!(
                nodepool = %state.name,
                unpriced,
                "Some nodes could not be priced; current cost is under-counted"
            );
        }
        total
    }

    /// Candidate types for an ad-hoc requirement
    pub async fn candidate_types(
        &self,
        architecture: Architecture,
        cpu_cores: f64,
        memory_gib: f64,
    ) -> CandidateList {
        self.catalog
            .candidate_types(architecture, cpu_cores, memory_gib, &self.cancel)
            .await
    }

    /// Resolve a single price through the full chain
    pub async fn price(&self, instance_type: &str, class: PricingClass) -> PriceQuote {
        self.pricing.price(instance_type, class).await
    }
}

async fn report(progress: Option<&mpsc::Sender<ProgressEvent>>, event: ProgressEvent) {
    if let Some(tx) = progress {
        // a dropped receiver only means nobody is watching
        let _ = tx.send(event).await;
    }
}

/// Builder for [`RecommendationEngine`]
pub struct RecommendationEngineBuilder {
    inventory: Option<Arc<dyn InventoryClient>>,
    catalog: Option<Arc<dyn PricingCatalog>>,
    estimator: Option<Arc<dyn PriceEstimator>>,
    explainer: Option<Arc<dyn Explainer>>,
    cache: Option<Arc<dyn PriceCache>>,
    clock: Option<Arc<dyn Clock>>,
    catalog_retry: Option<RetryPolicy>,
    inventory_retry: Option<RetryPolicy>,
    cancel: CancelSignal,
    config: EngineConfig,
}

impl RecommendationEngineBuilder {
    pub fn new() -> Self {
        Self {
            inventory: None,
            catalog: None,
            estimator: None,
            explainer: None,
            cache: None,
            clock: None,
            catalog_retry: None,
            inventory_retry: None,
            cancel: CancelSignal::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the inventory collaborator (required)
    pub fn inventory(mut self, inventory: Arc<dyn InventoryClient>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    /// Set the pricing catalog; overrides `catalog.endpoint` from the config
    pub fn catalog(mut self, catalog: Arc<dyn PricingCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn estimator(mut self, estimator: Arc<dyn PriceEstimator>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    pub fn explainer(mut self, explainer: Arc<dyn Explainer>) -> Self {
        self.explainer = Some(explainer);
        self
    }

    /// Share a price cache between engines
    pub fn cache(mut self, cache: Arc<dyn PriceCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn catalog_retry(mut self, policy: RetryPolicy) -> Self {
        self.catalog_retry = Some(policy);
        self
    }

    pub fn inventory_retry(mut self, policy: RetryPolicy) -> Self {
        self.inventory_retry = Some(policy);
        self
    }

    pub fn cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn build(self) -> Result<RecommendationEngine> {
        let inventory = self
            .inventory
            .ok_or_else(|| anyhow::anyhow!("Inventory is required"))?;
        self.config.validate()?;

        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let cache: Arc<dyn PriceCache> = match self.cache {
            Some(cache) => cache,
            None => Arc::new(InMemoryPriceCache::new(clock.clone(), self.config.cache_ttl())),
        };

        let catalog = match (self.catalog, &self.config.catalog.endpoint) {
            (Some(catalog), _) => Some(catalog),
            (None, Some(endpoint)) => {
                let client = HttpPricingCatalog::new(HttpCatalogConfig {
                    base_url: endpoint.clone(),
                    request_timeout: Duration::from_secs(self.config.catalog.request_timeout_secs),
                })?;
                Some(Arc::new(client) as Arc<dyn PricingCatalog>)
            }
            (None, None) => None,
        };

        let catalog_retry = self
            .catalog_retry
            .unwrap_or_else(|| self.config.catalog_retry_policy());
        let inventory_retry = self
            .inventory_retry
            .unwrap_or_else(|| self.config.inventory_retry_policy());

        let resolver = match &catalog {
            Some(catalog) => CatalogResolver::new(catalog.clone(), catalog_retry.clone()),
            None => CatalogResolver::offline(),
        }
        .with_max_candidates(self.config.catalog.max_candidates);

        let pricing = PricingResolver::standard(
            cache,
            catalog,
            catalog_retry,
            self.cancel.clone(),
            self.estimator
                .map(|estimator| (estimator, self.config.explainer_timeout())),
        );

        let mut synthesizer = RecommendationSynthesizer::new();
        if let Some(explainer) = self.explainer {
            synthesizer = synthesizer.with_explainer(explainer, self.config.explainer_timeout());
        }

        info!(
            catalog = self.config.catalog.endpoint.as_deref().unwrap_or("offline"),
            price_tiers = ?pricing.source_tags(),
            "Recommendation engine ready"
        );

        Ok(RecommendationEngine {
            inventory,
            catalog: resolver,
            pricing,
            calculator: CapacityCalculator::new(),
            selector: FleetSelector::new(),
            synthesizer,
            clock,
            inventory_retry,
            disruption_window: self.config.disruption_window(),
            cancel: self.cancel,
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::new("engine"),
        })
    }
}

impl Default for RecommendationEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
