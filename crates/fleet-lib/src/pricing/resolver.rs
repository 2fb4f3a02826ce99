//! Price resolution through the cache and the source chain

use super::{
    CatalogPriceSource, FamilyHeuristicSource, PriceCache, PriceEstimator, PriceKey, PriceQuote,
    PriceSource, PriceSourceTag, StaticTableSource, TextModelSource,
};
use crate::catalog::PricingCatalog;
use crate::models::PricingClass;
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::retry::{CancelSignal, RetryPolicy};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

/// Spot price as a fraction of the on-demand price
pub const SPOT_DISCOUNT_MULTIPLIER: f64 = 0.25;

type KeyGate = Arc<AsyncMutex<()>>;

/// Resolves prices through the cache and then each source in order
///
/// Lookups of the same key are serialized, so concurrent misses reach the
/// sources once and the later callers are served from the cache.
pub struct PricingResolver {
    cache: Arc<dyn PriceCache>,
    sources: Vec<Arc<dyn PriceSource>>,
    inflight: Mutex<HashMap<PriceKey, KeyGate>>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl PricingResolver {
    pub fn new(cache: Arc<dyn PriceCache>, sources: Vec<Arc<dyn PriceSource>>) -> Self {
        Self {
            cache,
            sources,
            inflight: Mutex::new(HashMap::new()),
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::new("pricing"),
        }
    }

    /// Static table and family heuristic only
    pub fn offline(cache: Arc<dyn PriceCache>) -> Self {
        Self::new(
            cache,
            vec![Arc::new(StaticTableSource), Arc::new(FamilyHeuristicSource)],
        )
    }

    /// The full chain: catalog, static table, family heuristic and the
    /// optional estimator
    pub fn standard(
        cache: Arc<dyn PriceCache>,
        catalog: Option<Arc<dyn PricingCatalog>>,
        retry: RetryPolicy,
        cancel: CancelSignal,
        estimator: Option<(Arc<dyn PriceEstimator>, Duration)>,
    ) -> Self {
        let mut sources: Vec<Arc<dyn PriceSource>> = Vec::new();
        if let Some(catalog) = catalog {
            sources.push(Arc::new(CatalogPriceSource::new(catalog, retry, cancel)));
        }
        sources.push(Arc::new(StaticTableSource));
        sources.push(Arc::new(FamilyHeuristicSource));
        if let Some((estimator, timeout)) = estimator {
            sources.push(Arc::new(TextModelSource::new(estimator, timeout)));
        }
        Self::new(cache, sources)
    }

    pub fn source_tags(&self) -> Vec<PriceSourceTag> {
        self.sources.iter().map(|s| s.tag()).collect()
    }

    /// Hourly price of `instance_type` in `class`
    ///
    /// Never fails: when every tier misses the quote is tagged
    /// [`PriceSourceTag::Unresolved`] with a zero price and is not cached.
    /// A cancelled lookup also yields an unresolved quote, without asking
    /// the later tiers.
    pub async fn price(&self, instance_type: &str, class: PricingClass) -> PriceQuote {
        let key = PriceKey::new(instance_type, class);
        let gate = self.gate(&key);
        let quote = {
            let _resolving = gate.lock().await;
            self.resolve(&key).await
        };
        self.release(&key, gate);
        quote
    }

    async fn resolve(&self, key: &PriceKey) -> PriceQuote {
        let instance_type = key.instance_type.as_str();
        let class = key.class;

        if let Some(mut cached) = self.cache.get(key) {
            self.metrics.inc_cache_hit();
            self.metrics.inc_price_lookup(PriceSourceTag::ProcessCache.as_str());
            cached.source = PriceSourceTag::ProcessCache;
            return cached;
        }
        self.metrics.inc_cache_miss();

        for source in &self.sources {
            let sourced = match source.try_price(instance_type, class).await {
                Ok(Some(sourced)) => sourced,
                Ok(None) => {
                    debug!(
                        instance_type,
                        class = %class,
                        tier = %source.tag(),
                        "Price tier missed"
                    );
                    continue;
                }
                Err(err) => {
                    self.metrics.inc_price_lookup(PriceSourceTag::Unresolved.as_str());
                    debug!(
                        instance_type,
                        class = %class,
                        tier = %source.tag(),
                        error = %err,
                        "Price lookup aborted"
                    );
                    return PriceQuote::unresolved(instance_type, class);
                }
            };

            let hourly_price =
                if class == PricingClass::Spot && sourced.quoted_class == PricingClass::OnDemand {
                    sourced.hourly_price * SPOT_DISCOUNT_MULTIPLIER
                } else {
                    sourced.hourly_price
                };

            let quote = PriceQuote {
                instance_type: instance_type.to_string(),
                pricing_class: class,
                hourly_price,
                source: source.tag(),
                expires_at: None,
            };

            self.metrics.inc_price_lookup(source.tag().as_str());
            if !matches!(source.tag(), PriceSourceTag::CatalogApi) {
                self.logger
                    .log_pricing_fallback(instance_type, class.as_str(), source.tag().as_str());
            }

            return self.cache.put(key.clone(), quote);
        }

        self.metrics.inc_price_lookup(PriceSourceTag::Unresolved.as_str());
        debug!(instance_type, class = %class, "No tier could price instance type");
        PriceQuote::unresolved(instance_type, class)
    }

    fn gate(&self, key: &PriceKey) -> KeyGate {
        match self.inflight.lock() {
            Ok(mut inflight) => inflight.entry(key.clone()).or_default().clone(),
            Err(_) => {
                warn!("In-flight price map poisoned, resolving without deduplication");
                KeyGate::default()
            }
        }
    }

    fn release(&self, key: &PriceKey, gate: KeyGate) {
        if let Ok(mut inflight) = self.inflight.lock() {
            // ours and the map's: nobody else is waiting on this key
            if Arc::strong_count(&gate) == 2 {
                inflight.remove(key);
            }
        }
    }

    /// Resolve every (type, class) pair up front
    pub async fn price_book(
        &self,
        instance_types: &[String],
        classes: &[PricingClass],
    ) -> PriceBook {
        let mut book = PriceBook::default();
        for class in classes {
            for instance_type in instance_types {
                let key = PriceKey::new(instance_type.as_str(), *class);
                if book.quotes.contains_key(&key) {
                    continue;
                }
                let quote = self.price(instance_type, *class).await;
                book.quotes.insert(key, quote);
            }
        }
        book
    }
}

/// Pre-resolved prices consumed by the selector
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    quotes: HashMap<PriceKey, PriceQuote>,
}

impl PriceBook {
    pub fn insert(&mut self, quote: PriceQuote) {
        let key = PriceKey::new(quote.instance_type.as_str(), quote.pricing_class);
        self.quotes.insert(key, quote);
    }

    pub fn quote(&self, instance_type: &str, class: PricingClass) -> Option<&PriceQuote> {
        self.quotes.get(&PriceKey::new(instance_type, class))
    }

    /// Hourly price, `None` when the pair is unknown or unresolved
    pub fn hourly_price(&self, instance_type: &str, class: PricingClass) -> Option<f64> {
        self.quote(instance_type, class)
            .filter(|q| q.is_resolved())
            .map(|q| q.hourly_price)
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn quotes(&self) -> impl Iterator<Item = &PriceQuote> {
        self.quotes.values()
    }
}
