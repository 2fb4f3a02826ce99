//! Multi-tier price resolution
//!
//! Prices are resolved through an ordered chain of [`PriceSource`]s behind a
//! shared [`PriceCache`]. The first source that yields a price wins; every
//! miss falls through to the next tier.

mod cache;
mod resolver;
mod sources;
mod table;

pub use cache::{CacheStats, InMemoryPriceCache, DEFAULT_CACHE_TTL_HOURS};
pub use resolver::{PriceBook, PricingResolver, SPOT_DISCOUNT_MULTIPLIER};
pub use sources::{
    CatalogPriceSource, FamilyHeuristicSource, PriceEstimator, StaticTableSource, TextModelSource,
};
pub use table::static_on_demand_price;

use crate::error::CollaboratorError;
use crate::models::PricingClass;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which tier produced a price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriceSourceTag {
    ProcessCache,
    CatalogApi,
    StaticTable,
    FamilyHeuristic,
    TextModelEstimate,
    Unresolved,
}

impl PriceSourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSourceTag::ProcessCache => "process-cache",
            PriceSourceTag::CatalogApi => "catalog-api",
            PriceSourceTag::StaticTable => "static-table",
            PriceSourceTag::FamilyHeuristic => "family-heuristic",
            PriceSourceTag::TextModelEstimate => "text-model-estimate",
            PriceSourceTag::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for PriceSourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PriceKey {
    pub instance_type: String,
    pub class: PricingClass,
}

impl PriceKey {
    pub fn new(instance_type: impl Into<String>, class: PricingClass) -> Self {
        Self {
            instance_type: instance_type.into(),
            class,
        }
    }
}

/// A resolved (or unresolved) hourly price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub instance_type: String,
    pub pricing_class: PricingClass,
    pub hourly_price: f64,
    pub source: PriceSourceTag,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PriceQuote {
    pub fn unresolved(instance_type: &str, class: PricingClass) -> Self {
        Self {
            instance_type: instance_type.to_string(),
            pricing_class: class,
            hourly_price: 0.0,
            source: PriceSourceTag::Unresolved,
            expires_at: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.source != PriceSourceTag::Unresolved && self.hourly_price > 0.0
    }
}

/// Price as returned by a single source, with the class it was quoted for
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourcedPrice {
    pub hourly_price: f64,
    /// Class the price applies to; on-demand quotes for a spot request get
    /// the discount applied by the resolver
    pub quoted_class: PricingClass,
}

impl SourcedPrice {
    pub fn on_demand(hourly_price: f64) -> Self {
        Self {
            hourly_price,
            quoted_class: PricingClass::OnDemand,
        }
    }
}

/// One tier of the price chain
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn tag(&self) -> PriceSourceTag;

    /// `Ok(None)` means "not known here, ask the next tier". An error stops
    /// the chain and nothing is cached; only cancellation is reported this way.
    async fn try_price(
        &self,
        instance_type: &str,
        class: PricingClass,
    ) -> Result<Option<SourcedPrice>, CollaboratorError>;
}

/// Storage for resolved quotes
pub trait PriceCache: Send + Sync {
    fn get(&self, key: &PriceKey) -> Option<PriceQuote>;

    /// Store `quote` and return it as stored, expiry included
    fn put(&self, key: PriceKey, quote: PriceQuote) -> PriceQuote;
}
