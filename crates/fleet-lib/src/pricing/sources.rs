//! The individual tiers of the price chain

use super::{PriceSource, PriceSourceTag, SourcedPrice};
use crate::catalog::{InstanceTypeSpec, PricingCatalog};
use crate::error::CollaboratorError;
use crate::models::PricingClass;
use crate::pricing::static_on_demand_price;
use crate::retry::{CancelSignal, RetryPolicy};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Remote catalog lookup with retry and cancellation
pub struct CatalogPriceSource {
    catalog: Arc<dyn PricingCatalog>,
    retry: RetryPolicy,
    cancel: CancelSignal,
}

impl CatalogPriceSource {
    pub fn new(catalog: Arc<dyn PricingCatalog>, retry: RetryPolicy, cancel: CancelSignal) -> Self {
        Self {
            catalog,
            retry,
            cancel,
        }
    }

    async fn fetch(
        &self,
        instance_type: &str,
        class: PricingClass,
    ) -> Result<f64, CollaboratorError> {
        let catalog = &self.catalog;
        self.retry
            .run("get_price", &self.cancel, || catalog.get_price(instance_type, class))
            .await
    }
}

#[async_trait]
impl PriceSource for CatalogPriceSource {
    fn tag(&self) -> PriceSourceTag {
        PriceSourceTag::CatalogApi
    }

    async fn try_price(
        &self,
        instance_type: &str,
        class: PricingClass,
    ) -> Result<Option<SourcedPrice>, CollaboratorError> {
        match self.fetch(instance_type, class).await {
            Ok(price) if price > 0.0 => {
                return Ok(Some(SourcedPrice {
                    hourly_price: price,
                    quoted_class: class,
                }))
            }
            Ok(_) => {
                debug!(instance_type, class = %class, "Catalog returned a zero price");
                return Ok(None);
            }
            // no class-specific quote: fall back to the canonical on-demand price
            Err(CollaboratorError::NotFound(_)) if class == PricingClass::Spot => {}
            Err(CollaboratorError::Cancelled) => return Err(CollaboratorError::Cancelled),
            Err(err) => {
                debug!(instance_type, class = %class, error = %err, "Catalog price lookup failed");
                return Ok(None);
            }
        }

        match self.fetch(instance_type, PricingClass::OnDemand).await {
            Ok(price) if price > 0.0 => Ok(Some(SourcedPrice::on_demand(price))),
            Ok(_) => Ok(None),
            Err(CollaboratorError::Cancelled) => Err(CollaboratorError::Cancelled),
            Err(err) => {
                debug!(instance_type, error = %err, "Catalog on-demand lookup failed");
                Ok(None)
            }
        }
    }
}

/// Hardcoded price table
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticTableSource;

#[async_trait]
impl PriceSource for StaticTableSource {
    fn tag(&self) -> PriceSourceTag {
        PriceSourceTag::StaticTable
    }

    async fn try_price(
        &self,
        instance_type: &str,
        _class: PricingClass,
    ) -> Result<Option<SourcedPrice>, CollaboratorError> {
        Ok(static_on_demand_price(instance_type).map(SourcedPrice::on_demand))
    }
}

/// Family base price scaled by the size multiplier
#[derive(Debug, Default, Clone, Copy)]
pub struct FamilyHeuristicSource;

#[async_trait]
impl PriceSource for FamilyHeuristicSource {
    fn tag(&self) -> PriceSourceTag {
        PriceSourceTag::FamilyHeuristic
    }

    async fn try_price(
        &self,
        instance_type: &str,
        _class: PricingClass,
    ) -> Result<Option<SourcedPrice>, CollaboratorError> {
        let price = InstanceTypeSpec::parse(instance_type)
            .map(|spec| spec.heuristic_hourly_price())
            .filter(|price| *price > 0.0);
        Ok(price.map(SourcedPrice::on_demand))
    }
}

/// Optional text-model collaborator asked for an on-demand price estimate
#[async_trait]
pub trait PriceEstimator: Send + Sync {
    async fn estimate_on_demand_price(&self, instance_type: &str) -> Result<f64, CollaboratorError>;
}

/// Last-resort tier backed by a [`PriceEstimator`]
pub struct TextModelSource {
    estimator: Arc<dyn PriceEstimator>,
    timeout: Duration,
}

impl TextModelSource {
    pub fn new(estimator: Arc<dyn PriceEstimator>, timeout: Duration) -> Self {
        Self { estimator, timeout }
    }
}

#[async_trait]
impl PriceSource for TextModelSource {
    fn tag(&self) -> PriceSourceTag {
        PriceSourceTag::TextModelEstimate
    }

    async fn try_price(
        &self,
        instance_type: &str,
        _class: PricingClass,
    ) -> Result<Option<SourcedPrice>, CollaboratorError> {
        let estimate = self.estimator.estimate_on_demand_price(instance_type);
        match tokio::time::timeout(self.timeout, estimate).await {
            Ok(Ok(price)) if price.is_finite() && price > 0.0 => {
                Ok(Some(SourcedPrice::on_demand(price)))
            }
            Ok(Ok(price)) => {
                debug!(instance_type, price, "Discarding implausible price estimate");
                Ok(None)
            }
            Ok(Err(err)) => {
                debug!(instance_type, error = %err, "Price estimate failed");
                Ok(None)
            }
            Err(_) => {
                debug!(instance_type, "Price estimate timed out");
                Ok(None)
            }
        }
    }
}
