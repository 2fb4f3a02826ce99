//! Candidate instance-type resolution

use super::fallback::{gpu_instances, static_candidates};
use super::instance::InstanceTypeSpec;
use super::{PricingCatalog, RatioClass};
use crate::models::Architecture;
use crate::pricing::static_on_demand_price;
use crate::retry::{CancelSignal, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a candidate list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CandidateSource {
    Catalog,
    StaticTable,
    GpuTable,
}

/// Ranked candidate types for one requirement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateList {
    /// `None` for GPU candidate lists
    pub ratio_class: Option<RatioClass>,
    pub source: CandidateSource,
    pub types: Vec<InstanceTypeSpec>,
}

impl CandidateList {
    pub fn names(&self) -> Vec<String> {
        self.types.iter().map(|t| t.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Resolves candidate instance types from the catalog or static tables
pub struct CatalogResolver {
    catalog: Option<Arc<dyn PricingCatalog>>,
    retry: RetryPolicy,
    max_candidates: usize,
}

impl CatalogResolver {
    pub const MIN_CANDIDATES: usize = 10;
    pub const MAX_CANDIDATES: usize = 20;
    pub const DEFAULT_CANDIDATES: usize = 15;

    pub fn new(catalog: Arc<dyn PricingCatalog>, retry: RetryPolicy) -> Self {
        Self {
            catalog: Some(catalog),
            retry,
            max_candidates: Self::DEFAULT_CANDIDATES,
        }
    }

    /// Resolver that only ever uses the static tables
    pub fn offline() -> Self {
        Self {
            catalog: None,
            retry: RetryPolicy::default(),
            max_candidates: Self::DEFAULT_CANDIDATES,
        }
    }

    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max.clamp(Self::MIN_CANDIDATES, Self::MAX_CANDIDATES);
        self
    }

    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    /// Ranked non-GPU candidates for the given architecture and requirement
    pub async fn candidate_types(
        &self,
        architecture: Architecture,
        cpu_cores: f64,
        memory_gib: f64,
        cancel: &CancelSignal,
    ) -> CandidateList {
        let class = RatioClass::classify(cpu_cores, memory_gib);

        if let Some(names) = self.list_from_catalog(architecture, cancel).await {
            let types = self.filter_and_rank(names.iter().map(String::as_str), architecture, class);
            if !types.is_empty() {
                debug!(
                    architecture = %architecture,
                    ratio_class = %class,
                    count = types.len(),
                    "Resolved candidates from catalog"
                );
                return CandidateList {
                    ratio_class: Some(class),
                    source: CandidateSource::Catalog,
                    types,
                };
            }
            warn!(
                architecture = %architecture,
                ratio_class = %class,
                "Catalog returned no usable candidates, using static table"
            );
        }

        let types = self.filter_and_rank(
            static_candidates(architecture, class).iter().copied(),
            architecture,
            class,
        );
        CandidateList {
            ratio_class: Some(class),
            source: CandidateSource::StaticTable,
            types,
        }
    }

    /// GPU candidates for the architecture, cheapest per GPU first
    pub fn gpu_candidates(&self, architecture: Architecture) -> CandidateList {
        let types = gpu_instances(architecture)
            .into_iter()
            .filter_map(|shape| shape.to_spec())
            .take(self.max_candidates)
            .collect();
        CandidateList {
            ratio_class: None,
            source: CandidateSource::GpuTable,
            types,
        }
    }

    async fn list_from_catalog(
        &self,
        architecture: Architecture,
        cancel: &CancelSignal,
    ) -> Option<Vec<String>> {
        let catalog = self.catalog.as_ref()?;
        match self
            .retry
            .run("list_instance_types", cancel, || catalog.list_instance_types(architecture))
            .await
        {
            Ok(names) => Some(names),
            Err(err) => {
                warn!(
                    architecture = %architecture,
                    error = %err,
                    "Catalog listing failed, using static table"
                );
                None
            }
        }
    }

    fn filter_and_rank<'a>(
        &self,
        names: impl Iterator<Item = &'a str>,
        architecture: Architecture,
        class: RatioClass,
    ) -> Vec<InstanceTypeSpec> {
        let mut seen = HashSet::new();
        let mut ranked: Vec<(f64, InstanceTypeSpec)> = names
            .filter(|name| seen.insert(*name))
            .filter_map(InstanceTypeSpec::parse)
            .filter(|spec| {
                !spec.is_accelerated()
                    && spec.family == class.family()
                    && spec.architecture == architecture
                    && spec.vcpus > 0
                    && spec.memory_gib > 0.0
            })
            .map(|spec| (cost_efficiency(&spec), spec))
            .collect();

        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));
        ranked
            .into_iter()
            .take(self.max_candidates)
            .map(|(_, spec)| spec)
            .collect()
    }
}

/// Reference price per weighted unit of capacity; lower is better
fn cost_efficiency(spec: &InstanceTypeSpec) -> f64 {
    let score = spec.capacity_score();
    if score <= 0.0 {
        return f64::INFINITY;
    }
    let price = static_on_demand_price(&spec.name).unwrap_or_else(|| spec.heuristic_hourly_price());
    if price <= 0.0 {
        f64::INFINITY
    } else {
        price / score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InstanceFamily;
    use crate::error::CollaboratorError;
    use crate::models::PricingClass;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct ListingCatalog {
        types: Result<Vec<String>, CollaboratorError>,
        calls: AtomicU32,
    }

    impl ListingCatalog {
        fn new(types: Result<Vec<&str>, CollaboratorError>) -> Arc<Self> {
            Arc::new(Self {
                types: types.map(|t| t.into_iter().map(String::from).collect()),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl PricingCatalog for ListingCatalog {
        async fn get_price(&self, _: &str, _: PricingClass) -> Result<f64, CollaboratorError> {
            Err(CollaboratorError::NotFound("unused".into()))
        }

        async fn list_instance_types(
            &self,
            _: Architecture,
        ) -> Result<Vec<String>, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.types.clone()
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::default()
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(2))
    }

    #[tokio::test]
    async fn test_catalog_candidates_filtered_and_ranked() {
        let catalog = ListingCatalog::new(Ok(vec![
            "m6i.xlarge",
            "m6a.xlarge",
            "m6g.xlarge",
            "c6i.2xlarge",
            "g5.xlarge",
            "m6i.xlarge",
            "m5.metal",
        ]));
        let resolver = CatalogResolver::new(catalog, fast_retry());

        let list = resolver
            .candidate_types(Architecture::Amd64, 4.0, 16.0, &CancelSignal::new())
            .await;

        assert_eq!(list.source, CandidateSource::Catalog);
        assert_eq!(list.ratio_class, Some(RatioClass::General));
        // m6a is cheaper than m6i for the same shape
        assert_eq!(list.names(), vec!["m6a.xlarge", "m6i.xlarge"]);
    }

    #[tokio::test]
    async fn test_arm_memory_requirement_yields_arm_memory_types() {
        let catalog = ListingCatalog::new(Ok(vec![
            "r6g.xlarge",
            "r6i.xlarge",
            "m6g.xlarge",
            "x2gd.xlarge",
            "r7g.2xlarge",
            "g5g.xlarge",
        ]));
        let resolver = CatalogResolver::new(catalog, fast_retry());

        let list = resolver
            .candidate_types(Architecture::Arm64, 4.0, 40.0, &CancelSignal::new())
            .await;

        assert_eq!(list.ratio_class, Some(RatioClass::Memory));
        assert!(!list.is_empty());
        for spec in &list.types {
            assert_eq!(spec.architecture, Architecture::Arm64);
            assert_eq!(spec.family, InstanceFamily::MemoryOptimized);
        }
    }

    #[tokio::test]
    async fn test_falls_back_to_static_table_on_failure() {
        let catalog = ListingCatalog::new(Err(CollaboratorError::Unavailable("down".into())));
        let resolver = CatalogResolver::new(catalog.clone(), fast_retry());

        let list = resolver
            .candidate_types(Architecture::Arm64, 4.0, 40.0, &CancelSignal::new())
            .await;

        assert_eq!(list.source, CandidateSource::StaticTable);
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 3);
        assert!(list
            .types
            .iter()
            .all(|s| s.architecture == Architecture::Arm64
                && s.family == InstanceFamily::MemoryOptimized));
    }

    #[tokio::test]
    async fn test_falls_back_when_catalog_has_nothing_matching() {
        let catalog = ListingCatalog::new(Ok(vec!["g5.xlarge", "p3.2xlarge"]));
        let resolver = CatalogResolver::new(catalog, fast_retry());

        let list = resolver
            .candidate_types(Architecture::Amd64, 16.0, 32.0, &CancelSignal::new())
            .await;

        assert_eq!(list.source, CandidateSource::StaticTable);
        assert_eq!(list.ratio_class, Some(RatioClass::Compute));
        assert!(list.types.iter().all(|s| !s.is_accelerated()));
    }

    #[test]
    fn test_max_candidates_is_clamped() {
        assert_eq!(CatalogResolver::offline().with_max_candidates(3).max_candidates(), 10);
        assert_eq!(CatalogResolver::offline().with_max_candidates(50).max_candidates(), 20);
        assert_eq!(CatalogResolver::offline().max_candidates(), 15);
    }

    #[test]
    fn test_gpu_candidates() {
        let list = CatalogResolver::offline().gpu_candidates(Architecture::Amd64);
        assert_eq!(list.source, CandidateSource::GpuTable);
        assert!(list.types.iter().all(|s| s.gpus > 0));
    }
}
