//! Instance catalog: the pricing-catalog collaborator and candidate resolution
//!
//! [`PricingCatalog`] is the boundary to the remote price/instance service.
//! [`CatalogResolver`] turns a capacity requirement into a ranked list of
//! candidate instance types, falling back to static tables when the catalog
//! is unavailable.

mod fallback;
mod http;
mod instance;
mod resolver;

pub use fallback::{gpu_instance, gpu_instances, static_candidates, GpuInstance, GPU_INSTANCES};
pub use http::{HttpCatalogConfig, HttpPricingCatalog};
pub use instance::{
    size_multiplier, FamilyTemplate, InstanceFamily, InstanceTypeSpec, FAMILY_TEMPLATES,
};
pub use resolver::{CandidateList, CandidateSource, CatalogResolver};

use crate::error::CollaboratorError;
use crate::models::{Architecture, PricingClass};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote pricing catalog
#[async_trait]
pub trait PricingCatalog: Send + Sync {
    /// Hourly price of `instance_type` in `class`
    async fn get_price(
        &self,
        instance_type: &str,
        class: PricingClass,
    ) -> Result<f64, CollaboratorError>;

    /// Every instance type offered for `architecture`
    async fn list_instance_types(
        &self,
        architecture: Architecture,
    ) -> Result<Vec<String>, CollaboratorError>;
}

/// Memory:CPU shape of a capacity requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatioClass {
    General,
    Compute,
    Memory,
}

/// GiB of memory per core above which a requirement is memory-bound
pub const MEMORY_OPTIMIZED_RATIO: f64 = 8.0;
/// Total cores above which a requirement is compute-bound
pub const COMPUTE_OPTIMIZED_CORES: f64 = 8.0;

impl RatioClass {
    pub fn classify(cpu_cores: f64, memory_gib: f64) -> Self {
        if cpu_cores <= 0.0 {
            return if memory_gib > 0.0 {
                RatioClass::Memory
            } else {
                RatioClass::General
            };
        }

        if memory_gib / cpu_cores > MEMORY_OPTIMIZED_RATIO {
            RatioClass::Memory
        } else if cpu_cores > COMPUTE_OPTIMIZED_CORES {
            RatioClass::Compute
        } else {
            RatioClass::General
        }
    }

    pub fn family(&self) -> InstanceFamily {
        match self {
            RatioClass::General => InstanceFamily::GeneralPurpose,
            RatioClass::Compute => InstanceFamily::ComputeOptimized,
            RatioClass::Memory => InstanceFamily::MemoryOptimized,
        }
    }
}

impl fmt::Display for RatioClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.family(), f)
    }
}
