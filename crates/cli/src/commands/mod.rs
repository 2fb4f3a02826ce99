//! CLI subcommands

pub mod costs;
pub mod inspect;
pub mod recommend;

use anyhow::{Context, Result};
use fleet_lib::inventory::{InventoryClient, SnapshotInventory};
use fleet_lib::{EngineConfig, RecommendationEngine};
use std::path::Path;
use std::sync::Arc;

/// Engine reading the given snapshot
pub(crate) fn engine_for_snapshot(
    config: &EngineConfig,
    snapshot: &Path,
) -> Result<RecommendationEngine> {
    let inventory = SnapshotInventory::load(snapshot)?;
    engine_with(config, Arc::new(inventory))
}

/// Engine without inventory, for price and candidate lookups
pub(crate) fn engine_without_inventory(config: &EngineConfig) -> Result<RecommendationEngine> {
    engine_with(config, Arc::new(SnapshotInventory::empty()))
}

fn engine_with(
    config: &EngineConfig,
    inventory: Arc<dyn InventoryClient>,
) -> Result<RecommendationEngine> {
    RecommendationEngine::builder()
        .config(config.clone())
        .inventory(inventory)
        .build()
        .context("Failed to build recommendation engine")
}
