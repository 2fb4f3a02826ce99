//! Cluster inventory collaborator
//!
//! The engine reads NodePool usage, disruption history and workloads through
//! [`InventoryClient`]. Any failure here aborts the analysis.

mod snapshot;

pub use snapshot::{FleetSnapshot, NodePoolSnapshot, SnapshotInventory};

use crate::error::CollaboratorError;
use crate::models::{DisruptionEvent, NodePoolState, Workload};
use async_trait::async_trait;
use chrono::Duration;

#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Every NodePool with its per-node usage
    async fn list_node_pools(&self) -> Result<Vec<NodePoolState>, CollaboratorError>;

    /// Disruption events inside the trailing `window`
    async fn list_disruptions(
        &self,
        window: Duration,
    ) -> Result<Vec<DisruptionEvent>, CollaboratorError>;

    /// Workloads, used to find GPU requests per NodePool
    async fn list_workloads(&self) -> Result<Vec<Workload>, CollaboratorError>;
}
