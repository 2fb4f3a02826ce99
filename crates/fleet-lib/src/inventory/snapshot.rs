//! Inventory backed by a JSON snapshot file

use super::InventoryClient;
use crate::error::CollaboratorError;
use crate::models::{
    Architecture, DisruptionEvent, NodePoolState, NodeUsageSnapshot, PricingClass, Workload,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// One NodePool as written in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodePoolSnapshot {
    pub name: String,
    #[serde(default)]
    pub architecture: Option<Architecture>,
    #[serde(default)]
    pub taints: Vec<String>,
    #[serde(default)]
    pub allowed_pricing_classes: Vec<PricingClass>,
    #[serde(default)]
    pub nodes: Vec<NodeUsageSnapshot>,
}

impl NodePoolSnapshot {
    pub fn to_state(&self) -> NodePoolState {
        NodePoolState::aggregate(self.name.clone(), self.architecture, self.nodes.clone())
            .with_taints(self.taints.clone())
            .with_allowed_pricing_classes(self.allowed_pricing_classes.clone())
    }
}

/// Complete cluster snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub nodepools: Vec<NodePoolSnapshot>,
    #[serde(default)]
    pub workloads: Vec<Workload>,
    #[serde(default)]
    pub disruptions: Vec<DisruptionEvent>,
}

/// [`InventoryClient`] serving a previously captured snapshot
#[derive(Debug, Clone)]
pub struct SnapshotInventory {
    snapshot: FleetSnapshot,
}

impl SnapshotInventory {
    pub fn new(snapshot: FleetSnapshot) -> Self {
        Self { snapshot }
    }

    /// Inventory with no pools, captured now
    pub fn empty() -> Self {
        Self::new(FleetSnapshot {
            captured_at: Utc::now(),
            nodepools: Vec::new(),
            workloads: Vec::new(),
            disruptions: Vec::new(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: FleetSnapshot =
            serde_json::from_str(json).context("Failed to parse fleet snapshot")?;
        Ok(Self::new(snapshot))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let inventory = Self::from_json(&content)
            .with_context(|| format!("Invalid snapshot {}", path.display()))?;
        info!(
            path = %path.display(),
            nodepools = inventory.snapshot.nodepools.len(),
            captured_at = %inventory.snapshot.captured_at,
            "Loaded fleet snapshot"
        );
        Ok(inventory)
    }

    pub fn snapshot(&self) -> &FleetSnapshot {
        &self.snapshot
    }
}

#[async_trait]
impl InventoryClient for SnapshotInventory {
    async fn list_node_pools(&self) -> Result<Vec<NodePoolState>, CollaboratorError> {
        Ok(self.snapshot.nodepools.iter().map(NodePoolSnapshot::to_state).collect())
    }

    async fn list_disruptions(
        &self,
        window: Duration,
    ) -> Result<Vec<DisruptionEvent>, CollaboratorError> {
        // windowed relative to capture time, not wall time
        let until = self.snapshot.captured_at;
        let since = until - window;
        Ok(self
            .snapshot
            .disruptions
            .iter()
            .filter(|e| e.occurred_at >= since && e.occurred_at <= until)
            .cloned()
            .collect())
    }

    async fn list_workloads(&self) -> Result<Vec<Workload>, CollaboratorError> {
        Ok(self.snapshot.workloads.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SNAPSHOT: &str = r#"{
        "captured_at": "2024-06-01T12:00:00Z",
        "nodepools": [
            {
                "name": "default",
                "taints": ["dedicated=web:NoSchedule"],
                "nodes": [
                    {
                        "node_name": "ip-10-0-1-1",
                        "nodepool": "default",
                        "instance_type": "m6i.xlarge",
                        "pricing_class": "on-demand",
                        "architecture": "amd64",
                        "cpu_used": "800m",
                        "cpu_allocatable": "3920m",
                        "memory_used": "4Gi",
                        "memory_allocatable": 14.8,
                        "pod_count": 12,
                        "created_at": "2024-05-20T08:00:00Z"
                    }
                ]
            },
            { "name": "arm", "architecture": "arm64", "allowed_pricing_classes": ["spot"] }
        ],
        "workloads": [
            {
                "name": "api",
                "namespace": "prod",
                "cpu_request": "500m",
                "memory_request": "512Mi",
                "labels": { "karpenter.sh/nodepool": "default" }
            }
        ],
        "disruptions": [
            {
                "nodepool": "default",
                "kind": "consolidation",
                "occurred_at": "2024-05-31T12:00:00Z"
            },
            { "nodepool": "default", "kind": "drift", "occurred_at": "2024-04-01T12:00:00Z" }
        ]
    }"#;

    #[tokio::test]
    async fn test_snapshot_inventory() {
        let inventory = SnapshotInventory::from_json(SNAPSHOT).unwrap();

        let pools = inventory.list_node_pools().await.unwrap();
        assert_eq!(pools.len(), 2);
        let default = &pools[0];
        assert_eq!(default.node_count, 1);
        assert!((default.cpu_allocatable - 3.92).abs() < 1e-9);
        assert!((default.memory_used - 4.0).abs() < 1e-9);
        assert_eq!(default.taints, vec!["dedicated=web:NoSchedule"]);
        assert_eq!(default.allowed_pricing_classes, PricingClass::ALL.to_vec());

        let arm = &pools[1];
        assert_eq!(arm.architecture, Architecture::Arm64);
        assert_eq!(arm.allowed_pricing_classes, vec![PricingClass::Spot]);

        let recent = inventory.list_disruptions(Duration::days(7)).await.unwrap();
        assert_eq!(recent.len(), 1);

        let workloads = inventory.list_workloads().await.unwrap();
        assert_eq!(workloads[0].nodepool(), Some("default"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();

        let inventory = SnapshotInventory::load(file.path()).unwrap();
        assert_eq!(inventory.snapshot().nodepools.len(), 2);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        assert!(SnapshotInventory::load(file.path()).is_err());
        assert!(SnapshotInventory::load(Path::new("/nonexistent/snapshot.json")).is_err());
    }

    #[tokio::test]
    async fn test_empty_inventory() {
        let inventory = SnapshotInventory::empty();
        assert!(inventory.list_node_pools().await.unwrap().is_empty());
        assert!(inventory.list_workloads().await.unwrap().is_empty());
    }
}
