//! Capacity requirement calculation
//!
//! Turns the observed usage of a pool plus its disruption history into the
//! capacity the recommended fleet must provide. The bounded-reduction rule
//! keeps any single recommendation from removing more than half of the pool
//! (seventy percent when both axes are nearly idle).

use crate::models::{CapacityTarget, DisruptionSummary, NodePoolState};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Target utilisation for a normally loaded pool
pub const NORMAL_TARGET_UTILIZATION: f64 = 0.75;
/// Target utilisation for an over-provisioned pool
pub const OVER_PROVISIONED_TARGET_UTILIZATION: f64 = 0.85;
/// Margin applied on top of measured usage
pub const CAPACITY_HEADROOM: f64 = 1.2;
/// Below this utilisation (percent) on either axis a pool is over-provisioned
pub const OVER_PROVISIONED_UTILIZATION_PERCENT: f64 = 50.0;
/// Above this many consolidations per day a pool is over-provisioned
pub const OVER_PROVISIONED_CONSOLIDATIONS_PER_DAY: f64 = 2.0;
/// Largest node-count reduction allowed in one recommendation
pub const MAX_NODE_REDUCTION_PERCENT: u32 = 50;
/// Reduction allowed when both axes are below [`IDLE_UTILIZATION_PERCENT`]
pub const RELAXED_NODE_REDUCTION_PERCENT: u32 = 70;
pub const IDLE_UTILIZATION_PERCENT: f64 = 25.0;

/// Calculator output: the target plus the signals that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityAssessment {
    pub target: CapacityTarget,
    pub cpu_utilization_percent: f64,
    pub memory_utilization_percent: f64,
    pub consolidations_per_day: f64,
    pub over_provisioned: bool,
    pub max_reduction_percent: u32,
    /// Required capacity was raised to respect the node floor
    pub floor_applied: bool,
}

impl CapacityAssessment {
    pub fn is_zero(&self) -> bool {
        self.target.is_zero()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CapacityCalculator;

impl CapacityCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn calculate(
        &self,
        state: &NodePoolState,
        disruptions: &DisruptionSummary,
        gpus: u32,
    ) -> CapacityAssessment {
        let cpu_util = state.cpu_utilization_percent();
        let mem_util = state.memory_utilization_percent();
        let consolidations_per_day = disruptions.consolidation_rate_per_day();

        if state.is_idle_and_empty() && gpus == 0 {
            return CapacityAssessment {
                target: CapacityTarget::zero(),
                cpu_utilization_percent: 0.0,
                memory_utilization_percent: 0.0,
                consolidations_per_day,
                over_provisioned: false,
                max_reduction_percent: MAX_NODE_REDUCTION_PERCENT,
                floor_applied: false,
            };
        }

        let over_provisioned = cpu_util < OVER_PROVISIONED_UTILIZATION_PERCENT
            || mem_util < OVER_PROVISIONED_UTILIZATION_PERCENT
            || consolidations_per_day > OVER_PROVISIONED_CONSOLIDATIONS_PER_DAY;

        let target_utilization = if over_provisioned {
            OVER_PROVISIONED_TARGET_UTILIZATION
        } else {
            NORMAL_TARGET_UTILIZATION
        };

        let mut cpu_cores = state.cpu_used / target_utilization * CAPACITY_HEADROOM;
        let mut memory_gib = state.memory_used / target_utilization * CAPACITY_HEADROOM;

        let max_reduction_percent = max_reduction_percent(cpu_util, mem_util);
        let min_nodes = node_floor(state.node_count, max_reduction_percent);

        let avg_cpu = state.avg_cpu_per_node();
        let avg_mem = state.avg_memory_per_node();
        let mut floor_applied = false;

        if min_nodes > 0 && avg_cpu > 0.0 && avg_mem > 0.0 {
            let rough_nodes = (cpu_cores / avg_cpu).max(memory_gib / avg_mem).ceil() as u32;
            if rough_nodes < min_nodes {
                cpu_cores = cpu_cores.max(min_nodes as f64 * avg_cpu);
                memory_gib = memory_gib.max(min_nodes as f64 * avg_mem);
                floor_applied = true;
                debug!(
                    nodepool = %state.name,
                    rough_nodes,
                    min_nodes,
                    "Raised required capacity to the node floor"
                );
            }
        }

        CapacityAssessment {
            target: CapacityTarget {
                cpu_cores,
                memory_gib,
                gpus,
                target_utilization,
                min_nodes,
            },
            cpu_utilization_percent: cpu_util,
            memory_utilization_percent: mem_util,
            consolidations_per_day,
            over_provisioned,
            max_reduction_percent,
            floor_applied,
        }
    }
}

/// Allowed reduction for the given utilisation percentages
pub fn max_reduction_percent(cpu_util: f64, mem_util: f64) -> u32 {
    if cpu_util < IDLE_UTILIZATION_PERCENT && mem_util < IDLE_UTILIZATION_PERCENT {
        RELAXED_NODE_REDUCTION_PERCENT
    } else {
        MAX_NODE_REDUCTION_PERCENT
    }
}

/// Smallest node count reachable from `current` with `reduction_percent`,
/// i.e. ceil(current * (100 - reduction) / 100)
pub fn node_floor(current: u32, reduction_percent: u32) -> u32 {
    let keep = 100 - reduction_percent.min(100);
    ((current as u64 * keep as u64 + 99) / 100) as u32
}
