//! Core data models for the fleet recommendation engine
//!
//! All CPU figures are cores, memory figures GiB and costs USD per hour.
//! Nothing in here rounds; rounding happens at presentation time.

use crate::capacity::{parse_cpu_cores, parse_memory_gib, serde_quantity};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Label that ties a workload to the NodePool it schedules onto
pub const NODEPOOL_LABEL: &str = "karpenter.sh/nodepool";

/// Pricing class of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PricingClass {
    /// Full price, never preempted
    #[serde(alias = "on_demand", alias = "ondemand")]
    OnDemand,
    /// Discounted, preemptible capacity
    Spot,
}

impl PricingClass {
    pub const ALL: [PricingClass; 2] = [PricingClass::OnDemand, PricingClass::Spot];

    pub fn as_str(&self) -> &'static str {
        match self {
            PricingClass::OnDemand => "on-demand",
            PricingClass::Spot => "spot",
        }
    }

    pub fn is_discounted(&self) -> bool {
        matches!(self, PricingClass::Spot)
    }
}

impl fmt::Display for PricingClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PricingClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on-demand" | "on_demand" | "ondemand" => Ok(PricingClass::OnDemand),
            "spot" => Ok(PricingClass::Spot),
            other => Err(format!("unknown pricing class: {}", other)),
        }
    }
}

/// CPU architecture of a node or instance type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    #[serde(alias = "x86_64")]
    Amd64,
    #[serde(alias = "aarch64")]
    Arm64,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Amd64 => "amd64",
            Architecture::Arm64 => "arm64",
        }
    }
}

impl Default for Architecture {
    fn default() -> Self {
        Architecture::Amd64
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amd64" | "x86_64" | "x86" => Ok(Architecture::Amd64),
            "arm64" | "aarch64" | "arm" => Ok(Architecture::Arm64),
            other => Err(format!("unknown architecture: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorkloadKind {
    #[default]
    Deployment,
    StatefulSet,
    DaemonSet,
    Job,
    CronJob,
    #[serde(other)]
    Other,
}

/// A workload as requested by its owner, quantities kept in raw form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workload {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub cpu_request: String,
    #[serde(default)]
    pub memory_request: String,
    #[serde(default)]
    pub gpu_count: u32,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub kind: WorkloadKind,
}

impl Workload {
    pub fn cpu_cores(&self) -> f64 {
        parse_cpu_cores(&self.cpu_request)
    }

    pub fn memory_gib(&self) -> f64 {
        parse_memory_gib(&self.memory_request)
    }

    pub fn nodepool(&self) -> Option<&str> {
        self.labels.get(NODEPOOL_LABEL).map(String::as_str)
    }
}

/// Usage of a single node, as reported by the inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeUsageSnapshot {
    pub node_name: String,
    pub nodepool: String,
    pub instance_type: String,
    pub pricing_class: PricingClass,
    #[serde(default)]
    pub architecture: Architecture,
    #[serde(deserialize_with = "serde_quantity::cpu")]
    pub cpu_used: f64,
    #[serde(deserialize_with = "serde_quantity::cpu")]
    pub cpu_allocatable: f64,
    #[serde(deserialize_with = "serde_quantity::memory")]
    pub memory_used: f64,
    #[serde(deserialize_with = "serde_quantity::memory")]
    pub memory_allocatable: f64,
    #[serde(default)]
    pub pod_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Aggregated state of one NodePool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodePoolState {
    pub name: String,
    pub node_count: u32,
    pub nodes: Vec<NodeUsageSnapshot>,
    pub cpu_used: f64,
    pub cpu_allocatable: f64,
    pub memory_used: f64,
    pub memory_allocatable: f64,
    /// Distinct instance types present, sorted
    pub instance_types: Vec<String>,
    pub pricing_distribution: BTreeMap<PricingClass, u32>,
    /// Filled in by the engine from the pricing resolver
    pub current_hourly_cost: f64,
    pub architecture: Architecture,
    pub taints: Vec<String>,
    /// Pricing classes the pool is allowed to provision
    pub allowed_pricing_classes: Vec<PricingClass>,
}

impl NodePoolState {
    /// Build pool state from its per-node snapshots
    pub fn aggregate(
        name: impl Into<String>,
        architecture: Option<Architecture>,
        nodes: Vec<NodeUsageSnapshot>,
    ) -> Self {
        let mut cpu_used = 0.0;
        let mut cpu_allocatable = 0.0;
        let mut memory_used = 0.0;
        let mut memory_allocatable = 0.0;
        let mut types = BTreeSet::new();
        let mut distribution = BTreeMap::new();
        let mut arch_votes: BTreeMap<Architecture, u32> = BTreeMap::new();

        for node in &nodes {
            cpu_used += node.cpu_used;
            cpu_allocatable += node.cpu_allocatable;
            memory_used += node.memory_used;
            memory_allocatable += node.memory_allocatable;
            types.insert(node.instance_type.clone());
            *distribution.entry(node.pricing_class).or_insert(0) += 1;
            *arch_votes.entry(node.architecture).or_insert(0) += 1;
        }

        let architecture = architecture.unwrap_or_else(|| {
            arch_votes
                .into_iter()
                .max_by_key(|(_, votes)| *votes)
                .map(|(arch, _)| arch)
                .unwrap_or_default()
        });

        Self {
            name: name.into(),
            node_count: nodes.len() as u32,
            nodes,
            cpu_used,
            cpu_allocatable,
            memory_used,
            memory_allocatable,
            instance_types: types.into_iter().collect(),
            pricing_distribution: distribution,
            current_hourly_cost: 0.0,
            architecture,
            taints: Vec::new(),
            allowed_pricing_classes: PricingClass::ALL.to_vec(),
        }
    }

    pub fn with_taints(mut self, taints: Vec<String>) -> Self {
        self.taints = taints;
        self
    }

    pub fn with_allowed_pricing_classes(mut self, classes: Vec<PricingClass>) -> Self {
        if !classes.is_empty() {
            self.allowed_pricing_classes = classes;
        }
        self
    }

    /// CPU utilisation in percent, 0 when nothing is allocatable
    pub fn cpu_utilization_percent(&self) -> f64 {
        percent(self.cpu_used, self.cpu_allocatable)
    }

    /// Memory utilisation in percent, 0 when nothing is allocatable
    pub fn memory_utilization_percent(&self) -> f64 {
        percent(self.memory_used, self.memory_allocatable)
    }

    pub fn avg_cpu_per_node(&self) -> f64 {
        if self.node_count == 0 {
            0.0
        } else {
            self.cpu_allocatable / self.node_count as f64
        }
    }

    pub fn avg_memory_per_node(&self) -> f64 {
        if self.node_count == 0 {
            0.0
        } else {
            self.memory_allocatable / self.node_count as f64
        }
    }

    pub fn nodes_with_class(&self, class: PricingClass) -> u32 {
        self.pricing_distribution.get(&class).copied().unwrap_or(0)
    }

    /// Class with the most nodes; on-demand on a tie or an empty pool
    pub fn dominant_pricing_class(&self) -> PricingClass {
        let spot = self.nodes_with_class(PricingClass::Spot);
        let on_demand = self.nodes_with_class(PricingClass::OnDemand);
        if spot > on_demand {
            PricingClass::Spot
        } else {
            PricingClass::OnDemand
        }
    }

    pub fn is_idle_and_empty(&self) -> bool {
        self.node_count == 0 && self.cpu_used <= 0.0 && self.memory_used <= 0.0
    }
}

fn percent(used: f64, total: f64) -> f64 {
    if total <= 0.0 {
        0.0
    } else {
        used / total * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisruptionKind {
    Consolidation,
    Drift,
    Expiration,
    Termination,
}

/// A node removal or replacement performed by the provisioning layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisruptionEvent {
    pub nodepool: String,
    #[serde(default)]
    pub node_name: String,
    pub kind: DisruptionKind,
    pub occurred_at: DateTime<Utc>,
}

/// Disruption counts for one pool over a trailing window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisruptionSummary {
    pub window_hours: f64,
    pub consolidations: u32,
    pub drifts: u32,
    pub expirations: u32,
    pub terminations: u32,
}

impl DisruptionSummary {
    /// Count events for `nodepool` that fall inside `window` ending at `now`
    pub fn from_events(
        events: &[DisruptionEvent],
        nodepool: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let since = now - window;
        Self::tally(
            events
                .iter()
                .filter(|e| e.nodepool == nodepool)
                .filter(|e| e.occurred_at >= since && e.occurred_at <= now),
            window,
        )
    }

    /// Count events for `nodepool` that were already windowed by the inventory
    pub fn for_pool(events: &[DisruptionEvent], nodepool: &str, window: Duration) -> Self {
        Self::tally(events.iter().filter(|e| e.nodepool == nodepool), window)
    }

    fn tally<'a>(events: impl Iterator<Item = &'a DisruptionEvent>, window: Duration) -> Self {
        let mut summary = DisruptionSummary {
            window_hours: window.num_seconds() as f64 / 3600.0,
            ..Default::default()
        };

        for event in events {
            match event.kind {
                DisruptionKind::Consolidation => summary.consolidations += 1,
                DisruptionKind::Drift => summary.drifts += 1,
                DisruptionKind::Expiration => summary.expirations += 1,
                DisruptionKind::Termination => summary.terminations += 1,
            }
        }

        summary
    }

    pub fn consolidation_rate_per_day(&self) -> f64 {
        if self.window_hours <= 0.0 {
            0.0
        } else {
            self.consolidations as f64 / (self.window_hours / 24.0)
        }
    }

    pub fn total(&self) -> u32 {
        self.consolidations + self.drifts + self.expirations + self.terminations
    }
}

/// Capacity the recommended fleet has to provide
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityTarget {
    pub cpu_cores: f64,
    pub memory_gib: f64,
    /// GPUs requested by the pool's workloads; 0 for CPU-only pools
    pub gpus: u32,
    pub target_utilization: f64,
    /// Minimum node count allowed by the bounded-reduction rule
    pub min_nodes: u32,
}

impl CapacityTarget {
    pub fn zero() -> Self {
        Self {
            cpu_cores: 0.0,
            memory_gib: 0.0,
            gpus: 0,
            target_utilization: 0.0,
            min_nodes: 0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.cpu_cores <= 0.0 && self.memory_gib <= 0.0 && self.gpus == 0 && self.min_nodes == 0
    }
}

/// One hypothetical fleet evaluated by the selector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetCandidate {
    pub instance_types: Vec<String>,
    /// Nodes assigned to each entry of `instance_types`
    pub nodes_per_type: Vec<u32>,
    pub node_count: u32,
    pub pricing_class: PricingClass,
    pub total_cpu: f64,
    pub total_memory_gib: f64,
    pub hourly_cost: f64,
}

impl FleetCandidate {
    pub fn empty() -> Self {
        Self {
            instance_types: Vec::new(),
            nodes_per_type: Vec::new(),
            node_count: 0,
            pricing_class: PricingClass::OnDemand,
            total_cpu: 0.0,
            total_memory_gib: 0.0,
            hourly_cost: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instance_types.is_empty() || self.node_count == 0
    }

    /// The pool's current fleet expressed as a candidate
    pub fn from_current(state: &NodePoolState) -> Self {
        let mut per_type: BTreeMap<&str, u32> = BTreeMap::new();
        for node in &state.nodes {
            *per_type.entry(node.instance_type.as_str()).or_insert(0) += 1;
        }

        Self {
            instance_types: per_type.keys().map(|t| t.to_string()).collect(),
            nodes_per_type: per_type.values().copied().collect(),
            node_count: state.node_count,
            pricing_class: state.dominant_pricing_class(),
            total_cpu: state.cpu_allocatable,
            total_memory_gib: state.memory_allocatable,
            hourly_cost: state.current_hourly_cost,
        }
    }
}

/// Final recommendation for one NodePool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub nodepool: String,
    pub current: NodePoolState,
    pub recommended: FleetCandidate,
    pub current_hourly_cost: f64,
    pub recommended_hourly_cost: f64,
    /// current minus recommended; negative means the candidate costs more
    pub cost_savings: f64,
    pub savings_percent: f64,
    pub rationale: String,
    /// Optional prose produced by the text-enhancement collaborator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub has_recommendation: bool,
    pub generated_at: DateTime<Utc>,
}

/// Totals across every analysed pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub pools_analyzed: u32,
    pub pools_with_recommendation: u32,
    pub current_hourly_cost: f64,
    pub recommended_hourly_cost: f64,
    pub hourly_savings: f64,
}

impl FleetSummary {
    pub fn from_recommendations(recommendations: &[Recommendation]) -> Self {
        let mut summary = FleetSummary::default();
        for rec in recommendations {
            summary.pools_analyzed += 1;
            summary.current_hourly_cost += rec.current_hourly_cost;
            summary.recommended_hourly_cost += rec.recommended_hourly_cost;
            if rec.has_recommendation {
                summary.pools_with_recommendation += 1;
                summary.hourly_savings += rec.cost_savings;
            }
        }
        summary
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn node(
        name: &str,
        pool: &str,
        instance_type: &str,
        class: PricingClass,
        cpu: (f64, f64),
        memory: (f64, f64),
    ) -> NodeUsageSnapshot {
        NodeUsageSnapshot {
            node_name: name.to_string(),
            nodepool: pool.to_string(),
            instance_type: instance_type.to_string(),
            pricing_class: class,
            architecture: Architecture::Amd64,
            cpu_used: cpu.0,
            cpu_allocatable: cpu.1,
            memory_used: memory.0,
            memory_allocatable: memory.1,
            pod_count: 10,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    /// `count` identical nodes at the given utilisation fractions
    pub fn uniform_pool(
        pool: &str,
        instance_type: &str,
        class: PricingClass,
        count: usize,
        per_node: (f64, f64),
        utilization: (f64, f64),
    ) -> NodePoolState {
        let nodes = (0..count)
            .map(|i| {
                node(
                    &format!("{}-{}", pool, i),
                    pool,
                    instance_type,
                    class,
                    (per_node.0 * utilization.0, per_node.0),
                    (per_node.1 * utilization.1, per_node.1),
                )
            })
            .collect();
        NodePoolState::aggregate(pool, None, nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_pricing_class_parsing() {
        assert_eq!("spot".parse::<PricingClass>(), Ok(PricingClass::Spot));
        assert_eq!("on-demand".parse::<PricingClass>(), Ok(PricingClass::OnDemand));
        assert_eq!("ON_DEMAND".parse::<PricingClass>(), Ok(PricingClass::OnDemand));
        assert!("reserved".parse::<PricingClass>().is_err());

        let parsed: PricingClass = serde_json::from_str("\"on-demand\"").unwrap();
        assert_eq!(parsed, PricingClass::OnDemand);
    }

    #[test]
    fn test_architecture_aliases() {
        assert_eq!("x86_64".parse::<Architecture>(), Ok(Architecture::Amd64));
        assert_eq!("aarch64".parse::<Architecture>(), Ok(Architecture::Arm64));
        let parsed: Architecture = serde_json::from_str("\"aarch64\"").unwrap();
        assert_eq!(parsed, Architecture::Arm64);
    }

    #[test]
    fn test_workload_quantities_and_pool_label() {
        let mut labels = BTreeMap::new();
        labels.insert(NODEPOOL_LABEL.to_string(), "gpu".to_string());
        let workload = Workload {
            name: "trainer".into(),
            namespace: "ml".into(),
            cpu_request: "1500m".into(),
            memory_request: "8Gi".into(),
            gpu_count: 1,
            labels,
            kind: WorkloadKind::Job,
        };
        assert!((workload.cpu_cores() - 1.5).abs() < 1e-9);
        assert!((workload.memory_gib() - 8.0).abs() < 1e-9);
        assert_eq!(workload.nodepool(), Some("gpu"));
    }

    #[test]
    fn test_aggregate_pool_state() {
        let nodes = vec![
            node("a", "default", "m6i.xlarge", PricingClass::OnDemand, (1.0, 4.0), (4.0, 16.0)),
            node("b", "default", "m6i.xlarge", PricingClass::Spot, (3.0, 4.0), (8.0, 16.0)),
            node("c", "default", "m6i.2xlarge", PricingClass::OnDemand, (2.0, 8.0), (4.0, 32.0)),
        ];
        let state = NodePoolState::aggregate("default", None, nodes);

        assert_eq!(state.node_count, 3);
        assert_eq!(state.cpu_used, 6.0);
        assert_eq!(state.cpu_allocatable, 16.0);
        assert_eq!(state.memory_allocatable, 64.0);
        assert_eq!(state.instance_types, vec!["m6i.2xlarge", "m6i.xlarge"]);
        assert_eq!(state.nodes_with_class(PricingClass::OnDemand), 2);
        assert_eq!(state.nodes_with_class(PricingClass::Spot), 1);
        assert_eq!(state.dominant_pricing_class(), PricingClass::OnDemand);
        assert!((state.cpu_utilization_percent() - 37.5).abs() < 1e-9);
        assert!((state.memory_utilization_percent() - 25.0).abs() < 1e-9);
        assert!((state.avg_cpu_per_node() - 16.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_pool_guards_division() {
        let state = NodePoolState::aggregate("empty", Some(Architecture::Arm64), vec![]);
        assert_eq!(state.node_count, 0);
        assert_eq!(state.cpu_utilization_percent(), 0.0);
        assert_eq!(state.memory_utilization_percent(), 0.0);
        assert_eq!(state.avg_cpu_per_node(), 0.0);
        assert_eq!(state.architecture, Architecture::Arm64);
        assert!(state.is_idle_and_empty());
    }

    #[test]
    fn test_disruption_summary_window() {
        let now = Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap();
        let event = |pool: &str, kind, days_ago: i64| DisruptionEvent {
            nodepool: pool.to_string(),
            node_name: String::new(),
            kind,
            occurred_at: now - Duration::days(days_ago),
        };
        let events = vec![
            event("default", DisruptionKind::Consolidation, 1),
            event("default", DisruptionKind::Consolidation, 2),
            event("default", DisruptionKind::Drift, 3),
            event("default", DisruptionKind::Consolidation, 30),
            event("other", DisruptionKind::Consolidation, 1),
        ];

        let summary = DisruptionSummary::from_events(&events, "default", Duration::days(7), now);
        assert_eq!(summary.consolidations, 2);
        assert_eq!(summary.drifts, 1);
        assert_eq!(summary.total(), 3);
        assert!((summary.consolidation_rate_per_day() - 2.0 / 7.0).abs() < 1e-9);

        let unfiltered = DisruptionSummary::for_pool(&events, "default", Duration::days(7));
        assert_eq!(unfiltered.consolidations, 3);
        assert_eq!(unfiltered.window_hours, 168.0);
    }

    #[test]
    fn test_candidate_from_current_fleet() {
        let mut state = uniform_pool(
            "default",
            "m6i.xlarge",
            PricingClass::OnDemand,
            4,
            (4.0, 16.0),
            (0.5, 0.5),
        );
        state.current_hourly_cost = 0.768;

        let candidate = FleetCandidate::from_current(&state);
        assert_eq!(candidate.instance_types, vec!["m6i.xlarge"]);
        assert_eq!(candidate.nodes_per_type, vec![4]);
        assert_eq!(candidate.node_count, 4);
        assert_eq!(candidate.total_cpu, 16.0);
        assert_eq!(candidate.hourly_cost, 0.768);
        assert!(!candidate.is_empty());
        assert!(FleetCandidate::empty().is_empty());
    }

    #[test]
    fn test_fleet_summary_counts_only_real_savings() {
        let state = NodePoolState::aggregate("p", None, vec![]);
        let rec = |has: bool, current: f64, recommended: f64| Recommendation {
            nodepool: "p".into(),
            current: state.clone(),
            recommended: FleetCandidate::empty(),
            current_hourly_cost: current,
            recommended_hourly_cost: recommended,
            cost_savings: current - recommended,
            savings_percent: 0.0,
            rationale: String::new(),
            explanation: None,
            has_recommendation: has,
            generated_at: Utc::now(),
        };

        let summary =
            FleetSummary::from_recommendations(&[rec(true, 2.0, 1.0), rec(false, 1.0, 1.0)]);
        assert_eq!(summary.pools_analyzed, 2);
        assert_eq!(summary.pools_with_recommendation, 1);
        assert_eq!(summary.current_hourly_cost, 3.0);
        assert_eq!(summary.hourly_savings, 1.0);
    }
}
