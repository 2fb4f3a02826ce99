//! Optimal fleet selection
//!
//! Exhaustive search over single instance types and unordered combinations
//! of two and three types, across the allowed pricing classes. Prices come
//! from a pre-resolved [`PriceBook`], so the search is pure computation.
//!
//! Combinations larger than [`MAX_COMBINATION_SIZE`] are not explored. The
//! search costs O(C(n, 3)) per class, so the candidate list must stay small
//! (the catalog resolver caps it at 20 entries).

use crate::catalog::InstanceTypeSpec;
use crate::models::{CapacityTarget, FleetCandidate, NodePoolState, PricingClass};
use crate::pricing::PriceBook;
use tracing::debug;

/// Bin-packing headroom applied on top of the capacity target
pub const BIN_PACKING_HEADROOM: f64 = 1.1;
/// Largest number of distinct instance types in one candidate
pub const MAX_COMBINATION_SIZE: usize = 3;

const CAPACITY_EPSILON: f64 = 1e-9;

/// Result of one search
#[derive(Debug, Clone)]
pub struct Selection {
    pub best: FleetCandidate,
    pub evaluated: u64,
}

/// Order the allowed pricing classes for evaluation
///
/// The discounted class goes first whenever the pool has any nodes, which
/// makes it win cost ties.
pub fn order_pricing_classes(state: &NodePoolState, allowed: &[PricingClass]) -> Vec<PricingClass> {
    let mut classes: Vec<PricingClass> = Vec::new();
    for class in allowed {
        if !classes.contains(class) {
            classes.push(*class);
        }
    }

    if state.node_count > 0 {
        classes.sort_by_key(|c| !c.is_discounted());
    }
    classes
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FleetSelector;

impl FleetSelector {
    pub fn new() -> Self {
        Self
    }

    /// Cheapest candidate meeting `target`; earliest evaluated wins ties
    ///
    /// Returns an empty candidate when nothing could be priced or the target
    /// is zero.
    pub fn select(
        &self,
        target: &CapacityTarget,
        types: &[InstanceTypeSpec],
        classes: &[PricingClass],
        prices: &PriceBook,
    ) -> Selection {
        let mut best: Option<FleetCandidate> = None;
        let mut evaluated = 0u64;

        self.for_each_candidate(target, types, classes, prices, |candidate| {
            evaluated += 1;
            let better = match &best {
                Some(current) => candidate.hourly_cost < current.hourly_cost,
                None => true,
            };
            if better {
                best = Some(candidate);
            }
        });

        let best = best.unwrap_or_else(FleetCandidate::empty);
        debug!(
            evaluated,
            instance_types = ?best.instance_types,
            node_count = best.node_count,
            pricing_class = %best.pricing_class,
            hourly_cost = best.hourly_cost,
            "Fleet search finished"
        );
        Selection { best, evaluated }
    }

    /// Visit every candidate in evaluation order: per class, single types,
    /// then pairs, then triples
    pub fn for_each_candidate<F>(
        &self,
        target: &CapacityTarget,
        types: &[InstanceTypeSpec],
        classes: &[PricingClass],
        prices: &PriceBook,
        mut visit: F,
    ) where
        F: FnMut(FleetCandidate),
    {
        if target.is_zero() {
            return;
        }

        for &class in classes {
            let priced: Vec<(&InstanceTypeSpec, f64)> = types
                .iter()
                .filter(|spec| target.gpus == 0 || spec.gpus > 0)
                .filter_map(|spec| prices.hourly_price(&spec.name, class).map(|p| (spec, p)))
                .collect();

            for &(spec, price) in &priced {
                if let Some(candidate) = single_type(target, class, spec, price) {
                    visit(candidate);
                }
            }

            // mixed fleets only for CPU pools
            if target.gpus > 0 {
                continue;
            }

            for size in 2..=MAX_COMBINATION_SIZE {
                for_each_combination(priced.len(), size, |indices| {
                    let members: Vec<(&InstanceTypeSpec, f64)> =
                        indices.iter().map(|&i| priced[i]).collect();
                    if let Some(candidate) = combination(target, class, &members) {
                        visit(candidate);
                    }
                });
            }
        }
    }
}

fn required(target: &CapacityTarget) -> (f64, f64) {
    (
        target.cpu_cores * BIN_PACKING_HEADROOM,
        target.memory_gib * BIN_PACKING_HEADROOM,
    )
}

/// ceil(max(cpu/node_cpu, mem/node_mem, gpus/node_gpus)) with the node floor
fn nodes_for(target: &CapacityTarget, node_cpu: f64, node_mem: f64, node_gpus: u32) -> Option<u32> {
    if node_cpu <= 0.0 || node_mem <= 0.0 {
        return None;
    }
    let (cpu, mem) = required(target);
    let mut ratio = (cpu / node_cpu).max(mem / node_mem);
    if target.gpus > 0 {
        if node_gpus == 0 {
            return None;
        }
        ratio = ratio.max(target.gpus as f64 / node_gpus as f64);
    }

    let nodes = (ratio - CAPACITY_EPSILON).ceil().max(0.0) as u32;
    Some(nodes.max(target.min_nodes).max(1))
}

fn single_type(
    target: &CapacityTarget,
    class: PricingClass,
    spec: &InstanceTypeSpec,
    price: f64,
) -> Option<FleetCandidate> {
    let nodes = nodes_for(target, spec.vcpus as f64, spec.memory_gib, spec.gpus)?;
    Some(FleetCandidate {
        instance_types: vec![spec.name.clone()],
        nodes_per_type: vec![nodes],
        node_count: nodes,
        pricing_class: class,
        total_cpu: spec.vcpus as f64 * nodes as f64,
        total_memory_gib: spec.memory_gib * nodes as f64,
        hourly_cost: price * nodes as f64,
    })
}

fn combination(
    target: &CapacityTarget,
    class: PricingClass,
    members: &[(&InstanceTypeSpec, f64)],
) -> Option<FleetCandidate> {
    let k = members.len();
    let avg_cpu = members.iter().map(|(s, _)| s.vcpus as f64).sum::<f64>() / k as f64;
    let avg_mem = members.iter().map(|(s, _)| s.memory_gib).sum::<f64>() / k as f64;

    let mut nodes = nodes_for(target, avg_cpu, avg_mem, 0)?;
    if (nodes as usize) < k {
        return None;
    }

    let (need_cpu, need_mem) = required(target);
    loop {
        let counts = distribute(nodes, k);
        let total_cpu: f64 = members
            .iter()
            .zip(&counts)
            .map(|((s, _), n)| s.vcpus as f64 * *n as f64)
            .sum();
        let total_mem: f64 = members
            .iter()
            .zip(&counts)
            .map(|((s, _), n)| s.memory_gib * *n as f64)
            .sum();

        if total_cpu + CAPACITY_EPSILON >= need_cpu && total_mem + CAPACITY_EPSILON >= need_mem {
            let hourly_cost = members.iter().zip(&counts).map(|((_, p), n)| p * *n as f64).sum();
            return Some(FleetCandidate {
                instance_types: members.iter().map(|(s, _)| s.name.clone()).collect(),
                nodes_per_type: counts,
                node_count: nodes,
                pricing_class: class,
                total_cpu,
                total_memory_gib: total_mem,
                hourly_cost,
            });
        }
        nodes += 1;
    }
}

/// Split `nodes` across `k` types as evenly as possible, remainder first
fn distribute(nodes: u32, k: usize) -> Vec<u32> {
    let k32 = k as u32;
    let base = nodes / k32;
    let remainder = nodes % k32;
    (0..k32).map(|i| base + u32::from(i < remainder)).collect()
}

/// Visit every k-subset of 0..n in lexicographic order
fn for_each_combination<F>(n: usize, k: usize, mut visit: F)
where
    F: FnMut(&[usize]),
{
    if k == 0 || k > n {
        return;
    }
    let mut indices: Vec<usize> = (0..k).collect();
    loop {
        visit(&indices);

        let mut i = k;
        loop {
            if i == 0 {
                return;
            }
            i -= 1;
            if indices[i] != i + n - k {
                break;
            }
            if i == 0 {
                return;
            }
        }
        indices[i] += 1;
        for j in i + 1..k {
            indices[j] = indices[j - 1] + 1;
        }
    }
}
