//! Largest connected multi-device GPU subgraph.

use std::collections::{HashSet, VecDeque};

use snafu::ensure;
use weave_ir::{DeviceType, NodeId, OpGraph, OpNode};

use crate::error::{DuplicateSubgraphNodeSnafu, PlacementMismatchSnafu, Result};

fn is_seed_candidate(node: &OpNode) -> bool {
    node.placement().device_type() == DeviceType::Gpu
        && node.placement().parallel_num() > 1
        && node.is_time_shape_identity()
}

/// Find the largest data-connected set of ops sharing one multi-device GPU placement.
///
/// Seeds are taken in `order`; each seed grows breadth-first over data edges,
/// admitting neighbours with the same placement and an identity time shape.
/// Every node joins at most one candidate. A later candidate replaces the
/// current best only when strictly larger, so the first one found wins ties.
///
/// Returns an empty set when no op qualifies.
pub fn find_max_connected_subgraph(graph: &OpGraph, order: &[NodeId]) -> Result<HashSet<NodeId>> {
    let mut visited = HashSet::with_capacity(graph.node_count());
    let mut best = HashSet::new();

    for &seed in order {
        if !visited.insert(seed) {
            continue;
        }
        let seed_node = graph.node(seed);
        if !is_seed_candidate(seed_node) {
            continue;
        }
        let placement = seed_node.placement();

        let mut component = HashSet::new();
        let mut queue = VecDeque::from([seed]);
        while let Some(current) = queue.pop_front() {
            let node = graph.node(current);
            ensure!(
                node.placement() == placement,
                PlacementMismatchSnafu {
                    op_name: node.name(),
                    expected: placement.clone(),
                    actual: node.placement().clone()
                }
            );
            ensure!(component.insert(current), DuplicateSubgraphNodeSnafu { op_name: node.name() });

            graph.for_each_node_on_in_out_edge(current, |next| {
                let next_node = graph.node(next);
                if !visited.contains(&next) && next_node.placement() == placement && next_node.is_time_shape_identity() {
                    visited.insert(next);
                    queue.push_back(next);
                }
            });
        }

        tracing::trace!(seed = seed_node.name(), size = component.len(), "subgraph candidate");
        if component.len() > best.len() {
            best = component;
        }
    }

    tracing::debug!(size = best.len(), "selected collective subgraph");
    Ok(best)
}
