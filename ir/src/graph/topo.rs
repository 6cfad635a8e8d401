//! Traversal and ordering queries over data and control edges.
//!
//! Data edges and control edges are treated uniformly here: a control edge
//! carries no tensor but constrains execution order exactly like a data edge.

use std::collections::VecDeque;

use smallvec::SmallVec;
use snafu::ensure;

use super::{NodeId, OpGraph};
use crate::error::{CycleDetectedSnafu, Result};

impl OpGraph {
    /// Deduplicated producers of `node` over data and control edges.
    pub fn data_and_ctrl_in_nodes(&self, node: NodeId) -> SmallVec<[NodeId; 4]> {
        let n = self.node(node);
        let data = n.in_edges.iter().map(|&e| self.edge(e).src);
        dedup(data.chain(n.ctrl_in.iter().copied()))
    }

    /// Deduplicated consumers of `node` over data and control edges.
    pub fn data_and_ctrl_out_nodes(&self, node: NodeId) -> SmallVec<[NodeId; 4]> {
        let n = self.node(node);
        let data = n.out_edges.iter().map(|&e| self.edge(e).dst);
        dedup(data.chain(n.ctrl_out.iter().copied()))
    }

    pub fn for_each_data_and_ctrl_in_node(&self, node: NodeId, mut f: impl FnMut(NodeId)) {
        self.data_and_ctrl_in_nodes(node).into_iter().for_each(&mut f);
    }

    pub fn for_each_data_and_ctrl_out_node(&self, node: NodeId, mut f: impl FnMut(NodeId)) {
        self.data_and_ctrl_out_nodes(node).into_iter().for_each(&mut f);
    }

    /// Visit every node connected to `node` by a data edge, producers first.
    pub fn for_each_node_on_in_out_edge(&self, node: NodeId, mut f: impl FnMut(NodeId)) {
        let n = self.node(node);
        for &e in &n.in_edges {
            f(self.edge(e).src);
        }
        for &e in &n.out_edges {
            f(self.edge(e).dst);
        }
    }

    /// Nodes without data or control producers, in job order.
    pub fn source_nodes(&self) -> Vec<NodeId> {
        self.nodes.iter().filter(|n| n.in_edges.is_empty() && n.ctrl_in.is_empty()).map(|n| n.id).collect()
    }

    /// Topological order over data and control edges.
    ///
    /// Kahn traversal seeded from [`source_nodes`](Self::source_nodes) with a
    /// FIFO queue, so the order is fully determined by the job's op order.
    pub fn topo_order(&self) -> Result<Vec<NodeId>> {
        let mut pending: Vec<usize> = (0..self.nodes.len())
            .map(|i| self.data_and_ctrl_in_nodes(NodeId::from_index(i)).len())
            .collect();

        let mut queue: VecDeque<NodeId> = self.source_nodes().into();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for next in self.data_and_ctrl_out_nodes(node) {
                let remaining = &mut pending[next.index()];
                *remaining -= 1;
                if *remaining == 0 {
                    queue.push_back(next);
                }
            }
        }

        ensure!(order.len() == self.nodes.len(), CycleDetectedSnafu { visited: order.len(), total: self.nodes.len() });
        Ok(order)
    }

    /// Precompute ancestor sets for reachability queries.
    pub fn reachability(&self) -> Result<Reachability> {
        let order = self.topo_order()?;
        let mut ancestors = vec![NodeSet::with_capacity(self.nodes.len()); self.nodes.len()];

        for &node in &order {
            let mut set = NodeSet::with_capacity(self.nodes.len());
            for producer in self.data_and_ctrl_in_nodes(node) {
                set.insert(producer);
                set.union_with(&ancestors[producer.index()]);
            }
            ancestors[node.index()] = set;
        }

        Ok(Reachability { ancestors })
    }
}

/// Answers "is `to` reachable from `from`" along data or control edges.
#[derive(Debug, Clone)]
pub struct Reachability {
    ancestors: Vec<NodeSet>,
}

impl Reachability {
    /// True when a non-empty path leads from `from` to `to`.
    pub fn is_reachable(&self, from: NodeId, to: NodeId) -> bool {
        self.ancestors[to.index()].contains(from)
    }
}

#[derive(Debug, Clone)]
struct NodeSet {
    words: Vec<u64>,
}

impl NodeSet {
    fn with_capacity(nodes: usize) -> Self {
        Self { words: vec![0; nodes.div_ceil(64)] }
    }

    fn insert(&mut self, node: NodeId) {
        self.words[node.index() / 64] |= 1u64 << (node.index() % 64);
    }

    fn contains(&self, node: NodeId) -> bool {
        self.words[node.index() / 64] & (1u64 << (node.index() % 64)) != 0
    }

    fn union_with(&mut self, other: &NodeSet) {
        for (word, other) in self.words.iter_mut().zip(&other.words) {
            *word |= other;
        }
    }
}

fn dedup(nodes: impl Iterator<Item = NodeId>) -> SmallVec<[NodeId; 4]> {
    let mut result: SmallVec<[NodeId; 4]> = SmallVec::new();
    for node in nodes {
        if !result.contains(&node) {
            result.push(node);
        }
    }
    result
}
