//! Collective-op insertion.
//!
//! Within the largest multi-device GPU subgraph, every tensor whose producer
//! and consumer disagree on layout gets an explicit collective op in between.
//! Control edges pin the subgraph to one total execution order, so every
//! device issues its collectives in the same sequence.
//!
//! # Pipeline
//!
//! ```text
//! Job
//!  ↓ OpGraph::new
//! topo_order → find_max_connected_subgraph → subgraph order
//!  ↓ plan_collective_insertion
//! CollectivePlan (mutated confs + synthesized ops)
//!  ↓ CollectivePlan::commit (JobBuilder)
//! Job with collective ops
//! ```

use std::collections::{BTreeSet, HashMap};

use snafu::{ResultExt, ensure};
use weave_ir::{Job, JobBuilder, NodeId, OpConf, OpGraph, Placement};

use super::resolver::{CollectiveKind, CollectiveOp, Resolution, try_build_collective_op};
use super::subgraph::find_max_connected_subgraph;
use crate::config::PassContext;
use crate::error::{CommitSnafu, GraphSnafu, Result, SubgraphOrderMismatchSnafu, TrailingProducerSnafu};
use crate::pass::JobPass;

/// Job pass wrapper around [`insert_collective_ops`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertCollectiveOpPass;

impl JobPass for InsertCollectiveOpPass {
    fn name(&self) -> &'static str {
        "InsertCollectiveOpPass"
    }

    fn is_enabled(&self, ctx: &PassContext) -> bool {
        ctx.has_collective_support() && ctx.config().enable_insert_collective_op_pass
    }

    fn apply(&self, job: &mut Job, _ctx: &PassContext) -> Result<()> {
        insert_collective_ops(job).map(|_| ())
    }
}

/// Collective op added by the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedCollective {
    pub name: String,
    pub kind: CollectiveKind,
}

/// Summary of one pass invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectiveInsertionReport {
    pub subgraph_size: usize,
    /// In discovery order, which is also their execution order.
    pub inserted: Vec<InsertedCollective>,
    /// `(from, to)` op names of every control edge added.
    pub ctrl_edges: Vec<(String, String)>,
    /// Existing ops whose configuration changed, in subgraph order.
    pub mutated_ops: Vec<String>,
    /// Edges left unchanged because they would need an all-to-all.
    pub all_to_all_skipped: usize,
}

impl CollectiveInsertionReport {
    pub fn is_noop(&self) -> bool {
        self.inserted.is_empty() && self.mutated_ops.is_empty()
    }
}

/// Changes computed against an [`OpGraph`], not yet applied to the job.
#[derive(Debug, Clone, Default)]
pub struct CollectivePlan {
    placement: Option<Placement>,
    subgraph_size: usize,
    mutated_confs: Vec<OpConf>,
    collectives: Vec<CollectiveOp>,
    ctrl_edges: Vec<(String, String)>,
    all_to_all_skipped: usize,
}

impl CollectivePlan {
    pub fn is_empty(&self) -> bool {
        self.mutated_confs.is_empty() && self.collectives.is_empty()
    }

    pub fn collectives(&self) -> &[CollectiveOp] {
        &self.collectives
    }

    pub fn mutated_confs(&self) -> &[OpConf] {
        &self.mutated_confs
    }

    /// Apply the plan: mutated confs first, then the synthesized ops under the subgraph placement.
    pub fn commit(self, builder: &mut JobBuilder<'_>) -> Result<CollectiveInsertionReport> {
        let report = CollectiveInsertionReport {
            subgraph_size: self.subgraph_size,
            inserted: self
                .collectives
                .iter()
                .map(|c| InsertedCollective { name: c.name().to_string(), kind: c.kind })
                .collect(),
            ctrl_edges: self.ctrl_edges,
            mutated_ops: self.mutated_confs.iter().map(|conf| conf.name().to_string()).collect(),
            all_to_all_skipped: self.all_to_all_skipped,
        };

        builder.mut_ops_only_once(self.mutated_confs).context(CommitSnafu)?;
        if let Some(placement) = &self.placement {
            builder.add_ops(placement, self.collectives.into_iter().map(|c| c.op).collect()).context(CommitSnafu)?;
        }
        Ok(report)
    }
}

/// Compute the collective ops and control edges the largest GPU subgraph needs.
pub fn plan_collective_insertion(graph: &OpGraph) -> Result<CollectivePlan> {
    let order = graph.topo_order().context(GraphSnafu)?;
    let subgraph = find_max_connected_subgraph(graph, &order)?;
    if subgraph.len() <= 1 {
        return Ok(CollectivePlan { subgraph_size: subgraph.len(), ..CollectivePlan::default() });
    }

    let subgraph_order: Vec<NodeId> = order.iter().copied().filter(|node| subgraph.contains(node)).collect();
    ensure!(
        subgraph_order.len() == subgraph.len(),
        SubgraphOrderMismatchSnafu { subgraph: subgraph.len(), ordered: subgraph_order.len() }
    );
    let position: HashMap<NodeId, usize> = subgraph_order.iter().enumerate().map(|(i, &node)| (node, i)).collect();

    let mut confs: Vec<OpConf> = subgraph_order.iter().map(|&node| graph.node(node).conf().clone()).collect();
    let mut mutated = BTreeSet::new();
    let mut ctrl_edges = Vec::new();

    // Adjacent ops with no path between them get an explicit ordering edge.
    let reachability = graph.reachability().context(GraphSnafu)?;
    for (i, pair) in subgraph_order.windows(2).enumerate() {
        let (pre, cur) = (graph.node(pair[0]), graph.node(pair[1]));
        if !reachability.is_reachable(pre.id(), cur.id()) {
            tracing::debug!(from = pre.name(), to = cur.name(), "adding control edge between subgraph ops");
            confs[i + 1].add_ctrl_in_op_name(pre.name());
            mutated.insert(i + 1);
            ctrl_edges.push((pre.name().to_string(), cur.name().to_string()));
        }
    }

    let mut collectives: Vec<CollectiveOp> = Vec::new();
    let mut all_to_all_skipped = 0;
    for (src_pos, &src) in subgraph_order.iter().enumerate() {
        let src_node = graph.node(src);
        for &edge_id in src_node.out_edges() {
            let edge = graph.edge(edge_id);
            let Some(&dst_pos) = position.get(&edge.dst()) else { continue };

            for tensor in edge.tensors() {
                let mut collective = match try_build_collective_op(graph, src, edge.dst(), tensor)? {
                    Resolution::Insert(collective) => collective,
                    Resolution::Unsupported => {
                        all_to_all_skipped += 1;
                        continue;
                    }
                    Resolution::Skip => continue,
                };
                mutated.insert(dst_pos);

                let output = collective.output_tensor();
                for slot in edge.input_slots(tensor) {
                    let previous = confs[dst_pos].replace_input(slot, output.clone()).context(GraphSnafu)?;
                    tracing::debug!(
                        op.name = confs[dst_pos].name(),
                        slot = slot.as_str(),
                        from = %previous,
                        to = %output,
                        "rewiring consumer input"
                    );
                }

                if let Some(prev) = collectives.last() {
                    collective.op.conf.add_ctrl_in_op_name(prev.name());
                    ctrl_edges.push((prev.name().to_string(), collective.name().to_string()));
                }

                let next_pos = src_pos + 1;
                ensure!(next_pos < subgraph_order.len(), TrailingProducerSnafu { op_name: src_node.name() });
                if next_pos != dst_pos {
                    tracing::debug!(
                        from = collective.name(),
                        to = confs[next_pos].name(),
                        "ordering collective before next subgraph op"
                    );
                    confs[next_pos].add_ctrl_in_op_name(collective.name());
                    mutated.insert(next_pos);
                    ctrl_edges.push((collective.name().to_string(), confs[next_pos].name().to_string()));
                }

                collectives.push(collective);
            }
        }
    }

    let mutated_confs = confs.into_iter().enumerate().filter(|(pos, _)| mutated.contains(pos)).map(|(_, c)| c).collect();

    Ok(CollectivePlan {
        placement: Some(graph.node(subgraph_order[0]).placement().clone()),
        subgraph_size: subgraph_order.len(),
        mutated_confs,
        collectives,
        ctrl_edges,
        all_to_all_skipped,
    })
}

/// Insert collective ops into `job`.
///
/// All changes are committed together; on error the job is left as it was.
#[tracing::instrument(skip_all, fields(job = %job.name()))]
pub fn insert_collective_ops(job: &mut Job) -> Result<CollectiveInsertionReport> {
    let graph = OpGraph::new(job).context(GraphSnafu)?;
    let plan = plan_collective_insertion(&graph)?;

    if plan.is_empty() {
        tracing::debug!(subgraph_size = plan.subgraph_size, "no collective ops needed");
        return Ok(CollectiveInsertionReport {
            subgraph_size: plan.subgraph_size,
            all_to_all_skipped: plan.all_to_all_skipped,
            ..CollectiveInsertionReport::default()
        });
    }

    let mut staged = job.clone();
    let report = plan.commit(&mut JobBuilder::new(&mut staged))?;
    *job = staged;

    tracing::info!(
        subgraph_size = report.subgraph_size,
        inserted = report.inserted.len(),
        ctrl_edges = report.ctrl_edges.len(),
        mutated = report.mutated_ops.len(),
        all_to_all_skipped = report.all_to_all_skipped,
        "collective ops inserted"
    );
    Ok(report)
}
