//! Read-only operator graph view over a [`Job`].
//!
//! The graph is an arena: nodes live in a `Vec` addressed by [`NodeId`],
//! data edges live in a second `Vec` addressed by [`EdgeId`], and nodes refer
//! to their edges and control neighbours by index. There is one data edge per
//! (producer, consumer) pair carrying every tensor that flows between them.
//!
//! # Architecture
//!
//! ```text
//! Job (ops + placement groups)
//!     ↓
//! OpGraph::new(&job)       → arena of OpNode / OpEdge, validated references
//!     ↓
//! topo_order()             → Kahn order over data + control edges
//! reachability()           → ancestor sets for ordering queries
//! ```

mod topo;

use std::collections::{BTreeMap, HashMap, HashSet};

use smallvec::SmallVec;
use snafu::{OptionExt, ensure};

use crate::error::{
    AmbiguousLayoutKeySnafu, ConflictingLayoutSnafu, ConflictingPlacementSnafu, DuplicateOpNameSnafu,
    EmptyPlacementSnafu, MissingPlacementSnafu, Result, SelfEdgeSnafu, UnknownCtrlInputSnafu, UnknownOutputSnafu,
    UnknownPlacedOpSnafu, UnknownProducerSnafu,
};
use crate::job::{Job, JobOp};
use crate::op::OpConf;
use crate::shape::{TensorDesc, TimeShape};
use crate::types::{Layout, Placement, TensorId};

pub use topo::Reachability;

/// Stable index of a node in its [`OpGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("#{_0}")]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

/// Stable index of a data edge in its [`OpGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("e{_0}")]
pub struct EdgeId(u32);

impl EdgeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct OpNode {
    id: NodeId,
    op: JobOp,
    placement: Placement,
    tensor_layouts: HashMap<TensorId, Layout>,
    in_edges: SmallVec<[EdgeId; 4]>,
    out_edges: SmallVec<[EdgeId; 4]>,
    ctrl_in: SmallVec<[NodeId; 2]>,
    ctrl_out: SmallVec<[NodeId; 2]>,
}

impl OpNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.op.name()
    }

    pub fn conf(&self) -> &OpConf {
        &self.op.conf
    }

    pub fn job_op(&self) -> &JobOp {
        &self.op
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn time_shape(&self) -> &TimeShape {
        &self.op.time_shape
    }

    pub fn is_time_shape_identity(&self) -> bool {
        self.op.time_shape.is_identity()
    }

    pub fn in_edges(&self) -> &[EdgeId] {
        &self.in_edges
    }

    pub fn out_edges(&self) -> &[EdgeId] {
        &self.out_edges
    }

    /// Ops this node must run after without consuming their data.
    pub fn ctrl_in_nodes(&self) -> &[NodeId] {
        &self.ctrl_in
    }

    pub fn ctrl_out_nodes(&self) -> &[NodeId] {
        &self.ctrl_out
    }

    /// Layout of `tensor` as produced (outputs) or consumed (inputs) by this node.
    pub fn layout(&self, tensor: &TensorId) -> Option<Layout> {
        self.tensor_layouts.get(tensor).copied()
    }
}

/// Data edge between a producer and a consumer.
#[derive(Debug, Clone)]
pub struct OpEdge {
    id: EdgeId,
    src: NodeId,
    dst: NodeId,
    tensors: SmallVec<[TensorId; 2]>,
    tensor_slots: BTreeMap<TensorId, SmallVec<[String; 2]>>,
    is_boundary: bool,
}

impl OpEdge {
    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn src(&self) -> NodeId {
        self.src
    }

    pub fn dst(&self) -> NodeId {
        self.dst
    }

    /// Tensors flowing along this edge, in first-consumed order.
    pub fn tensors(&self) -> &[TensorId] {
        &self.tensors
    }

    /// Consumer input slots bound to `tensor`.
    pub fn input_slots(&self, tensor: &TensorId) -> &[String] {
        self.tensor_slots.get(tensor).map(|slots| slots.as_slice()).unwrap_or_default()
    }

    /// True when producer and consumer have different placements.
    pub fn is_boundary(&self) -> bool {
        self.is_boundary
    }
}

#[derive(Debug, Clone)]
pub struct OpGraph {
    nodes: Vec<OpNode>,
    edges: Vec<OpEdge>,
    name_to_id: HashMap<String, NodeId>,
    tensor_descs: HashMap<TensorId, TensorDesc>,
}

impl OpGraph {
    /// Build and validate the graph view of `job`.
    pub fn new(job: &Job) -> Result<Self> {
        let placements = collect_placements(job)?;

        let mut graph = Self {
            nodes: Vec::with_capacity(job.ops().len()),
            edges: Vec::new(),
            name_to_id: HashMap::with_capacity(job.ops().len()),
            tensor_descs: HashMap::new(),
        };

        for op in job.ops() {
            let name = op.name();
            let id = NodeId::from_index(graph.nodes.len());
            ensure!(graph.name_to_id.insert(name.to_string(), id).is_none(), DuplicateOpNameSnafu { name });
            let placement = placements.get(name).context(MissingPlacementSnafu { name })?;
            ensure!(placement.parallel_num() > 0, EmptyPlacementSnafu { name });

            for (blob, desc) in &op.output_descs {
                graph.tensor_descs.insert(op.conf.output_tensor(blob), desc.clone());
            }

            graph.nodes.push(OpNode {
                id,
                op: op.clone(),
                placement: (*placement).clone(),
                tensor_layouts: HashMap::new(),
                in_edges: SmallVec::new(),
                out_edges: SmallVec::new(),
                ctrl_in: SmallVec::new(),
                ctrl_out: SmallVec::new(),
            });
        }

        let mut pair_to_edge: HashMap<(NodeId, NodeId), EdgeId> = HashMap::new();
        for dst in 0..graph.nodes.len() {
            let dst = NodeId::from_index(dst);
            graph.connect_data_inputs(dst, &mut pair_to_edge)?;
            graph.connect_ctrl_inputs(dst)?;
        }

        for index in 0..graph.nodes.len() {
            let layouts = resolve_tensor_layouts(&graph.nodes[index])?;
            graph.nodes[index].tensor_layouts = layouts;
        }

        Ok(graph)
    }

    fn connect_data_inputs(&mut self, dst: NodeId, pair_to_edge: &mut HashMap<(NodeId, NodeId), EdgeId>) -> Result<()> {
        let inputs: Vec<(String, TensorId)> =
            self.nodes[dst.index()].conf().inputs().map(|(slot, tensor)| (slot.to_string(), tensor.clone())).collect();
        let consumer = self.nodes[dst.index()].name().to_string();

        for (slot, tensor) in inputs {
            let src = *self
                .name_to_id
                .get(tensor.op_name())
                .context(UnknownProducerSnafu { consumer: &consumer, slot: &slot, tensor: tensor.clone() })?;
            ensure!(
                self.nodes[src.index()].conf().has_output(tensor.blob_name()),
                UnknownOutputSnafu { consumer: &consumer, slot: &slot, tensor: tensor.clone() }
            );
            ensure!(src != dst, SelfEdgeSnafu { name: &consumer });

            let edge_id = *pair_to_edge.entry((src, dst)).or_insert_with(|| {
                let id = EdgeId(self.edges.len() as u32);
                let is_boundary = self.nodes[src.index()].placement != self.nodes[dst.index()].placement;
                self.edges.push(OpEdge {
                    id,
                    src,
                    dst,
                    tensors: SmallVec::new(),
                    tensor_slots: BTreeMap::new(),
                    is_boundary,
                });
                self.nodes[src.index()].out_edges.push(id);
                self.nodes[dst.index()].in_edges.push(id);
                id
            });

            let edge = &mut self.edges[edge_id.index()];
            if !edge.tensors.contains(&tensor) {
                edge.tensors.push(tensor.clone());
            }
            edge.tensor_slots.entry(tensor).or_default().push(slot);
        }
        Ok(())
    }

    fn connect_ctrl_inputs(&mut self, dst: NodeId) -> Result<()> {
        let consumer = self.nodes[dst.index()].name().to_string();
        let ctrl_in_names = self.nodes[dst.index()].conf().ctrl_in_op_names().to_vec();

        for producer in ctrl_in_names {
            let src =
                *self.name_to_id.get(&producer).context(UnknownCtrlInputSnafu { consumer: &consumer, producer: &producer })?;
            ensure!(src != dst, SelfEdgeSnafu { name: &consumer });
            if !self.nodes[dst.index()].ctrl_in.contains(&src) {
                self.nodes[dst.index()].ctrl_in.push(src);
                self.nodes[src.index()].ctrl_out.push(dst);
            }
        }
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> &OpNode {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &OpNode> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.name_to_id.get(name).copied()
    }

    pub fn node_by_name(&self, name: &str) -> Option<&OpNode> {
        self.node_id(name).map(|id| self.node(id))
    }

    pub fn edge(&self, id: EdgeId) -> &OpEdge {
        &self.edges[id.index()]
    }

    pub fn edges(&self) -> impl Iterator<Item = &OpEdge> {
        self.edges.iter()
    }

    /// Data edge from `src` to `dst`, if any.
    pub fn edge_between(&self, src: NodeId, dst: NodeId) -> Option<&OpEdge> {
        self.node(src).out_edges.iter().map(|&e| self.edge(e)).find(|e| e.dst == dst)
    }

    /// Layout of `tensor` at `node` (see [`OpNode::layout`]).
    pub fn layout(&self, node: NodeId, tensor: &TensorId) -> Option<Layout> {
        self.node(node).layout(tensor)
    }

    /// Logical descriptor of `tensor`, taken from its producer.
    pub fn tensor_desc(&self, tensor: &TensorId) -> Option<&TensorDesc> {
        self.tensor_descs.get(tensor)
    }
}

fn collect_placements(job: &Job) -> Result<HashMap<&str, &Placement>> {
    let mut op_names = HashSet::with_capacity(job.ops().len());
    for op in job.ops() {
        ensure!(op_names.insert(op.name()), DuplicateOpNameSnafu { name: op.name() });
    }

    let mut placements = HashMap::with_capacity(job.ops().len());
    for group in job.placement_groups() {
        for name in &group.op_names {
            ensure!(op_names.contains(name.as_str()), UnknownPlacedOpSnafu { name });
            ensure!(placements.insert(name.as_str(), &group.placement).is_none(), ConflictingPlacementSnafu { name });
        }
    }
    Ok(placements)
}

/// Map every tensor a node produces or consumes to its layout at that node.
fn resolve_tensor_layouts(node: &OpNode) -> Result<HashMap<TensorId, Layout>> {
    let conf = node.conf();
    if let Some((slot, _)) = conf.inputs().find(|(slot, _)| conf.has_output(slot)) {
        return AmbiguousLayoutKeySnafu { name: conf.name(), key: slot }.fail();
    }

    let mut layouts = HashMap::new();

    for blob in conf.outputs() {
        if let Some(&layout) = node.op.layouts.get(blob) {
            layouts.insert(conf.output_tensor(blob), layout);
        }
    }

    for (slot, tensor) in conf.inputs() {
        let Some(&layout) = node.op.layouts.get(slot) else { continue };
        match layouts.get(tensor) {
            Some(&existing) => {
                ensure!(existing == layout, ConflictingLayoutSnafu { name: conf.name(), tensor: tensor.clone() })
            }
            None => {
                layouts.insert(tensor.clone(), layout);
            }
        }
    }

    Ok(layouts)
}
