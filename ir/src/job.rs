//! Persisted job representation.
//!
//! A [`Job`] is the flat, serializable form of a computation graph: an
//! ordered list of [`JobOp`]s and the placement groups that assign every op
//! to a [`Placement`]. Passes never edit a job directly; they read it through
//! an [`OpGraph`](crate::graph::OpGraph) and commit changes with a
//! [`JobBuilder`](crate::builder::JobBuilder).

use std::collections::BTreeMap;

use crate::op::OpConf;
use crate::shape::{TensorDesc, TimeShape};
use crate::types::{Layout, Placement};

/// Layout of every blob an op touches, keyed by input slot or output blob name.
///
/// Slot and blob names share the key space; [`OpGraph::new`](crate::graph::OpGraph::new)
/// rejects an op that reuses one name for both.
pub type LayoutSignature = BTreeMap<String, Layout>;

/// One op of a job together with its inferred metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JobOp {
    pub conf: OpConf,
    pub layouts: LayoutSignature,
    pub time_shape: TimeShape,
    /// Logical descriptors of the op's outputs, keyed by blob name.
    pub output_descs: BTreeMap<String, TensorDesc>,
}

impl JobOp {
    pub fn new(conf: OpConf) -> Self {
        Self { conf, layouts: LayoutSignature::new(), time_shape: TimeShape::default(), output_descs: BTreeMap::new() }
    }

    pub fn with_layout(mut self, blob: impl Into<String>, layout: Layout) -> Self {
        self.layouts.insert(blob.into(), layout);
        self
    }

    pub fn with_output_desc(mut self, blob: impl Into<String>, desc: TensorDesc) -> Self {
        self.output_descs.insert(blob.into(), desc);
        self
    }

    pub fn with_time_shape(mut self, time_shape: TimeShape) -> Self {
        self.time_shape = time_shape;
        self
    }

    pub fn name(&self) -> &str {
        self.conf.name()
    }
}

/// Ops sharing one placement.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlacementGroup {
    pub placement: Placement,
    pub op_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Job {
    name: String,
    pub(crate) ops: Vec<JobOp>,
    pub(crate) placement_groups: Vec<PlacementGroup>,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ops: Vec::new(), placement_groups: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ops(&self) -> &[JobOp] {
        &self.ops
    }

    pub fn op(&self, name: &str) -> Option<&JobOp> {
        self.ops.iter().find(|op| op.name() == name)
    }

    pub fn placement_groups(&self) -> &[PlacementGroup] {
        &self.placement_groups
    }

    /// Placement of the op called `name`.
    pub fn placement_of(&self, name: &str) -> Option<&Placement> {
        self.placement_groups.iter().find(|g| g.op_names.iter().any(|n| n == name)).map(|g| &g.placement)
    }

    /// Append `op` under `placement`, joining an existing group with the same placement.
    ///
    /// No validation happens here; [`OpGraph::new`](crate::graph::OpGraph::new)
    /// reports duplicate names and dangling references.
    pub fn push_op(&mut self, placement: &Placement, op: JobOp) {
        let name = op.name().to_string();
        self.ops.push(op);
        match self.placement_groups.iter_mut().find(|g| &g.placement == placement) {
            Some(group) => group.op_names.push(name),
            None => self.placement_groups.push(PlacementGroup { placement: placement.clone(), op_names: vec![name] }),
        }
    }
}
