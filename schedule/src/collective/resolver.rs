//! Layout conversion resolver.
//!
//! Decides which collective op, if any, turns a tensor laid out one way by its
//! producer into the layout its consumer expects, and synthesizes that op.
//!
//! | producer | consumer | condition              | result            |
//! |----------|----------|------------------------|-------------------|
//! | `P`      | `B`      | -                      | all-reduce        |
//! | `P`      | `S(0)`   | `dim0 % width == 0`    | reduce-scatter    |
//! | `S(0)`   | `B`      | `dim0 % width == 0`    | all-gather        |
//! | `S(a)`   | `S(b)`   | `a != b`, both divide  | all-to-all (unsupported) |
//! | other    |          |                        | nothing           |

use snafu::{OptionExt, ensure};
use weave_ir::{JobOp, Layout, NodeId, OpConf, OpGraph, Shape, TensorId, new_unique_id};

use crate::error::{InvalidLogicalShapeSnafu, MissingLayoutSnafu, MissingTensorDescSnafu, Result};

/// Name prefix of every op synthesized by collective insertion.
pub const COLLECTIVE_OP_NAME_PREFIX: &str = "Weave-System-Collective-Op";
/// Input slot of a synthesized collective op.
pub const COLLECTIVE_INPUT_SLOT: &str = "in_0";
/// Output blob of a synthesized collective op.
pub const COLLECTIVE_OUTPUT_BLOB: &str = "out_0";

/// Collective communication primitives the pass can synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
pub enum CollectiveKind {
    #[strum(serialize = "_collective_all_reduce")]
    AllReduce,
    #[strum(serialize = "_collective_reduce_scatter")]
    ReduceScatter,
    #[strum(serialize = "_collective_all_gather")]
    AllGather,
}

impl CollectiveKind {
    /// Op type of the synthesized op.
    pub fn op_type(self) -> &'static str {
        self.into()
    }

    /// Short conversion tag used in generated op names.
    pub fn tag(self) -> &'static str {
        match self {
            Self::AllReduce => "P2B",
            Self::ReduceScatter => "P2S",
            Self::AllGather => "S2B",
        }
    }
}

/// Outcome of matching a (producer, consumer) layout pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Collective(CollectiveKind),
    /// Split axis changes; would need an all-to-all, which is not supported.
    AllToAll { src_axis: usize, dst_axis: usize },
    None,
}

/// Match a layout pair against the conversion table.
///
/// `shape` must be static and `parallel_num` is the width of the shared
/// placement. Split axes beyond the tensor rank never match.
pub fn resolve_conversion(src: Layout, dst: Layout, shape: &Shape, parallel_num: usize) -> Conversion {
    let width = parallel_num as i64;
    let divisible = |axis: usize| width > 0 && shape.at(axis).is_some_and(|dim| dim % width == 0);

    match (src, dst) {
        (Layout::PartialSum, Layout::Broadcast) => Conversion::Collective(CollectiveKind::AllReduce),
        (Layout::PartialSum, Layout::Split { axis: 0 }) if divisible(0) => {
            Conversion::Collective(CollectiveKind::ReduceScatter)
        }
        (Layout::Split { axis: 0 }, Layout::Broadcast) if divisible(0) => {
            Conversion::Collective(CollectiveKind::AllGather)
        }
        (Layout::Split { axis: a }, Layout::Split { axis: b }) if a != b && divisible(a) && divisible(b) => {
            Conversion::AllToAll { src_axis: a, dst_axis: b }
        }
        _ => Conversion::None,
    }
}

/// A synthesized collective op, ready to be added to the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectiveOp {
    pub kind: CollectiveKind,
    pub op: JobOp,
}

impl CollectiveOp {
    pub fn name(&self) -> &str {
        self.op.name()
    }

    /// Tensor consumers read instead of the original one.
    pub fn output_tensor(&self) -> TensorId {
        self.op.conf.output_tensor(COLLECTIVE_OUTPUT_BLOB)
    }
}

/// What to do with one tensor crossing one subgraph edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Insert(CollectiveOp),
    /// Recognized all-to-all; left untouched and reported as a warning.
    Unsupported,
    /// Layouts already agree, no pattern applies, or the shape is dynamic.
    Skip,
}

/// Resolve `tensor` flowing from `src` to `dst` and synthesize the collective op it needs.
///
/// Dynamic shapes are skipped. Missing metadata, scalar shapes and
/// non-positive extents are errors.
pub fn try_build_collective_op(graph: &OpGraph, src: NodeId, dst: NodeId, tensor: &TensorId) -> Result<Resolution> {
    let src_node = graph.node(src);
    let dst_node = graph.node(dst);

    let src_layout =
        src_node.layout(tensor).context(MissingLayoutSnafu { op_name: src_node.name(), tensor: tensor.clone() })?;
    let dst_layout =
        dst_node.layout(tensor).context(MissingLayoutSnafu { op_name: dst_node.name(), tensor: tensor.clone() })?;
    let desc = graph.tensor_desc(tensor).context(MissingTensorDescSnafu { tensor: tensor.clone() })?;

    if desc.is_dynamic() {
        tracing::trace!(%tensor, "dynamic shape, skipping");
        return Ok(Resolution::Skip);
    }

    let shape = desc.shape();
    ensure!(shape.is_positive(), InvalidLogicalShapeSnafu { tensor: tensor.clone(), shape: shape.clone() });

    let kind = match resolve_conversion(src_layout, dst_layout, shape, src_node.placement().parallel_num()) {
        Conversion::Collective(kind) => kind,
        Conversion::AllToAll { src_axis, dst_axis } => {
            tracing::warn!(
                src = src_node.name(),
                dst = dst_node.name(),
                %tensor,
                src_axis,
                dst_axis,
                elem_cnt = shape.elem_count(),
                "all-to-all conversion is not supported, leaving edge unchanged"
            );
            return Ok(Resolution::Unsupported);
        }
        Conversion::None => return Ok(Resolution::Skip),
    };

    let name = format!("{COLLECTIVE_OP_NAME_PREFIX}-{}-{}", kind.tag(), new_unique_id());
    let conf = OpConf::new(&name, kind.op_type())
        .with_input(COLLECTIVE_INPUT_SLOT, tensor.clone())
        .with_output(COLLECTIVE_OUTPUT_BLOB)
        .with_scope_symbol_id(src_node.conf().scope_symbol_id());
    let op = JobOp::new(conf)
        .with_layout(COLLECTIVE_INPUT_SLOT, src_layout)
        .with_layout(COLLECTIVE_OUTPUT_BLOB, dst_layout)
        .with_output_desc(COLLECTIVE_OUTPUT_BLOB, desc.clone());

    tracing::debug!(
        op.name = %name,
        op.kind = %kind,
        src = src_node.name(),
        dst = dst_node.name(),
        %tensor,
        src_layout = %src_layout,
        dst_layout = %dst_layout,
        shape = %shape,
        "inserting collective op"
    );

    Ok(Resolution::Insert(CollectiveOp { kind, op }))
}
