use snafu::Snafu;
use weave_ir::{Placement, Shape, TensorId};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by job passes.
///
/// Every variant is fatal: the pass aborts before committing anything, and
/// the job is left as it was. Recoverable conditions (dynamic shapes,
/// unsupported layout conversions) are handled locally and never surface here.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The job could not be viewed as a valid graph.
    #[snafu(display("invalid job graph: {source}"))]
    Graph { source: weave_ir::Error },

    /// The job builder rejected the pass's changes.
    #[snafu(display("failed to commit job changes: {source}"))]
    Commit { source: weave_ir::Error },

    /// Logical shape with no axes or a non-positive extent.
    #[snafu(display("tensor {tensor} has invalid logical shape {shape}: need at least one axis, all extents positive"))]
    InvalidLogicalShape { tensor: TensorId, shape: Shape },

    /// Producer or consumer carries no layout for a tensor it touches.
    #[snafu(display("op {op_name} has no layout for {tensor}"))]
    MissingLayout { op_name: String, tensor: TensorId },

    /// Tensor has no logical descriptor.
    #[snafu(display("tensor {tensor} has no logical descriptor"))]
    MissingTensorDesc { tensor: TensorId },

    /// Subgraph expansion admitted a node with a foreign placement.
    #[snafu(display("op {op_name} placed on {actual} joined a subgraph placed on {expected}"))]
    PlacementMismatch { op_name: String, expected: Placement, actual: Placement },

    /// Subgraph expansion visited a node twice.
    #[snafu(display("op {op_name} visited twice during subgraph expansion"))]
    DuplicateSubgraphNode { op_name: String },

    /// Selected subgraph is not covered by the global topological order.
    #[snafu(display("subgraph has {subgraph} ops but only {ordered} appear in topological order"))]
    SubgraphOrderMismatch { subgraph: usize, ordered: usize },

    /// Last op in subgraph order still feeds another subgraph op.
    #[snafu(display("op {op_name} is last in subgraph order but has a consumer inside the subgraph"))]
    TrailingProducer { op_name: String },

    /// Two passes registered under the same name.
    #[snafu(display("job pass {name} registered twice"))]
    DuplicatePass { name: String },

    /// Pipeline names a pass that is not registered.
    #[snafu(display("unknown job pass {name}"))]
    UnknownPass { name: String },
}
