use snafu::Snafu;

use crate::types::TensorId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Two ops in the same job share a name.
    #[snafu(display("duplicate op name {name}"))]
    DuplicateOpName { name: String },

    /// Op is not listed in any placement group.
    #[snafu(display("op {name} has no placement"))]
    MissingPlacement { name: String },

    /// Op is listed in more than one placement group.
    #[snafu(display("op {name} is assigned to more than one placement group"))]
    ConflictingPlacement { name: String },

    /// Placement group lists an op that is not part of the job.
    #[snafu(display("placement group references unknown op {name}"))]
    UnknownPlacedOp { name: String },

    /// Placement without any device.
    #[snafu(display("op {name} is placed on an empty device group"))]
    EmptyPlacement { name: String },

    /// Input slot consumes a tensor whose producer is not part of the job.
    #[snafu(display("op {consumer} input {slot} consumes {tensor} from unknown op"))]
    UnknownProducer { consumer: String, slot: String, tensor: TensorId },

    /// Input slot consumes a blob its producer does not declare.
    #[snafu(display("op {consumer} input {slot} consumes undeclared output {tensor}"))]
    UnknownOutput { consumer: String, slot: String, tensor: TensorId },

    /// Control input names an op that is not part of the job.
    #[snafu(display("op {consumer} has control input from unknown op {producer}"))]
    UnknownCtrlInput { consumer: String, producer: String },

    /// Op consumes its own output or lists itself as control input.
    #[snafu(display("op {name} depends on itself"))]
    SelfEdge { name: String },

    /// Two input slots of one op consume the same tensor under different layouts.
    #[snafu(display("op {name} consumes {tensor} with conflicting layouts"))]
    ConflictingLayout { name: String, tensor: TensorId },

    /// An input slot shares its name with an output blob, so their layouts share one key.
    #[snafu(display("op {name} uses {key:?} as both an input slot and an output blob"))]
    AmbiguousLayoutKey { name: String, key: String },

    /// Tensor name is not of the form `op/blob`.
    #[snafu(display("malformed tensor name {name:?}, expected \"op/blob\""))]
    MalformedTensorName { name: String },

    /// Topological traversal did not reach every op.
    #[snafu(display("graph contains a cycle: {visited} of {total} ops reachable in topological order"))]
    CycleDetected { visited: usize, total: usize },

    /// Builder was asked to mutate an op that was already mutated.
    #[snafu(display("op {name} mutated more than once"))]
    DuplicateMutation { name: String },

    /// Builder was asked to mutate an op that does not exist.
    #[snafu(display("cannot mutate unknown op {name}"))]
    UnknownOp { name: String },

    /// Input slot lookup on an op that does not declare it.
    #[snafu(display("op {name} has no input slot {slot}"))]
    UnknownInputSlot { name: String, slot: String },
}
