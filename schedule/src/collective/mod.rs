//! Collective-communication op insertion for multi-device GPU subgraphs.
//!
//! - [`subgraph`] - selects the largest connected subgraph on one GPU placement
//! - [`resolver`] - maps layout pairs to collective ops
//! - [`insert`] - rewrites the job and pins execution order

pub mod insert;
pub mod resolver;
pub mod subgraph;

pub use insert::{
    CollectiveInsertionReport, CollectivePlan, InsertCollectiveOpPass, InsertedCollective, insert_collective_ops,
    plan_collective_insertion,
};
pub use resolver::{
    COLLECTIVE_INPUT_SLOT, COLLECTIVE_OP_NAME_PREFIX, COLLECTIVE_OUTPUT_BLOB, CollectiveKind, CollectiveOp, Conversion,
    Resolution, resolve_conversion, try_build_collective_op,
};
pub use subgraph::find_max_connected_subgraph;
