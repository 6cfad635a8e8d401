//! Job passes for the Weave compiler.
//!
//! Passes read a [`weave_ir::Job`] through its [`OpGraph`](weave_ir::OpGraph)
//! view and commit changes through a [`JobBuilder`](weave_ir::JobBuilder).
//!
//! # Module Organization
//!
//! - [`collective`] - Collective-op insertion for multi-device GPU subgraphs
//!   - [`collective::subgraph`] - Largest connected GPU subgraph selection
//!   - [`collective::resolver`] - Layout pair → collective op decision table
//!   - [`collective::insert`] - Job rewrite and execution-order pinning
//! - [`pass`] - Pass trait, registry and runner
//! - [`config`] - Pass configuration and context
//! - [`error`] - Error types and result handling

pub mod collective;
pub mod config;
pub mod error;
pub mod pass;


pub use collective::{
    CollectiveInsertionReport, CollectiveKind, InsertCollectiveOpPass, insert_collective_ops,
    plan_collective_insertion,
};
pub use config::{PassConfig, PassContext};
pub use error::{Error, Result};
pub use pass::{JobPass, PassRegistry, run_passes};
