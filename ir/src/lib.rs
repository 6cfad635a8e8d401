//! Intermediate representation for the Weave compiler.
//!
//! This crate defines the persisted job format and the read-only operator
//! graph that passes analyse before committing changes.
//!
//! # Module Organization
//!
//! - [`types`] - Device types, placements, distribution layouts, tensor ids
//! - [`shape`] - Logical shapes, tensor descriptors, time shapes
//! - [`op`] - Operator configuration ([`OpConf`])
//! - [`job`] - Persisted job ([`Job`], [`JobOp`], placement groups)
//! - [`graph`] - Arena graph view with topological and reachability queries
//! - [`builder`] - Batched, validated job mutation ([`JobBuilder`])
//! - [`error`] - Error types and result handling

pub mod builder;
pub mod error;
pub mod graph;
pub mod job;
pub mod op;
pub mod shape;
pub mod types;


pub use builder::JobBuilder;
pub use error::{Error, Result};
pub use graph::{EdgeId, NodeId, OpEdge, OpGraph, OpNode, Reachability};
pub use job::{Job, JobOp, LayoutSignature, PlacementGroup};
pub use op::{OpConf, new_unique_id};
pub use shape::{Shape, TensorDesc, TimeShape};
pub use types::{DeviceType, Layout, Placement, TensorId};
