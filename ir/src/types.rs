//! Fundamental type definitions for the Weave IR.
//!
//! This module contains the small value types shared by the graph model,
//! the job representation and the scheduling passes:
//!
//! - [`DeviceType`] and [`Placement`] - where an op executes
//! - [`Layout`] - how a logical tensor is distributed over a placement
//! - [`TensorId`] - logical tensor identity (`op/blob`)

use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use smallvec::SmallVec;

use crate::error::{Error, MalformedTensorNameSnafu};

/// Device family an op executes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(derive_more::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceType {
    #[display("cpu")]
    Cpu,
    #[display("gpu")]
    Gpu,
}

/// Parallel placement of an op: device type plus the devices of the parallel group.
///
/// Two placements are identical only when both the device type and the
/// device ids match, in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Placement {
    device_type: DeviceType,
    device_ids: SmallVec<[u32; 8]>,
}

impl Placement {
    pub fn new(device_type: DeviceType, device_ids: impl IntoIterator<Item = u32>) -> Self {
        Self { device_type, device_ids: device_ids.into_iter().collect() }
    }

    /// GPU placement over devices `0..parallel_num`.
    pub fn gpu(parallel_num: u32) -> Self {
        Self::new(DeviceType::Gpu, 0..parallel_num)
    }

    /// CPU placement over devices `0..parallel_num`.
    pub fn cpu(parallel_num: u32) -> Self {
        Self::new(DeviceType::Cpu, 0..parallel_num)
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn device_ids(&self) -> &[u32] {
        &self.device_ids
    }

    /// Number of devices the work is distributed over.
    pub fn parallel_num(&self) -> usize {
        self.device_ids.len()
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:[{}]", self.device_type, self.device_ids.iter().join(","))
    }
}

/// Distribution layout of a logical tensor over a parallel group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(derive_more::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Layout {
    /// Every device holds the full tensor.
    #[display("B")]
    Broadcast,
    /// Each device holds one slice along `axis`.
    #[display("S({axis})")]
    Split { axis: usize },
    /// Each device holds a partial value; the logical tensor is their sum.
    #[display("P")]
    PartialSum,
}

impl Layout {
    pub fn split(axis: usize) -> Self {
        Self::Split { axis }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::Broadcast)
    }

    pub fn is_partial_sum(&self) -> bool {
        matches!(self, Self::PartialSum)
    }

    /// Split axis, if this is a split layout.
    pub fn split_axis(&self) -> Option<usize> {
        match self {
            Self::Split { axis } => Some(*axis),
            _ => None,
        }
    }
}

/// Logical tensor identity: the producing op and the output blob name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(derive_more::Display)]
#[display("{op_name}/{blob_name}")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TensorId {
    op_name: String,
    blob_name: String,
}

impl TensorId {
    pub fn new(op_name: impl Into<String>, blob_name: impl Into<String>) -> Self {
        Self { op_name: op_name.into(), blob_name: blob_name.into() }
    }

    pub fn op_name(&self) -> &str {
        &self.op_name
    }

    pub fn blob_name(&self) -> &str {
        &self.blob_name
    }
}

impl FromStr for TensorId {
    type Err = Error;

    /// Parse `op/blob`. The op name is everything before the last `/`.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.rsplit_once('/') {
            Some((op, blob)) if !op.is_empty() && !blob.is_empty() => Ok(Self::new(op, blob)),
            _ => MalformedTensorNameSnafu { name }.fail(),
        }
    }
}
