//! Logical tensor shapes and descriptors.
//!
//! Dimensions are signed so that malformed metadata (zero or negative
//! extents coming from an upstream inference bug) can be detected instead of
//! silently wrapping.

use std::fmt;

use itertools::Itertools;
use smallvec::SmallVec;

/// Static logical shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shape(SmallVec<[i64; 4]>);

impl Shape {
    pub fn new(dims: impl IntoIterator<Item = i64>) -> Self {
        Self(dims.into_iter().collect())
    }

    pub fn dims(&self) -> &[i64] {
        &self.0
    }

    pub fn num_axes(&self) -> usize {
        self.0.len()
    }

    /// Extent of `axis`, or `None` when the axis is out of range.
    pub fn at(&self, axis: usize) -> Option<i64> {
        self.0.get(axis).copied()
    }

    /// Product of all extents, or `None` when it overflows `i64`. A scalar (zero axes) has one element.
    pub fn elem_count(&self) -> Option<i64> {
        self.0.iter().try_fold(1i64, |acc, &dim| acc.checked_mul(dim))
    }

    /// True when there is at least one axis and every extent is positive.
    pub fn is_positive(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|&dim| dim > 0)
    }
}

impl From<Vec<i64>> for Shape {
    fn from(dims: Vec<i64>) -> Self {
        Self::new(dims)
    }
}

impl<const N: usize> From<[i64; N]> for Shape {
    fn from(dims: [i64; N]) -> Self {
        Self::new(dims)
    }
}

impl From<&[i64]> for Shape {
    fn from(dims: &[i64]) -> Self {
        Self::new(dims.iter().copied())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.iter().join(", "))
    }
}

/// Logical descriptor of a tensor as seen by the whole parallel group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TensorDesc {
    shape: Shape,
    is_dynamic: bool,
}

impl TensorDesc {
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self { shape: shape.into(), is_dynamic: false }
    }

    /// Descriptor whose extents are only upper bounds known at runtime.
    pub fn dynamic(shape: impl Into<Shape>) -> Self {
        Self { shape: shape.into(), is_dynamic: true }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn is_dynamic(&self) -> bool {
        self.is_dynamic
    }
}

/// Temporal (pipelining) shape of an op's input and output.
///
/// Ops like pack/unpack or repeat/accumulate change how many times they run
/// per iteration relative to their producers; their input and output time
/// shapes differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeShape {
    input: Option<Shape>,
    output: Option<Shape>,
}

impl TimeShape {
    pub fn new(input: impl Into<Shape>, output: impl Into<Shape>) -> Self {
        Self { input: Some(input.into()), output: Some(output.into()) }
    }

    pub fn input(&self) -> Option<&Shape> {
        self.input.as_ref()
    }

    pub fn output(&self) -> Option<&Shape> {
        self.output.as_ref()
    }

    /// True when the op runs exactly as often as its producers.
    ///
    /// Ops without a known input time shape (sources) count as identity.
    pub fn is_identity(&self) -> bool {
        match (&self.input, &self.output) {
            (Some(input), Some(output)) => input == output,
            _ => true,
        }
    }
}
