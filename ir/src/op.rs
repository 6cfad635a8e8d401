//! Operator configuration.
//!
//! [`OpConf`] is the persisted, mutable description of one operator: its
//! name, its type, which tensors feed its input slots, which blobs it
//! produces and which ops must run before it (control inputs).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;
use snafu::OptionExt;

use crate::error::{Result, UnknownInputSlotSnafu};
use crate::types::TensorId;

// Process-wide counter for generated op names.
//
// Monotonic, so names generated by concurrent compilations never collide.
static UNIQUE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Next process-wide unique id, used as a suffix for generated op names.
pub fn new_unique_id() -> u64 {
    UNIQUE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Persisted configuration of a single operator.
///
/// Input slots are kept sorted by slot name so that iteration, rewriting
/// and diagnostics are deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpConf {
    name: String,
    op_type: String,
    inputs: BTreeMap<String, TensorId>,
    outputs: SmallVec<[String; 2]>,
    ctrl_in_op_names: Vec<String>,
    scope_symbol_id: Option<i64>,
}

impl OpConf {
    pub fn new(name: impl Into<String>, op_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op_type: op_type.into(),
            inputs: BTreeMap::new(),
            outputs: SmallVec::new(),
            ctrl_in_op_names: Vec::new(),
            scope_symbol_id: None,
        }
    }

    /// Bind input `slot` to `tensor`.
    pub fn with_input(mut self, slot: impl Into<String>, tensor: TensorId) -> Self {
        self.inputs.insert(slot.into(), tensor);
        self
    }

    /// Declare an output blob.
    pub fn with_output(mut self, blob: impl Into<String>) -> Self {
        let blob = blob.into();
        if !self.outputs.contains(&blob) {
            self.outputs.push(blob);
        }
        self
    }

    pub fn with_ctrl_in(mut self, op_name: impl Into<String>) -> Self {
        self.add_ctrl_in_op_name(op_name);
        self
    }

    pub fn with_scope_symbol_id(mut self, scope_symbol_id: Option<i64>) -> Self {
        self.scope_symbol_id = scope_symbol_id;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn op_type(&self) -> &str {
        &self.op_type
    }

    /// Input slots in slot-name order.
    pub fn inputs(&self) -> impl Iterator<Item = (&str, &TensorId)> {
        self.inputs.iter().map(|(slot, tensor)| (slot.as_str(), tensor))
    }

    pub fn input(&self, slot: &str) -> Option<&TensorId> {
        self.inputs.get(slot)
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn has_output(&self, blob: &str) -> bool {
        self.outputs.iter().any(|o| o == blob)
    }

    /// Tensor id of output `blob` of this op.
    pub fn output_tensor(&self, blob: &str) -> TensorId {
        TensorId::new(&self.name, blob)
    }

    pub fn ctrl_in_op_names(&self) -> &[String] {
        &self.ctrl_in_op_names
    }

    pub fn scope_symbol_id(&self) -> Option<i64> {
        self.scope_symbol_id
    }

    /// Require `op_name` to execute before this op. Adding an existing control input is a no-op.
    pub fn add_ctrl_in_op_name(&mut self, op_name: impl Into<String>) {
        let op_name = op_name.into();
        if !self.ctrl_in_op_names.contains(&op_name) {
            self.ctrl_in_op_names.push(op_name);
        }
    }

    /// Point input `slot` at `tensor`, returning the tensor it consumed before.
    pub fn replace_input(&mut self, slot: &str, tensor: TensorId) -> Result<TensorId> {
        let current = self
            .inputs
            .get_mut(slot)
            .context(UnknownInputSlotSnafu { name: self.name.clone(), slot: slot.to_string() })?;
        Ok(std::mem::replace(current, tensor))
    }
}
