//! Job pass configuration.
//!
//! Provides typed configuration for job passes with bon builders.
//! Supports both explicit configuration and environment variable fallbacks.

use bon::bon;

/// Resource-level switches for optional job passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassConfig {
    /// Insert collective ops where distribution layouts change inside a GPU subgraph.
    pub enable_insert_collective_op_pass: bool,
}

#[bon]
impl PassConfig {
    /// Create a pass configuration with builder pattern.
    #[builder]
    pub fn builder(#[builder(default = false)] enable_insert_collective_op_pass: bool) -> Self {
        Self { enable_insert_collective_op_pass }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `WEAVE_INSERT_COLLECTIVE_OPS=1` - Enable collective-op insertion (`true` also accepted)
    pub fn from_env() -> Self {
        let enable_insert_collective_op_pass = std::env::var("WEAVE_INSERT_COLLECTIVE_OPS")
            .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
            .unwrap_or(false);

        Self { enable_insert_collective_op_pass }
    }
}

/// Everything a pass may consult besides the job itself.
#[derive(Debug, Clone)]
pub struct PassContext {
    config: PassConfig,
    collective_support: bool,
}

impl PassContext {
    /// Context for the current build; collective support follows the `nccl` feature.
    pub fn new(config: PassConfig) -> Self {
        Self { config, collective_support: cfg!(feature = "nccl") }
    }

    /// Override whether the target provides a collective-communication library.
    pub fn with_collective_support(mut self, collective_support: bool) -> Self {
        self.collective_support = collective_support;
        self
    }

    pub fn config(&self) -> &PassConfig {
        &self.config
    }

    pub fn has_collective_support(&self) -> bool {
        self.collective_support
    }
}
