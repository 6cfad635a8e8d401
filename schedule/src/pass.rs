//! Job pass framework.
//!
//! Passes are registered by name and run in a caller-chosen order. A pass
//! that is disabled by the [`PassContext`] is skipped without touching the job.

use snafu::{OptionExt, ensure};
use weave_ir::Job;

use crate::collective::InsertCollectiveOpPass;
use crate::config::PassContext;
use crate::error::{DuplicatePassSnafu, Result, UnknownPassSnafu};

/// A whole-job rewrite.
pub trait JobPass {
    fn name(&self) -> &'static str;

    /// Whether the pass should run in `ctx`.
    fn is_enabled(&self, ctx: &PassContext) -> bool;

    /// Rewrite `job`. On error the job must be left unchanged.
    fn apply(&self, job: &mut Job, ctx: &PassContext) -> Result<()>;
}

#[derive(Default)]
pub struct PassRegistry {
    passes: Vec<Box<dyn JobPass>>,
}

impl PassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in pass.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.passes.push(Box::new(InsertCollectiveOpPass));
        registry
    }

    pub fn register(&mut self, pass: Box<dyn JobPass>) -> Result<()> {
        let name = pass.name();
        ensure!(self.get(name).is_none(), DuplicatePassSnafu { name });
        self.passes.push(pass);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn JobPass> {
        self.passes.iter().find(|p| p.name() == name).map(|pass| &**pass)
    }

    /// Registered pass names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes.iter().map(|p| p.name())
    }

    /// Run the named passes in order.
    ///
    /// Every name is resolved before any pass runs.
    pub fn run(&self, job: &mut Job, ctx: &PassContext, names: &[&str]) -> Result<()> {
        let passes = names
            .iter()
            .map(|&name| self.get(name).context(UnknownPassSnafu { name }))
            .collect::<Result<Vec<_>>>()?;

        for pass in passes {
            if !pass.is_enabled(ctx) {
                tracing::debug!(pass = pass.name(), "pass disabled, skipping");
                continue;
            }
            let _span = tracing::debug_span!("job_pass", pass = pass.name(), job = %job.name()).entered();
            pass.apply(job, ctx)?;
        }
        Ok(())
    }

    /// Run every registered pass in registration order.
    pub fn run_all(&self, job: &mut Job, ctx: &PassContext) -> Result<()> {
        let names: Vec<&str> = self.names().collect();
        self.run(job, ctx, &names)
    }
}

/// Run the named built-in passes on `job`.
pub fn run_passes(job: &mut Job, ctx: &PassContext, names: &[&str]) -> Result<()> {
    PassRegistry::with_defaults().run(job, ctx, names)
}
