//! Batched job mutation.
//!
//! [`JobBuilder`] is the only way passes change a [`Job`]. Every batch is
//! validated as a whole before the job is touched, so a rejected batch
//! leaves the job exactly as it was.

use std::collections::{HashMap, HashSet};

use snafu::{OptionExt, ensure};

use crate::error::{DuplicateMutationSnafu, DuplicateOpNameSnafu, Result, UnknownOpSnafu};
use crate::job::{Job, JobOp, PlacementGroup};
use crate::op::OpConf;
use crate::types::Placement;

pub struct JobBuilder<'a> {
    job: &'a mut Job,
    op_index: HashMap<String, usize>,
    mutated: HashSet<String>,
}

impl<'a> JobBuilder<'a> {
    pub fn new(job: &'a mut Job) -> Self {
        let op_index = job.ops.iter().enumerate().map(|(i, op)| (op.name().to_string(), i)).collect();
        Self { job, op_index, mutated: HashSet::new() }
    }

    pub fn job(&self) -> &Job {
        self.job
    }

    /// Replace the configurations of existing ops, matched by name.
    ///
    /// Each op may be mutated at most once over the builder's lifetime;
    /// a second mutation, within this batch or a previous one, is rejected.
    pub fn mut_ops_only_once(&mut self, confs: Vec<OpConf>) -> Result<()> {
        let mut batch = HashSet::with_capacity(confs.len());
        for conf in &confs {
            let name = conf.name();
            ensure!(self.op_index.contains_key(name), UnknownOpSnafu { name });
            ensure!(!self.mutated.contains(name) && batch.insert(name), DuplicateMutationSnafu { name });
        }

        for conf in confs {
            let index = *self.op_index.get(conf.name()).context(UnknownOpSnafu { name: conf.name() })?;
            tracing::trace!(op.name = conf.name(), "mutating op conf");
            self.mutated.insert(conf.name().to_string());
            self.job.ops[index].conf = conf;
        }
        Ok(())
    }

    /// Append new ops under one placement.
    ///
    /// The ops form a new placement group. An empty batch is a no-op.
    pub fn add_ops(&mut self, placement: &Placement, ops: Vec<JobOp>) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut batch = HashSet::with_capacity(ops.len());
        for op in &ops {
            let name = op.name();
            ensure!(!self.op_index.contains_key(name) && batch.insert(name), DuplicateOpNameSnafu { name });
        }

        let mut op_names = Vec::with_capacity(ops.len());
        for op in ops {
            tracing::trace!(op.name = op.name(), %placement, "adding op");
            self.op_index.insert(op.name().to_string(), self.job.ops.len());
            op_names.push(op.name().to_string());
            self.job.ops.push(op);
        }
        self.job.placement_groups.push(PlacementGroup { placement: placement.clone(), op_names });
        Ok(())
    }

    /// Names of ops mutated so far.
    pub fn mutated_op_names(&self) -> impl Iterator<Item = &str> {
        self.mutated.iter().map(String::as_str)
    }
}
