//! Test utilities for building small jobs.

use crate::{Job, JobOp, Layout, OpConf, Placement, TensorDesc, TensorId};

/// Tensor id of the single output of an op built by [`op`].
pub fn out(op_name: &str) -> TensorId {
    TensorId::new(op_name, "out")
}

/// Op with one output `out` of logical `shape` laid out as `out_layout`.
///
/// Each `(producer, layout)` pair becomes input slot `in_{i}` consuming
/// `producer/out` under `layout`.
pub fn op(name: &str, inputs: &[(&str, Layout)], out_layout: Layout, shape: &[i64]) -> JobOp {
    let mut conf = OpConf::new(name, "test_op").with_output("out");
    let mut job_op_layouts = Vec::with_capacity(inputs.len());
    for (i, (producer, layout)) in inputs.iter().enumerate() {
        let slot = format!("in_{i}");
        conf = conf.with_input(&slot, out(producer));
        job_op_layouts.push((slot, *layout));
    }

    let mut job_op = JobOp::new(conf).with_layout("out", out_layout).with_output_desc("out", TensorDesc::new(shape));
    for (slot, layout) in job_op_layouts {
        job_op = job_op.with_layout(slot, layout);
    }
    job_op
}

/// Linear chain `op0 -> op1 -> ...` on one placement, every tensor broadcast.
pub fn chain(len: usize, placement: &Placement) -> Job {
    let mut job = Job::new("chain");
    for i in 0..len {
        let name = format!("op{i}");
        let producer = format!("op{}", i.wrapping_sub(1));
        let inputs: Vec<(&str, Layout)> =
            if i == 0 { vec![] } else { vec![(producer.as_str(), Layout::Broadcast)] };
        job.push_op(placement, op(&name, &inputs, Layout::Broadcast, &[8, 8]));
    }
    job
}
