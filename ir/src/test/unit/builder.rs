//! JobBuilder tests: mutate-once semantics and batch validation.

use crate::test::helpers::{chain, op};
use crate::{Error, JobBuilder, Layout, Placement};

#[test]
fn test_mut_ops_replaces_conf() {
    let mut job = chain(3, &Placement::gpu(2));
    let mut conf = job.op("op2").unwrap().conf.clone();
    conf.add_ctrl_in_op_name("op0");

    JobBuilder::new(&mut job).mut_ops_only_once(vec![conf]).unwrap();

    assert_eq!(job.op("op2").unwrap().conf.ctrl_in_op_names(), ["op0"]);
}

#[test]
fn test_mut_ops_twice_across_batches() {
    let mut job = chain(2, &Placement::gpu(2));
    let conf = job.op("op1").unwrap().conf.clone();

    let mut builder = JobBuilder::new(&mut job);
    builder.mut_ops_only_once(vec![conf.clone()]).unwrap();
    let result = builder.mut_ops_only_once(vec![conf]);

    assert!(matches!(result, Err(Error::DuplicateMutation { name }) if name == "op1"));
}

#[test]
fn test_builder_tracks_mutated_names() {
    let mut job = chain(3, &Placement::gpu(2));
    let first = job.op("op0").unwrap().conf.clone();
    let mut second = job.op("op2").unwrap().conf.clone();
    second.add_ctrl_in_op_name("op0");

    let mut builder = JobBuilder::new(&mut job);
    assert_eq!(builder.mutated_op_names().count(), 0);
    builder.mut_ops_only_once(vec![first]).unwrap();
    builder.mut_ops_only_once(vec![second]).unwrap();

    let mut names: Vec<&str> = builder.mutated_op_names().collect();
    names.sort_unstable();
    assert_eq!(names, ["op0", "op2"]);
    assert_eq!(builder.job().op("op2").unwrap().conf.ctrl_in_op_names(), ["op0"]);
}

#[test]
fn test_mut_ops_twice_in_one_batch_leaves_job_untouched() {
    let mut job = chain(2, &Placement::gpu(2));
    let original = job.clone();
    let mut conf = job.op("op0").unwrap().conf.clone();
    conf.add_ctrl_in_op_name("op1");

    let result = JobBuilder::new(&mut job).mut_ops_only_once(vec![conf.clone(), conf]);

    assert!(matches!(result, Err(Error::DuplicateMutation { .. })));
    assert_eq!(job, original);
}

#[test]
fn test_mut_unknown_op() {
    let mut job = chain(1, &Placement::gpu(2));
    let conf = op("ghost", &[], Layout::Broadcast, &[4]).conf;

    let result = JobBuilder::new(&mut job).mut_ops_only_once(vec![conf]);

    assert!(matches!(result, Err(Error::UnknownOp { .. })));
}

#[test]
fn test_add_ops_creates_placement_group() {
    let gpu = Placement::gpu(4);
    let mut job = chain(1, &gpu);

    let mut builder = JobBuilder::new(&mut job);
    builder
        .add_ops(&gpu, vec![op("x", &[("op0", Layout::Broadcast)], Layout::Broadcast, &[8, 8])])
        .unwrap();
    builder.add_ops(&gpu, vec![]).unwrap();

    assert_eq!(job.ops().len(), 2);
    assert_eq!(job.placement_groups().len(), 2, "new ops form their own group; empty batches add none");
    assert_eq!(job.placement_of("x"), Some(&gpu));
}

#[test]
fn test_add_ops_rejects_existing_name() {
    let gpu = Placement::gpu(2);
    let mut job = chain(1, &gpu);
    let original = job.clone();

    let result = JobBuilder::new(&mut job).add_ops(
        &gpu,
        vec![op("fresh", &[], Layout::Broadcast, &[4]), op("op0", &[], Layout::Broadcast, &[4])],
    );

    assert!(matches!(result, Err(Error::DuplicateOpName { name }) if name == "op0"));
    assert_eq!(job, original, "rejected batch must not be partially applied");
}
