use std::collections::HashSet;

use weave_ir::{Job, Layout, OpGraph, Placement};

use crate::collective::find_max_connected_subgraph;
use crate::test::helpers::{op, time_shape_op};

const B: Layout = Layout::Broadcast;

fn select(job: &Job) -> HashSet<String> {
    let graph = OpGraph::new(job).unwrap();
    let order = graph.topo_order().unwrap();
    find_max_connected_subgraph(&graph, &order).unwrap().into_iter().map(|id| graph.node(id).name().to_string()).collect()
}

fn names(names: &[&str]) -> HashSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[test]
fn test_selects_largest_component() {
    let (small, large) = (Placement::gpu(2), Placement::new(weave_ir::DeviceType::Gpu, [4, 5, 6, 7]));
    let mut job = Job::new("two_islands");
    job.push_op(&small, op("s0", &[], B, &[8]));
    job.push_op(&small, op("s1", &[("s0", B)], B, &[8]));
    job.push_op(&large, op("l0", &[], B, &[8]));
    job.push_op(&large, op("l1", &[("l0", B)], B, &[8]));
    job.push_op(&large, op("l2", &[("l1", B)], B, &[8]));

    assert_eq!(select(&job), names(&["l0", "l1", "l2"]));
}

#[test]
fn test_tie_keeps_first_found() {
    let (first, second) = (Placement::gpu(2), Placement::new(weave_ir::DeviceType::Gpu, [2, 3]));
    let mut job = Job::new("tie");
    job.push_op(&first, op("a0", &[], B, &[8]));
    job.push_op(&first, op("a1", &[("a0", B)], B, &[8]));
    job.push_op(&second, op("b0", &[], B, &[8]));
    job.push_op(&second, op("b1", &[("b0", B)], B, &[8]));

    assert_eq!(select(&job), names(&["a0", "a1"]));
}

#[test]
fn test_grows_through_consumers_and_producers() {
    // d is reached from seed a only by walking c's in-edges back to b.
    let gpu = Placement::gpu(4);
    let mut job = Job::new("zigzag");
    job.push_op(&gpu, op("a", &[], B, &[8]));
    job.push_op(&gpu, op("b", &[], B, &[8]));
    job.push_op(&gpu, op("c", &[("a", B), ("b", B)], B, &[8]));
    job.push_op(&gpu, op("d", &[("b", B)], B, &[8]));

    assert_eq!(select(&job), names(&["a", "b", "c", "d"]));
}

#[test]
fn test_ignores_cpu_and_single_device() {
    let mut job = Job::new("ineligible");
    job.push_op(&Placement::cpu(4), op("c0", &[], B, &[8]));
    job.push_op(&Placement::cpu(4), op("c1", &[("c0", B)], B, &[8]));
    job.push_op(&Placement::gpu(1), op("g0", &[("c1", B)], B, &[8]));
    job.push_op(&Placement::gpu(1), op("g1", &[("g0", B)], B, &[8]));

    assert!(select(&job).is_empty());
}

#[test]
fn test_time_shape_op_splits_component() {
    let gpu = Placement::gpu(2);
    let mut job = Job::new("packed");
    job.push_op(&gpu, op("a", &[], B, &[8]));
    job.push_op(&gpu, time_shape_op("pack", &[("a", B)], B, &[8]));
    job.push_op(&gpu, op("b", &[("pack", B)], B, &[8]));
    job.push_op(&gpu, op("c", &[("b", B)], B, &[8]));

    assert_eq!(select(&job), names(&["b", "c"]));
}

#[test]
fn test_ctrl_edges_do_not_connect() {
    let gpu = Placement::gpu(2);
    let mut job = Job::new("ctrl_only");
    job.push_op(&gpu, op("a", &[], B, &[8]));
    job.push_op(&gpu, op("b", &[("a", B)], B, &[8]));
    let mut c = op("c", &[], B, &[8]);
    c.conf.add_ctrl_in_op_name("b");
    job.push_op(&gpu, c);

    assert_eq!(select(&job), names(&["a", "b"]));
}

#[test]
fn test_selection_is_deterministic() {
    let gpu = Placement::gpu(2);
    let mut job = Job::new("repeat");
    for i in 0..6 {
        let producer = format!("x{}", i.max(1) - 1);
        let inputs = if i == 0 { vec![] } else { vec![(producer.as_str(), B)] };
        job.push_op(&gpu, op(&format!("x{i}"), &inputs, B, &[8]));
    }

    assert_eq!(select(&job), select(&job));
    assert_eq!(select(&job).len(), 6);
}
