//! Layout conversion decision table and collective op synthesis.

use test_case::test_case;
use weave_ir::{Job, JobOp, Layout, NodeId, OpConf, OpGraph, Placement, Shape};

use crate::collective::{
    COLLECTIVE_INPUT_SLOT, COLLECTIVE_OP_NAME_PREFIX, COLLECTIVE_OUTPUT_BLOB, CollectiveKind, Conversion, Resolution,
    resolve_conversion, try_build_collective_op,
};
use crate::error::Error;
use crate::test::helpers::{dynamic_op, op, out};

const P: Layout = Layout::PartialSum;
const B: Layout = Layout::Broadcast;
const S0: Layout = Layout::Split { axis: 0 };
const S1: Layout = Layout::Split { axis: 1 };

// ============================================================================
// Decision table
// ============================================================================

#[test_case(P, B, &[8, 4], 4, Conversion::Collective(CollectiveKind::AllReduce); "p2b")]
#[test_case(P, B, &[7, 3], 4, Conversion::Collective(CollectiveKind::AllReduce); "p2b_needs_no_divisibility")]
#[test_case(P, S0, &[8, 4], 4, Conversion::Collective(CollectiveKind::ReduceScatter); "p2s")]
#[test_case(P, S0, &[8, 4], 3, Conversion::None; "p2s_not_divisible")]
#[test_case(P, S1, &[8, 8], 4, Conversion::None; "p2s_non_leading_axis")]
#[test_case(S0, B, &[8, 4], 4, Conversion::Collective(CollectiveKind::AllGather); "s2b")]
#[test_case(S0, B, &[6, 4], 4, Conversion::None; "s2b_not_divisible")]
#[test_case(S1, B, &[8, 8], 4, Conversion::None; "s2b_non_leading_axis")]
#[test_case(S0, S1, &[8, 4], 4, Conversion::AllToAll { src_axis: 0, dst_axis: 1 }; "s2s")]
#[test_case(S0, S1, &[8, 6], 4, Conversion::None; "s2s_not_divisible")]
#[test_case(S0, Layout::split(5), &[8, 8], 4, Conversion::None; "s2s_axis_out_of_range")]
#[test_case(S0, S0, &[8, 4], 4, Conversion::None; "same_split")]
#[test_case(B, B, &[8, 4], 4, Conversion::None; "b2b")]
#[test_case(P, P, &[8, 4], 4, Conversion::None; "p2p")]
#[test_case(B, P, &[8, 4], 4, Conversion::None; "b2p")]
#[test_case(B, S0, &[8, 4], 4, Conversion::None; "b2s")]
fn test_resolve_conversion(src: Layout, dst: Layout, shape: &[i64], width: usize, expected: Conversion) {
    assert_eq!(resolve_conversion(src, dst, &Shape::from(shape), width), expected);
}

#[test]
fn test_collective_kind_names() {
    assert_eq!(CollectiveKind::AllReduce.op_type(), "_collective_all_reduce");
    assert_eq!(CollectiveKind::ReduceScatter.to_string(), "_collective_reduce_scatter");
    assert_eq!(CollectiveKind::AllGather.tag(), "S2B");
}

// ============================================================================
// Op synthesis
// ============================================================================

/// `a` produces `a/out` as `src`, `b` consumes it as `dst`, both on `gpu(width)`.
fn pair(producer: JobOp, dst: Layout, width: u32) -> (OpGraph, NodeId, NodeId) {
    let gpu = Placement::gpu(width);
    let mut job = Job::new("pair");
    job.push_op(&gpu, producer);
    job.push_op(&gpu, op("b", &[("a", dst)], B, &[8, 16]));
    let graph = OpGraph::new(&job).unwrap();
    let (a, b) = (graph.node_id("a").unwrap(), graph.node_id("b").unwrap());
    (graph, a, b)
}

#[test]
fn test_build_all_reduce() {
    let mut producer = op("a", &[], P, &[8, 16]);
    producer.conf = producer.conf.with_scope_symbol_id(Some(42));
    let (graph, a, b) = pair(producer, B, 4);

    let Resolution::Insert(collective) = try_build_collective_op(&graph, a, b, &out("a")).unwrap() else {
        panic!("expected an all-reduce");
    };

    assert_eq!(collective.kind, CollectiveKind::AllReduce);
    assert!(collective.name().starts_with(&format!("{COLLECTIVE_OP_NAME_PREFIX}-P2B-")));
    let conf = &collective.op.conf;
    assert_eq!(conf.op_type(), "_collective_all_reduce");
    assert_eq!(conf.input(COLLECTIVE_INPUT_SLOT), Some(&out("a")));
    assert_eq!(conf.outputs(), [COLLECTIVE_OUTPUT_BLOB]);
    assert_eq!(conf.scope_symbol_id(), Some(42));
    assert_eq!(collective.op.layouts.get(COLLECTIVE_INPUT_SLOT), Some(&P));
    assert_eq!(collective.op.layouts.get(COLLECTIVE_OUTPUT_BLOB), Some(&B));
    assert_eq!(collective.op.output_descs.get(COLLECTIVE_OUTPUT_BLOB), graph.tensor_desc(&out("a")));
    assert_eq!(collective.output_tensor().op_name(), collective.name());
}

#[test]
fn test_build_names_are_unique() {
    let (graph, a, b) = pair(op("a", &[], S0, &[8, 16]), B, 4);

    let first = try_build_collective_op(&graph, a, b, &out("a")).unwrap();
    let second = try_build_collective_op(&graph, a, b, &out("a")).unwrap();

    let (Resolution::Insert(first), Resolution::Insert(second)) = (first, second) else {
        panic!("expected two all-gathers");
    };
    assert_eq!(first.kind, CollectiveKind::AllGather);
    assert_ne!(first.name(), second.name());
}

#[test]
fn test_build_reduce_scatter_not_divisible() {
    let (graph, a, b) = pair(op("a", &[], P, &[8, 16]), S0, 3);
    assert_eq!(try_build_collective_op(&graph, a, b, &out("a")).unwrap(), Resolution::Skip);
}

#[test]
fn test_build_skips_dynamic_shape() {
    // Shape checks never run for dynamic tensors.
    let (graph, a, b) = pair(dynamic_op("a", &[], P, &[0, 16]), B, 4);
    assert_eq!(try_build_collective_op(&graph, a, b, &out("a")).unwrap(), Resolution::Skip);
}

#[test_case(&[0, 16]; "zero_leading_dim")]
#[test_case(&[8, -1]; "negative_elem_count")]
#[test_case(&[]; "scalar")]
#[test_case(&[8, -2, -3]; "negative_pair_with_positive_product")]
fn test_build_rejects_invalid_shape(shape: &[i64]) {
    let (graph, a, b) = pair(op("a", &[], P, shape), B, 4);
    let result = try_build_collective_op(&graph, a, b, &out("a"));
    assert!(matches!(result, Err(Error::InvalidLogicalShape { .. })));
}

#[test]
fn test_build_huge_static_shape() {
    // Element count overflows i64; the shape is still valid.
    let (graph, a, b) = pair(op("a", &[], P, &[1i64 << 40, 1 << 40]), B, 4);

    let resolution = try_build_collective_op(&graph, a, b, &out("a")).unwrap();
    assert!(matches!(resolution, Resolution::Insert(c) if c.kind == CollectiveKind::AllReduce));
}

#[test]
fn test_build_missing_consumer_layout() {
    let gpu = Placement::gpu(4);
    let mut job = Job::new("no_layout");
    job.push_op(&gpu, op("a", &[], P, &[8, 16]));
    job.push_op(&gpu, JobOp::new(OpConf::new("b", "test_op").with_input("in_0", out("a")).with_output("out")));
    let graph = OpGraph::new(&job).unwrap();
    let (a, b) = (graph.node_id("a").unwrap(), graph.node_id("b").unwrap());

    let result = try_build_collective_op(&graph, a, b, &out("a"));
    assert!(matches!(result, Err(Error::MissingLayout { op_name, .. }) if op_name == "b"));
}

#[test]
#[tracing_test::traced_test]
fn test_build_all_to_all_warns() {
    let (graph, a, b) = pair(op("a", &[], S0, &[8, 16]), S1, 4);

    assert_eq!(try_build_collective_op(&graph, a, b, &out("a")).unwrap(), Resolution::Unsupported);
    assert!(logs_contain("all-to-all conversion is not supported"));
    assert!(logs_contain("elem_cnt=128"));
}
