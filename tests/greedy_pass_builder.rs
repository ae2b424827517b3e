//! Black-box coverage of `create_greedily`'s determinism, its
//! keep-the-last-success backoff behavior, and the MaxPool-3x3 hint row.
//! See spec.md §4.8/§4.9 and §8 invariant 7.

use npu_pass_compiler::graph::{Graph, MceNode, NodeKind, PleNode};
use npu_pass_compiler::pass::{create_greedily, FixGraphHint, GreedyOutcome};
use npu_pass_compiler::sram::SramAllocator;
use npu_pass_compiler::types::{
    ConvAlgorithm, DataFormat, HardwareCapabilities, MceOperationKind, PleOperation, ShapeMultiplier, Strategy, TensorShape, UpsampleType,
};

fn pointwise_mce(shape: TensorShape) -> MceNode {
    MceNode {
        op: MceOperationKind::Convolution,
        algorithm: ConvAlgorithm::Direct,
        weights_format: DataFormat::Hwio,
        kernel_shape: TensorShape::new(1, 1, shape.c, shape.c),
        stride_height: 1,
        stride_width: 1,
        shape_multiplier: ShapeMultiplier::identity(),
        upsample: UpsampleType::Off,
        is_static_input: false,
        weight_channel_multiplier: 1,
    }
}

/// Running the same graph and a fresh, identically-sized allocator through
/// `create_greedily` twice gives bit-identical outcomes — no hidden
/// randomness or iteration-order dependence (spec.md §8 invariant 7).
#[test]
fn create_greedily_is_deterministic_across_repeated_runs() {
    let shape = TensorShape::new(1, 16, 16, 16);
    let mut graph = Graph::new();
    let mce_id = graph
        .add_node(NodeKind::Mce(pointwise_mce(shape)), shape, shape, DataFormat::Nhwcb, vec![])
        .unwrap();

    let caps = HardwareCapabilities::reference();
    let preference = [Strategy::S3, Strategy::S0, Strategy::S1];

    let allocator_a = SramAllocator::new(caps.sram_bytes_per_bank());
    let outcome_a = create_greedily(&graph, mce_id, &preference, 1, 1, 3, 4, &caps, &allocator_a).unwrap();

    let allocator_b = SramAllocator::new(caps.sram_bytes_per_bank());
    let outcome_b = create_greedily(&graph, mce_id, &preference, 1, 1, 3, 4, &caps, &allocator_b).unwrap();

    match (outcome_a, outcome_b) {
        (GreedyOutcome::Pass(a), GreedyOutcome::Pass(b)) => {
            assert_eq!(a.strategy_config, b.strategy_config);
            assert_eq!(a.output_location, b.output_location);
            assert_eq!(a.output_compression, b.output_compression);
        }
        other => panic!("expected two committed passes, got {other:?}"),
    }
}

/// A chain of MCE -> FuseOnlyPle -> an unsupported node extends as far as
/// the unsupported node permits; the commit reflects the 2-node chain, not
/// just the bare MCE (spec.md §4.8's greedy extension).
#[test]
fn extension_through_a_fuse_ple_commits_the_longer_chain() {
    let shape = TensorShape::new(1, 16, 16, 16);
    let mut graph = Graph::new();
    let mce_id = graph
        .add_node(NodeKind::Mce(pointwise_mce(shape)), shape, shape, DataFormat::Nhwcb, vec![])
        .unwrap();
    let ple_id = graph
        .add_node(
            NodeKind::FuseOnlyPle(PleNode {
                op: PleOperation::Passthrough,
                shape_multiplier: ShapeMultiplier::identity(),
            }),
            shape,
            shape,
            DataFormat::Nhwcb,
            vec![mce_id],
        )
        .unwrap();
    let _unsupported = graph
        .add_node(NodeKind::ExtractSubtensor, shape, shape, DataFormat::Nhwcb, vec![ple_id])
        .unwrap();

    let caps = HardwareCapabilities::reference();
    let allocator = SramAllocator::new(caps.sram_bytes_per_bank());
    let outcome = create_greedily(&graph, mce_id, &[Strategy::S3], 1, 1, 3, 4, &caps, &allocator).unwrap();

    match outcome {
        GreedyOutcome::Pass(pass) => {
            assert_eq!(pass.working_nodes, vec![mce_id, ple_id]);
            assert_eq!(pass.fuse_ple, Some(ple_id));
        }
        other => panic!("expected a 2-node committed pass, got {other:?}"),
    }
}

/// MaxPool-3x3 fused onto a non-depthwise MCE, with no strategy fitting at
/// that chain length, asks the driver to insert an identity node before
/// the PLE rather than giving up outright.
#[test]
fn maxpool_3x3_on_a_non_depthwise_mce_with_no_fit_requests_an_identity_node() {
    let shape = TensorShape::new(1, 1024, 1024, 1024);
    let mce = pointwise_mce(shape);
    let mut graph = Graph::new();
    let mce_id = graph
        .add_node(NodeKind::Mce(mce), shape, shape, DataFormat::Nhwcb, vec![])
        .unwrap();
    let ple_id = graph
        .add_node(
            NodeKind::FuseOnlyPle(PleNode {
                op: PleOperation::MaxPool3x3_2_2Even,
                shape_multiplier: ShapeMultiplier::identity(),
            }),
            shape,
            shape,
            DataFormat::Nhwcb,
            vec![mce_id],
        )
        .unwrap();

    let mut caps = HardwareCapabilities::reference();
    caps.total_sram_bytes = 64; // forces no strategy to fit, same as choose.rs's own test
    let allocator = SramAllocator::new(caps.sram_bytes_per_bank());
    let outcome = create_greedily(&graph, mce_id, &[Strategy::S3], 1, 1, 3, 4, &caps, &allocator).unwrap();

    assert_eq!(
        outcome,
        GreedyOutcome::NoPass(Some(FixGraphHint::InsertIdentityNode { node: ple_id }))
    );
}
