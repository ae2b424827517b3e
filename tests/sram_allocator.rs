//! Black-box coverage of the SRAM bookkeeping invariants a committed pass
//! must uphold: tile disjointness (spec.md §8 invariant 1) and exact
//! release of weights/PLE/output tiles a pass no longer needs.

use npu_pass_compiler::graph::{Graph, MceNode, NodeKind};
use npu_pass_compiler::pass::{create_greedily, GreedyOutcome};
use npu_pass_compiler::sram::SramAllocator;
use npu_pass_compiler::types::{
    BufferLocation, ConvAlgorithm, DataFormat, HardwareCapabilities, MceOperationKind, ShapeMultiplier, Strategy, TensorShape,
    UpsampleType,
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

/// Even when the selected strategy forces the output to DRAM, the
/// committed pass's four tiles stay pairwise disjoint within the bank.
#[test]
fn a_dram_bound_pass_still_has_pairwise_disjoint_tiles() {
    let shape = TensorShape::new(1, 16, 16, 16);
    let mut graph = Graph::new();
    let mce_id = graph
        .add_node(NodeKind::Mce(pointwise_mce(shape)), shape, shape, DataFormat::Nhwcb, vec![])
        .unwrap();
    // A prior hint forcing this node's output to DRAM even though S3
    // would otherwise keep it SRAM-resident.
    graph.get_mut(mce_id).unwrap().force_dram = true;

    let caps = HardwareCapabilities::reference();
    let allocator = SramAllocator::new(caps.sram_bytes_per_bank());
    let outcome = create_greedily(&graph, mce_id, &[Strategy::S3], 1, 1, 3, 4, &caps, &allocator).unwrap();

    match outcome {
        GreedyOutcome::Pass(pass) => {
            assert_eq!(pass.output_location, BufferLocation::Dram);
            assert!(pass.strategy_config.tiles_are_disjoint());
        }
        other => panic!("expected a committed pass, got {other:?}"),
    }
}

/// Committing a DRAM-bound pass frees weights, PLE, and output: only the
/// input tile should remain live in the allocator handed back to the
/// caller, and its size must match what the strategy actually reserved.
#[test]
fn committing_a_dram_bound_pass_leaves_only_the_input_tile_allocated() {
    let shape = TensorShape::new(1, 16, 16, 16);
    let mut graph = Graph::new();
    let mce_id = graph
        .add_node(NodeKind::Mce(pointwise_mce(shape)), shape, shape, DataFormat::Nhwcb, vec![])
        .unwrap();
    graph.get_mut(mce_id).unwrap().force_dram = true;

    let caps = HardwareCapabilities::reference();
    let allocator = SramAllocator::new(caps.sram_bytes_per_bank());
    let outcome = create_greedily(&graph, mce_id, &[Strategy::S3], 1, 1, 3, 4, &caps, &allocator).unwrap();

    match outcome {
        GreedyOutcome::Pass(pass) => {
            assert_eq!(pass.allocator_after.bytes_in_use(), pass.strategy_config.input.tile_size_bytes);
        }
        other => panic!("expected a committed pass, got {other:?}"),
    }
}
