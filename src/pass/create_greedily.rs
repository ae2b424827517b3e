//! `CreateGreedily`: turns one `FindLinearWorkingNodes` attempt into a
//! committed `Pass`, or into a hint for the driver loop to mutate the graph
//! and retry. See spec.md §4.9's classification table.

use crate::errors::PassResult;
use crate::graph::{Graph, NodeId, NodeKind};
use crate::pass::linear_working_nodes::find_linear_working_nodes;
use crate::pass::{FixGraphHint, GreedyOutcome, OutputCompression, Pass};
use crate::sram::SramAllocator;
use crate::types::{BufferLocation, DataFormat, HardwareCapabilities, Strategy};

/// Walks backward from `from`'s single input, following `.inputs.first()`,
/// looking for the nearest node already resident in SRAM. Used for the
/// "no strategy fit, and some upstream node is in SRAM" row: that node
/// must be forced to DRAM before the next attempt can succeed.
fn nearest_sram_resident_upstream(graph: &Graph, from: NodeId) -> Option<NodeId> {
    let mut current = from;
    loop {
        let node = graph.get(current)?;
        let &predecessor = node.inputs.first()?;
        let predecessor_node = graph.get(predecessor)?;
        if predecessor_node.location == BufferLocation::Sram {
            return Some(predecessor);
        }
        current = predecessor;
    }
}

/// Runs `FindLinearWorkingNodes` over the chain starting at `first_node` and
/// classifies the result per spec.md §4.9. Rows are checked in the order
/// the table lists them; the first match wins. In particular the Winograd
/// block-config row is checked before the MaxPool-3x3 row: when a Winograd
/// MCE with no valid block config also has a fused MaxPool-3x3 on a
/// non-depthwise MCE, `RequireDirectAlgorithm` wins over
/// `InsertIdentityNode`.
#[allow(clippy::too_many_arguments)]
#[tracing::instrument(skip(graph, preference_order, allocator))]
pub fn create_greedily(
    graph: &Graph,
    first_node: NodeId,
    preference_order: &[Strategy],
    activation_bytes: u32,
    weight_bytes: u32,
    max_weight_tile_slots: u32,
    max_input_tile_slots: u32,
    capabilities: &HardwareCapabilities,
    allocator: &SramAllocator,
) -> PassResult<GreedyOutcome> {
    let chain = graph.linear_chain_from(first_node);
    let result = find_linear_working_nodes(
        graph,
        &chain,
        preference_order,
        activation_bytes,
        weight_bytes,
        max_weight_tile_slots,
        max_input_tile_slots,
        capabilities,
        allocator,
    )?;

    let mce_id = match result.mce_op {
        Some(id) => id,
        None => {
            tracing::debug!("no MCE node in chain");
            return Ok(GreedyOutcome::NoMceFound);
        }
    };

    if !result.strategy_selected {
        if result.valid_block_configs.is_empty() && result.algorithm == Some(crate::types::ConvAlgorithm::Winograd) {
            tracing::debug!("no valid block config for Winograd; requesting Direct");
            return Ok(GreedyOutcome::NoPass(Some(FixGraphHint::RequireDirectAlgorithm { node: mce_id })));
        }

        if let Some(ple_id) = result.fuse_ple {
            let ple_node = graph.get(ple_id).expect("fuse_ple always refers to a pushed node");
            let mce_node = graph.get(mce_id).expect("mce_op always refers to a pushed node");
            if let (NodeKind::FuseOnlyPle(ple), NodeKind::Mce(mce)) = (&ple_node.kind, &mce_node.kind) {
                if ple.op.is_maxpool_3x3() && !mce.op.is_depthwise() {
                    tracing::debug!("MaxPool-3x3 on a non-depthwise MCE needs an identity node inserted");
                    return Ok(GreedyOutcome::NoPass(Some(FixGraphHint::InsertIdentityNode { node: ple_id })));
                }
            }
        }

        if let Some(sram_node) = nearest_sram_resident_upstream(graph, first_node) {
            tracing::debug!(?sram_node, "no strategy fit and an upstream node occupies SRAM");
            return Ok(GreedyOutcome::NoPass(Some(FixGraphHint::RequireDram { node: sram_node })));
        }

        tracing::debug!("no strategy fit and no applicable hint");
        return Ok(GreedyOutcome::NoPass(None));
    }

    let strategy_config = result
        .strategy_config
        .expect("strategy_selected implies strategy_config is set");
    let last_id = *result
        .working_nodes
        .last()
        .expect("strategy_selected implies at least one working node");
    let last_node = graph.get(last_id).expect("working_nodes always refer to pushed nodes");
    let first_working_node = graph
        .get(result.working_nodes[0])
        .expect("working_nodes always refer to pushed nodes");

    if let Some(required) = result.required_output_format {
        if last_node.format != required {
            tracing::debug!(?required, "last node's format does not match the required output format");
            return Ok(GreedyOutcome::NoPass(Some(FixGraphHint::ConvertOutputTo {
                node: last_id,
                required_format: required,
            })));
        }
    }

    if strategy_config.strategy != Strategy::S3
        && (first_working_node.format == DataFormat::Nchw || last_node.format == DataFormat::Nchw)
    {
        tracing::debug!(strategy = ?strategy_config.strategy, "non-S3 strategy selected with an NCHW boundary");
        return Ok(GreedyOutcome::NoPass(None));
    }

    let input_split = strategy_config.input.stripe_shape.h < first_working_node.input_shape.h
        || strategy_config.input.stripe_shape.w < first_working_node.input_shape.w
        || strategy_config.input.stripe_shape.c < first_working_node.input_shape.c;

    if first_working_node.format == DataFormat::Nhwc && input_split {
        if let Some(&upstream) = first_working_node.inputs.first() {
            tracing::debug!("NHWC input split by the selected strategy cannot be DMA'd; requesting NHWCB upstream");
            return Ok(GreedyOutcome::NoPass(Some(FixGraphHint::ConvertOutputTo {
                node: upstream,
                required_format: DataFormat::Nhwcb,
            })));
        }
    }

    if first_working_node.is_compressed && input_split {
        if let Some(&upstream) = first_working_node.inputs.first() {
            tracing::debug!("compressed input split by the selected strategy is unsupported; requesting an uncompressed upstream");
            return Ok(GreedyOutcome::NoPass(Some(FixGraphHint::RequireUncompressed { node: upstream })));
        }
    }

    // All checks passed: commit. Weights and PLE tiles never outlive a
    // pass; the output tile is freed too when it left for DRAM, but stays
    // live in SRAM for the next pass's input when S3 kept it resident.
    let mut allocator_after = result.sram_allocator_after;
    allocator_after.free("weights", strategy_config.weights.offset_bytes)?;
    allocator_after.free("ple", strategy_config.ple.offset_bytes)?;
    if result.output_location == BufferLocation::Dram {
        allocator_after.free("outputs", strategy_config.output.offset_bytes)?;
    }

    // FCAF-DEEP is preferred over FCAF-WIDE whenever compression applies at
    // all; nothing in this model distinguishes a case that needs WIDE
    // specifically (see DESIGN.md).
    let output_compression = if result.output_location == BufferLocation::Sram
        || result.required_output_format == Some(DataFormat::Nhwc)
        || last_node.compression_forbidden
    {
        OutputCompression::None
    } else {
        OutputCompression::FcafDeep
    };

    Ok(GreedyOutcome::Pass(Pass {
        working_nodes: result.working_nodes,
        mce_node: mce_id,
        fuse_ple: result.fuse_ple,
        strategy_config,
        algorithm: result.algorithm.expect("strategy_selected implies an algorithm was recorded"),
        output_location: result.output_location,
        output_compression,
        allocator_after,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MceNode;
    use crate::sram::SramAllocator;
    use crate::types::{ConvAlgorithm, MceOperationKind, ShapeMultiplier, TensorShape, UpsampleType};

    fn small_mce(shape: TensorShape) -> MceNode {
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

    #[test]
    fn a_lone_small_mce_commits_a_pass_with_no_compression_because_output_stays_in_sram() {
        let shape = TensorShape::new(1, 16, 16, 16);
        let mut graph = Graph::new();
        let mce_id = graph
            .add_node(NodeKind::Mce(small_mce(shape)), shape, shape, DataFormat::Nhwcb, vec![])
            .unwrap();

        let caps = HardwareCapabilities::reference();
        let allocator = SramAllocator::new(caps.sram_bytes_per_bank());
        let outcome = create_greedily(&graph, mce_id, &[Strategy::S3, Strategy::S0], 1, 1, 3, 4, &caps, &allocator).unwrap();

        match outcome {
            GreedyOutcome::Pass(pass) => {
                assert_eq!(pass.mce_node, mce_id);
                assert_eq!(pass.output_location, BufferLocation::Sram);
                assert_eq!(pass.output_compression, OutputCompression::None);
            }
            other => panic!("expected a committed pass, got {other:?}"),
        }
    }

    #[test]
    fn a_chain_with_no_mce_node_reports_no_mce_found() {
        let shape = TensorShape::new(1, 16, 16, 16);
        let mut graph = Graph::new();
        let only = graph.add_node(NodeKind::Other, shape, shape, DataFormat::Nhwcb, vec![]).unwrap();

        let caps = HardwareCapabilities::reference();
        let allocator = SramAllocator::new(caps.sram_bytes_per_bank());
        let outcome = create_greedily(&graph, only, &[Strategy::S3], 1, 1, 3, 4, &caps, &allocator).unwrap();

        assert!(matches!(outcome, GreedyOutcome::NoMceFound));
    }

    #[test]
    fn no_valid_winograd_block_config_requests_the_direct_algorithm() {
        // A tensor too large for SRAM (so no strategy can possibly fit, the
        // way `choose.rs`'s own "vastly exceeds SRAM" test forces failure)
        // combined with an accumulator budget too small for any block
        // config, so `valid_block_configs` is empty regardless of strategy.
        let shape = TensorShape::new(1, 1024, 1024, 1024);
        let mut mce = small_mce(shape);
        mce.algorithm = ConvAlgorithm::Winograd;
        let mut graph = Graph::new();
        let mce_id = graph
            .add_node(NodeKind::Mce(mce), shape, shape, DataFormat::Nhwcb, vec![])
            .unwrap();

        let mut caps = HardwareCapabilities::reference();
        caps.total_sram_bytes = 64;
        caps.total_accumulators_per_og = 32; // smaller than every block config's area
        let allocator = SramAllocator::new(caps.sram_bytes_per_bank());
        let outcome = create_greedily(&graph, mce_id, &[Strategy::S3], 1, 1, 3, 4, &caps, &allocator).unwrap();

        assert_eq!(
            outcome,
            GreedyOutcome::NoPass(Some(FixGraphHint::RequireDirectAlgorithm { node: mce_id }))
        );
    }

    #[test]
    fn winograd_block_config_failure_wins_over_a_fused_maxpool_3x3_hint() {
        use crate::graph::PleNode;
        use crate::types::PleOperation;

        let shape = TensorShape::new(1, 1024, 1024, 1024);
        let mut mce = small_mce(shape);
        mce.algorithm = ConvAlgorithm::Winograd;
        let mut graph = Graph::new();
        let mce_id = graph
            .add_node(NodeKind::Mce(mce), shape, shape, DataFormat::Nhwcb, vec![])
            .unwrap();
        let ple = PleNode {
            op: PleOperation::MaxPool3x3_2_2Even,
            shape_multiplier: ShapeMultiplier::identity(),
        };
        graph
            .add_node(NodeKind::FuseOnlyPle(ple), shape, shape, DataFormat::Nhwcb, vec![mce_id])
            .unwrap();

        let mut caps = HardwareCapabilities::reference();
        caps.total_sram_bytes = 64;
        caps.total_accumulators_per_og = 32; // smaller than every block config's area
        let allocator = SramAllocator::new(caps.sram_bytes_per_bank());
        let outcome = create_greedily(&graph, mce_id, &[Strategy::S3], 1, 1, 3, 4, &caps, &allocator).unwrap();

        assert_eq!(
            outcome,
            GreedyOutcome::NoPass(Some(FixGraphHint::RequireDirectAlgorithm { node: mce_id }))
        );
    }
}
