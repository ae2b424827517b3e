//! `FindLinearWorkingNodes`: the greedy pass builder. Walks a linear chain
//! of nodes one at a time, re-running strategy selection after each
//! tentative addition, and remembers the last point at which selection
//! succeeded. See spec.md §4.8.

use serde::{Deserialize, Serialize};

use crate::errors::{PassError, PassResult};
use crate::graph::{Graph, NodeId, NodeKind};
use crate::sram::SramAllocator;
use crate::stripe::choose::{choose_and_setup_strategy, ChooseOutcome};
use crate::stripe::config::StrategyConfig;
use crate::stripe::try_stripe::StripeContext;
use crate::types::{BlockConfig, BufferLocation, ConvAlgorithm, DataFormat, HardwareCapabilities, ShapeMultiplier, Strategy, ALL_BLOCK_CONFIGS};

/// Result of walking one candidate chain. Mirrors the `LinearWorkingNodes`
/// strategy-selection-result struct in spec.md §3; `strategy_config` is
/// `Option` here rather than a sentinel-valued struct, matching this
/// codebase's preference for explicit optionality over default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearWorkingNodesResult {
    pub working_nodes: Vec<NodeId>,
    pub mce_op: Option<NodeId>,
    pub fuse_ple: Option<NodeId>,
    pub strategy_selected: bool,
    pub strategy_config: Option<StrategyConfig>,
    pub required_output_format: Option<DataFormat>,
    pub output_location: BufferLocation,
    pub sram_allocator_after: SramAllocator,
    pub algorithm: Option<ConvAlgorithm>,
    pub valid_block_configs: Vec<BlockConfig>,
}

struct BestAttempt {
    working_nodes: Vec<NodeId>,
    mce_op: NodeId,
    fuse_ple: Option<NodeId>,
    strategy_config: StrategyConfig,
    required_output_format: Option<DataFormat>,
    output_location: BufferLocation,
    allocator_after: SramAllocator,
    algorithm: ConvAlgorithm,
    valid_block_configs: Vec<BlockConfig>,
}

/// Walks `chain` (already in topological, single-path order — see
/// `Graph::linear_chain_from`) applying spec.md §4.8's acceptance rules,
/// re-running strategy selection after each accepted node. Returns the
/// state at the *last* point strategy selection succeeded; a later
/// extension failing does not discard that success (greedy extension may
/// succeed for N nodes but fail at N+1, in which case the N-node pass is
/// the right answer).
///
/// `activation_bytes`/`weight_bytes`/`max_weight_tile_slots`/
/// `max_input_tile_slots` are precision- and buffering-derived constants
/// the driver supplies per compilation; they are not properties of any one
/// node.
#[allow(clippy::too_many_arguments)]
#[tracing::instrument(skip(graph, chain, preference_order, allocator), fields(chain_len = chain.len()))]
pub fn find_linear_working_nodes(
    graph: &Graph,
    chain: &[NodeId],
    preference_order: &[Strategy],
    activation_bytes: u32,
    weight_bytes: u32,
    max_weight_tile_slots: u32,
    max_input_tile_slots: u32,
    capabilities: &HardwareCapabilities,
    allocator: &SramAllocator,
) -> PassResult<LinearWorkingNodesResult> {
    let mut has_pre_conversion = false;
    let mut has_mce = false;
    let mut has_post_process = false;
    let mut has_fuse_ple = false;
    let mut has_post_conversions = false;
    let mut has_requantizes = false;

    let mut working: Vec<NodeId> = Vec::new();
    let mut mce_node_id: Option<NodeId> = None;
    let mut fuse_ple_id: Option<NodeId> = None;
    let mut algorithm: Option<ConvAlgorithm> = None;
    let mut valid_block_configs: Vec<BlockConfig> = Vec::new();
    let mut required_output_format_so_far: Option<DataFormat> = None;
    let mut best: Option<BestAttempt> = None;

    for &id in chain {
        let node = graph
            .get(id)
            .ok_or_else(|| PassError::IllegalConfig(format!("chain references missing node {}", id.0)))?;

        let accepted = match &node.kind {
            NodeKind::FormatConversion if !has_mce && !has_pre_conversion => {
                has_pre_conversion = true;
                true
            }
            NodeKind::ExtractSubtensor if !has_mce && !has_pre_conversion => {
                has_pre_conversion = true;
                true
            }
            NodeKind::Mce(_) if !has_mce => {
                has_mce = true;
                true
            }
            NodeKind::McePostProcess
                if has_mce && !has_post_process && !has_fuse_ple && !has_post_conversions && !has_requantizes =>
            {
                has_post_process = true;
                true
            }
            NodeKind::FuseOnlyPle(ple)
                if has_mce && !has_fuse_ple && (!has_requantizes || ple.op.is_agnostic_to_requantisation()) =>
            {
                has_fuse_ple = true;
                true
            }
            NodeKind::Requantize if has_mce => {
                has_requantizes = true;
                true
            }
            // Post-MCE format conversion: only if it lands on the format the
            // currently-selected strategy requires.
            NodeKind::FormatConversion if has_mce => match required_output_format_so_far {
                Some(required) => node.format == required,
                None => true,
            },
            NodeKind::Copy if has_mce => true,
            _ => false,
        };

        if !accepted {
            break;
        }

        working.push(id);
        if let NodeKind::Mce(mce) = &node.kind {
            mce_node_id = Some(id);
            algorithm = Some(mce.algorithm);
        }
        if let NodeKind::FuseOnlyPle(_) = &node.kind {
            fuse_ple_id = Some(id);
        }
        if matches!(node.kind, NodeKind::FormatConversion) && mce_node_id.is_some() {
            has_post_conversions = true;
        }

        let mce_id = match mce_node_id {
            Some(id) => id,
            None => continue,
        };

        let mce_node = graph.get(mce_id).expect("mce_node_id always refers to a pushed node");
        let mce = match &mce_node.kind {
            NodeKind::Mce(m) => m,
            _ => unreachable!("mce_node_id only ever points at an Mce node"),
        };
        let first = graph.get(working[0]).expect("working[0] always refers to a pushed node");
        let last = graph
            .get(*working.last().expect("working is non-empty once mce_node_id is set"))
            .expect("working entries always refer to pushed nodes");

        let fuse_ple_node = fuse_ple_id.and_then(|pid| graph.get(pid));
        let ple_multiplier = fuse_ple_node
            .map(|n| match &n.kind {
                NodeKind::FuseOnlyPle(p) => p.shape_multiplier,
                _ => ShapeMultiplier::identity(),
            })
            .unwrap_or_else(ShapeMultiplier::identity);

        // MaxPool-3x3 imposes a stripe-depth cap threaded into `depth_max`
        // (spec.md §4.8): num_srams for depthwise MCEs, num_ogs otherwise.
        let depth_max = match fuse_ple_node.map(|n| &n.kind) {
            Some(NodeKind::FuseOnlyPle(p)) if p.op.is_maxpool_3x3() => {
                if mce.op.is_depthwise() {
                    capabilities.num_srams
                } else {
                    capabilities.num_ogs
                }
            }
            _ => u32::MAX,
        };

        // Winograd's accumulator layout only supports small blocks; the
        // exact compatible set lives in the firmware's block-config
        // estimator and was not re-derived here — this is a conservative
        // approximation (see DESIGN.md).
        valid_block_configs = ALL_BLOCK_CONFIGS
            .into_iter()
            .filter(|b| b.width * b.height <= capabilities.total_accumulators_per_og)
            .filter(|b| mce.algorithm != ConvAlgorithm::Winograd || (b.width <= 8 && b.height <= 8))
            .collect();

        let ctx = StripeContext {
            capabilities: *capabilities,
            input_tensor_shape: first.input_shape,
            output_tensor_shape: last.output_shape,
            weights_format: mce.weights_format,
            weights_kernel_shape: mce.kernel_shape,
            mce_shape_multiplier: mce.shape_multiplier,
            ple_shape_multiplier: ple_multiplier,
            stride_height: mce.stride_height,
            stride_width: mce.stride_width,
            mce_op: mce.op,
            upsample: mce.upsample,
            weights_channel_multiplier: mce.weight_channel_multiplier,
            depth_max,
            max_weight_tile_slots,
            max_input_tile_slots,
            input_static_offset: if mce.is_static_input { Some(0) } else { None },
            activation_bytes,
            weight_bytes,
            input_slot_override: None,
            weight_slot_override: None,
            output_fcaf_compressible: last.format == DataFormat::Nhwcb,
        };

        match choose_and_setup_strategy(preference_order, mce.algorithm, &ctx, allocator)? {
            ChooseOutcome::Success { strategy_config, allocator_after } => {
                let full_c_covered = strategy_config.output.stripe_shape.c >= last.output_shape.c;
                let full_w_covered = strategy_config.output.stripe_shape.w >= last.output_shape.w;
                let required_output_format = if mce.op.is_fully_connected() {
                    Some(DataFormat::Nhwc)
                } else if !full_c_covered || !full_w_covered {
                    Some(DataFormat::Nhwcb)
                } else {
                    None
                };
                let output_location = if strategy_config.strategy == Strategy::S3 && last.format == DataFormat::Nhwcb && !last.force_dram {
                    BufferLocation::Sram
                } else {
                    BufferLocation::Dram
                };

                required_output_format_so_far = required_output_format;
                tracing::debug!(nodes = working.len(), strategy = ?strategy_config.strategy, "greedy extension accepted");
                best = Some(BestAttempt {
                    working_nodes: working.clone(),
                    mce_op: mce_id,
                    fuse_ple: fuse_ple_id,
                    strategy_config,
                    required_output_format,
                    output_location,
                    allocator_after,
                    algorithm: mce.algorithm,
                    valid_block_configs: valid_block_configs.clone(),
                });
            }
            ChooseOutcome::NoStrategyFits => {
                tracing::debug!(nodes = working.len(), "greedy extension failed strategy selection; keeping last success");
                // Chain composition keeps advancing past a failed fit: a
                // later node (e.g. a fused PLE) may still need to be seen
                // so `CreateGreedily` can classify *why* nothing fit.
                // `best` is left untouched, so a prior success still wins.
            }
        }
    }

    Ok(match best {
        Some(b) => LinearWorkingNodesResult {
            working_nodes: b.working_nodes,
            mce_op: Some(b.mce_op),
            fuse_ple: b.fuse_ple,
            strategy_selected: true,
            strategy_config: Some(b.strategy_config),
            required_output_format: b.required_output_format,
            output_location: b.output_location,
            sram_allocator_after: b.allocator_after,
            algorithm: Some(b.algorithm),
            valid_block_configs: b.valid_block_configs,
        },
        None => LinearWorkingNodesResult {
            working_nodes: Vec::new(),
            mce_op: mce_node_id,
            fuse_ple: fuse_ple_id,
            strategy_selected: false,
            strategy_config: None,
            required_output_format: None,
            output_location: BufferLocation::None,
            sram_allocator_after: allocator.clone(),
            algorithm,
            valid_block_configs,
        },
    })
}
