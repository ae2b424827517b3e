//! Strategy 0: split H only. See spec.md §4.4.

use crate::errors::PassResult;
use crate::sram::SramAllocator;
use crate::stripe::rounding::round_up_to_multiple;
use crate::stripe::strategies::{first_feasible_per_block, StrategyMatch};
use crate::stripe::try_stripe::{RequestedStripeShape, StripeContext};
use crate::types::{BlockConfig, Strategy};

/// `output_H/2` down to one block row, in steps of `block.height` (rounded
/// up), largest (most efficient) first. Empty if the block is too tall to
/// split the output at all (`StrategyX`/`ChooseAndSetupStrategy` then moves
/// on to the next block config).
pub fn height_candidates(ctx: &StripeContext, block: BlockConfig) -> Vec<RequestedStripeShape> {
    let out = ctx.output_tensor_shape;
    let step = block.height.max(1);
    let start = round_up_to_multiple(out.h / 2, step).max(step);
    if start >= out.h {
        return Vec::new();
    }
    let mut heights = Vec::new();
    let mut h = start;
    while h >= step {
        heights.push(h);
        if h == step {
            break;
        }
        h = h.saturating_sub(step).max(step);
        if heights.last() == Some(&h) {
            break;
        }
    }
    heights
        .into_iter()
        .map(|height| RequestedStripeShape {
            height,
            width: out.w,
            channels: out.c,
        })
        .collect()
}

pub fn try_strategy(ctx: &StripeContext, allocator: &SramAllocator) -> PassResult<Option<StrategyMatch>> {
    for &slots in &[4u32, 3u32] {
        let mut attempt_ctx = ctx.clone();
        attempt_ctx.input_slot_override = Some(slots);
        let found = first_feasible_per_block(&attempt_ctx, allocator, Strategy::S0, |block| {
            height_candidates(&attempt_ctx, block)
        })?;
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataFormat, HardwareCapabilities, MceOperationKind, ShapeMultiplier, TensorShape};

    fn ctx_for(shape: TensorShape) -> StripeContext {
        let caps = HardwareCapabilities::reference();
        StripeContext {
            capabilities: caps,
            input_tensor_shape: shape,
            output_tensor_shape: shape,
            weights_format: DataFormat::Hwio,
            weights_kernel_shape: TensorShape::new(1, 1, shape.c, shape.c),
            mce_shape_multiplier: ShapeMultiplier::identity(),
            ple_shape_multiplier: ShapeMultiplier::identity(),
            stride_height: 1,
            stride_width: 1,
            mce_op: MceOperationKind::Convolution,
            upsample: crate::types::UpsampleType::Off,
            weights_channel_multiplier: 1,
            depth_max: u32::MAX,
            max_weight_tile_slots: 3,
            max_input_tile_slots: 4,
            input_static_offset: None,
            activation_bytes: 1,
            weight_bytes: 1,
            input_slot_override: None,
            weight_slot_override: None,
            output_fcaf_compressible: false,
        }
    }

    #[test]
    fn height_candidates_descend_to_one_block_row() {
        let ctx = ctx_for(TensorShape::new(1, 64, 16, 16));
        let block = BlockConfig::new(16, 8);
        let candidates = height_candidates(&ctx, block);
        assert!(!candidates.is_empty());
        assert_eq!(candidates.last().unwrap().height, block.height);
        assert!(candidates[0].height >= candidates.last().unwrap().height);
    }

    #[test]
    fn height_candidates_are_empty_when_the_block_is_too_tall_to_split() {
        let ctx = ctx_for(TensorShape::new(1, 16, 16, 16));
        let block = BlockConfig::new(16, 16);
        assert!(height_candidates(&ctx, block).is_empty());
    }

    #[test]
    fn finds_a_feasible_split_on_a_tall_tensor() {
        let ctx = ctx_for(TensorShape::new(1, 64, 16, 16));
        let allocator = SramAllocator::new(ctx.capabilities.sram_bytes_per_bank());
        let result = try_strategy(&ctx, &allocator).unwrap();
        assert!(result.is_some());
    }
}
