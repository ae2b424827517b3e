//! Strategy 4: split one brick-group of W and one OG-group of C. See
//! spec.md §4.4.

use crate::errors::PassResult;
use crate::sram::SramAllocator;
use crate::stripe::block_config::{promote_matching_width, sort_block_configs};
use crate::stripe::rounding::mul_fraction_ceil;
use crate::stripe::strategies::{first_feasible_with_blocks, StrategyMatch};
use crate::stripe::try_stripe::{RequestedStripeShape, StripeContext};
use crate::types::{Strategy, TensorShape};

pub fn try_strategy(ctx: &StripeContext, allocator: &SramAllocator) -> PassResult<Option<StrategyMatch>> {
    let out = ctx.output_tensor_shape;
    let multiplier = ctx.combined_shape_multiplier();
    let fixed_w = mul_fraction_ceil(ctx.capabilities.brick_group_shape.w, multiplier.w);
    let fixed_c = mul_fraction_ceil(ctx.capabilities.num_ogs, multiplier.c);

    let candidate = RequestedStripeShape {
        height: out.h,
        width: fixed_w,
        channels: fixed_c,
    };

    let weights_shape = TensorShape::new(0, ctx.kernel_height(), ctx.kernel_width(), 0);
    let base_blocks = sort_block_configs(out.h, fixed_w, weights_shape);
    let blocks = promote_matching_width(base_blocks, fixed_w);

    for &slots in &[2u32, 1u32] {
        let mut attempt_ctx = ctx.clone();
        attempt_ctx.weight_slot_override = Some(slots);
        if let Some(found) = first_feasible_with_blocks(&attempt_ctx, allocator, Strategy::S4, [candidate], &blocks)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}
