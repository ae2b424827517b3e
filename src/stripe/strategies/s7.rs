//! Strategy 7: split H and C, depthwise only. See spec.md §4.4.

use crate::errors::PassResult;
use crate::sram::SramAllocator;
use crate::stripe::strategies::s0;
use crate::stripe::strategies::{first_feasible_per_block, StrategyMatch};
use crate::stripe::try_stripe::{RequestedStripeShape, StripeContext};
use crate::types::{DataFormat, Strategy};

pub fn try_strategy(ctx: &StripeContext, allocator: &SramAllocator) -> PassResult<Option<StrategyMatch>> {
    if ctx.weights_format != DataFormat::Hwim || ctx.input_static_offset.is_some() {
        return Ok(None);
    }

    let out = ctx.output_tensor_shape;
    first_feasible_per_block(ctx, allocator, Strategy::S7, |block| {
        let heights = s0::height_candidates(ctx, block);
        let mut k = 2u32;
        let mut channel_steps = Vec::new();
        while k <= out.c.max(2) {
            let channels = (out.c / k).max(1);
            channel_steps.push(channels);
            if channels == 1 {
                break;
            }
            k += 1;
        }

        let mut candidates = Vec::new();
        for h in &heights {
            for &channels in &channel_steps {
                candidates.push(RequestedStripeShape {
                    height: h.height,
                    width: out.w,
                    channels,
                });
            }
        }
        candidates
    })
}
