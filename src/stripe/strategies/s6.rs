//! Strategy 6: split H, W, and C; keep the cheapest feasible candidate by
//! IFM bandwidth rather than the first. See spec.md §4.4.

use crate::errors::PassResult;
use crate::sram::SramAllocator;
use crate::stripe::rounding::round_up_to_multiple;
use crate::stripe::strategies::{all_feasible_per_block, StrategyMatch};
use crate::stripe::try_stripe::RequestedStripeShape;
use crate::stripe::try_stripe::StripeContext;
use crate::types::{BlockConfig, Strategy};

/// `dimension/2` down to one block row/column, in steps of `block`, largest
/// first. Empty if `block` is too large to split the dimension at all.
fn range_candidates(block: u32, dimension: u32) -> Vec<u32> {
    let step = block.max(1);
    let start = round_up_to_multiple(dimension / 2, step).max(step);
    if start >= dimension {
        return Vec::new();
    }
    let mut values = Vec::new();
    let mut v = start;
    while v >= step {
        values.push(v);
        if v == step {
            break;
        }
        v = v.saturating_sub(step).max(step);
        if values.last() == Some(&v) {
            break;
        }
    }
    values
}

pub fn try_strategy(ctx: &StripeContext, allocator: &SramAllocator) -> PassResult<Option<StrategyMatch>> {
    let out = ctx.output_tensor_shape;

    let mut channel_steps = Vec::new();
    let mut k = 1u32;
    loop {
        let channels = (out.c / k).max(1);
        channel_steps.push(channels);
        if channels == 1 {
            break;
        }
        k += 1;
    }

    let matches = all_feasible_per_block(ctx, allocator, Strategy::S6, |block: BlockConfig| {
        let heights = range_candidates(block.height, out.h);
        let widths = range_candidates(block.width, out.w);
        let mut candidates = Vec::new();
        for &h in &heights {
            for &w in &widths {
                for &c in &channel_steps {
                    candidates.push(RequestedStripeShape {
                        height: h,
                        width: w,
                        channels: c,
                    });
                }
            }
        }
        candidates
    })?;
    let divisor: u64 = if ctx.output_fcaf_compressible { 2 } else { 1 };
    let best = matches
        .into_iter()
        .min_by_key(|m| m.stats.ifm_bandwidth_bytes / divisor);
    Ok(best)
}
