//! Strategy 1: split C only. See spec.md §4.4.

use crate::errors::PassResult;
use crate::sram::SramAllocator;
use crate::stripe::strategies::{first_feasible, StrategyMatch};
use crate::stripe::try_stripe::{RequestedStripeShape, StripeContext};
use crate::types::Strategy;

/// `output_C / k` for `k = 2 ..= output_C`, biggest stripe (smallest `k`)
/// first.
pub fn channel_candidates(ctx: &StripeContext) -> Vec<RequestedStripeShape> {
    let out = ctx.output_tensor_shape;
    let mut seen = std::collections::BTreeSet::new();
    let mut candidates = Vec::new();
    for k in 2..=out.c.max(2) {
        let channels = (out.c / k).max(1);
        if seen.insert(channels) {
            candidates.push(RequestedStripeShape {
                height: out.h,
                width: out.w,
                channels,
            });
        }
        if channels == 1 {
            break;
        }
    }
    candidates
}

pub fn try_strategy(ctx: &StripeContext, allocator: &SramAllocator) -> PassResult<Option<StrategyMatch>> {
    let candidates = channel_candidates(ctx);
    for &slots in &[3u32, 2u32, 1u32] {
        let mut attempt_ctx = ctx.clone();
        attempt_ctx.weight_slot_override = Some(slots);
        if let Some(found) = first_feasible(&attempt_ctx, allocator, Strategy::S1, candidates.clone())? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}
