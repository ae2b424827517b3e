//! Strategy 3: no splitting at all — the whole output tensor lives in SRAM
//! at once. See spec.md §4.4.

use crate::errors::PassResult;
use crate::sram::SramAllocator;
use crate::stripe::strategies::{first_feasible, StrategyMatch};
use crate::stripe::try_stripe::{RequestedStripeShape, StripeContext};
use crate::types::Strategy;

pub fn try_strategy(ctx: &StripeContext, allocator: &SramAllocator) -> PassResult<Option<StrategyMatch>> {
    let out = ctx.output_tensor_shape;
    let candidate = RequestedStripeShape {
        height: out.h,
        width: out.w,
        channels: out.c,
    };
    first_feasible(ctx, allocator, Strategy::S3, [candidate])
}
