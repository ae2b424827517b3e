//! The per-strategy candidate generators. See spec.md §4.4/§4.5.

pub mod s0;
pub mod s1;
pub mod s3;
pub mod s4;
pub mod s6;
pub mod s7;
pub mod strategy_x;

use crate::errors::PassResult;
use crate::sram::SramAllocator;
use crate::stripe::block_config::sort_block_configs;
use crate::stripe::config::StrategyConfig;
use crate::stripe::try_stripe::{try_stripe_shapes, RequestedStripeShape, StripeContext, StripeOutcome, StripeStats};
use crate::types::{BlockConfig, Strategy, TensorShape};

/// One feasible strategy result: the chosen SRAM layout, the allocator
/// state after committing it, and the cost stats used by strategy 6.
#[derive(Debug, Clone)]
pub struct StrategyMatch {
    pub config: StrategyConfig,
    pub allocator: SramAllocator,
    pub stats: StripeStats,
}

/// Tries each candidate output-stripe shape against each sorted block
/// config (most efficient first) and returns the first feasible match.
/// Strategies 0/1/3/4/7 all reduce to this; strategy 6 instead collects
/// every feasible match and picks the cheapest (see `s6`).
pub(super) fn first_feasible(
    ctx: &StripeContext,
    allocator: &SramAllocator,
    strategy: Strategy,
    candidates: impl IntoIterator<Item = RequestedStripeShape>,
) -> PassResult<Option<StrategyMatch>> {
    let weights_shape = TensorShape::new(0, ctx.kernel_height(), ctx.kernel_width(), 0);
    let blocks = sort_block_configs(ctx.output_tensor_shape.h, ctx.output_tensor_shape.w, weights_shape);
    for candidate in candidates {
        for &block in &blocks {
            if let Some(m) = try_one(ctx, allocator, candidate, block, strategy)? {
                return Ok(Some(m));
            }
        }
    }
    Ok(None)
}

/// Same as [`first_feasible`] but with a caller-supplied, already-sorted
/// block-config list (strategy 4 promotes a preferred width first).
pub(super) fn first_feasible_with_blocks(
    ctx: &StripeContext,
    allocator: &SramAllocator,
    strategy: Strategy,
    candidates: impl IntoIterator<Item = RequestedStripeShape>,
    blocks: &[BlockConfig],
) -> PassResult<Option<StrategyMatch>> {
    for candidate in candidates {
        for &block in blocks {
            if let Some(m) = try_one(ctx, allocator, candidate, block, strategy)? {
                return Ok(Some(m));
            }
        }
    }
    Ok(None)
}

fn try_one(
    ctx: &StripeContext,
    allocator: &SramAllocator,
    candidate: RequestedStripeShape,
    block: BlockConfig,
    strategy: Strategy,
) -> PassResult<Option<StrategyMatch>> {
    match try_stripe_shapes(ctx, candidate, block, strategy, allocator)? {
        StripeOutcome::Accepted { config, allocator, stats } => Ok(Some(StrategyMatch { config, allocator, stats })),
        StripeOutcome::Rejected(_) => Ok(None),
    }
}

/// Same as [`first_feasible`], but for strategies whose candidate stripe
/// shapes are themselves a function of the block config under trial (the
/// height/width step is the block's own height/width, not a fixed
/// brick-group size) — strategies 0, 6, and 7 need this since block config
/// must be known before the candidate list can even be built.
pub(super) fn first_feasible_per_block(
    ctx: &StripeContext,
    allocator: &SramAllocator,
    strategy: Strategy,
    mut candidates_for_block: impl FnMut(BlockConfig) -> Vec<RequestedStripeShape>,
) -> PassResult<Option<StrategyMatch>> {
    let weights_shape = TensorShape::new(0, ctx.kernel_height(), ctx.kernel_width(), 0);
    let blocks = sort_block_configs(ctx.output_tensor_shape.h, ctx.output_tensor_shape.w, weights_shape);
    for &block in &blocks {
        for candidate in candidates_for_block(block) {
            if let Some(m) = try_one(ctx, allocator, candidate, block, strategy)? {
                return Ok(Some(m));
            }
        }
    }
    Ok(None)
}

/// Same as [`first_feasible_per_block`] but collects every feasible match
/// instead of stopping at the first — strategy 6 picks the cheapest
/// afterwards.
pub(super) fn all_feasible_per_block(
    ctx: &StripeContext,
    allocator: &SramAllocator,
    strategy: Strategy,
    mut candidates_for_block: impl FnMut(BlockConfig) -> Vec<RequestedStripeShape>,
) -> PassResult<Vec<StrategyMatch>> {
    let weights_shape = TensorShape::new(0, ctx.kernel_height(), ctx.kernel_width(), 0);
    let blocks = sort_block_configs(ctx.output_tensor_shape.h, ctx.output_tensor_shape.w, weights_shape);
    let mut matches = Vec::new();
    for &block in &blocks {
        for candidate in candidates_for_block(block) {
            if let Some(m) = try_one(ctx, allocator, candidate, block, strategy)? {
                matches.push(m);
            }
        }
    }
    Ok(matches)
}
