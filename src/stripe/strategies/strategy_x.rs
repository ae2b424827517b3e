//! Strategy X: the fallback used for fully-connected ops or when no
//! strategy 0/1/3/4/6/7 candidate fits. See spec.md §4.5.

use crate::errors::PassResult;
use crate::sram::SramAllocator;
use crate::stripe::strategies::{first_feasible_with_blocks, StrategyMatch};
use crate::stripe::try_stripe::{RequestedStripeShape, StripeContext};
use crate::types::{BlockConfig, Strategy};

/// Weight-reload policy tried per candidate, innermost loop of the second
/// sub-scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadPolicy {
    NoReload,
    ReloadDoubleBuffer,
    ReloadNoDoubleBuffer,
}

/// Input-buffering policy tried per candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputBufferingPolicy {
    FullNoReload,
    DoubleBuffer,
    NoBuffer,
}

/// Activation-compression alignment requested for the output stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAlignment {
    None,
    Wide,
    Deep,
}

const RELOAD_POLICIES: [ReloadPolicy; 3] = [
    ReloadPolicy::NoReload,
    ReloadPolicy::ReloadDoubleBuffer,
    ReloadPolicy::ReloadNoDoubleBuffer,
];
const BUFFERING_POLICIES: [InputBufferingPolicy; 3] = [
    InputBufferingPolicy::FullNoReload,
    InputBufferingPolicy::DoubleBuffer,
    InputBufferingPolicy::NoBuffer,
];
const COMPRESSION_ALIGNMENTS: [CompressionAlignment; 3] =
    [CompressionAlignment::None, CompressionAlignment::Wide, CompressionAlignment::Deep];

fn block_configs_compatible(ctx: &StripeContext, block: BlockConfig) -> bool {
    if block.width * block.height > ctx.capabilities.total_accumulators_per_og {
        return false;
    }
    if ctx.mce_op.is_fully_connected() && !(block.width == 8 && block.height == 8) {
        return false;
    }
    true
}

fn apply_compression_alignment(shape: RequestedStripeShape, alignment: CompressionAlignment) -> RequestedStripeShape {
    match alignment {
        CompressionAlignment::None => shape,
        CompressionAlignment::Wide => RequestedStripeShape {
            height: round_to(shape.height, 8),
            width: round_to(shape.width, 8),
            channels: round_to(shape.channels, 16),
        },
        CompressionAlignment::Deep => RequestedStripeShape {
            height: round_to(shape.height, 8),
            width: round_to(shape.width, 8),
            channels: round_to(shape.channels, 32),
        },
    }
}

fn round_to(value: u32, multiple: u32) -> u32 {
    crate::stripe::rounding::round_up_to_multiple(value, multiple)
}

fn apply_buffering_policy(ctx: &StripeContext, policy: InputBufferingPolicy) -> StripeContext {
    let mut out = ctx.clone();
    out.input_slot_override = match policy {
        InputBufferingPolicy::FullNoReload => None,
        InputBufferingPolicy::DoubleBuffer => Some(2),
        InputBufferingPolicy::NoBuffer => Some(1),
    };
    if policy == InputBufferingPolicy::FullNoReload {
        out.input_static_offset = out.input_static_offset.or(Some(0));
    }
    out
}

fn apply_reload_policy(ctx: &StripeContext, policy: ReloadPolicy) -> StripeContext {
    let mut out = ctx.clone();
    out.weight_slot_override = Some(match policy {
        ReloadPolicy::NoReload => 1,
        ReloadPolicy::ReloadDoubleBuffer => 2,
        ReloadPolicy::ReloadNoDoubleBuffer => 1,
    });
    out
}

/// Sub-scheduler 1: `InputXY -> OutputXYZ`, fully-connected only. One
/// block, full-channel input, block-config-only search.
fn try_input_xy_to_output_xyz(ctx: &StripeContext, allocator: &SramAllocator) -> PassResult<Option<StrategyMatch>> {
    if !ctx.mce_op.is_fully_connected() {
        return Ok(None);
    }
    let out = ctx.output_tensor_shape;
    let candidate = RequestedStripeShape {
        height: out.h,
        width: out.w,
        channels: out.c,
    };
    let blocks: Vec<BlockConfig> = crate::types::ALL_BLOCK_CONFIGS
        .into_iter()
        .filter(|&b| block_configs_compatible(ctx, b))
        .collect();
    first_feasible_with_blocks(ctx, allocator, Strategy::Sx, [candidate], &blocks)
}

/// Sub-scheduler 2: `InputZXY -> OutputXYZ`, split input C and cross the
/// compression/reload/buffering policy space per candidate.
fn try_input_zxy_to_output_xyz(ctx: &StripeContext, allocator: &SramAllocator) -> PassResult<Option<StrategyMatch>> {
    let in_c = ctx.input_tensor_shape.c;
    let out = ctx.output_tensor_shape;

    let blocks: Vec<BlockConfig> = crate::types::ALL_BLOCK_CONFIGS
        .into_iter()
        .filter(|&b| block_configs_compatible(ctx, b))
        .filter(|&b| !ctx.upsample.is_active() || (b.width == 16 && b.height == 16))
        .collect();

    let mut split = 2u32;
    while split <= in_c.max(2) {
        let input_stripe_c = in_c / split;
        if input_stripe_c == 0 || input_stripe_c == in_c {
            split += 1;
            continue;
        }

        let base_candidate = RequestedStripeShape {
            height: out.h,
            width: out.w,
            channels: out.c,
        };

        for &alignment in &COMPRESSION_ALIGNMENTS {
            let candidate = apply_compression_alignment(base_candidate, alignment);
            for &reload in &RELOAD_POLICIES {
                for &buffering in &BUFFERING_POLICIES {
                    let mut attempt_ctx = apply_reload_policy(ctx, reload);
                    attempt_ctx = apply_buffering_policy(&attempt_ctx, buffering);
                    attempt_ctx.input_tensor_shape.c = input_stripe_c;
                    if let Some(found) = first_feasible_with_blocks(&attempt_ctx, allocator, Strategy::Sx, [candidate], &blocks)? {
                        return Ok(Some(found));
                    }
                }
            }
        }
        split += 1;
    }
    Ok(None)
}

/// Direct-algorithm-only: the caller (`ChooseAndSetupStrategy`) never
/// reaches StrategyX for a Winograd candidate — that case is rejected
/// earlier via `FixGraphAlgorithmHint::RequireDirect` (spec.md §4.7).
pub fn try_strategy(ctx: &StripeContext, allocator: &SramAllocator) -> PassResult<Option<StrategyMatch>> {
    if let Some(found) = try_input_xy_to_output_xyz(ctx, allocator)? {
        return Ok(Some(found));
    }
    try_input_zxy_to_output_xyz(ctx, allocator)
}
