//! `TryStripeShapes`: the rounding + tile-sizing + SRAM-fit oracle every
//! strategy calls once per candidate output-stripe shape. See spec.md §4.3.

use serde::{Deserialize, Serialize};

use crate::errors::{PassError, PassResult};
use crate::sram::{fits_in_sram, SramAllocator};
use crate::stripe::config::{SramTensorAllocation, StrategyConfig};
use crate::stripe::rounding::{account_for_full_dimension, div_fraction_ceil, div_round_up, mul_fraction_ceil, round_up_to_multiple};
use crate::types::{BlockConfig, DataFormat, HardwareCapabilities, MceOperationKind, ShapeMultiplier, Strategy, TensorShape, UpsampleType};

/// Everything `try_stripe_shapes` needs about the enclosing MCE/PLE pair
/// that isn't part of the candidate stripe shape itself.
#[derive(Debug, Clone)]
pub struct StripeContext {
    pub capabilities: HardwareCapabilities,
    pub input_tensor_shape: TensorShape,
    pub output_tensor_shape: TensorShape,
    pub weights_format: DataFormat,
    /// Already-rounded per the chosen conv algorithm (Direct/Winograd).
    pub weights_kernel_shape: TensorShape,
    pub mce_shape_multiplier: ShapeMultiplier,
    pub ple_shape_multiplier: ShapeMultiplier,
    pub stride_height: u32,
    pub stride_width: u32,
    pub mce_op: MceOperationKind,
    pub upsample: UpsampleType,
    /// The HWIM weight tensor's own channel-multiplier dimension; ignored
    /// when `weights_format` is `Hwio`.
    pub weights_channel_multiplier: u32,
    /// PLE spill constraint threaded in by the caller (e.g. MaxPool3x3);
    /// `u32::MAX` when unconstrained.
    pub depth_max: u32,
    pub max_weight_tile_slots: u32,
    pub max_input_tile_slots: u32,
    /// `Some(offset)` when the input is pre-loaded/static in SRAM already.
    pub input_static_offset: Option<u32>,
    pub activation_bytes: u32,
    pub weight_bytes: u32,
    /// Strategies 0/1/4 try a fixed sequence of slot counts (e.g. 4 then
    /// 3) rather than the formula-derived default; `None` uses the
    /// formula.
    pub input_slot_override: Option<u32>,
    pub weight_slot_override: Option<u32>,
    /// Whether the output tensor can be FCAF-compressed; halves strategy
    /// 6's bandwidth cost metric when true.
    pub output_fcaf_compressible: bool,
}

impl StripeContext {
    pub fn combined_shape_multiplier(&self) -> ShapeMultiplier {
        self.mce_shape_multiplier.compose(&self.ple_shape_multiplier)
    }

    fn brick_group(&self) -> TensorShape {
        self.capabilities.brick_group_shape
    }

    /// `weights_kernel_shape` repurposes `TensorShape`'s `n`/`h` fields to
    /// hold the kernel height/width (its `w`/`c` fields hold input/output
    /// channel counts instead); these accessors keep that convention in
    /// one place.
    pub fn kernel_height(&self) -> u32 {
        self.weights_kernel_shape.n
    }

    pub fn kernel_width(&self) -> u32 {
        self.weights_kernel_shape.h
    }
}

/// A requested (unrounded) output-stripe shape, as generated by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedStripeShape {
    pub height: u32,
    pub width: u32,
    pub channels: u32,
}

/// Why a candidate stripe shape was rejected. Rejections are recoverable:
/// the caller tries the next candidate. Not to be confused with
/// `PassError`, which is reserved for fatal, non-recoverable conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    TooManyInputSlots,
    StripeCountMismatch,
    BoundarySlotTooSmall,
    DoesNotFitInSram,
}

/// Transfer-size bookkeeping used by strategy 6's cost tiebreaker and
/// available to any caller that wants to compare candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeStats {
    /// Total bytes of IFM that must be streamed in over the whole pass.
    pub ifm_bandwidth_bytes: u64,
    /// Bytes that can be transferred in parallel with compute (double
    /// buffering the smaller of input/output).
    pub dma_bytes_parallel: u64,
    pub dma_bytes_sequential: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StripeOutcome {
    Accepted {
        config: StrategyConfig,
        allocator: SramAllocator,
        stats: StripeStats,
    },
    Rejected(RejectReason),
}

fn stripe_bytes(shape: TensorShape, bytes_per_element: u32) -> u32 {
    (shape.total_bytes(bytes_per_element)) as u32
}

/// Runs one candidate output-stripe shape through rounding, input-stripe
/// derivation, boundary-slot promotion, tile sizing and `FitsInSram`.
#[tracing::instrument(skip(ctx, allocator), level = "debug")]
pub fn try_stripe_shapes(
    ctx: &StripeContext,
    requested: RequestedStripeShape,
    block: BlockConfig,
    strategy: Strategy,
    allocator: &SramAllocator,
) -> PassResult<StripeOutcome> {
    let bg = ctx.brick_group();
    let multiplier = ctx.combined_shape_multiplier();
    let out_tensor = ctx.output_tensor_shape;
    let in_tensor = ctx.input_tensor_shape;

    // --- Output stripe rounding (§4.3 "Rounding rules — output stripe") ---
    let out_w = if requested.width == ctx.capabilities.patch_shape.w {
        ctx.capabilities.patch_shape.w
    } else {
        let granularity = bg.w.max(mul_fraction_ceil(bg.w, multiplier.w));
        let rounded = round_up_to_multiple(requested.width, granularity);
        rounded.min(round_up_to_multiple(out_tensor.w, bg.w))
    };

    let out_h = {
        let granularity = bg.h.max(mul_fraction_ceil(bg.h, multiplier.h));
        let rounded = round_up_to_multiple(requested.height, granularity);
        rounded.min(round_up_to_multiple(out_tensor.h, bg.h))
    };

    let is_split_c = requested.channels < out_tensor.c;
    let is_split_h = out_h < round_up_to_multiple(out_tensor.h, bg.h);
    let out_c = {
        let coarse_threshold = mul_fraction_ceil(bg.c, multiplier.c);
        let granularity = if is_split_c && requested.channels > coarse_threshold {
            coarse_threshold
        } else {
            mul_fraction_ceil(ctx.capabilities.num_srams, multiplier.c)
        };
        let mut rounded = round_up_to_multiple(requested.channels, granularity).min(out_tensor.c);
        if is_split_h {
            rounded = rounded.min(ctx.depth_max);
        }
        rounded
    };

    // --- Derive input stripe from output stripe (§4.3) ---
    let input_stripe_h = round_up_to_multiple(
        account_for_full_dimension(out_tensor.h, in_tensor.h, out_h, multiplier.h),
        bg.h,
    );
    let input_stripe_w = round_up_to_multiple(
        account_for_full_dimension(out_tensor.w, in_tensor.w, out_w, multiplier.w),
        bg.w,
    );
    let input_stripe_c = round_up_to_multiple(in_tensor.c, ctx.capabilities.num_srams);

    let streaming_h = out_h < round_up_to_multiple(out_tensor.h, bg.h);
    let streaming_w = out_w < round_up_to_multiple(out_tensor.w, bg.w);

    // --- Boundary-slot promotion (§4.3) ---
    let kernel_h = ctx.weights_kernel_shape.n; // H,W,InC,OutC — see stripe shape derivation below
    let kernel_w = ctx.weights_kernel_shape.h;
    let (use_boundary_h, ok_h) = check_boundary(
        streaming_h,
        streaming_w,
        kernel_h,
        input_stripe_h,
        ctx.capabilities.boundary_stripe_height,
    );
    if !ok_h {
        return Ok(StripeOutcome::Rejected(RejectReason::BoundarySlotTooSmall));
    }
    let (use_boundary_w, ok_w) = check_boundary(
        streaming_w,
        streaming_h,
        kernel_w,
        input_stripe_w,
        ctx.capabilities.boundary_stripe_height,
    );
    if !ok_w {
        return Ok(StripeOutcome::Rejected(RejectReason::BoundarySlotTooSmall));
    }
    let use_boundary_slots = use_boundary_h || use_boundary_w;

    // --- Feasibility rejections ---
    let num_input_stripes_h = div_round_up(in_tensor.h, input_stripe_h);
    let num_input_stripes_w = div_round_up(in_tensor.w, input_stripe_w);
    let num_output_stripes_h = div_round_up(round_up_to_multiple(out_tensor.h, bg.h), out_h);
    let num_output_stripes_w = div_round_up(round_up_to_multiple(out_tensor.w, bg.w), out_w);
    let num_output_stripes_c = div_round_up(out_tensor.c, out_c);

    // TODO: preserved verbatim from the original firmware stripe-streamer
    // check — noted upstream as possibly overly permissive. Do not
    // "simplify" this without re-deriving it from the firmware streamer.
    if num_output_stripes_h > 1 && num_input_stripes_w != num_output_stripes_w {
        return Ok(StripeOutcome::Rejected(RejectReason::StripeCountMismatch));
    }
    if num_input_stripes_h < num_output_stripes_h {
        return Ok(StripeOutcome::Rejected(RejectReason::StripeCountMismatch));
    }

    // --- Tile sizing (§4.3) ---
    let total_input_stripes = num_input_stripes_h * num_input_stripes_w;
    // The original picks the kernel dimension matching whichever axis the
    // input is actually streamed on (width split -> kernel W, else kernel
    // H), not the larger of the two.
    let kernel_primary_dim = if in_tensor.w > input_stripe_w { kernel_w } else { kernel_h };
    let mut input_slots = if let Some(slots) = ctx.input_slot_override {
        slots.min(total_input_stripes)
    } else if ctx.input_static_offset.is_some() {
        total_input_stripes
    } else {
        (kernel_primary_dim.min(3) + 1)
            .min(ctx.max_input_tile_slots)
            .min(total_input_stripes)
    };
    if use_boundary_slots {
        input_slots += ctx.capabilities.num_boundary_slots;
    }
    if input_slots > ctx.capabilities.num_central_slots {
        return Ok(StripeOutcome::Rejected(RejectReason::TooManyInputSlots));
    }

    let total_weight_stripes = num_output_stripes_c;
    if ctx.max_weight_tile_slots == 0 {
        return Err(PassError::IllegalConfig(
            "max_weight_tile_slots is zero; weight tile cannot hold any stripes".into(),
        ));
    }
    let weight_slots = ctx
        .weight_slot_override
        .unwrap_or(ctx.max_weight_tile_slots)
        .min(total_weight_stripes);

    let total_output_stripes = num_output_stripes_h * num_output_stripes_w * num_output_stripes_c;
    let output_slots = 2u32.min(total_output_stripes).max(1);

    // --- Weight stripe shape derivation (§4.3) ---
    let out_c_per_multiplier = div_fraction_ceil(out_c, multiplier.c);
    let weight_stripe_shape = match ctx.weights_format {
        DataFormat::Hwio => TensorShape::new(
            ctx.weights_kernel_shape.n,
            ctx.weights_kernel_shape.h,
            in_tensor.c,
            out_c_per_multiplier,
        ),
        DataFormat::Hwim => {
            let stride_size = div_round_up(
                round_up_to_multiple(in_tensor.c, ctx.capabilities.num_srams),
                round_up_to_multiple(ctx.weights_kernel_shape.w, ctx.capabilities.num_srams),
            );
            TensorShape::new(
                ctx.weights_kernel_shape.n,
                ctx.weights_kernel_shape.h,
                out_c_per_multiplier * stride_size,
                ctx.weights_channel_multiplier,
            )
        }
        other => {
            return Err(PassError::IllegalConfig(format!(
                "weights_format must be HWIO or HWIM, found {other:?}"
            )))
        }
    };

    let input_stripe_shape = TensorShape::new(1, input_stripe_h, input_stripe_w, input_stripe_c);
    let output_stripe_shape = TensorShape::new(1, out_h, out_w, out_c);

    let input_tile_bytes_total = input_slots * stripe_bytes(input_stripe_shape, ctx.activation_bytes);
    let weight_tile_bytes_total = weight_slots * stripe_bytes(weight_stripe_shape, ctx.weight_bytes);
    let output_tile_bytes_total = output_slots * stripe_bytes(output_stripe_shape, ctx.activation_bytes);

    // --- Placement ---
    let mut attempt_allocator = allocator.clone();
    let placement = fits_in_sram(
        &mut attempt_allocator,
        &ctx.capabilities,
        input_tile_bytes_total,
        weight_tile_bytes_total,
        output_tile_bytes_total,
        ctx.input_static_offset,
    );
    if !placement.success {
        return Ok(StripeOutcome::Rejected(RejectReason::DoesNotFitInSram));
    }

    let num_srams = ctx.capabilities.num_srams;
    let config = StrategyConfig {
        input: SramTensorAllocation {
            stripe_shape: input_stripe_shape,
            tile_size_bytes: input_tile_bytes_total / num_srams,
            num_stripes_in_tile: input_slots,
            offset_bytes: placement.input_offset,
        },
        output: SramTensorAllocation {
            stripe_shape: output_stripe_shape,
            tile_size_bytes: output_tile_bytes_total / num_srams,
            num_stripes_in_tile: output_slots,
            offset_bytes: placement.output_offset,
        },
        weights: SramTensorAllocation {
            stripe_shape: weight_stripe_shape,
            tile_size_bytes: weight_tile_bytes_total / num_srams,
            num_stripes_in_tile: weight_slots,
            offset_bytes: placement.weight_offset,
        },
        ple: SramTensorAllocation {
            stripe_shape: TensorShape::new(0, 0, 0, 0),
            tile_size_bytes: ctx.capabilities.max_ple_size,
            num_stripes_in_tile: 1,
            offset_bytes: placement.ple_offset,
        },
        block_width: block.width,
        block_height: block.height,
        strategy,
    };

    let ifm_bandwidth_bytes = total_input_stripes as u64 * stripe_bytes(input_stripe_shape, ctx.activation_bytes) as u64;
    let dma_bytes_parallel = (input_tile_bytes_total.min(output_tile_bytes_total)) as u64;
    let dma_bytes_sequential =
        (input_tile_bytes_total as u64 + weight_tile_bytes_total as u64 + output_tile_bytes_total as u64)
            .saturating_sub(dma_bytes_parallel);

    Ok(StripeOutcome::Accepted {
        config,
        allocator: attempt_allocator,
        stats: StripeStats {
            ifm_bandwidth_bytes,
            dma_bytes_parallel,
            dma_bytes_sequential,
        },
    })
}

/// `check_boundary` encodes: if streaming in both this axis and the other
/// with a >1 kernel, the slot height is the hardware boundary-stripe
/// height and `2 * boundary_height >= kernel - 1` must hold; if streaming
/// in this axis alone, `2 * stripe_dim >= kernel - 1` must hold instead.
/// Returns `(uses_boundary_slots_for_this_axis, ok)`.
fn check_boundary(streaming_this: bool, streaming_other: bool, kernel: u32, stripe_dim: u32, boundary_height: u32) -> (bool, bool) {
    if kernel <= 1 {
        return (false, true);
    }
    if streaming_this && streaming_other {
        (true, 2 * boundary_height >= kernel - 1)
    } else if streaming_this {
        (false, 2 * stripe_dim >= kernel - 1)
    } else {
        (false, true)
    }
}
