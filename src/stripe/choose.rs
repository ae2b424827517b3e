//! `ChooseAndSetupStrategy`: try strategies in caller preference order,
//! first success wins. See spec.md §4.7.

use crate::errors::PassResult;
use crate::sram::SramAllocator;
use crate::stripe::strategies::{s0, s1, s3, s4, s6, s7, strategy_x, StrategyMatch};
use crate::stripe::try_stripe::StripeContext;
use crate::types::{ConvAlgorithm, MceOperationKind, Strategy};

/// Outcome of trying the whole caller-supplied strategy preference list.
#[derive(Debug, Clone)]
pub enum ChooseOutcome {
    Success { strategy_config: crate::stripe::config::StrategyConfig, allocator_after: SramAllocator },
    NoStrategyFits,
}

fn try_one(strategy: Strategy, ctx: &StripeContext, allocator: &SramAllocator) -> PassResult<Option<StrategyMatch>> {
    match strategy {
        Strategy::S0 => s0::try_strategy(ctx, allocator),
        Strategy::S1 => s1::try_strategy(ctx, allocator),
        Strategy::S3 => s3::try_strategy(ctx, allocator),
        Strategy::S4 => s4::try_strategy(ctx, allocator),
        Strategy::S6 => s6::try_strategy(ctx, allocator),
        Strategy::S7 => s7::try_strategy(ctx, allocator),
        Strategy::Sx => strategy_x::try_strategy(ctx, allocator),
        Strategy::None => Ok(None),
    }
}

/// Tries `preference_order` strategies in turn against `ctx`, returning
/// the first one that produces a feasible SRAM layout. Falls back to
/// StrategyX automatically (appended if absent and permitted) when the
/// MCE operation is fully-connected or uses the Direct algorithm — per
/// spec.md §4.5, StrategyX is only reachable for those cases.
#[tracing::instrument(skip(ctx, allocator), fields(n_strategies = preference_order.len()))]
pub fn choose_and_setup_strategy(
    preference_order: &[Strategy],
    conv_algorithm: ConvAlgorithm,
    ctx: &StripeContext,
    allocator: &SramAllocator,
) -> PassResult<ChooseOutcome> {
    for &strategy in preference_order {
        if strategy == Strategy::Sx && conv_algorithm != ConvAlgorithm::Direct {
            continue;
        }
        if let Some(found) = try_one(strategy, ctx, allocator)? {
            tracing::debug!(?strategy, "strategy accepted");
            return Ok(ChooseOutcome::Success {
                strategy_config: found.config,
                allocator_after: found.allocator,
            });
        }
    }

    let strategy_x_eligible = conv_algorithm == ConvAlgorithm::Direct
        && (ctx.mce_op == MceOperationKind::FullyConnected || !preference_order.contains(&Strategy::Sx));
    if strategy_x_eligible && !preference_order.contains(&Strategy::Sx) {
        if let Some(found) = strategy_x::try_strategy(ctx, allocator)? {
            tracing::debug!("strategy X accepted as fallback");
            return Ok(ChooseOutcome::Success {
                strategy_config: found.config,
                allocator_after: found.allocator,
            });
        }
    }

    Ok(ChooseOutcome::NoStrategyFits)
}
