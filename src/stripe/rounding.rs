//! Shared rounding arithmetic used by the stripe-sizing oracle and the
//! strategy shape-space generators.

use crate::types::Fraction;

/// Rounds `value` up to the nearest multiple of `multiple` (a no-op for
/// `multiple == 0`, which only arises for a disabled/unused dimension).
pub fn round_up_to_multiple(value: u32, multiple: u32) -> u32 {
    if multiple == 0 {
        return value;
    }
    div_round_up(value, multiple) * multiple
}

/// `value / divisor`, rounded up.
pub fn div_round_up(value: u32, divisor: u32) -> u32 {
    debug_assert!(divisor > 0);
    (value + divisor - 1) / divisor
}

/// `value * fraction`, rounded up to the next integer.
pub fn mul_fraction_ceil(value: u32, fraction: Fraction) -> u32 {
    let numer = *fraction.numer();
    let denom = *fraction.denom();
    debug_assert!(denom > 0);
    let product = value as i64 * numer;
    div_ceil_i64(product, denom) as u32
}

/// `value / fraction`, rounded up to the next integer.
pub fn div_fraction_ceil(value: u32, fraction: Fraction) -> u32 {
    let numer = *fraction.numer();
    let denom = *fraction.denom();
    debug_assert!(numer > 0);
    let product = value as i64 * denom;
    div_ceil_i64(product, numer) as u32
}

fn div_ceil_i64(value: i64, divisor: i64) -> i64 {
    debug_assert!(divisor > 0);
    (value + divisor - 1) / divisor
}

/// If the output stripe dimension covers the whole output tensor dimension,
/// the corresponding input stripe must span the whole input tensor
/// dimension too; otherwise the input stripe is `output_stripe / multiplier`.
/// Grounded in `StrategiesCommon.hpp`'s `AccountForFullDimension`.
pub fn account_for_full_dimension(
    output_tensor_dim: u32,
    input_tensor_dim: u32,
    output_stripe_dim: u32,
    multiplier: Fraction,
) -> u32 {
    if output_stripe_dim >= output_tensor_dim {
        input_tensor_dim
    } else {
        div_fraction_ceil(output_stripe_dim, multiplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_to_multiple_examples() {
        assert_eq!(round_up_to_multiple(0, 8), 0);
        assert_eq!(round_up_to_multiple(1, 8), 8);
        assert_eq!(round_up_to_multiple(8, 8), 8);
        assert_eq!(round_up_to_multiple(9, 8), 16);
    }

    #[test]
    fn account_for_full_dimension_whole_tensor_case() {
        let half = Fraction::new(1, 2);
        assert_eq!(account_for_full_dimension(56, 56, 56, half), 56);
        assert_eq!(account_for_full_dimension(56, 56, 28, half), 56);
    }
}
