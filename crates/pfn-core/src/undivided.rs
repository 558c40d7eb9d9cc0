//! Conversion of unit-interval draws into "undivided" 256-bit values.
//!
//! An undivided value is the draw before its implicit division by `2^256`,
//! i.e. `raw × 2^256`. Every finite `f64` in `[0, 1)` is a dyadic rational
//! with at most 53 significant bits, so for any draw of at least `2^-256` the
//! product is an exact integer below `2^256` and fits a [`U256`] without
//! rounding.

use crate::{Result, error::check_unit_interval};
use alloy_primitives::U256;

/// Power of two the draw is scaled by.
pub const UNDIVIDED_BITS: i64 = 256;

const MANTISSA_BITS: u32 = 52;
const EXPONENT_BIAS: i64 = 1075;

/// Returns `raw × 2^256` as an exact 256-bit integer.
///
/// # Errors
///
/// Returns [`crate::Error::NonFiniteDraw`] or [`crate::Error::DrawOutOfRange`]
/// if `raw` is not in `[0, 1)`.
pub fn undivided(raw: f64) -> Result<U256> {
    let raw = check_unit_interval(raw)?;
    if raw == 0.0 {
        return Ok(U256::ZERO);
    }

    let bits = raw.to_bits();
    let biased = i64::try_from((bits >> MANTISSA_BITS) & 0x7ff).unwrap_or_default();
    let fraction = bits & ((1_u64 << MANTISSA_BITS) - 1);
    let (mantissa, exponent) = if biased == 0 {
        // Subnormal: no implicit leading bit.
        (fraction, 1 - EXPONENT_BIAS)
    } else {
        (fraction | (1_u64 << MANTISSA_BITS), biased - EXPONENT_BIAS)
    };

    // raw = mantissa × 2^exponent, so raw × 2^256 = mantissa × 2^(exponent + 256).
    let shift = exponent + UNDIVIDED_BITS;
    if shift >= 0 {
        let shift = usize::try_from(shift).unwrap_or_default();
        Ok(U256::from(mantissa) << shift)
    } else {
        // Only subnormal-scale draws land here; the fractional part is dropped.
        let shift = u32::try_from(-shift).unwrap_or(u32::MAX);
        Ok(U256::from(mantissa.checked_shr(shift).unwrap_or(0)))
    }
}

/// Returns `raw × 2^256` as a (lossy) `f64`.
///
/// # Errors
///
/// Same conditions as [`undivided`].
pub fn undivided_approx(raw: f64) -> Result<f64> {
    let raw = check_unit_interval(raw)?;
    Ok(raw * 2_f64.powi(256))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn zero_is_zero() {
        assert_eq!(undivided(0.0).unwrap(), U256::ZERO);
    }

    #[test]
    fn half_is_two_pow_255() {
        assert_eq!(undivided(0.5).unwrap(), U256::from(1_u8) << 255_usize);
    }

    #[test]
    fn dyadic_draws_are_exact() {
        // 3/8 × 2^256 = 3 × 2^253
        assert_eq!(undivided(0.375).unwrap(), U256::from(3_u8) << 253_usize);

        let k: u64 = 0x000A_BCDE_F012_3456;
        #[allow(clippy::cast_precision_loss)]
        let raw = k as f64 / (1_u64 << 52) as f64;
        assert_eq!(undivided(raw).unwrap(), U256::from(k) << 204_usize);
    }

    #[test]
    fn largest_draw_stays_below_two_pow_256() {
        let raw = f64::from_bits(1.0_f64.to_bits() - 1);
        let value = undivided(raw).unwrap();
        assert!(value > U256::from(1_u8) << 255_usize);
        assert_eq!(value, U256::MAX - ((U256::from(1_u8) << 203_usize) - U256::from(1_u8)));
    }

    #[test]
    fn rejects_values_outside_unit_interval() {
        assert_eq!(undivided(1.0), Err(Error::DrawOutOfRange(1.0)));
        assert_eq!(undivided(-0.25), Err(Error::DrawOutOfRange(-0.25)));
        assert!(matches!(undivided(f64::NAN), Err(Error::NonFiniteDraw(_))));
        assert!(matches!(
            undivided_approx(f64::INFINITY),
            Err(Error::NonFiniteDraw(_))
        ));
    }

    #[test]
    fn approx_matches_exact_magnitude() {
        let approx = undivided_approx(0.5).unwrap();
        assert_eq!(approx, 2_f64.powi(255));
    }
}
