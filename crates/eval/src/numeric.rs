//! Decimal rounding for `roundTo` and `equalRounded`.
//!
//! Floats are converted through their shortest decimal representation and
//! rounded with `rust_decimal` using `RoundingStrategy::MidpointAwayFromZero`,
//! so `roundTo(2.675, 2 decimal places)` gives 2.68 as an author expects
//! rather than the 2.67 that binary floating point would produce.

use std::str::FromStr;

use qti_core::RoundingMode;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Reason a rounding request cannot be honoured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundingError {
    /// significantFigures must be >= 1, decimalPlaces >= 0.
    InvalidFigures { mode: RoundingMode, figures: i64 },
}

impl std::fmt::Display for RoundingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoundingError::InvalidFigures { mode, figures } => {
                let (name, min) = match mode {
                    RoundingMode::SignificantFigures => ("significant figures", 1),
                    RoundingMode::DecimalPlaces => ("decimal places", 0),
                };
                write!(f, "{} must be at least {}, got {}", name, min, figures)
            }
        }
    }
}

/// Round `x` to the given number of significant figures or decimal places.
///
/// Non-finite input is returned unchanged.
pub fn round_to(x: f64, mode: RoundingMode, figures: i64) -> Result<f64, RoundingError> {
    let min = match mode {
        RoundingMode::SignificantFigures => 1,
        RoundingMode::DecimalPlaces => 0,
    };
    if figures < min {
        return Err(RoundingError::InvalidFigures { mode, figures });
    }
    if !x.is_finite() {
        return Ok(x);
    }
    let Ok(d) = Decimal::from_str(&format!("{}", x)) else {
        // Beyond Decimal's range every representable digit is already
        // significant at any precision QTI authors ask for.
        return Ok(x);
    };
    let rounded = match mode {
        RoundingMode::DecimalPlaces => round_dp(d, figures),
        RoundingMode::SignificantFigures => round_sig(d, figures),
    };
    Ok(rounded.and_then(|r| r.to_f64()).unwrap_or(x))
}

/// `round_to` applied to both sides, then compared.
pub fn equal_rounded(
    a: f64,
    b: f64,
    mode: RoundingMode,
    figures: i64,
) -> Result<bool, RoundingError> {
    Ok(round_to(a, mode, figures)? == round_to(b, mode, figures)?)
}

fn round_dp(d: Decimal, places: i64) -> Option<Decimal> {
    let places = u32::try_from(places).ok()?;
    // Decimal carries at most 28 fractional digits.
    if places >= 28 {
        return Some(d);
    }
    Some(d.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero))
}

fn round_sig(d: Decimal, figures: i64) -> Option<Decimal> {
    if d.is_zero() {
        return Some(d);
    }
    let exponent = decimal_exponent(d.abs());
    let scale = figures - 1 - exponent;
    if scale >= 0 {
        return round_dp(d, scale);
    }
    let factor = Decimal::from_i128_with_scale(10i128.checked_pow(u32::try_from(-scale).ok()?)?, 0);
    let shifted = d.checked_div(factor)?;
    let rounded = shifted.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    rounded.checked_mul(factor)
}

/// floor(log10(d)) for positive `d`.
fn decimal_exponent(d: Decimal) -> i64 {
    if d >= Decimal::ONE {
        let digits = d.trunc().to_string().len() as i64;
        return digits - 1;
    }
    let mut exponent = 0;
    let mut v = d;
    let ten = Decimal::TEN;
    while v < Decimal::ONE {
        match v.checked_mul(ten) {
            Some(next) => v = next,
            None => break,
        }
        exponent -= 1;
    }
    exponent
}

// ──────────────────────────────────────────────
// Integer helpers
// ──────────────────────────────────────────────

/// Division rounding toward negative infinity. `None` on zero divisor or
/// overflow.
/// Round to the nearest integer with ties toward positive infinity.
///
/// Compares the fractional part against one half instead of computing
/// `floor(x + 0.5)`, which rounds `0.49999999999999994` up to 1.
pub fn round_half_up(x: f64) -> f64 {
    let floor = x.floor();
    if x - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

pub fn floor_div(x: i64, y: i64) -> Option<i64> {
    let q = x.checked_div(y)?;
    if x % y != 0 && ((x < 0) != (y < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

/// Remainder consistent with [`floor_div`]: `x - y * floor_div(x, y)`.
pub fn floor_mod(x: i64, y: i64) -> Option<i64> {
    let q = floor_div(x, y)?;
    x.checked_sub(y.checked_mul(q)?)
}

pub fn gcd(a: i64, b: i64) -> Option<i64> {
    let (mut a, mut b) = (a.checked_abs()?, b.checked_abs()?);
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    Some(a)
}

pub fn lcm(a: i64, b: i64) -> Option<i64> {
    if a == 0 || b == 0 {
        return Some(0);
    }
    let g = gcd(a, b)?;
    (a / g).checked_mul(b)?.checked_abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_places_round_half_away_from_zero() {
        assert_eq!(round_to(2.675, RoundingMode::DecimalPlaces, 2).unwrap(), 2.68);
        assert_eq!(round_to(-2.5, RoundingMode::DecimalPlaces, 0).unwrap(), -3.0);
        assert_eq!(round_to(1.0, RoundingMode::DecimalPlaces, 3).unwrap(), 1.0);
    }

    #[test]
    fn significant_figures() {
        assert_eq!(
            round_to(3.14159, RoundingMode::SignificantFigures, 3).unwrap(),
            3.14
        );
        assert_eq!(
            round_to(12345.0, RoundingMode::SignificantFigures, 2).unwrap(),
            12000.0
        );
        assert_eq!(
            round_to(0.0012345, RoundingMode::SignificantFigures, 2).unwrap(),
            0.0012
        );
        assert_eq!(round_to(0.0, RoundingMode::SignificantFigures, 2).unwrap(), 0.0);
    }

    #[test]
    fn invalid_figures_rejected() {
        assert!(round_to(1.0, RoundingMode::SignificantFigures, 0).is_err());
        assert!(round_to(1.0, RoundingMode::DecimalPlaces, -1).is_err());
    }

    #[test]
    fn non_finite_passes_through() {
        assert_eq!(
            round_to(f64::INFINITY, RoundingMode::DecimalPlaces, 2).unwrap(),
            f64::INFINITY
        );
    }

    #[test]
    fn equal_rounded_compares_after_rounding() {
        assert!(equal_rounded(3.175, 3.18, RoundingMode::DecimalPlaces, 2).unwrap());
        assert!(!equal_rounded(3.17, 3.18, RoundingMode::DecimalPlaces, 2).unwrap());
    }

    #[test]
    fn round_half_up_ties_and_near_ties() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(-2.6), -3.0);
        assert_eq!(round_half_up(0.49999999999999994), 0.0);
        assert_eq!(round_half_up(-0.5), 0.0);
    }

    #[test]
    fn floor_division() {
        assert_eq!(floor_div(7, 2), Some(3));
        assert_eq!(floor_div(-7, 2), Some(-4));
        assert_eq!(floor_div(7, -2), Some(-4));
        assert_eq!(floor_div(7, 0), None);
        assert_eq!(floor_div(i64::MIN, -1), None);
        assert_eq!(floor_mod(-7, 2), Some(1));
        assert_eq!(floor_mod(7, -2), Some(-1));
    }

    #[test]
    fn gcd_and_lcm() {
        assert_eq!(gcd(12, -18), Some(6));
        assert_eq!(gcd(0, 0), Some(0));
        assert_eq!(lcm(4, 6), Some(12));
        assert_eq!(lcm(0, 6), Some(0));
    }
}
