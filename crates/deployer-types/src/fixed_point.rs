//! Decimal to fixed-point conversion.
//!
//! Configuration authors write ratios as human-scale decimals (`0.75`) and the
//! ledger stores them as integers scaled by a power of ten. Conversion works on
//! the decimal text of the value, so `0.75 * 10^18` is exact and never picks up
//! binary floating-point error. Rounding is half away from zero.

use thiserror::Error;

/// Scale for ratios, rates and fees (`10^18`).
pub const SCALE: u128 = 1_000_000_000_000_000_000;
/// Scale used only for utilization ratios (`10^5`).
pub const UTILIZATION_SCALE: u128 = 100_000;

const SCALE_DECIMALS: u32 = 18;
const UTILIZATION_DECIMALS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixedPointError {
    #[error("value '{0}' is negative")]
    Negative(String),

    #[error("value '{0}' is not a finite number")]
    NotFinite(String),

    #[error("value '{0}' is not a decimal number")]
    Malformed(String),

    #[error("value '{0}' overflows 128 bits after scaling")]
    Overflow(String),
}

/// `round(value * 10^18)`.
pub fn to_scale(value: f64) -> Result<u128, FixedPointError> {
    scale_f64(value, SCALE_DECIMALS)
}

/// `round(value * 10^5)`, for utilization fields.
pub fn to_utilization_scale(value: f64) -> Result<u128, FixedPointError> {
    scale_f64(value, UTILIZATION_DECIMALS)
}

/// Scale a float through its shortest round-trip decimal rendering.
pub fn scale_f64(value: f64, decimals: u32) -> Result<u128, FixedPointError> {
    if !value.is_finite() {
        return Err(FixedPointError::NotFinite(value.to_string()));
    }
    // Display for f64 is the shortest string that parses back to the same value
    // and never uses exponent notation.
    scale_decimal(&value.to_string(), decimals)
}

/// Multiply a decimal string by `10^decimals` and round half away from zero.
///
/// Accepts an optional sign, a fractional part and an exponent
/// (`"1.5e-3"`). Negative non-zero values are rejected.
pub fn scale_decimal(text: &str, decimals: u32) -> Result<u128, FixedPointError> {
    let malformed = || FixedPointError::Malformed(text.to_string());
    let trimmed = text.trim();

    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(pos) => {
            let exp: i64 = unsigned[pos + 1..].parse().map_err(|_| malformed())?;
            (&unsigned[..pos], exp)
        }
        None => (unsigned, 0),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(malformed());
    }
    if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    let digits: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes())
        .map(|b| b - b'0')
        .collect();

    if digits.iter().all(|d| *d == 0) {
        return Ok(0);
    }
    if negative {
        return Err(FixedPointError::Negative(text.to_string()));
    }

    let overflow = || FixedPointError::Overflow(text.to_string());

    // Number of leading digits that land left of the decimal point after scaling.
    // A non-zero digit is present, so the loop overflows within 39 digits of it.
    let keep = i64::try_from(int_part.len())
        .ok()
        .and_then(|len| len.checked_add(exponent))
        .and_then(|n| n.checked_add(i64::from(decimals)))
        .ok_or_else(overflow)?;

    let mut result: u128 = 0;
    if keep > 0 {
        for i in 0..keep as usize {
            let digit = digits.get(i).copied().unwrap_or(0);
            result = result
                .checked_mul(10)
                .and_then(|r| r.checked_add(u128::from(digit)))
                .ok_or_else(overflow)?;
        }
    }

    let round_digit = if keep >= 0 {
        digits.get(keep as usize).copied().unwrap_or(0)
    } else {
        0
    };
    if round_digit >= 5 {
        result = result.checked_add(1).ok_or_else(overflow)?;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_scale_examples() {
        assert_eq!(to_scale(0.75).unwrap(), 750_000_000_000_000_000);
        assert_eq!(to_scale(0.02).unwrap(), 20_000_000_000_000_000);
        assert_eq!(to_scale(1.0).unwrap(), SCALE);
        assert_eq!(to_scale(0.0).unwrap(), 0);
    }

    #[test]
    fn test_to_utilization_scale_examples() {
        assert_eq!(to_utilization_scale(0.8).unwrap(), 80_000);
        assert_eq!(to_utilization_scale(0.925).unwrap(), 92_500);
        assert_eq!(to_utilization_scale(1.0).unwrap(), UTILIZATION_SCALE);
    }

    #[test]
    fn test_no_binary_float_error() {
        // 0.1 * 1e18 in f64 is 100000000000000000.00000000000000005551...
        assert_eq!(to_scale(0.1).unwrap(), 100_000_000_000_000_000);
        assert_eq!(to_scale(0.3).unwrap(), 300_000_000_000_000_000);
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(scale_decimal("0.5", 0).unwrap(), 1);
        assert_eq!(scale_decimal("2.5", 0).unwrap(), 3);
        assert_eq!(scale_decimal("2.4999", 0).unwrap(), 2);
        assert_eq!(scale_decimal("0.0000000000000000005", 18).unwrap(), 1);
        assert_eq!(scale_decimal("0.0000000000000000004", 18).unwrap(), 0);
        assert_eq!(scale_decimal("0.000004", 5).unwrap(), 0);
        assert_eq!(scale_decimal("0.000005", 5).unwrap(), 1);
    }

    #[test]
    fn test_exponent_and_large_values() {
        assert_eq!(scale_decimal("1.5e-3", 5).unwrap(), 150);
        assert_eq!(
            to_scale(2_000_000.0).unwrap(),
            2_000_000 * SCALE
        );
        assert!(matches!(
            scale_decimal("1e30", 18),
            Err(FixedPointError::Overflow(_))
        ));
    }

    #[test]
    fn test_extreme_exponents_fail_or_vanish() {
        assert!(matches!(
            scale_decimal("1e9223372036854775807", 18),
            Err(FixedPointError::Overflow(_))
        ));
        assert!(matches!(
            scale_decimal("0.001e99999999999", 18),
            Err(FixedPointError::Overflow(_))
        ));
        assert_eq!(scale_decimal("0e99999999999", 18).unwrap(), 0);
        assert_eq!(scale_decimal("-0.000e9223372036854775807", 18).unwrap(), 0);
        assert_eq!(scale_decimal("5e-9223372036854775808", 18).unwrap(), 0);
        assert!(matches!(
            scale_decimal("1e99999999999999999999", 18),
            Err(FixedPointError::Malformed(_))
        ));
    }

    #[test]
    fn test_rejects_negative_and_garbage() {
        assert!(matches!(to_scale(-0.1), Err(FixedPointError::Negative(_))));
        assert_eq!(to_scale(-0.0).unwrap(), 0);
        assert!(matches!(
            to_scale(f64::NAN),
            Err(FixedPointError::NotFinite(_))
        ));
        assert!(matches!(
            scale_decimal("abc", 18),
            Err(FixedPointError::Malformed(_))
        ));
        assert!(matches!(
            scale_decimal(".", 18),
            Err(FixedPointError::Malformed(_))
        ));
    }
}
