//! Decimal value layer
//!
//! All charging quantities are `rust_decimal::Decimal`. The helpers here turn
//! overflow, division by zero and unparsable input into
//! [`OcsError::InvalidNumber`] instead of panicking, and never route a value
//! through `f64`.

use crate::error::OcsError;
use crate::OcsResult;
use rust_decimal::Decimal;
use serde_json::Value;

/// Parse a decimal literal (plain or scientific notation)
///
/// Literals carrying more precision than a `Decimal` can hold are rejected
/// rather than silently rounded.
pub fn parse_decimal(input: &str) -> OcsResult<Decimal> {
    let trimmed = input.trim();
    Decimal::from_str_exact(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| OcsError::InvalidNumber(format!("can't convert <{}> to decimal", input)))
}

/// Convert a JSON option value to a decimal
///
/// `serde_json` is built with `arbitrary_precision`, so a JSON number keeps
/// the literal it was parsed from and is converted from that text.
pub fn decimal_from_json(value: &Value) -> OcsResult<Decimal> {
    match value {
        Value::String(s) => parse_decimal(s),
        Value::Number(n) => parse_decimal(&n.to_string()),
        other => Err(OcsError::InvalidNumber(format!(
            "can't convert <{}> to decimal",
            other
        ))),
    }
}

pub fn checked_add(a: Decimal, b: Decimal) -> OcsResult<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| OcsError::InvalidNumber(format!("overflow computing {} + {}", a, b)))
}

pub fn checked_sub(a: Decimal, b: Decimal) -> OcsResult<Decimal> {
    a.checked_sub(b)
        .ok_or_else(|| OcsError::InvalidNumber(format!("overflow computing {} - {}", a, b)))
}

pub fn checked_mul(a: Decimal, b: Decimal) -> OcsResult<Decimal> {
    a.checked_mul(b)
        .ok_or_else(|| OcsError::InvalidNumber(format!("overflow computing {} * {}", a, b)))
}

/// Divide `a` by `b`
///
/// The quotient is rounded half-even at the 28th significant digit, the
/// precision limit of `Decimal`.
pub fn checked_div(a: Decimal, b: Decimal) -> OcsResult<Decimal> {
    if b.is_zero() {
        return Err(OcsError::InvalidNumber(format!(
            "division by zero computing {} / {}",
            a, b
        )));
    }
    a.checked_div(b)
        .ok_or_else(|| OcsError::InvalidNumber(format!("overflow computing {} / {}", a, b)))
}

/// Largest non-negative multiple of `step` that does not exceed `value`
///
/// Returns zero when `value` is zero or negative. Fails with
/// [`OcsError::InvalidIncrement`] when `step` is not positive.
pub fn floor_to_multiple(value: Decimal, step: Decimal) -> OcsResult<Decimal> {
    if step <= Decimal::ZERO {
        return Err(OcsError::InvalidIncrement(step));
    }
    if value <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }

    // remainder is exact, unlike the quotient which may not fit
    let rem = value.checked_rem(step).ok_or_else(|| {
        OcsError::InvalidNumber(format!("overflow computing {} % {}", value, step))
    })?;
    checked_sub(value, rem)
}

/// Whether `value` is an exact integer multiple of `step`
pub fn is_multiple_of(value: Decimal, step: Decimal) -> bool {
    if step.is_zero() {
        return value.is_zero();
    }
    match value.checked_rem(step) {
        Some(rem) => rem.is_zero(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("1.25").unwrap(), dec!(1.25));
        assert_eq!(parse_decimal(" -200 ").unwrap(), dec!(-200));
        assert_eq!(parse_decimal("1e2").unwrap(), dec!(100));
    }

    #[test]
    fn test_parse_decimal_invalid() {
        let err = parse_decimal("21c").unwrap_err();
        assert_eq!(err.error_code(), "invalid_number");
        assert_eq!(err.to_string(), "Invalid number: can't convert <21c> to decimal");
        assert!(parse_decimal("").is_err());
    }

    #[test]
    fn test_decimal_from_json() {
        assert_eq!(decimal_from_json(&json!("0.5")).unwrap(), dec!(0.5));
        assert_eq!(decimal_from_json(&json!(0.1)).unwrap(), dec!(0.1));
        assert_eq!(decimal_from_json(&json!(-200)).unwrap(), dec!(-200));
        assert!(decimal_from_json(&json!(true)).is_err());
        assert!(decimal_from_json(&json!(null)).is_err());
    }

    #[test]
    fn test_division_by_zero() {
        let err = checked_div(dec!(1), Decimal::ZERO).unwrap_err();
        assert!(matches!(err, OcsError::InvalidNumber(_)));
    }

    #[test]
    fn test_overflow() {
        assert!(checked_mul(Decimal::MAX, dec!(2)).is_err());
        assert!(checked_add(Decimal::MAX, dec!(1)).is_err());
        assert!(checked_sub(Decimal::MIN, dec!(1)).is_err());
    }

    #[test]
    fn test_floor_to_multiple() {
        assert_eq!(floor_to_multiple(dec!(2.25), dec!(0.1)).unwrap(), dec!(2.2));
        assert_eq!(floor_to_multiple(dec!(0.75), dec!(0.1)).unwrap(), dec!(0.7));
        assert_eq!(floor_to_multiple(dec!(700), dec!(100)).unwrap(), dec!(700));
        assert_eq!(floor_to_multiple(dec!(59), dec!(6)).unwrap(), dec!(54));
    }

    #[test]
    fn test_floor_to_multiple_non_positive_value() {
        assert_eq!(floor_to_multiple(Decimal::ZERO, dec!(1)).unwrap(), Decimal::ZERO);
        assert_eq!(floor_to_multiple(dec!(-3.5), dec!(1)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_floor_to_multiple_invalid_step() {
        assert!(matches!(
            floor_to_multiple(dec!(10), Decimal::ZERO),
            Err(OcsError::InvalidIncrement(_))
        ));
        assert!(matches!(
            floor_to_multiple(dec!(10), dec!(-1)),
            Err(OcsError::InvalidIncrement(_))
        ));
    }

    #[test]
    fn test_floor_to_multiple_never_exceeds_value() {
        let value = dec!(1);
        let step = dec!(3) / dec!(7);
        let floored = floor_to_multiple(value, step).unwrap();
        assert!(floored <= value);
        assert!(floored > Decimal::ZERO);
    }

    #[test]
    fn test_floor_to_multiple_large_value_tiny_step() {
        let value = dec!(100000000000000000000);
        assert_eq!(floor_to_multiple(value, dec!(0.000000001)).unwrap(), value);
        assert_eq!(
            floor_to_multiple(dec!(100000000000000000000.4), dec!(0.3)).unwrap(),
            dec!(100000000000000000000.2)
        );
    }

    #[test]
    fn test_decimal_from_json_keeps_every_digit() {
        let value: Value = serde_json::from_str("0.12345678901234567891").unwrap();
        assert_eq!(
            decimal_from_json(&value).unwrap(),
            dec!(0.12345678901234567891)
        );

        let value: Value = serde_json::from_str("-200.000000000000000001").unwrap();
        assert_eq!(
            decimal_from_json(&value).unwrap(),
            dec!(-200.000000000000000001)
        );
    }

    #[test]
    fn test_is_multiple_of() {
        assert!(is_multiple_of(dec!(2.2), dec!(0.1)));
        assert!(!is_multiple_of(dec!(2.25), dec!(0.1)));
        assert!(is_multiple_of(Decimal::ZERO, dec!(0.1)));
    }
}
