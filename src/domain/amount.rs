//! Amount type
//!
//! Domain primitive for token amounts with validation at construction time.
//! Invalid values cannot exist in the system, and all arithmetic is done
//! with arbitrary-precision decimals (never floats) so ledger sums are exact.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum allowed amount (1 quadrillion tokens)
const MAX_AMOUNT: &str = "1000000000000000";

/// Maximum decimal places (18, matching common token precision)
const MAX_SCALE: u32 = 18;

/// Amount represents a validated token value.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - Maximum 18 decimal places
/// - Bounded by `MAX_AMOUNT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(Decimal);

/// Errors that can occur when creating an Amount
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount must be positive (got {0})")]
    NotPositive(Decimal),

    #[error("Amount has too many decimal places (max {MAX_SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Amount exceeds maximum allowed value ({MAX_AMOUNT})")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    ParseError(String),

    #[error("Fee must not be negative (got {0})")]
    NegativeFee(Decimal),
}

impl Amount {
    /// Create a new Amount with validation.
    ///
    /// # Errors
    /// - `AmountError::NotPositive` if value <= 0
    /// - `AmountError::TooManyDecimals` if more than 18 decimal places
    /// - `AmountError::Overflow` if value exceeds the maximum
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value <= Decimal::ZERO {
            return Err(AmountError::NotPositive(value));
        }

        if value.scale() > MAX_SCALE {
            return Err(AmountError::TooManyDecimals(value.scale()));
        }

        let max = Decimal::from_str(MAX_AMOUNT).expect("Invalid MAX_AMOUNT constant");
        if value > max {
            return Err(AmountError::Overflow);
        }

        Ok(Self(value))
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s).map_err(|e| AmountError::ParseError(e.to_string()))?;
        Amount::new(decimal)
    }
}

impl TryFrom<String> for Amount {
    type Error = AmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Amount::from_str(&value)
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.0.to_string()
    }
}

/// Parse a fee string. Unlike `Amount`, a fee may be zero; it defaults to
/// zero when the caller supplies nothing.
pub fn parse_fee(raw: Option<&str>) -> Result<Decimal, AmountError> {
    let Some(raw) = raw else {
        return Ok(Decimal::ZERO);
    };

    let fee = Decimal::from_str(raw).map_err(|e| AmountError::ParseError(e.to_string()))?;
    if fee < Decimal::ZERO {
        return Err(AmountError::NegativeFee(fee));
    }
    if fee.scale() > MAX_SCALE {
        return Err(AmountError::TooManyDecimals(fee.scale()));
    }

    Ok(fee)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_positive() {
        let amount = Amount::new(Decimal::new(100, 0));
        assert!(amount.is_ok());
        assert_eq!(amount.unwrap().value(), Decimal::new(100, 0));
    }

    #[test]
    fn test_amount_zero_rejected() {
        let amount = Amount::new(Decimal::ZERO);
        assert!(matches!(amount, Err(AmountError::NotPositive(_))));
    }

    #[test]
    fn test_amount_negative_rejected() {
        let amount = Amount::new(Decimal::new(-100, 0));
        assert!(matches!(amount, Err(AmountError::NotPositive(_))));
    }

    #[test]
    fn test_amount_too_many_decimals() {
        // 19 decimal places
        let amount = Amount::new(Decimal::new(1234567891234567891, 19));
        assert!(matches!(amount, Err(AmountError::TooManyDecimals(19))));
    }

    #[test]
    fn test_amount_exceeds_64bit_integer_range() {
        // Values beyond u64::MAX must parse and validate fine
        let amount: Result<Amount, _> = "98765432109876543210".parse();
        assert!(matches!(amount, Err(AmountError::Overflow)));

        let amount: Result<Amount, _> = "999999999999999.5".parse();
        assert!(amount.is_ok());
    }

    #[test]
    fn test_amount_overflow() {
        let value = Decimal::from_str("1000000000000001").unwrap();
        let amount = Amount::new(value);
        assert!(matches!(amount, Err(AmountError::Overflow)));
    }

    #[test]
    fn test_amount_from_str() {
        let amount: Result<Amount, _> = "123.456".parse();
        assert!(amount.is_ok());
        assert_eq!(amount.unwrap().value(), Decimal::new(123456, 3));
    }

    #[test]
    fn test_amount_from_str_garbage() {
        let amount: Result<Amount, _> = "not-a-number".parse();
        assert!(matches!(amount, Err(AmountError::ParseError(_))));
    }

    #[test]
    fn test_fee_defaults_to_zero() {
        assert_eq!(parse_fee(None).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_fee_zero_allowed() {
        assert_eq!(parse_fee(Some("0")).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_fee_negative_rejected() {
        assert!(matches!(
            parse_fee(Some("-1.5")),
            Err(AmountError::NegativeFee(_))
        ));
    }
}
