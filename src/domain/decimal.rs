//! Fixed-point decimal type for quantities and money, backed by rust_decimal.
//!
//! Parsing is lossless and formatting never uses exponent notation, so values
//! survive a round trip through SQLite TEXT columns and JSON unchanged.

use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

/// Decimal used for every quantity and currency field.
///
/// Serializes to a JSON string so clients never see a float rounding of a
/// ledger amount. Deserializes from either a string or a JSON number.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(RustDecimal);

impl Decimal {
    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s.trim()).map(Decimal)
    }

    /// Format the Decimal as a canonical string (no exponent, no trailing zeros).
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    /// The additive identity (0).
    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    /// Returns true if the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }
}

impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        self.0 += rhs.0;
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Decimal {
        iter.fold(Decimal::zero(), |acc, d| acc + d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_parse_roundtrip() {
        for s in ["123.456", "0.0001", "1000000", "-123.456", "0"] {
            let decimal = Decimal::from_str_canonical(s).expect("parse failed");
            let reparsed = Decimal::from_str_canonical(&decimal.to_canonical_string())
                .expect("reparse failed");
            assert_eq!(decimal, reparsed, "roundtrip failed for {}", s);
        }
    }

    #[test]
    fn test_decimal_canonical_strips_trailing_zeros() {
        let decimal = Decimal::from_str_canonical("25.500").unwrap();
        assert_eq!(decimal.to_canonical_string(), "25.5");
    }

    #[test]
    fn test_decimal_no_float_drift() {
        let tenth = Decimal::from_str_canonical("0.1").unwrap();
        let total: Decimal = std::iter::repeat(tenth).take(10).sum();
        assert_eq!(total, Decimal::from(1));
    }

    #[test]
    fn test_decimal_json_is_string() {
        let decimal = Decimal::from_str_canonical("123.45").unwrap();
        let json = serde_json::to_value(decimal).unwrap();
        assert_eq!(json, serde_json::json!("123.45"));

        let back: Decimal = serde_json::from_value(json).unwrap();
        assert_eq!(back, decimal);

        let from_number: Decimal = serde_json::from_str("30").unwrap();
        assert_eq!(from_number, Decimal::from(30));
    }

    #[test]
    fn test_decimal_sign_helpers() {
        assert!(Decimal::from(3).is_positive());
        assert!(Decimal::from(-3).is_negative());
        assert!(!Decimal::zero().is_positive());
        assert!(!Decimal::zero().is_negative());
    }

    #[test]
    fn test_decimal_add_assign() {
        let mut acc = Decimal::zero();
        acc += Decimal::from_str_canonical("2.5").unwrap();
        acc += Decimal::from_str_canonical("2.5").unwrap();
        assert_eq!(acc.to_canonical_string(), "5");
    }
}
