//! Lossless decimal numeric type backed by rust_decimal.
//!
//! Provides canonical parsing from strings, formatting without exponent
//! notation, and scaled-integer construction for chain-native base units
//! (satoshis, wei, lamports).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal as RustDecimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lossless decimal numeric type for monetary calculations.
///
/// Backed by rust_decimal to avoid floating-point drift.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Decimal {
    /// Create a Decimal from a RustDecimal.
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Construct from an integer mantissa and a base-10 scale.
    ///
    /// `from_scaled_i128(150_000_000, 8)` is 1.5 — the form chain-native
    /// base units (satoshis, wei, lamports) arrive in. Values beyond the
    /// 96-bit mantissa saturate instead of panicking; downstream accrual
    /// rejects them.
    pub fn from_scaled_i128(mantissa: i128, scale: u32) -> Self {
        RustDecimal::try_from_i128_with_scale(mantissa, scale)
            .map(Decimal)
            .unwrap_or(Decimal(RustDecimal::MAX))
    }

    /// Format the Decimal as a canonical string (no exponent notation,
    /// no trailing zeros).
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    /// Format with exactly two fractional digits, rounding half away from
    /// zero. This is the fixed encoding used in draw seed material.
    pub fn to_usd_2dp_string(&self) -> String {
        let rounded = self
            .0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        format!("{:.2}", rounded)
    }

    /// Get the underlying RustDecimal.
    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    /// The additive identity (0).
    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    /// The multiplicative identity (1).
    pub fn one() -> Self {
        Decimal(RustDecimal::ONE)
    }

    /// Returns true if the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Absolute value.
    pub fn abs(&self) -> Self {
        Decimal(self.0.abs())
    }

    /// Round to the nearest whole number, midpoint away from zero.
    pub fn round_units(&self) -> Self {
        Decimal(
            self.0
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Round toward negative infinity to a whole number.
    pub fn floor_units(&self) -> Self {
        Decimal(self.0.floor())
    }

    /// Integer part as u32: 0 when negative, u32::MAX on overflow.
    pub fn to_u32_saturating(&self) -> u32 {
        if self.0.is_sign_negative() {
            return 0;
        }
        self.0.to_u32().unwrap_or(u32::MAX)
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

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
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

impl std::ops::Div for Decimal {
    type Output = Decimal;

    fn div(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 / rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_parse_roundtrip() {
        let cases = vec!["123.456", "0.0001", "1000000", "-123.456", "0"];
        for s in cases {
            let decimal = Decimal::from_str_canonical(s).expect("parse failed");
            let reparsed =
                Decimal::from_str_canonical(&decimal.to_canonical_string()).expect("reparse");
            assert_eq!(decimal, reparsed, "roundtrip failed for {}", s);
        }
    }

    #[test]
    fn test_from_scaled_units() {
        assert_eq!(
            Decimal::from_scaled_i128(150_000_000, 8).to_canonical_string(),
            "1.5"
        );
        assert_eq!(
            Decimal::from_scaled_i128(1_000_000_000, 9).to_canonical_string(),
            "1"
        );
        // 0.25 ether in wei
        assert_eq!(
            Decimal::from_scaled_i128(250_000_000_000_000_000, 18).to_canonical_string(),
            "0.25"
        );
    }

    #[test]
    fn test_usd_2dp_string_is_fixed_width() {
        assert_eq!(
            Decimal::from_str_canonical("100").unwrap().to_usd_2dp_string(),
            "100.00"
        );
        assert_eq!(
            Decimal::from_str_canonical("99.999").unwrap().to_usd_2dp_string(),
            "100.00"
        );
        assert_eq!(
            Decimal::from_str_canonical("47.5").unwrap().to_usd_2dp_string(),
            "47.50"
        );
    }

    #[test]
    fn test_round_and_floor_units() {
        let d = Decimal::from_str_canonical("3.2").unwrap();
        assert_eq!(d.round_units().to_canonical_string(), "3");
        assert_eq!(d.floor_units().to_canonical_string(), "3");

        let d = Decimal::from_str_canonical("2.5").unwrap();
        assert_eq!(d.round_units().to_canonical_string(), "3");
        assert_eq!(d.floor_units().to_canonical_string(), "2");

        let d = Decimal::from_str_canonical("0.94").unwrap();
        assert_eq!(d.round_units().to_canonical_string(), "1");
        assert_eq!(d.floor_units().to_canonical_string(), "0");
    }

    #[test]
    fn test_decimal_arithmetic() {
        let a = Decimal::from_str_canonical("10.5").unwrap();
        let b = Decimal::from_str_canonical("2.5").unwrap();
        assert_eq!((a + b).to_canonical_string(), "13");
        assert_eq!((a - b).to_canonical_string(), "8");
        assert_eq!((a * b).to_canonical_string(), "26.25");
        assert_eq!((a / b).to_canonical_string(), "4.2");
    }

    #[test]
    fn test_decimal_canonical_no_exponent() {
        let decimal = Decimal::from_str_canonical("123").unwrap();
        assert!(!decimal.to_canonical_string().contains('e'));
    }

    #[test]
    fn test_to_u32_saturating() {
        assert_eq!(Decimal::from_str_canonical("3").unwrap().to_u32_saturating(), 3);
        assert_eq!(Decimal::zero().to_u32_saturating(), 0);
    }
}
