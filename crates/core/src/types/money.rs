//! Non-negative monetary amounts using decimal arithmetic.
//!
//! Prices are stored in the document store as plain JSON numbers (that is
//! what the catalog editor writes), but all arithmetic happens on
//! [`Decimal`] so subtotals never drift the way `f64` sums do.

use core::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors that can occur when constructing [`Money`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// Amount is below zero.
    #[error("amount cannot be negative")]
    Negative,
    /// Input is not a finite decimal number.
    #[error("invalid amount: {0}")]
    Invalid(String),
    /// Arithmetic exceeded the representable range.
    #[error("amount is too large")]
    Overflow,
}

/// A non-negative amount in the store currency's standard unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Highest price a catalog product may carry.
    pub const MAX_PRICE: Self = Self(Decimal::from_parts(1_000_000, 0, 0, false, 0));

    /// Create an amount, rejecting negative values.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] for amounts below zero.
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        Ok(Self(amount))
    }

    /// Create an amount from minor units (e.g. cents).
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] for negative input.
    pub fn from_cents(cents: i64) -> Result<Self, MoneyError> {
        Self::new(Decimal::new(cents, 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// This amount multiplied by a line quantity.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the product is out of range.
    pub fn checked_times(self, quantity: u32) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// Sum of two amounts.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the sum is out of range.
    pub fn checked_add(self, rhs: Self) -> Result<Self, MoneyError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    fn from_f64(value: f64) -> Result<Self, MoneyError> {
        if !value.is_finite() {
            return Err(MoneyError::Invalid(value.to_string()));
        }
        // Shortest round-trip text keeps 19.99 as 19.99 instead of 19.989999...
        value.to_string().parse()
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount =
            Decimal::from_str(s.trim()).map_err(|_| MoneyError::Invalid(s.to_owned()))?;
        Self::new(amount)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0.round_dp(2))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.to_f64() {
            Some(value) => serializer.serialize_f64(value),
            None => serializer.serialize_str(&self.0.to_string()),
        }
    }
}

struct MoneyVisitor;

impl Visitor<'_> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a non-negative number or numeric string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Money::new(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Money::new(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Money::from_f64(v).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn money(raw: &str) -> Money {
        raw.parse().unwrap()
    }

    #[test]
    fn test_rejects_negative() {
        assert_eq!(Money::from_cents(-1), Err(MoneyError::Negative));
        assert_eq!("-0.01".parse::<Money>(), Err(MoneyError::Negative));
        assert!(Money::new(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_times_and_add_are_exact() {
        let total = money("0.10")
            .checked_times(3)
            .unwrap()
            .checked_add(money("0.20"))
            .unwrap();
        assert_eq!(total, money("0.50"));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let huge = Money::new(Decimal::from_i128_with_scale(10_i128.pow(20), 0)).unwrap();
        assert_eq!(huge.checked_times(4_000_000_000), Err(MoneyError::Overflow));
        let max = Money::new(Decimal::MAX).unwrap();
        assert_eq!(max.checked_add(money("1")), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_display_two_places() {
        assert_eq!(money("25").to_string(), "25.00");
        assert_eq!(money("19.999").to_string(), "20.00");
    }

    #[test]
    fn test_deserializes_json_numbers_and_strings() {
        assert_eq!(serde_json::from_str::<Money>("19.99").unwrap(), money("19.99"));
        assert_eq!(serde_json::from_str::<Money>("10").unwrap(), money("10"));
        assert_eq!(serde_json::from_str::<Money>("\"5.50\"").unwrap(), money("5.5"));
        assert!(serde_json::from_str::<Money>("-3").is_err());
        assert!(serde_json::from_str::<Money>("\"abc\"").is_err());
    }

    #[test]
    fn test_serializes_as_number() {
        let json = serde_json::to_value(money("12.50")).unwrap();
        assert!(json.is_number());
        let back: Money = serde_json::from_value(json).unwrap();
        assert_eq!(back, money("12.5"));
    }
}
