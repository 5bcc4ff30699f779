//! Amount type for monetary values.
//!
//! This module provides the `Amount` type which wraps `Decimal`. Amounts are parsed from strings
//! that may or may not include a dollar sign and thousands separators, and they are persisted as
//! whole cents.

use crate::error::Res;
use anyhow::Context;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

/// The number of decimal places kept for an amount.
const SCALE: u32 = 2;

/// Represents a dollar amount.
///
/// The value is always held at two decimal places so that an amount survives a trip through the
/// database unchanged.
///
/// # Examples
///
/// ```
/// # use expense_tracker::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("$1,250.5").unwrap();
/// assert_eq!(amount.to_string(), "$1,250.50");
/// assert_eq!(amount.cents().unwrap(), 125050);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount {
    value: Decimal,
}

impl Amount {
    pub const ZERO: Amount = Amount {
        value: Decimal::ZERO,
    };

    /// Creates a new Amount, rounding `value` to cents.
    pub fn new(value: Decimal) -> Self {
        Self {
            value: value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero),
        }
    }

    /// Creates an Amount from a whole number of cents, as stored in the database.
    pub fn from_cents(cents: i64) -> Self {
        Self {
            value: Decimal::new(cents, SCALE),
        }
    }

    /// Returns the amount as a whole number of cents.
    pub fn cents(&self) -> Res<i64> {
        self.value
            .checked_mul(Decimal::ONE_HUNDRED)
            .with_context(|| format!("The amount {} is too large to store", self.value))?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .with_context(|| format!("The amount {} is too large to store", self.value))
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Returns true if the amount is greater than zero.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.value.is_sign_positive()
    }

    /// Returns true if the amount is less than zero.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.value.is_sign_negative()
    }
}

/// An error that can occur when parsing strings into `Amount` values.
pub struct AmountError(rust_decimal::Error);

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Amount::ZERO);
        }

        // "-$50.00", "$50.00", "-50.00" and "50.00" are all accepted
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let digits = unsigned.strip_prefix('$').unwrap_or(unsigned).replace(',', "");
        if digits.starts_with(['-', '+']) {
            return Err(AmountError(rust_decimal::Error::ErrorString(format!(
                "Invalid amount: {trimmed}"
            ))));
        }

        let value = Decimal::from_str(&digits).map_err(AmountError)?;
        Ok(Amount::new(if negative { -value } else { value }))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let num = self.value.abs();
        write!(
            f,
            "{sign}${}",
            format_num::format_num!(",.2", num.to_f64().unwrap_or_default())
        )
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Amount {
            value: self.value + rhs.value,
        }
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.value += rhs.value;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_with_dollar_sign() {
        let amount = Amount::from_str("$50.00").unwrap();
        assert_eq!(amount.value(), dec("50.00"));
    }

    #[test]
    fn test_parse_without_dollar_sign() {
        let amount = Amount::from_str("50").unwrap();
        assert_eq!(amount.value(), dec("50.00"));
    }

    #[test]
    fn test_parse_negative_with_dollar_sign() {
        let amount = Amount::from_str("-$50.00").unwrap();
        assert_eq!(amount.value(), dec("-50.00"));
        assert!(amount.is_negative());
    }

    #[test]
    fn test_parse_empty_string() {
        let amount = Amount::from_str("   ").unwrap();
        assert_eq!(amount, Amount::ZERO);
    }

    #[test]
    fn test_parse_with_commas() {
        let amount = Amount::from_str("$1,234,567.89").unwrap();
        assert_eq!(amount.value(), dec("1234567.89"));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(Amount::from_str("twelve").is_err());
    }

    #[test]
    fn test_parse_rejects_repeated_sign() {
        assert!(Amount::from_str("--5").is_err());
        assert!(Amount::from_str("-$-5").is_err());
        assert!(Amount::from_str("-+5").is_err());
        assert_eq!(Amount::from_str("-5").unwrap(), Amount::from_cents(-500));
    }

    #[test]
    fn test_cents_too_large_is_an_error() {
        let amount = Amount::from_str("79228162514264337593543950335").unwrap();
        assert!(amount.cents().is_err());
        let amount = Amount::from_str("100000000000000000").unwrap();
        assert!(amount.cents().is_err());
    }

    #[test]
    fn test_rounds_to_cents() {
        let amount = Amount::from_str("10.005").unwrap();
        assert_eq!(amount.value(), dec("10.01"));
        assert_eq!(amount.cents().unwrap(), 1001);
    }

    #[test]
    fn test_cents_round_trip() {
        let amount = Amount::from_cents(-123456);
        assert_eq!(amount.value(), dec("-1234.56"));
        assert_eq!(amount.cents().unwrap(), -123456);
    }

    #[test]
    fn test_display() {
        assert_eq!(Amount::from_cents(5000).to_string(), "$50.00");
        assert_eq!(Amount::from_cents(-5000).to_string(), "-$50.00");
        assert_eq!(Amount::from_cents(100_000_000).to_string(), "$1,000,000.00");
        assert_eq!(Amount::ZERO.to_string(), "$0.00");
    }

    #[test]
    fn test_zero_is_not_positive_or_negative() {
        let zero = Amount::from_str("$0.00").unwrap();
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());
        assert!(zero.is_zero());
    }

    #[test]
    fn test_sum() {
        let amounts = [
            Amount::from_cents(1000),
            Amount::from_cents(500),
            Amount::from_cents(2000),
        ];
        let total: Amount = amounts.iter().sum();
        assert_eq!(total, Amount::from_cents(3500));
        let empty: Amount = Vec::<Amount>::new().into_iter().sum();
        assert_eq!(empty, Amount::ZERO);
    }

    #[test]
    fn test_serde() {
        let amount = Amount::from_cents(5000);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"$50.00\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }
}
