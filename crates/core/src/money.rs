use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MoneyParseError {
    #[error("not a monetary amount: '{0}'")]
    Invalid(String),
}

/// A monetary amount with exact cent precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::from(cents) / Decimal::from(100))
    }

    pub fn to_cents(self) -> i64 {
        (self.0 * Decimal::from(100)).round().to_i64().unwrap_or(0)
    }

    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(decimal.round_dp(2))
    }

    pub fn to_f64(self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn abs(self) -> Self {
        Money(self.0.abs())
    }

    /// Parse a receipt-style amount: optional `$`, thousands commas,
    /// two decimal places. `"1,234.56"` → 123456 cents.
    pub fn parse(s: &str) -> Result<Self, MoneyParseError> {
        let clean = s.trim().trim_start_matches('$').replace(',', "");
        let dec =
            Decimal::from_str(&clean).map_err(|_| MoneyParseError::Invalid(s.to_string()))?;
        Ok(Money(dec.round_dp(2)))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_round_trip() {
        assert_eq!(Money::from_cents(550).to_cents(), 550);
        assert_eq!(Money::from_cents(-1).to_cents(), -1);
        assert_eq!(Money::from_cents(0), Money::zero());
    }

    #[test]
    fn display_two_places() {
        assert_eq!(Money::from_cents(550).to_string(), "$5.50");
        assert_eq!(Money::from_cents(123456).to_string(), "$1234.56");
    }

    #[test]
    fn parse_plain() {
        assert_eq!(Money::parse("49.99").unwrap().to_cents(), 4999);
        assert_eq!(Money::parse("0.01").unwrap().to_cents(), 1);
    }

    #[test]
    fn parse_dollar_sign_and_commas() {
        assert_eq!(Money::parse("$1,234.56").unwrap().to_cents(), 123456);
        assert_eq!(Money::parse(" $5.50 ").unwrap().to_cents(), 550);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Money::parse("total").is_err());
        assert!(Money::parse("").is_err());
    }

    #[test]
    fn arithmetic() {
        let a = Money::from_cents(4500);
        let b = Money::from_cents(360);
        assert_eq!((a + b).to_cents(), 4860);
        assert_eq!((a - b).to_cents(), 4140);
    }

    #[test]
    fn sum_iterator() {
        let total: Money = [100, 250, 399].iter().map(|c| Money::from_cents(*c)).sum();
        assert_eq!(total.to_cents(), 749);
    }

    #[test]
    fn abs_normalizes_negative() {
        assert_eq!(Money::from_cents(-500).abs().to_cents(), 500);
    }
}
