//! Value objects shared by the order and cart aggregates

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Non-negative amount in the shop's currency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub fn new(amount: Decimal) -> Result<Self, ValueError> {
        if amount.is_sign_negative() && !amount.is_zero() { return Err(ValueError::NegativeAmount(amount)); }
        Ok(Self(amount))
    }
    pub fn zero() -> Self { Self(Decimal::ZERO) }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn add(&self, other: Money) -> Money { Money(self.0 + other.0) }
    pub fn multiply(&self, qty: Quantity) -> Money { Money(self.0 * Decimal::from(qty.value())) }
}

impl TryFrom<Decimal> for Money {
    type Error = ValueError;
    fn try_from(amount: Decimal) -> Result<Self, ValueError> { Self::new(amount) }
}

impl From<Money> for Decimal {
    fn from(m: Money) -> Self { m.0 }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:.2}", self.0) }
}

/// Strictly positive line quantity, bounded by the width of the storage column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub const ONE: Quantity = Quantity(1);
    pub const MAX: u32 = i32::MAX as u32;

    pub fn new(value: u32) -> Result<Self, ValueError> {
        if value == 0 { return Err(ValueError::ZeroQuantity); }
        if value > Self::MAX { return Err(ValueError::QuantityTooLarge(value)); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn increment(&self) -> Result<Self, ValueError> { Self::new(self.0.saturating_add(1)) }
    /// `None` once the quantity would reach zero.
    pub fn decrement(&self) -> Option<Self> {
        if self.0 <= 1 { None } else { Some(Self(self.0 - 1)) }
    }
}

impl TryFrom<u32> for Quantity {
    type Error = ValueError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> u32 { q.0 }
}

impl TryFrom<i32> for Quantity {
    type Error = ValueError;
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        u32::try_from(value).map_err(|_| ValueError::ZeroQuantity).and_then(Self::new)
    }
}

/// Human-facing order number: epoch millis followed by a random suffix.
///
/// Unique with high probability only; the store enforces the real constraint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
        Self(format!("{}{}", now.timestamp_millis(), suffix))
    }

    pub fn parse(value: impl Into<String>) -> Result<Self, ValueError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(ValueError::EmptyOrderNumber); }
        if value.len() > 50 || !value.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValueError::MalformedOrderNumber(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// What a cart or order line refers to: a single dish or a set meal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ProductRef {
    Dish(i64),
    Setmeal(i64),
}

impl ProductRef {
    /// Rebuilds a reference from the nullable `dish_id`/`setmeal_id` column pair.
    pub fn from_columns(dish_id: Option<i64>, setmeal_id: Option<i64>) -> Result<Self, ValueError> {
        match (dish_id, setmeal_id) {
            (Some(id), None) => Ok(Self::Dish(id)),
            (None, Some(id)) => Ok(Self::Setmeal(id)),
            _ => Err(ValueError::AmbiguousProduct),
        }
    }

    pub fn columns(&self) -> (Option<i64>, Option<i64>) {
        match *self {
            Self::Dish(id) => (Some(id), None),
            Self::Setmeal(id) => (None, Some(id)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("amount must not be negative: {0}")]
    NegativeAmount(Decimal),
    #[error("quantity must be positive")]
    ZeroQuantity,
    #[error("quantity {0} exceeds the maximum of {max}", max = Quantity::MAX)]
    QuantityTooLarge(u32),
    #[error("order number is empty")]
    EmptyOrderNumber,
    #[error("malformed order number: {0}")]
    MalformedOrderNumber(String),
    #[error("line must reference exactly one of dish or set meal")]
    AmbiguousProduct,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_rejects_negative() {
        assert!(Money::new(Decimal::new(-1, 0)).is_err());
        let a = Money::new(Decimal::new(1250, 2)).unwrap();
        let line = a.multiply(Quantity::new(2).unwrap());
        assert_eq!(line.amount(), Decimal::new(25, 0));
        assert_eq!(line.add(Money::zero()).to_string(), "25.00");
    }

    #[test]
    fn test_quantity_bounds() {
        assert_eq!(Quantity::new(0), Err(ValueError::ZeroQuantity));
        assert_eq!(Quantity::ONE.decrement(), None);
        assert_eq!(Quantity::new(3).unwrap().decrement().unwrap().value(), 2);
        assert!(Quantity::try_from(-4i32).is_err());
        let max = Quantity::new(Quantity::MAX).unwrap();
        assert_eq!(max.increment(), Err(ValueError::QuantityTooLarge(Quantity::MAX + 1)));
        assert_eq!(Quantity::ONE.increment().unwrap().value(), 2);
        assert!(Quantity::new(u32::MAX).is_err());
    }

    #[test]
    fn test_order_number_shape() {
        let now = Utc::now();
        let n = OrderNumber::generate(now);
        assert!(n.as_str().starts_with(&now.timestamp_millis().to_string()));
        assert!(OrderNumber::parse(n.as_str()).is_ok());
        assert_eq!(OrderNumber::parse("  "), Err(ValueError::EmptyOrderNumber));
        assert!(OrderNumber::parse("12ab").is_err());
    }

    #[test]
    fn test_product_ref_columns() {
        assert_eq!(ProductRef::from_columns(Some(7), None).unwrap(), ProductRef::Dish(7));
        assert_eq!(ProductRef::Setmeal(3).columns(), (None, Some(3)));
        assert!(ProductRef::from_columns(Some(1), Some(2)).is_err());
        assert!(ProductRef::from_columns(None, None).is_err());
    }
}
