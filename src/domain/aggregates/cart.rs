//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::order::OrderLine;
use crate::domain::value_objects::{Money, ProductRef, Quantity};

/// One row of a user's shopping cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    /// Assigned by the store; `None` until inserted.
    pub id: Option<i64>,
    pub user_id: i64,
    pub product: ProductRef,
    pub name: String,
    pub image: Option<String>,
    pub flavor: Option<String>,
    pub quantity: Quantity,
    pub unit_amount: Money,
    pub created_at: DateTime<Utc>,
}

impl CartLine {
    pub fn draft(
        user_id: i64,
        product: ProductRef,
        name: impl Into<String>,
        image: Option<String>,
        flavor: Option<String>,
        quantity: Quantity,
        unit_amount: Money,
    ) -> Self {
        Self {
            id: None, user_id, product, name: name.into(), image, flavor,
            quantity, unit_amount, created_at: Utc::now(),
        }
    }

    /// Copies an order line back into a cart row for `user_id`.
    pub fn replayed(user_id: i64, line: &OrderLine, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            user_id,
            product: line.product,
            name: line.name.clone(),
            image: line.image.clone(),
            flavor: line.flavor.clone(),
            quantity: line.quantity,
            unit_amount: line.unit_amount,
            created_at: now,
        }
    }

    pub fn matches(&self, product: ProductRef, flavor: Option<&str>) -> bool {
        self.product == product && self.flavor.as_deref() == flavor
    }

    pub fn line_total(&self) -> Money { self.unit_amount.multiply(self.quantity) }
}

/// Immutable snapshot of a user's cart, taken at consolidation time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Cart {
    user_id: i64,
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn snapshot(user_id: i64, lines: Vec<CartLine>) -> Self { Self { user_id, lines } }
    pub fn user_id(&self) -> i64 { self.user_id }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn subtotal(&self) -> Money { self.lines.iter().fold(Money::zero(), |acc, l| acc.add(l.line_total())) }

    pub fn find(&self, product: ProductRef, flavor: Option<&str>) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.matches(product, flavor))
    }
}
