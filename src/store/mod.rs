//! Storage seams consumed by the engine, the cart and the reports.
//!
//! `postgres` is the production implementation. `memory` backs the unit tests
//! and keeps the same atomicity guarantees behind a single lock.

pub mod postgres;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::{Address, CartLine, NewOrder, Order, OrderError, OrderHeader, OrderLine, OrderStatus};
use crate::domain::value_objects::{Money, OrderNumber, ProductRef, Quantity};
use crate::Result;

pub use postgres::PgStore;

/// Refunds are abandoned after this many failed issuance attempts.
pub const MAX_REFUND_ATTEMPTS: i32 = 5;

/// Read-check-write step applied to a locked order row.
pub type Mutation = Box<dyn FnOnce(&mut Order) -> std::result::Result<(), OrderError> + Send>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderKey {
    Id(i64),
    Number(OrderNumber),
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub number: Option<String>,
    pub phone: Option<String>,
    pub status: Option<OrderStatus>,
    pub user_id: Option<i64>,
    pub begin_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub const MAX_PAGE_SIZE: u32 = 100;

    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(10).clamp(1, Self::MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 { i64::from(self.page - 1) * i64::from(self.page_size) }
    pub fn limit(&self) -> i64 { i64::from(self.page_size) }
}

#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub total: i64,
    pub records: Vec<T>,
}

/// Predicate for reporting aggregates. Absent bounds are unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RangeFilter {
    pub begin: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub status: Option<OrderStatus>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductSales {
    pub name: String,
    pub number: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundState {
    Pending,
    /// Claimed by a sweeper until its lease runs out.
    Issuing,
    Issued,
    Failed,
}

impl RefundState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Issuing => "issuing",
            Self::Issued => "issued",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "issuing" => Some(Self::Issuing),
            "issued" => Some(Self::Issued),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// State after one more attempt.
    pub fn after_attempt(attempts: i32, outcome: &RefundOutcome) -> Self {
        match outcome {
            RefundOutcome::Issued => Self::Issued,
            RefundOutcome::Failed(_) if attempts >= MAX_REFUND_ATTEMPTS => Self::Failed,
            RefundOutcome::Failed(_) => Self::Pending,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Refund {
    pub id: Uuid,
    pub order_id: i64,
    pub order_number: OrderNumber,
    pub amount: Money,
    pub state: RefundState,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub lease_until: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RefundOutcome {
    Issued,
    Failed(String),
}

/// Catalog data copied into a cart line.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductInfo {
    pub name: String,
    pub image: Option<String>,
    pub price: Money,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts the header and lines and clears the owner's cart in one transaction.
    /// A number collision surfaces as `Error::DuplicateOrderNumber`.
    async fn insert_submission(&self, order: &NewOrder) -> Result<OrderHeader>;

    async fn get(&self, key: &OrderKey) -> Result<Option<OrderHeader>>;

    async fn lines(&self, order_id: i64) -> Result<Vec<OrderLine>>;

    /// Locks the row, applies `mutation` and writes the result back, all in
    /// one transaction. `RefundOwed` events raised by the mutation are
    /// recorded in the refund ledger inside the same transaction.
    async fn transition(&self, key: &OrderKey, mutation: Mutation) -> Result<Order>;

    async fn search(&self, filter: &OrderFilter, page: PageRequest) -> Result<Page<OrderHeader>>;

    async fn count_by_status(&self, status: OrderStatus) -> Result<i64>;

    async fn sum_amount(&self, filter: &RangeFilter) -> Result<Money>;

    async fn count(&self, filter: &RangeFilter) -> Result<i64>;

    /// Best sellers among completed orders placed in `[begin, end]`.
    async fn top_sales(&self, begin: DateTime<Utc>, end: DateTime<Utc>, limit: u32) -> Result<Vec<ProductSales>>;

    /// Orders in `status` placed before `placed_before`.
    async fn stale(&self, status: OrderStatus, placed_before: DateTime<Utc>) -> Result<Vec<OrderHeader>>;
}

#[async_trait]
pub trait RefundLedger: Send + Sync {
    /// Moves up to `limit` refunds that are pending, or whose lease lapsed
    /// before `now`, to `Issuing` and leases them until `lease_until`. Rows
    /// claimed by another caller are skipped.
    async fn claim_refunds(&self, limit: u32, now: DateTime<Utc>, lease_until: DateTime<Utc>) -> Result<Vec<Refund>>;

    /// Records the outcome of one gateway call and releases the lease.
    async fn record_refund_attempt(&self, id: Uuid, outcome: RefundOutcome) -> Result<Refund>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn cart_lines(&self, user_id: i64) -> Result<Vec<CartLine>>;
    async fn insert_line(&self, line: &CartLine) -> Result<CartLine>;
    async fn set_quantity(&self, line_id: i64, quantity: Quantity) -> Result<()>;
    async fn delete_line(&self, line_id: i64) -> Result<()>;
    async fn clear_cart(&self, user_id: i64) -> Result<u64>;
    /// Inserts every line as a new row, never merging.
    async fn append_lines(&self, lines: &[CartLine]) -> Result<()>;
}

#[async_trait]
pub trait AddressBook: Send + Sync {
    async fn address(&self, id: i64) -> Result<Option<Address>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Users created in `[begin, end]`; `None` means since the beginning.
    async fn count_created_between(&self, begin: Option<DateTime<Utc>>, end: DateTime<Utc>) -> Result<i64>;
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn product(&self, product: ProductRef) -> Result<Option<ProductInfo>>;
}
