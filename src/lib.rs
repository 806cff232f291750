//! Takeout Orders
//!
//! Back end for a food-delivery shop, centred on the order lifecycle.
//!
//! ## Features
//! - Cart consolidation into orders, with delivery-radius validation
//! - Payment, staff accept/reject, dispatch and completion
//! - Customer and staff cancellation with refund bookkeeping
//! - "Repeat order" replay into the cart
//! - Turnover, user, order and top-sales reporting

pub mod cart;
pub mod config;
pub mod domain;
pub mod engine;
pub mod events;
pub mod geo;
pub mod payment;
pub mod reporting;
pub mod routes;
pub mod store;
pub mod tasks;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::aggregates::{Action, OrderError, OrderStatus};
use crate::domain::value_objects::ValueError;

// =============================================================================
// Core Types
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Staff,
}

/// Who is performing an operation. Passed explicitly to every engine call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn customer(user_id: i64) -> Self { Self { user_id, role: Role::Customer } }
    pub fn staff(user_id: i64) -> Self { Self { user_id, role: Role::Staff } }

    pub fn require_staff(&self) -> Result<()> {
        if self.role != Role::Staff { return Err(Error::Forbidden); }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressSide {
    Shop,
    Customer,
}

// =============================================================================
// Error Types
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    StateConflict,
    Integrity,
    Forbidden,
    Internal,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Address book entry not found")]
    AddressMissing,

    #[error("Could not resolve {0:?} address")]
    AddressUnresolvable(AddressSide),

    #[error("Route planning failed")]
    RoutingFailed,

    #[error("Delivery distance {distance_m} m exceeds the {limit_m} m radius")]
    OutOfRange { distance_m: u64, limit_m: u64 },

    #[error("Shopping cart is empty")]
    CartEmpty,

    #[error("Cart line not found")]
    CartLineNotFound,

    #[error("Product not found")]
    ProductNotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Cannot {action:?} an order in status {status:?}")]
    InvalidState { status: OrderStatus, action: Action },

    #[error("Order number already taken")]
    DuplicateOrderNumber,

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Operation not permitted")]
    Forbidden,

    #[error("Missing or invalid caller identity")]
    Unauthenticated,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    DataCorruption(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AddressMissing
            | Self::AddressUnresolvable(_)
            | Self::RoutingFailed
            | Self::OutOfRange { .. }
            | Self::CartEmpty
            | Self::PaymentDeclined(_)
            | Self::InvalidRequest(_) => ErrorKind::Validation,
            Self::CartLineNotFound | Self::ProductNotFound | Self::OrderNotFound => ErrorKind::NotFound,
            Self::InvalidState { .. } => ErrorKind::StateConflict,
            Self::DuplicateOrderNumber => ErrorKind::Integrity,
            Self::Forbidden | Self::Unauthenticated => ErrorKind::Forbidden,
            Self::Storage(_) | Self::DataCorruption(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AddressMissing => "ADDRESS_MISSING",
            Self::AddressUnresolvable(AddressSide::Shop) => "SHOP_ADDRESS_UNRESOLVABLE",
            Self::AddressUnresolvable(AddressSide::Customer) => "ADDRESS_UNRESOLVABLE",
            Self::RoutingFailed => "ROUTING_FAILED",
            Self::OutOfRange { .. } => "OUT_OF_RANGE",
            Self::CartEmpty => "CART_EMPTY",
            Self::CartLineNotFound => "CART_LINE_NOT_FOUND",
            Self::ProductNotFound => "PRODUCT_NOT_FOUND",
            Self::OrderNotFound => "ORDER_NOT_FOUND",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::DuplicateOrderNumber => "DUPLICATE_ORDER_NUMBER",
            Self::PaymentDeclined(_) => "PAYMENT_DECLINED",
            Self::Forbidden => "FORBIDDEN",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Storage(_) | Self::DataCorruption(_) => "INTERNAL",
        }
    }
}

impl From<OrderError> for Error {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NoLines => Self::CartEmpty,
            OrderError::ForeignAddress => Self::AddressMissing,
            OrderError::InvalidState { status, action } => Self::InvalidState { status, action },
        }
    }
}

impl From<ValueError> for Error {
    fn from(e: ValueError) -> Self { Self::InvalidRequest(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, Error>;
