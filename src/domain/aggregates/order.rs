//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::aggregates::cart::CartLine;
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::{Money, OrderNumber, ProductRef, Quantity};

pub const CUSTOMER_CANCEL_REASON: &str = "user cancelled";
pub const PAYMENT_TIMEOUT_REASON: &str = "payment timed out";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment = 1,
    ToBeConfirmed = 2,
    Confirmed = 3,
    DeliveryInProgress = 4,
    Completed = 5,
    Cancelled = 6,
}

impl OrderStatus {
    pub fn code(self) -> i16 { self as i16 }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(Self::PendingPayment),
            2 => Some(Self::ToBeConfirmed),
            3 => Some(Self::Confirmed),
            4 => Some(Self::DeliveryInProgress),
            5 => Some(Self::Completed),
            6 => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool { matches!(self, Self::Completed | Self::Cancelled) }

    /// The directed edges of the lifecycle. Nothing else may change a status.
    pub fn can_transition_to(self, next: Self) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (PendingPayment, ToBeConfirmed)
                | (ToBeConfirmed, Confirmed)
                | (Confirmed, DeliveryInProgress)
                | (DeliveryInProgress, Completed)
                | (PendingPayment | ToBeConfirmed | Confirmed, Cancelled)
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayStatus {
    Unpaid = 0,
    Paid = 1,
    Refunded = 2,
    /// A charge has been claimed and is in flight with the gateway.
    Authorizing = 3,
}

impl PayStatus {
    pub fn code(self) -> i16 { self as i16 }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Unpaid),
            1 => Some(Self::Paid),
            2 => Some(Self::Refunded),
            3 => Some(Self::Authorizing),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayMethod {
    WeChat = 1,
    Alipay = 2,
}

impl PayMethod {
    pub fn code(self) -> i16 { self as i16 }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(Self::WeChat),
            2 => Some(Self::Alipay),
            _ => None,
        }
    }
}

/// Lifecycle operation names, carried by `InvalidState` errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action { Pay, Confirm, Reject, CancelByShop, CancelByCustomer, Dispatch, Complete, Expire }

/// Address book entry owned by the customer. Read-only here.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    pub consignee: String,
    pub phone: String,
    pub province_name: String,
    pub city_name: String,
    pub district_name: String,
    pub detail: String,
}

impl Address {
    /// Full delivery string copied onto the order.
    pub fn full_text(&self) -> String {
        format!("{}{}{}{}", self.province_name, self.city_name, self.district_name, self.detail)
    }

    /// Text handed to the geocoder; the province is redundant once the city is known.
    pub fn geocode_text(&self) -> String {
        format!("{}{}{}", self.city_name, self.district_name, self.detail)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product: ProductRef,
    pub name: String,
    pub image: Option<String>,
    pub flavor: Option<String>,
    pub quantity: Quantity,
    pub unit_amount: Money,
}

impl OrderLine {
    pub fn from_cart(line: &CartLine) -> Self {
        Self {
            product: line.product,
            name: line.name.clone(),
            image: line.image.clone(),
            flavor: line.flavor.clone(),
            quantity: line.quantity,
            unit_amount: line.unit_amount,
        }
    }

    pub fn line_total(&self) -> Money { self.unit_amount.multiply(self.quantity) }

    /// `name×qty;` for every line, concatenated.
    pub fn summary(lines: &[OrderLine]) -> String {
        lines.iter().map(|l| format!("{}×{};", l.name, l.quantity.value())).collect()
    }
}

/// Optional extras supplied by the customer at checkout.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkout {
    pub remark: Option<String>,
    pub pay_method: Option<PayMethod>,
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    pub tableware_number: Option<i32>,
    pub pack_amount: Money,
}

/// An order that has passed validation but has no store id yet.
#[derive(Clone, Debug, PartialEq)]
pub struct NewOrder {
    pub number: OrderNumber,
    pub user_id: i64,
    pub address_book_id: i64,
    pub consignee: String,
    pub phone: String,
    pub address: String,
    pub amount: Money,
    pub checkout: Checkout,
    pub order_time: DateTime<Utc>,
    pub lines: Vec<OrderLine>,
}

impl NewOrder {
    /// Builds the order from a cart snapshot. The amount is the line total
    /// plus packaging and the delivery fee.
    pub fn from_cart(
        user_id: i64,
        address: &Address,
        cart: &[CartLine],
        checkout: Checkout,
        delivery_fee: Money,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if cart.is_empty() { return Err(OrderError::NoLines); }
        if address.user_id != user_id { return Err(OrderError::ForeignAddress); }
        let lines: Vec<OrderLine> = cart.iter().map(OrderLine::from_cart).collect();
        let amount = lines
            .iter()
            .fold(Money::zero(), |acc, l| acc.add(l.line_total()))
            .add(checkout.pack_amount)
            .add(delivery_fee);
        Ok(Self {
            number: OrderNumber::generate(now),
            user_id,
            address_book_id: address.id,
            consignee: address.consignee.clone(),
            phone: address.phone.clone(),
            address: address.full_text(),
            amount,
            checkout,
            order_time: now,
            lines,
        })
    }

    /// Fresh number after the store reported a collision.
    pub fn renumber(&mut self, now: DateTime<Utc>) { self.number = OrderNumber::generate(now); }
}

/// Persisted order header.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderHeader {
    pub id: i64,
    pub number: OrderNumber,
    pub user_id: i64,
    pub status: OrderStatus,
    pub pay_status: PayStatus,
    pub amount: Money,
    pub address_book_id: i64,
    pub consignee: String,
    pub phone: String,
    pub address: String,
    #[serde(flatten)]
    pub checkout: Checkout,
    pub order_time: DateTime<Utc>,
    pub checkout_time: Option<DateTime<Utc>>,
    pub delivery_time: Option<DateTime<Utc>>,
    pub cancel_time: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub rejection_reason: Option<String>,
}

impl OrderHeader {
    pub fn inserted(id: i64, new: &NewOrder) -> Self {
        Self {
            id,
            number: new.number.clone(),
            user_id: new.user_id,
            status: OrderStatus::PendingPayment,
            pay_status: PayStatus::Unpaid,
            amount: new.amount,
            address_book_id: new.address_book_id,
            consignee: new.consignee.clone(),
            phone: new.phone.clone(),
            address: new.address.clone(),
            checkout: new.checkout.clone(),
            order_time: new.order_time,
            checkout_time: None,
            delivery_time: None,
            cancel_time: None,
            cancel_reason: None,
            rejection_reason: None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Order {
    #[serde(flatten)]
    header: OrderHeader,
    #[serde(skip)]
    events: Vec<OrderEvent>,
}

impl Order {
    pub fn restore(header: OrderHeader) -> Self { Self { header, events: vec![] } }

    /// Wraps a freshly inserted header and records the submission.
    pub fn placed(header: OrderHeader) -> Self {
        let mut order = Self::restore(header);
        order.raise_event(OrderEvent::Submitted {
            order_id: order.header.id,
            number: order.header.number.clone(),
            user_id: order.header.user_id,
            amount: order.header.amount,
        });
        order
    }

    pub fn header(&self) -> &OrderHeader { &self.header }
    pub fn into_header(self) -> OrderHeader { self.header }
    pub fn id(&self) -> i64 { self.header.id }
    pub fn number(&self) -> &OrderNumber { &self.header.number }
    pub fn user_id(&self) -> i64 { self.header.user_id }
    pub fn status(&self) -> OrderStatus { self.header.status }
    pub fn pay_status(&self) -> PayStatus { self.header.pay_status }
    pub fn amount(&self) -> Money { self.header.amount }

    /// Claims the order for a charge. Returns `false` when it was already
    /// paid and nothing changed. While the claim is held no other caller can
    /// pay, cancel or expire the order.
    pub fn begin_payment(&mut self, method: PayMethod) -> Result<bool, OrderError> {
        match (self.header.status, self.header.pay_status) {
            (OrderStatus::PendingPayment, PayStatus::Unpaid) => {
                self.header.pay_status = PayStatus::Authorizing;
                self.header.checkout.pay_method = Some(method);
                Ok(true)
            }
            (status, PayStatus::Paid) if !status.is_terminal() || status == OrderStatus::Completed => Ok(false),
            (status, _) => Err(OrderError::InvalidState { status, action: Action::Pay }),
        }
    }

    /// Records an authorized charge against a claimed order.
    pub fn settle_payment(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.require_claim()?;
        self.move_to(OrderStatus::ToBeConfirmed, Action::Pay)?;
        self.header.pay_status = PayStatus::Paid;
        self.header.checkout_time = Some(now);
        self.raise_event(OrderEvent::Paid {
            order_id: self.header.id,
            number: self.header.number.clone(),
            amount: self.header.amount,
        });
        Ok(())
    }

    /// Releases a claim after the gateway refused the charge.
    pub fn abort_payment(&mut self) -> Result<(), OrderError> {
        self.require_claim()?;
        self.header.pay_status = PayStatus::Unpaid;
        Ok(())
    }

    pub fn confirm(&mut self) -> Result<(), OrderError> {
        self.require(OrderStatus::ToBeConfirmed, Action::Confirm)?;
        self.move_to(OrderStatus::Confirmed, Action::Confirm)?;
        self.raise_event(OrderEvent::Confirmed { order_id: self.header.id });
        Ok(())
    }

    pub fn reject(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.require(OrderStatus::ToBeConfirmed, Action::Reject)?;
        let reason = reason.into();
        self.move_to(OrderStatus::Cancelled, Action::Reject)?;
        self.header.rejection_reason = Some(reason.clone());
        self.header.cancel_time = Some(now);
        self.raise_event(OrderEvent::Rejected { order_id: self.header.id, reason });
        self.owe_refund_if_paid();
        Ok(())
    }

    pub fn cancel_by_shop(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.cancel(reason.into(), now, Action::CancelByShop)
    }

    pub fn cancel_by_customer(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.cancel(CUSTOMER_CANCEL_REASON.to_string(), now, Action::CancelByCustomer)
    }

    /// Cancels an order whose payment window has lapsed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.require(OrderStatus::PendingPayment, Action::Expire)?;
        self.cancel(PAYMENT_TIMEOUT_REASON.to_string(), now, Action::Expire)
    }

    pub fn dispatch(&mut self) -> Result<(), OrderError> {
        self.require(OrderStatus::Confirmed, Action::Dispatch)?;
        self.move_to(OrderStatus::DeliveryInProgress, Action::Dispatch)?;
        self.raise_event(OrderEvent::Dispatched { order_id: self.header.id });
        Ok(())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.require(OrderStatus::DeliveryInProgress, Action::Complete)?;
        self.move_to(OrderStatus::Completed, Action::Complete)?;
        self.header.delivery_time = Some(now);
        self.raise_event(OrderEvent::Completed { order_id: self.header.id });
        Ok(())
    }

    pub fn events(&self) -> &[OrderEvent] { &self.events }
    pub fn take_events(&mut self) -> Vec<OrderEvent> { std::mem::take(&mut self.events) }

    fn cancel(&mut self, reason: String, now: DateTime<Utc>, action: Action) -> Result<(), OrderError> {
        if self.header.pay_status == PayStatus::Authorizing {
            return Err(OrderError::InvalidState { status: self.header.status, action });
        }
        self.move_to(OrderStatus::Cancelled, action)?;
        self.header.cancel_reason = Some(reason.clone());
        self.header.cancel_time = Some(now);
        self.raise_event(OrderEvent::Cancelled { order_id: self.header.id, reason });
        self.owe_refund_if_paid();
        Ok(())
    }

    fn owe_refund_if_paid(&mut self) {
        if self.header.pay_status != PayStatus::Paid { return; }
        self.header.pay_status = PayStatus::Refunded;
        self.raise_event(OrderEvent::RefundOwed {
            order_id: self.header.id,
            number: self.header.number.clone(),
            amount: self.header.amount,
        });
    }

    fn require_claim(&self) -> Result<(), OrderError> {
        if (self.header.status, self.header.pay_status) != (OrderStatus::PendingPayment, PayStatus::Authorizing) {
            return Err(OrderError::InvalidState { status: self.header.status, action: Action::Pay });
        }
        Ok(())
    }

    fn require(&self, expected: OrderStatus, action: Action) -> Result<(), OrderError> {
        if self.header.status != expected {
            return Err(OrderError::InvalidState { status: self.header.status, action });
        }
        Ok(())
    }

    fn move_to(&mut self, next: OrderStatus, action: Action) -> Result<(), OrderError> {
        if !self.header.status.can_transition_to(next) {
            return Err(OrderError::InvalidState { status: self.header.status, action });
        }
        self.header.status = next;
        Ok(())
    }

    fn raise_event(&mut self, e: OrderEvent) { self.events.push(e); }
}

/// An order together with its full line collection.
#[derive(Clone, Debug, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: OrderHeader,
    pub lines: Vec<OrderLine>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("order has no lines")]
    NoLines,
    #[error("address belongs to another user")]
    ForeignAddress,
    #[error("cannot {action:?} an order in status {status:?}")]
    InvalidState { status: OrderStatus, action: Action },
}
