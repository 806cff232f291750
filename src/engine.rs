//! Order lifecycle engine.
//!
//! Every mutating operation goes through [`OrderStore::transition`], which
//! reloads the row under a lock, re-checks the status inside the aggregate
//! and writes back in the same transaction. Events are published only after
//! the commit.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::cart::CartService;
use crate::domain::aggregates::{
    Checkout, NewOrder, Order, OrderDetails, OrderError, OrderHeader, OrderLine, OrderStatus, PayMethod, PayStatus,
};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::{Money, OrderNumber};
use crate::events::EventPublisher;
use crate::geo::GeoValidator;
use crate::payment::PaymentGateway;
use crate::store::{AddressBook, Mutation, OrderFilter, OrderKey, OrderStore, Page, PageRequest};
use crate::{Actor, Error, ErrorKind, Result, Role};

/// Attempts at inserting a submission before a number collision is surfaced.
pub const MAX_NUMBER_ATTEMPTS: u32 = 3;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub shop_address: String,
    pub delivery_fee: Money,
}

#[derive(Clone, Debug, Default)]
pub struct SubmitOrder {
    pub address_book_id: i64,
    pub checkout: Checkout,
}

/// Search hit: the header plus a `name×qty;` summary of its lines.
#[derive(Clone, Debug, Serialize)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: OrderHeader,
    pub order_dishes: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub to_be_confirmed: i64,
    pub confirmed: i64,
    pub delivery_in_progress: i64,
}

pub struct OrderEngine {
    orders: Arc<dyn OrderStore>,
    addresses: Arc<dyn AddressBook>,
    cart: CartService,
    geo: GeoValidator,
    payments: Arc<dyn PaymentGateway>,
    events: Arc<dyn EventPublisher>,
    config: EngineConfig,
}

impl OrderEngine {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        addresses: Arc<dyn AddressBook>,
        cart: CartService,
        geo: GeoValidator,
        payments: Arc<dyn PaymentGateway>,
        events: Arc<dyn EventPublisher>,
        config: EngineConfig,
    ) -> Self {
        Self { orders, addresses, cart, geo, payments, events, config }
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Turns the actor's cart into a `PendingPayment` order. Nothing is
    /// written unless every check passes; the order, its lines and the
    /// emptied cart commit together.
    #[instrument(skip(self, request), fields(user_id = actor.user_id))]
    pub async fn submit(&self, actor: &Actor, request: SubmitOrder) -> Result<OrderHeader> {
        let address = self
            .addresses
            .address(request.address_book_id)
            .await?
            .filter(|a| a.user_id == actor.user_id)
            .ok_or(Error::AddressMissing)?;
        let cart = self.cart.consolidate(actor.user_id).await?;
        self.geo.validate_deliverable(&self.config.shop_address, &address.geocode_text()).await?;

        let mut new = NewOrder::from_cart(
            actor.user_id,
            &address,
            cart.lines(),
            request.checkout,
            self.config.delivery_fee,
            Utc::now(),
        )?;
        let mut attempt = 1;
        let header = loop {
            match self.orders.insert_submission(&new).await {
                Ok(header) => break header,
                Err(Error::DuplicateOrderNumber) if attempt < MAX_NUMBER_ATTEMPTS => {
                    warn!(order_number = %new.number, attempt, "order number collision, regenerating");
                    attempt += 1;
                    new.renumber(Utc::now());
                }
                Err(e) => return Err(e),
            }
        };

        let mut order = Order::placed(header);
        info!(order_id = order.id(), order_number = %order.number(), amount = %order.amount(), "order submitted");
        self.events.publish(&order.take_events()).await;
        Ok(order.into_header())
    }

    // =========================================================================
    // Payment
    // =========================================================================

    /// Charges the order and moves it to `ToBeConfirmed`. The charge is
    /// claimed under the row lock before the gateway is called, so at most
    /// one caller authorizes and nothing can cancel or expire the order while
    /// the charge is in flight. Paying an order that is already paid returns
    /// it unchanged without a second charge.
    #[instrument(skip(self), fields(user_id = actor.user_id))]
    pub async fn pay(&self, actor: &Actor, number: &OrderNumber, method: PayMethod) -> Result<OrderHeader> {
        let key = OrderKey::Number(number.clone());
        self.visible(actor, &key).await?;

        let claim: Mutation = Box::new(move |o: &mut Order| o.begin_payment(method).map(|_| ()));
        let claimed = self.orders.transition(&key, claim).await?;
        if claimed.pay_status() != PayStatus::Authorizing { return Ok(claimed.into_header()); }
        let amount = claimed.amount();

        if let Err(e) = self.payments.authorize(number, amount).await {
            warn!(order_number = %number, error = %e, "payment authorization failed");
            self.release_claim(&key).await;
            return Err(Error::PaymentDeclined(e.to_string()));
        }

        match self.apply(key.clone(), "pay", |o| o.settle_payment(Utc::now())).await {
            Ok(order) => Ok(order.into_header()),
            Err(e) => {
                error!(order_number = %number, %amount, error = %e, "authorized charge could not be recorded, voiding it");
                match self.payments.refund(Uuid::now_v7(), number, amount, amount).await {
                    Ok(()) => self.release_claim(&key).await,
                    Err(void) => error!(order_number = %number, %amount, error = %void, "void failed, charge needs manual reconciliation"),
                }
                Err(e)
            }
        }
    }

    // =========================================================================
    // Staff transitions
    // =========================================================================

    pub async fn confirm(&self, actor: &Actor, id: i64) -> Result<OrderHeader> {
        actor.require_staff()?;
        Ok(self.apply(OrderKey::Id(id), "confirm", |o| o.confirm()).await?.into_header())
    }

    pub async fn reject(&self, actor: &Actor, id: i64, reason: String) -> Result<OrderHeader> {
        actor.require_staff()?;
        Ok(self.apply(OrderKey::Id(id), "reject", move |o| o.reject(reason, Utc::now())).await?.into_header())
    }

    pub async fn cancel_by_shop(&self, actor: &Actor, id: i64, reason: String) -> Result<OrderHeader> {
        actor.require_staff()?;
        Ok(self.apply(OrderKey::Id(id), "cancel_by_shop", move |o| o.cancel_by_shop(reason, Utc::now())).await?.into_header())
    }

    pub async fn dispatch(&self, actor: &Actor, id: i64) -> Result<OrderHeader> {
        actor.require_staff()?;
        Ok(self.apply(OrderKey::Id(id), "dispatch", |o| o.dispatch()).await?.into_header())
    }

    pub async fn complete(&self, actor: &Actor, id: i64) -> Result<OrderHeader> {
        actor.require_staff()?;
        Ok(self.apply(OrderKey::Id(id), "complete", |o| o.complete(Utc::now())).await?.into_header())
    }

    // =========================================================================
    // Customer operations
    // =========================================================================

    pub async fn cancel_by_customer(&self, actor: &Actor, id: i64) -> Result<OrderHeader> {
        let key = OrderKey::Id(id);
        self.owned(actor, &key).await?;
        Ok(self.apply(key, "cancel_by_customer", |o| o.cancel_by_customer(Utc::now())).await?.into_header())
    }

    /// Copies the lines of one of the actor's orders back into their cart.
    pub async fn repeat(&self, actor: &Actor, id: i64) -> Result<usize> {
        self.cart.replay(id, actor.user_id).await
    }

    pub async fn history(&self, actor: &Actor, status: Option<OrderStatus>, page: PageRequest) -> Result<Page<OrderDetails>> {
        let filter = OrderFilter { status, user_id: Some(actor.user_id), ..Default::default() };
        let found = self.orders.search(&filter, page).await?;
        let mut records = Vec::with_capacity(found.records.len());
        for order in found.records {
            let lines = self.orders.lines(order.id).await?;
            records.push(OrderDetails { order, lines });
        }
        Ok(Page { total: found.total, records })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn details(&self, actor: &Actor, id: i64) -> Result<OrderDetails> {
        let order = self.visible(actor, &OrderKey::Id(id)).await?;
        let lines = self.orders.lines(order.id).await?;
        Ok(OrderDetails { order, lines })
    }

    pub async fn search(&self, actor: &Actor, filter: &OrderFilter, page: PageRequest) -> Result<Page<OrderSummary>> {
        actor.require_staff()?;
        let found = self.orders.search(filter, page).await?;
        let mut records = Vec::with_capacity(found.records.len());
        for order in found.records {
            let lines = self.orders.lines(order.id).await?;
            records.push(OrderSummary { order_dishes: OrderLine::summary(&lines), order });
        }
        Ok(Page { total: found.total, records })
    }

    /// Dashboard buckets. Pending-payment and terminal orders are not counted.
    pub async fn status_counts(&self, actor: &Actor) -> Result<StatusCounts> {
        actor.require_staff()?;
        Ok(StatusCounts {
            to_be_confirmed: self.orders.count_by_status(OrderStatus::ToBeConfirmed).await?,
            confirmed: self.orders.count_by_status(OrderStatus::Confirmed).await?,
            delivery_in_progress: self.orders.count_by_status(OrderStatus::DeliveryInProgress).await?,
        })
    }

    // =========================================================================
    // Timeouts
    // =========================================================================

    /// Cancels unpaid orders placed before `cutoff`. Orders that moved on in
    /// the meantime are skipped.
    pub async fn expire_unpaid(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.sweep(OrderStatus::PendingPayment, cutoff, "expire", |o| o.expire(Utc::now())).await
    }

    /// Completes deliveries dispatched for orders placed before `cutoff`.
    pub async fn complete_overdue(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.sweep(OrderStatus::DeliveryInProgress, cutoff, "auto_complete", |o| o.complete(Utc::now())).await
    }

    async fn sweep(
        &self,
        status: OrderStatus,
        cutoff: DateTime<Utc>,
        action: &'static str,
        step: fn(&mut Order) -> std::result::Result<(), OrderError>,
    ) -> Result<usize> {
        let mut done = 0;
        for header in self.orders.stale(status, cutoff).await? {
            match self.apply(OrderKey::Id(header.id), action, step).await {
                Ok(_) => done += 1,
                Err(e) if e.kind() == ErrorKind::StateConflict => {}
                Err(e) => return Err(e),
            }
        }
        Ok(done)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn apply<F>(&self, key: OrderKey, action: &'static str, step: F) -> Result<Order>
    where
        F: FnOnce(&mut Order) -> std::result::Result<(), OrderError> + Send + 'static,
    {
        let mut order = match self.orders.transition(&key, Box::new(step)).await {
            Ok(order) => order,
            Err(e) => {
                if e.kind() != ErrorKind::Internal { warn!(?key, action, code = e.code(), "order transition refused"); }
                return Err(e);
            }
        };
        let events = order.take_events();
        if events.iter().any(|e| matches!(e, OrderEvent::RefundOwed { .. })) {
            info!(order_id = order.id(), order_number = %order.number(), "refund queued");
        }
        info!(order_id = order.id(), order_number = %order.number(), status = ?order.status(), action, "order transitioned");
        self.events.publish(&events).await;
        Ok(order)
    }

    async fn release_claim(&self, key: &OrderKey) {
        if let Err(e) = self.orders.transition(key, Box::new(|o: &mut Order| o.abort_payment())).await {
            error!(?key, error = %e, "payment claim could not be released");
        }
    }

    /// Loads an order the actor may see: staff see everything, customers
    /// only their own. Anything else reads as not found.
    async fn visible(&self, actor: &Actor, key: &OrderKey) -> Result<OrderHeader> {
        let header = self.orders.get(key).await?.ok_or(Error::OrderNotFound)?;
        if actor.role == Role::Customer && header.user_id != actor.user_id { return Err(Error::OrderNotFound); }
        Ok(header)
    }

    async fn owned(&self, actor: &Actor, key: &OrderKey) -> Result<OrderHeader> {
        let header = self.orders.get(key).await?.ok_or(Error::OrderNotFound)?;
        if header.user_id != actor.user_id { return Err(Error::OrderNotFound); }
        Ok(header)
    }
}
