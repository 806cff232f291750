//! In-memory store for tests. One lock guards every table, so each trait
//! method is atomic in the same way a database transaction is.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{
    AddressBook, CartStore, Catalog, Mutation, OrderFilter, OrderKey, OrderStore, Page, PageRequest, ProductInfo,
    ProductSales, RangeFilter, Refund, RefundLedger, RefundOutcome, RefundState, UserDirectory,
};
use crate::domain::aggregates::{Address, CartLine, NewOrder, Order, OrderHeader, OrderLine, OrderStatus};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::{Money, ProductRef, Quantity};
use crate::{Error, Result};

#[derive(Default)]
struct Tables {
    orders: Vec<OrderHeader>,
    lines: HashMap<i64, Vec<OrderLine>>,
    cart: Vec<CartLine>,
    refunds: Vec<Refund>,
    addresses: HashMap<i64, Address>,
    users: Vec<DateTime<Utc>>,
    products: HashMap<ProductRef, ProductInfo>,
    next_id: i64,
    /// Number of upcoming submissions to reject as number collisions.
    collisions: u32,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn find(&self, key: &OrderKey) -> Option<usize> {
        self.orders.iter().position(|o| match key {
            OrderKey::Id(id) => o.id == *id,
            OrderKey::Number(n) => &o.number == n,
        })
    }

    fn in_range(o: &OrderHeader, f: &RangeFilter) -> bool {
        f.begin.map_or(true, |b| o.order_time >= b)
            && f.end.map_or(true, |e| o.order_time <= e)
            && f.status.map_or(true, |s| o.status == s)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn add_address(&self, address: Address) {
        self.tables.lock().unwrap().addresses.insert(address.id, address);
    }

    pub fn add_user(&self, created_at: DateTime<Utc>) { self.tables.lock().unwrap().users.push(created_at); }

    pub fn add_product(&self, product: ProductRef, info: ProductInfo) {
        self.tables.lock().unwrap().products.insert(product, info);
    }

    pub fn fail_next_inserts(&self, n: u32) { self.tables.lock().unwrap().collisions = n; }

    /// Direct insert of a header and lines, bypassing the cart.
    pub fn seed_order(&self, mut header: OrderHeader, lines: Vec<OrderLine>) -> i64 {
        let mut t = self.tables.lock().unwrap();
        header.id = t.next_id();
        let id = header.id;
        t.orders.push(header);
        t.lines.insert(id, lines);
        id
    }

    pub fn order_count(&self) -> usize { self.tables.lock().unwrap().orders.len() }

    pub fn refunds(&self) -> Vec<Refund> { self.tables.lock().unwrap().refunds.clone() }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_submission(&self, order: &NewOrder) -> Result<OrderHeader> {
        let mut t = self.tables.lock().unwrap();
        if t.collisions > 0 {
            t.collisions -= 1;
            return Err(Error::DuplicateOrderNumber);
        }
        if t.orders.iter().any(|o| o.number == order.number) { return Err(Error::DuplicateOrderNumber); }
        let id = t.next_id();
        let header = OrderHeader::inserted(id, order);
        t.orders.push(header.clone());
        t.lines.insert(id, order.lines.clone());
        t.cart.retain(|l| l.user_id != order.user_id);
        Ok(header)
    }

    async fn get(&self, key: &OrderKey) -> Result<Option<OrderHeader>> {
        let t = self.tables.lock().unwrap();
        Ok(t.find(key).map(|i| t.orders[i].clone()))
    }

    async fn lines(&self, order_id: i64) -> Result<Vec<OrderLine>> {
        Ok(self.tables.lock().unwrap().lines.get(&order_id).cloned().unwrap_or_default())
    }

    async fn transition(&self, key: &OrderKey, mutation: Mutation) -> Result<Order> {
        let mut t = self.tables.lock().unwrap();
        let idx = t.find(key).ok_or(Error::OrderNotFound)?;
        let mut order = Order::restore(t.orders[idx].clone());
        mutation(&mut order)?;
        t.orders[idx] = order.header().clone();
        for event in order.events() {
            if let OrderEvent::RefundOwed { order_id, number, amount } = event {
                t.refunds.push(Refund {
                    id: Uuid::now_v7(),
                    order_id: *order_id,
                    order_number: number.clone(),
                    amount: *amount,
                    state: RefundState::Pending,
                    attempts: 0,
                    last_error: None,
                    created_at: Utc::now(),
                    lease_until: None,
                });
            }
        }
        Ok(order)
    }

    async fn search(&self, filter: &OrderFilter, page: PageRequest) -> Result<Page<OrderHeader>> {
        let t = self.tables.lock().unwrap();
        let mut hits: Vec<OrderHeader> = t
            .orders
            .iter()
            .filter(|o| filter.number.as_deref().map_or(true, |n| o.number.as_str().contains(n)))
            .filter(|o| filter.phone.as_deref().map_or(true, |p| o.phone.contains(p)))
            .filter(|o| filter.status.map_or(true, |s| o.status == s))
            .filter(|o| filter.user_id.map_or(true, |u| o.user_id == u))
            .filter(|o| filter.begin_time.map_or(true, |b| o.order_time >= b))
            .filter(|o| filter.end_time.map_or(true, |e| o.order_time <= e))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.order_time.cmp(&a.order_time).then(b.id.cmp(&a.id)));
        let total = hits.len() as i64;
        let records = hits.into_iter().skip(page.offset() as usize).take(page.limit() as usize).collect();
        Ok(Page { total, records })
    }

    async fn count_by_status(&self, status: OrderStatus) -> Result<i64> {
        Ok(self.tables.lock().unwrap().orders.iter().filter(|o| o.status == status).count() as i64)
    }

    async fn sum_amount(&self, filter: &RangeFilter) -> Result<Money> {
        let t = self.tables.lock().unwrap();
        Ok(t.orders.iter().filter(|o| Tables::in_range(o, filter)).fold(Money::zero(), |acc, o| acc.add(o.amount)))
    }

    async fn count(&self, filter: &RangeFilter) -> Result<i64> {
        let t = self.tables.lock().unwrap();
        Ok(t.orders.iter().filter(|o| Tables::in_range(o, filter)).count() as i64)
    }

    async fn top_sales(&self, begin: DateTime<Utc>, end: DateTime<Utc>, limit: u32) -> Result<Vec<ProductSales>> {
        let t = self.tables.lock().unwrap();
        let range = RangeFilter { begin: Some(begin), end: Some(end), status: Some(OrderStatus::Completed) };
        let mut totals: HashMap<String, i64> = HashMap::new();
        for o in t.orders.iter().filter(|o| Tables::in_range(o, &range)) {
            for l in t.lines.get(&o.id).into_iter().flatten() {
                *totals.entry(l.name.clone()).or_default() += i64::from(l.quantity.value());
            }
        }
        let mut sales: Vec<ProductSales> = totals.into_iter().map(|(name, number)| ProductSales { name, number }).collect();
        sales.sort_by(|a, b| b.number.cmp(&a.number).then_with(|| a.name.cmp(&b.name)));
        sales.truncate(limit as usize);
        Ok(sales)
    }

    async fn stale(&self, status: OrderStatus, placed_before: DateTime<Utc>) -> Result<Vec<OrderHeader>> {
        let t = self.tables.lock().unwrap();
        Ok(t.orders.iter().filter(|o| o.status == status && o.order_time < placed_before).cloned().collect())
    }
}

#[async_trait]
impl RefundLedger for MemoryStore {
    async fn claim_refunds(&self, limit: u32, now: DateTime<Utc>, lease_until: DateTime<Utc>) -> Result<Vec<Refund>> {
        let mut t = self.tables.lock().unwrap();
        let claimable = |r: &Refund| match r.state {
            RefundState::Pending => true,
            RefundState::Issuing => r.lease_until.map_or(true, |l| l < now),
            RefundState::Issued | RefundState::Failed => false,
        };
        Ok(t.refunds
            .iter_mut()
            .filter(|r| claimable(&**r))
            .take(limit as usize)
            .map(|r| {
                r.state = RefundState::Issuing;
                r.lease_until = Some(lease_until);
                r.clone()
            })
            .collect())
    }

    async fn record_refund_attempt(&self, id: Uuid, outcome: RefundOutcome) -> Result<Refund> {
        let mut t = self.tables.lock().unwrap();
        let refund = t.refunds.iter_mut().find(|r| r.id == id).ok_or_else(|| Error::DataCorruption(id.to_string()))?;
        refund.attempts += 1;
        refund.state = RefundState::after_attempt(refund.attempts, &outcome);
        refund.lease_until = None;
        refund.last_error = match outcome {
            RefundOutcome::Issued => None,
            RefundOutcome::Failed(reason) => Some(reason),
        };
        Ok(refund.clone())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn cart_lines(&self, user_id: i64) -> Result<Vec<CartLine>> {
        Ok(self.tables.lock().unwrap().cart.iter().filter(|l| l.user_id == user_id).cloned().collect())
    }

    async fn insert_line(&self, line: &CartLine) -> Result<CartLine> {
        let mut t = self.tables.lock().unwrap();
        let stored = CartLine { id: Some(t.next_id()), ..line.clone() };
        t.cart.push(stored.clone());
        Ok(stored)
    }

    async fn set_quantity(&self, line_id: i64, quantity: Quantity) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        let line = t.cart.iter_mut().find(|l| l.id == Some(line_id)).ok_or(Error::CartLineNotFound)?;
        line.quantity = quantity;
        Ok(())
    }

    async fn delete_line(&self, line_id: i64) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        let before = t.cart.len();
        t.cart.retain(|l| l.id != Some(line_id));
        if t.cart.len() == before { return Err(Error::CartLineNotFound); }
        Ok(())
    }

    async fn clear_cart(&self, user_id: i64) -> Result<u64> {
        let mut t = self.tables.lock().unwrap();
        let before = t.cart.len();
        t.cart.retain(|l| l.user_id != user_id);
        Ok((before - t.cart.len()) as u64)
    }

    async fn append_lines(&self, lines: &[CartLine]) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        for line in lines {
            let stored = CartLine { id: Some(t.next_id()), ..line.clone() };
            t.cart.push(stored);
        }
        Ok(())
    }
}

#[async_trait]
impl AddressBook for MemoryStore {
    async fn address(&self, id: i64) -> Result<Option<Address>> {
        Ok(self.tables.lock().unwrap().addresses.get(&id).cloned())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn count_created_between(&self, begin: Option<DateTime<Utc>>, end: DateTime<Utc>) -> Result<i64> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().filter(|c| begin.map_or(true, |b| **c >= b) && **c <= end).count() as i64)
    }
}

#[async_trait]
impl Catalog for MemoryStore {
    async fn product(&self, product: ProductRef) -> Result<Option<ProductInfo>> {
        Ok(self.tables.lock().unwrap().products.get(&product).cloned())
    }
}
