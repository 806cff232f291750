//! PostgreSQL implementation of every storage seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use super::{
    AddressBook, CartStore, Catalog, Mutation, OrderFilter, OrderKey, OrderStore, Page, PageRequest, ProductInfo,
    ProductSales, RangeFilter, Refund, RefundLedger, RefundOutcome, RefundState, UserDirectory,
};
use crate::domain::aggregates::{
    Address, CartLine, Checkout, NewOrder, Order, OrderHeader, OrderLine, OrderStatus, PayMethod, PayStatus,
};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::{Money, OrderNumber, ProductRef, Quantity};
use crate::{Error, Result};

const ORDER_NUMBER_CONSTRAINT: &str = "orders_number_key";

const ORDER_COLUMNS: &str = "id, number, status, user_id, address_book_id, order_time, checkout_time, \
    pay_method, pay_status, amount, remark, phone, address, consignee, cancel_reason, rejection_reason, \
    cancel_time, estimated_delivery_time, delivery_time, pack_amount, tableware_number";

const REFUND_COLUMNS: &str = "id, order_id, order_number, amount, state, attempts, last_error, created_at, lease_until";

const SEARCH_PREDICATE: &str = "WHERE ($1::varchar IS NULL OR number LIKE '%' || $1 || '%') \
    AND ($2::varchar IS NULL OR phone LIKE '%' || $2 || '%') \
    AND ($3::smallint IS NULL OR status = $3) \
    AND ($4::bigint IS NULL OR user_id = $4) \
    AND ($5::timestamptz IS NULL OR order_time >= $5) \
    AND ($6::timestamptz IS NULL OR order_time <= $6)";

const RANGE_PREDICATE: &str = "WHERE ($1::timestamptz IS NULL OR order_time >= $1) \
    AND ($2::timestamptz IS NULL OR order_time <= $2) \
    AND ($3::smallint IS NULL OR status = $3)";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn connect(database_url: &str) -> std::result::Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool { &self.pool }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    number: String,
    status: i16,
    user_id: i64,
    address_book_id: i64,
    order_time: DateTime<Utc>,
    checkout_time: Option<DateTime<Utc>>,
    pay_method: Option<i16>,
    pay_status: i16,
    amount: Decimal,
    remark: Option<String>,
    phone: String,
    address: String,
    consignee: String,
    cancel_reason: Option<String>,
    rejection_reason: Option<String>,
    cancel_time: Option<DateTime<Utc>>,
    estimated_delivery_time: Option<DateTime<Utc>>,
    delivery_time: Option<DateTime<Utc>>,
    pack_amount: Decimal,
    tableware_number: Option<i32>,
}

impl TryFrom<OrderRow> for OrderHeader {
    type Error = Error;

    fn try_from(r: OrderRow) -> Result<Self> {
        let corrupt = |what: &str| Error::DataCorruption(format!("order {}: {what}", r.id));
        Ok(Self {
            id: r.id,
            number: OrderNumber::parse(r.number.clone()).map_err(|_| corrupt("number"))?,
            user_id: r.user_id,
            status: OrderStatus::from_code(r.status).ok_or_else(|| corrupt("status"))?,
            pay_status: PayStatus::from_code(r.pay_status).ok_or_else(|| corrupt("pay_status"))?,
            amount: Money::new(r.amount).map_err(|_| corrupt("amount"))?,
            address_book_id: r.address_book_id,
            consignee: r.consignee,
            phone: r.phone,
            address: r.address,
            checkout: Checkout {
                remark: r.remark,
                pay_method: r.pay_method.and_then(PayMethod::from_code),
                estimated_delivery_time: r.estimated_delivery_time,
                tableware_number: r.tableware_number,
                pack_amount: Money::new(r.pack_amount).map_err(|_| corrupt("pack_amount"))?,
            },
            order_time: r.order_time,
            checkout_time: r.checkout_time,
            delivery_time: r.delivery_time,
            cancel_time: r.cancel_time,
            cancel_reason: r.cancel_reason,
            rejection_reason: r.rejection_reason,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LineRow {
    name: String,
    image: Option<String>,
    dish_id: Option<i64>,
    setmeal_id: Option<i64>,
    dish_flavor: Option<String>,
    number: i32,
    amount: Decimal,
}

impl TryFrom<LineRow> for OrderLine {
    type Error = Error;

    fn try_from(r: LineRow) -> Result<Self> {
        Ok(Self {
            product: ProductRef::from_columns(r.dish_id, r.setmeal_id).map_err(corrupt_value)?,
            name: r.name,
            image: r.image,
            flavor: r.dish_flavor,
            quantity: Quantity::try_from(r.number).map_err(corrupt_value)?,
            unit_amount: Money::new(r.amount).map_err(corrupt_value)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: i64,
    user_id: i64,
    name: String,
    image: Option<String>,
    dish_id: Option<i64>,
    setmeal_id: Option<i64>,
    dish_flavor: Option<String>,
    number: i32,
    amount: Decimal,
    create_time: DateTime<Utc>,
}

impl TryFrom<CartRow> for CartLine {
    type Error = Error;

    fn try_from(r: CartRow) -> Result<Self> {
        Ok(Self {
            id: Some(r.id),
            user_id: r.user_id,
            product: ProductRef::from_columns(r.dish_id, r.setmeal_id).map_err(corrupt_value)?,
            name: r.name,
            image: r.image,
            flavor: r.dish_flavor,
            quantity: Quantity::try_from(r.number).map_err(corrupt_value)?,
            unit_amount: Money::new(r.amount).map_err(corrupt_value)?,
            created_at: r.create_time,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RefundRow {
    id: Uuid,
    order_id: i64,
    order_number: String,
    amount: Decimal,
    state: String,
    attempts: i32,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    lease_until: Option<DateTime<Utc>>,
}

impl TryFrom<RefundRow> for Refund {
    type Error = Error;

    fn try_from(r: RefundRow) -> Result<Self> {
        Ok(Self {
            id: r.id,
            order_id: r.order_id,
            order_number: OrderNumber::parse(r.order_number).map_err(corrupt_value)?,
            amount: Money::new(r.amount).map_err(corrupt_value)?,
            state: RefundState::parse(&r.state)
                .ok_or_else(|| Error::DataCorruption(format!("refund {}: state {}", r.id, r.state)))?,
            attempts: r.attempts,
            last_error: r.last_error,
            created_at: r.created_at,
            lease_until: r.lease_until,
        })
    }
}

fn corrupt_value(e: impl std::fmt::Display) -> Error { Error::DataCorruption(e.to_string()) }

fn map_insert_error(e: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db) = &e {
        if db.constraint() == Some(ORDER_NUMBER_CONSTRAINT) { return Error::DuplicateOrderNumber; }
    }
    Error::Storage(e)
}

fn quantity_column(q: Quantity) -> Result<i32> {
    i32::try_from(q.value()).map_err(|_| Error::InvalidRequest(format!("quantity {} out of range", q.value())))
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_submission(&self, order: &NewOrder) -> Result<OrderHeader> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (
                number, status, user_id, address_book_id, order_time, pay_method, pay_status, amount,
                remark, phone, address, consignee, estimated_delivery_time, pack_amount, tableware_number
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING id
            "#,
        )
        .bind(order.number.as_str())
        .bind(OrderStatus::PendingPayment.code())
        .bind(order.user_id)
        .bind(order.address_book_id)
        .bind(order.order_time)
        .bind(order.checkout.pay_method.map(PayMethod::code))
        .bind(PayStatus::Unpaid.code())
        .bind(order.amount.amount())
        .bind(&order.checkout.remark)
        .bind(&order.phone)
        .bind(&order.address)
        .bind(&order.consignee)
        .bind(order.checkout.estimated_delivery_time)
        .bind(order.checkout.pack_amount.amount())
        .bind(order.checkout.tableware_number)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_insert_error)?;

        for line in &order.lines {
            let (dish_id, setmeal_id) = line.product.columns();
            sqlx::query(
                r#"
                INSERT INTO order_detail (order_id, name, image, dish_id, setmeal_id, dish_flavor, number, amount)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(id)
            .bind(&line.name)
            .bind(&line.image)
            .bind(dish_id)
            .bind(setmeal_id)
            .bind(&line.flavor)
            .bind(quantity_column(line.quantity)?)
            .bind(line.unit_amount.amount())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM shopping_cart WHERE user_id = $1")
            .bind(order.user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(OrderHeader::inserted(id, order))
    }

    async fn get(&self, key: &OrderKey) -> Result<Option<OrderHeader>> {
        let row = match key {
            OrderKey::Id(id) => {
                sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            OrderKey::Number(number) => {
                sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE number = $1"))
                    .bind(number.as_str())
                    .fetch_optional(&self.pool)
                    .await?
            }
        };
        row.map(OrderHeader::try_from).transpose()
    }

    async fn lines(&self, order_id: i64) -> Result<Vec<OrderLine>> {
        sqlx::query_as::<_, LineRow>(
            "SELECT name, image, dish_id, setmeal_id, dish_flavor, number, amount FROM order_detail WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(OrderLine::try_from)
        .collect()
    }

    async fn transition(&self, key: &OrderKey, mutation: Mutation) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let row = match key {
            OrderKey::Id(id) => {
                sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"))
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            OrderKey::Number(number) => {
                sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE number = $1 FOR UPDATE"))
                    .bind(number.as_str())
                    .fetch_optional(&mut *tx)
                    .await?
            }
        };
        let row = row.ok_or(Error::OrderNotFound)?;
        let mut order = Order::restore(OrderHeader::try_from(row)?);
        mutation(&mut order)?;

        let h = order.header();
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, pay_status = $3, checkout_time = $4, delivery_time = $5,
                cancel_time = $6, cancel_reason = $7, rejection_reason = $8, pay_method = $9
            WHERE id = $1
            "#,
        )
        .bind(h.id)
        .bind(h.status.code())
        .bind(h.pay_status.code())
        .bind(h.checkout_time)
        .bind(h.delivery_time)
        .bind(h.cancel_time)
        .bind(&h.cancel_reason)
        .bind(&h.rejection_reason)
        .bind(h.checkout.pay_method.map(PayMethod::code))
        .execute(&mut *tx)
        .await?;

        let now = Utc::now();
        for event in order.events() {
            if let OrderEvent::RefundOwed { order_id, number, amount } = event {
                sqlx::query(
                    r#"
                    INSERT INTO refunds (id, order_id, order_number, amount, state, attempts, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, 0, $6, $6)
                    "#,
                )
                .bind(Uuid::now_v7())
                .bind(order_id)
                .bind(number.as_str())
                .bind(amount.amount())
                .bind(RefundState::Pending.as_str())
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(order)
    }

    async fn search(&self, filter: &OrderFilter, page: PageRequest) -> Result<Page<OrderHeader>> {
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM orders {SEARCH_PREDICATE}"))
            .bind(&filter.number)
            .bind(&filter.phone)
            .bind(filter.status.map(OrderStatus::code))
            .bind(filter.user_id)
            .bind(filter.begin_time)
            .bind(filter.end_time)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders {SEARCH_PREDICATE} ORDER BY order_time DESC, id DESC LIMIT $7 OFFSET $8"
        ))
        .bind(&filter.number)
        .bind(&filter.phone)
        .bind(filter.status.map(OrderStatus::code))
        .bind(filter.user_id)
        .bind(filter.begin_time)
        .bind(filter.end_time)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let records = rows.into_iter().map(OrderHeader::try_from).collect::<Result<Vec<_>>>()?;
        Ok(Page { total, records })
    }

    async fn count_by_status(&self, status: OrderStatus) -> Result<i64> {
        let n = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status = $1")
            .bind(status.code())
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn sum_amount(&self, filter: &RangeFilter) -> Result<Money> {
        let sum: Decimal = sqlx::query_scalar(&format!("SELECT COALESCE(SUM(amount), 0) FROM orders {RANGE_PREDICATE}"))
            .bind(filter.begin)
            .bind(filter.end)
            .bind(filter.status.map(OrderStatus::code))
            .fetch_one(&self.pool)
            .await?;
        Money::new(sum).map_err(corrupt_value)
    }

    async fn count(&self, filter: &RangeFilter) -> Result<i64> {
        let n = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM orders {RANGE_PREDICATE}"))
            .bind(filter.begin)
            .bind(filter.end)
            .bind(filter.status.map(OrderStatus::code))
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn top_sales(&self, begin: DateTime<Utc>, end: DateTime<Utc>, limit: u32) -> Result<Vec<ProductSales>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT od.name, SUM(od.number)::bigint AS number
            FROM order_detail od
            JOIN orders o ON od.order_id = o.id
            WHERE o.status = $1 AND o.order_time >= $2 AND o.order_time <= $3
            GROUP BY od.name
            ORDER BY number DESC, od.name
            LIMIT $4
            "#,
        )
        .bind(OrderStatus::Completed.code())
        .bind(begin)
        .bind(end)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name, number)| ProductSales { name, number }).collect())
    }

    async fn stale(&self, status: OrderStatus, placed_before: DateTime<Utc>) -> Result<Vec<OrderHeader>> {
        sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 AND order_time < $2 ORDER BY order_time"
        ))
        .bind(status.code())
        .bind(placed_before)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(OrderHeader::try_from)
        .collect()
    }
}

#[async_trait]
impl RefundLedger for PgStore {
    async fn claim_refunds(&self, limit: u32, now: DateTime<Utc>, lease_until: DateTime<Utc>) -> Result<Vec<Refund>> {
        sqlx::query_as::<_, RefundRow>(&format!(
            r#"
            UPDATE refunds SET state = $1, lease_until = $2, updated_at = $3
            WHERE id IN (
                SELECT id FROM refunds
                WHERE state = $4 OR (state = $1 AND lease_until < $3)
                ORDER BY created_at
                LIMIT $5
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {REFUND_COLUMNS}
            "#
        ))
        .bind(RefundState::Issuing.as_str())
        .bind(lease_until)
        .bind(now)
        .bind(RefundState::Pending.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Refund::try_from)
        .collect()
    }

    async fn record_refund_attempt(&self, id: Uuid, outcome: RefundOutcome) -> Result<Refund> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, RefundRow>(&format!("SELECT {REFUND_COLUMNS} FROM refunds WHERE id = $1 FOR UPDATE"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::DataCorruption(format!("refund {id} vanished")))?;

        let mut refund = Refund::try_from(row)?;
        refund.attempts += 1;
        refund.state = RefundState::after_attempt(refund.attempts, &outcome);
        refund.lease_until = None;
        refund.last_error = match outcome {
            RefundOutcome::Issued => None,
            RefundOutcome::Failed(reason) => Some(reason),
        };

        sqlx::query("UPDATE refunds SET state = $2, attempts = $3, last_error = $4, lease_until = NULL, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(refund.state.as_str())
            .bind(refund.attempts)
            .bind(&refund.last_error)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(refund)
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn cart_lines(&self, user_id: i64) -> Result<Vec<CartLine>> {
        sqlx::query_as::<_, CartRow>(
            r#"
            SELECT id, user_id, name, image, dish_id, setmeal_id, dish_flavor, number, amount, create_time
            FROM shopping_cart WHERE user_id = $1 ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(CartLine::try_from)
        .collect()
    }

    async fn insert_line(&self, line: &CartLine) -> Result<CartLine> {
        let (dish_id, setmeal_id) = line.product.columns();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO shopping_cart (user_id, name, image, dish_id, setmeal_id, dish_flavor, number, amount, create_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(line.user_id)
        .bind(&line.name)
        .bind(&line.image)
        .bind(dish_id)
        .bind(setmeal_id)
        .bind(&line.flavor)
        .bind(quantity_column(line.quantity)?)
        .bind(line.unit_amount.amount())
        .bind(line.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(CartLine { id: Some(id), ..line.clone() })
    }

    async fn set_quantity(&self, line_id: i64, quantity: Quantity) -> Result<()> {
        let done = sqlx::query("UPDATE shopping_cart SET number = $2 WHERE id = $1")
            .bind(line_id)
            .bind(quantity_column(quantity)?)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 { return Err(Error::CartLineNotFound); }
        Ok(())
    }

    async fn delete_line(&self, line_id: i64) -> Result<()> {
        let done = sqlx::query("DELETE FROM shopping_cart WHERE id = $1").bind(line_id).execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(Error::CartLineNotFound); }
        Ok(())
    }

    async fn clear_cart(&self, user_id: i64) -> Result<u64> {
        let done = sqlx::query("DELETE FROM shopping_cart WHERE user_id = $1").bind(user_id).execute(&self.pool).await?;
        Ok(done.rows_affected())
    }

    async fn append_lines(&self, lines: &[CartLine]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for line in lines {
            let (dish_id, setmeal_id) = line.product.columns();
            sqlx::query(
                r#"
                INSERT INTO shopping_cart (user_id, name, image, dish_id, setmeal_id, dish_flavor, number, amount, create_time)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(line.user_id)
            .bind(&line.name)
            .bind(&line.image)
            .bind(dish_id)
            .bind(setmeal_id)
            .bind(&line.flavor)
            .bind(quantity_column(line.quantity)?)
            .bind(line.unit_amount.amount())
            .bind(line.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: i64,
    user_id: i64,
    consignee: String,
    phone: String,
    province_name: Option<String>,
    city_name: Option<String>,
    district_name: Option<String>,
    detail: String,
}

#[async_trait]
impl AddressBook for PgStore {
    async fn address(&self, id: i64) -> Result<Option<Address>> {
        let row = sqlx::query_as::<_, AddressRow>(
            r#"
            SELECT id, user_id, consignee, phone, province_name, city_name, district_name, detail
            FROM address_book WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Address {
            id: r.id,
            user_id: r.user_id,
            consignee: r.consignee,
            phone: r.phone,
            province_name: r.province_name.unwrap_or_default(),
            city_name: r.city_name.unwrap_or_default(),
            district_name: r.district_name.unwrap_or_default(),
            detail: r.detail,
        }))
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn count_created_between(&self, begin: Option<DateTime<Utc>>, end: DateTime<Utc>) -> Result<i64> {
        let n = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE ($1::timestamptz IS NULL OR create_time >= $1) AND create_time <= $2",
        )
        .bind(begin)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(n)
    }
}

#[async_trait]
impl Catalog for PgStore {
    async fn product(&self, product: ProductRef) -> Result<Option<ProductInfo>> {
        let sql = match product {
            ProductRef::Dish(_) => "SELECT name, image, price FROM dish WHERE id = $1 AND status = 1",
            ProductRef::Setmeal(_) => "SELECT name, image, price FROM setmeal WHERE id = $1 AND status = 1",
        };
        let id = match product {
            ProductRef::Dish(id) | ProductRef::Setmeal(id) => id,
        };
        let row: Option<(String, Option<String>, Decimal)> =
            sqlx::query_as(sql).bind(id).fetch_optional(&self.pool).await?;
        let Some((name, image, price)) = row else { return Ok(None) };
        let price = Money::new(price).map_err(corrupt_value)?;
        Ok(Some(ProductInfo { name, image, price }))
    }
}
