//! Read-only statistics over orders and users.
//!
//! Day buckets run from midnight to midnight UTC. Per-day queries are issued
//! concurrently and reassembled in date order.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use futures::future::try_join_all;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt::Display;
use std::sync::Arc;

use crate::domain::aggregates::OrderStatus;
use crate::domain::value_objects::Money;
use crate::store::{OrderStore, ProductSales, RangeFilter, UserDirectory};
use crate::{Actor, Error, Result};

/// Widest range a single report may cover.
pub const MAX_REPORT_DAYS: i64 = 366;
pub const TOP_SALES_LIMIT: u32 = 10;

/// Lists go over the wire as comma-separated strings, which is what the
/// dashboard charts consume.
fn comma_joined<S: Serializer, T: Display>(items: &[T], s: S) -> std::result::Result<S::Ok, S::Error> {
    let joined = items.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
    s.serialize_str(&joined)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnoverReport {
    #[serde(serialize_with = "comma_joined")]
    pub date_list: Vec<NaiveDate>,
    #[serde(serialize_with = "comma_joined")]
    pub turnover_list: Vec<Money>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserReport {
    #[serde(serialize_with = "comma_joined")]
    pub date_list: Vec<NaiveDate>,
    #[serde(serialize_with = "comma_joined")]
    pub new_user_list: Vec<i64>,
    #[serde(serialize_with = "comma_joined")]
    pub total_user_list: Vec<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderReport {
    #[serde(serialize_with = "comma_joined")]
    pub date_list: Vec<NaiveDate>,
    #[serde(serialize_with = "comma_joined")]
    pub order_count_list: Vec<i64>,
    #[serde(serialize_with = "comma_joined")]
    pub valid_order_count_list: Vec<i64>,
    pub total_order_count: i64,
    pub valid_order_count: i64,
    pub order_completion_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SalesTop10Report {
    #[serde(serialize_with = "comma_joined")]
    pub name_list: Vec<String>,
    #[serde(serialize_with = "comma_joined")]
    pub number_list: Vec<i64>,
}

impl From<Vec<ProductSales>> for SalesTop10Report {
    fn from(sales: Vec<ProductSales>) -> Self {
        let (name_list, number_list) = sales.into_iter().map(|s| (s.name, s.number)).unzip();
        Self { name_list, number_list }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BusinessData {
    pub turnover: Money,
    pub valid_order_count: i64,
    pub order_completion_rate: f64,
    pub unit_price: Money,
    pub new_users: i64,
}

/// Completed share of all orders; zero when there are none.
pub fn completion_rate(valid: i64, total: i64) -> f64 {
    if total == 0 { return 0.0; }
    valid as f64 / total as f64
}

/// Every date from `begin` to `end`, both included.
pub fn date_span(begin: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
    if end < begin { return Err(Error::InvalidRequest("end date is before begin date".into())); }
    let days = (end - begin).num_days() + 1;
    if days > MAX_REPORT_DAYS {
        return Err(Error::InvalidRequest(format!("report range exceeds {MAX_REPORT_DAYS} days")));
    }
    Ok(begin.iter_days().take(days as usize).collect())
}

/// First and last instant of `date` in UTC.
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    (start, start + Duration::days(1) - Duration::nanoseconds(1))
}

#[derive(Clone)]
pub struct ReportService {
    orders: Arc<dyn OrderStore>,
    users: Arc<dyn UserDirectory>,
}

impl ReportService {
    pub fn new(orders: Arc<dyn OrderStore>, users: Arc<dyn UserDirectory>) -> Self { Self { orders, users } }

    /// Revenue of completed orders per day.
    pub async fn turnover(&self, actor: &Actor, begin: NaiveDate, end: NaiveDate) -> Result<TurnoverReport> {
        actor.require_staff()?;
        let date_list = date_span(begin, end)?;
        let turnover_list = try_join_all(date_list.iter().map(|d| {
            let (begin, end) = day_bounds(*d);
            let filter = RangeFilter { begin: Some(begin), end: Some(end), status: Some(OrderStatus::Completed) };
            async move { self.orders.sum_amount(&filter).await }
        }))
        .await?;
        Ok(TurnoverReport { date_list, turnover_list })
    }

    /// New and cumulative users per day.
    pub async fn user_statistics(&self, actor: &Actor, begin: NaiveDate, end: NaiveDate) -> Result<UserReport> {
        actor.require_staff()?;
        let date_list = date_span(begin, end)?;
        let counts = try_join_all(date_list.iter().map(|d| {
            let (begin, end) = day_bounds(*d);
            async move {
                let new = self.users.count_created_between(Some(begin), end).await?;
                let total = self.users.count_created_between(None, end).await?;
                Ok::<_, Error>((new, total))
            }
        }))
        .await?;
        let (new_user_list, total_user_list) = counts.into_iter().unzip();
        Ok(UserReport { date_list, new_user_list, total_user_list })
    }

    /// Placed and completed orders per day, with range totals.
    pub async fn order_statistics(&self, actor: &Actor, begin: NaiveDate, end: NaiveDate) -> Result<OrderReport> {
        actor.require_staff()?;
        let date_list = date_span(begin, end)?;
        let counts = try_join_all(date_list.iter().map(|d| {
            let (begin, end) = day_bounds(*d);
            async move {
                let all = RangeFilter { begin: Some(begin), end: Some(end), status: None };
                let valid = RangeFilter { status: Some(OrderStatus::Completed), ..all };
                Ok::<_, Error>((self.orders.count(&all).await?, self.orders.count(&valid).await?))
            }
        }))
        .await?;
        let (order_count_list, valid_order_count_list): (Vec<i64>, Vec<i64>) = counts.into_iter().unzip();
        let total_order_count = order_count_list.iter().sum();
        let valid_order_count = valid_order_count_list.iter().sum();
        Ok(OrderReport {
            date_list,
            order_count_list,
            valid_order_count_list,
            total_order_count,
            valid_order_count,
            order_completion_rate: completion_rate(valid_order_count, total_order_count),
        })
    }

    /// Best sellers by quantity across the whole range.
    pub async fn top10(&self, actor: &Actor, begin: NaiveDate, end: NaiveDate) -> Result<SalesTop10Report> {
        actor.require_staff()?;
        date_span(begin, end)?;
        let (from, _) = day_bounds(begin);
        let (_, to) = day_bounds(end);
        Ok(self.orders.top_sales(from, to, TOP_SALES_LIMIT).await?.into())
    }

    /// Headline figures for `[begin, end]`.
    pub async fn business_data(&self, actor: &Actor, begin: DateTime<Utc>, end: DateTime<Utc>) -> Result<BusinessData> {
        actor.require_staff()?;
        if end < begin { return Err(Error::InvalidRequest("end is before begin".into())); }
        let all = RangeFilter { begin: Some(begin), end: Some(end), status: None };
        let valid = RangeFilter { status: Some(OrderStatus::Completed), ..all };
        let turnover = self.orders.sum_amount(&valid).await?;
        let valid_order_count = self.orders.count(&valid).await?;
        let total = self.orders.count(&all).await?;
        let unit_price = match valid_order_count {
            0 => Money::zero(),
            n => Money::new((turnover.amount() / Decimal::from(n)).round_dp(2))?,
        };
        Ok(BusinessData {
            turnover,
            valid_order_count,
            order_completion_rate: completion_rate(valid_order_count, total),
            unit_price,
            new_users: self.users.count_created_between(Some(begin), end).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Checkout, NewOrder, OrderHeader, OrderLine};
    use crate::domain::value_objects::{OrderNumber, ProductRef, Quantity};
    use crate::store::memory::MemoryStore;

    fn date(d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2024, 3, d).unwrap() }

    fn money(units: i64) -> Money { Money::new(Decimal::new(units, 0)).unwrap() }

    fn seed(store: &MemoryStore, day: u32, status: OrderStatus, amount: i64, lines: &[(&str, u32)]) {
        let (start, _) = day_bounds(date(day));
        let new = NewOrder {
            number: OrderNumber::generate(start),
            user_id: 1, address_book_id: 1, consignee: "Li".into(), phone: "138".into(), address: "x".into(),
            amount: money(amount), checkout: Checkout::default(), order_time: start + Duration::hours(12), lines: vec![],
        };
        let header = OrderHeader { status, ..OrderHeader::inserted(0, &new) };
        let lines = lines
            .iter()
            .map(|(name, qty)| OrderLine {
                product: ProductRef::Dish(1), name: name.to_string(), image: None, flavor: None,
                quantity: Quantity::new(*qty).unwrap(), unit_amount: money(1),
            })
            .collect();
        store.seed_order(header, lines);
    }

    fn service(store: &Arc<MemoryStore>) -> ReportService { ReportService::new(store.clone(), store.clone()) }

    #[test]
    fn test_date_span() {
        assert_eq!(date_span(date(1), date(3)).unwrap(), [date(1), date(2), date(3)]);
        assert_eq!(date_span(date(5), date(5)).unwrap(), [date(5)]);
        assert!(matches!(date_span(date(2), date(1)), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_completion_rate_without_orders() {
        assert_eq!(completion_rate(0, 0), 0.0);
        assert_eq!(completion_rate(1, 4), 0.25);
    }

    #[tokio::test]
    async fn test_turnover_counts_completed_only() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 1, OrderStatus::Completed, 40, &[]);
        seed(&store, 1, OrderStatus::Cancelled, 99, &[]);
        seed(&store, 3, OrderStatus::Completed, 15, &[]);
        let report = service(&store).turnover(&Actor::staff(1), date(1), date(3)).await.unwrap();
        assert_eq!(report.turnover_list, [money(40), Money::zero(), money(15)]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["date_list"], "2024-03-01,2024-03-02,2024-03-03");
        assert_eq!(json["turnover_list"], "40.00,0.00,15.00");
    }

    #[tokio::test]
    async fn test_order_statistics() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 1, OrderStatus::Completed, 10, &[]);
        seed(&store, 1, OrderStatus::Cancelled, 10, &[]);
        seed(&store, 2, OrderStatus::Completed, 10, &[]);
        seed(&store, 2, OrderStatus::Confirmed, 10, &[]);
        let report = service(&store).order_statistics(&Actor::staff(1), date(1), date(2)).await.unwrap();
        assert_eq!(report.order_count_list, [2, 2]);
        assert_eq!(report.valid_order_count_list, [1, 1]);
        assert_eq!((report.total_order_count, report.valid_order_count), (4, 2));
        assert_eq!(report.order_completion_rate, 0.5);

        let empty = service(&store).order_statistics(&Actor::staff(1), date(10), date(12)).await.unwrap();
        assert_eq!(empty.order_completion_rate, 0.0);
    }

    #[tokio::test]
    async fn test_user_statistics() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(day_bounds(date(1)).0 + Duration::hours(1));
        store.add_user(day_bounds(date(2)).0 + Duration::hours(1));
        store.add_user(day_bounds(date(2)).0 + Duration::hours(2));
        let report = service(&store).user_statistics(&Actor::staff(1), date(1), date(3)).await.unwrap();
        assert_eq!(report.new_user_list, [1, 2, 0]);
        assert_eq!(report.total_user_list, [1, 3, 3]);
    }

    #[tokio::test]
    async fn test_top10_ranks_completed_sales() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 1, OrderStatus::Completed, 10, &[("Noodles", 2), ("Dumplings", 5)]);
        seed(&store, 2, OrderStatus::Completed, 10, &[("Noodles", 4)]);
        seed(&store, 2, OrderStatus::Cancelled, 10, &[("Rice", 50)]);
        let report = service(&store).top10(&Actor::staff(1), date(1), date(2)).await.unwrap();
        assert_eq!(report.name_list, ["Noodles", "Dumplings"]);
        assert_eq!(report.number_list, [6, 5]);
    }

    #[tokio::test]
    async fn test_business_data() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 1, OrderStatus::Completed, 10, &[]);
        seed(&store, 1, OrderStatus::Completed, 20, &[]);
        seed(&store, 1, OrderStatus::Cancelled, 5, &[]);
        store.add_user(day_bounds(date(1)).0);
        let (begin, end) = day_bounds(date(1));
        let data = service(&store).business_data(&Actor::staff(1), begin, end).await.unwrap();
        assert_eq!(data.turnover, money(30));
        assert_eq!(data.valid_order_count, 2);
        assert_eq!(data.unit_price, money(15));
        assert!((data.order_completion_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(data.new_users, 1);
    }

    #[tokio::test]
    async fn test_reports_are_staff_only() {
        let store = Arc::new(MemoryStore::new());
        let err = service(&store).turnover(&Actor::customer(1), date(1), date(2)).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden));
    }
}
