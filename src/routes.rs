//! HTTP surface. Each handler maps onto exactly one engine, cart or report
//! operation. The caller identity comes from gateway-set headers.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::cart::CartService;
use crate::domain::aggregates::{CartLine, Checkout, OrderDetails, OrderHeader, OrderStatus, PayMethod};
use crate::domain::value_objects::{Money, OrderNumber, ProductRef};
use crate::engine::{OrderEngine, OrderSummary, StatusCounts, SubmitOrder};
use crate::reporting::{day_bounds, BusinessData, OrderReport, ReportService, SalesTop10Report, TurnoverReport, UserReport};
use crate::store::{OrderFilter, Page, PageRequest};
use crate::{Actor, Error, ErrorKind, Result, Role};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<OrderEngine>,
    pub cart: CartService,
    pub reports: ReportService,
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match (&self, self.kind()) {
            (Error::Unauthenticated, _) => StatusCode::UNAUTHORIZED,
            (_, ErrorKind::Validation) => StatusCode::BAD_REQUEST,
            (_, ErrorKind::NotFound) => StatusCode::NOT_FOUND,
            (_, ErrorKind::StateConflict) => StatusCode::CONFLICT,
            (_, ErrorKind::Forbidden) => StatusCode::FORBIDDEN,
            (_, ErrorKind::Integrity | ErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Storage details stay in the logs.
        let message = match self.kind() {
            ErrorKind::Internal => {
                tracing::error!(error = %self, "request failed");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };
        (status, Json(ErrorBody { code: self.code(), message })).into_response()
    }
}

fn validated<T: Validate>(request: T) -> Result<T> {
    request.validate().map_err(|e| Error::InvalidRequest(e.to_string()))?;
    Ok(request)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self> {
        let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());
        let user_id = header(USER_ID_HEADER).and_then(|v| v.trim().parse().ok()).ok_or(Error::Unauthenticated)?;
        let role = match header(USER_ROLE_HEADER) {
            None | Some("customer") => Role::Customer,
            Some("staff") => Role::Staff,
            Some(_) => return Err(Error::Unauthenticated),
        };
        Ok(Actor { user_id, role })
    }
}

// =============================================================================
// Request DTOs
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitOrderRequest {
    #[validate(range(min = 1))]
    pub address_book_id: i64,
    #[validate(length(max = 100))]
    pub remark: Option<String>,
    pub pay_method: Option<PayMethod>,
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    #[validate(range(min = 0, max = 100))]
    pub tableware_number: Option<i32>,
    pub pack_amount: Option<Money>,
}

impl From<SubmitOrderRequest> for SubmitOrder {
    fn from(r: SubmitOrderRequest) -> Self {
        Self {
            address_book_id: r.address_book_id,
            checkout: Checkout {
                remark: r.remark,
                pay_method: r.pay_method,
                estimated_delivery_time: r.estimated_delivery_time,
                tableware_number: r.tableware_number,
                pack_amount: r.pack_amount.unwrap_or_default(),
            },
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentRequest {
    #[validate(length(min = 1, max = 50))]
    pub order_number: String,
    pub pay_method: PayMethod,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub id: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectRequest {
    pub id: i64,
    #[validate(length(min = 1, max = 255))]
    pub rejection_reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CancelRequest {
    pub id: i64,
    #[validate(length(min = 1, max = 255))]
    pub cancel_reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CartRequest {
    pub dish_id: Option<i64>,
    pub setmeal_id: Option<i64>,
    #[validate(length(max = 50))]
    pub dish_flavor: Option<String>,
}

impl CartRequest {
    fn product(&self) -> Result<ProductRef> { Ok(ProductRef::from_columns(self.dish_id, self.setmeal_id)?) }
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub number: Option<String>,
    pub phone: Option<String>,
    pub status: Option<OrderStatus>,
    pub begin_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct DateRange {
    pub begin: NaiveDate,
    pub end: NaiveDate,
}

// =============================================================================
// Router
// =============================================================================

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "takeout-orders"})) }))
        .route("/user/order/submit", post(submit))
        .route("/user/order/payment", put(pay))
        .route("/user/order/historyOrders", get(history))
        .route("/user/order/orderDetail/:id", get(details))
        .route("/user/order/cancel/:id", put(cancel_by_customer))
        .route("/user/order/repetition/:id", post(repeat))
        .route("/user/shoppingCart/add", post(cart_add))
        .route("/user/shoppingCart/sub", post(cart_sub))
        .route("/user/shoppingCart/list", get(cart_list))
        .route("/user/shoppingCart/clean", delete(cart_clean))
        .route("/admin/order/conditionSearch", get(search))
        .route("/admin/order/statistics", get(statistics))
        .route("/admin/order/details/:id", get(details))
        .route("/admin/order/confirm", put(confirm))
        .route("/admin/order/rejection", put(reject))
        .route("/admin/order/cancel", put(cancel_by_shop))
        .route("/admin/order/delivery/:id", put(dispatch))
        .route("/admin/order/complete/:id", put(complete))
        .route("/admin/report/turnoverStatistics", get(turnover))
        .route("/admin/report/userStatistics", get(user_statistics))
        .route("/admin/report/ordersStatistics", get(order_statistics))
        .route("/admin/report/top10", get(top10))
        .route("/admin/report/businessData", get(business_data))
        .with_state(state)
}

// =============================================================================
// Customer handlers
// =============================================================================

async fn submit(State(s): State<AppState>, actor: Actor, Json(r): Json<SubmitOrderRequest>) -> Result<Json<OrderHeader>> {
    let request = validated(r)?;
    Ok(Json(s.engine.submit(&actor, request.into()).await?))
}

async fn pay(State(s): State<AppState>, actor: Actor, Json(r): Json<PaymentRequest>) -> Result<Json<OrderHeader>> {
    let request = validated(r)?;
    let number = OrderNumber::parse(request.order_number)?;
    Ok(Json(s.engine.pay(&actor, &number, request.pay_method).await?))
}

async fn history(State(s): State<AppState>, actor: Actor, Query(p): Query<HistoryParams>) -> Result<Json<Page<OrderDetails>>> {
    Ok(Json(s.engine.history(&actor, p.status, PageRequest::new(p.page, p.page_size)).await?))
}

async fn details(State(s): State<AppState>, actor: Actor, Path(id): Path<i64>) -> Result<Json<OrderDetails>> {
    Ok(Json(s.engine.details(&actor, id).await?))
}

async fn cancel_by_customer(State(s): State<AppState>, actor: Actor, Path(id): Path<i64>) -> Result<Json<OrderHeader>> {
    Ok(Json(s.engine.cancel_by_customer(&actor, id).await?))
}

async fn repeat(State(s): State<AppState>, actor: Actor, Path(id): Path<i64>) -> Result<StatusCode> {
    s.engine.repeat(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cart_add(State(s): State<AppState>, actor: Actor, Json(r): Json<CartRequest>) -> Result<Json<CartLine>> {
    let request = validated(r)?;
    Ok(Json(s.cart.add(&actor, request.product()?, request.dish_flavor).await?))
}

async fn cart_sub(State(s): State<AppState>, actor: Actor, Json(r): Json<CartRequest>) -> Result<Json<Option<CartLine>>> {
    let request = validated(r)?;
    Ok(Json(s.cart.sub(&actor, request.product()?, request.dish_flavor).await?))
}

async fn cart_list(State(s): State<AppState>, actor: Actor) -> Result<Json<Vec<CartLine>>> {
    Ok(Json(s.cart.list(&actor).await?))
}

async fn cart_clean(State(s): State<AppState>, actor: Actor) -> Result<StatusCode> {
    s.cart.clean(&actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Staff handlers
// =============================================================================

async fn search(State(s): State<AppState>, actor: Actor, Query(p): Query<SearchParams>) -> Result<Json<Page<OrderSummary>>> {
    let filter = OrderFilter {
        number: p.number,
        phone: p.phone,
        status: p.status,
        user_id: None,
        begin_time: p.begin_time,
        end_time: p.end_time,
    };
    Ok(Json(s.engine.search(&actor, &filter, PageRequest::new(p.page, p.page_size)).await?))
}

async fn statistics(State(s): State<AppState>, actor: Actor) -> Result<Json<StatusCounts>> {
    Ok(Json(s.engine.status_counts(&actor).await?))
}

async fn confirm(State(s): State<AppState>, actor: Actor, Json(r): Json<ConfirmRequest>) -> Result<Json<OrderHeader>> {
    Ok(Json(s.engine.confirm(&actor, r.id).await?))
}

async fn reject(State(s): State<AppState>, actor: Actor, Json(r): Json<RejectRequest>) -> Result<Json<OrderHeader>> {
    let request = validated(r)?;
    Ok(Json(s.engine.reject(&actor, request.id, request.rejection_reason).await?))
}

async fn cancel_by_shop(State(s): State<AppState>, actor: Actor, Json(r): Json<CancelRequest>) -> Result<Json<OrderHeader>> {
    let request = validated(r)?;
    Ok(Json(s.engine.cancel_by_shop(&actor, request.id, request.cancel_reason).await?))
}

async fn dispatch(State(s): State<AppState>, actor: Actor, Path(id): Path<i64>) -> Result<Json<OrderHeader>> {
    Ok(Json(s.engine.dispatch(&actor, id).await?))
}

async fn complete(State(s): State<AppState>, actor: Actor, Path(id): Path<i64>) -> Result<Json<OrderHeader>> {
    Ok(Json(s.engine.complete(&actor, id).await?))
}

async fn turnover(State(s): State<AppState>, actor: Actor, Query(r): Query<DateRange>) -> Result<Json<TurnoverReport>> {
    Ok(Json(s.reports.turnover(&actor, r.begin, r.end).await?))
}

async fn user_statistics(State(s): State<AppState>, actor: Actor, Query(r): Query<DateRange>) -> Result<Json<UserReport>> {
    Ok(Json(s.reports.user_statistics(&actor, r.begin, r.end).await?))
}

async fn order_statistics(State(s): State<AppState>, actor: Actor, Query(r): Query<DateRange>) -> Result<Json<OrderReport>> {
    Ok(Json(s.reports.order_statistics(&actor, r.begin, r.end).await?))
}

async fn top10(State(s): State<AppState>, actor: Actor, Query(r): Query<DateRange>) -> Result<Json<SalesTop10Report>> {
    Ok(Json(s.reports.top10(&actor, r.begin, r.end).await?))
}

async fn business_data(State(s): State<AppState>, actor: Actor, Query(r): Query<DateRange>) -> Result<Json<BusinessData>> {
    let (begin, _) = day_bounds(r.begin);
    let (_, end) = day_bounds(r.end);
    Ok(Json(s.reports.business_data(&actor, begin, end).await?))
}
