//! Domain events raised by the order aggregate
use crate::domain::value_objects::{Money, OrderNumber};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Submitted { order_id: i64, number: OrderNumber, user_id: i64, amount: Money },
    Paid { order_id: i64, number: OrderNumber, amount: Money },
    Confirmed { order_id: i64 },
    Rejected { order_id: i64, reason: String },
    Cancelled { order_id: i64, reason: String },
    Dispatched { order_id: i64 },
    Completed { order_id: i64 },
    /// A paid order was cancelled or rejected and owes the customer a refund.
    RefundOwed { order_id: i64, number: OrderNumber, amount: Money },
}

impl OrderEvent {
    /// Short name used as the publish subject suffix.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Submitted { .. } => "submitted",
            Self::Paid { .. } => "paid",
            Self::Confirmed { .. } => "confirmed",
            Self::Rejected { .. } => "rejected",
            Self::Cancelled { .. } => "cancelled",
            Self::Dispatched { .. } => "dispatched",
            Self::Completed { .. } => "completed",
            Self::RefundOwed { .. } => "refund_owed",
        }
    }
}
