//! Payment collaborator: authorizes charges and issues refunds by order number.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::domain::value_objects::{Money, OrderNumber};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment declined: {0}")]
    Declined(String),
    #[error("payment provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(&self, number: &OrderNumber, amount: Money) -> Result<(), PaymentError>;

    /// `key` identifies one refund. Providers treat repeated calls with the
    /// same key as a single refund.
    async fn refund(&self, key: Uuid, number: &OrderNumber, original: Money, refund: Money) -> Result<(), PaymentError>;
}

/// Gateway used when no provider is wired in. It only ever sees orders the
/// engine has already loaded, so it never confirms a payment for a missing order.
#[derive(Clone, Debug, Default)]
pub struct SimulatedGateway;

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn authorize(&self, number: &OrderNumber, amount: Money) -> Result<(), PaymentError> {
        info!(order_number = %number, %amount, "simulated payment authorized");
        Ok(())
    }

    async fn refund(&self, key: Uuid, number: &OrderNumber, original: Money, refund: Money) -> Result<(), PaymentError> {
        info!(%key, order_number = %number, %original, %refund, "simulated refund issued");
        Ok(())
    }
}
