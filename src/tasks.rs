//! Background sweeper: payment and delivery timeouts, refund issuance.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::engine::OrderEngine;
use crate::payment::PaymentGateway;
use crate::store::{RefundLedger, RefundOutcome, RefundState};
use crate::Result;

/// Refunds handled per sweep.
const REFUND_BATCH: u32 = 50;

/// How long a claimed refund stays reserved for one sweeper.
const REFUND_LEASE_SECS: i64 = 300;

#[derive(Clone, Copy, Debug)]
pub struct SweepConfig {
    pub interval: Duration,
    pub payment_timeout: ChronoDuration,
    pub delivery_timeout: ChronoDuration,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub auto_completed: usize,
    pub refunds_issued: usize,
    pub refunds_failed: usize,
}

pub struct Sweeper {
    engine: Arc<OrderEngine>,
    refunds: Arc<dyn RefundLedger>,
    payments: Arc<dyn PaymentGateway>,
    config: SweepConfig,
}

impl Sweeper {
    pub fn new(
        engine: Arc<OrderEngine>,
        refunds: Arc<dyn RefundLedger>,
        payments: Arc<dyn PaymentGateway>,
        config: SweepConfig,
    ) -> Self {
        Self { engine, refunds, payments, config }
    }

    /// Runs forever on a fixed interval. Failures are logged and retried on the next tick.
    pub async fn run(self) {
        info!(interval_secs = self.config.interval.as_secs(), "order sweeper started");
        let mut ticker = tokio::time::interval(self.config.interval);
        loop {
            ticker.tick().await;
            match self.run_once(Utc::now()).await {
                Ok(report) if report != SweepReport::default() => info!(?report, "sweep finished"),
                Ok(_) => {}
                Err(e) => error!(error = %e, "sweep failed"),
            }
        }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let expired = self.engine.expire_unpaid(now - self.config.payment_timeout).await?;
        let auto_completed = self.engine.complete_overdue(now - self.config.delivery_timeout).await?;
        let (refunds_issued, refunds_failed) = self.issue_refunds(now).await?;
        Ok(SweepReport { expired, auto_completed, refunds_issued, refunds_failed })
    }

    /// Claims a batch of refunds and attempts each once. The ledger id is
    /// the gateway's idempotency key, so a refund retried after a lost
    /// outcome is not paid out twice. Returns (issued, given up).
    async fn issue_refunds(&self, now: DateTime<Utc>) -> Result<(usize, usize)> {
        let (mut issued, mut failed) = (0, 0);
        let lease_until = now + ChronoDuration::seconds(REFUND_LEASE_SECS);
        for refund in self.refunds.claim_refunds(REFUND_BATCH, now, lease_until).await? {
            let outcome = match self.payments.refund(refund.id, &refund.order_number, refund.amount, refund.amount).await {
                Ok(()) => RefundOutcome::Issued,
                Err(e) => {
                    warn!(order_number = %refund.order_number, attempt = refund.attempts + 1, error = %e, "refund attempt failed");
                    RefundOutcome::Failed(e.to_string())
                }
            };
            let updated = self.refunds.record_refund_attempt(refund.id, outcome).await?;
            match updated.state {
                RefundState::Issued => {
                    info!(order_number = %updated.order_number, amount = %updated.amount, "refund issued");
                    issued += 1;
                }
                RefundState::Failed => {
                    error!(order_number = %updated.order_number, attempts = updated.attempts, "refund abandoned");
                    failed += 1;
                }
                RefundState::Pending | RefundState::Issuing => {}
            }
        }
        Ok((issued, failed))
    }
}
