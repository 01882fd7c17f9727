//! Background relay draining the outbox into the [`Notifier`].

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use diesel_async::AsyncPgConnection;
use tokio::{sync::Notify, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{
    db::DbPool,
    models::OutboxEntity,
    notifications::{Notifier, ORDER_CONFIRMATION_EVENT, OrderConfirmation},
    outbox::{self, STATUS_FAILED, STATUS_PENDING, STATUS_SENT},
};

/// Attempts per outbox row before it is parked as `FAILED`.
pub const MAX_DELIVERY_ATTEMPTS: i32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Retry(String),
    GiveUp(String),
}

impl Delivery {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Sent => STATUS_SENT,
            Self::Retry(_) => STATUS_PENDING,
            Self::GiveUp(_) => STATUS_FAILED,
        }
    }

    fn into_error(self) -> Option<String> {
        match self {
            Self::Sent => None,
            Self::Retry(err) | Self::GiveUp(err) => Some(err),
        }
    }
}

/// Delivers one outbox row. Never fails: the outcome says what to record.
pub async fn deliver(notifier: &dyn Notifier, row: &OutboxEntity) -> Delivery {
    if row.event_type != ORDER_CONFIRMATION_EVENT {
        return Delivery::GiveUp(format!("Unknown event type {}", row.event_type));
    }

    let confirmation: OrderConfirmation = match serde_json::from_str(&row.payload) {
        Ok(confirmation) => confirmation,
        Err(err) => return Delivery::GiveUp(format!("Unreadable payload: {err}")),
    };

    match notifier
        .send_order_confirmation(row.idempotency_key, confirmation)
        .await
    {
        Ok(()) => Delivery::Sent,
        Err(err) if row.attempts + 1 >= MAX_DELIVERY_ATTEMPTS => Delivery::GiveUp(format!("{err:#}")),
        Err(err) => Delivery::Retry(format!("{err:#}")),
    }
}

/// Spacing between failed delivery attempts of one row.
///
/// The n-th failure waits `base_delay * 2^(n-1)`, never more than `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: TimeDelta,
    pub max_delay: TimeDelta,
}

impl RetryPolicy {
    pub fn from_base(base_delay: Duration) -> Self {
        let max_delay = TimeDelta::minutes(30);
        Self {
            base_delay: TimeDelta::from_std(base_delay)
                .unwrap_or(max_delay)
                .min(max_delay),
            max_delay,
        }
    }

    /// Delay before the next attempt once `attempts` attempts have failed.
    pub fn delay_after(&self, attempts: i32) -> TimeDelta {
        let exponent = attempts.saturating_sub(1).clamp(0, 16) as u32;
        (self.base_delay * 2i32.pow(exponent)).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_base(Duration::from_secs(30))
    }
}

/// What one relay pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayPass {
    pub claimed: usize,
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
}

pub struct NotificationRelay {
    pool: DbPool,
    notifier: Arc<dyn Notifier>,
    wakeup: Arc<Notify>,
    batch_size: i64,
    poll_interval: Duration,
    retry: RetryPolicy,
    /// How long claimed rows stay invisible to other passes while being sent.
    lease: TimeDelta,
}

impl NotificationRelay {
    pub fn new(
        pool: DbPool,
        notifier: Arc<dyn Notifier>,
        batch_size: i64,
        poll_interval: Duration,
    ) -> Self {
        Self {
            pool,
            notifier,
            wakeup: Arc::new(Notify::new()),
            batch_size,
            poll_interval,
            retry: RetryPolicy::default(),
            lease: TimeDelta::minutes(15),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Handle used to nudge the relay right after an order commits.
    pub fn wakeup(&self) -> Arc<Notify> {
        Arc::clone(&self.wakeup)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                batch_size = self.batch_size,
                retry_base_secs = self.retry.base_delay.num_seconds(),
                "Notification relay started"
            );
            loop {
                match self.run_once().await {
                    // A full batch that got through likely means more rows are waiting.
                    Ok(pass) if pass.claimed as i64 >= self.batch_size && pass.sent > 0 => continue,
                    Ok(_) => {}
                    Err(err) => error!(error = %format!("{err:#}"), "Notification relay pass failed"),
                }

                tokio::select! {
                    () = self.wakeup.notified() => {}
                    () = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        })
    }

    /// Claims one batch of due rows, then delivers them one by one outside of
    /// any transaction, recording each outcome as it happens.
    pub async fn run_once(&self) -> Result<RelayPass> {
        let mut pooled = self
            .pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let rows = outbox::claim_due(conn, self.batch_size, Utc::now() + self.lease)
            .await
            .context("Failed to claim outbox rows")?;

        let mut pass = RelayPass {
            claimed: rows.len(),
            ..Default::default()
        };

        for row in &rows {
            let delivery = deliver(self.notifier.as_ref(), row).await;
            let attempt = row.attempts + 1;
            let mut next_attempt_at = Utc::now();

            match &delivery {
                Delivery::Sent => {
                    pass.sent += 1;
                    info!(outbox_id = row.id, "Delivered order confirmation")
                }
                Delivery::Retry(err) => {
                    pass.retried += 1;
                    next_attempt_at += self.retry.delay_after(attempt);
                    warn!(
                        outbox_id = row.id,
                        attempt,
                        error = %err,
                        next_attempt_at = %next_attempt_at,
                        "Order confirmation delivery failed, will retry"
                    )
                }
                Delivery::GiveUp(err) => {
                    pass.failed += 1;
                    error!(
                        outbox_id = row.id,
                        attempt,
                        error = %err,
                        "Giving up on order confirmation"
                    )
                }
            }

            let status = delivery.status();
            outbox::record_attempt(conn, row.id, status, delivery.into_error(), next_attempt_at)
                .await
                .context("Failed to record outbox delivery attempt")?;
        }

        if pass.claimed > 0 {
            debug!(
                claimed = pass.claimed,
                sent = pass.sent,
                retried = pass.retried,
                failed = pass.failed,
                "Notification relay pass finished"
            );
        }

        Ok(pass)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::future::BoxFuture;
    use uuid::Uuid;

    use super::*;
    use crate::notifications::ConfirmationAddress;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(Uuid, String)>>,
        fail: bool,
    }

    impl Notifier for RecordingNotifier {
        fn send_order_confirmation(
            &self,
            idempotency_key: Uuid,
            confirmation: OrderConfirmation,
        ) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async move {
                if self.fail {
                    anyhow::bail!("notification service returned 503");
                }
                self.sent
                    .lock()
                    .unwrap()
                    .push((idempotency_key, confirmation.order_number));
                Ok(())
            })
        }
    }

    fn confirmation() -> OrderConfirmation {
        OrderConfirmation {
            order_number: "ORD-20250101-ABCDEF".into(),
            customer_name: "Ana".into(),
            email: "ana@example.cl".into(),
            phone: None,
            shipping_address: ConfirmationAddress {
                address_line1: "Calle 1".into(),
                address_line2: None,
                city: "Valparaíso".into(),
                region: "Valparaíso".into(),
                postal_code: None,
            },
            shipping_method_name: "Courier".into(),
            coupon_code: None,
            lines: vec![],
            subtotal_clp: 10_000,
            shipping_price_clp: 0,
            discount_clp: 0,
            total_clp: 10_000,
        }
    }

    fn row(event_type: &str, payload: String, attempts: i32) -> OutboxEntity {
        OutboxEntity {
            id: 1,
            event_type: event_type.into(),
            payload,
            idempotency_key: Uuid::new_v4(),
            status: STATUS_PENDING.into(),
            attempts,
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            next_attempt_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn delivers_confirmation_with_idempotency_key() {
        let notifier = RecordingNotifier::default();
        let payload = serde_json::to_string(&confirmation()).unwrap();
        let row = row(ORDER_CONFIRMATION_EVENT, payload, 0);

        let delivery = deliver(&notifier, &row).await;

        assert_eq!(delivery, Delivery::Sent);
        assert_eq!(delivery.status(), STATUS_SENT);
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, row.idempotency_key);
        assert_eq!(sent[0].1, "ORD-20250101-ABCDEF");
    }

    #[tokio::test]
    async fn failure_is_retried_until_attempts_run_out() {
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };
        let payload = serde_json::to_string(&confirmation()).unwrap();

        let first = deliver(&notifier, &row(ORDER_CONFIRMATION_EVENT, payload.clone(), 0)).await;
        assert!(matches!(first, Delivery::Retry(ref err) if err.contains("503")));
        assert_eq!(first.status(), STATUS_PENDING);

        let last = deliver(
            &notifier,
            &row(ORDER_CONFIRMATION_EVENT, payload, MAX_DELIVERY_ATTEMPTS - 1),
        )
        .await;
        assert_eq!(last.status(), STATUS_FAILED);
    }

    #[tokio::test]
    async fn unreadable_rows_are_parked() {
        let notifier = RecordingNotifier::default();

        let garbage = deliver(&notifier, &row(ORDER_CONFIRMATION_EVENT, "{".into(), 0)).await;
        assert_eq!(garbage.status(), STATUS_FAILED);

        let unknown = deliver(&notifier, &row("inventory.restock", "{}".into(), 0)).await;
        assert_eq!(unknown.status(), STATUS_FAILED);
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn retry_delay_doubles_up_to_the_cap() {
        let policy = RetryPolicy::from_base(Duration::from_secs(30));

        assert_eq!(policy.delay_after(1), TimeDelta::seconds(30));
        assert_eq!(policy.delay_after(2), TimeDelta::seconds(60));
        assert_eq!(policy.delay_after(4), TimeDelta::seconds(240));
        assert_eq!(policy.delay_after(20), TimeDelta::minutes(30));
    }

    #[test]
    fn retry_base_is_capped() {
        let policy = RetryPolicy::from_base(Duration::from_secs(24 * 3600));
        assert_eq!(policy.delay_after(1), TimeDelta::minutes(30));
    }
}
