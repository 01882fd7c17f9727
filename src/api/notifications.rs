use futures::future::BoxFuture;
use reqwest::Client;
use uuid::Uuid;

use crate::{
    app_error::AppError,
    notifications::{Notifier, OrderConfirmation},
};

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Delivers notifications to the notification service over HTTP.
#[derive(Clone)]
pub struct HttpNotifier {
    client: Client,
    base_url: String,
}

impl HttpNotifier {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Notifier for HttpNotifier {
    fn send_order_confirmation(
        &self,
        idempotency_key: Uuid,
        confirmation: OrderConfirmation,
    ) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            self.client
                .post(format!("{}/order-confirmations", self.base_url))
                .header(IDEMPOTENCY_KEY_HEADER, idempotency_key.to_string())
                .json(&confirmation)
                .send()
                .await
                .map_err(|_| AppError::ServiceUnreachable("NotificationService".into()))?
                .error_for_status()?;

            Ok(())
        })
    }
}
