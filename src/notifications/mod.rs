pub mod relay;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{OrderEntity, OrderItemEntity};

pub const ORDER_CONFIRMATION_EVENT: &str = "notifications.order_confirmation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationAddress {
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationLine {
    pub product_name: String,
    pub sku: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub unit_price_clp: i64,
    pub quantity: i32,
    pub line_total_clp: i64,
}

/// Payload handed to the notification service after an order commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub order_number: String,
    pub customer_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub shipping_address: ConfirmationAddress,
    pub shipping_method_name: String,
    pub coupon_code: Option<String>,
    pub lines: Vec<ConfirmationLine>,
    pub subtotal_clp: i64,
    pub shipping_price_clp: i64,
    pub discount_clp: i64,
    pub total_clp: i64,
}

impl OrderConfirmation {
    pub fn from_order(order: &OrderEntity, items: &[OrderItemEntity]) -> Self {
        Self {
            order_number: order.order_number.clone(),
            customer_name: order.customer_name.clone(),
            email: order.email.clone(),
            phone: order.phone.clone(),
            shipping_address: ConfirmationAddress {
                address_line1: order.address_line1.clone(),
                address_line2: order.address_line2.clone(),
                city: order.city.clone(),
                region: order.region.clone(),
                postal_code: order.postal_code.clone(),
            },
            shipping_method_name: order.shipping_method_name.clone(),
            coupon_code: order.coupon_code.clone(),
            lines: items
                .iter()
                .map(|item| ConfirmationLine {
                    product_name: item.product_name.clone(),
                    sku: item.sku.clone(),
                    size: item.size.clone(),
                    color: item.color.clone(),
                    unit_price_clp: item.unit_price_clp,
                    quantity: item.quantity,
                    line_total_clp: item.line_total_clp,
                })
                .collect(),
            subtotal_clp: order.subtotal_clp,
            shipping_price_clp: order.shipping_price_clp,
            discount_clp: order.discount_clp,
            total_clp: order.total_clp,
        }
    }
}

/// Outbound notification collaborator. An `Err` means the message was not
/// accepted and may be retried with the same `idempotency_key`.
pub trait Notifier: Send + Sync {
    fn send_order_confirmation(
        &self,
        idempotency_key: Uuid,
        confirmation: OrderConfirmation,
    ) -> BoxFuture<'_, anyhow::Result<()>>;
}
