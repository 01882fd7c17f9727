use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::outbox::OutboxError;

/// A cart line asking for more units than the variant has in stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Shortfall {
    pub variant_id: i32,
    pub product_name: String,
    pub size: Option<String>,
    pub requested: i32,
    pub available: i32,
}

/// Why a coupon code cannot be applied, as reported to the buyer on the
/// coupon-entry path. The order pricing path ignores these silently.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponRejection {
    #[error("Coupon {code} does not exist")]
    NotFound { code: String },

    #[error("Coupon {code} is not active")]
    Inactive { code: String },

    #[error("Coupon {code} is not valid before {starts_at}")]
    NotYetStarted {
        code: String,
        starts_at: DateTime<Utc>,
    },

    #[error("Coupon {code} expired at {ends_at}")]
    Expired {
        code: String,
        ends_at: DateTime<Utc>,
    },

    #[error("Coupon {code} requires a minimum subtotal of {min_subtotal_clp}")]
    BelowMinimumSubtotal {
        code: String,
        min_subtotal_clp: i64,
    },
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("The cart is empty")]
    EmptyCart,

    #[error("Insufficient stock for {} variant(s)", .0.len())]
    InsufficientStock(Vec<Shortfall>),

    #[error("Shipping method {0} does not exist or is inactive")]
    InvalidShippingMethod(i32),

    #[error(transparent)]
    Coupon(#[from] CouponRejection),

    #[error("Variant {0} does not exist")]
    VariantNotFound(i32),

    #[error("Variant {0} is not in the cart")]
    CartLineNotFound(i32),

    #[error("Quantity must be at least 1, got {0}")]
    InvalidQuantity(i32),

    #[error("Could not allocate a unique order number after {0} attempts")]
    OrderNumberCollision(usize),

    #[error("Failed to obtain a DB connection: {0}")]
    Pool(String),

    #[error(transparent)]
    Outbox(#[from] OutboxError),

    #[error(transparent)]
    Database(#[from] diesel::result::Error),
}

impl CheckoutError {
    /// Whether the failure is transient and the same request may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::OrderNumberCollision(_) | Self::Pool(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_message_counts_shortfalls() {
        let err = CheckoutError::InsufficientStock(vec![
            Shortfall {
                variant_id: 1,
                product_name: "Tee".into(),
                size: Some("M".into()),
                requested: 3,
                available: 1,
            },
            Shortfall {
                variant_id: 2,
                product_name: "Cap".into(),
                size: None,
                requested: 2,
                available: 0,
            },
        ]);

        assert_eq!(err.to_string(), "Insufficient stock for 2 variant(s)");
        assert!(!err.is_transient());
    }

    #[test]
    fn coupon_rejection_serializes_with_reason_tag() {
        let rejection = CouponRejection::BelowMinimumSubtotal {
            code: "WELCOME".into(),
            min_subtotal_clp: 100_000,
        };

        let value = serde_json::to_value(&rejection).unwrap();
        assert_eq!(value["reason"], "BELOW_MINIMUM_SUBTOTAL");
        assert_eq!(value["min_subtotal_clp"], 100_000);
    }

    #[test]
    fn collisions_are_transient() {
        assert!(CheckoutError::OrderNumberCollision(5).is_transient());
    }
}
