//! Pricing & discount evaluation.
//!
//! [`price`] is pure: it only looks at the lines, the resolved shipping line and
//! the coupon row it is handed. [`quote_cart`] loads those inputs for a buyer
//! and is the read-only path the storefront calls before checkout.

use chrono::{DateTime, Utc};
use diesel_async::AsyncPgConnection;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    checkout::{
        carts::{self, CartLine},
        coupons::{self, DiscountType},
        error::CheckoutError,
        inventory, shipping,
    },
    identity::BuyerIdentity,
    models::CouponEntity,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct QuoteLine {
    pub variant_id: i32,
    pub product_name: String,
    pub sku: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub unit_price_clp: i64,
    pub quantity: i32,
    pub line_total_clp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ShippingLine {
    pub shipping_method_id: i32,
    pub name: String,
    pub kind: String,
    pub price_clp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AppliedCoupon {
    #[serde(skip_serializing)]
    pub coupon_id: i32,
    pub code: String,
    pub discount_type: DiscountType,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Quote {
    pub subtotal_clp: i64,
    pub shipping_price_clp: i64,
    pub discount_clp: i64,
    pub total_clp: i64,
    pub applied_coupon: Option<AppliedCoupon>,
    pub shipping: Option<ShippingLine>,
    pub line_items: Vec<QuoteLine>,
}

impl From<&CartLine> for QuoteLine {
    fn from(line: &CartLine) -> Self {
        Self {
            variant_id: line.variant_id,
            product_name: line.product_name.clone(),
            sku: line.sku.clone(),
            size: line.size.clone(),
            color: line.color.clone(),
            unit_price_clp: line.unit_price_clp,
            quantity: line.quantity,
            line_total_clp: line.line_total_clp(),
        }
    }
}

/// Itemizes `lines` and applies shipping and, when applicable, the coupon.
///
/// An inapplicable coupon is dropped without error.
pub fn price(
    lines: &[CartLine],
    shipping: Option<ShippingLine>,
    coupon: Option<&CouponEntity>,
    now: DateTime<Utc>,
) -> Quote {
    let line_items: Vec<QuoteLine> = lines.iter().map(QuoteLine::from).collect();
    let subtotal_clp: i64 = line_items.iter().map(|line| line.line_total_clp).sum();
    let shipping_price_clp = shipping.as_ref().map_or(0, |line| line.price_clp);

    let (applied_coupon, discount_clp) = coupon
        .and_then(|coupon| {
            coupons::evaluate(coupon, subtotal_clp, now)
                .ok()
                .map(|validation| {
                    (
                        Some(AppliedCoupon {
                            coupon_id: coupon.id,
                            code: validation.code,
                            discount_type: validation.discount_type,
                            value: validation.value,
                        }),
                        validation.discount_clp,
                    )
                })
        })
        .unwrap_or((None, 0));

    let total_clp = (subtotal_clp + shipping_price_clp - discount_clp).max(0);

    Quote {
        subtotal_clp,
        shipping_price_clp,
        discount_clp,
        total_clp,
        applied_coupon,
        shipping,
        line_items,
    }
}

/// Read-only quote for the buyer's current cart.
///
/// Runs the stock check too, so a quote never looks fine for a cart that
/// cannot be ordered. An unknown or inactive shipping method quotes as 0.
pub async fn quote_cart(
    conn: &mut AsyncPgConnection,
    buyer: &BuyerIdentity,
    shipping_method_id: Option<i32>,
    region: Option<&str>,
    coupon_code: Option<&str>,
) -> Result<Quote, CheckoutError> {
    let lines = match carts::find(conn, buyer).await? {
        Some(cart) => carts::load_lines(conn, cart.id).await?,
        None => Vec::new(),
    };

    inventory::validate(conn, &lines).await?;

    let shipping = match shipping_method_id {
        Some(id) => shipping::resolve(conn, id, region).await?,
        None => None,
    };
    let coupon = match coupon_code {
        Some(code) => coupons::find_by_code(conn, code).await?,
        None => None,
    };

    Ok(price(&lines, shipping, coupon.as_ref(), Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::coupons::tests::coupon;

    fn line(variant_id: i32, unit_price_clp: i64, quantity: i32) -> CartLine {
        CartLine {
            variant_id,
            product_name: format!("Product {variant_id}"),
            sku: format!("SKU-{variant_id}"),
            size: Some("M".into()),
            color: None,
            unit_price_clp,
            quantity,
        }
    }

    fn flat(price_clp: i64) -> ShippingLine {
        ShippingLine {
            shipping_method_id: 1,
            name: "Courier".into(),
            kind: "FLAT".into(),
            price_clp,
        }
    }

    #[test]
    fn totals_add_up() {
        let lines = [line(1, 12_990, 2), line(2, 5_000, 1)];
        let quote = price(&lines, Some(flat(3_500)), None, Utc::now());

        assert_eq!(quote.subtotal_clp, 30_980);
        assert_eq!(quote.shipping_price_clp, 3_500);
        assert_eq!(quote.discount_clp, 0);
        assert_eq!(quote.total_clp, 34_480);
        assert_eq!(
            quote.subtotal_clp,
            quote.line_items.iter().map(|l| l.line_total_clp).sum::<i64>()
        );
        assert!(quote.applied_coupon.is_none());
    }

    #[test]
    fn applies_percent_coupon_on_subtotal_only() {
        let lines = [line(1, 25_000, 2)];
        let c = coupon("PERCENT", 10);
        let quote = price(&lines, Some(flat(4_000)), Some(&c), Utc::now());

        assert_eq!(quote.discount_clp, 5_000);
        assert_eq!(quote.total_clp, 50_000 + 4_000 - 5_000);
        let applied = quote.applied_coupon.unwrap();
        assert_eq!(applied.code, "SAVE");
        assert_eq!(applied.coupon_id, 7);
    }

    #[test]
    fn silently_ignores_coupon_below_minimum() {
        let lines = [line(1, 99_999, 1)];
        let mut c = coupon("PERCENT", 10);
        c.min_subtotal_clp = Some(100_000);

        let quote = price(&lines, None, Some(&c), Utc::now());

        assert_eq!(quote.discount_clp, 0);
        assert!(quote.applied_coupon.is_none());
        assert_eq!(quote.total_clp, 99_999);
    }

    #[test]
    fn fixed_coupon_never_pushes_total_below_shipping() {
        let lines = [line(1, 3_000, 1)];
        let c = coupon("FIXED", 10_000);
        let quote = price(&lines, Some(flat(2_500)), Some(&c), Utc::now());

        assert_eq!(quote.discount_clp, 3_000);
        assert_eq!(quote.total_clp, 2_500);
    }

    #[test]
    fn empty_cart_quotes_zero() {
        let quote = price(&[], None, None, Utc::now());
        assert_eq!(quote.total_clp, 0);
        assert!(quote.line_items.is_empty());
        assert!(quote.shipping.is_none());
    }
}
