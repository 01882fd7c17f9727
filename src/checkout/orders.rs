//! Order orchestration.
//!
//! `create_order` runs the cheap checks outside of any transaction, then locks
//! the cart, reloads and prices its lines, re-checks stock under row locks and
//! persists everything in a single unit of work. The confirmation is queued in the outbox and delivered after
//! commit by the notification relay.

use std::sync::Arc;

use chrono::Utc;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    checkout::{
        carts::{self, CartLine},
        coupons,
        error::CheckoutError,
        inventory,
        order_number::{MAX_ORDER_NUMBER_ATTEMPTS, OrderNumberSource},
        pricing::{self, Quote, ShippingLine},
        shipping,
        validation::ValidCheckout,
    },
    db::DbPool,
    identity::BuyerIdentity,
    models::{
        CreateCouponRedemptionEntity, CreateOrderEntity, CreateOrderItemEntity, OrderEntity,
        OrderItemEntity,
    },
    notifications::{ORDER_CONFIRMATION_EVENT, OrderConfirmation},
    outbox,
    schema::{coupon_redemptions, order_items, orders},
};

pub const ORDER_STATUS_CREATED: &str = "CREATED";

/// An order with its frozen lines.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlacedOrder {
    pub order: OrderEntity,
    pub items: Vec<OrderItemEntity>,
}

pub struct CheckoutService {
    pool: DbPool,
    order_numbers: Arc<dyn OrderNumberSource>,
    relay_wakeup: Arc<Notify>,
}

impl CheckoutService {
    pub fn new(
        pool: DbPool,
        order_numbers: Arc<dyn OrderNumberSource>,
        relay_wakeup: Arc<Notify>,
    ) -> Self {
        Self {
            pool,
            order_numbers,
            relay_wakeup,
        }
    }

    /// Turns the buyer's cart into an order.
    ///
    /// Either the order, its lines, the stock decrement, the emptied cart,
    /// the coupon redemption and the queued confirmation all commit, or
    /// nothing does.
    pub async fn create_order(
        &self,
        buyer: &BuyerIdentity,
        checkout: ValidCheckout,
    ) -> Result<PlacedOrder, CheckoutError> {
        let mut pooled = self
            .pool
            .get()
            .await
            .map_err(|err| CheckoutError::Pool(err.to_string()))?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let cart = carts::find(conn, buyer)
            .await?
            .ok_or(CheckoutError::EmptyCart)?;
        let lines = carts::load_lines(conn, cart.id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        inventory::validate(conn, &lines).await?;

        let shipping = shipping::resolve(
            conn,
            checkout.shipping_method_id,
            Some(checkout.details.region.as_str()),
        )
        .await?
        .ok_or(CheckoutError::InvalidShippingMethod(checkout.shipping_method_id))?;

        let coupon = match checkout.coupon_code.as_deref() {
            Some(code) => coupons::find_by_code(conn, code).await?,
            None => None,
        };

        let order_numbers = Arc::clone(&self.order_numbers);
        let buyer = buyer.clone();
        let cart_id = cart.id;

        let placed = conn
            .transaction(move |conn| {
                Box::pin(async move {
                    // Serializes submits of the same cart; a second submit
                    // waits here and then finds the cart already emptied.
                    carts::lock(conn, cart_id)
                        .await?
                        .ok_or(CheckoutError::EmptyCart)?;
                    let lines = carts::load_lines(conn, cart_id).await?;
                    if lines.is_empty() {
                        return Err(CheckoutError::EmptyCart);
                    }

                    inventory::lock_and_validate(conn, &lines).await?;

                    let quote =
                        pricing::price(&lines, Some(shipping.clone()), coupon.as_ref(), Utc::now());
                    let new_order = new_order_entity(&buyer, &checkout, &shipping, &quote);

                    let order = insert_order(conn, order_numbers.as_ref(), new_order).await?;

                    let items: Vec<OrderItemEntity> = diesel::insert_into(order_items::table)
                        .values(order_item_entities(order.id, &lines))
                        .returning(OrderItemEntity::as_returning())
                        .get_results(conn)
                        .await?;

                    inventory::decrement(conn, &lines).await?;
                    carts::clear(conn, cart_id).await?;

                    if let Some(applied) = &quote.applied_coupon {
                        diesel::insert_into(coupon_redemptions::table)
                            .values(CreateCouponRedemptionEntity {
                                coupon_id: applied.coupon_id,
                                order_id: order.id,
                                account_id: buyer.account_id(),
                            })
                            .execute(conn)
                            .await?;
                    }

                    outbox::publish(
                        conn,
                        ORDER_CONFIRMATION_EVENT,
                        &OrderConfirmation::from_order(&order, &items),
                    )
                    .await?;

                    Ok::<PlacedOrder, CheckoutError>(PlacedOrder { order, items })
                })
            })
            .await?;

        self.relay_wakeup.notify_one();
        info!(
            order_number = %placed.order.order_number,
            order_id = placed.order.id,
            total_clp = placed.order.total_clp,
            lines = placed.items.len(),
            "Order created"
        );

        Ok(placed)
    }
}

/// Inserts the order under a fresh order number, retrying on collisions.
///
/// `ON CONFLICT DO NOTHING` keeps the surrounding transaction usable after a
/// collision, so every attempt runs in the same unit of work.
async fn insert_order(
    conn: &mut AsyncPgConnection,
    order_numbers: &dyn OrderNumberSource,
    mut new_order: CreateOrderEntity,
) -> Result<OrderEntity, CheckoutError> {
    for attempt in 1..=MAX_ORDER_NUMBER_ATTEMPTS {
        new_order.order_number = order_numbers.next_order_number();

        let inserted: Option<OrderEntity> = diesel::insert_into(orders::table)
            .values(&new_order)
            .on_conflict(orders::order_number)
            .do_nothing()
            .returning(OrderEntity::as_returning())
            .get_result(conn)
            .await
            .optional()?;

        if let Some(order) = inserted {
            return Ok(order);
        }

        warn!(
            order_number = %new_order.order_number,
            attempt,
            "Order number already taken, retrying"
        );
    }

    Err(CheckoutError::OrderNumberCollision(MAX_ORDER_NUMBER_ATTEMPTS))
}

/// Builds the order snapshot. The order number is assigned on insert.
fn new_order_entity(
    buyer: &BuyerIdentity,
    checkout: &ValidCheckout,
    shipping: &ShippingLine,
    quote: &Quote,
) -> CreateOrderEntity {
    let details = &checkout.details;

    CreateOrderEntity {
        order_number: String::new(),
        account_id: buyer.account_id(),
        guest_token: buyer.guest_token().map(str::to_string),
        status: ORDER_STATUS_CREATED.into(),
        customer_name: details.customer_name.clone(),
        email: details.email.clone(),
        phone: details.phone.clone(),
        address_line1: details.address_line1.clone(),
        address_line2: details.address_line2.clone(),
        city: details.city.clone(),
        region: details.region.clone(),
        postal_code: details.postal_code.clone(),
        notes: details.notes.clone(),
        shipping_method_id: shipping.shipping_method_id,
        shipping_method_name: shipping.name.clone(),
        coupon_code: quote
            .applied_coupon
            .as_ref()
            .map(|coupon| coupon.code.clone()),
        subtotal_clp: quote.subtotal_clp,
        shipping_price_clp: quote.shipping_price_clp,
        discount_clp: quote.discount_clp,
        total_clp: quote.total_clp,
    }
}

fn order_item_entities(order_id: i32, lines: &[CartLine]) -> Vec<CreateOrderItemEntity> {
    lines
        .iter()
        .map(|line| CreateOrderItemEntity {
            order_id,
            variant_id: line.variant_id,
            product_name: line.product_name.clone(),
            sku: line.sku.clone(),
            size: line.size.clone(),
            color: line.color.clone(),
            unit_price_clp: line.unit_price_clp,
            quantity: line.quantity,
            line_total_clp: line.line_total_clp(),
        })
        .collect()
}

/// Orders placed by `buyer`, newest first.
pub async fn list_for_buyer(
    conn: &mut AsyncPgConnection,
    buyer: &BuyerIdentity,
) -> QueryResult<Vec<OrderEntity>> {
    let query = orders::table.select(OrderEntity::as_select()).into_boxed();
    let query = match buyer {
        BuyerIdentity::Account(account_id) => query.filter(orders::account_id.eq(*account_id)),
        BuyerIdentity::Guest(token) => query.filter(orders::guest_token.eq(token.clone())),
    };

    query
        .order_by((orders::created_at.desc(), orders::id.desc()))
        .load(conn)
        .await
}

/// One of `buyer`'s orders with its lines. Orders of other buyers are not found.
pub async fn find_for_buyer(
    conn: &mut AsyncPgConnection,
    buyer: &BuyerIdentity,
    order_number: &str,
) -> QueryResult<Option<PlacedOrder>> {
    let query = orders::table
        .filter(orders::order_number.eq(order_number.to_string()))
        .select(OrderEntity::as_select())
        .into_boxed();
    let query = match buyer {
        BuyerIdentity::Account(account_id) => query.filter(orders::account_id.eq(*account_id)),
        BuyerIdentity::Guest(token) => query.filter(orders::guest_token.eq(token.clone())),
    };

    let Some(order) = query.first(conn).await.optional()? else {
        return Ok(None);
    };

    let items = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .order_by(order_items::id.asc())
        .select(OrderItemEntity::as_select())
        .load(conn)
        .await?;

    Ok(Some(PlacedOrder { order, items }))
}
