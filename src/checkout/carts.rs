//! Cart store: one cart per account or guest token, one line per variant.

use diesel::{
    ExpressionMethods, OptionalExtension, QueryDsl, QueryResult, SelectableHelper,
    upsert::excluded,
};
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::{
    checkout::error::CheckoutError,
    identity::BuyerIdentity,
    models::{CartEntity, CartItemEntity, CreateCartEntity, CreateCartItemEntity, VariantEntity},
    schema::{cart_items, carts, products, variants},
};

/// A cart line joined with its variant and product, as priced and stock-checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub variant_id: i32,
    pub product_name: String,
    pub sku: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub unit_price_clp: i64,
    pub quantity: i32,
}

impl CartLine {
    pub fn line_total_clp(&self) -> i64 {
        self.unit_price_clp * i64::from(self.quantity)
    }
}

pub async fn find(
    conn: &mut AsyncPgConnection,
    buyer: &BuyerIdentity,
) -> QueryResult<Option<CartEntity>> {
    let query = carts::table.select(CartEntity::as_select()).into_boxed();
    let query = match buyer {
        BuyerIdentity::Account(account_id) => query.filter(carts::account_id.eq(*account_id)),
        BuyerIdentity::Guest(token) => query.filter(carts::guest_token.eq(token.clone())),
    };
    query.first(conn).await.optional()
}

/// Returns the buyer's cart, creating it on first use.
pub async fn find_or_create(
    conn: &mut AsyncPgConnection,
    buyer: &BuyerIdentity,
) -> QueryResult<CartEntity> {
    let new_cart = CreateCartEntity {
        account_id: buyer.account_id(),
        guest_token: buyer.guest_token().map(str::to_string),
    };

    let insert = diesel::insert_into(carts::table).values(&new_cart);
    match buyer {
        BuyerIdentity::Account(_) => {
            insert
                .on_conflict(carts::account_id)
                .do_nothing()
                .execute(conn)
                .await?
        }
        BuyerIdentity::Guest(_) => {
            insert
                .on_conflict(carts::guest_token)
                .do_nothing()
                .execute(conn)
                .await?
        }
    };

    find(conn, buyer).await?.ok_or(diesel::result::Error::NotFound)
}

/// Locks the cart row until the surrounding transaction ends.
pub async fn lock(conn: &mut AsyncPgConnection, cart_id: i32) -> QueryResult<Option<CartEntity>> {
    carts::table
        .find(cart_id)
        .select(CartEntity::as_select())
        .for_update()
        .first(conn)
        .await
        .optional()
}

pub async fn load_lines(conn: &mut AsyncPgConnection, cart_id: i32) -> QueryResult<Vec<CartLine>> {
    let rows: Vec<(CartItemEntity, VariantEntity, String)> = cart_items::table
        .inner_join(variants::table.inner_join(products::table))
        .filter(cart_items::cart_id.eq(cart_id))
        .order_by(cart_items::created_at.asc())
        .select((
            CartItemEntity::as_select(),
            VariantEntity::as_select(),
            products::name,
        ))
        .load(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(item, variant, product_name)| CartLine {
            variant_id: variant.id,
            product_name,
            sku: variant.sku,
            size: variant.size,
            color: variant.color,
            unit_price_clp: variant.price_clp,
            quantity: item.quantity,
        })
        .collect())
}

pub async fn load_items(
    conn: &mut AsyncPgConnection,
    cart_id: i32,
) -> QueryResult<Vec<CartItemEntity>> {
    cart_items::table
        .filter(cart_items::cart_id.eq(cart_id))
        .select(CartItemEntity::as_select())
        .load(conn)
        .await
}

/// Adds `quantity` units of a variant, incrementing the existing line if any.
///
/// Stock is not checked here; it is checked when quoting and ordering.
pub async fn add_item(
    conn: &mut AsyncPgConnection,
    buyer: &BuyerIdentity,
    variant_id: i32,
    quantity: i32,
) -> Result<CartItemEntity, CheckoutError> {
    if quantity < 1 {
        return Err(CheckoutError::InvalidQuantity(quantity));
    }
    ensure_variant_exists(conn, variant_id).await?;

    let cart = find_or_create(conn, buyer).await?;

    let item = diesel::insert_into(cart_items::table)
        .values(CreateCartItemEntity {
            cart_id: cart.id,
            variant_id,
            quantity,
        })
        .on_conflict((cart_items::cart_id, cart_items::variant_id))
        .do_update()
        .set((
            cart_items::quantity.eq(cart_items::quantity + excluded(cart_items::quantity)),
            cart_items::updated_at.eq(diesel::dsl::now),
        ))
        .returning(CartItemEntity::as_returning())
        .get_result(conn)
        .await?;

    touch(conn, cart.id).await?;
    Ok(item)
}

/// Overwrites the quantity of an existing line; `0` removes it.
pub async fn set_quantity(
    conn: &mut AsyncPgConnection,
    buyer: &BuyerIdentity,
    variant_id: i32,
    quantity: i32,
) -> Result<Option<CartItemEntity>, CheckoutError> {
    if quantity < 0 {
        return Err(CheckoutError::InvalidQuantity(quantity));
    }
    if quantity == 0 {
        remove_item(conn, buyer, variant_id).await?;
        return Ok(None);
    }

    let cart = find(conn, buyer)
        .await?
        .ok_or(CheckoutError::CartLineNotFound(variant_id))?;

    let item = diesel::update(
        cart_items::table
            .filter(cart_items::cart_id.eq(cart.id))
            .filter(cart_items::variant_id.eq(variant_id)),
    )
    .set((
        cart_items::quantity.eq(quantity),
        cart_items::updated_at.eq(diesel::dsl::now),
    ))
    .returning(CartItemEntity::as_returning())
    .get_result(conn)
    .await
    .optional()?
    .ok_or(CheckoutError::CartLineNotFound(variant_id))?;

    touch(conn, cart.id).await?;
    Ok(Some(item))
}

pub async fn remove_item(
    conn: &mut AsyncPgConnection,
    buyer: &BuyerIdentity,
    variant_id: i32,
) -> Result<(), CheckoutError> {
    let cart = find(conn, buyer)
        .await?
        .ok_or(CheckoutError::CartLineNotFound(variant_id))?;

    let deleted = diesel::delete(
        cart_items::table
            .filter(cart_items::cart_id.eq(cart.id))
            .filter(cart_items::variant_id.eq(variant_id)),
    )
    .execute(conn)
    .await?;

    if deleted == 0 {
        return Err(CheckoutError::CartLineNotFound(variant_id));
    }

    touch(conn, cart.id).await?;
    Ok(())
}

/// Deletes every line of the cart but keeps the cart row for later additions.
pub async fn clear(conn: &mut AsyncPgConnection, cart_id: i32) -> QueryResult<usize> {
    diesel::delete(cart_items::table.filter(cart_items::cart_id.eq(cart_id)))
        .execute(conn)
        .await
}

async fn touch(conn: &mut AsyncPgConnection, cart_id: i32) -> QueryResult<usize> {
    diesel::update(carts::table.find(cart_id))
        .set(carts::updated_at.eq(diesel::dsl::now))
        .execute(conn)
        .await
}

async fn ensure_variant_exists(
    conn: &mut AsyncPgConnection,
    variant_id: i32,
) -> Result<(), CheckoutError> {
    let count: i64 = variants::table
        .find(variant_id)
        .count()
        .get_result(conn)
        .await?;

    if count == 0 {
        return Err(CheckoutError::VariantNotFound(variant_id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_total_multiplies_unit_price() {
        let line = CartLine {
            variant_id: 1,
            product_name: "Hoodie".into(),
            sku: "HOOD-M-BLK".into(),
            size: Some("M".into()),
            color: Some("Black".into()),
            unit_price_clp: 24_990,
            quantity: 3,
        };

        assert_eq!(line.line_total_clp(), 74_970);
    }
}
