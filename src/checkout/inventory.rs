//! Inventory guard.
//!
//! Stock on `variants.stock` is the single source of truth. Validation reports
//! every shortfall at once. Inside the order transaction the variant rows are
//! locked in id order before re-validating, and the decrement itself refuses to
//! go below zero, so two checkouts racing for the last unit cannot both win.

use std::collections::HashMap;

use diesel::{ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::warn;

use crate::{
    checkout::{
        carts::CartLine,
        error::{CheckoutError, Shortfall},
    },
    schema::variants,
};

/// Compares requested quantities against `available` stock per variant.
///
/// A variant missing from `available` no longer exists.
pub fn find_shortfalls(
    lines: &[CartLine],
    available: &HashMap<i32, i32>,
) -> Result<Vec<Shortfall>, CheckoutError> {
    let mut shortfalls = Vec::new();
    for line in lines {
        let stock = *available
            .get(&line.variant_id)
            .ok_or(CheckoutError::VariantNotFound(line.variant_id))?;

        if line.quantity > stock {
            shortfalls.push(Shortfall {
                variant_id: line.variant_id,
                product_name: line.product_name.clone(),
                size: line.size.clone(),
                requested: line.quantity,
                available: stock,
            });
        }
    }
    Ok(shortfalls)
}

/// Unlocked stock check, used by quotes and before the order transaction opens.
pub async fn validate(conn: &mut AsyncPgConnection, lines: &[CartLine]) -> Result<(), CheckoutError> {
    let available: HashMap<i32, i32> = variants::table
        .filter(variants::id.eq_any(variant_ids(lines)))
        .select((variants::id, variants::stock))
        .load::<(i32, i32)>(conn)
        .await?
        .into_iter()
        .collect();

    check(lines, &available)
}

/// Stock check holding `FOR UPDATE` locks on every variant until the
/// surrounding transaction ends. Must run inside that transaction.
pub async fn lock_and_validate(
    conn: &mut AsyncPgConnection,
    lines: &[CartLine],
) -> Result<(), CheckoutError> {
    let available: HashMap<i32, i32> = variants::table
        .filter(variants::id.eq_any(variant_ids(lines)))
        .order_by(variants::id.asc())
        .select((variants::id, variants::stock))
        .for_update()
        .load::<(i32, i32)>(conn)
        .await?
        .into_iter()
        .collect();

    check(lines, &available)
}

/// Subtracts each line's quantity from its variant.
///
/// The update only matches while `stock >= quantity`; a miss means another
/// buyer got there first and the caller's transaction must roll back.
pub async fn decrement(conn: &mut AsyncPgConnection, lines: &[CartLine]) -> Result<(), CheckoutError> {
    let mut ordered: Vec<&CartLine> = lines.iter().collect();
    ordered.sort_by_key(|line| line.variant_id);

    for line in ordered {
        let updated = diesel::update(
            variants::table
                .find(line.variant_id)
                .filter(variants::stock.ge(line.quantity)),
        )
        .set((
            variants::stock.eq(variants::stock - line.quantity),
            variants::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .await?;

        if updated == 0 {
            let available: Option<i32> = variants::table
                .find(line.variant_id)
                .select(variants::stock)
                .first(conn)
                .await
                .optional()?;

            let Some(available) = available else {
                return Err(CheckoutError::VariantNotFound(line.variant_id));
            };

            warn!(
                variant_id = line.variant_id,
                requested = line.quantity,
                available,
                "Stock decrement lost a race"
            );
            return Err(CheckoutError::InsufficientStock(vec![Shortfall {
                variant_id: line.variant_id,
                product_name: line.product_name.clone(),
                size: line.size.clone(),
                requested: line.quantity,
                available,
            }]));
        }
    }
    Ok(())
}

fn variant_ids(lines: &[CartLine]) -> Vec<i32> {
    lines.iter().map(|line| line.variant_id).collect()
}

fn check(lines: &[CartLine], available: &HashMap<i32, i32>) -> Result<(), CheckoutError> {
    let shortfalls = find_shortfalls(lines, available)?;
    if shortfalls.is_empty() {
        Ok(())
    } else {
        Err(CheckoutError::InsufficientStock(shortfalls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(variant_id: i32, quantity: i32) -> CartLine {
        CartLine {
            variant_id,
            product_name: format!("Product {variant_id}"),
            sku: format!("SKU-{variant_id}"),
            size: Some("L".into()),
            color: None,
            unit_price_clp: 1_000,
            quantity,
        }
    }

    #[test]
    fn reports_every_shortfall_not_just_the_first() {
        let lines = [line(1, 5), line(2, 1), line(3, 4)];
        let available = HashMap::from([(1, 2), (2, 10), (3, 0)]);

        let shortfalls = find_shortfalls(&lines, &available).unwrap();

        assert_eq!(shortfalls.len(), 2);
        assert_eq!(shortfalls[0].variant_id, 1);
        assert_eq!(shortfalls[0].requested, 5);
        assert_eq!(shortfalls[0].available, 2);
        assert_eq!(shortfalls[1].variant_id, 3);
        assert_eq!(shortfalls[1].available, 0);
    }

    #[test]
    fn exact_stock_is_enough() {
        let lines = [line(1, 3)];
        let available = HashMap::from([(1, 3)]);

        assert!(check(&lines, &available).is_ok());
    }

    #[test]
    fn missing_variant_is_not_found() {
        let lines = [line(9, 1)];
        let err = find_shortfalls(&lines, &HashMap::new()).unwrap_err();

        assert!(matches!(err, CheckoutError::VariantNotFound(9)));
    }

    #[test]
    fn shortfalls_become_insufficient_stock() {
        let lines = [line(1, 2)];
        let available = HashMap::from([(1, 1)]);

        match check(&lines, &available) {
            Err(CheckoutError::InsufficientStock(shortfalls)) => {
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].size.as_deref(), Some("L"));
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }
    }
}
