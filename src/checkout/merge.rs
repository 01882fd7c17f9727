//! Folds a guest cart into an account cart once the guest signs in.

use std::collections::HashSet;

use diesel::{
    ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper, upsert::excluded,
};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    checkout::{carts, error::CheckoutError},
    identity::BuyerIdentity,
    models::{CartEntity, CartItemEntity, CreateCartItemEntity},
    schema::{cart_items, carts as carts_table},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStep {
    /// The account already holds the variant; add the guest quantity to it.
    Combine { variant_id: i32, quantity: i32 },
    /// New to the account cart.
    Add { variant_id: i32, quantity: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MergeSummary {
    /// Account cart that received the lines, `None` when there was nothing to merge.
    pub cart_id: Option<i32>,
    pub combined: usize,
    pub added: usize,
}

impl MergeSummary {
    fn nothing() -> Self {
        Self {
            cart_id: None,
            combined: 0,
            added: 0,
        }
    }
}

/// Decides, per guest line, whether it combines with an account line or is added.
pub fn plan_merge(account: &[CartItemEntity], guest: &[CartItemEntity]) -> Vec<MergeStep> {
    let existing: HashSet<i32> = account.iter().map(|item| item.variant_id).collect();

    guest
        .iter()
        .map(|item| {
            if existing.contains(&item.variant_id) {
                MergeStep::Combine {
                    variant_id: item.variant_id,
                    quantity: item.quantity,
                }
            } else {
                MergeStep::Add {
                    variant_id: item.variant_id,
                    quantity: item.quantity,
                }
            }
        })
        .collect()
}

/// Merges the guest cart identified by `guest_token` into the account's cart
/// and deletes the guest cart, all in one transaction.
///
/// A missing guest cart is a successful no-op, which makes retries safe.
/// Stock is not checked; the order path does that.
pub async fn merge_guest_cart(
    conn: &mut AsyncPgConnection,
    account_id: i32,
    guest_token: &str,
) -> Result<MergeSummary, CheckoutError> {
    let guest_token = guest_token.to_string();

    conn.transaction(move |conn| {
        Box::pin(async move {
            let guest_cart: Option<CartEntity> = carts_table::table
                .filter(carts_table::guest_token.eq(guest_token.as_str()))
                .select(CartEntity::as_select())
                .for_update()
                .first(conn)
                .await
                .optional()?;

            let Some(guest_cart) = guest_cart else {
                return Ok(MergeSummary::nothing());
            };

            let guest_items = carts::load_items(conn, guest_cart.id).await?;
            if guest_items.is_empty() {
                diesel::delete(carts_table::table.find(guest_cart.id))
                    .execute(conn)
                    .await?;
                return Ok(MergeSummary::nothing());
            }

            let account_cart =
                carts::find_or_create(conn, &BuyerIdentity::Account(account_id)).await?;
            let account_items = carts::load_items(conn, account_cart.id).await?;

            let steps = plan_merge(&account_items, &guest_items);
            let mut summary = MergeSummary {
                cart_id: Some(account_cart.id),
                combined: 0,
                added: 0,
            };

            for step in steps {
                let (variant_id, quantity) = match step {
                    MergeStep::Combine {
                        variant_id,
                        quantity,
                    } => {
                        summary.combined += 1;
                        (variant_id, quantity)
                    }
                    MergeStep::Add {
                        variant_id,
                        quantity,
                    } => {
                        summary.added += 1;
                        (variant_id, quantity)
                    }
                };

                // Upsert either way: the account cart may gain the variant concurrently.
                diesel::insert_into(cart_items::table)
                    .values(CreateCartItemEntity {
                        cart_id: account_cart.id,
                        variant_id,
                        quantity,
                    })
                    .on_conflict((cart_items::cart_id, cart_items::variant_id))
                    .do_update()
                    .set((
                        cart_items::quantity
                            .eq(cart_items::quantity + excluded(cart_items::quantity)),
                        cart_items::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)
                    .await?;
            }

            diesel::delete(carts_table::table.find(guest_cart.id))
                .execute(conn)
                .await?;

            diesel::update(carts_table::table.find(account_cart.id))
                .set(carts_table::updated_at.eq(diesel::dsl::now))
                .execute(conn)
                .await?;

            info!(
                account_id,
                guest_cart_id = guest_cart.id,
                combined = summary.combined,
                added = summary.added,
                "Merged guest cart into account cart"
            );

            Ok::<MergeSummary, CheckoutError>(summary)
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;

    use super::*;

    fn item(cart_id: i32, variant_id: i32, quantity: i32) -> CartItemEntity {
        CartItemEntity {
            cart_id,
            variant_id,
            quantity,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn apply(account: &[CartItemEntity], steps: &[MergeStep]) -> HashMap<i32, i32> {
        let mut merged: HashMap<i32, i32> = account
            .iter()
            .map(|item| (item.variant_id, item.quantity))
            .collect();
        for step in steps {
            match *step {
                MergeStep::Combine {
                    variant_id,
                    quantity,
                }
                | MergeStep::Add {
                    variant_id,
                    quantity,
                } => *merged.entry(variant_id).or_insert(0) += quantity,
            }
        }
        merged
    }

    #[test]
    fn combines_shared_variants_and_keeps_the_rest() {
        const A: i32 = 10;
        const B: i32 = 20;
        let account = [item(1, A, 1), item(1, B, 3)];
        let guest = [item(2, A, 2)];

        let steps = plan_merge(&account, &guest);

        assert_eq!(
            steps,
            vec![MergeStep::Combine {
                variant_id: A,
                quantity: 2
            }]
        );
        assert_eq!(apply(&account, &steps), HashMap::from([(A, 3), (B, 3)]));
    }

    #[test]
    fn adds_variants_new_to_the_account() {
        let account = [item(1, 10, 1)];
        let guest = [item(2, 30, 4)];

        let steps = plan_merge(&account, &guest);

        assert_eq!(
            steps,
            vec![MergeStep::Add {
                variant_id: 30,
                quantity: 4
            }]
        );
    }

    #[test]
    fn empty_guest_cart_plans_nothing() {
        assert!(plan_merge(&[item(1, 10, 1)], &[]).is_empty());
    }
}
