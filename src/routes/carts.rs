use anyhow::{Context, Result};
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    checkout::{carts, error::CheckoutError, merge, merge::MergeSummary, pricing::QuoteLine},
    identity::{self, BuyerIdentity, IdentityError},
    models::CartItemEntity,
};

/// Cart routes of the calling buyer.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/carts",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_my_cart))
            .routes(utoipa_axum::routes!(add_item))
            .routes(utoipa_axum::routes!(set_item_quantity))
            .routes(utoipa_axum::routes!(remove_item))
            .routes(utoipa_axum::routes!(merge_guest_cart))
            .route_layer(axum::middleware::from_fn(identity::buyer_identity)),
    )
}

#[derive(Serialize, ToSchema)]
struct GetCartRes {
    pub cart_id: Option<i32>,
    pub line_items: Vec<QuoteLine>,
    pub subtotal_clp: i64,
}

/// Fetch the cart of the calling buyer.
#[utoipa::path(
    get,
    path = "/me",
    tags = ["Carts"],
    responses(
        (status = 200, description = "Get my cart successfully", body = StdResponse<GetCartRes, String>)
    )
)]
async fn get_my_cart(
    State(state): State<AppState>,
    Extension(buyer): Extension<BuyerIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .map_err(|err| CheckoutError::Pool(err.to_string()))?;

    let cart = carts::find(conn, &buyer)
        .await
        .context("Failed to get cart")?;

    let line_items: Vec<QuoteLine> = match &cart {
        Some(cart) => carts::load_lines(conn, cart.id)
            .await
            .context("Failed to get cart items")?
            .iter()
            .map(QuoteLine::from)
            .collect(),
        None => Vec::new(),
    };
    let subtotal_clp = line_items.iter().map(|line| line.line_total_clp).sum();

    Ok(StdResponse {
        data: Some(GetCartRes {
            cart_id: cart.map(|cart| cart.id),
            line_items,
            subtotal_clp,
        }),
        message: Some("Get my cart successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct AddItemReq {
    variant_id: i32,
    quantity: i32,
}

/// Add units of a variant to the cart, creating the cart on first use.
#[utoipa::path(
    post,
    path = "/me/items",
    tags = ["Carts"],
    request_body = AddItemReq,
    responses(
        (status = 200, description = "Added item successfully", body = StdResponse<CartItemEntity, String>),
        (status = 400, description = "Quantity below 1"),
        (status = 404, description = "Variant does not exist")
    )
)]
async fn add_item(
    State(state): State<AppState>,
    Extension(buyer): Extension<BuyerIdentity>,
    Json(body): Json<AddItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .map_err(|err| CheckoutError::Pool(err.to_string()))?;

    let item = carts::add_item(conn, &buyer, body.variant_id, body.quantity).await?;

    Ok(StdResponse {
        data: Some(item),
        message: Some("Added item successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct SetQuantityReq {
    quantity: i32,
}

/// Overwrite the quantity of a cart line. A quantity of 0 removes the line.
#[utoipa::path(
    patch,
    path = "/me/items/{variant_id}",
    tags = ["Carts"],
    params(
        ("variant_id" = i32, Path, description = "Variant of the cart line")
    ),
    request_body = SetQuantityReq,
    responses(
        (status = 200, description = "Updated item successfully", body = StdResponse<CartItemEntity, String>),
        (status = 404, description = "Variant is not in the cart")
    )
)]
async fn set_item_quantity(
    Path(variant_id): Path<i32>,
    State(state): State<AppState>,
    Extension(buyer): Extension<BuyerIdentity>,
    Json(body): Json<SetQuantityReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .map_err(|err| CheckoutError::Pool(err.to_string()))?;

    let item = carts::set_quantity(conn, &buyer, variant_id, body.quantity).await?;
    let message = if item.is_some() {
        "Updated item successfully"
    } else {
        "Removed item successfully"
    };

    Ok(StdResponse {
        data: item,
        message: Some(message),
    })
}

/// Remove a line from the cart.
#[utoipa::path(
    delete,
    path = "/me/items/{variant_id}",
    tags = ["Carts"],
    params(
        ("variant_id" = i32, Path, description = "Variant of the cart line")
    ),
    responses(
        (status = 200, description = "Removed item successfully", body = StdResponse<String, String>),
        (status = 404, description = "Variant is not in the cart")
    )
)]
async fn remove_item(
    Path(variant_id): Path<i32>,
    State(state): State<AppState>,
    Extension(buyer): Extension<BuyerIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .map_err(|err| CheckoutError::Pool(err.to_string()))?;

    carts::remove_item(conn, &buyer, variant_id).await?;

    Ok(StdResponse::<(), &str> {
        data: None,
        message: Some("Removed item successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct MergeReq {
    /// Token of the guest session whose cart is folded into the account cart.
    guest_token: String,
}

/// Merge a guest cart into the calling account's cart.
///
/// Safe to retry: once merged, the guest cart no longer exists and a second
/// call merges nothing.
#[utoipa::path(
    post,
    path = "/merge",
    tags = ["Carts"],
    request_body = MergeReq,
    responses(
        (status = 200, description = "Merged carts successfully", body = StdResponse<MergeSummary, String>),
        (status = 403, description = "Caller is not a signed-in account")
    )
)]
async fn merge_guest_cart(
    State(state): State<AppState>,
    Extension(buyer): Extension<BuyerIdentity>,
    Json(body): Json<MergeReq>,
) -> Result<impl IntoResponse, AppError> {
    let BuyerIdentity::Account(account_id) = buyer else {
        return Err(IdentityError::AccountRequired.into());
    };
    let guest_token = identity::normalize_guest_token(&body.guest_token).ok_or_else(|| {
        AppError::BadRequest("guest_token must be a non-empty token of at most 128 characters".into())
    })?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .map_err(|err| CheckoutError::Pool(err.to_string()))?;

    let summary = merge::merge_guest_cart(conn, account_id, &guest_token).await?;

    Ok(StdResponse {
        data: Some(summary),
        message: Some("Merged carts successfully"),
    })
}
