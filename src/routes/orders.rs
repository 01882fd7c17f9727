use anyhow::{Context, Result};
use axum::{
    Extension,
    extract::{Path, State},
    response::IntoResponse,
};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    checkout::{
        error::CheckoutError,
        orders::{self, PlacedOrder},
    },
    identity::{self, BuyerIdentity},
    models::OrderEntity,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_my_orders))
            .routes(utoipa_axum::routes!(get_order))
            .route_layer(axum::middleware::from_fn(identity::buyer_identity)),
    )
}

/// Fetch all orders of the calling buyer, newest first.
#[utoipa::path(
    get,
    path = "/me",
    tags = ["Orders"],
    responses(
        (status = 200, description = "List my orders", body = StdResponse<Vec<OrderEntity>, String>)
    )
)]
async fn get_my_orders(
    State(state): State<AppState>,
    Extension(buyer): Extension<BuyerIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .map_err(|err| CheckoutError::Pool(err.to_string()))?;

    let orders = orders::list_for_buyer(conn, &buyer)
        .await
        .context("Failed to get my orders")?;

    Ok(StdResponse {
        data: Some(orders),
        message: Some("Get my orders successfully"),
    })
}

/// Fetch one order of the calling buyer with its frozen lines.
#[utoipa::path(
    get,
    path = "/{order_number}",
    tags = ["Orders"],
    params(
        ("order_number" = String, Path, description = "Order number to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<PlacedOrder, String>),
        (status = 404, description = "No such order for this buyer")
    )
)]
async fn get_order(
    Path(order_number): Path<String>,
    State(state): State<AppState>,
    Extension(buyer): Extension<BuyerIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .map_err(|err| CheckoutError::Pool(err.to_string()))?;

    let order = orders::find_for_buyer(conn, &buyer, &order_number)
        .await
        .context("Failed to get order")?
        .ok_or(AppError::NotFound)?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Get order successfully"),
    })
}
