use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    checkout::{error::CheckoutError, pricing::ShippingLine, shipping},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(utoipa_axum::routes!(get_shipping_methods))
}

#[derive(Deserialize, IntoParams)]
struct ShippingMethodsQuery {
    /// Destination region used to price `BY_REGION` methods.
    region: Option<String>,
}

/// List active shipping methods priced for the given region.
#[utoipa::path(
    get,
    path = "/shipping-methods",
    tags = ["Shipping"],
    params(ShippingMethodsQuery),
    responses(
        (status = 200, description = "List shipping methods", body = StdResponse<Vec<ShippingLine>, String>)
    )
)]
async fn get_shipping_methods(
    State(state): State<AppState>,
    Query(query): Query<ShippingMethodsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .map_err(|err| CheckoutError::Pool(err.to_string()))?;

    let region = query.region.as_deref().map(str::trim).filter(|r| !r.is_empty());
    let methods = shipping::list_active(conn, region)
        .await
        .context("Failed to get shipping methods")?;

    Ok(StdResponse {
        data: Some(methods),
        message: Some("Get shipping methods successfully"),
    })
}
