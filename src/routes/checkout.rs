use anyhow::Result;
use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    checkout::{
        coupons::{self, CouponValidation},
        error::CheckoutError,
        orders::PlacedOrder,
        pricing::{self, Quote},
        validation::{CreateOrderReq, validate_checkout},
    },
    identity::{self, BuyerIdentity},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/checkout",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(quote))
            .routes(utoipa_axum::routes!(validate_coupon))
            .routes(utoipa_axum::routes!(create_order))
            .route_layer(axum::middleware::from_fn(identity::buyer_identity)),
    )
}

#[derive(Deserialize, ToSchema)]
struct QuoteReq {
    shipping_method_id: Option<i32>,
    region: Option<String>,
    coupon_code: Option<String>,
}

/// Price the current cart without placing an order.
#[utoipa::path(
    post,
    path = "/quote",
    tags = ["Checkout"],
    request_body = QuoteReq,
    responses(
        (status = 200, description = "Quoted cart successfully", body = StdResponse<Quote, String>),
        (status = 409, description = "Some lines exceed available stock")
    )
)]
async fn quote(
    State(state): State<AppState>,
    Extension(buyer): Extension<BuyerIdentity>,
    Json(body): Json<QuoteReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .map_err(|err| CheckoutError::Pool(err.to_string()))?;

    let region = body.region.as_deref().map(str::trim).filter(|r| !r.is_empty());
    let coupon_code = body
        .coupon_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let quote = pricing::quote_cart(conn, &buyer, body.shipping_method_id, region, coupon_code).await?;

    Ok(StdResponse {
        data: Some(quote),
        message: Some("Quoted cart successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct ValidateCouponReq {
    code: String,
    subtotal_clp: i64,
}

/// Check a coupon code against a subtotal and report why it does not apply.
#[utoipa::path(
    post,
    path = "/coupons/validate",
    tags = ["Checkout"],
    request_body = ValidateCouponReq,
    responses(
        (status = 200, description = "Coupon applies", body = StdResponse<CouponValidation, String>),
        (status = 422, description = "Coupon does not apply; `data.reason` says why")
    )
)]
async fn validate_coupon(
    State(state): State<AppState>,
    Json(body): Json<ValidateCouponReq>,
) -> Result<impl IntoResponse, AppError> {
    let code = body.code.trim();
    if code.is_empty() {
        return Err(AppError::BadRequest("code is required".into()));
    }
    if body.subtotal_clp < 0 {
        return Err(AppError::BadRequest("subtotal_clp must not be negative".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .map_err(|err| CheckoutError::Pool(err.to_string()))?;

    let validation = coupons::validate_code(conn, code, body.subtotal_clp, Utc::now())
        .await
        .map_err(CheckoutError::from)?
        .map_err(CheckoutError::from)?;

    Ok(StdResponse {
        data: Some(validation),
        message: Some("Coupon applies"),
    })
}

/// Place an order for the current cart.
#[utoipa::path(
    post,
    path = "/orders",
    tags = ["Checkout"],
    request_body = CreateOrderReq,
    responses(
        (status = 201, description = "Created order successfully", body = StdResponse<PlacedOrder, String>),
        (status = 400, description = "Invalid details, empty cart or unknown shipping method"),
        (status = 409, description = "Some lines exceed available stock"),
        (status = 503, description = "Order number allocation failed, safe to retry")
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Extension(buyer): Extension<BuyerIdentity>,
    Json(body): Json<CreateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    let checkout = validate_checkout(&body)?;
    let placed = state.checkout.create_order(&buyer, checkout).await?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(placed),
            message: Some("Created order successfully"),
        },
    ))
}
