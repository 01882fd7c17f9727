use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    checkout::{error::CheckoutError, validation::ValidationError},
    identity::IdentityError,
};

/// Envelope every endpoint responds with.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StdResponse<T, M> {
    pub data: Option<T>,
    pub message: Option<M>,
}

impl<T: Serialize, M: Serialize> IntoResponse for StdResponse<T, M> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Resource not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0} is unreachable")]
    ServiceUnreachable(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::ServiceUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Identity(err) => match err {
                IdentityError::Missing => StatusCode::UNAUTHORIZED,
                IdentityError::AccountRequired => StatusCode::FORBIDDEN,
                IdentityError::Ambiguous
                | IdentityError::InvalidAccountId
                | IdentityError::InvalidGuestToken => StatusCode::BAD_REQUEST,
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart
                | CheckoutError::InvalidShippingMethod(_)
                | CheckoutError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
                CheckoutError::InsufficientStock(_) => StatusCode::CONFLICT,
                CheckoutError::Coupon(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CheckoutError::VariantNotFound(_)
                | CheckoutError::CartLineNotFound(_)
                | CheckoutError::Database(diesel::result::Error::NotFound) => {
                    StatusCode::NOT_FOUND
                }
                CheckoutError::OrderNumberCollision(_) | CheckoutError::Pool(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                CheckoutError::Outbox(_) | CheckoutError::Database(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Structured details the client can act on, if any.
    fn data(&self) -> Option<Value> {
        match self {
            Self::Validation(err) => Some(json!({ "fields": err.0 })),
            Self::Checkout(CheckoutError::InsufficientStock(shortfalls)) => {
                Some(json!({ "shortfalls": shortfalls }))
            }
            Self::Checkout(CheckoutError::Coupon(rejection)) => serde_json::to_value(rejection).ok(),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            tracing::error!(error = ?self, status = status.as_u16(), "Request failed");
            match &self {
                Self::ServiceUnreachable(_) => self.to_string(),
                Self::Checkout(err) if err.is_transient() => {
                    "Temporarily unavailable, please retry".to_string()
                }
                _ => "Internal server error".to_string(),
            }
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
            self.to_string()
        };

        let body = StdResponse {
            data: self.data(),
            message: Some(message),
        };

        (status, Json(body)).into_response()
    }
}
