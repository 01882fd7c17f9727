//! Buyer identity resolution.
//!
//! Authentication happens upstream; the gateway forwards either the account
//! id or the guest token of the caller.

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use thiserror::Error;

use crate::app_error::AppError;

pub const ACCOUNT_ID_HEADER: &str = "x-account-id";
pub const GUEST_TOKEN_HEADER: &str = "x-guest-token";

const MAX_GUEST_TOKEN_LEN: usize = 128;

/// Who owns a cart or an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BuyerIdentity {
    Account(i32),
    Guest(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Missing buyer identity: send {ACCOUNT_ID_HEADER} or {GUEST_TOKEN_HEADER}")]
    Missing,

    #[error("Send either {ACCOUNT_ID_HEADER} or {GUEST_TOKEN_HEADER}, not both")]
    Ambiguous,

    #[error("Invalid {ACCOUNT_ID_HEADER} header")]
    InvalidAccountId,

    #[error("Invalid {GUEST_TOKEN_HEADER} header")]
    InvalidGuestToken,

    #[error("This operation requires a signed-in account")]
    AccountRequired,
}

impl BuyerIdentity {
    pub fn account_id(&self) -> Option<i32> {
        match self {
            Self::Account(id) => Some(*id),
            Self::Guest(_) => None,
        }
    }

    pub fn guest_token(&self) -> Option<&str> {
        match self {
            Self::Account(_) => None,
            Self::Guest(token) => Some(token),
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Result<Self, IdentityError> {
        let account = headers.get(ACCOUNT_ID_HEADER);
        let guest = headers.get(GUEST_TOKEN_HEADER);

        match (account, guest) {
            (Some(_), Some(_)) => Err(IdentityError::Ambiguous),
            (Some(value), None) => value
                .to_str()
                .ok()
                .and_then(|value| value.trim().parse::<i32>().ok())
                .filter(|id| *id > 0)
                .map(Self::Account)
                .ok_or(IdentityError::InvalidAccountId),
            (None, Some(value)) => value
                .to_str()
                .ok()
                .and_then(normalize_guest_token)
                .map(Self::Guest)
                .ok_or(IdentityError::InvalidGuestToken),
            (None, None) => Err(IdentityError::Missing),
        }
    }
}

/// Trims a guest token; `None` if it is blank or too long.
pub fn normalize_guest_token(token: &str) -> Option<String> {
    let token = token.trim();
    if token.is_empty() || token.len() > MAX_GUEST_TOKEN_LEN {
        return None;
    }
    Some(token.to_string())
}

/// Resolves the [`BuyerIdentity`] and exposes it to handlers as an `Extension`.
pub async fn buyer_identity(mut req: Request, next: Next) -> Result<Response, AppError> {
    let buyer = BuyerIdentity::from_headers(req.headers())?;
    req.extensions_mut().insert(buyer);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::{
        Extension, Router,
        body::Body,
        http::{HeaderValue, Request as HttpRequest, StatusCode},
        routing::get,
    };
    use tower::ServiceExt;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn resolves_account() {
        let buyer = BuyerIdentity::from_headers(&headers(&[(ACCOUNT_ID_HEADER, "42")])).unwrap();
        assert_eq!(buyer, BuyerIdentity::Account(42));
        assert_eq!(buyer.account_id(), Some(42));
        assert_eq!(buyer.guest_token(), None);
    }

    #[test]
    fn resolves_trimmed_guest_token() {
        let buyer =
            BuyerIdentity::from_headers(&headers(&[(GUEST_TOKEN_HEADER, " tok-123 ")])).unwrap();
        assert_eq!(buyer, BuyerIdentity::Guest("tok-123".into()));
    }

    #[test]
    fn rejects_missing_and_ambiguous() {
        assert_eq!(
            BuyerIdentity::from_headers(&HeaderMap::new()),
            Err(IdentityError::Missing)
        );
        assert_eq!(
            BuyerIdentity::from_headers(&headers(&[
                (ACCOUNT_ID_HEADER, "1"),
                (GUEST_TOKEN_HEADER, "tok")
            ])),
            Err(IdentityError::Ambiguous)
        );
    }

    #[test]
    fn rejects_malformed_values() {
        assert_eq!(
            BuyerIdentity::from_headers(&headers(&[(ACCOUNT_ID_HEADER, "abc")])),
            Err(IdentityError::InvalidAccountId)
        );
        assert_eq!(
            BuyerIdentity::from_headers(&headers(&[(ACCOUNT_ID_HEADER, "-3")])),
            Err(IdentityError::InvalidAccountId)
        );
        assert_eq!(
            BuyerIdentity::from_headers(&headers(&[(GUEST_TOKEN_HEADER, "   ")])),
            Err(IdentityError::InvalidGuestToken)
        );
    }

    #[test]
    fn guest_token_length_is_bounded() {
        assert!(normalize_guest_token(&"a".repeat(MAX_GUEST_TOKEN_LEN)).is_some());
        assert!(normalize_guest_token(&"a".repeat(MAX_GUEST_TOKEN_LEN + 1)).is_none());
    }

    fn router() -> Router {
        Router::new()
            .route(
                "/whoami",
                get(|Extension(buyer): Extension<BuyerIdentity>| async move {
                    format!("{buyer:?}")
                }),
            )
            .route_layer(axum::middleware::from_fn(buyer_identity))
    }

    async fn status_for(headers: &[(&'static str, &'static str)]) -> StatusCode {
        let mut request = HttpRequest::builder().uri("/whoami");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        router()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn middleware_exposes_identity_to_handlers() {
        assert_eq!(status_for(&[(ACCOUNT_ID_HEADER, "7")]).await, StatusCode::OK);
        assert_eq!(status_for(&[(GUEST_TOKEN_HEADER, "tok")]).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn middleware_rejects_bad_identity() {
        assert_eq!(status_for(&[]).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_for(&[(ACCOUNT_ID_HEADER, "7"), (GUEST_TOKEN_HEADER, "tok")]).await,
            StatusCode::BAD_REQUEST
        );
    }
}
