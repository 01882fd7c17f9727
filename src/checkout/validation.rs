//! Checkout input validation.
//!
//! Request bodies are checked and normalized here, before the orchestrator
//! runs, so it only ever sees a [`ValidCheckout`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

const MAX_NAME_LEN: usize = 200;
const MAX_PHONE_LEN: usize = 32;
const MAX_NOTES_LEN: usize = 1_000;
const MAX_COUPON_LEN: usize = 64;

/// Buyer contact and shipping address as submitted at checkout.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ShippingDetails {
    pub customer_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateOrderReq {
    pub shipping: ShippingDetails,
    pub shipping_method_id: i32,
    pub coupon_code: Option<String>,
}

/// A checkout request that passed [`validate_checkout`]: trimmed, with blank
/// optionals collapsed to `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidCheckout {
    pub details: ValidShippingDetails,
    pub shipping_method_id: i32,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidShippingDetails {
    pub customer_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid checkout details: {}", summary(.0))]
pub struct ValidationError(pub Vec<FieldError>);

fn summary(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|err| format!("{} {}", err.field, err.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Default)]
struct Collector(Vec<FieldError>);

impl Collector {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    fn required(&mut self, field: &'static str, value: &str, max_len: usize) -> String {
        let value = value.trim();
        if value.is_empty() {
            self.push(field, "is required");
        } else if value.chars().count() > max_len {
            self.push(field, format!("must be at most {max_len} characters"));
        }
        value.to_string()
    }

    fn optional(
        &mut self,
        field: &'static str,
        value: Option<&str>,
        max_len: usize,
    ) -> Option<String> {
        let value = value.map(str::trim).filter(|value| !value.is_empty())?;
        if value.chars().count() > max_len {
            self.push(field, format!("must be at most {max_len} characters"));
        }
        Some(value.to_string())
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

pub fn validate_checkout(req: &CreateOrderReq) -> Result<ValidCheckout, ValidationError> {
    let mut errors = Collector::default();
    let shipping = &req.shipping;

    let customer_name = errors.required("customer_name", &shipping.customer_name, MAX_NAME_LEN);
    let email = errors.required("email", &shipping.email, MAX_NAME_LEN);
    if !email.is_empty() && !looks_like_email(&email) {
        errors.push("email", "is not a valid email address");
    }
    let phone = errors.optional("phone", shipping.phone.as_deref(), MAX_PHONE_LEN);
    let address_line1 = errors.required("address_line1", &shipping.address_line1, MAX_NAME_LEN);
    let address_line2 =
        errors.optional("address_line2", shipping.address_line2.as_deref(), MAX_NAME_LEN);
    let city = errors.required("city", &shipping.city, MAX_NAME_LEN);
    let region = errors.required("region", &shipping.region, MAX_NAME_LEN);
    let postal_code = errors.optional("postal_code", shipping.postal_code.as_deref(), MAX_PHONE_LEN);
    let notes = errors.optional("notes", shipping.notes.as_deref(), MAX_NOTES_LEN);

    if req.shipping_method_id <= 0 {
        errors.push("shipping_method_id", "must be a positive id");
    }
    let coupon_code = errors.optional("coupon_code", req.coupon_code.as_deref(), MAX_COUPON_LEN);

    if !errors.0.is_empty() {
        return Err(ValidationError(errors.0));
    }

    Ok(ValidCheckout {
        details: ValidShippingDetails {
            customer_name,
            email,
            phone,
            address_line1,
            address_line2,
            city,
            region,
            postal_code,
            notes,
        },
        shipping_method_id: req.shipping_method_id,
        coupon_code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateOrderReq {
        CreateOrderReq {
            shipping: ShippingDetails {
                customer_name: "  Ana Rojas ".into(),
                email: "ana@example.cl".into(),
                phone: Some("   ".into()),
                address_line1: "Av. Providencia 1234".into(),
                address_line2: None,
                city: "Santiago".into(),
                region: "Metropolitana".into(),
                postal_code: None,
                notes: Some("Leave at the door".into()),
            },
            shipping_method_id: 2,
            coupon_code: Some(" WELCOME10 ".into()),
        }
    }

    #[test]
    fn trims_and_collapses_blank_optionals() {
        let valid = validate_checkout(&request()).unwrap();

        assert_eq!(valid.details.customer_name, "Ana Rojas");
        assert_eq!(valid.details.phone, None);
        assert_eq!(valid.details.notes.as_deref(), Some("Leave at the door"));
        assert_eq!(valid.coupon_code.as_deref(), Some("WELCOME10"));
        assert_eq!(valid.shipping_method_id, 2);
    }

    #[test]
    fn collects_every_field_error() {
        let mut req = request();
        req.shipping.customer_name = " ".into();
        req.shipping.email = "not-an-email".into();
        req.shipping.city = String::new();
        req.shipping_method_id = 0;

        let err = validate_checkout(&req).unwrap_err();
        let fields: Vec<&str> = err.0.iter().map(|e| e.field).collect();

        assert_eq!(fields, vec!["customer_name", "email", "city", "shipping_method_id"]);
        assert!(err.to_string().starts_with("Invalid checkout details: customer_name is required"));
    }

    #[test]
    fn email_shape() {
        assert!(looks_like_email("a@b.cl"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("@b.cl"));
        assert!(!looks_like_email("a@@b.cl"));
        assert!(!looks_like_email("a b@c.cl"));
    }

    #[test]
    fn rejects_overlong_notes() {
        let mut req = request();
        req.shipping.notes = Some("x".repeat(MAX_NOTES_LEN + 1));

        let err = validate_checkout(&req).unwrap_err();
        assert_eq!(err.0[0].field, "notes");
    }
}
