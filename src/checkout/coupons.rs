use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::{checkout::error::CouponRejection, models::CouponEntity, schema::coupons};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    Percent,
    Fixed,
}

impl FromStr for DiscountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERCENT" => Ok(Self::Percent),
            "FIXED" => Ok(Self::Fixed),
            other => Err(format!("unknown discount type {other}")),
        }
    }
}

/// Successful answer of the coupon-entry check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CouponValidation {
    pub code: String,
    pub discount_type: DiscountType,
    pub value: i64,
    pub discount_clp: i64,
}

/// Discount granted by `discount_type`/`value` on `subtotal_clp`, always within `[0, subtotal]`.
///
/// Percentages round half up to the nearest whole currency unit.
pub fn discount_amount(discount_type: DiscountType, value: i64, subtotal_clp: i64) -> i64 {
    let subtotal_clp = subtotal_clp.max(0);
    let raw = match discount_type {
        DiscountType::Percent => {
            let scaled = i128::from(subtotal_clp) * i128::from(value.max(0));
            i64::try_from((scaled + 50) / 100).unwrap_or(i64::MAX)
        }
        DiscountType::Fixed => value,
    };
    raw.clamp(0, subtotal_clp)
}

/// Checks every applicability rule in order and returns the discount the coupon grants.
pub fn evaluate(
    coupon: &CouponEntity,
    subtotal_clp: i64,
    now: DateTime<Utc>,
) -> Result<CouponValidation, CouponRejection> {
    let code = coupon.code.clone();

    if !coupon.is_active {
        return Err(CouponRejection::Inactive { code });
    }
    if let Some(starts_at) = coupon.starts_at.filter(|starts_at| *starts_at > now) {
        return Err(CouponRejection::NotYetStarted { code, starts_at });
    }
    if let Some(ends_at) = coupon.ends_at.filter(|ends_at| *ends_at < now) {
        return Err(CouponRejection::Expired { code, ends_at });
    }
    if let Some(min_subtotal_clp) = coupon
        .min_subtotal_clp
        .filter(|minimum| subtotal_clp < *minimum)
    {
        return Err(CouponRejection::BelowMinimumSubtotal {
            code,
            min_subtotal_clp,
        });
    }

    let discount_type = coupon.discount_type.parse::<DiscountType>().map_err(|err| {
        warn!(coupon_id = coupon.id, error = %err, "Coupon has an unusable discount type");
        CouponRejection::Inactive { code: code.clone() }
    })?;

    Ok(CouponValidation {
        discount_clp: discount_amount(discount_type, coupon.value, subtotal_clp),
        code,
        discount_type,
        value: coupon.value,
    })
}

pub async fn find_by_code(
    conn: &mut AsyncPgConnection,
    code: &str,
) -> QueryResult<Option<CouponEntity>> {
    coupons::table
        .filter(coupons::code.eq(code))
        .select(CouponEntity::as_select())
        .first(conn)
        .await
        .optional()
}

/// Coupon-entry feedback: same rules as pricing, but every failure is reported.
pub async fn validate_code(
    conn: &mut AsyncPgConnection,
    code: &str,
    subtotal_clp: i64,
    now: DateTime<Utc>,
) -> Result<Result<CouponValidation, CouponRejection>, diesel::result::Error> {
    let Some(coupon) = find_by_code(conn, code).await? else {
        return Ok(Err(CouponRejection::NotFound {
            code: code.to_string(),
        }));
    };
    Ok(evaluate(&coupon, subtotal_clp, now))
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    pub(crate) fn coupon(discount_type: &str, value: i64) -> CouponEntity {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        CouponEntity {
            id: 7,
            code: "SAVE".into(),
            discount_type: discount_type.into(),
            value,
            is_active: true,
            starts_at: None,
            ends_at: None,
            min_subtotal_clp: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn percent_discount_on_round_subtotal() {
        assert_eq!(discount_amount(DiscountType::Percent, 10, 50_000), 5_000);
    }

    #[test]
    fn percent_discount_rounds_to_nearest_unit() {
        assert_eq!(discount_amount(DiscountType::Percent, 10, 333), 33);
        assert_eq!(discount_amount(DiscountType::Percent, 10, 335), 34);
        assert_eq!(discount_amount(DiscountType::Percent, 15, 999), 150);
    }

    #[test]
    fn fixed_discount_is_clamped_to_subtotal() {
        assert_eq!(discount_amount(DiscountType::Fixed, 5_000, 3_000), 3_000);
        assert_eq!(discount_amount(DiscountType::Fixed, 2_000, 3_000), 2_000);
        assert_eq!(discount_amount(DiscountType::Percent, 150, 1_000), 1_000);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let mut c = coupon("FIXED", 1_000);
        c.starts_at = Some(now());
        c.ends_at = Some(now());

        let validation = evaluate(&c, 10_000, now()).unwrap();
        assert_eq!(validation.discount_clp, 1_000);
        assert_eq!(validation.discount_type, DiscountType::Fixed);
    }

    #[test]
    fn rejects_inactive_before_checking_window() {
        let mut c = coupon("PERCENT", 10);
        c.is_active = false;
        c.ends_at = Some(now() - Duration::days(1));

        assert_eq!(
            evaluate(&c, 10_000, now()),
            Err(CouponRejection::Inactive { code: "SAVE".into() })
        );
    }

    #[test]
    fn rejects_coupon_outside_window() {
        let mut c = coupon("PERCENT", 10);
        c.starts_at = Some(now() + Duration::hours(1));
        assert!(matches!(
            evaluate(&c, 10_000, now()),
            Err(CouponRejection::NotYetStarted { .. })
        ));

        let mut c = coupon("PERCENT", 10);
        c.ends_at = Some(now() - Duration::seconds(1));
        assert!(matches!(
            evaluate(&c, 10_000, now()),
            Err(CouponRejection::Expired { .. })
        ));
    }

    #[test]
    fn rejects_subtotal_below_minimum() {
        let mut c = coupon("PERCENT", 10);
        c.min_subtotal_clp = Some(100_000);

        assert_eq!(
            evaluate(&c, 99_999, now()),
            Err(CouponRejection::BelowMinimumSubtotal {
                code: "SAVE".into(),
                min_subtotal_clp: 100_000,
            })
        );
        assert_eq!(evaluate(&c, 100_000, now()).unwrap().discount_clp, 10_000);
    }

    #[test]
    fn unknown_discount_type_is_not_applicable() {
        let c = coupon("BOGO", 10);
        assert!(matches!(
            evaluate(&c, 10_000, now()),
            Err(CouponRejection::Inactive { .. })
        ));
    }
}
