use std::{collections::HashMap, str::FromStr};

use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::warn;

use crate::{
    checkout::pricing::ShippingLine,
    models::ShippingMethodEntity,
    schema::{shipping_methods, shipping_rates},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShippingKind {
    Flat,
    ByRegion,
    Free,
    Pickup,
}

impl FromStr for ShippingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FLAT" => Ok(Self::Flat),
            "BY_REGION" => Ok(Self::ByRegion),
            "FREE" => Ok(Self::Free),
            "PICKUP" => Ok(Self::Pickup),
            other => Err(format!("unknown shipping kind {other}")),
        }
    }
}

impl ShippingKind {
    /// Price for this kind given the method's flat price and the matching
    /// region rate, if any. A missing value prices at 0.
    pub fn price(self, flat_price_clp: Option<i64>, region_rate_clp: Option<i64>) -> i64 {
        match self {
            Self::Flat => flat_price_clp.unwrap_or(0),
            Self::ByRegion => region_rate_clp.unwrap_or(0),
            Self::Free | Self::Pickup => 0,
        }
    }
}

fn shipping_line(method: &ShippingMethodEntity, region_rate_clp: Option<i64>) -> Option<ShippingLine> {
    let kind = match method.kind.parse::<ShippingKind>() {
        Ok(kind) => kind,
        Err(err) => {
            warn!(shipping_method_id = method.id, error = %err, "Skipping shipping method");
            return None;
        }
    };

    Some(ShippingLine {
        shipping_method_id: method.id,
        name: method.name.clone(),
        kind: method.kind.clone(),
        price_clp: kind.price(method.flat_price_clp, region_rate_clp),
    })
}

/// Resolves an active shipping method to a priced line.
///
/// `None` when the method does not exist, is inactive, or has an unknown kind.
pub async fn resolve(
    conn: &mut AsyncPgConnection,
    shipping_method_id: i32,
    region: Option<&str>,
) -> QueryResult<Option<ShippingLine>> {
    let method: Option<ShippingMethodEntity> = shipping_methods::table
        .find(shipping_method_id)
        .filter(shipping_methods::is_active.eq(true))
        .select(ShippingMethodEntity::as_select())
        .first(conn)
        .await
        .optional()?;

    let Some(method) = method else {
        return Ok(None);
    };

    let region_rate_clp = match (method.kind.as_str(), region) {
        ("BY_REGION", Some(region)) => {
            shipping_rates::table
                .filter(shipping_rates::shipping_method_id.eq(method.id))
                .filter(shipping_rates::region.eq(region))
                .select(shipping_rates::price_clp)
                .first::<i64>(conn)
                .await
                .optional()?
        }
        _ => None,
    };

    if method.kind == "BY_REGION" && region_rate_clp.is_none() {
        warn!(
            shipping_method_id = method.id,
            region = region.unwrap_or_default(),
            "No region rate configured, shipping priced at 0"
        );
    }

    Ok(shipping_line(&method, region_rate_clp))
}

/// Every active method, priced for `region`.
pub async fn list_active(
    conn: &mut AsyncPgConnection,
    region: Option<&str>,
) -> QueryResult<Vec<ShippingLine>> {
    let methods: Vec<ShippingMethodEntity> = shipping_methods::table
        .filter(shipping_methods::is_active.eq(true))
        .order_by(shipping_methods::id.asc())
        .select(ShippingMethodEntity::as_select())
        .load(conn)
        .await?;

    let rates: HashMap<i32, i64> = match region {
        Some(region) => shipping_rates::table
            .filter(shipping_rates::region.eq(region))
            .select((shipping_rates::shipping_method_id, shipping_rates::price_clp))
            .load::<(i32, i64)>(conn)
            .await?
            .into_iter()
            .collect(),
        None => HashMap::new(),
    };

    Ok(methods
        .iter()
        .filter_map(|method| shipping_line(method, rates.get(&method.id).copied()))
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn method(kind: &str, flat_price_clp: Option<i64>) -> ShippingMethodEntity {
        ShippingMethodEntity {
            id: 3,
            name: "Despacho".into(),
            kind: kind.into(),
            flat_price_clp,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn prices_each_kind() {
        assert_eq!(ShippingKind::Flat.price(Some(3_990), Some(9_999)), 3_990);
        assert_eq!(ShippingKind::ByRegion.price(Some(3_990), Some(5_500)), 5_500);
        assert_eq!(ShippingKind::Free.price(Some(3_990), Some(5_500)), 0);
        assert_eq!(ShippingKind::Pickup.price(None, None), 0);
    }

    #[test]
    fn missing_region_rate_prices_at_zero() {
        let line = shipping_line(&method("BY_REGION", None), None).unwrap();
        assert_eq!(line.price_clp, 0);
        assert_eq!(line.kind, "BY_REGION");
    }

    #[test]
    fn flat_without_price_prices_at_zero() {
        assert_eq!(shipping_line(&method("FLAT", None), None).unwrap().price_clp, 0);
    }

    #[test]
    fn unknown_kind_is_not_selectable() {
        assert!(shipping_line(&method("DRONE", Some(1_000)), None).is_none());
    }
}
