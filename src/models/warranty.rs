//! Read-time derivation of warranty status.
//!
//! Nothing here touches storage: a stored row plus "now" and the
//! expiring-soon threshold fully determine what callers see.

use crate::entities::warranty;
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WarrantyStatus {
    Active,
    ExpiringSoon,
    Expired,
}

impl WarrantyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarrantyStatus::Active => "active",
            WarrantyStatus::ExpiringSoon => "expiring_soon",
            WarrantyStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for WarrantyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WarrantyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(WarrantyStatus::Active),
            "expiring_soon" => Ok(WarrantyStatus::ExpiringSoon),
            "expired" => Ok(WarrantyStatus::Expired),
            other => Err(format!("unknown warranty status '{}'", other)),
        }
    }
}

/// `start_date` plus `months` calendar months. `None` on overflow or a
/// negative month count.
pub fn compute_expires_at(start_date: DateTime<Utc>, months: i32) -> Option<DateTime<Utc>> {
    let months = u32::try_from(months).ok()?;
    start_date.checked_add_months(Months::new(months))
}

/// Whole days left, truncated, never negative.
pub fn days_remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expires_at - now).num_days().max(0)
}

/// Deactivation wins over dates; otherwise the clock decides.
pub fn derive_status(
    is_active: bool,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    threshold_days: i64,
) -> WarrantyStatus {
    if !is_active || now >= expires_at {
        WarrantyStatus::Expired
    } else if days_remaining(expires_at, now) <= threshold_days {
        WarrantyStatus::ExpiringSoon
    } else {
        WarrantyStatus::Active
    }
}

/// Warranty as returned to callers, with derived fields applied.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WarrantyView {
    pub id: Uuid,
    pub company_id: Uuid,
    pub sale_id: Uuid,
    pub sale_item_id: Uuid,
    pub product_id: Uuid,
    pub serial_number: String,
    pub start_date: DateTime<Utc>,
    pub warranty_months: i32,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub invoice_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub warranty_status: WarrantyStatus,
    pub days_remaining: i64,
    pub service_count: u64,
}

impl WarrantyView {
    pub fn from_model(
        model: warranty::Model,
        now: DateTime<Utc>,
        threshold_days: i64,
        service_count: u64,
    ) -> Self {
        let warranty_status = derive_status(model.is_active, model.expires_at, now, threshold_days);
        let days_remaining = days_remaining(model.expires_at, now);
        Self {
            id: model.id,
            company_id: model.company_id,
            sale_id: model.sale_id,
            sale_item_id: model.sale_item_id,
            product_id: model.product_id,
            serial_number: model.serial_number,
            start_date: model.start_date,
            warranty_months: model.warranty_months,
            expires_at: model.expires_at,
            is_active: model.is_active,
            invoice_number: model.invoice_number,
            created_at: model.created_at,
            updated_at: model.updated_at,
            warranty_status,
            days_remaining,
            service_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn twelve_month_warranty_worked_example() {
        let expires = compute_expires_at(utc(2024, 1, 1), 12).unwrap();
        assert_eq!(expires, utc(2025, 1, 1));

        let mid_november = utc(2024, 11, 15);
        assert_eq!(days_remaining(expires, mid_november), 47);
        assert_eq!(
            derive_status(true, expires, mid_november, 30),
            WarrantyStatus::Active
        );

        let december = utc(2024, 12, 10);
        assert_eq!(days_remaining(expires, december), 22);
        assert_eq!(
            derive_status(true, expires, december, 30),
            WarrantyStatus::ExpiringSoon
        );
    }

    #[test]
    fn month_arithmetic_clamps_to_end_of_month() {
        let expires = compute_expires_at(utc(2024, 1, 31), 1).unwrap();
        assert_eq!(expires, utc(2024, 2, 29));
        assert!(compute_expires_at(utc(2024, 1, 31), -1).is_none());
    }

    #[test]
    fn expiry_instant_itself_is_expired() {
        let expires = utc(2025, 1, 1);
        assert_eq!(derive_status(true, expires, expires, 30), WarrantyStatus::Expired);
        assert_eq!(days_remaining(expires, expires + Duration::days(3)), 0);
    }

    #[test]
    fn deactivation_overrides_dates() {
        let expires = utc(2030, 1, 1);
        assert_eq!(
            derive_status(false, expires, utc(2024, 1, 1), 30),
            WarrantyStatus::Expired
        );
    }

    #[test]
    fn partial_days_truncate() {
        let now = utc(2024, 6, 1);
        let expires = now + Duration::hours(30 * 24 + 23);
        assert_eq!(days_remaining(expires, now), 30);
        assert_eq!(derive_status(true, expires, now, 30), WarrantyStatus::ExpiringSoon);
        assert_eq!(
            derive_status(true, now + Duration::days(31), now, 30),
            WarrantyStatus::Active
        );
    }

    #[test]
    fn status_parses_from_query_strings() {
        assert_eq!(
            "expiring_soon".parse::<WarrantyStatus>(),
            Ok(WarrantyStatus::ExpiringSoon)
        );
        assert_eq!(" Active ".parse::<WarrantyStatus>(), Ok(WarrantyStatus::Active));
        assert!("pending".parse::<WarrantyStatus>().is_err());
    }

    proptest! {
        #[test]
        fn status_matches_definition(
            is_active in any::<bool>(),
            offset_minutes in -525_600i64..1_051_200i64,
            threshold in 0i64..120,
        ) {
            let now = utc(2024, 6, 15);
            let expires = now + Duration::minutes(offset_minutes);
            let status = derive_status(is_active, expires, now, threshold);
            let days = days_remaining(expires, now);

            prop_assert!(days >= 0);
            let expected = if !is_active || now >= expires {
                WarrantyStatus::Expired
            } else if days <= threshold {
                WarrantyStatus::ExpiringSoon
            } else {
                WarrantyStatus::Active
            };
            prop_assert_eq!(status, expected);
            // Same inputs, same answer.
            prop_assert_eq!(status, derive_status(is_active, expires, now, threshold));
        }

        #[test]
        fn sql_window_agrees_with_derivation(
            offset_minutes in 1i64..1_051_200i64,
            threshold in 0i64..120,
        ) {
            let now = utc(2024, 6, 15);
            let expires = now + Duration::minutes(offset_minutes);
            let boundary = now + Duration::days(threshold + 1);
            let in_window = expires < boundary;
            prop_assert_eq!(
                in_window,
                derive_status(true, expires, now, threshold) == WarrantyStatus::ExpiringSoon
            );
        }
    }
}
