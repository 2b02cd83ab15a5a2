//! Subscription and usage ledger rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{SubscriptionStatus, SubscriptionTier, UsageEventType};

/// Billing subscription; at most one non-deleted row per tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub company_id: i64,
    pub tier: SubscriptionTier,
    pub status: SubscriptionStatus,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub payment_provider_subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Signed row in the append-only usage ledger.
///
/// Refunds are new rows with negative `quantity` and
/// `event_metadata.refund_for_event_id` set; rows are never updated or
/// removed. Monthly totals are signed sums over the calendar month (UTC).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: i64,
    pub company_id: i64,
    pub user_id: Option<i64>,
    pub event_type: UsageEventType,
    pub quantity: i64,
    pub file_size_bytes: Option<i64>,
    pub event_metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Fields for appending a usage event.
#[derive(Debug, Clone)]
pub struct NewUsageEvent {
    pub company_id: i64,
    pub user_id: Option<i64>,
    pub event_type: UsageEventType,
    pub quantity: i64,
    pub file_size_bytes: Option<i64>,
    pub event_metadata: serde_json::Value,
}

/// Outcome of an atomic check-and-append quota reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaReservation {
    pub reserved: bool,
    pub usage_event_id: Option<i64>,
    pub current_usage: i64,
    pub limit: i64,
    pub tier: SubscriptionTier,
}
