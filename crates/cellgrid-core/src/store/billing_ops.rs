//! Subscription and usage ledger operations.

use chrono::{DateTime, Datelike, Utc};

use crate::error::{CoreError, CoreResult};
use crate::model::{
    NewUsageEvent, Subscription, SubscriptionStatus, SubscriptionTier, UsageEvent,
    UsageEventType,
};

use super::Store;

fn same_calendar_month(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

impl Store {
    /// Create a subscription; at most one per tenant.
    pub async fn insert_subscription(
        &self,
        company_id: i64,
        tier: SubscriptionTier,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> CoreResult<Subscription> {
        let mut tables = self.tables.write().await;
        if tables
            .subscriptions
            .iter()
            .any(|s| s.company_id == company_id)
        {
            return Err(CoreError::AlreadyExists(format!(
                "subscription for company {company_id}"
            )));
        }
        let now = Utc::now();
        let id = tables.subscriptions.insert_with(|id| Subscription {
            id,
            company_id,
            tier,
            status: SubscriptionStatus::Active,
            current_period_start: period_start,
            current_period_end: period_end,
            payment_provider_subscription_id: None,
            created_at: now,
            updated_at: now,
        });
        Ok(tables
            .subscriptions
            .get(id)
            .cloned()
            .expect("row just inserted"))
    }

    pub async fn subscription_for_company(&self, company_id: i64) -> Option<Subscription> {
        let tables = self.tables.read().await;
        let result = tables
            .subscriptions
            .iter()
            .find(|s| s.company_id == company_id)
            .cloned();
        result
    }

    pub async fn update_subscription(
        &self,
        company_id: i64,
        tier: Option<SubscriptionTier>,
        status: Option<SubscriptionStatus>,
    ) -> CoreResult<Subscription> {
        let mut tables = self.tables.write().await;
        let sub = tables
            .subscriptions
            .iter_mut()
            .find(|s| s.company_id == company_id)
            .ok_or_else(|| CoreError::not_found("subscription for company", company_id))?;
        if let Some(tier) = tier {
            sub.tier = tier;
        }
        if let Some(status) = status {
            sub.status = status;
        }
        sub.updated_at = Utc::now();
        Ok(sub.clone())
    }

    /// Append a row to the ledger. The ledger is append-only; there is no
    /// update or delete operation on usage events.
    pub async fn append_usage_event(&self, new: NewUsageEvent) -> UsageEvent {
        let mut tables = self.tables.write().await;
        let id = tables.usage_events.insert_with(|id| UsageEvent {
            id,
            company_id: new.company_id,
            user_id: new.user_id,
            event_type: new.event_type,
            quantity: new.quantity,
            file_size_bytes: new.file_size_bytes,
            event_metadata: new.event_metadata.clone(),
            created_at: Utc::now(),
        });
        tables
            .usage_events
            .get(id)
            .cloned()
            .expect("row just inserted")
    }

    pub async fn get_usage_event(&self, event_id: i64) -> Option<UsageEvent> {
        let tables = self.tables.read().await;
        tables.usage_events.get(event_id).cloned()
    }

    /// Merge keys into an event's metadata object. Quantity, type, and
    /// timestamps are immutable; only metadata enrichment is permitted on
    /// the append-only ledger.
    pub async fn merge_usage_event_metadata(
        &self,
        event_id: i64,
        patch: serde_json::Value,
    ) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        let event = tables
            .usage_events
            .get_mut(event_id)
            .ok_or_else(|| CoreError::not_found("usage event", event_id))?;
        if let (Some(target), Some(source)) =
            (event.event_metadata.as_object_mut(), patch.as_object())
        {
            for (key, value) in source {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    /// Signed sum of `quantity` over the tenant's events of one type whose
    /// `created_at` falls in the same UTC calendar month as `at`.
    pub async fn usage_sum_for_month(
        &self,
        company_id: i64,
        event_type: UsageEventType,
        at: DateTime<Utc>,
    ) -> i64 {
        let tables = self.tables.read().await;
        tables
            .usage_events
            .iter()
            .filter(|e| {
                e.company_id == company_id
                    && e.event_type == event_type
                    && same_calendar_month(e.created_at, at)
            })
            .map(|e| e.quantity)
            .sum()
    }

    pub async fn usage_events_for_range(
        &self,
        company_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        event_type: Option<UsageEventType>,
    ) -> Vec<UsageEvent> {
        let tables = self.tables.read().await;
        tables
            .usage_events
            .iter()
            .filter(|e| {
                e.company_id == company_id
                    && e.created_at >= start
                    && e.created_at < end
                    && event_type.map_or(true, |t| e.event_type == t)
            })
            .cloned()
            .collect()
    }
}
