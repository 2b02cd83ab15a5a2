//! Subscription lifecycle and tier lookup.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::info;

use crate::error::CoreResult;
use crate::model::{Subscription, SubscriptionStatus, SubscriptionTier};
use crate::store::Store;

/// Service for subscription management. Payment-provider calls (checkout,
/// portal) live outside this subsystem; only the tier lookup and lifecycle
/// transitions are handled here.
#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<Store>,
}

impl SubscriptionService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Create a subscription with a 30-day billing period starting now.
    pub async fn create_subscription(
        &self,
        company_id: i64,
        tier: SubscriptionTier,
    ) -> CoreResult<Subscription> {
        let period_start = Utc::now();
        let period_end = period_start + Duration::days(30);
        let subscription = self
            .store
            .insert_subscription(company_id, tier, period_start, period_end)
            .await?;
        info!(
            subscription_id = subscription.id,
            company_id,
            %tier,
            "created subscription"
        );
        Ok(subscription)
    }

    pub async fn get_by_company(&self, company_id: i64) -> Option<Subscription> {
        self.store.subscription_for_company(company_id).await
    }

    /// Billing tier of a tenant; tenants without a subscription are FREE.
    pub async fn tier_for_company(&self, company_id: i64) -> SubscriptionTier {
        self.store
            .subscription_for_company(company_id)
            .await
            .map(|s| s.tier)
            .unwrap_or(SubscriptionTier::Free)
    }

    pub async fn update_status(
        &self,
        company_id: i64,
        status: SubscriptionStatus,
    ) -> CoreResult<Subscription> {
        let updated = self
            .store
            .update_subscription(company_id, None, Some(status))
            .await?;
        info!(company_id, ?status, "updated subscription status");
        Ok(updated)
    }

    pub async fn update_tier(
        &self,
        company_id: i64,
        tier: SubscriptionTier,
    ) -> CoreResult<Subscription> {
        let updated = self
            .store
            .update_subscription(company_id, Some(tier), None)
            .await?;
        info!(company_id, %tier, "updated subscription tier");
        Ok(updated)
    }
}
