//! Quota reservations over the signed usage ledger.
//!
//! The check-and-append pair for a reservation must be serializable per
//! tenant and counter; a per-tenant async mutex provides that ordering.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::QuotaConfig;
use crate::error::{CoreError, CoreResult};
use crate::model::{QuotaReservation, SubscriptionTier, UsageEventType};
use crate::store::Store;

use super::subscription::SubscriptionService;
use super::usage::UsageService;

/// Service enforcing per-tenant monthly quotas.
#[derive(Clone)]
pub struct QuotaService {
    usage: UsageService,
    subscriptions: SubscriptionService,
    limits: QuotaConfig,
    tenant_locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl QuotaService {
    pub fn new(store: Arc<Store>, limits: QuotaConfig) -> Self {
        Self {
            usage: UsageService::new(store.clone()),
            subscriptions: SubscriptionService::new(store),
            limits,
            tenant_locks: Arc::new(DashMap::new()),
        }
    }

    fn tenant_lock(&self, company_id: i64) -> Arc<Mutex<()>> {
        self.tenant_locks
            .entry(company_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn limit_for(&self, tier: SubscriptionTier, event_type: UsageEventType) -> i64 {
        self.limits.tier(tier).limit_for(event_type)
    }

    /// Reserve one agentic chunking credit if the tenant is under its
    /// monthly limit. On success a `+1` event is appended atomically with
    /// the check; the caller refunds it if chunking later fails.
    pub async fn reserve_agentic_chunking_if_available(
        &self,
        company_id: i64,
    ) -> QuotaReservation {
        let lock = self.tenant_lock(company_id);
        let _guard = lock.lock().await;

        let tier = self.subscriptions.tier_for_company(company_id).await;
        let limit = self.limit_for(tier, UsageEventType::AgenticChunking);
        let current = self
            .usage
            .monthly_total(company_id, UsageEventType::AgenticChunking, Utc::now())
            .await;

        if current >= limit {
            warn!(company_id, current, limit, %tier, "agentic chunking quota exhausted");
            return QuotaReservation {
                reserved: false,
                usage_event_id: None,
                current_usage: current,
                limit,
                tier,
            };
        }

        let event = self
            .usage
            .track_agentic_chunking(company_id, None, None, None)
            .await;
        info!(
            company_id,
            usage_event_id = event.id,
            current_usage = current + 1,
            limit,
            "reserved agentic chunking credit"
        );
        QuotaReservation {
            reserved: true,
            usage_event_id: Some(event.id),
            current_usage: current + 1,
            limit,
            tier,
        }
    }

    /// Raise `QuotaExceeded` when the tenant is at its monthly workflow
    /// limit. Writes happen separately via `UsageService::track_workflow`.
    pub async fn check_workflow_quota(&self, company_id: i64) -> CoreResult<()> {
        let tier = self.subscriptions.tier_for_company(company_id).await;
        let limit = self.limit_for(tier, UsageEventType::Workflow);
        let current = self
            .usage
            .monthly_total(company_id, UsageEventType::Workflow, Utc::now())
            .await;
        if current >= limit {
            warn!(company_id, current, limit, %tier, "workflow quota exhausted");
            return Err(CoreError::QuotaExceeded(format!(
                "workflow runs for company {company_id}: {current}/{limit} ({tier})"
            )));
        }
        Ok(())
    }
}
