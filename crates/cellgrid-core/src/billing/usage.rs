//! Usage event tracking over the append-only ledger.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use crate::error::CoreResult;
use crate::model::{NewUsageEvent, UsageEvent, UsageEventType};
use crate::store::Store;

/// Service for usage event tracking. Every write appends; refunds are new
/// rows with negative quantity so sum-based quota checks stay correct while
/// the audit trail of reservation + refund is preserved.
#[derive(Clone)]
pub struct UsageService {
    store: Arc<Store>,
}

impl UsageService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Track cell operations (create or update); `quantity` is the number
    /// of cells affected.
    pub async fn track_cell_operation(
        &self,
        company_id: i64,
        quantity: i64,
        matrix_id: Option<i64>,
        user_id: Option<i64>,
    ) -> UsageEvent {
        let event = self
            .store
            .append_usage_event(NewUsageEvent {
                company_id,
                user_id,
                event_type: UsageEventType::CellOperation,
                quantity,
                file_size_bytes: None,
                event_metadata: json!({ "matrix_id": matrix_id }),
            })
            .await;
        info!(event_id = event.id, company_id, quantity, "tracked cell operations");
        event
    }

    /// Track cells switched to agentic QA for a question.
    pub async fn track_agentic_qa(
        &self,
        company_id: i64,
        quantity: i64,
        question_id: Option<i64>,
        user_id: Option<i64>,
    ) -> UsageEvent {
        let event = self
            .store
            .append_usage_event(NewUsageEvent {
                company_id,
                user_id,
                event_type: UsageEventType::AgenticQa,
                quantity,
                file_size_bytes: None,
                event_metadata: json!({ "question_id": question_id }),
            })
            .await;
        info!(event_id = event.id, company_id, quantity, "tracked agentic QA");
        event
    }

    /// Track one workflow execution.
    pub async fn track_workflow(
        &self,
        company_id: i64,
        workflow_id: Option<i64>,
        user_id: Option<i64>,
    ) -> UsageEvent {
        let event = self
            .store
            .append_usage_event(NewUsageEvent {
                company_id,
                user_id,
                event_type: UsageEventType::Workflow,
                quantity: 1,
                file_size_bytes: None,
                event_metadata: json!({ "workflow_id": workflow_id }),
            })
            .await;
        info!(event_id = event.id, company_id, "tracked workflow");
        event
    }

    /// Track one agentic chunking run. `document_id` is absent when the
    /// event is a quota reservation made before chunking starts.
    pub async fn track_agentic_chunking(
        &self,
        company_id: i64,
        document_id: Option<i64>,
        chunk_count: Option<i64>,
        user_id: Option<i64>,
    ) -> UsageEvent {
        let event = self
            .store
            .append_usage_event(NewUsageEvent {
                company_id,
                user_id,
                event_type: UsageEventType::AgenticChunking,
                quantity: 1,
                file_size_bytes: None,
                event_metadata: json!({
                    "document_id": document_id,
                    "chunk_count": chunk_count,
                }),
            })
            .await;
        info!(event_id = event.id, company_id, "tracked agentic chunking");
        event
    }

    /// Enrich a reservation event with the outcome of the chunking run.
    /// Quantities are never touched; only metadata keys are merged.
    pub async fn update_agentic_chunking_metadata(
        &self,
        usage_event_id: i64,
        document_id: i64,
        chunk_count: i64,
    ) -> CoreResult<()> {
        self.store
            .merge_usage_event_metadata(
                usage_event_id,
                json!({
                    "document_id": document_id,
                    "chunk_count": chunk_count,
                }),
            )
            .await
    }

    /// Track a storage upload; quota enforcement reads `file_size_bytes`.
    pub async fn track_storage_upload(
        &self,
        company_id: i64,
        file_size_bytes: i64,
        document_id: Option<i64>,
        filename: Option<&str>,
        user_id: Option<i64>,
    ) -> UsageEvent {
        let event = self
            .store
            .append_usage_event(NewUsageEvent {
                company_id,
                user_id,
                event_type: UsageEventType::StorageUpload,
                quantity: 1,
                file_size_bytes: Some(file_size_bytes),
                event_metadata: json!({
                    "document_id": document_id,
                    "filename": filename,
                }),
            })
            .await;
        info!(event_id = event.id, company_id, file_size_bytes, "tracked storage upload");
        event
    }

    /// Refund an agentic chunking credit with a `-1` quantity event linked
    /// to the original reservation.
    pub async fn refund_agentic_chunking(
        &self,
        company_id: i64,
        document_id: i64,
        original_event_id: i64,
    ) -> UsageEvent {
        let event = self
            .store
            .append_usage_event(NewUsageEvent {
                company_id,
                user_id: None,
                event_type: UsageEventType::AgenticChunking,
                quantity: -1,
                file_size_bytes: None,
                event_metadata: json!({
                    "document_id": document_id,
                    "refund_for_event_id": original_event_id,
                    "reason": "chunking_failed",
                }),
            })
            .await;
        info!(
            event_id = event.id,
            original_event_id, company_id, "created refund event"
        );
        event
    }

    /// Signed monthly total for a counter, evaluated at `at` (UTC month).
    pub async fn monthly_total(
        &self,
        company_id: i64,
        event_type: UsageEventType,
        at: DateTime<Utc>,
    ) -> i64 {
        self.store
            .usage_sum_for_month(company_id, event_type, at)
            .await
    }

    pub async fn company_usage(
        &self,
        company_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        event_type: Option<UsageEventType>,
    ) -> Vec<UsageEvent> {
        self.store
            .usage_events_for_range(company_id, start, end, event_type)
            .await
    }
}
