//! Document pipeline: durable extraction, quota-gated chunking, indexing.
//!
//! Extraction runs as a workflow with id `document-extraction-{document_id}`
//! and the `UseExisting` start policy, so at most one run per document is in
//! flight. Completion publishes an indexing intent; the indexing worker
//! consumes it and drives chunk-strategy selection, chunking, and index
//! writes. Only this pipeline writes `extraction_status`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, warn};

use cellgrid_core::billing::{QuotaService, UsageService};
use cellgrid_core::config::ExtractionConfig;
use cellgrid_core::error::{CoreError, CoreResult};
use cellgrid_core::model::{
    ChunkingStrategy, Document, ExtractionStatus, JobStatus, SubscriptionTier,
};
use cellgrid_core::queue::{queue_names, DocumentIndexingMessage, MessageQueue};
use cellgrid_core::storage::{extracted_markdown_key, ObjectStorage};
use cellgrid_core::store::Store;
use cellgrid_documents::chunking::DocumentChunker;
use cellgrid_documents::indexing::ChunkIndexingService;

use crate::engine::{
    poll_until, retry_activity, task_queues, ConflictPolicy, RetryPolicy, TraceHeaders,
    WorkflowEngine,
};
use crate::error::{WorkflowError, WorkflowResult};

/// Separator between extracted pages; blank pages are preserved as empty
/// segments.
pub const PAGE_SEPARATOR: &str = "\n\n---\n\n";

const EXTRACTABLE_CONTENT_TYPES: &[&str] =
    &["text/markdown", "text/plain", "application/pdf"];
const EXTRACTABLE_EXTENSIONS: &[&str] = &["md", "txt", "pdf"];

/// Result of an extraction call: pages directly, or a request to poll.
#[derive(Debug, Clone)]
pub enum ExtractionOutcome {
    Pages(Vec<String>),
    /// Provider-side async extraction; pages arrive via polling.
    Pending { request_id: String },
}

/// Extraction provider contract.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Start extraction over the raw document bytes.
    async fn extract(
        &self,
        filename: &str,
        content_type: &str,
        content: &[u8],
    ) -> CoreResult<ExtractionOutcome>;

    /// Poll an async extraction; `None` means still running.
    async fn poll(&self, request_id: &str) -> CoreResult<Option<Vec<String>>>;
}

/// Built-in extractor for text formats: pages split on form feeds. Binary
/// formats requiring a provider (PDF OCR) come in through the trait.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl DocumentExtractor for PlainTextExtractor {
    async fn extract(
        &self,
        _filename: &str,
        _content_type: &str,
        content: &[u8],
    ) -> CoreResult<ExtractionOutcome> {
        let text = String::from_utf8_lossy(content);
        let pages: Vec<String> = text.split('\u{c}').map(|p| p.trim().to_string()).collect();
        Ok(ExtractionOutcome::Pages(pages))
    }

    async fn poll(&self, request_id: &str) -> CoreResult<Option<Vec<String>>> {
        Err(CoreError::Internal(format!(
            "plain text extraction is synchronous, nothing to poll for {request_id}"
        )))
    }
}

/// Whether the pipeline can extract this document, by mime type first and
/// filename extension as the fallback.
pub fn is_extractable(document: &Document) -> bool {
    if EXTRACTABLE_CONTENT_TYPES.contains(&document.content_type.as_str()) {
        return true;
    }
    document
        .filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| EXTRACTABLE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Input to the extraction workflow, trace context included.
#[derive(Debug, Clone)]
pub struct ExtractionInput {
    pub document_id: i64,
    pub company_id: i64,
    pub extraction_job_id: i64,
    pub trace_headers: TraceHeaders,
}

/// Outcome summary of a failed-extraction retry sweep.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub total_failed: usize,
    pub retried: usize,
    pub failed: usize,
}

/// Drives document extraction workflows.
#[derive(Clone)]
pub struct DocumentPipeline {
    store: Arc<Store>,
    object_storage: Arc<dyn ObjectStorage>,
    queue: Arc<dyn MessageQueue>,
    extractor: Arc<dyn DocumentExtractor>,
    engine: Arc<WorkflowEngine>,
    extraction_config: ExtractionConfig,
    retry_policy: RetryPolicy,
}

impl DocumentPipeline {
    pub fn new(
        store: Arc<Store>,
        object_storage: Arc<dyn ObjectStorage>,
        queue: Arc<dyn MessageQueue>,
        extractor: Arc<dyn DocumentExtractor>,
        engine: Arc<WorkflowEngine>,
        extraction_config: ExtractionConfig,
    ) -> Self {
        Self {
            store,
            object_storage,
            queue,
            extractor,
            engine,
            extraction_config,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn workflow_id(document_id: i64) -> String {
        format!("document-extraction-{document_id}")
    }

    /// Idempotently ensure extraction is running for a document. Returns
    /// the workflow id; an already-completed document short-circuits.
    /// Caller trace context travels with the workflow input.
    pub async fn ensure_document_extraction(
        &self,
        document_id: i64,
        company_id: i64,
        trace_headers: TraceHeaders,
    ) -> WorkflowResult<String> {
        let document = self
            .store
            .get_document(document_id, company_id)
            .await
            .ok_or_else(|| CoreError::not_found("document", document_id))?;
        if !is_extractable(&document) {
            return Err(WorkflowError::Core(CoreError::validation(format!(
                "document {document_id} type {} is not extractable",
                document.content_type
            ))));
        }
        if document.extraction_status == ExtractionStatus::Completed {
            info!(document_id, "document already extracted");
            return Ok(Self::workflow_id(document_id));
        }

        let job = self.store.insert_extraction_job(document_id, company_id).await;
        let workflow_id = Self::workflow_id(document_id);
        self.store
            .update_extraction_job(job.id, JobStatus::Queued, Some(workflow_id.clone()), None, None)
            .await?;

        let pipeline = self.clone();
        let input = ExtractionInput {
            document_id,
            company_id,
            extraction_job_id: job.id,
            trace_headers,
        };
        let (_, started) = self.engine.start(
            &workflow_id,
            task_queues::DOCUMENT_ROUTING,
            ConflictPolicy::UseExisting,
            async move { pipeline.run_extraction(input).await },
        )?;
        info!(document_id, %workflow_id, started, "ensured extraction workflow");
        Ok(workflow_id)
    }

    /// The extraction workflow body.
    async fn run_extraction(&self, input: ExtractionInput) -> WorkflowResult<()> {
        let ExtractionInput {
            document_id,
            company_id,
            extraction_job_id: job_id,
            trace_headers,
        } = input;
        if !trace_headers.is_empty() {
            tracing::debug!(document_id, ?trace_headers, "resumed caller trace context");
        }
        let result = self.extract_inner(document_id, company_id, job_id).await;
        if let Err(e) = &result {
            let message = e.status_message();
            error!(document_id, error = %message, "extraction workflow failed");
            let _ = self
                .store
                .update_document_extraction(
                    document_id,
                    company_id,
                    ExtractionStatus::Failed,
                    None,
                    None,
                    None,
                )
                .await;
            let _ = self
                .store
                .update_extraction_job(job_id, JobStatus::Failed, None, Some(message), None)
                .await;
        }
        result
    }

    async fn extract_inner(
        &self,
        document_id: i64,
        company_id: i64,
        job_id: i64,
    ) -> WorkflowResult<()> {
        let document = self
            .store
            .get_document(document_id, company_id)
            .await
            .ok_or_else(|| CoreError::not_found("document", document_id))?;
        if !is_extractable(&document) {
            // Exit without state changes for unsupported types.
            info!(document_id, "document type not extractable, skipping");
            return Ok(());
        }

        self.store
            .update_document_extraction(
                document_id,
                company_id,
                ExtractionStatus::Processing,
                None,
                Some(Utc::now()),
                None,
            )
            .await?;
        self.store
            .update_extraction_job(job_id, JobStatus::Processing, None, None, None)
            .await?;

        let pages = retry_activity(&self.retry_policy, "extract-document", || {
            let document = document.clone();
            async move { self.extract_pages(&document).await }
        })
        .await?;

        let combined = pages.join(PAGE_SEPARATOR);
        let key = extracted_markdown_key(company_id, document_id);
        retry_activity(&self.retry_policy, "save-extracted-markdown", || {
            let key = key.clone();
            let combined = combined.clone();
            async move {
                self.object_storage
                    .upload(&key, combined.into_bytes(), None)
                    .await?;
                Ok(())
            }
        })
        .await?;

        let now = Utc::now();
        self.store
            .update_document_extraction(
                document_id,
                company_id,
                ExtractionStatus::Completed,
                Some(key),
                None,
                Some(now),
            )
            .await?;
        self.store
            .update_extraction_job(job_id, JobStatus::Completed, None, None, Some(now))
            .await?;

        // Publish the indexing intent so the downstream pipeline proceeds.
        let indexing_job = self.store.insert_indexing_job(document_id, company_id).await;
        let message = serde_json::to_value(DocumentIndexingMessage {
            job_id: indexing_job.id,
            document_id,
        })
        .map_err(CoreError::from)?;
        self.queue
            .declare_queue(queue_names::DOCUMENT_INDEXING)
            .await?;
        self.queue
            .publish(queue_names::DOCUMENT_INDEXING, message)
            .await?;
        info!(document_id, indexing_job_id = indexing_job.id, "extraction completed");
        Ok(())
    }

    async fn extract_pages(&self, document: &Document) -> CoreResult<Vec<String>> {
        let raw = self
            .object_storage
            .download(&document.storage_key)
            .await?
            .ok_or_else(|| {
                CoreError::Storage(format!("document object {} missing", document.storage_key))
            })?;
        match self
            .extractor
            .extract(&document.filename, &document.content_type, &raw)
            .await?
        {
            ExtractionOutcome::Pages(pages) => Ok(pages),
            ExtractionOutcome::Pending { request_id } => {
                let ceiling =
                    std::time::Duration::from_secs(self.extraction_config.poll_ceiling_secs);
                let initial = std::time::Duration::from_millis(
                    self.extraction_config.poll_initial_delay_ms,
                );
                poll_until(ceiling, initial, || {
                    let request_id = request_id.clone();
                    async move { self.extractor.poll(&request_id).await }
                })
                .await?
                .ok_or_else(|| {
                    CoreError::Storage(format!(
                        "async extraction {request_id} did not finish within {}s",
                        self.extraction_config.poll_ceiling_secs
                    ))
                })
            }
        }
    }

    /// Restart extraction for documents whose status is FAILED.
    pub async fn retry_failed_extractions(&self, limit: usize) -> RetryReport {
        let failed = self.store.failed_extraction_documents(limit).await;
        let mut report = RetryReport {
            total_failed: failed.len(),
            ..Default::default()
        };
        for document in failed {
            match self
                .ensure_document_extraction(document.id, document.company_id, TraceHeaders::new())
                .await
            {
                Ok(_) => report.retried += 1,
                Err(e) => {
                    error!(document_id = document.id, error = %e, "failed to retry extraction");
                    report.failed += 1;
                }
            }
        }
        info!(
            retried = report.retried,
            failed = report.failed,
            "failed-extraction retry sweep complete"
        );
        report
    }
}

/// Chunking strategy chosen for one document, with any quota reservation
/// that backs it.
#[derive(Debug, Clone)]
pub struct ChunkingDecision {
    pub strategy: ChunkingStrategy,
    pub usage_event_id: Option<i64>,
    pub tier: Option<SubscriptionTier>,
}

/// Worker for the `document_indexing` queue: chunk-strategy selection,
/// chunking, and index writes.
#[derive(Clone)]
pub struct DocumentIndexingWorker {
    store: Arc<Store>,
    object_storage: Arc<dyn ObjectStorage>,
    quota: QuotaService,
    usage: UsageService,
    chunker: DocumentChunker,
    indexing: ChunkIndexingService,
}

impl DocumentIndexingWorker {
    pub fn new(
        store: Arc<Store>,
        object_storage: Arc<dyn ObjectStorage>,
        quota: QuotaService,
        chunker: DocumentChunker,
        indexing: ChunkIndexingService,
    ) -> Self {
        Self {
            usage: UsageService::new(store.clone()),
            store,
            object_storage,
            quota,
            chunker,
            indexing,
        }
    }

    /// Decide the chunking strategy for a document. Opted-out documents get
    /// sentence chunking with no quota involvement; opted-in documents
    /// reserve one agentic credit or fail with `QuotaExceeded`.
    pub async fn chunking_strategy(
        &self,
        document_id: i64,
        company_id: i64,
    ) -> CoreResult<ChunkingDecision> {
        let document = self
            .store
            .get_document(document_id, company_id)
            .await
            .ok_or_else(|| CoreError::not_found("document", document_id))?;
        if !document.use_agentic_chunking {
            return Ok(ChunkingDecision {
                strategy: ChunkingStrategy::Sentence,
                usage_event_id: None,
                tier: None,
            });
        }

        let reservation = self
            .quota
            .reserve_agentic_chunking_if_available(company_id)
            .await;
        if !reservation.reserved {
            return Err(CoreError::QuotaExceeded(format!(
                "agentic chunking for company {company_id}: {}/{} ({})",
                reservation.current_usage, reservation.limit, reservation.tier
            )));
        }
        Ok(ChunkingDecision {
            strategy: ChunkingStrategy::Agentic,
            usage_event_id: reservation.usage_event_id,
            tier: Some(reservation.tier),
        })
    }

    /// Process one indexing message to completion.
    pub async fn process_message(
        &self,
        message: &DocumentIndexingMessage,
    ) -> WorkflowResult<()> {
        let job_id = message.job_id;
        let document_id = message.document_id;
        info!(job_id, document_id, "indexing worker received message");

        let Some(job) = self.store.get_indexing_job(job_id).await else {
            warn!(job_id, "indexing job not found, acknowledging");
            return Ok(());
        };
        let company_id = job.company_id;
        self.store
            .update_indexing_job(job_id, JobStatus::Processing, None, None)
            .await?;

        let result = self.index_inner(document_id, company_id).await;
        match &result {
            Ok(count) => {
                self.store
                    .update_indexing_job(job_id, JobStatus::Completed, None, Some(Utc::now()))
                    .await?;
                info!(document_id, chunks = count, "indexing completed");
            }
            Err(e) => {
                let message = e.status_message();
                error!(document_id, error = %message, "indexing failed");
                self.store
                    .update_indexing_job(job_id, JobStatus::Failed, Some(message), None)
                    .await?;
                let _ = self
                    .store
                    .update_document_extraction(
                        document_id,
                        company_id,
                        ExtractionStatus::Failed,
                        None,
                        None,
                        None,
                    )
                    .await;
            }
        }
        result.map(|_| ())
    }

    async fn index_inner(&self, document_id: i64, company_id: i64) -> WorkflowResult<usize> {
        let document = self
            .store
            .get_document(document_id, company_id)
            .await
            .ok_or_else(|| CoreError::not_found("document", document_id))?;
        let key = document
            .extracted_content_path
            .clone()
            .unwrap_or_else(|| extracted_markdown_key(company_id, document_id));
        let markdown = self
            .object_storage
            .download(&key)
            .await?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .ok_or_else(|| {
                CoreError::Storage(format!("extracted content {key} missing"))
            })?;

        let decision = self.chunking_strategy(document_id, company_id).await?;
        let chunks = match self
            .chunker
            .chunk(document_id, &markdown, decision.strategy)
            .await
        {
            Ok(chunks) => chunks,
            Err(e) => {
                // Chunking failed after a reservation: give the credit back.
                if let Some(event_id) = decision.usage_event_id {
                    self.usage
                        .refund_agentic_chunking(company_id, document_id, event_id)
                        .await;
                }
                return Err(e.into());
            }
        };

        if decision.strategy == ChunkingStrategy::Agentic {
            if let Some(event_id) = decision.usage_event_id {
                self.usage
                    .update_agentic_chunking_metadata(event_id, document_id, chunks.len() as i64)
                    .await?;
            }
        }

        let count = self
            .indexing
            .index_document_chunks(company_id, document_id, &chunks)
            .await?;
        Ok(count)
    }
}
