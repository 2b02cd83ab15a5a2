//! Message broker contract and in-process queue.
//!
//! Messages are JSON, UTF-8. Consumers must be idempotent: the engine's
//! correctness primitive for QA is the per-cell lock, not delivery-exactly-
//! once.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};

/// Durable queue names.
pub mod queue_names {
    pub const QA_WORKER: &str = "qa_worker";
    pub const DOCUMENT_INDEXING: &str = "document_indexing";
}

/// Message consumed by the QA worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaJobMessage {
    pub job_id: i64,
    pub matrix_cell_id: i64,
}

/// Message consumed by the indexing pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentIndexingMessage {
    pub job_id: i64,
    pub document_id: i64,
}

/// Broker contract: declare, publish, consume.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn declare_queue(&self, queue: &str) -> CoreResult<()>;

    async fn publish(&self, queue: &str, payload: serde_json::Value) -> CoreResult<()>;

    /// Publish a batch; either the whole batch is accepted or the call fails.
    async fn publish_batch(
        &self,
        queue: &str,
        payloads: Vec<serde_json::Value>,
    ) -> CoreResult<()>;

    /// Take the consumer side of a queue. A queue has one consumer; a second
    /// call returns an error.
    async fn consume(
        &self,
        queue: &str,
    ) -> CoreResult<mpsc::UnboundedReceiver<serde_json::Value>>;
}

struct QueueChannel {
    sender: mpsc::UnboundedSender<serde_json::Value>,
    receiver: Option<mpsc::UnboundedReceiver<serde_json::Value>>,
}

/// In-process broker over per-queue unbounded channels.
#[derive(Default)]
pub struct MemoryQueue {
    queues: DashMap<String, QueueChannel>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_queue(&self, queue: &str) {
        self.queues.entry(queue.to_string()).or_insert_with(|| {
            let (sender, receiver) = mpsc::unbounded_channel();
            QueueChannel {
                sender,
                receiver: Some(receiver),
            }
        });
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn declare_queue(&self, queue: &str) -> CoreResult<()> {
        self.ensure_queue(queue);
        debug!(queue, "declared queue");
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: serde_json::Value) -> CoreResult<()> {
        self.ensure_queue(queue);
        let channel = self.queues.get(queue).expect("queue just ensured");
        channel
            .sender
            .send(payload)
            .map_err(|_| CoreError::Broker(format!("queue {queue} is closed")))
    }

    async fn publish_batch(
        &self,
        queue: &str,
        payloads: Vec<serde_json::Value>,
    ) -> CoreResult<()> {
        self.ensure_queue(queue);
        let channel = self.queues.get(queue).expect("queue just ensured");
        for payload in payloads {
            channel
                .sender
                .send(payload)
                .map_err(|_| CoreError::Broker(format!("queue {queue} is closed")))?;
        }
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
    ) -> CoreResult<mpsc::UnboundedReceiver<serde_json::Value>> {
        self.ensure_queue(queue);
        let mut channel = self.queues.get_mut(queue).expect("queue just ensured");
        channel.receiver.take().ok_or_else(|| {
            warn!(queue, "queue already has a consumer");
            CoreError::Broker(format!("queue {queue} already consumed"))
        })
    }
}

/// Broker double that rejects every publish; used to exercise the
/// publish-failure downgrade paths.
#[derive(Default)]
pub struct FailingQueue;

#[async_trait]
impl MessageQueue for FailingQueue {
    async fn declare_queue(&self, _queue: &str) -> CoreResult<()> {
        Ok(())
    }

    async fn publish(&self, queue: &str, _payload: serde_json::Value) -> CoreResult<()> {
        Err(CoreError::Broker(format!("publish to {queue} refused")))
    }

    async fn publish_batch(
        &self,
        queue: &str,
        _payloads: Vec<serde_json::Value>,
    ) -> CoreResult<()> {
        Err(CoreError::Broker(format!("publish to {queue} refused")))
    }

    async fn consume(
        &self,
        queue: &str,
    ) -> CoreResult<mpsc::UnboundedReceiver<serde_json::Value>> {
        Err(CoreError::Broker(format!("queue {queue} unavailable")))
    }
}
