//! In-process durable workflow engine.
//!
//! Every workflow starts with a deterministic id that doubles as its
//! idempotency key. Starting an id that is already running either attaches
//! to the running handle (`UseExisting`) or fails; a finished id may be
//! restarted. Activities retry transient failures with exponential backoff
//! and jitter.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use cellgrid_core::error::{CoreError, CoreResult};

use crate::error::{WorkflowError, WorkflowResult};

/// Task queues, partitioned by domain. Carried for tracing parity; the
/// in-process engine runs everything on the tokio runtime.
pub mod task_queues {
    pub const DOCUMENT_ROUTING: &str = "document-routing";
    pub const AGENT_QA_WORKER: &str = "agent-qa-worker";
    pub const WORKFLOW_EXECUTION: &str = "workflow-execution";
}

/// Trace context propagated into workflow inputs as plain headers.
pub type TraceHeaders = HashMap<String, String>;

/// What to do when a workflow id is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Return the running handle; a duplicate start is not an error.
    UseExisting,
    /// Refuse the duplicate start.
    Fail,
}

type SharedOutcome = watch::Receiver<Option<Result<(), String>>>;

/// Handle to a started workflow.
#[derive(Clone, Debug)]
pub struct WorkflowHandle {
    pub workflow_id: String,
    pub task_queue: String,
    outcome: SharedOutcome,
    join: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl WorkflowHandle {
    /// Await the workflow outcome; errors come back as their recorded
    /// status message.
    pub async fn outcome(&self) -> Result<(), String> {
        let mut receiver = self.outcome.clone();
        loop {
            if let Some(outcome) = receiver.borrow().clone() {
                return outcome;
            }
            if receiver.changed().await.is_err() {
                return Err("workflow task dropped".to_string());
            }
        }
    }

    /// Whether the workflow has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_some()
    }
}

/// Registry of workflows keyed by deterministic id.
#[derive(Default)]
pub struct WorkflowEngine {
    workflows: DashMap<String, WorkflowHandle>,
}

impl WorkflowEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Start a workflow. Returns `(handle, started)`; `started` is false
    /// when `UseExisting` attached to a run already in flight. A finished
    /// id is restarted.
    pub fn start<F>(
        &self,
        workflow_id: &str,
        task_queue: &str,
        policy: ConflictPolicy,
        workflow: F,
    ) -> WorkflowResult<(WorkflowHandle, bool)>
    where
        F: Future<Output = WorkflowResult<()>> + Send + 'static,
    {
        if let Some(existing) = self.workflows.get(workflow_id) {
            if !existing.is_finished() {
                return match policy {
                    ConflictPolicy::UseExisting => {
                        info!(workflow_id, "attaching to running workflow");
                        Ok((existing.clone(), false))
                    }
                    ConflictPolicy::Fail => {
                        Err(WorkflowError::AlreadyRunning(workflow_id.to_string()))
                    }
                };
            }
        }

        let (sender, receiver) = watch::channel(None);
        let id = workflow_id.to_string();
        let join = tokio::spawn(async move {
            let outcome = workflow.await.map_err(|e| {
                warn!(workflow_id = %id, error = %e, "workflow failed");
                e.status_message()
            });
            let _ = sender.send(Some(outcome));
        });

        let handle = WorkflowHandle {
            workflow_id: workflow_id.to_string(),
            task_queue: task_queue.to_string(),
            outcome: receiver,
            join: Arc::new(Mutex::new(Some(join))),
        };
        self.workflows
            .insert(workflow_id.to_string(), handle.clone());
        info!(workflow_id, task_queue, "started workflow");
        Ok((handle, true))
    }

    pub fn get(&self, workflow_id: &str) -> Option<WorkflowHandle> {
        self.workflows.get(workflow_id).map(|h| h.clone())
    }

    /// Cancel a running workflow. The task is aborted; cleanup activities
    /// a workflow may have scheduled are best-effort by design.
    pub async fn cancel(&self, workflow_id: &str) -> bool {
        let Some(handle) = self.get(workflow_id) else {
            return false;
        };
        if handle.is_finished() {
            return false;
        }
        if let Some(join) = handle.join.lock().await.take() {
            join.abort();
            info!(workflow_id, "cancelled workflow");
            return true;
        }
        false
    }
}

/// Retry policy for activities.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries; for permanent-failure activities.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_secs_f64()
            * self.backoff_multiplier.powi(attempt as i32);
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        Duration::from_secs_f64((base * jitter).min(self.max_backoff.as_secs_f64()))
    }
}

/// Run an activity, retrying transient errors per the policy. Permanent
/// errors (quota, validation, not-found) fail immediately.
pub async fn retry_activity<T, F, Fut>(
    policy: &RetryPolicy,
    activity: &str,
    mut run: F,
) -> WorkflowResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CoreResult<T>>,
{
    let mut attempt = 0;
    loop {
        match run().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < policy.max_attempts => {
                let backoff = policy.backoff_for(attempt);
                warn!(activity, attempt, error = %e, ?backoff, "activity failed, retrying");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) if e.is_transient() => {
                return Err(WorkflowError::RetriesExhausted {
                    activity: activity.to_string(),
                    source: e,
                });
            }
            Err(e) => return Err(WorkflowError::Core(e)),
        }
    }
}

/// Poll a condition with exponential backoff and jitter until it yields a
/// value or the ceiling elapses.
pub async fn poll_until<T, F, Fut>(
    ceiling: Duration,
    initial_delay: Duration,
    mut poll: F,
) -> CoreResult<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CoreResult<Option<T>>>,
{
    let deadline = tokio::time::Instant::now() + ceiling;
    let mut delay = initial_delay;
    loop {
        if let Some(value) = poll().await? {
            return Ok(Some(value));
        }
        if tokio::time::Instant::now() + delay > deadline {
            return Ok(None);
        }
        let jitter = rand::thread_rng().gen_range(0.8..1.2);
        tokio::time::sleep(delay.mul_f64(jitter)).await;
        delay = (delay * 2).min(Duration::from_secs(15));
    }
}

/// Shorthand used by activities that wrap provider errors.
pub fn transient(message: impl Into<String>) -> CoreError {
    CoreError::Storage(message.into())
}
