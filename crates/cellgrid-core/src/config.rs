//! Engine configuration.
//!
//! Layered: built-in defaults, then an optional file, then environment
//! variables prefixed `CELLGRID_` (e.g. `CELLGRID_WORKER__QA_PREFETCH=32`).

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::model::{SubscriptionTier, UsageEventType};

/// Top-level configuration for the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CellgridConfig {
    pub lock: LockConfig,
    pub quota: QuotaConfig,
    pub worker: WorkerConfig,
    pub extraction: ExtractionConfig,
    pub search: SearchConfig,
}

impl CellgridConfig {
    /// Load configuration from defaults, `path` (when given), and the
    /// environment.
    pub fn load(path: Option<&str>) -> CoreResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        builder
            .add_source(Environment::with_prefix("CELLGRID").separator("__"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CoreError::validation(format!("configuration: {e}")))
    }
}

/// Distributed lock timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// General-purpose lock TTL in seconds.
    pub default_ttl_secs: u64,
    /// TTL for per-cell QA locks; must cover the slowest QA run.
    pub qa_cell_ttl_secs: u64,
    /// Polling interval for `acquire_with_retry` in milliseconds.
    pub retry_interval_ms: u64,
    /// Acquisition deadline for `acquire_with_retry` in seconds.
    pub acquire_timeout_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 30,
            qa_cell_ttl_secs: 300,
            retry_interval_ms: 50,
            acquire_timeout_secs: 5,
        }
    }
}

/// Monthly limits for one subscription tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierLimits {
    pub agentic_chunking_per_month: i64,
    pub agentic_qa_per_month: i64,
    pub workflows_per_month: i64,
    pub cell_operations_per_month: i64,
}

impl Default for TierLimits {
    fn default() -> Self {
        Self {
            agentic_chunking_per_month: 3,
            agentic_qa_per_month: 25,
            workflows_per_month: 10,
            cell_operations_per_month: 1_000,
        }
    }
}

impl TierLimits {
    pub fn limit_for(&self, event_type: UsageEventType) -> i64 {
        match event_type {
            UsageEventType::AgenticChunking => self.agentic_chunking_per_month,
            UsageEventType::AgenticQa => self.agentic_qa_per_month,
            UsageEventType::Workflow => self.workflows_per_month,
            UsageEventType::CellOperation => self.cell_operations_per_month,
            // Storage is metered by bytes, not a monthly count.
            UsageEventType::StorageUpload => i64::MAX,
        }
    }
}

/// Per-tier quota table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub free: TierLimits,
    pub pro: TierLimits,
    pub enterprise: TierLimits,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free: TierLimits::default(),
            pro: TierLimits {
                agentic_chunking_per_month: 100,
                agentic_qa_per_month: 1_000,
                workflows_per_month: 200,
                cell_operations_per_month: 50_000,
            },
            enterprise: TierLimits {
                agentic_chunking_per_month: 2_000,
                agentic_qa_per_month: 20_000,
                workflows_per_month: 5_000,
                cell_operations_per_month: 1_000_000,
            },
        }
    }
}

impl QuotaConfig {
    pub fn tier(&self, tier: SubscriptionTier) -> &TierLimits {
        match tier {
            SubscriptionTier::Free => &self.free,
            SubscriptionTier::Pro => &self.pro,
            SubscriptionTier::Enterprise => &self.enterprise,
        }
    }
}

/// Worker consumption settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum messages a QA worker processes concurrently.
    pub qa_prefetch: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { qa_prefetch: 10 }
    }
}

/// Extraction polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Total polling ceiling for async extraction, in seconds.
    pub poll_ceiling_secs: u64,
    /// Initial polling delay in milliseconds; backoff doubles from here.
    pub poll_initial_delay_ms: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            poll_ceiling_secs: 120,
            poll_initial_delay_ms: 500,
        }
    }
}

/// Hybrid search tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Reciprocal rank fusion constant.
    pub rrf_k: u32,
    /// Over-fetch multiplier for candidate lists before fusion.
    pub candidate_multiplier: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60,
            candidate_multiplier: 3,
        }
    }
}
