//! Prometheus metrics for the engine.

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
};

/// Counters and histograms shared across services. Exposing the registry
/// over HTTP is the embedding application's concern.
#[derive(Clone)]
pub struct EngineMetrics {
    pub cells_created_total: IntCounter,
    pub qa_jobs_processed_total: IntCounterVec,
    pub lock_contention_total: IntCounter,
    pub quota_rejections_total: IntCounterVec,
    pub hybrid_search_seconds: Histogram,
}

impl EngineMetrics {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let cells_created_total = IntCounter::with_opts(Opts::new(
            "cellgrid_cells_created_total",
            "Matrix cells created by batch processing",
        ))?;
        let qa_jobs_processed_total = IntCounterVec::new(
            Opts::new(
                "cellgrid_qa_jobs_processed_total",
                "QA jobs processed, labelled by terminal status",
            ),
            &["status"],
        )?;
        let lock_contention_total = IntCounter::with_opts(Opts::new(
            "cellgrid_lock_contention_total",
            "QA lock acquisitions lost to another worker",
        ))?;
        let quota_rejections_total = IntCounterVec::new(
            Opts::new(
                "cellgrid_quota_rejections_total",
                "Quota reservations rejected, labelled by counter",
            ),
            &["counter"],
        )?;
        let hybrid_search_seconds = Histogram::with_opts(HistogramOpts::new(
            "cellgrid_hybrid_search_seconds",
            "Hybrid chunk search latency",
        ))?;

        registry.register(Box::new(cells_created_total.clone()))?;
        registry.register(Box::new(qa_jobs_processed_total.clone()))?;
        registry.register(Box::new(lock_contention_total.clone()))?;
        registry.register(Box::new(quota_rejections_total.clone()))?;
        registry.register(Box::new(hybrid_search_seconds.clone()))?;

        Ok(Self {
            cells_created_total,
            qa_jobs_processed_total,
            lock_contention_total,
            quota_rejections_total,
            hybrid_search_seconds,
        })
    }

    /// Metrics bound to a private registry, for embedders that do not wire
    /// one up.
    pub fn unregistered() -> Self {
        Self::new(&Registry::new()).expect("metric names are valid")
    }
}
