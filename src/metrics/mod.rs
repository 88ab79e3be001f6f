use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Counter operations by outcome
// - Compensating rollbacks and the ones that failed (unresolved divergence)
// - Saga latency
//
// All metrics live in a per-instance registry, scraped via GET /metrics.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Saga Metrics
    pub operations: IntCounterVec,
    pub compensations: IntCounterVec,
    pub compensation_failures: IntCounterVec,
    pub saga_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let operations = IntCounterVec::new(
            Opts::new("counter_operations_total", "Counter operations by outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations.clone()))?;

        let compensations = IntCounterVec::new(
            Opts::new("counter_compensations_total", "Counter writes rolled back after a history write failure"),
            &["operation"],
        )?;
        registry.register(Box::new(compensations.clone()))?;

        let compensation_failures = IntCounterVec::new(
            Opts::new(
                "counter_compensation_failures_total",
                "Rollbacks that failed, leaving counter and history diverged",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(compensation_failures.clone()))?;

        let saga_duration = HistogramVec::new(
            HistogramOpts::new("counter_saga_duration_seconds", "Counter saga duration, excluding per-key lock wait")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(saga_duration.clone()))?;

        Ok(Self {
            registry,
            operations,
            compensations,
            compensation_failures,
            saga_duration,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of every registered metric
    pub fn render(&self) -> prometheus::Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}
