#[cfg(feature = "metrics")]
use once_cell::sync::Lazy;
#[cfg(feature = "metrics")]
use opentelemetry::{
    global,
    metrics::{Counter, Histogram},
};

#[cfg(feature = "metrics")]
pub static METRICS: Lazy<TidepoolMetrics> = Lazy::new(TidepoolMetrics::init);

/// Statement and locking instruments, registered on the global meter
/// provider. Exporting them is left to the application.
#[cfg(feature = "metrics")]
pub struct TidepoolMetrics {
    pub queries_total: Counter<u64>,
    pub query_duration: Histogram<f64>,
    pub query_errors: Counter<u64>,
    pub stale_records: Counter<u64>,
}

#[cfg(feature = "metrics")]
impl TidepoolMetrics {
    pub fn init() -> Self {
        let meter = global::meter("tidepool");

        let queries_total = meter.u64_counter("tidepool_queries_total")
            .with_description("Total statements executed").build();

        let query_duration = meter.f64_histogram("tidepool_query_duration_seconds")
            .with_description("Duration of statements").build();

        let query_errors = meter.u64_counter("tidepool_query_errors_total")
            .with_description("Statements rejected by the executor").build();

        let stale_records = meter.u64_counter("tidepool_stale_records_total")
            .with_description("Writes rejected by optimistic locking").build();

        Self {
            queries_total,
            query_duration,
            query_errors,
            stale_records,
        }
    }

    pub fn record_query(&self, elapsed: std::time::Duration) {
        self.queries_total.add(1, &[]);
        self.query_duration.record(elapsed.as_secs_f64(), &[]);
    }

    pub fn record_query_error(&self) {
        self.query_errors.add(1, &[]);
    }

    pub fn record_stale(&self) {
        self.stale_records.add(1, &[]);
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::Span;

    /// Span around one statement.
    pub fn query_span(backend: &str, sql: &str) -> Span {
        tracing::debug_span!("tidepool.query", db.system = backend, db.statement = sql)
    }

    /// Span around one relation of one eager-load level.
    pub fn eager_span(table: &str, relation: &str) -> Span {
        tracing::debug_span!("tidepool.eager_load", table = table, relation = relation)
    }
}

#[cfg(all(test, feature = "metrics"))]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter() {
        METRICS.record_query(std::time::Duration::from_millis(3));
        METRICS.record_query_error();
        METRICS.record_stale();
    }
}
