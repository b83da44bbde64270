use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Metric name prefix for all stream aggregation metrics
const PREFIX: &str = "audioloca";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref STREAM_EVENTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_stream_events_total"), "Recorded play events"),
        &["kind", "outcome"]
    ).expect("Failed to create stream_events_total metric");

    pub static ref NEARBY_QUERIES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_nearby_queries_total"), "Nearby queries by answering resolution"),
        &["kind", "resolution"]
    ).expect("Failed to create nearby_queries_total metric");

    pub static ref NEARBY_QUERY_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_nearby_query_duration_seconds"),
            "Nearby query duration in seconds"
        )
        .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["kind"]
    ).expect("Failed to create nearby_query_duration_seconds metric");

    pub static ref STORE_ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_store_errors_total"), "Failed storage operations"),
        &["operation"]
    ).expect("Failed to create store_errors_total metric");
}

pub fn init_metrics() {
    // Ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(STREAM_EVENTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(NEARBY_QUERIES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(NEARBY_QUERY_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(STORE_ERRORS_TOTAL.clone()));

    tracing::debug!("Metrics registered");
}

pub fn record_stream_event(kind: &str, outcome: &str) {
    STREAM_EVENTS_TOTAL.with_label_values(&[kind, outcome]).inc();
}

pub fn record_nearby_query(kind: &str, resolution: &str, duration: Duration) {
    NEARBY_QUERIES_TOTAL
        .with_label_values(&[kind, resolution])
        .inc();
    NEARBY_QUERY_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

pub fn record_store_error(operation: &str) {
    STORE_ERRORS_TOTAL.with_label_values(&[operation]).inc();
}

/// Prometheus text exposition of every registered metric.
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
