use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref SUBMISSIONS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_telemetry_submissions_total",
        "Total telemetry submissions received"
    ))
    .unwrap();
    pub static ref RECORDS_APPENDED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_telemetry_records_appended_total",
        "Total records durably appended to device logs"
    ))
    .unwrap();
    pub static ref INCOMPLETE_SUBMISSIONS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_telemetry_incomplete_total",
        "Total submissions skipped because of missing fields"
    ))
    .unwrap();
    pub static ref INVALID_IDENTITY_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_telemetry_invalid_identity_total",
        "Total submissions rejected for an unsafe device identity"
    ))
    .unwrap();
    pub static ref MALFORMED_SUBMISSIONS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_telemetry_malformed_total",
        "Total submissions rejected for control characters in a field"
    ))
    .unwrap();
    pub static ref STORE_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_telemetry_store_failures_total",
        "Total appends that failed to open or write a device log"
    ))
    .unwrap();
    pub static ref APPEND_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "gateway_telemetry_append_latency_seconds",
            "Time taken to append and sync one record"
        )
        .buckets(vec![
            0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0
        ])
    )
    .unwrap();
    pub static ref PROPOSALS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_config_proposals_total",
        "Total configuration proposals evaluated"
    ))
    .unwrap();
    pub static ref PROPOSALS_REJECTED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_config_proposals_rejected_total",
        "Total configuration proposals rejected"
    ))
    .unwrap();
    pub static ref CERT_FETCH_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_cert_fetch_failures_total",
        "Total failed certificate fingerprint lookups"
    ))
    .unwrap();
}

pub fn init_metrics() {
    REGISTRY
        .register(Box::new(SUBMISSIONS_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(RECORDS_APPENDED_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(INCOMPLETE_SUBMISSIONS_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(INVALID_IDENTITY_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(MALFORMED_SUBMISSIONS_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(STORE_FAILURES_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(APPEND_LATENCY_SECONDS.clone()))
        .unwrap();
    REGISTRY.register(Box::new(PROPOSALS_TOTAL.clone())).unwrap();
    REGISTRY
        .register(Box::new(PROPOSALS_REJECTED_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(CERT_FETCH_FAILURES_TOTAL.clone()))
        .unwrap();
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
