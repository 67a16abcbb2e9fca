use std::time::Duration;

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramOpts, HistogramVec,
    IntCounterVec, TextEncoder,
};

const DEFAULT_BUCKETS: &[f64] = &[
    1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0, 30000.0,
    60000.0,
];

// Aggregate executions by final outcome
static EXECUTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "aggregate_executions_total",
        "The total number of aggregate executions by outcome",
        &["outcome"]
    )
    .unwrap()
});

// Per-call outcomes
static CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "aggregate_calls_total",
        "Aggregate calls by name and outcome",
        &[
            "call",    // Call name
            "outcome", // ok, fallback or error
        ]
    )
    .unwrap()
});

// Histogram for call latency
static CALL_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    let opts = HistogramOpts::new(
        "aggregate_call_latency",
        "Aggregate call latency in milliseconds, cache and fallback included",
    )
    .buckets(DEFAULT_BUCKETS.to_vec());
    register_histogram_vec!(opts, &["call"]).unwrap()
});

static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "aggregate_cache_lookups_total",
        "Cache lookups for cached aggregate calls",
        &["result"]
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Ok,
    Fallback,
    Error,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Ok => "ok",
            CallOutcome::Fallback => "fallback",
            CallOutcome::Error => "error",
        }
    }
}

pub fn record_execution(success: bool) {
    let outcome = if success { "ok" } else { "error" };
    EXECUTIONS.with_label_values(&[outcome]).inc();
}

pub fn record_call(call: &str, outcome: CallOutcome, elapsed: Duration) {
    CALLS.with_label_values(&[call, outcome.as_str()]).inc();
    CALL_LATENCY
        .with_label_values(&[call])
        .observe(elapsed.as_secs_f64() * 1000.0);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    CACHE_LOOKUPS.with_label_values(&[result]).inc();
}

/// Render every registered metric in the Prometheus text format.
pub fn render() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        log::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
