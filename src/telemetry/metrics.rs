//! Metric instrument factories for sheit-rs.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without an OTLP endpoint the global provider is a no-op, so recording
//! is always safe.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for sheit-rs instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("sheit-rs")
}

/// Counter: poll cycles.
/// Labels: `result` ("updated" | "unchanged" | "no_data").
pub fn poll_cycles() -> Counter<u64> {
    meter()
        .u64_counter("sheit.poll.cycles")
        .with_description("Number of poll cycles run")
        .build()
}

/// Counter: log rows written.
/// Labels: `status`, `action` ("created" | "updated").
pub fn log_transitions() -> Counter<u64> {
    meter()
        .u64_counter("sheit.log.transitions")
        .with_description("Number of log rows created or updated")
        .build()
}

/// Counter: failures surfaced on the `error` channel.
/// Labels: `kind`.
pub fn errors() -> Counter<u64> {
    meter()
        .u64_counter("sheit.errors")
        .with_description("Number of failures reported to subscribers")
        .build()
}

/// Histogram: worksheet fetch duration in milliseconds.
/// Labels: `sheet`.
pub fn fetch_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("sheit.fetch.duration_ms")
        .with_description("Worksheet fetch duration in milliseconds")
        .with_unit("ms")
        .build()
}

pub fn record_error(kind: &'static str) {
    errors().add(1, &[KeyValue::new("kind", kind)]);
}
