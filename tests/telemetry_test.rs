//! Integration tests for telemetry initialization and span helpers.

use sheit_rs::config::RuntimeSettings;
use sheit_rs::model::{Identity, Status};
use sheit_rs::telemetry::{TelemetryConfig, init_telemetry, metrics, sync};

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be set once per process, so this may
    // return Err if another test got there first; that is acceptable.
    let settings = RuntimeSettings {
        otel_endpoint: None,
        log_level: "debug".to_string(),
    };
    let config = TelemetryConfig::for_sheet(&settings, "1abc");
    assert_eq!(config.sheet_id.as_deref(), Some("1abc"));
    assert_eq!(config.service_name, "sheit");

    if let Ok(guard) = init_telemetry(config) {
        assert!(!guard.is_exporting());
        guard.force_flush();
    }
}

#[test]
fn malformed_log_level_is_a_config_error() {
    // Only meaningful when RUST_LOG does not override the level.
    if std::env::var("RUST_LOG").is_ok() {
        return;
    }
    let err = init_telemetry(TelemetryConfig {
        endpoint: None,
        service_name: "sheit-test".to_string(),
        log_level: "sheit_rs=[".to_string(),
        sheet_id: None,
    })
    .err()
    .expect("filter should not parse");
    assert!(matches!(err, sheit_rs::Error::Config(_)));
}

#[test]
fn poll_span_records_result() {
    let span = sync::start_poll_span(3);
    sync::record_outcome(&span, "poll.result", "unchanged");
}

#[test]
fn reconcile_span_records_result() {
    let span = sync::start_reconcile_span(Status::Completed, &Identity::new("a@x.com", "Fix bug"));
    sync::record_outcome(&span, "reconcile.result", "updated");
}

#[test]
fn metrics_record_without_a_provider() {
    metrics::record_error("fetch");
    metrics::poll_cycles().add(1, &[opentelemetry::KeyValue::new("result", "no_data")]);
}
