//! Tracing and OpenTelemetry setup for the `sheit` binary.
//!
//! Diagnostics always go to stderr (stdout is reserved for the event
//! stream). With an OTLP endpoint, poll and reconcile spans are exported
//! as traces and the counters in [`metrics`] are pushed periodically,
//! tagged with the workbook being tracked.

pub mod metrics;
pub mod sync;

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;

use crate::config::RuntimeSettings;
use crate::error::{Error, Result};

const TRACER_NAME: &str = "sheit-rs";

/// Configuration for telemetry initialization.
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint (e.g. "http://localhost:4317"). `None` keeps
    /// everything local.
    pub endpoint: Option<String>,
    pub service_name: String,
    /// Filter used when `RUST_LOG` is not set (e.g. "info", "sheit_rs=debug").
    pub log_level: String,
    /// Workbook id attached to every exported signal.
    pub sheet_id: Option<String>,
}

impl TelemetryConfig {
    /// Telemetry for a tracker watching `sheet_id`, driven by `OTEL_ENDPOINT`
    /// and `LOG_LEVEL`.
    pub fn for_sheet(settings: &RuntimeSettings, sheet_id: &str) -> Self {
        Self {
            endpoint: settings.otel_endpoint.clone(),
            service_name: "sheit".to_string(),
            log_level: settings.log_level.clone(),
            sheet_id: Some(sheet_id.to_string()),
        }
    }

    fn resource(&self) -> Resource {
        let mut attributes = vec![KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
            env!("CARGO_PKG_VERSION"),
        )];
        if let Some(sheet_id) = &self.sheet_id {
            attributes.push(KeyValue::new("sheit.sheet_id", sheet_id.clone()));
        }
        Resource::builder()
            .with_service_name(self.service_name.clone())
            .with_attributes(attributes)
            .build()
    }
}

/// OTLP exporters, present only when an endpoint is configured.
struct Exporters {
    tracer: SdkTracerProvider,
    meter: SdkMeterProvider,
}

impl Exporters {
    fn connect(endpoint: &str, resource: Resource) -> Result<Self> {
        use opentelemetry_otlp::WithExportConfig as _;

        let spans = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| Error::Other(format!("OTLP span exporter for {endpoint}: {e}")))?;
        let metrics = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| Error::Other(format!("OTLP metric exporter for {endpoint}: {e}")))?;

        Ok(Self {
            tracer: SdkTracerProvider::builder()
                .with_batch_exporter(spans)
                .with_resource(resource.clone())
                .build(),
            meter: SdkMeterProvider::builder()
                .with_periodic_exporter(metrics)
                .with_resource(resource)
                .build(),
        })
    }
}

/// Flushes and shuts down exporters on drop. Hold it for the process lifetime.
pub struct TelemetryGuard {
    exporters: Option<Exporters>,
}

impl TelemetryGuard {
    /// Whether signals are being exported over OTLP.
    pub fn is_exporting(&self) -> bool {
        self.exporters.is_some()
    }

    pub fn force_flush(&self) {
        if let Some(exporters) = &self.exporters {
            let _ = exporters.tracer.force_flush();
            let _ = exporters.meter.force_flush();
        }
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(exporters) = self.exporters.take() {
            let _ = exporters.meter.shutdown();
            let _ = exporters.tracer.shutdown();
        }
    }
}

/// Install the global subscriber and, with an endpoint, the OTLP exporters.
///
/// # Errors
///
/// Fails if the log filter does not parse, an exporter cannot be built, or
/// a global subscriber is already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard> {
    use opentelemetry::trace::TracerProvider as _;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .map_err(|e| Error::Config(format!("log level {:?}: {e}", config.log_level)))?,
    };

    let exporters = match config.endpoint.as_deref() {
        Some(endpoint) => Some(Exporters::connect(endpoint, config.resource())?),
        None => None,
    };

    let trace_layer = exporters.as_ref().map(|exporters| {
        tracing_opentelemetry::layer().with_tracer(exporters.tracer.tracer(TRACER_NAME))
    });
    if let Some(exporters) = &exporters {
        opentelemetry::global::set_meter_provider(exporters.meter.clone());
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(trace_layer)
        .try_init()
        .map_err(|e| Error::Other(format!("failed to init tracing subscriber: {e}")))?;

    Ok(TelemetryGuard { exporters })
}
