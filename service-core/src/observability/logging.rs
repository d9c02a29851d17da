use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, runtime, trace as sdktrace};
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Batch OTLP span exporter tagged with `service.name`.
fn otlp_layer(service_name: &str, endpoint: &str) -> Result<BoxedLayer, anyhow::Error> {
    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
            KeyValue::new("service.name", service_name.to_string()),
        ])))
        .install_batch(runtime::Tokio)?;

    Ok(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
}

/// Installs the global subscriber: `RUST_LOG` (falling back to `log_level`),
/// JSON lines on stdout and, when an endpoint is given, OTLP export.
///
/// An unreachable collector degrades to stdout-only logging.
pub fn init_tracing(service_name: &str, log_level: &str, otlp_endpoint: Option<&str>) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let mut export_error = None;
    let telemetry = otlp_endpoint.and_then(|endpoint| match otlp_layer(service_name, endpoint) {
        Ok(layer) => Some(layer),
        Err(e) => {
            export_error = Some((endpoint.to_string(), e));
            None
        }
    });

    let json = tracing_subscriber::fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .json()
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(telemetry)
        .with(env_filter)
        .with(json)
        .init();

    if let Some((endpoint, error)) = export_error {
        tracing::warn!(%endpoint, error = %error, "OTLP exporter unavailable, logging to stdout only");
    }
}
