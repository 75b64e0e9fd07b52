use anyhow::Context;
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;

use crate::env::ResolvedConfig;

/// Build and globally register a [`SdkTracerProvider`] with an OTLP/HTTP
/// exporter targeting `{collector_url}/v1/traces`.
///
/// # Errors
///
/// Returns an error if the OTLP exporter or provider fails to initialize.
pub(crate) fn build_tracer_provider(
    resource: Resource,
    config: &ResolvedConfig,
) -> anyhow::Result<SdkTracerProvider> {
    let endpoint = format!("{}/v1/traces", config.collector_url);

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .with_headers(super::export_headers(config))
        .with_timeout(config.export_timeout)
        .build()
        .context("Failed to build OTLP span exporter")?;

    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build();

    // Register globally so every emitter can look the tracer up by scope name
    opentelemetry::global::set_tracer_provider(provider.clone());

    Ok(provider)
}
