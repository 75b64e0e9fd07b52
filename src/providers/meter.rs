use std::time::Duration;

use anyhow::Context;
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::Resource;

use crate::env::ResolvedConfig;

const EXPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Build and globally register a [`SdkMeterProvider`] with an OTLP/HTTP
/// exporter targeting `{collector_url}/v1/metrics`, read every 60 seconds.
///
/// # Errors
///
/// Returns an error if the OTLP exporter or provider fails to initialize.
pub(crate) fn build_meter_provider(
    resource: Resource,
    config: &ResolvedConfig,
) -> anyhow::Result<SdkMeterProvider> {
    let endpoint = format!("{}/v1/metrics", config.collector_url);

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .with_headers(super::export_headers(config))
        .with_timeout(config.export_timeout)
        .build()
        .context("Failed to build OTLP metric exporter")?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(EXPORT_INTERVAL)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build();

    opentelemetry::global::set_meter_provider(provider.clone());

    Ok(provider)
}
