use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;

use crate::enrich::Enricher;
use crate::env::ResolvedConfig;

/// Build the OpenTelemetry [`Resource`]: service identity plus the static
/// enrichment attributes (browser, OS, device class, session).
pub(crate) fn build_resource(config: &ResolvedConfig, enricher: &Enricher) -> Resource {
    let mut kvs = vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", config.service_version.clone()),
    ];
    kvs.extend(enricher.static_attributes());

    Resource::builder().with_attributes(kvs).build()
}
