use opentelemetry::global;
use opentelemetry::trace::{Span, Status, Tracer};
use opentelemetry::KeyValue;

use crate::enrich;
use crate::INSTRUMENTATION_SCOPE;

/// Emit an ad hoc observability event as one OK span, ended synchronously.
///
/// The tracer is looked up by the crate's fixed instrumentation scope on
/// every call, so this works from any call site once the pipeline is up —
/// no handle to thread through. Dynamic enrichment attributes (viewport,
/// user, route, connection) are merged with the caller's; `event.name`
/// always carries `name`, even when the caller supplies its own value for
/// that key.
///
/// # Examples
///
/// ```no_run
/// use marmot_otel::{track_event, KeyValue};
///
/// track_event("button_click", &[KeyValue::new("button.id", "checkout")]);
/// ```
pub fn track_event(name: &str, attributes: &[KeyValue]) {
    let tracer = global::tracer(INSTRUMENTATION_SCOPE);

    let mut attrs = enrich::active_dynamic_attributes();
    attrs.extend(
        attributes
            .iter()
            .filter(|kv| kv.key.as_str() != "event.name")
            .cloned(),
    );
    attrs.push(KeyValue::new("event.name", name.to_owned()));

    let mut span = tracer
        .span_builder(name.to_owned())
        .with_attributes(attrs)
        .start(&tracer);
    span.set_status(Status::Ok);
    span.end();
}
