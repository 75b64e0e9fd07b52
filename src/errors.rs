//! Failure capture: three independent sources, one contract.
//!
//! Uncaught panics, asynchronous failures no caller observed, and render
//! failures recovered by a [`RenderBoundary`] each produce exactly one failed
//! span, enriched with the current dynamic attributes. A thread-local
//! handshake keeps the panic hook from double-reporting a panic the boundary
//! already owns.

use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::sync::Arc;

use opentelemetry::global;
use opentelemetry::trace::{Span, Status, Tracer};
use opentelemetry::KeyValue;

use crate::enrich;
use crate::INSTRUMENTATION_SCOPE;

thread_local! {
    /// Set while a [`RenderBoundary`] closure runs on this thread.
    static BOUNDARY_ACTIVE: Cell<bool> = const { Cell::new(false) };
    /// Panic site stashed by the hook for the boundary to pick up.
    static BOUNDARY_PANIC: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
}

struct PanicSite {
    message: String,
    backtrace: String,
}

/// The single path every capture source funnels through: one failed span per
/// occurrence, enriched with the current dynamic attributes.
fn emit_failure_span(
    name: &'static str,
    attributes: Vec<KeyValue>,
    message: &str,
    exception: Option<&dyn std::error::Error>,
) {
    let tracer = global::tracer(INSTRUMENTATION_SCOPE);

    let mut attrs = enrich::active_dynamic_attributes();
    attrs.extend(attributes);

    let mut span = tracer.span_builder(name).with_attributes(attrs).start(&tracer);
    span.set_status(Status::error(message.to_owned()));
    if let Some(error) = exception {
        span.record_error(error);
    }
    span.end();
}

fn panic_message(payload: &dyn std::any::Any) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_owned()
    }
}

// ---- Source 1: uncaught panics ----

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static>;

/// Restores the pre-install panic hook when released. Owned by the
/// lifecycle; released first during teardown.
pub(crate) struct PanicCaptureGuard {
    previous: Option<Arc<PanicHook>>,
}

/// Replace the process panic hook with one that reports each uncaught panic
/// as a failed span before delegating to the previous hook.
pub(crate) fn install_panic_capture() -> PanicCaptureGuard {
    let previous: Arc<PanicHook> = Arc::new(panic::take_hook());
    let delegate = Arc::clone(&previous);

    panic::set_hook(Box::new(move |info| {
        if BOUNDARY_ACTIVE.with(Cell::get) {
            // The boundary owns this panic; hand it the site details and
            // stay silent so only one span is emitted.
            BOUNDARY_PANIC.with(|slot| {
                *slot.borrow_mut() = Some(PanicSite {
                    message: panic_message(info.payload()),
                    backtrace: Backtrace::force_capture().to_string(),
                });
            });
            return;
        }
        report_panic(info);
        (*delegate)(info);
    }));

    PanicCaptureGuard {
        previous: Some(previous),
    }
}

fn report_panic(info: &PanicHookInfo<'_>) {
    let message = panic_message(info.payload());
    let mut attrs = vec![KeyValue::new("error.message", message.clone())];
    if let Some(location) = info.location() {
        attrs.push(KeyValue::new("error.source", location.file().to_owned()));
        attrs.push(KeyValue::new("error.lineno", i64::from(location.line())));
        attrs.push(KeyValue::new("error.colno", i64::from(location.column())));
    }
    emit_failure_span("uncaught-panic", attrs, &message, None);
}

impl PanicCaptureGuard {
    /// Put the pre-install hook back. Idempotent.
    pub(crate) fn release(&mut self) {
        if let Some(previous) = self.previous.take() {
            let _ = panic::take_hook();
            panic::set_hook(Box::new(move |info| (*previous)(info)));
        }
    }
}

impl Drop for PanicCaptureGuard {
    fn drop(&mut self) {
        self.release();
    }
}

// ---- Source 2: asynchronous failures no caller observed ----

/// Report an asynchronous failure that no caller observed as one failed
/// span, with the failure attached as an exception.
///
/// The fixed `error.type` marker is what collector dashboards key on for
/// unhandled rejections.
pub fn report_unhandled_error(error: &(dyn std::error::Error + 'static)) {
    let message = error.to_string();
    emit_failure_span(
        "unhandled-rejection",
        rejection_attributes(&message),
        &message,
        Some(error),
    );
}

/// Same as [`report_unhandled_error`] for failures that only surface as
/// text.
pub fn report_unhandled_message(reason: impl Into<String>) {
    let message = reason.into();
    emit_failure_span(
        "unhandled-rejection",
        rejection_attributes(&message),
        &message,
        None,
    );
}

fn rejection_attributes(message: &str) -> Vec<KeyValue> {
    vec![
        KeyValue::new("error.message", message.to_owned()),
        KeyValue::new("error.type", "unhandled_promise_rejection"),
    ]
}

// ---- Source 3: render failures ----

/// Built-in fallback view: a short apology plus a reload action for the
/// shell to wire to a full page reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPanel {
    pub heading: String,
    pub detail: String,
    pub offer_reload: bool,
}

impl Default for RecoveryPanel {
    fn default() -> Self {
        Self {
            heading: "Something went wrong".to_owned(),
            detail: "An unexpected error occurred. Please try reloading the page.".to_owned(),
            offer_reload: true,
        }
    }
}

/// Catches render-phase panics of a UI subtree, reports each one as a failed
/// span, and renders a fallback instead of letting the failure take down the
/// rest of the page.
///
/// Only panics raised inside the render closure are caught; async and
/// network failures surface through [`report_unhandled_error`] instead.
pub struct RenderBoundary<V> {
    fallback: Box<dyn Fn() -> V + Send + Sync>,
}

impl<V> RenderBoundary<V> {
    /// Boundary with a caller-supplied fallback view.
    pub fn with_fallback(fallback: impl Fn() -> V + Send + Sync + 'static) -> Self {
        Self {
            fallback: Box::new(fallback),
        }
    }

    /// Render the subtree, trading a panic for the fallback view.
    ///
    /// `component` names the failing subtree in the reported span.
    pub fn render(&self, component: &str, render: impl FnOnce() -> V) -> V {
        let was_active = BOUNDARY_ACTIVE.with(|flag| flag.replace(true));
        let outcome = panic::catch_unwind(AssertUnwindSafe(render));
        BOUNDARY_ACTIVE.with(|flag| flag.set(was_active));

        match outcome {
            Ok(view) => view,
            Err(payload) => {
                let site = BOUNDARY_PANIC.with(|slot| slot.borrow_mut().take());
                let (message, stack) = match site {
                    Some(site) => (site.message, site.backtrace),
                    None => (panic_message(payload.as_ref()), String::new()),
                };
                let attrs = vec![
                    KeyValue::new("error.message", message.clone()),
                    KeyValue::new("error.stack", stack),
                    KeyValue::new("error.component_stack", component.to_owned()),
                ];
                emit_failure_span("render-boundary", attrs, &message, None);
                (self.fallback)()
            }
        }
    }
}

impl RenderBoundary<RecoveryPanel> {
    /// Boundary with the built-in recovery panel fallback.
    pub fn new() -> Self {
        Self::with_fallback(RecoveryPanel::default)
    }
}

impl Default for RenderBoundary<RecoveryPanel> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use opentelemetry::Value;
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};

    use super::*;
    use crate::test_support::GLOBAL_OTEL;

    #[derive(Debug)]
    struct SyncFailed;

    impl fmt::Display for SyncFailed {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "sync worker gave up")
        }
    }

    impl std::error::Error for SyncFailed {}

    /// Route the global tracer into an in-memory exporter for the duration
    /// of a test. Callers must hold [`GLOBAL_OTEL`].
    fn capture_spans() -> InMemorySpanExporter {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        global::set_tracer_provider(provider);
        exporter
    }

    fn attr(span: &SpanData, key: &str) -> Option<Value> {
        span.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.clone())
    }

    #[test]
    fn boundary_passes_the_rendered_view_through_without_a_panic() {
        let _lock = GLOBAL_OTEL.lock().unwrap_or_else(|e| e.into_inner());
        let exporter = capture_spans();

        let boundary = RenderBoundary::with_fallback(|| -1);
        assert_eq!(boundary.render("demo/widget", || 7), 7);
        assert!(exporter.get_finished_spans().unwrap().is_empty());
    }

    #[test]
    fn boundary_reports_one_span_and_renders_the_fallback() {
        let _lock = GLOBAL_OTEL.lock().unwrap_or_else(|e| e.into_inner());
        let exporter = capture_spans();
        let mut capture = install_panic_capture();

        let boundary = RenderBoundary::new();
        let view = boundary.render("dashboard/chart", || panic!("chart exploded"));
        assert_eq!(view, RecoveryPanel::default());

        let spans = exporter.get_finished_spans().unwrap();
        // Exactly one: the panic hook stays silent for a boundary-owned panic.
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.name, "render-boundary");
        assert!(matches!(span.status, Status::Error { .. }));
        assert_eq!(
            attr(span, "error.message"),
            Some(Value::from("chart exploded"))
        );
        assert_eq!(
            attr(span, "error.component_stack"),
            Some(Value::from("dashboard/chart"))
        );
        assert!(attr(span, "error.stack").is_some());

        capture.release();
    }

    #[test]
    fn boundary_works_without_the_panic_hook_installed() {
        let _lock = GLOBAL_OTEL.lock().unwrap_or_else(|e| e.into_inner());
        let exporter = capture_spans();

        let boundary = RenderBoundary::with_fallback(|| "fallback");
        let view = boundary.render("demo/widget", || panic!("widget exploded"));
        assert_eq!(view, "fallback");

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(
            attr(&spans[0], "error.message"),
            Some(Value::from("widget exploded"))
        );
    }

    #[test]
    fn uncaught_panic_is_reported_with_its_source_location() {
        let _lock = GLOBAL_OTEL.lock().unwrap_or_else(|e| e.into_inner());
        let exporter = capture_spans();
        let mut capture = install_panic_capture();

        // Outside any boundary, the hook itself reports. catch_unwind keeps
        // the panic from failing the test.
        let _ = panic::catch_unwind(|| panic!("background job died"));

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.name, "uncaught-panic");
        assert_eq!(
            attr(span, "error.message"),
            Some(Value::from("background job died"))
        );
        assert!(attr(span, "error.source").is_some());
        assert!(attr(span, "error.lineno").is_some());
        assert!(attr(span, "error.colno").is_some());

        capture.release();

        // Released hook no longer reports.
        exporter.reset();
        let _ = panic::catch_unwind(|| panic!("after release"));
        assert!(exporter.get_finished_spans().unwrap().is_empty());

        // A second release stays a no-op.
        capture.release();
    }

    #[test]
    fn unhandled_error_carries_the_fixed_rejection_marker() {
        let _lock = GLOBAL_OTEL.lock().unwrap_or_else(|e| e.into_inner());
        let exporter = capture_spans();

        report_unhandled_error(&SyncFailed);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.name, "unhandled-rejection");
        assert_eq!(
            attr(span, "error.type"),
            Some(Value::from("unhandled_promise_rejection"))
        );
        assert_eq!(
            attr(span, "error.message"),
            Some(Value::from("sync worker gave up"))
        );
        assert_eq!(span.status, Status::error("sync worker gave up".to_owned()));
        // The error itself rides along as an exception event.
        assert!(format!("{:?}", span.events).contains("exception"));
    }

    #[test]
    fn unhandled_message_uses_the_string_form() {
        let _lock = GLOBAL_OTEL.lock().unwrap_or_else(|e| e.into_inner());
        let exporter = capture_spans();

        report_unhandled_message("timeout waiting for sync");

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(
            attr(&spans[0], "error.message"),
            Some(Value::from("timeout waiting for sync"))
        );
        assert!(!format!("{:?}", spans[0].events).contains("exception"));
    }
}
