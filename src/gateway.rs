//! The application's outbound HTTP entry point and its tracing wrapper.
//!
//! Instead of patching a process-global function, instrumentation is an
//! explicit transport swap inside [`HttpGateway`]: `wrap` stores the original
//! transport and puts a span-creating wrapper in front of it, `unwrap`
//! restores it. At most one wrapper is active at a time, and requests bound
//! for the collector bypass span creation so export traffic never feeds back
//! into the pipeline.

use std::sync::{Arc, Mutex, OnceLock};

use anyhow::Context;
use futures::future::BoxFuture;
use opentelemetry::global::BoxedTracer;
use opentelemetry::trace::{Span, SpanKind, Status, Tracer};
use opentelemetry::KeyValue;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Method, Request, Response, Url};

use crate::enrich::Enricher;

/// Error type surfaced by [`HttpGateway::execute`]. The instrumented call's
/// own failure is returned unchanged, never wrapped.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One hop of the outbound HTTP path. Implemented by the plain client
/// transport and by the tracing wrapper installed over it.
pub trait HttpTransport: Send + Sync {
    fn execute(&self, request: Request) -> BoxFuture<'static, Result<Response, BoxError>>;
}

struct ClientTransport {
    client: reqwest::Client,
}

impl HttpTransport for ClientTransport {
    fn execute(&self, request: Request) -> BoxFuture<'static, Result<Response, BoxError>> {
        let client = self.client.clone();
        Box::pin(async move { client.execute(request).await.map_err(BoxError::from) })
    }
}

struct TracedTransport {
    inner: Arc<dyn HttpTransport>,
    tracer: BoxedTracer,
    enricher: Enricher,
    collector_url: String,
}

impl HttpTransport for TracedTransport {
    fn execute(&self, request: Request) -> BoxFuture<'static, Result<Response, BoxError>> {
        let url = request.url().to_string();

        // Export traffic goes straight through: spanning it would feed the
        // exporter's own requests back into the span pipeline.
        if url.starts_with(&self.collector_url) {
            return self.inner.execute(request);
        }

        let method = request.method().as_str().to_uppercase();
        let mut attrs = vec![
            KeyValue::new("http.method", method.clone()),
            KeyValue::new("http.url", url),
        ];
        attrs.extend(self.enricher.dynamic_attributes());

        let mut span = self
            .tracer
            .span_builder(format!("HTTP {method}"))
            .with_kind(SpanKind::Client)
            .with_attributes(attrs)
            .start(&self.tracer);

        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            match inner.execute(request).await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    span.set_attribute(KeyValue::new("http.status_code", i64::from(status)));
                    let content_length = response
                        .headers()
                        .get(CONTENT_LENGTH)
                        .and_then(|value| value.to_str().ok())
                        .and_then(|value| value.parse::<i64>().ok());
                    if let Some(length) = content_length {
                        span.set_attribute(KeyValue::new("http.response_content_length", length));
                    }
                    if status >= 400 {
                        span.set_status(Status::error(format!("HTTP {status}")));
                    }
                    span.end();
                    Ok(response)
                }
                Err(error) => {
                    span.set_status(Status::error(error.to_string()));
                    span.record_error(error.as_ref());
                    span.end();
                    Err(error)
                }
            }
        })
    }
}

struct GatewayState {
    transport: Arc<dyn HttpTransport>,
    /// The pre-wrap transport while instrumentation is installed. Doubles as
    /// the "already wrapped" guard.
    original: Option<Arc<dyn HttpTransport>>,
}

/// The single entry point for the application's outbound HTTP.
pub struct HttpGateway {
    state: Mutex<GatewayState>,
}

impl HttpGateway {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_transport(Arc::new(ClientTransport { client }))
    }

    /// Build a gateway over a custom base transport.
    pub fn with_transport(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            state: Mutex::new(GatewayState {
                transport,
                original: None,
            }),
        }
    }

    /// Issue a prepared request through the active transport.
    pub async fn execute(&self, request: Request) -> Result<Response, BoxError> {
        let transport = {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(&state.transport)
        };
        transport.execute(request).await
    }

    /// Issue a request from separate method and url arguments.
    pub async fn send(&self, method: Method, url: Url) -> Result<Response, BoxError> {
        self.execute(Request::new(method, url)).await
    }

    /// Install the tracing transport. A second call while already wrapped is
    /// a no-op.
    pub fn wrap(&self, tracer: BoxedTracer, enricher: Enricher, collector_url: impl Into<String>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.original.is_some() {
            return;
        }
        let original = Arc::clone(&state.transport);
        state.original = Some(Arc::clone(&original));
        state.transport = Arc::new(TracedTransport {
            inner: original,
            tracer,
            enricher,
            collector_url: collector_url.into(),
        });
    }

    /// Restore the original transport. No-op when not wrapped.
    pub fn unwrap(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(original) = state.original.take() {
            state.transport = original;
        }
    }

    pub fn is_instrumented(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .original
            .is_some()
    }
}

// ---- Process-wide gateway slot ----

static ACTIVE: OnceLock<Arc<HttpGateway>> = OnceLock::new();

/// The gateway application traffic should flow through, once telemetry has
/// been initialized.
pub fn active_gateway() -> Option<Arc<HttpGateway>> {
    ACTIVE.get().cloned()
}

/// The published gateway, created on first use.
pub(crate) fn obtain_gateway() -> anyhow::Result<Arc<HttpGateway>> {
    if let Some(gateway) = ACTIVE.get() {
        return Ok(Arc::clone(gateway));
    }
    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build the gateway HTTP client")?;
    let gateway = Arc::new(HttpGateway::new(client));
    Ok(Arc::clone(ACTIVE.get_or_init(|| gateway)))
}
