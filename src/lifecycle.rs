//! Pipeline lifecycle: builds and registers the export providers, installs
//! the instrumentation, and tears everything down in a fixed order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use opentelemetry::global;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;

use crate::enrich::{self, Enricher, HostEnvironment};
use crate::env::{self, EnvSnapshot, ResolvedConfig};
use crate::errors::{self, PanicCaptureGuard};
use crate::gateway::{self, HttpGateway};
use crate::options::TelemetryOptions;
use crate::providers;
use crate::resource;
use crate::vitals::VitalsReporter;
use crate::INSTRUMENTATION_SCOPE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LifecycleState {
    Uninitialized,
    Active,
    /// Terminal: a shut-down pipeline is never re-initialized.
    ShutDown,
}

/// Owns every piece of process-wide instrumentation state: the export
/// providers, the gateway wrapper, the panic capture hook, and the enricher.
/// At most one lifecycle is active per process.
pub(crate) struct Lifecycle {
    state: LifecycleState,
    gateway: Arc<HttpGateway>,
    enricher: Enricher,
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
    panic_capture: Option<PanicCaptureGuard>,
}

impl Lifecycle {
    pub(crate) fn new(gateway: Arc<HttpGateway>, enricher: Enricher) -> Self {
        Self {
            state: LifecycleState::Uninitialized,
            gateway,
            enricher,
            tracer_provider: None,
            meter_provider: None,
            panic_capture: None,
        }
    }

    pub(crate) fn state(&self) -> LifecycleState {
        self.state
    }

    /// Build and register the export pipelines and install instrumentation.
    ///
    /// Invoking on an already-active (or shut-down) lifecycle is a no-op:
    /// re-initialization must never create duplicate providers or stack a
    /// second gateway wrapper.
    pub(crate) fn initialize(&mut self, config: &ResolvedConfig) -> anyhow::Result<()> {
        if self.state != LifecycleState::Uninitialized {
            tracing::warn!(state = ?self.state, "telemetry already initialized; ignoring");
            return Ok(());
        }

        global::set_text_map_propagator(TraceContextPropagator::new());

        let resource = resource::build_resource(config, &self.enricher);

        let tracer_provider = providers::tracer::build_tracer_provider(resource.clone(), config)
            .context("Failed to initialize tracer provider")?;
        let meter_provider = providers::meter::build_meter_provider(resource, config)
            .context("Failed to initialize meter provider")?;

        if config.enable_http_tracing {
            self.gateway.wrap(
                global::tracer(INSTRUMENTATION_SCOPE),
                self.enricher.clone(),
                config.collector_url.clone(),
            );
        }

        self.panic_capture = Some(errors::install_panic_capture());

        if config.enable_web_vitals {
            VitalsReporter::activate();
        }

        enrich::publish(self.enricher.clone());

        self.tracer_provider = Some(tracer_provider);
        self.meter_provider = Some(meter_provider);
        self.state = LifecycleState::Active;
        Ok(())
    }

    /// Tear down in fixed order: error listeners first, then the network
    /// instrumentation, then the export pipelines — a closing provider must
    /// not be invoked by a handler still firing.
    ///
    /// Idempotent; never panics. Only transitions from Active.
    pub(crate) fn shutdown(&mut self) {
        if self.state != LifecycleState::Active {
            return;
        }
        self.state = LifecycleState::ShutDown;

        if let Some(mut capture) = self.panic_capture.take() {
            capture.release();
        }

        self.gateway.unwrap();

        // One pipeline failing to flush must not keep the other from closing.
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(e) = provider.force_flush() {
                eprintln!("marmot-otel: error flushing tracer provider: {e}");
            }
            if let Err(e) = provider.shutdown() {
                eprintln!("marmot-otel: error shutting down tracer provider: {e}");
            }
        }

        if let Some(provider) = self.meter_provider.take() {
            if let Err(e) = provider.force_flush() {
                eprintln!("marmot-otel: error flushing meter provider: {e}");
            }
            if let Err(e) = provider.shutdown() {
                eprintln!("marmot-otel: error shutting down meter provider: {e}");
            }
        }
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle to the initialized pipeline.
///
/// **Must be held for the duration of the application.** Dropping it
/// flushes and shuts down the export pipelines.
#[must_use = "dropping the TelemetryGuard immediately shuts down telemetry — \
              hold it for the lifetime of your application (e.g. `let _guard = ...;`)"]
pub struct TelemetryGuard {
    lifecycle: Option<Lifecycle>,
    config: Option<ResolvedConfig>,
}

impl TelemetryGuard {
    fn inert() -> Self {
        Self {
            lifecycle: None,
            config: None,
        }
    }

    /// Explicitly flush and shut down the pipeline.
    ///
    /// Safe to call multiple times; subsequent calls are no-ops. This is
    /// also called automatically when the guard is dropped.
    pub fn shutdown(&mut self) {
        if let Some(lifecycle) = self.lifecycle.as_mut() {
            lifecycle.shutdown();
        }
    }

    /// The resolved configuration, when this guard owns an active pipeline.
    pub fn config(&self) -> Option<&ResolvedConfig> {
        self.config.as_ref()
    }

    /// The gateway application traffic should flow through.
    pub fn http(&self) -> Option<Arc<HttpGateway>> {
        self.lifecycle
            .as_ref()
            .map(|lifecycle| Arc::clone(&lifecycle.gateway))
    }

    /// The enricher owned by this pipeline.
    pub fn enricher(&self) -> Option<Enricher> {
        self.lifecycle
            .as_ref()
            .map(|lifecycle| lifecycle.enricher.clone())
    }
}

/// Claimed by the first enabled initialization. The lifecycle state machine
/// is terminal, so a shut-down pipeline is never re-initialized either.
static CLAIMED: AtomicBool = AtomicBool::new(false);

pub(crate) fn init(
    host: HostEnvironment,
    options: Option<TelemetryOptions>,
) -> anyhow::Result<TelemetryGuard> {
    let opts = options.unwrap_or_default();
    let config = env::resolve_config(&opts, &EnvSnapshot::capture());

    if !config.enabled {
        return Ok(TelemetryGuard::inert());
    }

    if CLAIMED.swap(true, Ordering::SeqCst) {
        tracing::warn!("telemetry already initialized in this process; ignoring");
        return Ok(TelemetryGuard::inert());
    }

    let gateway = gateway::obtain_gateway()?;
    let enricher = Enricher::new(host);

    let mut lifecycle = Lifecycle::new(gateway, enricher);
    if let Err(error) = lifecycle.initialize(&config) {
        CLAIMED.store(false, Ordering::SeqCst);
        return Err(error);
    }

    Ok(TelemetryGuard {
        lifecycle: Some(lifecycle),
        config: Some(config),
    })
}
