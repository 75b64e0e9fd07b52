//! # marmot-otel
//!
//! Drop-in OpenTelemetry instrumentation kit for interactive Rust client
//! applications.
//!
//! One function call wires up the whole pipeline: OTLP/HTTP trace and metric
//! export, traced outbound HTTP with collector loop-guarding, crash capture
//! (panics, unobserved async failures, render failures), web-vitals
//! histograms, and session/device/user enrichment on every emitted item —
//! without altering application behavior.
//!
//! ## Quick Start
//!
//! ```no_run
//! use marmot_otel::{HostEnvironment, Viewport};
//!
//! # fn main() -> anyhow::Result<()> {
//! let host = HostEnvironment {
//!     user_agent: "Mozilla/5.0 (X11; Linux x86_64) Chrome/126.0.0.0".to_owned(),
//!     viewport: Viewport::new(1280, 800),
//!     ..HostEnvironment::default()
//! };
//!
//! let _guard = marmot_otel::init(host, None)?;
//!
//! marmot_otel::track_event("app_started", &[]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configured Usage
//!
//! ```no_run
//! use marmot_otel::{HostEnvironment, TelemetryOptions};
//!
//! # fn main() -> anyhow::Result<()> {
//! let _guard = marmot_otel::init(
//!     HostEnvironment::default(),
//!     Some(
//!         TelemetryOptions::builder()
//!             .service_name("my-client")
//!             .service_version("1.4.2")
//!             .collector_url("https://collector.example.com")
//!             .api_key("secret")
//!             .build(),
//!     ),
//! )?;
//! # Ok(())
//! # }
//! ```

mod enrich;
mod env;
mod errors;
mod events;
mod gateway;
mod lifecycle;
mod options;
mod providers;
mod resource;
mod session;
mod vitals;

pub mod re_exports;

pub use enrich::{
    set_connection_type, set_route, set_user_id, set_user_role, set_viewport, Enricher,
    HostEnvironment, Viewport,
};
pub use env::{EnvSnapshot, ResolvedConfig};
pub use errors::{report_unhandled_error, report_unhandled_message, RecoveryPanel, RenderBoundary};
pub use events::track_event;
pub use gateway::{active_gateway, BoxError, HttpGateway, HttpTransport};
pub use lifecycle::TelemetryGuard;
pub use opentelemetry::KeyValue;
pub use options::{TelemetryOptions, TelemetryOptionsBuilder};
pub use vitals::{record_web_vital, VitalRating, VitalSample, WebVital};

/// Scope name under which this crate's spans and instruments are registered.
/// [`track_event`] and the failure reporters look the tracer up by this
/// identifier on every call.
pub const INSTRUMENTATION_SCOPE: &str = "marmot-otel";

/// Initialize telemetry for this process and return the lifecycle guard.
///
/// Builds the resource identity from `host` plus the resolved configuration,
/// registers trace and metric providers bound to OTLP/HTTP exporters, wraps
/// the HTTP gateway, installs crash capture, and activates the web-vitals
/// reporter. The guard **must** be held for the duration of the application;
/// dropping it flushes and shuts down both export pipelines.
///
/// # Configuration Priority
///
/// 1. **Programmatic** — values set in [`TelemetryOptions`]
/// 2. **Environment variables** — `OTEL_SERVICE_NAME`,
///    `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_API_KEY`, `OTEL_ENABLED`, etc.
/// 3. **Defaults** — production collector URL, enabled only in release
///    builds, all instrumentation on, 30s export timeout
///
/// Initializing while a pipeline is already active (or after one has shut
/// down) is a no-op that returns an inert guard; it never creates duplicate
/// providers. A disabled configuration also yields an inert guard and
/// installs nothing.
///
/// # Errors
///
/// Returns an error if an exporter or provider fails to initialize, or the
/// gateway HTTP client cannot be built.
pub fn init(
    host: HostEnvironment,
    options: Option<TelemetryOptions>,
) -> anyhow::Result<TelemetryGuard> {
    lifecycle::init(host, options)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    /// The tracer provider, panic hook, and enricher slot are process-wide;
    /// tests that touch them serialize on this lock.
    pub(crate) static GLOBAL_OTEL: Mutex<()> = Mutex::new(());
}
