use std::time::Duration;

/// Configuration options for telemetry setup.
///
/// Use [`TelemetryOptions::builder()`] to construct an instance.
/// All fields are optional; unset values fall back to environment variables,
/// then defaults.
#[derive(Debug, Clone, Default)]
pub struct TelemetryOptions {
    pub(crate) service_name: Option<String>,
    pub(crate) service_version: Option<String>,
    pub(crate) collector_url: Option<String>,
    pub(crate) api_key: Option<String>,
    pub(crate) enabled: Option<bool>,
    pub(crate) enable_web_vitals: Option<bool>,
    pub(crate) enable_query_tracking: Option<bool>,
    pub(crate) enable_http_tracing: Option<bool>,
    pub(crate) export_timeout: Option<Duration>,
}

impl TelemetryOptions {
    /// Create a new builder for `TelemetryOptions`.
    pub fn builder() -> TelemetryOptionsBuilder {
        TelemetryOptionsBuilder::default()
    }
}

/// Builder for [`TelemetryOptions`].
#[derive(Debug, Default)]
pub struct TelemetryOptionsBuilder {
    service_name: Option<String>,
    service_version: Option<String>,
    collector_url: Option<String>,
    api_key: Option<String>,
    enabled: Option<bool>,
    enable_web_vitals: Option<bool>,
    enable_query_tracking: Option<bool>,
    enable_http_tracing: Option<bool>,
    export_timeout: Option<Duration>,
}

impl TelemetryOptionsBuilder {
    /// Set the service name reported to the collector.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Set the service version reported to the collector.
    pub fn service_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = Some(version.into());
        self
    }

    /// Set the collector base URL (e.g. `"https://collector.example.com"`).
    /// Signal paths (`/v1/traces`, `/v1/metrics`) are appended per exporter.
    pub fn collector_url(mut self, url: impl Into<String>) -> Self {
        self.collector_url = Some(url.into());
        self
    }

    /// Set the API key sent as the `x-api-key` header on every export batch.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Master kill-switch. Defaults to true only in release builds.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Capture core web vitals as histogram metrics. Default: true.
    pub fn enable_web_vitals(mut self, enable: bool) -> Self {
        self.enable_web_vitals = Some(enable);
        self
    }

    /// Report data-layer query errors as spans. Default: true.
    pub fn enable_query_tracking(mut self, enable: bool) -> Self {
        self.enable_query_tracking = Some(enable);
        self
    }

    /// Trace all outbound HTTP through the gateway. Default: true.
    pub fn enable_http_tracing(mut self, enable: bool) -> Self {
        self.enable_http_tracing = Some(enable);
        self
    }

    /// Set the export timeout for OTLP requests.
    pub fn export_timeout(mut self, timeout: Duration) -> Self {
        self.export_timeout = Some(timeout);
        self
    }

    /// Build the [`TelemetryOptions`].
    pub fn build(self) -> TelemetryOptions {
        TelemetryOptions {
            service_name: self.service_name,
            service_version: self.service_version,
            collector_url: self.collector_url,
            api_key: self.api_key,
            enabled: self.enabled,
            enable_web_vitals: self.enable_web_vitals,
            enable_query_tracking: self.enable_query_tracking,
            enable_http_tracing: self.enable_http_tracing,
            export_timeout: self.export_timeout,
        }
    }
}
