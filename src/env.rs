use std::collections::HashMap;
use std::time::Duration;

use crate::options::TelemetryOptions;

const DEFAULT_COLLECTOR_URL: &str = "https://otel.devfellowship.com";
const DEFAULT_SERVICE_NAME: &str = "unknown";
const DEFAULT_SERVICE_VERSION: &str = "0.0.0";
const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// Snapshot of the process environment, taken once at initialization.
///
/// Configuration resolution is a pure function over this snapshot; no other
/// component reads ambient environment state.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment.
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build a snapshot from explicit key/value pairs.
    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Fully resolved configuration after merging programmatic options,
/// environment values, and defaults.
///
/// Priority (highest to lowest):
/// 1. Programmatic — values set in [`TelemetryOptions`]
/// 2. Environment variables — `OTEL_SERVICE_NAME`, `OTEL_EXPORTER_OTLP_ENDPOINT`, etc.
/// 3. Defaults — production collector URL, 30s timeout, all instrumentation on
///
/// Immutable once resolved; re-renders of the host UI never re-resolve.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub service_name: String,
    pub service_version: String,
    /// Collector base URL, normalized without a trailing slash. Also the
    /// prefix the gateway uses to keep export traffic out of the span
    /// pipeline.
    pub collector_url: String,
    pub api_key: Option<String>,
    pub enabled: bool,
    pub enable_web_vitals: bool,
    pub enable_query_tracking: bool,
    pub enable_http_tracing: bool,
    pub export_timeout: Duration,
}

/// Resolve configuration by merging programmatic options, env values, and
/// defaults.
pub(crate) fn resolve_config(opts: &TelemetryOptions, env: &EnvSnapshot) -> ResolvedConfig {
    let service_name = opts
        .service_name
        .clone()
        .or_else(|| env.get("OTEL_SERVICE_NAME").map(str::to_owned))
        .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_owned());

    let service_version = opts
        .service_version
        .clone()
        .or_else(|| env.get("OTEL_SERVICE_VERSION").map(str::to_owned))
        .unwrap_or_else(|| DEFAULT_SERVICE_VERSION.to_owned());

    let collector_url = opts
        .collector_url
        .clone()
        .or_else(|| env.get("OTEL_EXPORTER_OTLP_ENDPOINT").map(str::to_owned))
        .unwrap_or_else(|| DEFAULT_COLLECTOR_URL.to_owned())
        .trim_end_matches('/')
        .to_owned();

    let api_key = opts
        .api_key
        .clone()
        .or_else(|| env.get("OTEL_API_KEY").map(str::to_owned));

    // On by default only in release builds; debug sessions opt in explicitly.
    let enabled = opts
        .enabled
        .or_else(|| env.get("OTEL_ENABLED").and_then(parse_bool))
        .unwrap_or(!cfg!(debug_assertions));

    let export_timeout = opts
        .export_timeout
        .or_else(|| {
            env.get("OTEL_EXPORTER_OTLP_TIMEOUT")
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
        })
        .unwrap_or(DEFAULT_EXPORT_TIMEOUT);

    ResolvedConfig {
        service_name,
        service_version,
        collector_url,
        api_key,
        enabled,
        enable_web_vitals: opts.enable_web_vitals.unwrap_or(true),
        enable_query_tracking: opts.enable_query_tracking.unwrap_or(true),
        enable_http_tracing: opts.enable_http_tracing.unwrap_or(true),
        export_timeout,
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_defaults_with_no_options_or_env() {
        let opts = TelemetryOptions::default();
        let resolved = resolve_config(&opts, &EnvSnapshot::default());

        assert_eq!(resolved.service_name, "unknown");
        assert_eq!(resolved.service_version, "0.0.0");
        assert_eq!(resolved.collector_url, "https://otel.devfellowship.com");
        assert_eq!(resolved.api_key, None);
        assert_eq!(resolved.enabled, !cfg!(debug_assertions));
        assert!(resolved.enable_web_vitals);
        assert!(resolved.enable_query_tracking);
        assert!(resolved.enable_http_tracing);
        assert_eq!(resolved.export_timeout, Duration::from_secs(30));
    }

    #[test]
    fn programmatic_options_take_precedence_over_env() {
        let env = EnvSnapshot::from_pairs([
            ("OTEL_SERVICE_NAME", "env-service"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://env:4318"),
            ("OTEL_API_KEY", "env-key"),
            ("OTEL_ENABLED", "false"),
        ]);
        let opts = TelemetryOptions::builder()
            .service_name("programmatic")
            .collector_url("http://programmatic:4318")
            .api_key("programmatic-key")
            .enabled(true)
            .export_timeout(Duration::from_secs(5))
            .build();

        let resolved = resolve_config(&opts, &env);

        assert_eq!(resolved.service_name, "programmatic");
        assert_eq!(resolved.collector_url, "http://programmatic:4318");
        assert_eq!(resolved.api_key.as_deref(), Some("programmatic-key"));
        assert!(resolved.enabled);
        assert_eq!(resolved.export_timeout, Duration::from_secs(5));
    }

    #[test]
    fn env_values_take_precedence_over_defaults() {
        let env = EnvSnapshot::from_pairs([
            ("OTEL_SERVICE_NAME", "env-service"),
            ("OTEL_SERVICE_VERSION", "9.9.9"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://env:4318"),
            ("OTEL_ENABLED", "true"),
            ("OTEL_EXPORTER_OTLP_TIMEOUT", "1500"),
        ]);

        let resolved = resolve_config(&TelemetryOptions::default(), &env);

        assert_eq!(resolved.service_name, "env-service");
        assert_eq!(resolved.service_version, "9.9.9");
        assert_eq!(resolved.collector_url, "http://env:4318");
        assert!(resolved.enabled);
        assert_eq!(resolved.export_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn empty_env_values_fall_through_to_defaults() {
        let env = EnvSnapshot::from_pairs([("OTEL_SERVICE_NAME", "")]);
        let resolved = resolve_config(&TelemetryOptions::default(), &env);
        assert_eq!(resolved.service_name, "unknown");
    }

    #[test]
    fn collector_url_is_normalized_without_trailing_slash() {
        let opts = TelemetryOptions::builder()
            .collector_url("http://collector.example/")
            .build();
        let resolved = resolve_config(&opts, &EnvSnapshot::default());
        assert_eq!(resolved.collector_url, "http://collector.example");
    }

    #[test]
    fn unparseable_enabled_env_value_falls_through() {
        let env = EnvSnapshot::from_pairs([("OTEL_ENABLED", "yes")]);
        let resolved = resolve_config(&TelemetryOptions::default(), &env);
        assert_eq!(resolved.enabled, !cfg!(debug_assertions));
    }
}
