//! Context attributes attached to every emitted telemetry item.
//!
//! Static attributes (browser, OS, device class, session identity) are
//! gathered once while the provider resource is built. Dynamic attributes
//! (viewport, route, user, connection) are recomputed on every call so each
//! span carries the state current at emission time.

use std::sync::{Arc, OnceLock, RwLock};

use opentelemetry::KeyValue;

use crate::session::SessionStore;

/// Host-window facts the embedding shell knows at startup.
#[derive(Debug, Clone, Default)]
pub struct HostEnvironment {
    /// User-agent string of the hosting WebView or embedded browser.
    pub user_agent: String,
    /// Initial window dimensions; push later changes with [`set_viewport`].
    pub viewport: Viewport,
    /// Effective connection type when the platform exposes one (`"4g"`, ...).
    pub connection_type: Option<String>,
    pub app_name: Option<String>,
    pub app_version: Option<String>,
}

/// Viewport dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Default)]
struct DynamicState {
    viewport: Viewport,
    connection_type: Option<String>,
    user_id: Option<String>,
    user_role: Option<String>,
    route: Option<String>,
}

/// Computes static and dynamic context attributes.
///
/// Cheap to clone; all clones share one session identity and one dynamic
/// state. The lifecycle owns the authoritative instance and publishes it
/// process-wide for the module-level setters and the ad hoc emitters.
#[derive(Clone)]
pub struct Enricher {
    inner: Arc<Inner>,
}

struct Inner {
    user_agent: String,
    app_name: Option<String>,
    app_version: Option<String>,
    session: SessionStore,
    dynamic: RwLock<DynamicState>,
}

impl Enricher {
    pub fn new(host: HostEnvironment) -> Self {
        Self {
            inner: Arc::new(Inner {
                user_agent: host.user_agent,
                app_name: host.app_name,
                app_version: host.app_version,
                session: SessionStore::default(),
                dynamic: RwLock::new(DynamicState {
                    viewport: host.viewport,
                    connection_type: host.connection_type,
                    ..DynamicState::default()
                }),
            }),
        }
    }

    /// Attributes that are stable for the lifetime of the process.
    /// Collected once while the provider resource is built.
    pub fn static_attributes(&self) -> Vec<KeyValue> {
        let (browser_name, browser_version) = detect_browser(&self.inner.user_agent);
        let width = self.read_dynamic(|state| state.viewport).width;

        let mut attrs = vec![
            KeyValue::new("browser.name", browser_name),
            KeyValue::new("browser.version", browser_version),
            KeyValue::new("os.type", detect_os(&self.inner.user_agent)),
            KeyValue::new("device.type", device_class(width)),
            KeyValue::new("session.id", self.session_id()),
        ];
        if let Some(name) = &self.inner.app_name {
            attrs.push(KeyValue::new("app.name", name.clone()));
        }
        if let Some(version) = &self.inner.app_version {
            attrs.push(KeyValue::new("app.version", version.clone()));
        }
        attrs
    }

    /// Attributes that may change between telemetry items (viewport, route,
    /// user, connection). Recomputed on every call.
    pub fn dynamic_attributes(&self) -> Vec<KeyValue> {
        self.read_dynamic(|state| {
            let mut attrs = vec![
                KeyValue::new("viewport.width", i64::from(state.viewport.width)),
                KeyValue::new("viewport.height", i64::from(state.viewport.height)),
            ];
            if let Some(id) = non_empty(&state.user_id) {
                attrs.push(KeyValue::new("user.id", id.to_owned()));
            }
            if let Some(role) = non_empty(&state.user_role) {
                attrs.push(KeyValue::new("user.role", role.to_owned()));
            }
            if let Some(connection) = non_empty(&state.connection_type) {
                attrs.push(KeyValue::new("connection.effectiveType", connection.to_owned()));
            }
            if let Some(route) = &state.route {
                attrs.push(KeyValue::new("page.route", route.clone()));
            }
            attrs
        })
    }

    /// Session identity, lazily generated on first read.
    pub fn session_id(&self) -> String {
        self.inner.session.id()
    }

    /// Record the authenticated user's id. Unconditional overwrite.
    pub fn set_user_id(&self, id: impl Into<String>) {
        self.write_dynamic(|state| state.user_id = Some(id.into()));
    }

    /// Record the authenticated user's role. Unconditional overwrite.
    pub fn set_user_role(&self, role: impl Into<String>) {
        self.write_dynamic(|state| state.user_role = Some(role.into()));
    }

    /// Publish the current route for dynamic enrichment to consume.
    pub fn set_route(&self, route: impl Into<String>) {
        self.write_dynamic(|state| state.route = Some(route.into()));
    }

    /// Push the current window dimensions.
    pub fn set_viewport(&self, viewport: Viewport) {
        self.write_dynamic(|state| state.viewport = viewport);
    }

    /// Push the effective connection type, or `None` when unknown.
    pub fn set_connection_type(&self, connection: Option<String>) {
        self.write_dynamic(|state| state.connection_type = connection);
    }

    fn read_dynamic<T>(&self, read: impl FnOnce(&DynamicState) -> T) -> T {
        read(&self.inner.dynamic.read().unwrap_or_else(|e| e.into_inner()))
    }

    fn write_dynamic(&self, write: impl FnOnce(&mut DynamicState)) {
        write(&mut self.inner.dynamic.write().unwrap_or_else(|e| e.into_inner()));
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Browser family and version from ordered substring matches. Engine strings
/// overlap, so the order is load-bearing: Edge carries a `Chrome/` token and
/// Chrome carries a `Safari/` token.
fn detect_browser(user_agent: &str) -> (String, String) {
    if user_agent.contains("Firefox/") {
        return ("Firefox".to_owned(), token_version(user_agent, "Firefox/"));
    }
    if user_agent.contains("Edg/") {
        return ("Edge".to_owned(), token_version(user_agent, "Edg/"));
    }
    if user_agent.contains("Chrome/") && !user_agent.contains("Edg/") {
        return ("Chrome".to_owned(), token_version(user_agent, "Chrome/"));
    }
    if user_agent.contains("Safari/") && !user_agent.contains("Chrome/") {
        return ("Safari".to_owned(), token_version(user_agent, "Version/"));
    }
    ("unknown".to_owned(), "unknown".to_owned())
}

/// Version digits directly after `token`, or `"unknown"` when absent.
fn token_version(user_agent: &str, token: &str) -> String {
    user_agent
        .find(token)
        .map(|at| {
            user_agent[at + token.len()..]
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect::<String>()
        })
        .filter(|version| !version.is_empty())
        .unwrap_or_else(|| "unknown".to_owned())
}

fn detect_os(user_agent: &str) -> &'static str {
    if user_agent.contains("Win") {
        return "Windows";
    }
    if user_agent.contains("Mac") {
        return "macOS";
    }
    if user_agent.contains("Linux") {
        return "Linux";
    }
    if user_agent.contains("Android") {
        return "Android";
    }
    if ["iPhone", "iPad", "iPod"]
        .iter()
        .any(|token| user_agent.contains(token))
    {
        return "iOS";
    }
    "unknown"
}

fn device_class(width: u32) -> &'static str {
    if width < 768 {
        "mobile"
    } else if width < 1024 {
        "tablet"
    } else {
        "desktop"
    }
}

// ---- Process-wide enricher slot ----

static ACTIVE: OnceLock<Enricher> = OnceLock::new();

/// Publish the lifecycle's enricher for the module-level setters and the
/// ad hoc emitters. First publication wins.
pub(crate) fn publish(enricher: Enricher) {
    let _ = ACTIVE.set(enricher);
}

pub(crate) fn active() -> Option<&'static Enricher> {
    ACTIVE.get()
}

/// Dynamic enrichment attributes from the process-wide enricher, or empty
/// when telemetry has not been initialized.
pub(crate) fn active_dynamic_attributes() -> Vec<KeyValue> {
    active().map(Enricher::dynamic_attributes).unwrap_or_default()
}

/// Record the authenticated user's id on the process-wide enricher.
pub fn set_user_id(id: impl Into<String>) {
    if let Some(enricher) = active() {
        enricher.set_user_id(id);
    }
}

/// Record the authenticated user's role on the process-wide enricher.
pub fn set_user_role(role: impl Into<String>) {
    if let Some(enricher) = active() {
        enricher.set_user_role(role);
    }
}

/// Publish the current route string; the routing layer calls this on every
/// navigation.
pub fn set_route(route: impl Into<String>) {
    if let Some(enricher) = active() {
        enricher.set_route(route);
    }
}

/// Push the current window dimensions; the shell calls this on resize.
pub fn set_viewport(viewport: Viewport) {
    if let Some(enricher) = active() {
        enricher.set_viewport(viewport);
    }
}

/// Push the effective connection type when the platform reports a change.
pub fn set_connection_type(connection: Option<String>) {
    if let Some(enricher) = active() {
        enricher.set_connection_type(connection);
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::Value;

    use super::*;

    const CHROME_LINUX: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                                (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";
    const EDGE_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36 Edg/126.0.2592.87";
    const FIREFOX_LINUX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:127.0) Gecko/20100101 Firefox/127.0";
    const SAFARI_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 \
                              (KHTML, like Gecko) Version/17.5 Safari/605.1.15";

    fn enricher_with(user_agent: &str, width: u32) -> Enricher {
        Enricher::new(HostEnvironment {
            user_agent: user_agent.to_owned(),
            viewport: Viewport::new(width, 720),
            ..HostEnvironment::default()
        })
    }

    fn attr(attrs: &[KeyValue], key: &str) -> Option<Value> {
        attrs
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.clone())
    }

    #[test]
    fn edge_wins_over_chrome_when_both_tokens_present() {
        let (name, version) = detect_browser(EDGE_WINDOWS);
        assert_eq!(name, "Edge");
        assert_eq!(version, "126.0.2592.87");
    }

    #[test]
    fn chrome_detected_without_edge_token() {
        let (name, version) = detect_browser(CHROME_LINUX);
        assert_eq!(name, "Chrome");
        assert_eq!(version, "126.0.0.0");
    }

    #[test]
    fn firefox_detected_first() {
        let (name, version) = detect_browser(FIREFOX_LINUX);
        assert_eq!(name, "Firefox");
        assert_eq!(version, "127.0");
    }

    #[test]
    fn safari_version_comes_from_the_version_token() {
        let (name, version) = detect_browser(SAFARI_MAC);
        assert_eq!(name, "Safari");
        assert_eq!(version, "17.5");
    }

    #[test]
    fn unrecognized_user_agent_is_unknown_unknown() {
        let (name, version) = detect_browser("curl/8.5.0");
        assert_eq!(name, "unknown");
        assert_eq!(version, "unknown");
    }

    #[test]
    fn os_detection_orders_substring_matches() {
        assert_eq!(detect_os(EDGE_WINDOWS), "Windows");
        assert_eq!(detect_os(SAFARI_MAC), "macOS");
        assert_eq!(detect_os(CHROME_LINUX), "Linux");
        assert_eq!(detect_os("curl/8.5.0"), "unknown");
    }

    #[test]
    fn device_class_thresholds() {
        assert_eq!(device_class(500), "mobile");
        assert_eq!(device_class(900), "tablet");
        assert_eq!(device_class(1400), "desktop");
    }

    #[test]
    fn static_attributes_carry_session_and_device() {
        let enricher = enricher_with(CHROME_LINUX, 500);
        let attrs = enricher.static_attributes();

        assert_eq!(attr(&attrs, "browser.name"), Some(Value::from("Chrome")));
        assert_eq!(attr(&attrs, "device.type"), Some(Value::from("mobile")));
        assert!(attr(&attrs, "session.id").is_some());
        // App identity omitted when the host does not supply one.
        assert!(attr(&attrs, "app.name").is_none());
    }

    #[test]
    fn session_id_is_stable_within_one_enricher() {
        let enricher = enricher_with(CHROME_LINUX, 1400);
        let first = attr(&enricher.static_attributes(), "session.id");
        let second = attr(&enricher.static_attributes(), "session.id");
        assert_eq!(first, second);

        // A fresh enricher models a fresh tab.
        let other = enricher_with(CHROME_LINUX, 1400);
        assert_ne!(first, attr(&other.static_attributes(), "session.id"));
    }

    #[test]
    fn user_identity_overwrites_and_never_appears_empty() {
        let enricher = enricher_with(CHROME_LINUX, 1400);
        assert_eq!(attr(&enricher.dynamic_attributes(), "user.id"), None);

        enricher.set_user_id("u1");
        assert_eq!(
            attr(&enricher.dynamic_attributes(), "user.id"),
            Some(Value::from("u1"))
        );

        enricher.set_user_id("u2");
        assert_eq!(
            attr(&enricher.dynamic_attributes(), "user.id"),
            Some(Value::from("u2"))
        );

        enricher.set_user_id("");
        assert_eq!(attr(&enricher.dynamic_attributes(), "user.id"), None);
    }

    #[test]
    fn dynamic_attributes_track_viewport_route_and_connection() {
        let enricher = enricher_with(CHROME_LINUX, 1400);
        enricher.set_route("/dashboard");
        enricher.set_connection_type(Some("4g".to_owned()));

        let attrs = enricher.dynamic_attributes();
        assert_eq!(attr(&attrs, "viewport.width"), Some(Value::I64(1400)));
        assert_eq!(attr(&attrs, "page.route"), Some(Value::from("/dashboard")));
        assert_eq!(
            attr(&attrs, "connection.effectiveType"),
            Some(Value::from("4g"))
        );

        enricher.set_viewport(Viewport::new(600, 900));
        enricher.set_connection_type(None);
        let attrs = enricher.dynamic_attributes();
        assert_eq!(attr(&attrs, "viewport.width"), Some(Value::I64(600)));
        assert_eq!(attr(&attrs, "connection.effectiveType"), None);
    }
}
