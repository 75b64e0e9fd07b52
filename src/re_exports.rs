//! Curated re-exports of key OpenTelemetry and HTTP types.
//!
//! These re-exports let host shells access commonly needed types without
//! adding direct dependencies on `opentelemetry`, `opentelemetry_sdk`, or
//! `reqwest` to their own `Cargo.toml`.

/// Re-export of the `opentelemetry` API crate.
pub use opentelemetry;

/// Re-export of the `opentelemetry_sdk` crate.
pub use opentelemetry_sdk;

/// Re-export of `reqwest` for building gateway requests.
pub use reqwest;

/// Re-export of the `tracing` crate for convenient access.
pub use tracing;
