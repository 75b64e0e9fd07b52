use std::collections::HashMap;

use crate::env::ResolvedConfig;

pub(crate) mod meter;
pub(crate) mod tracer;

/// Headers attached to every export request. The API key travels as
/// `x-api-key` when configured.
fn export_headers(config: &ResolvedConfig) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    if let Some(key) = &config.api_key {
        headers.insert("x-api-key".to_owned(), key.clone());
    }
    headers
}
