//! HTTP Client Factory
//!
//! Builds reqwest clients with an explicit request timeout and optional proxy.
//! Shared by the reasoning provider and the search index backend.

use std::time::Duration;

/// Build a `reqwest::Client`.
///
/// - `Some(proxy_url)` -> route every request through that proxy
/// - `None` -> explicitly disable proxy (`no_proxy`), ignoring env vars
pub fn build_http_client(
    timeout: Duration,
    proxy_url: Option<&str>,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)));
    match proxy_url {
        Some(url) => {
            builder = builder.proxy(reqwest::Proxy::all(url)?);
        }
        None => {
            builder = builder.no_proxy();
        }
    }
    builder.build()
}
