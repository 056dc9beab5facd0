//! Common test utilities for reel-dl integration tests

use std::time::Duration;

use reel_dl::{Config, PathsConfig, RetryConfig};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Config rooted in `dir`, resolving through `server`, with near-instant retries
pub fn config_for(dir: &TempDir, server: &MockServer) -> Config {
    let retry = RetryConfig {
        max_attempts: 1,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
    };

    let mut config = Config {
        paths: PathsConfig::rooted_at(dir.path()),
        ..Default::default()
    };
    config.resolver.endpoint = format!("{}/resolve", server.uri());
    config.fetch.retry = retry.clone();
    config.download.retry = retry;
    config
}

/// Resolver document with one entry per `(type, media path, mime)` on `server`
pub fn document(server: &MockServer, items: &[(&str, &str, &str)]) -> Value {
    let details: Vec<Value> = items
        .iter()
        .map(|(kind, media_path, mime)| {
            json!({
                "type": kind,
                "url": format!("{}{}", server.uri(), media_path),
                "mime_type": mime,
                "width": 1080,
            })
        })
        .collect();
    json!({
        "results_number": details.len(),
        "media_details": details,
    })
}

/// Answer `GET /resolve?url=<post>` with `response`, expecting `calls` requests
pub async fn mount_resolver(
    server: &MockServer,
    post: &str,
    response: ResponseTemplate,
    calls: u64,
) {
    Mock::given(method("GET"))
        .and(path("/resolve"))
        .and(query_param("url", post))
        .respond_with(response)
        .expect(calls)
        .mount(server)
        .await;
}

/// Serve `body` at `media_path`, expecting `calls` requests
pub async fn mount_media(server: &MockServer, media_path: &str, body: &[u8], calls: u64) {
    Mock::given(method("GET"))
        .and(path(media_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .expect(calls)
        .mount(server)
        .await;
}
