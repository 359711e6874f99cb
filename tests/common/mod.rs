//! Common test utilities for imagen-dispatch integration tests

#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use imagen_dispatch::config::{ApiConfig, Config, Credential, PollConfig};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PIPELINE_ID: &str = "kandinsky-3-1-pipeline";

/// Smallest byte prefix recognized as a PNG
pub const PNG_BYTES: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Config pointing `count` numbered credentials (`key-n`/`secret-n`) at `server`
pub fn config_for(server: &MockServer, count: u32) -> Config {
    Config {
        credentials: (1..=count)
            .map(|n| Credential::new(n, format!("key-{n}"), format!("secret-{n}")))
            .collect(),
        api: ApiConfig {
            base_url: server.uri(),
            ..Default::default()
        },
        polling: PollConfig {
            max_attempts: 5,
            delay: Duration::from_millis(10),
        },
        ..Default::default()
    }
}

/// Reject pipeline listing for every API key in `rejected`, serve it to everyone else
pub async fn mount_pipeline_listing(server: &MockServer, rejected: &[&str]) {
    for key in rejected {
        Mock::given(method("GET"))
            .and(path("/key/api/v1/pipelines"))
            .and(header("x-key", format!("Key {key}").as_str()))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/key/api/v1/pipelines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": PIPELINE_ID, "name": "Kandinsky 3.1", "status": "ACTIVE", "type": "TEXT2IMAGE", "version": 3.1}
        ])))
        .mount(server)
        .await;
}

/// Accept every submission with job id `job_id`
pub async fn mount_run_accepting(server: &MockServer, job_id: &str) {
    Mock::given(method("POST"))
        .and(path("/key/api/v1/pipeline/run"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"uuid": job_id, "status": "INITIAL"})),
        )
        .mount(server)
        .await;
}

/// Answer one PROCESSING, then `done_body` for every further status request
pub async fn mount_status(server: &MockServer, done_body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/key/api/v1/pipeline/status/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "PROCESSING"})))
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/key/api/v1/pipeline/status/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(done_body))
        .mount(server)
        .await;
}

/// DONE body carrying one PNG payload
pub fn done_with_png() -> serde_json::Value {
    json!({
        "status": "DONE",
        "result": {"files": [STANDARD.encode(PNG_BYTES)], "censored": false}
    })
}

/// Install a test subscriber honoring `RUST_LOG`; repeated calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
