//! Shared helpers for HTTP-level tests.

#![allow(dead_code)]

use chatstream::config::ClientConfig;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

/// Config pointing at the mock server.
pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::builder()
        .base_url(server.uri())
        .build()
        .expect("valid mock server url")
}

/// Join payloads into an event-stream body (one `data:` line per frame).
pub fn sse_body(payloads: &[&str]) -> String {
    payloads
        .iter()
        .map(|p| format!("data:{p}\n\n"))
        .collect()
}

pub fn sse_response(payloads: &[&str]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(sse_body(payloads))
}

pub fn json_response(body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}
