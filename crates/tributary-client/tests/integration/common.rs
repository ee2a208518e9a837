//! Shared test helpers for instance API integration tests
//!
//! Provides wiremock-based mock server setup. Each helper mounts the
//! necessary endpoints and returns an `HttpInstance` pointing at the mock
//! server.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tributary_client::{HttpInstance, InstanceClient};

/// Starts a mock server answering the version endpoint and returns a
/// (MockServer, HttpInstance) tuple.
pub async fn setup_instance_mock() -> (MockServer, HttpInstance) {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/settings/version"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"productVersion": "10.5.0"})),
        )
        .mount(&server)
        .await;

    let client = InstanceClient::with_base_url(server.uri(), "test-access-token")
        .expect("mock server uri is a valid base");

    (server, HttpInstance::new(client))
}

/// Mounts a JSON response for `verb path`.
pub async fn mount_json(server: &MockServer, verb: &str, route: &str, status: u16, body: serde_json::Value) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}
