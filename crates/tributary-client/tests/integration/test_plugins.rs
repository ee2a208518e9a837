//! Integration tests for plugin bundle transfer

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use tributary_core::domain::ComponentKind;
use tributary_core::ports::IInstanceAccessor;

use crate::common;

#[tokio::test]
async fn test_download_bundle_returns_bytes() {
    let (server, instance) = common::setup_instance_mock().await;
    Mock::given(method("GET"))
        .and(path("/attachment/download/file-42"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"PK\x03\x04bundle".to_vec())
                .append_header("Content-Type", "application/octet-stream"),
        )
        .mount(&server)
        .await;

    let bytes = instance.download_bundle("file-42").await.unwrap();
    assert_eq!(bytes, b"PK\x03\x04bundle".to_vec());
}

#[tokio::test]
async fn test_upload_and_upgrade_use_distinct_endpoints() {
    let (server, instance) = common::setup_instance_mock().await;
    Mock::given(method("POST"))
        .and(path("/task/packages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "VirusTotal", "version": "2.0.0"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/task/packages/upgrade"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "VirusTotal", "version": "2.1.0"})))
        .expect(1)
        .mount(&server)
        .await;

    let added = instance
        .upload_plugin("VirusTotal.swimbundle", b"bundle".to_vec())
        .await
        .unwrap();
    assert_eq!(added.version().as_deref(), Some("2.0.0"));

    let upgraded = instance
        .upgrade_plugin("VirusTotal.swimbundle", b"bundle".to_vec())
        .await
        .unwrap();
    assert_eq!(upgraded.version().as_deref(), Some("2.1.0"));
}

#[tokio::test]
async fn test_plugin_lookup_by_name() {
    let (server, instance) = common::setup_instance_mock().await;
    common::mount_json(
        &server,
        "GET",
        "/task/packages/VirusTotal",
        200,
        json!({"name": "VirusTotal", "version": "2.0.0", "fileId": "f1"}),
    )
    .await;

    let plugin = instance
        .find_by_name(ComponentKind::Plugin, "VirusTotal")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(plugin.str_field("fileId"), Some("f1"));
}
