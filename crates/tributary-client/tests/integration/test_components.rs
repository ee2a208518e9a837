//! Integration tests for component reads and writes

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use tributary_core::domain::{ComponentKind, ConfigObject};
use tributary_core::ports::IInstanceAccessor;

use crate::common;

#[tokio::test]
async fn test_product_version() {
    let (_server, instance) = common::setup_instance_mock().await;
    assert_eq!(instance.product_version().await.unwrap(), "10.5.0");
}

#[tokio::test]
async fn test_list_tasks_unwraps_envelope_and_sends_token() {
    let (server, instance) = common::setup_instance_mock().await;
    Mock::given(method("GET"))
        .and(path("/task/list"))
        .and(header("authorization", "Bearer test-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tasks": [{"id": "t1", "name": "Enrich IP"}, {"id": "t2", "name": "Notify"}]
        })))
        .mount(&server)
        .await;

    let tasks = instance.list(ComponentKind::Task).await.unwrap();
    let names: Vec<_> = tasks.iter().filter_map(|t| t.name()).collect();
    assert_eq!(names, vec!["Enrich IP", "Notify"]);
}

#[tokio::test]
async fn test_list_groups_accepts_either_envelope() {
    let (server, instance) = common::setup_instance_mock().await;
    common::mount_json(&server, "GET", "/groups", 200, json!({"groups": [{"id": "g1", "name": "SOC"}]})).await;

    let groups = instance.list(ComponentKind::Group).await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].name(), Some("SOC"));
}

#[tokio::test]
async fn test_keystore_lists_names_only() {
    let (server, instance) = common::setup_instance_mock().await;
    common::mount_json(
        &server,
        "GET",
        "/credentials",
        200,
        json!({"api_key": "ENCRYPTED", "smtp_password": "ENCRYPTED"}),
    )
    .await;

    let keys = instance.list(ComponentKind::Keystore).await.unwrap();
    assert_eq!(keys.len(), 2);
    assert!(keys.iter().all(|k| k.get("value").is_none()));
    assert!(keys.iter().any(|k| k.name() == Some("api_key")));
}

#[tokio::test]
async fn test_packages_are_tagged_with_python_version() {
    let (server, instance) = common::setup_instance_mock().await;
    common::mount_json(&server, "GET", "/pip/packages/Python2_7", 200, json!([])).await;
    common::mount_json(&server, "GET", "/pip/packages/Python3_6", 200, json!([])).await;
    common::mount_json(
        &server,
        "GET",
        "/pip/packages/Python3",
        200,
        json!([{"name": "requests", "version": "2.31.0"}]),
    )
    .await;

    let packages = instance.list(ComponentKind::Package).await.unwrap();
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].str_field("pythonVersion"), Some("Python3"));
}

#[tokio::test]
async fn test_get_returns_none_on_404_and_204() {
    let (server, instance) = common::setup_instance_mock().await;
    Mock::given(method("GET"))
        .and(path("/app/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/app/empty"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    assert!(instance.get(ComponentKind::Application, "missing").await.unwrap().is_none());
    assert!(instance.get(ComponentKind::Application, "empty").await.unwrap().is_none());
}

#[tokio::test]
async fn test_user_lookup_by_name() {
    let (server, instance) = common::setup_instance_mock().await;
    Mock::given(method("GET"))
        .and(path("/user/lookup"))
        .and(query_param("name", "Ada"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "u9", "name": "Ada"}
        ])))
        .mount(&server)
        .await;

    let user = instance.find_by_name(ComponentKind::User, "Ada").await.unwrap();
    assert_eq!(user.and_then(|u| u.id().map(str::to_string)), Some("u9".to_string()));
}

#[tokio::test]
async fn test_role_search_by_name() {
    let (server, instance) = common::setup_instance_mock().await;
    Mock::given(method("GET"))
        .and(path("/roles/"))
        .and(query_param("searchFieldName", "name"))
        .and(query_param("searchValue", "Analyst"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "r1", "name": "Analyst"}]
        })))
        .mount(&server)
        .await;

    let role = instance.find_by_name(ComponentKind::Role, "Analyst").await.unwrap();
    assert!(role.is_some());
}

#[tokio::test]
async fn test_application_update_puts_collection() {
    let (server, instance) = common::setup_instance_mock().await;
    let app = json!({"id": "a1", "name": "Phishing", "fields": []});
    Mock::given(method("PUT"))
        .and(path("/app"))
        .and(body_json(app.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(app.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let updated = instance
        .update(ComponentKind::Application, &ConfigObject::new(app))
        .await
        .unwrap();
    assert_eq!(updated.id(), Some("a1"));
}

#[tokio::test]
async fn test_report_update_puts_item() {
    let (server, instance) = common::setup_instance_mock().await;
    let report = json!({"id": "r7", "name": "Weekly"});
    Mock::given(method("PUT"))
        .and(path("/reports/r7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(report.clone()))
        .expect(1)
        .mount(&server)
        .await;

    instance
        .update(ComponentKind::Report, &ConfigObject::new(report))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_workflow_by_application_id() {
    let (server, instance) = common::setup_instance_mock().await;
    common::mount_json(
        &server,
        "GET",
        "/workflow/a1",
        200,
        json!({"id": "w1", "applicationId": "a1", "stages": []}),
    )
    .await;

    let workflow = instance.get_workflow("a1").await.unwrap().unwrap();
    assert_eq!(workflow.id(), Some("w1"));
}

#[tokio::test]
async fn test_install_package_sends_only_identity() {
    let (server, instance) = common::setup_instance_mock().await;
    Mock::given(method("POST"))
        .and(path("/pip/packages"))
        .and(body_json(json!({"name": "requests", "version": "2.31.0", "pythonVersion": "Python3"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "requests"})))
        .expect(1)
        .mount(&server)
        .await;

    let package = ConfigObject::new(json!({
        "id": "p1",
        "name": "requests",
        "version": "2.31.0",
        "pythonVersion": "Python3",
        "installedDate": "2024-01-01",
    }));
    instance.install_package(&package).await.unwrap();
}
