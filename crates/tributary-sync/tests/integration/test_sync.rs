//! End-to-end sync runs against in-memory instances

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::json;
use tributary_core::domain::{ComponentKind, DiffType};
use tributary_sync::{SyncError, SyncReport};

use crate::common::*;

async fn run(source: &Arc<MemoryInstance>, destination: &Arc<MemoryInstance>, dry_run: bool) -> SyncReport {
    engine(source, destination, &config(dry_run).build())
        .run(never_confirm)
        .await
        .unwrap()
}

fn position(destination: &MemoryInstance, kind: ComponentKind, target: &str) -> usize {
    destination
        .writes()
        .iter()
        .position(|w| w.op == "add" && w.kind == kind && w.target == target)
        .unwrap_or_else(|| panic!("{kind} '{target}' was never added"))
}

/// Source without column references, directory cycles or workflows
fn acyclic_source() -> MemoryInstance {
    let plugin = virus_total_plugin();
    MemoryInstance::new(SOURCE_HOST, PLATFORM)
        .with(ComponentKind::Keystore, json!({"name": "vt_api_key"}))
        .with(ComponentKind::Package, json!({"name": "requests", "version": "2.31.0", "pythonVersion": "Python3"}))
        .with(ComponentKind::Plugin, plugin.clone())
        .with_bundle("file-vt", &plugin)
        .with(ComponentKind::Asset, json!({"id": "as-vt", "name": "VirusTotal"}))
        .with(ComponentKind::Applet, json!({"id": "ap-1", "name": "Timeline"}))
        .with(ComponentKind::Application, json!({
            "id": "app-alerts", "name": "Alerts", "trackingFieldId": "src-trk-alerts",
            "fields": [
                {"id": "src-trk-alerts", "name": "Tracking Id", "fieldType": "tracking"},
                {"id": "f-title", "name": "Title", "fieldType": "text"}
            ]
        }))
        .with(ComponentKind::Task, json!({
            "id": "t-scan", "name": "Scan URL", "uid": "uid-scan", "applicationId": "app-alerts",
            "action": {
                "assetId": "as-vt",
                "packageDescriptorId": "act-scan",
                "descriptor": {
                    "actionType": "ScanUrl",
                    "imageId": "img-scan",
                    "packageDescriptor": {"name": "sw_virus_total", "fileId": "file-vt"}
                }
            }
        }))
        .with(ComponentKind::Report, json!({"id": "r-open", "name": "Open alerts", "applicationIds": ["app-alerts"]}))
        .with(ComponentKind::Dashboard, json!({"id": "db-1", "name": "Overview", "items": [{"reportId": "r-open"}]}))
        .with(ComponentKind::User, json!({"id": "u-ada", "name": "ada", "roles": [], "groups": []}))
        .with(ComponentKind::Group, json!({"id": "grp-soc", "name": "SOC Team", "users": [{"id": "u-ada"}]}))
        .with(ComponentKind::Role, json!({"id": "role-analyst", "name": "Analyst", "groups": [{"id": "grp-soc"}]}))
}

#[tokio::test]
async fn dry_run_makes_no_mutations() {
    let source = Arc::new(full_source());
    let destination = Arc::new(empty_destination());

    let report = run(&source, &destination, true).await;

    assert!(destination.writes().is_empty());
    assert!(report.dry_run);
    assert!(report.archive.is_none());
    let added: BTreeSet<_> = report
        .diff
        .iter()
        .filter(|e| e.diff_type == DiffType::Added && e.subcomponent.is_none())
        .map(|e| (e.component_kind, e.name.as_str()))
        .collect();
    assert!(added.contains(&(ComponentKind::Application, "Alerts")));
    assert!(added.contains(&(ComponentKind::Task, "Scan URL")));
    assert!(added.contains(&(ComponentKind::Plugin, "sw_virus_total")));
    assert!(!added.contains(&(ComponentKind::Group, "Everyone")));
    assert!(report
        .diff
        .iter()
        .any(|e| e.name == "Alerts" && e.subcomponent.as_deref() == Some("workflow")));
}

#[tokio::test]
async fn second_pass_reports_nothing() {
    let source = Arc::new(full_source());
    let destination = Arc::new(empty_destination());

    let first = run(&source, &destination, false).await;
    assert_eq!(first.errors, 0);
    assert!(!destination.writes().is_empty());

    let second = run(&source, &destination, true).await;
    assert!(second.diff.is_empty(), "unexpected diff: {:?}", second.render_diff());
}

#[tokio::test]
async fn dependencies_are_created_before_dependents() {
    let source = Arc::new(full_source());
    let destination = Arc::new(empty_destination());
    let config = config(false)
        .components(vec![ComponentKind::Workspace])
        .build();

    engine(&source, &destination, &config)
        .run(never_confirm)
        .await
        .unwrap();

    let workspace = position(&destination, ComponentKind::Workspace, "SOC");
    let dashboard = position(&destination, ComponentKind::Dashboard, "Overview");
    let report = position(&destination, ComponentKind::Report, "Open cases");
    assert!(position(&destination, ComponentKind::Application, "Alerts") < workspace);
    assert!(position(&destination, ComponentKind::Application, "Cases") < report);
    assert!(report < dashboard);
    assert!(dashboard < workspace);
    // Tasks were not requested and nothing pulls them in
    assert!(destination.objects(ComponentKind::Task).is_empty());
}

#[tokio::test]
async fn dry_run_predicts_the_real_run() {
    let planned = run(&Arc::new(acyclic_source()), &Arc::new(empty_destination()), true).await;
    let destination = Arc::new(empty_destination());
    let applied = run(&Arc::new(acyclic_source()), &destination, false).await;
    assert_eq!(applied.errors, 0);

    let predicted: BTreeSet<(ComponentKind, String, &str)> = planned
        .diff
        .iter()
        .filter(|e| e.subcomponent.is_none())
        .map(|e| {
            let op = match e.diff_type {
                DiffType::Added => "add",
                DiffType::Updated => "update",
                DiffType::Upgraded => "upgrade",
                other => panic!("unexpected diff type {other}"),
            };
            (e.component_kind, e.name.clone(), op)
        })
        .collect();
    let performed: BTreeSet<(ComponentKind, String, &str)> = destination
        .writes()
        .into_iter()
        .map(|w| (w.kind, w.target, w.op))
        .collect();
    assert_eq!(predicted, performed);
}

#[tokio::test]
async fn tracking_ids_are_rewritten_to_destination_ids() {
    let source = Arc::new(full_source());
    let destination = Arc::new(empty_destination());

    let report = run(&source, &destination, false).await;

    let alerts = destination.named(ComponentKind::Application, "Alerts").unwrap();
    let cases = destination.named(ComponentKind::Application, "Cases").unwrap();
    let alerts_tracking = alerts.str_field("trackingFieldId").unwrap().to_string();
    let cases_tracking = cases.str_field("trackingFieldId").unwrap().to_string();
    assert_ne!(alerts_tracking, "src-trk-alerts");
    assert!(report.correlated_tracking_ids >= 2);

    let reference = alerts
        .array("fields")
        .iter()
        .find(|f| f["id"] == "f-case")
        .unwrap()
        .clone();
    assert_eq!(reference["columns"], json!([cases_tracking, "f-summary"]));
    // Exactly one tracking field, the one the destination assigned
    let tracking: Vec<_> = alerts
        .array("fields")
        .iter()
        .filter(|f| f["fieldType"] == "tracking")
        .collect();
    assert_eq!(tracking.len(), 1);
    assert_eq!(tracking[0]["id"], json!(alerts_tracking));

    let task = destination.named(ComponentKind::Task, "Scan URL").unwrap();
    assert_eq!(task.pointer("/outputs/0/backReferenceFieldId").unwrap(), &json!(alerts_tracking));
    assert_eq!(task.pointer("/action/packageDescriptorId").unwrap(), "dest-act-scan");
    assert_eq!(task.pointer("/action/descriptor/imageId").unwrap(), "dest-img-scan");
    let installed = destination.named(ComponentKind::Plugin, "sw_virus_total").unwrap();
    assert_eq!(
        task.pointer("/action/descriptor/packageDescriptor/fileId").unwrap().as_str(),
        installed.str_field("fileId")
    );

    let workflows = destination.workflows();
    assert_eq!(workflows.len(), 1);
    assert_eq!(workflows[0].str_field("applicationId"), Some("app-alerts"));
}

#[tokio::test]
async fn excluded_objects_are_never_read() {
    let source = Arc::new(full_source());
    let destination = Arc::new(empty_destination());
    let config = config(true).exclude("tasks=Scan URL").build();

    let report = engine(&source, &destination, &config)
        .run(never_confirm)
        .await
        .unwrap();

    assert!(!source
        .reads()
        .iter()
        .any(|r| r.kind == ComponentKind::Task && r.op == "get"));
    assert!(!report.diff.iter().any(|e| e.name == "Scan URL"));
    assert!(!report.homework.iter().any(|h| h.text.contains("Scan URL")));
}

#[tokio::test]
async fn secrets_never_reach_the_destination() {
    let source = Arc::new(full_source());
    let destination = Arc::new(empty_destination());

    let report = run(&source, &destination, false).await;

    let user = destination.named(ComponentKind::User, "ada").unwrap();
    assert!(user.get("password").is_none());
    assert_ne!(user.id(), Some("u-ada"));
    assert!(report
        .homework
        .for_kind(ComponentKind::User)
        .iter()
        .any(|h| h.contains("ada")));
    assert!(report
        .homework
        .for_kind(ComponentKind::Keystore)
        .iter()
        .any(|h| h.contains("vt_api_key")));
}

#[tokio::test]
async fn directory_cycles_are_closed_after_the_pass() {
    let source = Arc::new(full_source());
    let destination = Arc::new(empty_destination());

    run(&source, &destination, false).await;

    let user = destination.named(ComponentKind::User, "ada").unwrap();
    let role = destination.named(ComponentKind::Role, "Analyst").unwrap();
    let group = destination.named(ComponentKind::Group, "SOC Team").unwrap();
    assert_eq!(role.id_list("users"), vec![user.id().unwrap().to_string()]);
    assert_eq!(group.id_list("users"), vec![user.id().unwrap().to_string()]);
    assert_eq!(user.id_list("roles"), vec![role.id().unwrap().to_string()]);
    assert!(destination.named(ComponentKind::Group, "Everyone").is_none());
}

#[tokio::test]
async fn incompatible_plugin_becomes_homework() {
    let mut plugin = virus_total_plugin();
    plugin["compatibility"] = json!(">=11.0.0");
    let source = Arc::new(
        MemoryInstance::new(SOURCE_HOST, PLATFORM)
            .with(ComponentKind::Plugin, plugin.clone())
            .with_bundle("file-vt", &plugin),
    );
    let destination = Arc::new(empty_destination());

    let report = run(&source, &destination, false).await;

    assert!(destination.objects(ComponentKind::Plugin).is_empty());
    assert!(report
        .homework
        .for_kind(ComponentKind::Plugin)
        .iter()
        .any(|h| h.contains("sw_virus_total")));
}

#[tokio::test]
async fn installed_plugin_is_not_homework_when_incompatible() {
    let mut plugin = virus_total_plugin();
    plugin["compatibility"] = json!(">=11.0.0");
    let source = Arc::new(
        MemoryInstance::new(SOURCE_HOST, PLATFORM)
            .with(ComponentKind::Plugin, plugin.clone())
            .with_bundle("file-vt", &plugin),
    );
    let destination = Arc::new(empty_destination().with(ComponentKind::Plugin, plugin));

    let report = run(&source, &destination, false).await;

    assert!(destination.writes().is_empty());
    assert!(report.homework.for_kind(ComponentKind::Plugin).is_empty());
}

#[tokio::test]
async fn newer_plugin_and_package_are_upgraded() {
    let mut plugin = virus_total_plugin();
    let source = Arc::new(
        MemoryInstance::new(SOURCE_HOST, PLATFORM)
            .with(ComponentKind::Package, json!({"name": "requests", "version": "2.31.0", "pythonVersion": "Python3"}))
            .with(ComponentKind::Plugin, plugin.clone())
            .with_bundle("file-vt", &plugin),
    );
    plugin["version"] = json!("1.0.0");
    let destination = Arc::new(
        empty_destination()
            .with(ComponentKind::Package, json!({"name": "requests", "version": "2.28.0", "pythonVersion": "Python3"}))
            .with(ComponentKind::Plugin, plugin),
    );

    let report = run(&source, &destination, true).await;
    let upgraded: Vec<_> = report
        .diff
        .iter()
        .filter(|e| e.diff_type == DiffType::Upgraded)
        .map(|e| e.component_kind)
        .collect();
    assert_eq!(upgraded, vec![ComponentKind::Package, ComponentKind::Plugin]);

    run(&source, &destination, false).await;
    let ops: Vec<_> = destination.writes().into_iter().map(|w| (w.kind, w.op)).collect();
    assert_eq!(
        ops,
        vec![(ComponentKind::Package, "upgrade"), (ComponentKind::Plugin, "upgrade")]
    );
}

#[tokio::test]
async fn report_updates_follow_their_switches() {
    let source = Arc::new(
        MemoryInstance::new(SOURCE_HOST, PLATFORM)
            .with(ComponentKind::Report, json!({"id": "r-1", "name": "Open cases", "query": "new"}))
            .with(ComponentKind::Report, json!({"id": "r-2", "name": "Default", "query": "new"})),
    );
    let destination = Arc::new(
        empty_destination()
            .with(ComponentKind::Report, json!({"id": "r-1", "name": "Open cases", "query": "old"}))
            .with(ComponentKind::Report, json!({"id": "r-2", "name": "Default", "query": "old"})),
    );
    let updated = |report: &SyncReport| -> Vec<String> {
        report
            .diff
            .iter()
            .filter(|e| e.diff_type == DiffType::Updated)
            .map(|e| e.name.clone())
            .collect()
    };

    let off = config(true).update_reports(false).build();
    let report = engine(&source, &destination, &off).run(never_confirm).await.unwrap();
    assert!(updated(&report).is_empty());

    let reports_only = config(true).build();
    let report = engine(&source, &destination, &reports_only).run(never_confirm).await.unwrap();
    assert_eq!(updated(&report), vec!["Open cases"]);

    let with_default = config(true).update_default_reports(true).build();
    let report = engine(&source, &destination, &with_default).run(never_confirm).await.unwrap();
    assert_eq!(updated(&report), vec!["Open cases", "Default"]);
}

#[tokio::test]
async fn differing_versions_are_refused_by_default() {
    let source = Arc::new(MemoryInstance::new(SOURCE_HOST, "10.4.0"));
    let destination = Arc::new(empty_destination());

    let err = engine(&source, &destination, &config(true).build())
        .run(never_confirm)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::UnsupportedVersion { .. }));
}

#[tokio::test]
async fn older_source_needs_confirmation() {
    let source = Arc::new(full_source().on_version("10.4.0"));
    let destination = Arc::new(empty_destination());
    let allowed = config(true).use_unsupported_version(true).build();

    let err = engine(&source, &destination, &allowed)
        .run(never_confirm)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Aborted(_)));

    let mut asked = None;
    let report = engine(&source, &destination, &allowed)
        .run(|preflight| {
            asked = Some(preflight.source_version.clone());
            true
        })
        .await
        .unwrap();
    assert_eq!(asked.as_deref(), Some("10.4.0"));
    assert!(!report.diff.is_empty());

    let forced = config(true)
        .use_unsupported_version(true)
        .force_unsupported_version(true)
        .build();
    engine(&source, &destination, &forced)
        .run(|_| panic!("forced runs are not confirmed"))
        .await
        .unwrap();
}

#[tokio::test]
async fn newer_source_is_refused_even_when_allowed() {
    let source = Arc::new(MemoryInstance::new(SOURCE_HOST, "10.6.0"));
    let destination = Arc::new(empty_destination());
    let allowed = config(true).use_unsupported_version(true).build();

    let err = engine(&source, &destination, &allowed)
        .run(never_confirm)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::UnsupportedVersion { .. }));
}

#[tokio::test]
async fn undecodable_lookup_falls_back_to_the_name() {
    let source = Arc::new(
        MemoryInstance::new(SOURCE_HOST, PLATFORM)
            .with(ComponentKind::Asset, json!({"id": "as-vt", "name": "VirusTotal", "url": "https://vt.example/v3"})),
    );
    let destination = Arc::new(
        empty_destination()
            .with(ComponentKind::Asset, json!({"id": "as-vt", "name": "VirusTotal", "url": "https://vt.example/v2"}))
            .undecodable("get", "as-vt"),
    );
    let config = config(false).components(vec![ComponentKind::Asset]).build();

    engine(&source, &destination, &config)
        .run(never_confirm)
        .await
        .unwrap();

    assert!(destination
        .reads()
        .iter()
        .any(|r| r.op == "find_by_name" && r.kind == ComponentKind::Asset && r.target == "VirusTotal"));
    let ops: Vec<_> = destination.writes().iter().map(|w| w.op).collect();
    assert_eq!(ops, vec!["update"]);
    let assets = destination.objects(ComponentKind::Asset);
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].str_field("url"), Some("https://vt.example/v3"));
}

fn alerts_with_local_field() -> (MemoryInstance, MemoryInstance) {
    let source = MemoryInstance::new(SOURCE_HOST, PLATFORM).with(ComponentKind::Application, json!({
        "id": "app-alerts", "name": "Alerts", "trackingFieldId": "src-trk-alerts",
        "fields": [
            {"id": "src-trk-alerts", "name": "Tracking Id", "fieldType": "tracking"},
            {"id": "f-title", "name": "Title", "fieldType": "text"},
            {"id": "f-severity", "name": "Severity", "fieldType": "valuesList"}
        ]
    }));
    let destination = empty_destination().with(ComponentKind::Application, json!({
        "id": "app-alerts", "name": "Alerts", "trackingFieldId": "dst-trk-alerts",
        "fields": [
            {"id": "dst-trk-alerts", "name": "Tracking Id", "fieldType": "tracking"},
            {"id": "f-title", "name": "Title", "fieldType": "text"},
            {"id": "f-notes", "name": "Local notes", "fieldType": "text"}
        ]
    }));
    (source, destination)
}

fn field_ids(destination: &MemoryInstance) -> BTreeSet<String> {
    destination
        .named(ComponentKind::Application, "Alerts")
        .unwrap()
        .array("fields")
        .iter()
        .filter_map(|f| f["id"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn destination_only_fields_survive_by_default() {
    let (source, destination) = alerts_with_local_field();
    let (source, destination) = (Arc::new(source), Arc::new(destination));

    run(&source, &destination, false).await;

    let ids = field_ids(&destination);
    assert!(ids.contains("f-notes"));
    assert!(ids.contains("f-severity"));
    assert!(ids.contains("dst-trk-alerts"));
    assert!(!ids.contains("src-trk-alerts"));
}

#[tokio::test]
async fn mirrored_fields_drop_destination_only_fields() {
    let (source, destination) = alerts_with_local_field();
    let (source, destination) = (Arc::new(source), Arc::new(destination));
    let planned = engine(&source, &destination, &config(true).mirror_app_fields(true).build())
        .run(never_confirm)
        .await
        .unwrap();

    assert!(planned.diff.iter().any(|e| e.component_kind == ComponentKind::Application
        && e.diff_type == DiffType::Removed
        && e.subcomponent.as_deref() == Some("field")
        && e.value.as_deref() == Some("Local notes")));

    engine(&source, &destination, &config(false).mirror_app_fields(true).build())
        .run(never_confirm)
        .await
        .unwrap();

    let ids = field_ids(&destination);
    assert_eq!(
        ids,
        BTreeSet::from(["dst-trk-alerts".to_string(), "f-severity".to_string(), "f-title".to_string()])
    );
}
