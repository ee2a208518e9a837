//! Error policy and run artifacts

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tributary_core::config::Config;
use tributary_core::domain::ComponentKind;
use tributary_sync::SyncError;

use crate::common::*;

fn two_tasks_and_a_report() -> MemoryInstance {
    MemoryInstance::new(SOURCE_HOST, PLATFORM)
        .with(ComponentKind::Task, json!({"id": "t-a", "name": "Enrich A", "action": {"descriptor": {"actionType": "python3"}}}))
        .with(ComponentKind::Task, json!({"id": "t-b", "name": "Enrich B", "action": {"descriptor": {"actionType": "python3"}}}))
        .with(ComponentKind::Report, json!({"id": "r-1", "name": "Open cases"}))
}

fn task_and_report_config(continue_on_error: bool, dump: &Path) -> Config {
    let mut config = config(false)
        .continue_on_error(continue_on_error)
        .components(vec![ComponentKind::Task, ComponentKind::Report])
        .build();
    config.audit.error_dump_path = Some(dump.to_path_buf());
    config
}

/// The single run directory written below `base`
fn run_dir(base: &Path) -> PathBuf {
    let dirs: Vec<_> = std::fs::read_dir(base)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(dirs.len(), 1, "expected one run directory, found {dirs:?}");
    dirs.into_iter().next().unwrap()
}

#[tokio::test]
async fn swallowed_failure_is_contained() {
    let dump = tempfile::tempdir().unwrap();
    let source = Arc::new(two_tasks_and_a_report());
    let destination = Arc::new(empty_destination().failing("add", "Enrich A"));

    let report = engine(&source, &destination, &task_and_report_config(true, dump.path()))
        .run(never_confirm)
        .await
        .unwrap();

    assert_eq!(report.errors, 1);
    assert!(destination.named(ComponentKind::Task, "Enrich A").is_none());
    assert!(destination.named(ComponentKind::Task, "Enrich B").is_some());
    assert!(destination.named(ComponentKind::Report, "Open cases").is_some());

    let written = report.archive.expect("errors are flushed");
    assert_eq!(written, run_dir(dump.path()));
    let log = std::fs::read_to_string(written.join("output.log")).unwrap();
    let failures: Vec<_> = log.lines().filter(|l| l.contains("[connection_error]")).collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("Enrich A"));
}

#[tokio::test]
async fn fatal_failure_still_flushes_the_log() {
    let dump = tempfile::tempdir().unwrap();
    let source = Arc::new(two_tasks_and_a_report());
    let destination = Arc::new(empty_destination().failing("add", "Enrich A"));

    let err = engine(&source, &destination, &task_and_report_config(false, dump.path()))
        .run(never_confirm)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Remote { function: "add", .. }));
    assert!(destination.writes().is_empty());
    let log = std::fs::read_to_string(run_dir(dump.path()).join("output.log")).unwrap();
    assert!(log.contains("[connection_error]"));
    assert!(log.contains("Enrich A"));
}

#[tokio::test]
async fn clean_run_leaves_no_artifacts() {
    let dump = tempfile::tempdir().unwrap();
    let source = Arc::new(two_tasks_and_a_report());
    let destination = Arc::new(empty_destination());

    let report = engine(&source, &destination, &task_and_report_config(true, dump.path()))
        .run(never_confirm)
        .await
        .unwrap();

    assert_eq!(report.errors, 0);
    assert!(report.archive.is_none());
    assert_eq!(std::fs::read_dir(dump.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn content_dump_archives_payloads_and_log() {
    let dump = tempfile::tempdir().unwrap();
    let source = Arc::new(two_tasks_and_a_report());
    let destination = Arc::new(empty_destination());
    let config = config(false)
        .components(vec![ComponentKind::Task])
        .dump_content_path(dump.path().to_path_buf())
        .build();

    let report = engine(&source, &destination, &config)
        .run(never_confirm)
        .await
        .unwrap();

    let written = report.archive.unwrap();
    assert!(written
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("tributary_"));
    assert!(written.join("output.log").exists());
    assert!(written.join("content/altered/tasks/Enrich B.json").exists());
    assert!(written.join("content/source/tasks").is_dir());
}

#[tokio::test]
async fn unlisted_references_are_not_fetched() {
    let source = Arc::new(full_source().failing("list", "applications"));
    let destination = Arc::new(empty_destination());
    let config = config(false)
        .continue_on_error(true)
        .components(vec![ComponentKind::Workspace])
        .exclude("applications=Alerts")
        .build();

    let report = engine(&source, &destination, &config)
        .run(never_confirm)
        .await
        .unwrap();

    assert!(report.errors >= 1);
    assert!(!source
        .reads()
        .iter()
        .any(|r| r.kind == ComponentKind::Application && r.op == "get"));
    assert!(destination.objects(ComponentKind::Application).is_empty());
    assert!(destination.named(ComponentKind::Workspace, "SOC").is_some());
}
