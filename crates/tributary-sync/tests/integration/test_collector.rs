//! Footprint collection

use std::sync::Arc;

use tributary_core::domain::ComponentKind;
use tributary_sync::collector::{DashboardFootprint, WorkspaceFootprint};
use tributary_sync::{Collector, SyncError};

use crate::common::*;

#[tokio::test]
async fn gather_lists_application_names() {
    let source = Arc::new(full_source());
    let mut collector = Collector::new(source.clone());

    assert_eq!(collector.gather().await.unwrap(), vec!["Alerts", "Cases"]);
}

#[tokio::test]
async fn collect_walks_every_dependency() {
    let source = Arc::new(full_source());
    let mut collector = Collector::new(source.clone());

    let footprint = collector.collect("Alerts").await.unwrap();

    assert_eq!(footprint.application, "Alerts");
    assert_eq!(
        footprint.workspaces,
        vec![WorkspaceFootprint {
            name: "SOC".into(),
            dashboards: vec![DashboardFootprint {
                name: "Overview".into(),
                reports: vec!["Open cases".into()],
            }],
        }]
    );
    assert_eq!(footprint.tasks, vec!["Scan URL"]);
    assert_eq!(footprint.plugins, vec!["sw_virus_total"]);
    assert_eq!(footprint.assets, vec!["VirusTotal"]);
    assert_eq!(footprint.roles, vec!["Analyst"]);
    assert!(footprint.groups.is_empty());
    assert_eq!(footprint.users, vec!["ada"]);
    assert!(footprint.render_tree().contains("      Report: Open cases\n"));
    assert!(source.writes().is_empty());
}

#[tokio::test]
async fn collect_unknown_application_fails() {
    let source = Arc::new(full_source());
    let mut collector = Collector::new(source);

    let err = collector.collect("Phishing").await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::ComponentNotFound {
            kind: ComponentKind::Application,
            ..
        }
    ));
}
