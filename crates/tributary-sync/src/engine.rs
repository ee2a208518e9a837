//! Sync orchestrator
//!
//! [`SyncEngine::run`] drives one reconciliation run:
//!
//! 1. Reads both platform versions and refuses unsupported migrations
//! 2. Logs known platform caveats for the enabled options
//! 3. Asks for confirmation when an older source targets a newer destination
//! 4. Runs the reconciler of every requested kind, in sync order
//! 5. Returns a [`SyncReport`]
//!
//! A [`RunGuard`] is armed before the first remote call. It flushes the
//! output log, homework and audit archive on every exit path: explicitly on
//! success, from `Drop` on errors and when the run future is dropped.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use tributary_audit::{ContentArchive, OutputLog};
use tributary_core::config::Config;
use tributary_core::domain::version::{check_platform_versions, platform_caveats};
use tributary_core::domain::{
    ComponentFilter, ComponentKind, DiffEntry, HomeworkList, InstanceRole, PlatformCompatibility,
    RunId,
};
use tributary_core::ports::{IAuditSink, IInstanceAccessor};

use crate::components::applications::rewrite_references;
use crate::components::reconciler_for;
use crate::context::{RunContext, RunSettings};
use crate::executor::CallExecutor;
use crate::instance::Instance;
use crate::SyncError;

const OUTPUT_LOG: &str = "output.log";
const HOMEWORK: &str = "homework.txt";

// ============================================================================
// Preflight and report
// ============================================================================

/// Platform versions checked before a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preflight {
    pub source_version: String,
    pub destination_version: String,
    /// Older source against a newer destination
    pub needs_confirmation: bool,
    pub caveats: Vec<String>,
}

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: RunId,
    pub dry_run: bool,
    pub components: Vec<ComponentKind>,
    pub diff: Vec<DiffEntry>,
    pub homework: HomeworkList,
    pub errors: usize,
    pub correlated_tracking_ids: usize,
    pub archive: Option<PathBuf>,
    pub duration_ms: u64,
}

impl SyncReport {
    /// Rendered dry-run entries
    pub fn render_diff(&self) -> Vec<String> {
        self.diff.iter().map(DiffEntry::render).collect()
    }

    /// One-line summary of a real run
    pub fn summary(&self) -> String {
        format!(
            "Run {} reconciled {} component kind(s) in {} ms with {} error(s) and {} homework item(s)",
            self.run_id.short(),
            self.components.len(),
            self.duration_ms,
            self.errors,
            self.homework.len()
        )
    }
}

// ============================================================================
// RunGuard
// ============================================================================

/// Flushes run artifacts exactly once, however the run ends
pub struct RunGuard {
    run_id: RunId,
    log: Arc<OutputLog>,
    homework: Arc<Mutex<HomeworkList>>,
    archive: Option<Arc<ContentArchive>>,
    error_dump_base: PathBuf,
    closed: bool,
}

impl RunGuard {
    pub fn new(
        run_id: RunId,
        log: Arc<OutputLog>,
        homework: Arc<Mutex<HomeworkList>>,
        archive: Option<Arc<ContentArchive>>,
        error_dump_base: PathBuf,
    ) -> Self {
        Self {
            run_id,
            log,
            homework,
            archive,
            error_dump_base,
            closed: false,
        }
    }

    /// Write the output log and homework.
    ///
    /// With content dumping they join the archive; otherwise they are written
    /// only when the run logged errors. Returns the directory written, if any.
    pub fn close(&mut self) -> Result<Option<PathBuf>, SyncError> {
        if self.closed {
            return Ok(None);
        }
        self.closed = true;

        let target = match &self.archive {
            Some(archive) => archive.clone(),
            None if self.log.error_count() > 0 => {
                Arc::new(ContentArchive::for_run(&self.error_dump_base, &self.run_id))
            }
            None => {
                debug!(run_id = %self.run_id, "No artifacts to flush");
                return Ok(None);
            }
        };

        let homework = self
            .homework
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .render();
        target.add_file(OUTPUT_LOG, self.log.render().into_bytes());
        if !homework.is_empty() {
            target.add_file(HOMEWORK, homework.into_bytes());
        }
        target
            .write_to_disk()
            .map_err(|e| SyncError::Audit(e.to_string()))
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!(run_id = %self.run_id, "Run ended early, flushing artifacts");
        if let Err(e) = self.close() {
            error!(run_id = %self.run_id, error = %e, "Failed to flush run artifacts");
        }
    }
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Reconciles a source instance into a destination instance
pub struct SyncEngine {
    source: Arc<dyn IInstanceAccessor>,
    destination: Arc<dyn IInstanceAccessor>,
    settings: RunSettings,
    filter: ComponentFilter,
    components: Vec<ComponentKind>,
    dump_content_path: Option<PathBuf>,
    error_dump_path: Option<PathBuf>,
}

impl SyncEngine {
    /// Build an engine from configuration.
    ///
    /// Fails on malformed or conflicting include/exclude expressions.
    pub fn new(
        source: Arc<dyn IInstanceAccessor>,
        destination: Arc<dyn IInstanceAccessor>,
        config: &Config,
    ) -> Result<Self, SyncError> {
        let filter = ComponentFilter::from_expressions(&config.sync.include, &config.sync.exclude)?;
        Ok(Self {
            source,
            destination,
            settings: RunSettings::from(&config.sync),
            filter,
            components: config.components(),
            dump_content_path: config.audit.dump_content_path.clone(),
            error_dump_path: config.audit.error_dump_path.clone(),
        })
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn components(&self) -> &[ComponentKind] {
        &self.components
    }

    fn error_dump_base(&self) -> PathBuf {
        self.error_dump_path
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    async fn preflight(&self, source: &Instance, destination: &Instance) -> Result<Preflight, SyncError> {
        let (Some(source_version), Some(destination_version)) =
            (source.product_version().await?, destination.product_version().await?)
        else {
            return Err(SyncError::Aborted(
                "platform version of an instance could not be read".into(),
            ));
        };

        let compatibility = check_platform_versions(
            &source_version,
            &destination_version,
            self.settings.use_unsupported_version,
        )
        .map_err(SyncError::from_version)?;

        let enabled = self.settings.enabled_options();
        let caveats: Vec<String> = platform_caveats(&destination_version, &enabled)
            .map(str::to_string)
            .collect();

        Ok(Preflight {
            source_version,
            destination_version,
            needs_confirmation: compatibility == PlatformCompatibility::NeedsConfirmation,
            caveats,
        })
    }

    /// Run every requested reconciler.
    ///
    /// `confirm` is asked once when an older source targets a newer
    /// destination and `force_unsupported_version` is off; declining aborts
    /// the run before anything is reconciled.
    pub async fn run<F>(&self, confirm: F) -> Result<SyncReport, SyncError>
    where
        F: FnOnce(&Preflight) -> bool,
    {
        let started = Instant::now();
        let run_id = RunId::new();
        let log = Arc::new(OutputLog::new());
        let homework = Arc::new(Mutex::new(HomeworkList::new()));
        let archive = self
            .dump_content_path
            .as_deref()
            .map(|base| Arc::new(ContentArchive::for_run(base, &run_id)));
        let mut guard = RunGuard::new(
            run_id,
            log.clone(),
            homework.clone(),
            archive.clone(),
            self.error_dump_base(),
        );

        let sink = archive.map(|archive| archive as Arc<dyn IAuditSink>);
        let executor = Arc::new(CallExecutor::new(
            log.clone(),
            sink,
            self.settings.continue_on_error,
        ));
        let source = Instance::new(InstanceRole::Source, self.source.clone(), executor.clone());
        let destination = Instance::new(InstanceRole::Destination, self.destination.clone(), executor);

        info!(
            run_id = %run_id,
            source = source.host(),
            destination = destination.host(),
            dry_run = self.settings.dry_run,
            components = ?self.components,
            "Starting run"
        );

        let preflight = self.preflight(&source, &destination).await?;
        for caveat in &preflight.caveats {
            warn!(destination_version = %preflight.destination_version, "{caveat}");
            log.warning(caveat.clone());
        }
        if preflight.needs_confirmation
            && !self.settings.force_unsupported_version
            && !confirm(&preflight)
        {
            log.warning("Unsupported migration declined");
            return Err(SyncError::Aborted(format!(
                "migration from {} to {} was not confirmed",
                preflight.source_version, preflight.destination_version
            )));
        }

        let ctx = RunContext::new(
            source,
            destination,
            self.settings.clone(),
            self.filter.clone(),
            &self.components,
            preflight.destination_version.clone(),
            homework.clone(),
        );

        for kind in &self.components {
            info!(%kind, "Reconciling");
            log.info(format!("Syncing {}", kind.heading()));
            reconciler_for(*kind).sync(&ctx).await?;
        }
        // Applications reached only as dependencies still get their columns rewritten
        rewrite_references(&ctx).await?;

        let archive = guard.close()?;
        let report = SyncReport {
            run_id,
            dry_run: self.settings.dry_run,
            components: self.components.clone(),
            diff: ctx.recorder.entries(),
            homework: ctx.homework_snapshot(),
            errors: log.error_count(),
            correlated_tracking_ids: ctx.tracking_snapshot().len(),
            archive,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(
            run_id = %run_id,
            diff_entries = report.diff.len(),
            homework = report.homework.len(),
            errors = report.errors,
            duration_ms = report.duration_ms,
            "Run finished"
        );
        Ok(report)
    }
}
