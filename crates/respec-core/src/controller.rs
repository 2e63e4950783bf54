//! Run policy on top of a [`TestSession`].
//!
//! The controller maps file-change batches to session operations, keeps the
//! outcome of the previous run, notifies on every result and, after a fix,
//! optionally confirms it with a full-suite run.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::config::RespecConfig;
use crate::naming::{ModuleName, NamingConvention, WatchedPath};
use crate::notifier::{NotificationKind, Notifier};
use crate::outcome::{Outcome, RunStatus};
use crate::session::{SessionFactory, TestSession};
use crate::targets::KnownTargets;
use crate::{RespecError, Result};

/// Immutable controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub top_spec: String,
    pub all_on_start: bool,
    pub all_on_pass: bool,
    pub focus_on_fail: bool,
    pub root: PathBuf,
    pub naming: NamingConvention,
    pub ignore: Vec<String>,
}

impl ControllerConfig {
    pub fn from_respec_config(cfg: &RespecConfig, root: &Path) -> Self {
        Self {
            top_spec: cfg.runner.top_spec.clone(),
            all_on_start: cfg.runner.all_on_start,
            all_on_pass: cfg.runner.all_on_pass,
            focus_on_fail: cfg.runner.focus_on_fail,
            root: root.to_path_buf(),
            naming: NamingConvention::new(
                cfg.watch.source_root.as_deref(),
                &cfg.watch.extensions,
                &cfg.watch.manifest_patterns,
            ),
            ignore: cfg.watch.ignore.clone(),
        }
    }
}

/// One cell of the reconciliation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: RunStatus,
    pub notification: NotificationKind,
    pub cascade: bool,
}

/// Reconcile the previous run with a fresh result.
///
/// A fresh failure only overwrites history when it is news: a runtime
/// failure stays a runtime failure through later compile errors, so focus
/// mode keeps rerunning the failing examples once the code compiles again.
/// Cascading happens only on a transition into success.
pub fn transition(previous: RunStatus, fresh: RunStatus, all_on_pass: bool) -> Transition {
    use NotificationKind as N;
    use RunStatus::*;

    let (next, notification, cascade) = match (previous, fresh) {
        (Success, Success) => (Success, N::Success, false),
        (Success, RuntimeFailure) => (RuntimeFailure, N::Failure, false),
        (Success, CompileFailure) => (CompileFailure, N::Failure, false),
        (RuntimeFailure | CompileFailure, Success) => (Success, N::Success, all_on_pass),
        (RuntimeFailure, RuntimeFailure | CompileFailure) => (RuntimeFailure, N::Failure, false),
        (CompileFailure, RuntimeFailure) => (RuntimeFailure, N::Failure, false),
        (CompileFailure, CompileFailure) => (CompileFailure, N::Failure, false),
    };

    Transition {
        next,
        notification,
        cascade,
    }
}

/// Policy layer owning the session, run history and known targets.
pub struct Controller<F: SessionFactory, N: Notifier> {
    config: ControllerConfig,
    factory: F,
    notifier: N,
    session: Option<F::Session>,
    last_run: RunStatus,
    targets: KnownTargets,
}

impl<F: SessionFactory, N: Notifier> Controller<F, N> {
    pub fn new(config: ControllerConfig, factory: F, notifier: N) -> Self {
        Self {
            config,
            factory,
            notifier,
            session: None,
            last_run: RunStatus::Success,
            targets: KnownTargets::default(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn last_run(&self) -> RunStatus {
        self.last_run
    }

    pub fn known_targets(&self) -> &KnownTargets {
        &self.targets
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Start a session, load the top-level spec and optionally run everything.
    pub async fn start(&mut self) -> Result<()> {
        self.stop().await;

        let mut session = self.factory.start().await?;
        self.targets = KnownTargets::scan(&self.config.root, &self.config.naming, &self.config.ignore);
        info!(
            top_spec = %self.config.top_spec,
            known_targets = self.targets.len(),
            "session started"
        );

        let outcome = session.initialize_target(&self.config.top_spec).await?;
        self.session = Some(session);
        self.report_load(outcome)?;

        if self.config.all_on_start {
            self.run_all().await?;
        }
        Ok(())
    }

    /// Shut the session down, if there is one.
    pub async fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.shutdown().await;
        }
    }

    /// Replace the session with a fresh one.
    pub async fn reload(&mut self) -> Result<()> {
        info!("reloading session");
        self.stop().await;
        self.start().await
    }

    pub async fn run_all(&mut self) -> Result<RunStatus> {
        let outcome = self.session()?.run_all().await?;
        self.settle(outcome).await
    }

    /// Run tests matching `pattern`, or only the failures when focusing.
    pub async fn run(&mut self, pattern: Option<&str>) -> Result<RunStatus> {
        let focus = self.config.focus_on_fail && self.last_run == RunStatus::RuntimeFailure;
        let session = self.session()?;
        let outcome = if focus {
            debug!("previous run failed, rerunning failures");
            session.rerun_failures().await?
        } else {
            session.run_matching(pattern).await?
        };
        self.settle(outcome).await
    }

    /// New files may introduce modules the top-level spec has to pick up.
    pub async fn on_files_added<S: AsRef<str>>(&mut self, paths: &[S]) -> Result<()> {
        if !self.targets.absorb(paths) {
            debug!(count = paths.len(), "added files already known");
            return Ok(());
        }

        info!(count = paths.len(), "new files, reloading top-level spec");
        let target = self.config.top_spec.clone();
        let outcome = self.session()?.initialize_target(&target).await?;
        self.report_load(outcome)
    }

    /// React to a batch of modified files. Only the first path counts.
    pub async fn on_files_changed<S: AsRef<str>>(&mut self, paths: &[S]) -> Result<()> {
        let Some(first) = paths.first().map(AsRef::as_ref) else {
            return Ok(());
        };

        match self.config.naming.classify(first) {
            WatchedPath::Manifest => self.reload().await,
            WatchedPath::Spec(module) => {
                self.run(module.as_ref().map(ModuleName::as_str)).await?;
                Ok(())
            }
            WatchedPath::Source(module) => {
                self.run(Some(module.as_str())).await?;
                Ok(())
            }
            WatchedPath::Other => {
                debug!(path = first, "ignoring change");
                Ok(())
            }
        }
    }

    /// Apply one transition to the run history. Returns whether to cascade.
    pub fn reconcile(&mut self, fresh: RunStatus) -> bool {
        let t = transition(self.last_run, fresh, self.config.all_on_pass);
        if t.next != self.last_run {
            info!(from = %self.last_run, to = %t.next, "run status changed");
        }
        self.last_run = t.next;
        self.notify(t.notification);
        t.cascade
    }

    async fn settle(&mut self, mut outcome: Outcome) -> Result<RunStatus> {
        loop {
            let fresh = self.accept(outcome)?;
            if !self.reconcile(fresh) {
                return Ok(self.last_run);
            }
            info!("fix detected, running full suite");
            outcome = self.session()?.run_all().await?;
        }
    }

    fn accept(&self, outcome: Outcome) -> Result<RunStatus> {
        match outcome.run_status() {
            Some(status) => Ok(status),
            None => {
                error!("toolchain could not load the project; reload required");
                self.notify(NotificationKind::Failure);
                Err(RespecError::SessionUnusable)
            }
        }
    }

    /// Loads report their result but do not count as runs.
    fn report_load(&self, outcome: Outcome) -> Result<()> {
        info!(top_spec = %self.config.top_spec, %outcome, "top-level spec loaded");
        match outcome {
            Outcome::Success => {
                self.notify(NotificationKind::Success);
                Ok(())
            }
            Outcome::RuntimeFailure | Outcome::CompileFailure => {
                self.notify(NotificationKind::Failure);
                Ok(())
            }
            Outcome::LoadingFailure => self.accept(outcome).map(|_| ()),
        }
    }

    fn notify(&self, kind: NotificationKind) {
        self.notifier.notify(kind, kind.icon());
    }

    fn session(&mut self) -> Result<&mut F::Session> {
        self.session.as_mut().ok_or(RespecError::NotStarted)
    }
}
