//! Watch mode: file-system events in, controller operations out.

use std::future::Future;
use std::path::{Component, Path};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::event::{EventKind, ModifyKind};
use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use respec_core::config::RespecConfig;
use respec_core::naming::{NamingConvention, WatchedPath};
use respec_core::targets::KnownTargets;
use respec_core::RespecError;

use crate::AppController;

/// Paths collected during one debounce window, relative to the project root.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Batch {
    pub added: Vec<String>,
    pub changed: Vec<String>,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty()
    }

    /// Fold one watcher event into the batch, dropping paths nothing cares about.
    pub fn record(
        &mut self,
        event: &notify::Event,
        root: &Path,
        naming: &NamingConvention,
        ignore: &[String],
    ) {
        let created = matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))
        );
        let modified = matches!(event.kind, EventKind::Modify(_));

        for path in &event.paths {
            let Some(rel) = relativize(root, path, ignore) else {
                continue;
            };
            if created && naming.is_source_file(&rel) {
                push_unique(&mut self.added, rel);
            } else if modified && naming.classify(&rel) != WatchedPath::Other {
                push_unique(&mut self.changed, rel);
            }
        }
    }

    /// Editors that save by replacing a file report a create for a path we
    /// already track. Those are changes, not additions.
    pub fn settle_known(&mut self, known: &KnownTargets) {
        let (known_paths, fresh): (Vec<_>, Vec<_>) = std::mem::take(&mut self.added)
            .into_iter()
            .partition(|p| known.contains(p));
        self.added = fresh;
        for path in known_paths {
            push_unique(&mut self.changed, path);
        }
    }
}

fn push_unique(list: &mut Vec<String>, path: String) {
    if !list.contains(&path) {
        list.push(path);
    }
}

/// Project-relative `/`-separated path, or `None` for paths outside the
/// root, in hidden directories or under an ignored directory.
pub fn relativize(root: &Path, path: &Path, ignore: &[String]) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        let Component::Normal(part) = component else {
            return None;
        };
        let part = part.to_str()?;
        if part.starts_with('.') || ignore.iter().any(|i| i == part) {
            return None;
        }
        parts.push(part);
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Watch `root` until interrupted, feeding batches to the controller.
pub async fn run(root: &Path, config: &RespecConfig, mut controller: AppController) -> Result<ExitCode> {
    let naming = controller.config().naming.clone();
    let ignore = config.watch.ignore.clone();
    let debounce = Duration::from_millis(config.watch.debounce_ms);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Event>();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                let _ = event_tx.send(event);
            }
            Err(err) => warn!(error = %err, "file watcher error"),
        }
    })
    .context("failed to create file watcher")?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", root.display()))?;

    let mut interrupted = std::pin::pin!(tokio::signal::ctrl_c());

    let started = unless_interrupted(controller.start(), &mut interrupted).await;
    match started {
        None => return Ok(shut_down(controller).await),
        Some(Ok(())) => {}
        Some(Err(RespecError::SessionUnusable)) => {
            error!("project failed to load; waiting for a manifest change")
        }
        Some(Err(e)) => return Err(e).context("failed to start session"),
    }
    info!(root = %root.display(), "watching for changes");

    let mut batch = Batch::default();
    let mut pending = false;
    loop {
        tokio::select! {
            _ = &mut interrupted => {
                info!("interrupted");
                break;
            }
            event = event_rx.recv() => {
                let Some(event) = event else {
                    warn!("file watcher stopped");
                    break;
                };
                batch.record(&event, root, &naming, &ignore);
                pending = !batch.is_empty();
            }
            _ = tokio::time::sleep(debounce), if pending => {
                pending = false;
                let mut ready = std::mem::take(&mut batch);
                ready.settle_known(controller.known_targets());
                if unless_interrupted(dispatch(&mut controller, ready), &mut interrupted)
                    .await
                    .is_none()
                {
                    break;
                }
            }
        }
    }

    Ok(shut_down(controller).await)
}

/// Drive `work` to completion unless `interrupt` fires first.
async fn unless_interrupted<T>(work: impl Future<Output = T>, interrupt: impl Future) -> Option<T> {
    tokio::select! {
        biased;
        _ = interrupt => {
            info!("interrupted");
            None
        }
        out = work => Some(out),
    }
}

async fn shut_down(mut controller: AppController) -> ExitCode {
    controller.stop().await;
    ExitCode::SUCCESS
}

async fn dispatch(controller: &mut AppController, batch: Batch) {
    debug!(added = ?batch.added, changed = ?batch.changed, "dispatching batch");

    if !batch.added.is_empty() {
        if let Err(e) = controller.on_files_added(&batch.added).await {
            report(e);
        }
    }
    if !batch.changed.is_empty() {
        if let Err(e) = controller.on_files_changed(&batch.changed).await {
            report(e);
        }
    }
}

fn report(err: RespecError) {
    match err {
        RespecError::SessionUnusable => {
            error!("project failed to load; waiting for a manifest change")
        }
        RespecError::NotStarted => warn!("no session running; waiting for a manifest change"),
        other => error!(error = %other, "session operation failed"),
    }
}
