//! Long-lived interactive toolchain session.
//!
//! A [`ReplSession`] owns one subprocess and one listener task. The child's
//! stdout and stderr share a single pipe, so the listener sees lines in the
//! order they were written. It forwards every line to the output sink and,
//! while a command is pending, classifies lines until the first status
//! banner. Public operations submit a command and poll until the listener
//! has classified it, so callers only ever see finished outcomes.
//!
//! Each command is preceded by a dialect-specific marker that echoes a
//! unique token. Output that arrives before the token belongs to the
//! previous command and is forwarded without being classified.

pub mod command;
pub mod dialect;
mod process;

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::classify::match_rule;
use crate::config::RespecConfig;
use crate::outcome::Outcome;

pub use command::{build_command, DotGhci, SessionCommand};
pub use dialect::{Dialect, Hspec};

/// Sequence that makes a hidden terminal cursor visible again.
pub const CURSOR_RESTORE: &str = "\x1b[?25h";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to spawn session process: {0}")]
    SpawnFailed(std::io::Error),

    #[error("a command is already pending; wait for it before submitting another")]
    Busy,

    #[error("session is not running")]
    NotRunning,

    #[error("I/O error during session: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination for everything the toolchain prints.
pub type OutputSink = Arc<Mutex<dyn Write + Send>>;

/// Sink that forwards session output to this process's stdout.
pub fn stdout_sink() -> OutputSink {
    Arc::new(Mutex::new(std::io::stdout()))
}

/// Runtime options for starting a session.
///
/// Distinct from `config::SessionConfig` which is the TOML-deserialized schema type.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub program: String,
    pub extra_args: Vec<String>,
    pub sandbox_glob: Option<String>,
    pub dot_ghci: Option<DotGhci>,
    pub include_dirs: bool,
    pub cwd: PathBuf,
    pub poll_interval: Duration,
    pub quit_grace: Duration,
}

impl SessionOptions {
    pub fn from_respec_config(cfg: &RespecConfig, cwd: &Path) -> Self {
        Self {
            program: cfg.session.program.clone(),
            extra_args: cfg.runner.ghci_options.clone(),
            sandbox_glob: Some(cfg.session.sandbox_glob.clone()),
            dot_ghci: cfg.session.dot_ghci.as_deref().map(DotGhci::parse),
            include_dirs: true,
            cwd: cwd.to_path_buf(),
            poll_interval: Duration::from_millis(cfg.session.poll_interval_ms),
            quit_grace: Duration::from_millis(cfg.session.quit_grace_ms),
        }
    }
}

/// Operations the controller drives. Every method resolves only once the
/// outcome of the submitted command is known.
pub trait TestSession: Send {
    fn initialize_target(
        &mut self,
        target: &str,
    ) -> impl Future<Output = Result<Outcome, SessionError>> + Send;

    fn run_all(&mut self) -> impl Future<Output = Result<Outcome, SessionError>> + Send;

    /// `None` runs everything.
    fn run_matching(
        &mut self,
        pattern: Option<&str>,
    ) -> impl Future<Output = Result<Outcome, SessionError>> + Send;

    fn rerun_failures(&mut self) -> impl Future<Output = Result<Outcome, SessionError>> + Send;

    /// Tear the session down. Idempotent; never fails.
    fn shutdown(&mut self) -> impl Future<Output = ()> + Send;
}

/// Creates fresh sessions for the controller's start and reload.
pub trait SessionFactory: Send + Sync {
    type Session: TestSession;

    fn start(&self) -> impl Future<Output = Result<Self::Session, SessionError>> + Send;
}

/// State shared between the caller and the listener task.
#[derive(Debug)]
struct Shared {
    pending: AtomicBool,
    outcome: Mutex<Outcome>,
    unusable: AtomicBool,
    /// Token the pending command's output starts after, until it is seen.
    awaiting: Mutex<Option<String>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            outcome: Mutex::new(Outcome::Success),
            unusable: AtomicBool::new(false),
            awaiting: Mutex::new(None),
        }
    }

    /// Mark a command as pending; its output starts after `marker`.
    fn begin(&self, marker: String) {
        *self.awaiting.lock().unwrap_or_else(|e| e.into_inner()) = Some(marker);
        self.pending.store(true, Ordering::Release);
    }

    /// Consume the start marker if `line` carries it.
    fn take_marker(&self, line: &str) -> bool {
        let mut awaiting = self.awaiting.lock().unwrap_or_else(|e| e.into_inner());
        match awaiting.as_deref() {
            Some(marker) if line.contains(marker) => {
                *awaiting = None;
                true
            }
            _ => false,
        }
    }

    fn is_awaiting_marker(&self) -> bool {
        self.awaiting
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    fn is_unusable(&self) -> bool {
        self.unusable.load(Ordering::Acquire)
    }

    fn outcome(&self) -> Outcome {
        *self.outcome.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a classification and release the waiting caller.
    fn resolve(&self, outcome: Outcome) {
        *self.outcome.lock().unwrap_or_else(|e| e.into_inner()) = outcome;
        if outcome == Outcome::LoadingFailure {
            self.unusable.store(true, Ordering::Release);
        }
        self.pending.store(false, Ordering::Release);
    }

    /// The output stream is gone. Anything still waiting is a loading failure.
    fn close(&self) {
        self.unusable.store(true, Ordering::Release);
        if self.is_pending() {
            self.resolve(Outcome::LoadingFailure);
        }
    }
}

/// One live interactive toolchain process.
pub struct ReplSession {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    listener: Option<JoinHandle<()>>,
    shared: Arc<Shared>,
    dialect: Arc<dyn Dialect>,
    sequence: u64,
    poll_interval: Duration,
    quit_grace: Duration,
}

impl std::fmt::Debug for ReplSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplSession")
            .field("sequence", &self.sequence)
            .field("poll_interval", &self.poll_interval)
            .field("quit_grace", &self.quit_grace)
            .finish_non_exhaustive()
    }
}

impl ReplSession {
    /// Spawn the toolchain and start listening to it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        options: &SessionOptions,
        dialect: Arc<dyn Dialect>,
        sink: OutputSink,
    ) -> Result<Self, SessionError> {
        let cmd = build_command(options);
        info!(command = %cmd.display_line(), cwd = %cmd.cwd.display(), "starting session");

        let command::Spawned { mut child, output } = command::spawn(&cmd)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::Io(std::io::Error::other("stdin not captured")))?;

        let shared = Arc::new(Shared::new());
        let listener = tokio::spawn(listen(BufReader::new(output), sink, Arc::clone(&shared)));

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            listener: Some(listener),
            shared,
            dialect,
            sequence: 0,
            poll_interval: options.poll_interval,
            quit_grace: options.quit_grace,
        })
    }

    /// Process id of the toolchain, while it is running.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    /// Whether a command is awaiting classification.
    pub fn is_pending(&self) -> bool {
        self.shared.is_pending()
    }

    /// Whether the session hit a loading failure or lost its process.
    pub fn is_unusable(&self) -> bool {
        self.shared.is_unusable()
    }

    /// Outcome of the most recently classified command.
    pub fn last_outcome(&self) -> Outcome {
        self.shared.outcome()
    }

    /// Send one raw command without waiting for its outcome.
    ///
    /// Rejected with [`SessionError::Busy`] while another command is pending.
    /// An unusable session resolves immediately to `LoadingFailure`.
    pub async fn submit(&mut self, command: &str) -> Result<(), SessionError> {
        if self.shared.is_pending() {
            return Err(SessionError::Busy);
        }
        let stdin = self.stdin.as_mut().ok_or(SessionError::NotRunning)?;
        if self.shared.is_unusable() {
            warn!(command, "session is unusable, not sending command");
            self.shared.resolve(Outcome::LoadingFailure);
            return Ok(());
        }

        self.sequence += 1;
        let marker = format!("respec-sync-{}", self.sequence);
        let payload = format!("{}\n{command}", self.dialect.marker(&marker));
        self.shared.begin(marker);
        debug!(command, "sending command");
        if let Err(e) = write_line(stdin, &payload).await {
            warn!(error = %e, command, "session input closed");
            self.shared.close();
        }
        Ok(())
    }

    /// Wait until the pending command, if any, has been classified.
    pub fn wait(&self) -> impl Future<Output = Outcome> + Send + 'static {
        let shared = Arc::clone(&self.shared);
        let poll_interval = self.poll_interval;
        async move {
            while shared.is_pending() {
                tokio::time::sleep(poll_interval).await;
            }
            shared.outcome()
        }
    }

    /// Submit a command and wait for its outcome.
    pub async fn execute(&mut self, command: &str) -> Result<Outcome, SessionError> {
        self.submit(command).await?;
        let outcome = self.wait().await;
        debug!(command, %outcome, "command finished");
        Ok(outcome)
    }

    /// Reload, and only if that compiled cleanly, run `command`.
    async fn reload_then(&mut self, command: &str) -> Result<Outcome, SessionError> {
        let reload = self.dialect.reload();
        let outcome = self.execute(&reload).await?;
        if !outcome.is_success() {
            return Ok(outcome);
        }
        self.execute(command).await
    }

    pub async fn initialize_target(&mut self, target: &str) -> Result<Outcome, SessionError> {
        let command = self.dialect.load(target);
        self.execute(&command).await
    }

    pub async fn run_all(&mut self) -> Result<Outcome, SessionError> {
        let command = self.dialect.run_all();
        self.reload_then(&command).await
    }

    pub async fn run_matching(&mut self, pattern: Option<&str>) -> Result<Outcome, SessionError> {
        match pattern {
            Some(pattern) => {
                let command = self.dialect.run_matching(pattern);
                self.reload_then(&command).await
            }
            None => self.run_all().await,
        }
    }

    pub async fn rerun_failures(&mut self) -> Result<Outcome, SessionError> {
        let command = self.dialect.rerun_failures();
        self.reload_then(&command).await
    }

    /// Quit gracefully, falling back to signals, then stop the listener.
    pub async fn shutdown(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        let quit = self.dialect.quit();
        let graceful = match self.stdin.take() {
            Some(mut stdin) if !self.shared.is_unusable() => {
                let sent = write_line(&mut stdin, &quit).await.is_ok();
                drop(stdin);
                sent
            }
            _ => false,
        };

        if graceful {
            match tokio::time::timeout(self.quit_grace, child.wait()).await {
                Ok(_) => debug!("session exited after quit"),
                Err(_) => {
                    warn!("session ignored quit, terminating");
                    process::terminate(&mut child, self.quit_grace).await;
                }
            }
        } else {
            warn!("session input unavailable, terminating");
            process::terminate(&mut child, self.quit_grace).await;
        }

        if let Some(mut listener) = self.listener.take() {
            if tokio::time::timeout(self.quit_grace, &mut listener)
                .await
                .is_err()
            {
                listener.abort();
            }
        }
        self.shared.close();
        info!("session stopped");
    }
}

impl Drop for ReplSession {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

impl TestSession for ReplSession {
    async fn initialize_target(&mut self, target: &str) -> Result<Outcome, SessionError> {
        ReplSession::initialize_target(self, target).await
    }

    async fn run_all(&mut self) -> Result<Outcome, SessionError> {
        ReplSession::run_all(self).await
    }

    async fn run_matching(&mut self, pattern: Option<&str>) -> Result<Outcome, SessionError> {
        ReplSession::run_matching(self, pattern).await
    }

    async fn rerun_failures(&mut self) -> Result<Outcome, SessionError> {
        ReplSession::rerun_failures(self).await
    }

    async fn shutdown(&mut self) {
        ReplSession::shutdown(self).await
    }
}

/// Starts [`ReplSession`]s with fixed options, dialect and sink.
#[derive(Clone)]
pub struct ReplLauncher {
    options: SessionOptions,
    dialect: Arc<dyn Dialect>,
    sink: OutputSink,
}

impl ReplLauncher {
    pub fn new(options: SessionOptions, dialect: Arc<dyn Dialect>, sink: OutputSink) -> Self {
        Self {
            options,
            dialect,
            sink,
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }
}

impl SessionFactory for ReplLauncher {
    type Session = ReplSession;

    async fn start(&self) -> Result<ReplSession, SessionError> {
        ReplSession::start(&self.options, Arc::clone(&self.dialect), self.sink.clone())
    }
}

async fn write_line(stdin: &mut ChildStdin, command: &str) -> std::io::Result<()> {
    stdin.write_all(command.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}

/// Listener task: the only reader of the session's output for its lifetime.
async fn listen<R>(mut output: R, sink: OutputSink, shared: Arc<Shared>)
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match output.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                handle_line(line.trim_end_matches(['\r', '\n']), &sink, &shared);
            }
            Err(e) => {
                warn!(error = %e, "failed reading session output");
                break;
            }
        }
    }

    if shared.is_pending() {
        warn!("session output closed while a command was pending");
    }
    shared.close();
}

fn handle_line(line: &str, sink: &OutputSink, shared: &Shared) {
    if shared.is_pending() && shared.take_marker(line) {
        return;
    }
    emit(sink, line.as_bytes(), true);

    if !shared.is_pending() || shared.is_awaiting_marker() {
        return;
    }
    let Some(matched) = match_rule(line) else {
        return;
    };

    let outcome = matched.outcome;
    debug!(%outcome, rule = matched.rule, "classified session output");
    if outcome == Outcome::LoadingFailure {
        warn!(line, "toolchain failed to load the project");
    }
    shared.resolve(outcome);
    emit(sink, CURSOR_RESTORE.as_bytes(), false);
}

fn emit(sink: &OutputSink, bytes: &[u8], newline: bool) {
    let mut out = sink.lock().unwrap_or_else(|e| e.into_inner());
    let _ = out.write_all(bytes);
    if newline {
        let _ = out.write_all(b"\n");
    }
    let _ = out.flush();
}
