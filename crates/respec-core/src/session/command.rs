use std::path::{Path, PathBuf};

use tokio::process::{Child, Command};

use super::{SessionError, SessionOptions};
use crate::sandbox;

/// How the toolchain should treat `.ghci` startup scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DotGhci {
    Ignore,
    Script(PathBuf),
}

impl DotGhci {
    /// `"ignore"` disables startup scripts; anything else is a script path.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "ignore" => DotGhci::Ignore,
            path => DotGhci::Script(PathBuf::from(path)),
        }
    }
}

/// Fully resolved command line for an interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl SessionCommand {
    /// Render as a single shell-like line for logs and diagnostics.
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Assemble the command line: include paths, package database, startup
/// script handling, then caller-supplied flags last.
pub fn build_command(options: &SessionOptions) -> SessionCommand {
    let mut args = Vec::new();

    if options.include_dirs {
        for dir in top_level_dirs(&options.cwd) {
            args.push(format!("-i{dir}"));
        }
    }

    if let Some(glob) = &options.sandbox_glob {
        if let Some(db) = sandbox::find_package_db(&options.cwd, glob) {
            args.push(format!("-package-db={}", db.display()));
        }
    }

    match &options.dot_ghci {
        Some(DotGhci::Ignore) => args.push("-ignore-dot-ghci".to_string()),
        Some(DotGhci::Script(path)) => {
            args.push("-ghci-script".to_string());
            args.push(path.display().to_string());
        }
        None => {}
    }

    args.extend(options.extra_args.iter().cloned());

    SessionCommand {
        program: options.program.clone(),
        args,
        cwd: options.cwd.clone(),
    }
}

fn top_level_dirs(cwd: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(cwd) else {
        return Vec::new();
    };
    let mut dirs: Vec<String> = entries
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.'))
        .collect();
    dirs.sort();
    dirs
}

/// Read end of the pipe shared by the child's stdout and stderr.
#[cfg(unix)]
pub(super) type OutputPipe = tokio::net::unix::pipe::Receiver;
#[cfg(not(unix))]
pub(super) type OutputPipe = tokio::fs::File;

/// A spawned session process and its merged output.
pub(super) struct Spawned {
    pub(super) child: Child,
    pub(super) output: OutputPipe,
}

/// Spawn the session in its own process group with stdout and stderr
/// writing into one pipe.
pub(super) fn spawn(cmd: &SessionCommand) -> Result<Spawned, SessionError> {
    let (reader, writer) = std::io::pipe().map_err(SessionError::SpawnFailed)?;
    let err_writer = writer.try_clone().map_err(SessionError::SpawnFailed)?;

    let mut command = Command::new(&cmd.program);
    command
        .args(&cmd.args)
        .current_dir(&cmd.cwd)
        .stdin(std::process::Stdio::piped())
        .stdout(writer)
        .stderr(err_writer)
        .kill_on_drop(true);

    #[cfg(unix)]
    {
        unsafe {
            command.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    let child = command.spawn().map_err(SessionError::SpawnFailed)?;
    // The command holds our copies of the write end; the reader sees EOF
    // only once they are closed.
    drop(command);

    Ok(Spawned {
        child,
        output: open_output(reader)?,
    })
}

#[cfg(unix)]
fn open_output(reader: std::io::PipeReader) -> Result<OutputPipe, SessionError> {
    Ok(tokio::net::unix::pipe::Receiver::from_owned_fd(
        std::os::fd::OwnedFd::from(reader),
    )?)
}

#[cfg(not(unix))]
fn open_output(reader: std::io::PipeReader) -> Result<OutputPipe, SessionError> {
    let handle = std::os::windows::io::OwnedHandle::from(reader);
    Ok(tokio::fs::File::from_std(std::fs::File::from(handle)))
}
