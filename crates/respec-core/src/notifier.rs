//! Run-result notifications.

use std::fmt;
use std::process::{Command, Stdio};

use tracing::{info, warn};

/// What a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Failure,
}

impl NotificationKind {
    /// Icon conventionally paired with this kind.
    pub fn icon(self) -> IconHint {
        match self {
            NotificationKind::Success => IconHint::Success,
            NotificationKind::Failure => IconHint::Failed,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Success => write!(f, "Success"),
            NotificationKind::Failure => write!(f, "Failure"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconHint {
    Success,
    Failed,
}

/// Fire-and-forget delivery of run results.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NotificationKind, icon: IconHint);
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&self, kind: NotificationKind, icon: IconHint) {
        (**self).notify(kind, icon)
    }
}

/// Reports results through `tracing` only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, kind: NotificationKind, icon: IconHint) {
        match kind {
            NotificationKind::Success => info!(?icon, "{kind}"),
            NotificationKind::Failure => warn!(?icon, "{kind}"),
        }
    }
}

/// Desktop notifications via `notify-send` (Linux) or `osascript` (macOS),
/// in addition to logging. Delivery failures are ignored.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    title: String,
}

impl DesktopNotifier {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new("respec")
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, kind: NotificationKind, icon: IconHint) {
        LogNotifier.notify(kind, icon);

        let Some(mut command) = desktop_command(&self.title, kind, icon) else {
            return;
        };
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        std::thread::spawn(move || {
            if let Err(e) = command.status() {
                tracing::debug!(error = %e, "desktop notification not delivered");
            }
        });
    }
}

fn desktop_command(title: &str, kind: NotificationKind, icon: IconHint) -> Option<Command> {
    #[cfg(target_os = "linux")]
    {
        let (urgency, icon_name) = match icon {
            IconHint::Success => ("low", "dialog-information"),
            IconHint::Failed => ("normal", "dialog-error"),
        };
        let body = kind.to_string();
        let mut command = Command::new("notify-send");
        command.args(["-u", urgency, "-i", icon_name, "-a", title, title, body.as_str()]);
        Some(command)
    }

    #[cfg(target_os = "macos")]
    {
        let _ = icon;
        let title = title.replace('"', "\\\"");
        let script = format!("display notification \"{kind}\" with title \"{title}\"");
        let mut command = Command::new("osascript");
        command.args(["-e", &script]);
        Some(command)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        let _ = (title, kind, icon);
        None
    }
}
