use std::time::Duration;

use tokio::process::Child;

/// Signal the session's process group with SIGTERM, escalating to SIGKILL
/// after `grace`. Never fails; a process that is already gone is fine.
pub(super) async fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        let pgid = -(pid as i32);
        if unsafe { libc::kill(pgid, libc::SIGTERM) } == 0 {
            let _ = tokio::time::timeout(grace, child.wait()).await;
            // Stragglers in the group outlive the leader otherwise.
            unsafe { libc::kill(pgid, libc::SIGKILL) };
        } else {
            tracing::debug!(
                pid,
                error = %std::io::Error::last_os_error(),
                "could not signal session process group"
            );
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    let _ = child.kill().await;
}

#[cfg(all(test, unix))]
mod tests {
    use super::super::command::{spawn, SessionCommand};
    use super::*;

    fn shell(script: &str) -> SessionCommand {
        SessionCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            cwd: std::env::temp_dir(),
        }
    }

    #[tokio::test]
    async fn escalates_when_sigterm_is_ignored() {
        let mut spawned = spawn(&shell("trap '' TERM; sleep 30")).unwrap();

        let started = std::time::Instant::now();
        terminate(&mut spawned.child, Duration::from_millis(200)).await;

        assert!(spawned.child.try_wait().unwrap().is_some());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn exited_process_is_left_alone() {
        let mut spawned = spawn(&shell("exit 0")).unwrap();
        spawned.child.wait().await.unwrap();

        terminate(&mut spawned.child, Duration::from_millis(200)).await;
        assert!(spawned.child.try_wait().unwrap().is_some());
    }
}
