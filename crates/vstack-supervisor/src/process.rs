//! Process Runner (§4.2): spawn detached child processes whose stdout/stderr
//! are redirected to append-only log files, run short-lived commands with a
//! captured log and timeout, and stop children gracefully with a fallback
//! kill.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::fs::OpenOptions;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::timeout;

/// Exit code used when a command fails to launch or times out, matching
/// the original daemon's `_run_cmd` convention.
pub const LAUNCH_FAILURE_RC: i32 = 999;

/// A spawned child process plus the log paths it was redirected into.
pub struct ProcessHandle {
    child: Child,
    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
}

impl ProcessHandle {
    /// The OS process id, if the child hasn't already been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Non-blocking check for early exit. `Some(code)` if the child has
    /// already exited (code defaults to -1 if the platform could not
    /// report one, e.g. killed by a signal).
    pub fn try_exit_code(&mut self) -> Option<i32> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.code().unwrap_or(-1)),
            _ => None,
        }
    }
}

async fn append_log(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    Ok(file.into_std().await)
}

/// Spawn `cmd` (argv-style: binary plus args) detached from the daemon's own
/// terminal session, redirecting stdout/stderr to append-only log files.
///
/// On Unix the child is placed in a new session (`setsid`) so it survives
/// the daemon's controlling terminal going away. On Windows it is spawned
/// with no console window and in its own process group.
pub async fn spawn_hidden(
    cmd: &[String],
    cwd: &Path,
    stdout_log: &Path,
    stderr_log: &Path,
) -> std::io::Result<ProcessHandle> {
    let (program, args) = cmd
        .split_first()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"))?;

    let stdout_file = append_log(stdout_log).await?;
    let stderr_file = append_log(stderr_log).await?;

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file))
        .stderr(Stdio::from(stderr_file));

    detach(&mut command);

    let child = command.spawn()?;
    Ok(ProcessHandle {
        child,
        stdout_log: stdout_log.to_path_buf(),
        stderr_log: stderr_log.to_path_buf(),
    })
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    // SAFETY: setsid(2) is async-signal-safe and takes no arguments; this
    // closure runs in the forked child before exec, as required by
    // `pre_exec`'s contract.
    unsafe {
        command.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(CREATE_NO_WINDOW | CREATE_NEW_PROCESS_GROUP);
}

/// Run a short-lived command to completion, capturing combined output to
/// `log` and bounding it by `timeout_dur`. Returns the exit code, or
/// [`LAUNCH_FAILURE_RC`] if the command could not be launched or did not
/// finish in time.
pub async fn run_blocking(cmd: &[String], cwd: &Path, log: &Path, timeout_dur: Duration) -> i32 {
    let Some((program, args)) = cmd.split_first() else {
        return LAUNCH_FAILURE_RC;
    };

    let Ok(log_file) = append_log(log).await else {
        return LAUNCH_FAILURE_RC;
    };
    let Ok(log_file_err) = log_file.try_clone() else {
        return LAUNCH_FAILURE_RC;
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log_file))
        .stderr(Stdio::from(log_file_err));

    let child = match command.spawn() {
        Ok(c) => c,
        Err(_) => return LAUNCH_FAILURE_RC,
    };

    match timeout(timeout_dur, child.wait_with_output()).await {
        Ok(Ok(output)) => output.status.code().unwrap_or(LAUNCH_FAILURE_RC),
        _ => LAUNCH_FAILURE_RC,
    }
}

/// Stop a child: send a graceful terminate signal, wait up to `grace`, then
/// force-kill if it hasn't exited.
pub async fn stop(handle: &mut ProcessHandle, grace: Duration) {
    if handle.try_exit_code().is_some() {
        return;
    }

    terminate(&handle.child);

    let waited = timeout(grace, handle.child.wait()).await;
    if waited.is_err() {
        let _ = handle.child.start_kill();
        let _ = handle.child.wait().await;
    }
}

#[cfg(unix)]
fn terminate(child: &Child) {
    if let Some(pid) = child.id() {
        // SAFETY: sending SIGTERM to a pid we own; a harmless no-op if the
        // process has already exited and the pid was not yet reaped.
        unsafe {
            libc::kill(pid as i32, libc::SIGTERM);
        }
    }
}

#[cfg(windows)]
fn terminate(_child: &Child) {
    // Windows has no graceful-signal equivalent reachable from here; the
    // grace-period wait below falls through to `start_kill`.
}

/// Best-effort tail of a log file's last `max_bytes`. Never errors; an
/// unreadable file yields an empty string.
pub async fn tail(path: &Path, max_bytes: u64) -> String {
    let Ok(mut file) = tokio::fs::File::open(path).await else {
        return String::new();
    };
    let Ok(meta) = file.metadata().await else {
        return String::new();
    };
    let len = meta.len();
    let start = len.saturating_sub(max_bytes);
    if start > 0 {
        if tokio::io::AsyncSeekExt::seek(&mut file, std::io::SeekFrom::Start(start))
            .await
            .is_err()
        {
            return String::new();
        }
    }
    let mut buf = Vec::new();
    if file.read_to_end(&mut buf).await.is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_and_stop_true_process() {
        let dir = tempdir();
        let out = dir.join("out.log");
        let err = dir.join("err.log");
        let mut handle = spawn_hidden(
            &["/bin/sleep".to_string(), "5".to_string()],
            &dir,
            &out,
            &err,
        )
        .await
        .expect("spawn");
        assert!(handle.try_exit_code().is_none());
        stop(&mut handle, Duration::from_secs(2)).await;
        assert!(handle.try_exit_code().is_some());
    }

    #[tokio::test]
    async fn run_blocking_captures_exit_code() {
        let dir = tempdir();
        let log = dir.join("run.log");
        let rc = run_blocking(
            &["/bin/sh".to_string(), "-c".to_string(), "exit 3".to_string()],
            &dir,
            &log,
            Duration::from_secs(2),
        )
        .await;
        assert_eq!(rc, 3);
    }

    #[tokio::test]
    async fn run_blocking_reports_launch_failure() {
        let dir = tempdir();
        let log = dir.join("missing.log");
        let rc = run_blocking(
            &["/definitely/not/a/real/binary".to_string()],
            &dir,
            &log,
            Duration::from_secs(2),
        )
        .await;
        assert_eq!(rc, LAUNCH_FAILURE_RC);
    }

    #[tokio::test]
    async fn tail_returns_only_trailing_bytes() {
        let dir = tempdir();
        let log = dir.join("big.log");
        tokio::fs::write(&log, "0123456789").await.unwrap();
        let tailed = tail(&log, 4).await;
        assert_eq!(tailed, "6789");
    }

    #[tokio::test]
    async fn tail_missing_file_is_empty_not_error() {
        let dir = tempdir();
        let tailed = tail(&dir.join("nope.log"), 100).await;
        assert_eq!(tailed, "");
    }

    fn tempdir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vstack-process-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
