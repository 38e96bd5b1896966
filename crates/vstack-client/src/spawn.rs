//! Auto-spawn the daemon as a detached background process (§4.8 step 1,
//! §9 "Detached child spawning — symmetry matters"). This mirrors
//! `vstack_supervisor::process::spawn_hidden`'s detach technique, but is
//! reimplemented here rather than pulled in as a dependency: the client
//! shim is meant to be embeddable in agent processes without dragging in
//! the supervisor's service drivers.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

/// Spawn `program` detached from the caller's session/terminal, with its
/// stdout/stderr discarded (the daemon does its own file logging once it
/// starts, per §6 "Persisted state").
pub fn spawn_detached_daemon(program: &str, args: &[String], cwd: Option<&Path>) -> std::io::Result<()> {
    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }
    detach(&mut command);
    // Spawn-and-forget: we don't keep the child handle. The daemon
    // outlives this process and manages its own lockfile/lifecycle.
    command.kill_on_drop(false);
    command.spawn()?;
    Ok(())
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    // SAFETY: setsid(2) is async-signal-safe and takes no arguments; this
    // closure runs in the forked child before exec.
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

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_detached_true_process_succeeds() {
        spawn_detached_daemon("/bin/sleep", &["0.1".to_string()], None).expect("spawn");
    }
}
