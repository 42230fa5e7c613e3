//! Process-group helpers so a timed-out command takes its children with it.
//!
//! Every child is started as the leader of a new process group, which makes
//! its PID the group ID. Killing the group reaches grandchildren spawned by a
//! shell (pipelines, background jobs) as well.

use std::io;

/// Puts the command's child into its own process group.
#[cfg(unix)]
pub fn isolate(command: &mut std::process::Command) {
    use std::os::unix::process::CommandExt;

    command.process_group(0);
}

/// No-op on non-Unix platforms.
#[cfg(not(unix))]
pub fn isolate(_command: &mut std::process::Command) {}

/// Sends SIGKILL to the process group led by `pgid` (best-effort).
///
/// A group that has already exited is not an error.
#[cfg(unix)]
pub fn kill_group(pgid: u32) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(pgid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "process group id out of range"))?;

    let result = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if result == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }

    Ok(())
}

/// No-op on non-Unix platforms; the child itself is killed by the caller.
#[cfg(not(unix))]
pub fn kill_group(_pgid: u32) -> io::Result<()> {
    Ok(())
}

/// Kills a process group when dropped.
///
/// Held for the lifetime of an execution, so the group goes down even when
/// the awaiting future is cancelled.
#[derive(Debug)]
pub struct GroupGuard {
    pgid: Option<u32>,
}

impl GroupGuard {
    pub fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid {
            if let Err(e) = kill_group(pgid) {
                tracing::warn!(pgid, error = %e, "failed to kill process group");
            }
        }
    }
}

/// Exit code for a finished process, `-N` for death by signal `N`.
#[cfg(unix)]
pub fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| -signal))
        .unwrap_or(-1)
}

/// Exit code for a finished process.
#[cfg(not(unix))]
pub fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
