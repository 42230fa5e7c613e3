//! Local process runner.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::sandbox::EphemeralWorkspace;

use super::process_group;
use super::{ExecutionMode, ExecutionRequest, ExecutionResult, ProcessRunner};

/// Runs processes on the local machine.
#[derive(Debug, Clone, Default)]
pub struct LocalRunner;

impl LocalRunner {
    /// Creates a new local runner.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for LocalRunner {
    async fn run(&self, request: ExecutionRequest) -> Result<ExecutionResult> {
        let execution_id = uuid::Uuid::new_v4().to_string();
        let timeout = request.timeout;

        let outcome = match request.mode {
            ExecutionMode::Shell { program, command } => {
                let mut workspace = EphemeralWorkspace::create()?;

                let mut cmd = std::process::Command::new(&program);
                cmd.arg("-c").arg(&command).current_dir(workspace.path());

                tracing::info!(
                    execution_id = %execution_id,
                    program = %program,
                    workspace = ?workspace.path(),
                    "running shell command"
                );
                tracing::debug!(execution_id = %execution_id, command = %command, "shell command text");

                let outcome = execute(cmd, &program, timeout, &execution_id).await;

                // The whole group has been killed by now, detached jobs
                // included, so nothing can repopulate the directory.
                if let Err(e) = workspace.cleanup() {
                    tracing::warn!(
                        execution_id = %execution_id,
                        error = %e,
                        "failed to remove shell workspace"
                    );
                }
                outcome
            }
            ExecutionMode::Argv {
                program,
                args,
                working_dir,
            } => {
                let mut cmd = std::process::Command::new(&program);
                cmd.args(&args).current_dir(&working_dir);

                tracing::info!(
                    execution_id = %execution_id,
                    program = %program,
                    working_dir = ?working_dir,
                    "running command"
                );
                tracing::debug!(execution_id = %execution_id, args = ?args, "command arguments");

                execute(cmd, &program, timeout, &execution_id).await
            }
        };

        let mut result = outcome?;
        if let Some(chars) = request.output_tail {
            result.truncate_to_tail(chars);
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// Spawns `cmd`, collects both output streams, and waits for exit.
///
/// The deadline covers the streams as well as the exit, so a background job
/// that keeps a pipe open cannot hold the call past its timeout. The process
/// group is killed when this returns or is dropped, so no member of it
/// outlives the call.
async fn execute(
    mut cmd: std::process::Command,
    program: &str,
    timeout: Duration,
    execution_id: &str,
) -> Result<ExecutionResult> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    process_group::isolate(&mut cmd);

    let mut cmd = Command::from(cmd);
    cmd.kill_on_drop(true);

    let started = Instant::now();
    let mut child = cmd.spawn().map_err(|e| Error::Spawn {
        program: program.to_string(),
        reason: e.to_string(),
    })?;
    let pid = child.id();
    let _group = process_group::GroupGuard::new(pid);

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(Error::Spawn {
            program: program.to_string(),
            reason: "output streams were not captured".to_string(),
        });
    };

    let collected = tokio::time::timeout(timeout, async {
        let (status, stdout, stderr) =
            tokio::join!(child.wait(), read_all(stdout), read_all(stderr));
        Ok::<_, std::io::Error>((status?, stdout?, stderr?))
    })
    .await;

    match collected {
        Ok(Ok((status, stdout, stderr))) => {
            let code = process_group::exit_code(status);
            tracing::info!(
                execution_id = %execution_id,
                code,
                duration_ms = started.elapsed().as_millis() as u64,
                "command finished"
            );
            Ok(ExecutionResult {
                code,
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            })
        }
        Ok(Err(e)) => {
            tracing::error!(execution_id = %execution_id, error = %e, "failed to collect command output");
            terminate(&mut child, pid, execution_id).await;
            Err(Error::Io(e))
        }
        Err(_) => {
            tracing::warn!(
                execution_id = %execution_id,
                timeout_secs = timeout.as_secs(),
                "command timed out, killing process group"
            );
            terminate(&mut child, pid, execution_id).await;
            Err(Error::Timeout(timeout))
        }
    }
}

async fn read_all<R: AsyncRead + Unpin>(mut stream: R) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Kills the child's process group and reaps the child.
async fn terminate(child: &mut tokio::process::Child, pid: Option<u32>, execution_id: &str) {
    if let Some(pid) = pid {
        if let Err(e) = process_group::kill_group(pid) {
            tracing::error!(execution_id = %execution_id, error = %e, "failed to kill process group");
        }
    }

    if let Err(e) = child.kill().await {
        tracing::debug!(execution_id = %execution_id, error = %e, "child already gone");
    }
}
