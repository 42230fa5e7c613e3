//! Process execution for shell and version-control commands.
//!
//! [`ProcessRunner`] is the seam between the mediation layer and the OS.
//! [`LocalRunner`] runs processes on the local machine with a hard timeout,
//! killing the whole process group on expiry.

mod local;
mod output;
mod process_group;

pub use local::LocalRunner;
pub use output::tail_chars;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How a process is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    /// `program -c command` inside a fresh ephemeral workspace.
    Shell { program: String, command: String },
    /// `program args...` executed directly (no shell) in `working_dir`.
    Argv {
        program: String,
        args: Vec<String>,
        working_dir: PathBuf,
    },
}

/// A single process execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Invocation mode.
    pub mode: ExecutionMode,
    /// Hard wall-clock limit.
    pub timeout: Duration,
    /// Keep only this many trailing characters of each output stream.
    pub output_tail: Option<usize>,
}

impl ExecutionRequest {
    /// Creates a shell-mode request.
    pub fn shell(program: impl Into<String>, command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            mode: ExecutionMode::Shell {
                program: program.into(),
                command: command.into(),
            },
            timeout,
            output_tail: None,
        }
    }

    /// Creates an argument-vector request.
    pub fn argv(
        program: impl Into<String>,
        args: Vec<String>,
        working_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            mode: ExecutionMode::Argv {
                program: program.into(),
                args,
                working_dir: working_dir.into(),
            },
            timeout,
            output_tail: None,
        }
    }

    /// Truncates each output stream to its trailing `chars` characters.
    pub fn with_output_tail(mut self, chars: usize) -> Self {
        self.output_tail = Some(chars);
        self
    }

    /// Returns the program that will be started.
    pub fn program(&self) -> &str {
        match &self.mode {
            ExecutionMode::Shell { program, .. } | ExecutionMode::Argv { program, .. } => program,
        }
    }
}

/// Outcome of a process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Exit code; `-N` when the process was killed by signal `N`.
    pub code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ExecutionResult {
    /// Returns whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Keeps only the trailing `chars` characters of each stream.
    pub fn truncate_to_tail(&mut self, chars: usize) {
        self.stdout = tail_chars(&self.stdout, chars).to_string();
        self.stderr = tail_chars(&self.stderr, chars).to_string();
    }
}

/// Trait for process runners.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs the request to completion or until its timeout expires.
    ///
    /// A non-zero exit code is reported in the result, not as an error.
    async fn run(&self, request: ExecutionRequest) -> Result<ExecutionResult>;

    /// Returns the name of this runner.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_request_has_no_tail_by_default() {
        let request = ExecutionRequest::shell("sh", "echo hi", Duration::from_secs(30));
        assert_eq!(request.output_tail, None);
        assert_eq!(request.program(), "sh");
        assert_eq!(request.timeout, Duration::from_secs(30));
    }

    #[test]
    fn argv_request_builder_sets_tail() {
        let request = ExecutionRequest::argv(
            "git",
            vec!["status".to_string()],
            "/tmp/repo",
            Duration::from_secs(20),
        )
        .with_output_tail(4000);

        assert_eq!(request.output_tail, Some(4000));
        assert_eq!(request.program(), "git");
        assert_eq!(
            request.mode,
            ExecutionMode::Argv {
                program: "git".to_string(),
                args: vec!["status".to_string()],
                working_dir: PathBuf::from("/tmp/repo"),
            }
        );
    }

    #[test]
    fn execution_result_truncates_both_streams() {
        let mut result = ExecutionResult {
            code: 1,
            stdout: "abcdef".to_string(),
            stderr: "uvwxyz".to_string(),
        };
        result.truncate_to_tail(2);

        assert_eq!(result.stdout, "ef");
        assert_eq!(result.stderr, "yz");
        assert!(!result.success());
    }

    #[test]
    fn execution_result_serializes_with_wire_names() {
        let result = ExecutionResult {
            code: 0,
            stdout: "out".to_string(),
            stderr: String::new(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, serde_json::json!({"code": 0, "stdout": "out", "stderr": ""}));
    }
}
