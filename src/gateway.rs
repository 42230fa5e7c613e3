//! Mediation API.
//!
//! [`Gateway`] is the single entry point the transport layer calls into. It
//! confines paths, filters version-control verbs and hands permitted
//! commands to a [`ProcessRunner`]. Rejections always happen before any file
//! is touched or any process is started.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::policy::CommandPolicy;
use crate::runner::{ExecutionRequest, ExecutionResult, LocalRunner, ProcessRunner};
use crate::sandbox::SandboxRoot;

/// Execution limits and programs used by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Shell for shell-mode commands.
    pub shell_program: String,
    /// Version-control program.
    pub vcs_program: String,
    /// Deadline for shell commands.
    pub shell_timeout: Duration,
    /// Deadline for version-control commands.
    pub vcs_timeout: Duration,
    /// Trailing characters kept from version-control output streams.
    pub output_tail_chars: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self::from(&GatewayConfig::default())
    }
}

impl From<&GatewayConfig> for ExecutionLimits {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            shell_program: config.shell_program.clone(),
            vcs_program: config.vcs_program.clone(),
            shell_timeout: config.shell_timeout(),
            vcs_timeout: config.vcs_timeout(),
            output_tail_chars: config.output_tail_chars,
        }
    }
}

/// Liveness marker returned by ping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {
    pub pong: String,
}

/// Liveness marker returned by the health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
}

/// Confined file and command mediation.
pub struct Gateway<R: ProcessRunner = LocalRunner> {
    root: SandboxRoot,
    policy: CommandPolicy,
    limits: ExecutionLimits,
    runner: R,
}

impl Gateway<LocalRunner> {
    /// Builds a gateway running processes locally, as described by `config`.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let root = SandboxRoot::new(&config.sandbox_root)?;
        Ok(Self::new(
            root,
            config.command_policy(),
            ExecutionLimits::from(config),
            LocalRunner::new(),
        ))
    }
}

impl<R: ProcessRunner> Gateway<R> {
    /// Creates a gateway from its parts.
    pub fn new(root: SandboxRoot, policy: CommandPolicy, limits: ExecutionLimits, runner: R) -> Self {
        Self {
            root,
            policy,
            limits,
            runner,
        }
    }

    /// Returns the sandbox root.
    pub fn root(&self) -> &SandboxRoot {
        &self.root
    }

    /// Returns the version-control command policy.
    pub fn policy(&self) -> &CommandPolicy {
        &self.policy
    }

    /// Returns the execution limits.
    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Returns the process runner.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Ping liveness marker.
    pub fn ping(&self) -> Pong {
        Pong {
            pong: "ok".to_string(),
        }
    }

    /// Health probe liveness marker.
    pub fn health(&self) -> Health {
        Health {
            status: "alive".to_string(),
        }
    }

    /// Returns `message` unchanged.
    pub fn echo(&self, message: String) -> String {
        message
    }

    /// Reads a confined file as text.
    pub async fn read_file(&self, rel_path: &str) -> Result<String> {
        let path = self.root.confine(rel_path)?;

        tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(Path::new(rel_path).to_path_buf())
            } else {
                Error::Io(e)
            }
        })
    }

    /// Writes `content` to a confined file, creating parent directories and
    /// overwriting any existing file. Returns the number of bytes written.
    pub async fn write_file(&self, rel_path: &str, content: &str) -> Result<usize> {
        let path = self.root.confine(rel_path)?;
        if path == self.root.path() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "cannot write to the sandbox root itself",
            )));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;

        tracing::info!(path = %rel_path, bytes = content.len(), "wrote file");
        Ok(content.len())
    }

    /// Runs an arbitrary shell command in a disposable workspace.
    ///
    /// The command text is neither filtered nor confined to the sandbox root;
    /// containment is the ephemeral working directory plus the timeout.
    pub async fn run_shell(&self, command: &str) -> Result<ExecutionResult> {
        let request = ExecutionRequest::shell(
            &self.limits.shell_program,
            command,
            self.limits.shell_timeout,
        );
        self.runner.run(request).await
    }

    /// Runs an allowed version-control sub-command inside a confined
    /// repository directory.
    pub async fn run_vcs(&self, rel_repo: &str, sub_command: &str) -> Result<ExecutionResult> {
        let repo = self.root.confine(rel_repo)?;

        let command = self.policy.check(sub_command).map_err(|violation| {
            tracing::warn!(repo = %rel_repo, reason = %violation, "version-control command rejected");
            Error::Policy(violation)
        })?;

        if !repo.is_dir() {
            return Err(Error::NotFound(Path::new(rel_repo).to_path_buf()));
        }

        let request = ExecutionRequest::argv(
            &self.limits.vcs_program,
            command.into_words(),
            repo,
            self.limits.vcs_timeout,
        )
        .with_output_tail(self.limits.output_tail_chars);
        self.runner.run(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolicyViolation;
    use crate::runner::ExecutionMode;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records requests instead of running them.
    #[derive(Default)]
    struct RecordingRunner {
        requests: Mutex<Vec<ExecutionRequest>>,
    }

    impl RecordingRunner {
        fn requests(&self) -> Vec<ExecutionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProcessRunner for RecordingRunner {
        async fn run(&self, request: ExecutionRequest) -> Result<ExecutionResult> {
            self.requests.lock().unwrap().push(request);
            Ok(ExecutionResult {
                code: 0,
                stdout: String::new(),
                stderr: String::new(),
            })
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn recording_gateway() -> (TempDir, Gateway<RecordingRunner>) {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let root_dir = temp_dir.path().join("root");
        std::fs::create_dir(&root_dir).unwrap();
        std::fs::create_dir(root_dir.join("repo")).unwrap();

        let gateway = Gateway::new(
            SandboxRoot::new(&root_dir).unwrap(),
            CommandPolicy::default(),
            ExecutionLimits::default(),
            RecordingRunner::default(),
        );
        (temp_dir, gateway)
    }

    #[test]
    fn liveness_markers() {
        let (_temp, gateway) = recording_gateway();
        assert_eq!(gateway.ping().pong, "ok");
        assert_eq!(gateway.health().status, "alive");
        assert_eq!(gateway.echo("hi there".to_string()), "hi there");
    }

    #[test]
    fn default_limits_match_defaults() {
        let limits = ExecutionLimits::default();
        assert_eq!(limits.shell_timeout, Duration::from_secs(30));
        assert_eq!(limits.vcs_timeout, Duration::from_secs(20));
        assert_eq!(limits.output_tail_chars, 4000);
        assert_eq!(limits.vcs_program, "git");
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let (_temp, gateway) = recording_gateway();
        let content = "line one\nline two ünïcode\n";

        let bytes = gateway.write_file("notes/today.md", content).await.unwrap();
        assert_eq!(bytes, content.len());

        let read = gateway.read_file("notes/today.md").await.unwrap();
        assert_eq!(read, content);
    }

    #[tokio::test]
    async fn write_overwrites_existing_file() {
        let (_temp, gateway) = recording_gateway();
        gateway.write_file("a.txt", "first version").await.unwrap();
        gateway.write_file("a.txt", "second").await.unwrap();

        assert_eq!(gateway.read_file("a.txt").await.unwrap(), "second");
    }

    #[tokio::test]
    async fn read_missing_file_is_not_found() {
        let (_temp, gateway) = recording_gateway();
        let err = gateway.read_file("nope.txt").await.unwrap_err();

        assert!(matches!(err, Error::NotFound(ref p) if p == Path::new("nope.txt")));
    }

    #[tokio::test]
    async fn read_directory_is_io_error() {
        let (_temp, gateway) = recording_gateway();
        let err = gateway.read_file("repo").await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn write_to_root_itself_is_rejected() {
        let (_temp, gateway) = recording_gateway();

        for rel_path in ["", ".", "repo/.."] {
            let err = gateway.write_file(rel_path, "data").await.unwrap_err();
            assert!(
                matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::InvalidInput),
                "unexpected error for {:?}: {}",
                rel_path,
                err
            );
        }
    }

    #[tokio::test]
    async fn escaping_reads_and_writes_are_rejected_without_io() {
        let (temp_dir, gateway) = recording_gateway();
        std::fs::write(temp_dir.path().join("secret.txt"), "secret").unwrap();

        let err = gateway.read_file("../secret.txt").await.unwrap_err();
        assert!(matches!(err, Error::Confinement { .. }));

        let err = gateway
            .write_file("../escaped/file.txt", "data")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Confinement { .. }));
        assert!(!temp_dir.path().join("escaped").exists());
    }

    #[tokio::test]
    async fn allowed_vcs_command_builds_argv_request() {
        let (_temp, gateway) = recording_gateway();

        gateway
            .run_vcs("repo", "commit -m 'initial import'")
            .await
            .unwrap();

        let requests = gateway.runner().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].timeout, Duration::from_secs(20));
        assert_eq!(requests[0].output_tail, Some(4000));
        assert_eq!(
            requests[0].mode,
            ExecutionMode::Argv {
                program: "git".to_string(),
                args: vec![
                    "commit".to_string(),
                    "-m".to_string(),
                    "initial import".to_string()
                ],
                working_dir: gateway.root().path().join("repo"),
            }
        );
    }

    #[tokio::test]
    async fn disallowed_vcs_command_spawns_nothing() {
        let (_temp, gateway) = recording_gateway();

        for sub_command in ["rm -rf /", "checkout -f", "", "commit -m 'open"] {
            let err = gateway.run_vcs("repo", sub_command).await.unwrap_err();
            assert!(matches!(err, Error::Policy(_)), "{:?}", sub_command);
        }

        let err = gateway.run_vcs("repo", "checkout -f").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Policy(PolicyViolation::NotAllowed(ref verb)) if verb == "checkout"
        ));
        assert!(gateway.runner().requests().is_empty());
    }

    #[tokio::test]
    async fn escaping_repo_path_spawns_nothing() {
        let (_temp, gateway) = recording_gateway();

        let err = gateway.run_vcs("../..", "status").await.unwrap_err();
        assert!(matches!(err, Error::Confinement { .. }));
        assert!(gateway.runner().requests().is_empty());
    }

    #[tokio::test]
    async fn confinement_is_checked_before_policy() {
        let (_temp, gateway) = recording_gateway();

        let err = gateway.run_vcs("../outside", "rm -rf /").await.unwrap_err();
        assert!(matches!(err, Error::Confinement { .. }));
    }

    #[tokio::test]
    async fn missing_repo_directory_is_not_found() {
        let (_temp, gateway) = recording_gateway();

        let err = gateway.run_vcs("no-such-repo", "status").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(gateway.runner().requests().is_empty());
    }

    #[tokio::test]
    async fn shell_command_is_passed_through_unfiltered() {
        let (_temp, gateway) = recording_gateway();

        gateway.run_shell("rm -rf / ; cat ../../etc/passwd").await.unwrap();

        let requests = gateway.runner().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].timeout, Duration::from_secs(30));
        assert_eq!(requests[0].output_tail, None);
        assert_eq!(
            requests[0].mode,
            ExecutionMode::Shell {
                program: "sh".to_string(),
                command: "rm -rf / ; cat ../../etc/passwd".to_string(),
            }
        );
    }
}
