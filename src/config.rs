//! Gateway configuration loading and validation.
//!
//! Configuration comes from a TOML (or YAML) file with serde defaults for
//! every field, and is validated before the gateway starts.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::policy::{CommandPolicy, DEFAULT_ALLOWED_VCS_COMMANDS};

/// Timeouts above this are flagged as a likely misconfiguration.
const LONG_TIMEOUT_SECS: u64 = 600;

/// Process-wide gateway configuration.
///
/// Read once at startup; the gateway never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Directory subtree all file and repository paths are confined to.
    #[serde(default = "default_sandbox_root")]
    pub sandbox_root: PathBuf,

    /// Address the HTTP façade listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Deadline for shell commands, in seconds.
    #[serde(default = "default_shell_timeout_secs")]
    pub shell_timeout_secs: u64,

    /// Deadline for version-control commands, in seconds.
    #[serde(default = "default_vcs_timeout_secs")]
    pub vcs_timeout_secs: u64,

    /// Trailing characters kept from each version-control output stream.
    #[serde(default = "default_output_tail_chars")]
    pub output_tail_chars: usize,

    /// Shell used for shell-mode commands (invoked as `<shell> -c <cmd>`).
    #[serde(default = "default_shell_program")]
    pub shell_program: String,

    /// Version-control program.
    #[serde(default = "default_vcs_program")]
    pub vcs_program: String,

    /// Sub-commands the version-control program may be invoked with.
    #[serde(default = "default_allowed_vcs_commands")]
    pub allowed_vcs_commands: Vec<String>,
}

fn default_sandbox_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_shell_timeout_secs() -> u64 {
    30
}

fn default_vcs_timeout_secs() -> u64 {
    20
}

fn default_output_tail_chars() -> usize {
    4000
}

fn default_shell_program() -> String {
    "sh".to_string()
}

fn default_vcs_program() -> String {
    "git".to_string()
}

fn default_allowed_vcs_commands() -> Vec<String> {
    DEFAULT_ALLOWED_VCS_COMMANDS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            sandbox_root: default_sandbox_root(),
            bind_addr: default_bind_addr(),
            shell_timeout_secs: default_shell_timeout_secs(),
            vcs_timeout_secs: default_vcs_timeout_secs(),
            output_tail_chars: default_output_tail_chars(),
            shell_program: default_shell_program(),
            vcs_program: default_vcs_program(),
            allowed_vcs_commands: default_allowed_vcs_commands(),
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from a file.
    ///
    /// Files ending in `.yaml` or `.yml` are parsed as YAML, everything else
    /// as TOML. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;

        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );

        if is_yaml {
            serde_yaml::from_str(&content)
                .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
        }
    }

    /// Sets the sandbox root.
    pub fn with_sandbox_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sandbox_root = root.into();
        self
    }

    /// Sets the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Returns the shell timeout as a Duration.
    pub fn shell_timeout(&self) -> Duration {
        Duration::from_secs(self.shell_timeout_secs)
    }

    /// Returns the version-control timeout as a Duration.
    pub fn vcs_timeout(&self) -> Duration {
        Duration::from_secs(self.vcs_timeout_secs)
    }

    /// Builds the version-control command policy.
    pub fn command_policy(&self) -> CommandPolicy {
        CommandPolicy::new(self.allowed_vcs_commands.iter().cloned())
    }
}

/// Validation result containing all found issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation errors (fatal).
    pub errors: Vec<String>,
    /// List of validation warnings (non-fatal).
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Adds an error to the result.
    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Adds a warning to the result.
    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Converts to a Result, failing if there are errors.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(Error::Config(self.errors.join("; ")))
        }
    }
}

/// Trait for validatable configuration types.
pub trait Validate {
    /// Validates the configuration and returns any issues found.
    fn validate(&self) -> ValidationResult;
}

impl Validate for GatewayConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.shell_timeout_secs == 0 {
            result.add_error("shell_timeout_secs must be greater than zero");
        }
        if self.vcs_timeout_secs == 0 {
            result.add_error("vcs_timeout_secs must be greater than zero");
        }
        if self.output_tail_chars == 0 {
            result.add_error("output_tail_chars must be greater than zero");
        }
        if self.shell_program.trim().is_empty() {
            result.add_error("shell_program cannot be empty");
        }
        if self.vcs_program.trim().is_empty() {
            result.add_error("vcs_program cannot be empty");
        }

        if self.shell_timeout_secs > LONG_TIMEOUT_SECS || self.vcs_timeout_secs > LONG_TIMEOUT_SECS {
            result.add_warning("timeouts over 10 minutes may indicate a misconfiguration");
        }

        if self.allowed_vcs_commands.is_empty() {
            result.add_warning("allowed_vcs_commands is empty - every version-control call will be rejected");
        }

        for verb in &self.allowed_vcs_commands {
            if !DEFAULT_ALLOWED_VCS_COMMANDS.contains(&verb.as_str()) {
                result.add_warning(format!(
                    "allowed_vcs_commands includes non-default verb '{}'",
                    verb
                ));
            }
        }

        if !self.bind_addr.ip().is_loopback() {
            result.add_warning(format!(
                "bind_addr {} is not loopback - the gateway runs arbitrary shell commands for any client that can reach it",
                self.bind_addr
            ));
        }

        result
    }
}
