//! Error types for the sandbox gateway.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type for gateway operations.
///
/// Every variant is an expected, request-scoped outcome. None of them should
/// bring the process down; the transport layer turns them into structured
/// error responses.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested path resolves outside the sandbox root.
    #[error("path outside sandbox root: {}", .requested.display())]
    Confinement { requested: PathBuf },

    /// The requested command is empty, unparseable, or not on the allow-list.
    #[error("command rejected: {0}")]
    Policy(#[from] PolicyViolation),

    /// The process did not finish before its deadline and was killed.
    #[error("command timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    /// The requested file does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// IO error during file or workspace operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The process could not be started.
    #[error("failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },

    /// Gateway configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Stable identifier for the error class, suitable for wire responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Confinement { .. } => "confinement",
            Error::Policy(_) => "policy",
            Error::Timeout(_) => "timeout",
            Error::NotFound(_) => "not_found",
            Error::Io(_) => "io",
            Error::Spawn { .. } => "spawn",
            Error::Config(_) => "config",
        }
    }
}

/// Reasons the command policy filter rejects a sub-command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    /// Tokenization produced no words.
    #[error("empty command")]
    Empty,

    /// The command could not be split into shell words.
    #[error("unparseable command: {0}")]
    Unparseable(String),

    /// The leading token is not on the allow-list.
    #[error("sub-command not allowed: {0}")]
    NotAllowed(String),
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;
