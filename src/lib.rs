//! Sandbox Gateway - confined remote execution for external agents
//!
//! This library lets an agent read and write files, run shell commands and
//! invoke a restricted set of git sub-commands, all confined to a single
//! directory subtree. Paths are confined, version-control verbs are
//! allow-listed, and every process runs under a hard timeout.

pub mod config;
pub mod error;
pub mod gateway;
pub mod policy;
pub mod runner;
pub mod sandbox;
pub mod server;

pub use config::{GatewayConfig, Validate, ValidationResult};
pub use error::{Error, PolicyViolation, Result};
pub use gateway::{ExecutionLimits, Gateway, Health, Pong};
pub use policy::{AllowedCommand, CommandPolicy, DEFAULT_ALLOWED_VCS_COMMANDS};
pub use runner::{ExecutionMode, ExecutionRequest, ExecutionResult, LocalRunner, ProcessRunner};
pub use sandbox::{EphemeralWorkspace, SandboxRoot};
