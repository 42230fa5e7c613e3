//! Sandbox module for confining gateway operations.
//!
//! [`SandboxRoot`] confines file and repository paths to a single directory
//! subtree. [`EphemeralWorkspace`] provides disposable working directories
//! for shell execution.

mod root;
mod workspace;

pub use root::SandboxRoot;
pub use workspace::EphemeralWorkspace;
