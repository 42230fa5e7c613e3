//! Ephemeral working directories for shell execution.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::Result;

/// Prefix for ephemeral workspace directory names.
const WORKSPACE_PREFIX: &str = "sandbox-gateway-";

/// A freshly created, private working directory that is removed on cleanup.
///
/// Each shell invocation gets its own workspace. The directory is removed
/// when [`EphemeralWorkspace::cleanup`] is called or, failing that, when the
/// workspace is dropped.
pub struct EphemeralWorkspace {
    /// Path to the workspace directory.
    path: PathBuf,
    /// Backing temp directory; `None` once cleaned up.
    dir: Option<TempDir>,
}

impl EphemeralWorkspace {
    /// Creates a new workspace under the system temp directory.
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir()?;
        let path = dir.path().to_path_buf();

        tracing::debug!(path = ?path, "created ephemeral workspace");

        Ok(Self {
            path,
            dir: Some(dir),
        })
    }

    /// Returns the workspace directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the workspace and everything in it.
    pub fn cleanup(&mut self) -> Result<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };

        dir.close()?;
        tracing::debug!(path = ?self.path, "removed ephemeral workspace");
        Ok(())
    }
}

impl Drop for EphemeralWorkspace {
    fn drop(&mut self) {
        if self.dir.is_some() {
            if let Err(e) = self.cleanup() {
                tracing::error!(error = %e, path = ?self.path, "failed to remove workspace on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_creates_private_directory() {
        let mut workspace = EphemeralWorkspace::create().expect("failed to create workspace");

        assert!(workspace.path().is_dir());
        let name = workspace.path().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with(WORKSPACE_PREFIX));

        workspace.cleanup().unwrap();
    }

    #[test]
    fn workspaces_are_distinct() {
        let first = EphemeralWorkspace::create().unwrap();
        let second = EphemeralWorkspace::create().unwrap();
        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn cleanup_removes_directory_and_contents() {
        let mut workspace = EphemeralWorkspace::create().unwrap();
        let path = workspace.path().to_path_buf();
        std::fs::create_dir(path.join("nested")).unwrap();
        std::fs::write(path.join("nested/file.txt"), "data").unwrap();

        workspace.cleanup().expect("cleanup failed");

        assert!(!path.exists());
    }

    #[test]
    fn cleanup_is_idempotent() {
        let mut workspace = EphemeralWorkspace::create().unwrap();
        workspace.cleanup().expect("first cleanup failed");
        workspace
            .cleanup()
            .expect("second cleanup should be idempotent");
    }

    #[test]
    fn drop_removes_directory() {
        let path = {
            let workspace = EphemeralWorkspace::create().unwrap();
            workspace.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
