//! Sandbox root and path confinement.

use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Maximum number of symlinks followed while resolving a single path.
const MAX_SYMLINK_HOPS: usize = 40;

/// The directory subtree every file operation is confined to.
///
/// The root is canonicalized once at construction and never changes
/// afterwards, so it can be shared freely between concurrent requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxRoot {
    path: PathBuf,
}

impl SandboxRoot {
    /// Creates a sandbox root from an existing directory.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let canonical = fs::canonicalize(path).map_err(|e| {
            Error::Config(format!(
                "cannot resolve sandbox root {}: {}",
                path.display(),
                e
            ))
        })?;

        if !canonical.is_dir() {
            return Err(Error::Config(format!(
                "sandbox root {} is not a directory",
                canonical.display()
            )));
        }

        Ok(Self { path: canonical })
    }

    /// Returns the canonical root path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves `requested` against the root and rejects anything that
    /// lands outside of it.
    ///
    /// Symlinks are followed (dangling ones included) and `.`/`..` are
    /// eliminated. Components that do not exist yet are kept as-is, so the
    /// result can name a file that is about to be created.
    pub fn confine(&self, requested: impl AsRef<Path>) -> Result<PathBuf> {
        let requested = requested.as_ref();
        let reject = || {
            tracing::warn!(requested = ?requested, "path escapes sandbox root");
            Error::Confinement {
                requested: requested.to_path_buf(),
            }
        };

        let Some(resolved) = resolve(&self.path.join(requested)) else {
            return Err(reject());
        };
        if resolved.starts_with(&self.path) {
            Ok(resolved)
        } else {
            Err(reject())
        }
    }
}

enum Step {
    Root,
    Parent,
    Name(OsString),
}

fn steps_of(path: &Path) -> Vec<Step> {
    path.components()
        .filter_map(|component| match component {
            Component::Prefix(_) | Component::RootDir => Some(Step::Root),
            Component::CurDir => None,
            Component::ParentDir => Some(Step::Parent),
            Component::Normal(name) => Some(Step::Name(name.to_os_string())),
        })
        .collect()
}

/// Non-strict canonicalization of an absolute path.
///
/// Returns `None` when the symlink hop budget is exhausted.
fn resolve(path: &Path) -> Option<PathBuf> {
    let mut pending = steps_of(path);
    pending.reverse();

    let mut resolved = PathBuf::from("/");
    let mut hops = 0;

    while let Some(step) = pending.pop() {
        match step {
            Step::Root => resolved = PathBuf::from("/"),
            Step::Parent => {
                resolved.pop();
            }
            Step::Name(name) => {
                let candidate = resolved.join(&name);
                let is_symlink = fs::symlink_metadata(&candidate)
                    .map(|meta| meta.file_type().is_symlink())
                    .unwrap_or(false);

                if !is_symlink {
                    resolved = candidate;
                    continue;
                }

                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return None;
                }

                // Relative targets continue from the link's directory,
                // absolute ones restart at `/`.
                let target = fs::read_link(&candidate).ok()?;
                let mut target_steps = steps_of(&target);
                target_steps.reverse();
                pending.extend(target_steps);
            }
        }
    }

    Some(resolved)
}
