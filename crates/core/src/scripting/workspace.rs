//! Per-job scratch directories.
//!
//! A [`Workspace`] is a uniquely named directory under the configured root
//! that holds exactly one script file plus whatever the engine writes beside
//! it. It is owned by a single job and removed when released or dropped, so
//! cleanup happens on every exit path without the caller repeating it.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// File name the script is written under, regardless of what the client
/// called it.
pub const SCRIPT_FILENAME: &str = "input.tcl";

/// Prefix for workspace directory names.
pub const WORKSPACE_PREFIX: &str = "opensees-job-";

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("failed to create workspace under {}: {source}", root.display())]
    Create {
        root: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write script to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to remove workspace {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Exclusively-owned scratch directory for one job.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a new, empty workspace under `root`.
    ///
    /// `root` is created if missing. Directory creation runs on the blocking
    /// pool.
    pub async fn acquire(root: &Path) -> Result<Self, WorkspaceError> {
        let root = root.to_path_buf();
        let task_root = root.clone();
        let created = tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&task_root)?;
            tempfile::Builder::new()
                .prefix(WORKSPACE_PREFIX)
                .tempdir_in(&task_root)
        })
        .await
        .unwrap_or_else(|e| Err(std::io::Error::other(e)));

        let dir = created.map_err(|source| WorkspaceError::Create { root, source })?;
        tracing::debug!(path = %dir.path().display(), "Workspace acquired");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write the script under [`SCRIPT_FILENAME`] and return its path.
    pub async fn write_script(&self, content: &str) -> Result<PathBuf, WorkspaceError> {
        let path = self.dir.path().join(SCRIPT_FILENAME);
        tokio::fs::write(&path, content.as_bytes())
            .await
            .map_err(|source| WorkspaceError::Write {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Recursively delete the workspace on the blocking pool.
    ///
    /// If the first attempt fails (typically a directory the engine made
    /// read-only), owner write permission is restored throughout the tree and
    /// removal is retried once. Dropping a workspace instead removes it
    /// silently.
    pub async fn release(self) -> Result<(), WorkspaceError> {
        let path = self.dir.path().to_path_buf();
        let dir = self.dir;
        let removed = tokio::task::spawn_blocking(move || {
            let result = remove_tree(dir.path());
            // On failure the TempDir drop makes one last silent attempt.
            drop(dir);
            result
        })
        .await
        .unwrap_or_else(|e| Err(std::io::Error::other(e)));

        removed.map_err(|source| WorkspaceError::Remove {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Workspace released");
        Ok(())
    }
}

fn remove_tree(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Retrying removal with write permission restored");
            restore_write_permission(path);
            std::fs::remove_dir_all(path)
        }
    }
}

/// Best-effort `u+rwx` on every directory in the tree. Symlinks are not
/// followed.
fn restore_write_permission(dir: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let Ok(meta) = std::fs::symlink_metadata(dir) else {
            return;
        };
        if !meta.is_dir() {
            return;
        }
        let mut perms = meta.permissions();
        perms.set_mode(perms.mode() | 0o700);
        let _ = std::fs::set_permissions(dir, perms);

        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                restore_write_permission(&entry.path());
            }
        }
    }

    #[cfg(not(unix))]
    let _ = dir;
}
