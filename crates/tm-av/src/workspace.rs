//! Per-request workspace management.
//!
//! A [`RequestWorkspace`] owns one temporary directory for the lifetime of a
//! download request. Paths for downloaded and produced files are minted
//! inside it with [`RequestWorkspace::path_for`], and the whole tree is
//! removed exactly once: either by an explicit [`release`] or, if the handle
//! is dropped first (error return, cancelled future, aborted response body),
//! by its `Drop` impl.
//!
//! Removal failures are logged and swallowed so they never mask the outcome
//! of the request itself.
//!
//! [`release`]: RequestWorkspace::release

use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use tm_core::config::WorkspaceConfig;
use tm_core::RequestId;

/// Exclusively-owned temporary directory for one request.
///
/// # Example
///
/// ```no_run
/// use tm_av::RequestWorkspace;
/// use tm_core::{config::WorkspaceConfig, RequestId};
///
/// let ws = RequestWorkspace::acquire(&WorkspaceConfig::default(), RequestId::new()).unwrap();
/// let video = ws.path_for("video.mp4").unwrap();
/// // ... download into `video` ...
/// ws.release();
/// ```
#[derive(Debug)]
pub struct RequestWorkspace {
    request_id: RequestId,
    path: PathBuf,
    temp_dir: Option<TempDir>,
}

impl RequestWorkspace {
    /// Create a fresh, uniquely-named workspace directory.
    ///
    /// The directory is created under `config.root` (created if missing) or
    /// the system temp dir, and named `<prefix><request-id>-<random>`.
    pub fn acquire(config: &WorkspaceConfig, request_id: RequestId) -> tm_core::Result<Self> {
        let prefix = format!("{}{}-", config.prefix, request_id.short());
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let temp_dir = match config.root {
            Some(ref root) => {
                std::fs::create_dir_all(root).map_err(|e| {
                    tm_core::Error::Internal(format!(
                        "failed to create workspace root {}: {e}",
                        root.display()
                    ))
                })?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| tm_core::Error::Internal(format!("failed to create workspace: {e}")))?;

        let path = temp_dir.path().to_path_buf();
        tracing::debug!(request_id = %request_id, "acquired workspace {}", path.display());

        Ok(Self {
            request_id,
            path,
            temp_dir: Some(temp_dir),
        })
    }

    /// The request this workspace belongs to.
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Path to the workspace directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mint a path for a named file inside the workspace.
    ///
    /// `name` must be a single plain file name; anything that could escape
    /// the workspace (separators, `..`, absolute paths) is rejected.
    pub fn path_for(&self, name: &str) -> tm_core::Result<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.path.join(name)),
            _ => Err(tm_core::Error::InvalidRequest(format!(
                "invalid workspace file name: {name:?}"
            ))),
        }
    }

    /// Recursively remove the workspace.
    ///
    /// Consumes the handle, so removal can only be requested once. Failures
    /// are logged as cleanup errors and otherwise ignored.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(temp_dir) = self.temp_dir.take() else {
            return;
        };

        match temp_dir.close() {
            Ok(()) => {
                tracing::debug!(
                    request_id = %self.request_id,
                    "removed workspace {}",
                    self.path.display()
                );
            }
            Err(e) => {
                let err = tm_core::Error::cleanup(&self.path, e);
                tracing::warn!(request_id = %self.request_id, error = %err, "workspace cleanup failed");
            }
        }
    }
}

impl Drop for RequestWorkspace {
    fn drop(&mut self) {
        self.remove();
    }
}
