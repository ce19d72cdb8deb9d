//! Disposable per-check workspace directories.

use std::path::Path;

use repocheck_state::CheckId;
use tempfile::TempDir;
use tracing::debug;

/// A uniquely named directory holding one check's clone.
///
/// Removed by [`Workspace::release`]; dropping it without releasing also
/// removes it, but silently ignores errors.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create `repo_check_<check id>_<random>` under `root`.
    pub fn acquire(root: &Path, check_id: &CheckId) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("repo_check_{check_id}_"))
            .tempdir_in(root)?;
        debug!(path = %dir.path().display(), "workspace acquired");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory and everything in it.
    pub fn release(self) -> std::io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!(path = %path.display(), "workspace released");
        Ok(())
    }
}
