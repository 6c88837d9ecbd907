use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScratchError {
    #[error("Failed to create scratch directory under {root:?}: {source}")]
    Create {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to remove scratch directory {path:?}: {source}")]
    Release {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-run temporary directory for intermediate artifacts.
///
/// The directory is removed by `release`, or on drop if the run bails out
/// early. Each run gets its own directory, so concurrent runs never share
/// files.
#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    /// Create a scratch directory under `root`, or the system temp dir
    pub fn acquire(root: Option<&Path>, run_id: &str) -> Result<Self, ScratchError> {
        let root = root.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
        let prefix = format!("techno-enhancer-{}-", run_id);

        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(&root)
            .map_err(|source| ScratchError::Create { root, source })?;

        log::debug!("Acquired scratch directory {:?}", dir.path());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a file inside the scratch directory
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the directory and everything in it, reporting failures
    pub fn release(self) -> Result<(), ScratchError> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|source| ScratchError::Release { path: path.clone(), source })?;
        log::debug!("Released scratch directory {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_removes_contents() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::acquire(Some(root.path()), "test").unwrap();
        let path = scratch.path().to_path_buf();
        std::fs::write(scratch.file("audio.wav"), b"data").unwrap();

        assert!(path.starts_with(root.path()));
        scratch.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchSpace::acquire(Some(root.path()), "drop").unwrap();
            std::fs::write(scratch.file("x.wav"), b"data").unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_runs_are_isolated() {
        let a = ScratchSpace::acquire(None, "same-id").unwrap();
        let b = ScratchSpace::acquire(None, "same-id").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_missing_root_fails() {
        let root = tempfile::tempdir().unwrap();
        let result = ScratchSpace::acquire(Some(&root.path().join("nope")), "x");
        assert!(matches!(result, Err(ScratchError::Create { .. })));
    }
}
