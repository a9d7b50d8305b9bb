//! Exclusive scratch directories inside the data directory.

use std::path::{Path, PathBuf};

use crate::{
    retry::{retry_on_collision, RetryPolicy},
    PackageError,
};

/// A directory that is exclusively owned by one packaging operation.
///
/// The directory is claimed with an atomic `create_dir`, so two operations can never share it.
/// It is removed recursively when the guard is dropped; use [`StagingDir::close`] to observe
/// removal errors instead of only logging them.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
    removed: bool,
}

impl StagingDir {
    /// Claims `<root>/<name>`, creating `root` first if needed. If the name is taken the call
    /// waits according to `policy` and fails with [`PackageError::ResourceExhausted`] when the
    /// policy gives up.
    pub fn allocate<P>(root: &Path, name: &str, policy: &P) -> Result<Self, PackageError>
    where
        P: RetryPolicy + ?Sized,
    {
        fs_err::create_dir_all(root)?;
        let path = root.join(name);
        retry_on_collision(policy, &path, || fs_err::create_dir(&path))?;
        tracing::debug!("allocated staging directory {}", path.display());
        Ok(Self {
            path,
            removed: false,
        })
    }

    /// The claimed directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the directory and everything in it.
    pub fn close(mut self) -> std::io::Result<()> {
        self.removed = true;
        fs_err::remove_dir_all(&self.path)
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(err) = fs_err::remove_dir_all(&self.path) {
            tracing::warn!("failed to remove staging directory: {err}");
        }
    }
}
