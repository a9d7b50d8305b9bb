//! Turning a data file into a content-addressed archive.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use parcel_config::ParcelConfig;
use parcel_digest::Sha256Hash;

use crate::{
    address_by_content, compress_directory, write_metadata, DataFileMetadata, FixedIntervalRetry,
    PackageError, RetryPolicy, StagingDir,
};

/// The result of a successful [`Packager::package`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedFile {
    /// `<data>/<sha256>`
    pub path: PathBuf,
    /// SHA-256 of the archive, the file name of [`Self::path`].
    pub sha256: Sha256Hash,
    /// The sidecar that was stored in the archive.
    pub metadata: DataFileMetadata,
}

/// Packages data files into the data directory of an agent.
#[derive(Clone)]
pub struct Packager {
    data_dir: PathBuf,
    origin_id: String,
    retry_policy: Arc<dyn RetryPolicy + Send + Sync>,
}

impl std::fmt::Debug for Packager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packager")
            .field("data_dir", &self.data_dir)
            .field("origin_id", &self.origin_id)
            .finish_non_exhaustive()
    }
}

impl Packager {
    /// A packager that writes to the data directory of `config` and waits on staging collisions
    /// as configured in its `[retry]` table.
    pub fn new(config: &ParcelConfig) -> Self {
        Self {
            data_dir: config.data_dir(),
            origin_id: config.origin_id().to_owned(),
            retry_policy: Arc::new(FixedIntervalRetry::from(config.retry())),
        }
    }

    /// Replaces the policy used when the staging directory name is taken.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + Send + Sync + 'static) -> Self {
        self.retry_policy = Arc::new(policy);
        self
    }

    /// The directory archives are written to.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Packages the file at `source` together with a freshly written sidecar and stores the
    /// archive under its SHA-256 in the data directory.
    ///
    /// `source` itself is never modified. The staging directory is removed before this returns,
    /// whether packaging succeeded or not.
    pub fn package(&self, source: &Path) -> Result<PackagedFile, PackageError> {
        let name = source
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| PackageError::InvalidSourcePath(source.to_path_buf()))?;

        let staging = StagingDir::allocate(&self.data_dir, name, self.retry_policy.as_ref())?;
        match self.package_in(&staging, source, name) {
            Ok(packaged) => {
                staging.close()?;
                tracing::info!(
                    "packaged {} as {}",
                    source.display(),
                    packaged.path.display()
                );
                Ok(packaged)
            }
            Err(err) => {
                if let Err(close_err) = staging.close() {
                    tracing::warn!("failed to remove staging directory: {close_err}");
                }
                Err(err)
            }
        }
    }

    fn package_in(
        &self,
        staging: &StagingDir,
        source: &Path,
        name: &str,
    ) -> Result<PackagedFile, PackageError> {
        fs_err::copy(source, staging.path().join(name))?;
        let metadata = write_metadata(name, staging.path(), &self.origin_id)?;
        let archive = compress_directory(staging.path())?;
        let address = address_by_content(archive, &self.data_dir)?;
        Ok(PackagedFile {
            path: address.path,
            sha256: address.sha256,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;

    fn packager(root: &Path) -> Packager {
        Packager::new(&ParcelConfig::new(root, "node-1"))
            .with_retry_policy(FixedIntervalRetry::new(2, Duration::from_millis(5)))
    }

    fn data_dir_entries(packager: &Packager) -> Vec<String> {
        let mut names: Vec<String> = fs_err::read_dir(packager.data_dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_package_leaves_only_the_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("hello.txt");
        fs_err::write(&source, b"0123456789").unwrap();
        let packager = packager(&tmp.path().join("agent"));

        let packaged = packager.package(&source).unwrap();

        assert_eq!(packaged.path.parent(), Some(packager.data_dir()));
        assert_eq!(data_dir_entries(&packager), vec![format!("{:x}", packaged.sha256)]);
        assert_eq!(packaged.metadata.file_name, "hello.txt");
        assert_eq!(packaged.metadata.origin_id, "node-1");
        assert_eq!(fs_err::read(&source).unwrap(), b"0123456789");
    }

    #[test]
    fn test_missing_source_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let packager = packager(&tmp.path().join("agent"));

        let result = packager.package(&tmp.path().join("missing.bin"));

        assert_matches!(result, Err(PackageError::IoError(_)));
        assert!(data_dir_entries(&packager).is_empty());
    }

    #[test]
    fn test_directory_source_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("folder");
        fs_err::create_dir(&source).unwrap();
        let packager = packager(&tmp.path().join("agent"));

        let result = packager.package(&source);

        assert_matches!(result, Err(PackageError::IoError(_)));
        assert!(data_dir_entries(&packager).is_empty());
    }

    #[test]
    fn test_source_without_file_name() {
        let tmp = tempfile::tempdir().unwrap();
        let packager = packager(tmp.path());
        assert_matches!(
            packager.package(Path::new("/")),
            Err(PackageError::InvalidSourcePath(_))
        );
        assert_matches!(
            packager.package(Path::new("a/..")),
            Err(PackageError::InvalidSourcePath(_))
        );
    }

    #[test]
    fn test_staging_collision_is_exhausted() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("busy.log");
        fs_err::write(&source, b"busy").unwrap();
        let packager = packager(&tmp.path().join("agent"));
        let foreign = packager.data_dir().join("busy.log");
        fs_err::create_dir_all(&foreign).unwrap();

        let result = packager.package(&source);

        assert_matches!(
            result,
            Err(PackageError::ResourceExhausted { ref path, retries: 2 }) if path == &foreign
        );
        assert!(foreign.is_dir());
        assert_eq!(data_dir_entries(&packager), vec!["busy.log".to_owned()]);
    }

    #[test]
    fn test_same_content_is_deduplicated() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("same.txt");
        fs_err::write(&source, b"same").unwrap();
        let packager = packager(&tmp.path().join("agent"));

        let first = packager.package(&source).unwrap();
        let second = packager.package(&source).unwrap();

        // The timestamp is part of the archive, so identical inputs only share a name when they
        // were packaged within the same millisecond.
        if first.metadata == second.metadata {
            assert_eq!(first.path, second.path);
        } else {
            assert_ne!(first.path, second.path);
        }
        assert!(data_dir_entries(&packager).len() <= 2);
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_package_is_logged() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("logged.txt");
        fs_err::write(&source, b"log me").unwrap();
        packager(tmp.path()).package(&source).unwrap();
        assert!(logs_contain("packaged"));
    }
}
