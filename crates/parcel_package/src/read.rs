//! Extracting payloads and sidecars from archives.

use std::{
    io::{Read, Seek},
    path::{Path, PathBuf},
    sync::Arc,
};

use parcel_config::ParcelConfig;
use parcel_digest::{HashingWriter, Sha256, Sha256Hash};
use zip::ZipArchive;

use crate::{
    metadata::metadata_entry_indices, retry::retry_on_collision, DataFileMetadata, ExtractError,
    FixedIntervalRetry, RetryPolicy,
};

/// The payload written by [`Unpackager::unpackage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackagedFile {
    /// Where the payload was written, `<data>/<original name>`.
    pub path: PathBuf,
    /// SHA-256 of the payload bytes.
    pub sha256: Sha256Hash,
}

/// Unpackages archives into the data and metadata directories of an agent.
#[derive(Clone)]
pub struct Unpackager {
    data_dir: PathBuf,
    metadata_dir: PathBuf,
    retry_policy: Arc<dyn RetryPolicy + Send + Sync>,
}

impl std::fmt::Debug for Unpackager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unpackager")
            .field("data_dir", &self.data_dir)
            .field("metadata_dir", &self.metadata_dir)
            .finish_non_exhaustive()
    }
}

fn entry_names<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<String>, ExtractError> {
    let mut names = Vec::with_capacity(archive.len());
    for idx in 0..archive.len() {
        names.push(archive.by_index(idx)?.name().to_owned());
    }
    Ok(names)
}

impl Unpackager {
    /// An unpackager for the directories of `config`, waiting on payload collisions as
    /// configured in its `[retry]` table.
    pub fn new(config: &ParcelConfig) -> Self {
        Self {
            data_dir: config.data_dir(),
            metadata_dir: config.metadata_dir(),
            retry_policy: Arc::new(FixedIntervalRetry::from(config.retry())),
        }
    }

    /// Replaces the policy used when the payload destination is taken.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + Send + Sync + 'static) -> Self {
        self.retry_policy = Arc::new(policy);
        self
    }

    /// Extracts the archive at `archive_path`.
    ///
    /// Sidecars go to the metadata directory and are skipped if a file of the same name is
    /// already there. Payloads go to the data directory and are never written over an existing
    /// file: the unpackager waits for the name to become free and fails with
    /// [`ExtractError::ResourceExhausted`] if it does not. The archive itself is left in place.
    pub fn unpackage(&self, archive_path: &Path) -> Result<UnpackagedFile, ExtractError> {
        let mut archive = ZipArchive::new(fs_err::File::open(archive_path)?)?;
        let names = entry_names(&mut archive)?;
        let metadata_entries = metadata_entry_indices(&names);

        let mut payload = None;
        for (idx, name) in names.iter().enumerate() {
            let mut entry = archive.by_index(idx)?;
            if entry.is_dir() {
                continue;
            }
            let relative = entry
                .enclosed_name()
                .map(|path| path.to_path_buf())
                .ok_or_else(|| ExtractError::UnsafeEntryName(name.clone()))?;

            if metadata_entries.contains(&idx) {
                self.extract_metadata(&mut entry, &self.metadata_dir.join(relative))?;
            } else {
                payload = Some(self.extract_payload(&mut entry, self.data_dir.join(relative))?);
            }
        }

        let payload = payload.ok_or(ExtractError::MissingPayload)?;
        tracing::info!(
            "unpackaged {} to {}",
            archive_path.display(),
            payload.path.display()
        );
        Ok(payload)
    }

    fn extract_metadata(
        &self,
        entry: &mut impl Read,
        destination: &Path,
    ) -> Result<(), ExtractError> {
        if let Some(parent) = destination.parent() {
            fs_err::create_dir_all(parent)?;
        }
        let mut file = match fs_err::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(destination)
        {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::debug!(
                    "{} already exists, keeping the existing sidecar",
                    destination.display()
                );
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        if let Err(err) = std::io::copy(entry, &mut file) {
            drop(file);
            if let Err(remove_err) = fs_err::remove_file(destination) {
                tracing::warn!("failed to remove partially extracted sidecar: {remove_err}");
            }
            return Err(err.into());
        }
        Ok(())
    }

    fn extract_payload(
        &self,
        entry: &mut impl Read,
        destination: PathBuf,
    ) -> Result<UnpackagedFile, ExtractError> {
        if let Some(parent) = destination.parent() {
            fs_err::create_dir_all(parent)?;
        }
        let file = retry_on_collision(self.retry_policy.as_ref(), &destination, || {
            fs_err::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&destination)
        })?;

        let mut writer = HashingWriter::<_, Sha256>::new(file);
        if let Err(err) = std::io::copy(entry, &mut writer) {
            drop(writer);
            if let Err(remove_err) = fs_err::remove_file(&destination) {
                tracing::warn!("failed to remove partially extracted payload: {remove_err}");
            }
            return Err(err.into());
        }
        let (_, sha256) = writer.finalize();

        Ok(UnpackagedFile {
            path: destination,
            sha256,
        })
    }
}

/// Reads the sidecar of the archive at `archive_path` without extracting anything.
pub fn read_metadata(archive_path: &Path) -> Result<DataFileMetadata, ExtractError> {
    let mut archive = ZipArchive::new(fs_err::File::open(archive_path)?)?;
    let names = entry_names(&mut archive)?;
    let idx = metadata_entry_indices(&names)
        .into_iter()
        .min()
        .ok_or(ExtractError::MissingMetadata)?;
    let entry = archive.by_index(idx)?;
    Ok(serde_json::from_reader(entry)?)
}
