#![deny(missing_docs)]

//! A view over the data directory of an agent: which archives are ready to be sent, which ones
//! are still being received, and how much room is left for more.

use std::path::{Path, PathBuf};

use parcel_config::{ParcelConfig, UploadPriority};
use parcel_package::ExtractError;

mod chooser;
mod data_file;
mod storage;

pub use chooser::{
    chooser_for, FileChooser, LargestFileChooser, NewestFileChooser, OldestFileChooser,
    SmallestFileChooser,
};
pub use data_file::{DataFile, INCOMPLETE_SUFFIX};
pub use storage::{has_enough_space, FsSpaceProbe, SpaceProbe, StorageInformation, BUFFER_SPACE};

/// An error that can occur while inspecting the data directory.
#[derive(thiserror::Error, Debug)]
pub enum RepositoryError {
    /// A filesystem operation failed.
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// An archive could not be read.
    #[error(transparent)]
    ExtractError(#[from] ExtractError),
}

/// The files in one data directory.
#[derive(Debug, Clone)]
pub struct DataFileRepository {
    data_dir: PathBuf,
}

impl DataFileRepository {
    /// A repository over `data_dir`. The directory does not have to exist.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// A repository over the data directory of `config`.
    pub fn from_config(config: &ParcelConfig) -> Self {
        Self::new(config.data_dir())
    }

    /// The directory this repository looks at.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Every regular file directly inside the data directory, sorted by name. Directories, such
    /// as the staging directories of packaging operations in progress, are skipped.
    pub fn data_files(&self) -> Result<Vec<DataFile>, RepositoryError> {
        let entries = match fs_err::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            match DataFile::from_path(entry.path()) {
                Ok(file) => files.push(file),
                // Removed between listing and reading.
                Err(RepositoryError::IoError(err))
                    if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
        }
        files.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(files)
    }

    /// Files that are ready to be sent.
    pub fn complete_files(&self) -> Result<Vec<DataFile>, RepositoryError> {
        Ok(self
            .data_files()?
            .into_iter()
            .filter(DataFile::is_complete)
            .collect())
    }

    /// Files that are still being received.
    pub fn incomplete_files(&self) -> Result<Vec<DataFile>, RepositoryError> {
        Ok(self
            .data_files()?
            .into_iter()
            .filter(|file| !file.is_complete())
            .collect())
    }

    /// Returns true if at least one file is ready to be sent.
    pub fn has_files_to_send(&self) -> Result<bool, RepositoryError> {
        let found = self.data_files()?.iter().find(|file| file.is_complete()).cloned();
        if let Some(file) = &found {
            tracing::info!("there is a file to send: {}", file.name());
        }
        Ok(found.is_some())
    }

    /// The first file whose name starts with `file_id`. This finds a file both while it is
    /// complete and while it still carries the incomplete suffix.
    pub fn retrieve(&self, file_id: &str) -> Result<Option<DataFile>, RepositoryError> {
        Ok(self
            .data_files()?
            .into_iter()
            .find(|file| file.name().starts_with(file_id)))
    }

    /// Total size of all files.
    pub fn data_files_size(&self) -> Result<u64, RepositoryError> {
        Ok(self.data_files()?.iter().map(DataFile::len).sum())
    }

    /// Total size of the files that are still being received.
    pub fn incomplete_files_size(&self) -> Result<u64, RepositoryError> {
        Ok(self.incomplete_files()?.iter().map(DataFile::len).sum())
    }

    /// Complete files strictly smaller than `max_size`.
    pub fn complete_files_smaller_than(
        &self,
        max_size: u64,
    ) -> Result<Vec<DataFile>, RepositoryError> {
        Ok(self
            .complete_files()?
            .into_iter()
            .filter(|file| file.len() < max_size)
            .collect())
    }

    /// Picks the next file to send among the complete files smaller than `max_size`, in the
    /// order `priority` asks for.
    pub fn select_next_for_transfer(
        &self,
        max_size: u64,
        priority: UploadPriority,
    ) -> Result<Option<DataFile>, RepositoryError> {
        let candidates = self.complete_files_smaller_than(max_size)?;
        tracing::debug!(
            "{} candidate(s) below {max_size} bytes, choosing {priority}",
            candidates.len()
        );
        let chosen = chooser_for(priority).choose(&candidates).cloned();
        if let Some(file) = &chosen {
            tracing::info!("chosen file: {}", file.name());
        }
        Ok(chosen)
    }

    /// Deletes incomplete files, least recently modified first, until `needed` bytes fit next to
    /// the buffer. The file whose name starts with `file_id` is the one about to be received and
    /// is never deleted.
    ///
    /// Returns whether there is enough space in the end. A file that cannot be deleted is an
    /// error.
    pub fn delete_incomplete_files_for_space(
        &self,
        file_id: &str,
        needed: u64,
        probe: &impl SpaceProbe,
    ) -> Result<bool, RepositoryError> {
        if has_enough_space(probe, &self.data_dir, needed)? {
            return Ok(true);
        }

        let mut incomplete = self.incomplete_files()?;
        incomplete.sort_by_key(DataFile::modified);

        for file in incomplete {
            if file.name().starts_with(file_id) {
                continue;
            }
            fs_err::remove_file(file.path())?;
            tracing::debug!("deleted incomplete file {}", file.name());
            if has_enough_space(probe, &self.data_dir, needed)? {
                return Ok(true);
            }
        }

        tracing::warn!("not enough space for {needed} bytes after deleting incomplete files");
        Ok(false)
    }

    /// The space situation of the filesystem holding the data directory.
    pub fn storage_information(
        &self,
        probe: &impl SpaceProbe,
    ) -> Result<StorageInformation, RepositoryError> {
        Ok(StorageInformation {
            total_space: probe.total_space(&self.data_dir)?,
            free_space: probe.free_space(&self.data_dir)?,
            incomplete_files_space: self.incomplete_files_size()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::ScriptedProbe;
    use filetime::FileTime;

    fn write(dir: &Path, name: &str, len: usize, mtime: i64) {
        let path = dir.join(name);
        fs_err::write(&path, vec![1u8; len]).unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
    }

    fn names(files: &[DataFile]) -> Vec<&str> {
        files.iter().map(DataFile::name).collect()
    }

    fn populated() -> (tempfile::TempDir, DataFileRepository) {
        let tmp = tempfile::tempdir().unwrap();
        let data = tmp.path().join("data");
        fs_err::create_dir_all(data.join("staging-dir")).unwrap();
        write(&data, "aaaa", 10, 1_000);
        write(&data, "bbbb", 30, 2_000);
        write(&data, "cccc.incomplete", 40, 3_000);
        write(&data, "dddd.incomplete", 50, 1_500);
        (tmp, DataFileRepository::new(data))
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let repository = DataFileRepository::new(tmp.path().join("nothing"));
        assert!(repository.data_files().unwrap().is_empty());
        assert!(!repository.has_files_to_send().unwrap());
        assert_eq!(repository.data_files_size().unwrap(), 0);
    }

    #[test]
    fn test_listing() {
        let (_tmp, repository) = populated();
        assert_eq!(
            names(&repository.data_files().unwrap()),
            vec!["aaaa", "bbbb", "cccc.incomplete", "dddd.incomplete"]
        );
        assert_eq!(names(&repository.complete_files().unwrap()), vec!["aaaa", "bbbb"]);
        assert_eq!(
            names(&repository.incomplete_files().unwrap()),
            vec!["cccc.incomplete", "dddd.incomplete"]
        );
        assert!(repository.has_files_to_send().unwrap());
        assert_eq!(repository.data_files_size().unwrap(), 130);
        assert_eq!(repository.incomplete_files_size().unwrap(), 90);
    }

    #[test]
    fn test_only_incomplete_files_means_nothing_to_send() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "x.incomplete", 1, 1);
        assert!(!DataFileRepository::new(tmp.path()).has_files_to_send().unwrap());
    }

    #[test]
    fn test_retrieve_by_prefix() {
        let (_tmp, repository) = populated();
        assert_eq!(
            repository.retrieve("cccc").unwrap().map(|f| f.name().to_owned()),
            Some("cccc.incomplete".to_owned())
        );
        assert_eq!(
            repository.retrieve("bbbb").unwrap().map(|f| f.name().to_owned()),
            Some("bbbb".to_owned())
        );
        assert!(repository.retrieve("zzzz").unwrap().is_none());
    }

    #[test]
    fn test_complete_files_smaller_than_is_strict() {
        let (_tmp, repository) = populated();
        assert_eq!(names(&repository.complete_files_smaller_than(30).unwrap()), vec!["aaaa"]);
        assert_eq!(
            names(&repository.complete_files_smaller_than(31).unwrap()),
            vec!["aaaa", "bbbb"]
        );
        assert!(repository.complete_files_smaller_than(10).unwrap().is_empty());
    }

    #[test]
    fn test_select_next_for_transfer() {
        let (_tmp, repository) = populated();
        let pick = |max, priority| {
            repository
                .select_next_for_transfer(max, priority)
                .unwrap()
                .map(|f| f.name().to_owned())
        };
        assert_eq!(pick(1_000, UploadPriority::SmallestFirst).as_deref(), Some("aaaa"));
        assert_eq!(pick(1_000, UploadPriority::LargestFirst).as_deref(), Some("bbbb"));
        assert_eq!(pick(20, UploadPriority::LargestFirst).as_deref(), Some("aaaa"));
        assert_eq!(pick(5, UploadPriority::SmallestFirst), None);
    }

    #[test]
    fn test_delete_oldest_incomplete_first() {
        let (_tmp, repository) = populated();
        // Not enough before, enough after the first deletion.
        let probe = ScriptedProbe::new(u64::MAX, [0, BUFFER_SPACE + 100]);

        let freed = repository
            .delete_incomplete_files_for_space("eeee", 100, &probe)
            .unwrap();

        assert!(freed);
        assert_eq!(
            names(&repository.incomplete_files().unwrap()),
            vec!["cccc.incomplete"]
        );
    }

    #[test]
    fn test_delete_skips_the_file_being_received() {
        let (_tmp, repository) = populated();
        let probe = ScriptedProbe::new(u64::MAX, [0]);

        let freed = repository
            .delete_incomplete_files_for_space("dddd", 100, &probe)
            .unwrap();

        assert!(!freed);
        assert_eq!(
            names(&repository.incomplete_files().unwrap()),
            vec!["dddd.incomplete"]
        );
        assert_eq!(names(&repository.complete_files().unwrap()), vec!["aaaa", "bbbb"]);
    }

    #[test]
    fn test_delete_nothing_when_space_suffices() {
        let (_tmp, repository) = populated();
        let probe = ScriptedProbe::new(u64::MAX, [u64::MAX]);
        assert!(repository
            .delete_incomplete_files_for_space("eeee", 100, &probe)
            .unwrap());
        assert_eq!(repository.incomplete_files().unwrap().len(), 2);
    }

    #[test]
    fn test_storage_information() {
        let (_tmp, repository) = populated();
        let probe = ScriptedProbe::new(1_000_000, [400_000]);
        assert_eq!(
            repository.storage_information(&probe).unwrap(),
            StorageInformation {
                total_space: 1_000_000,
                free_space: 400_000,
                incomplete_files_space: 90,
            }
        );
    }

    #[test]
    fn test_from_config() {
        let config = ParcelConfig::new("/agent", "node");
        assert_eq!(
            DataFileRepository::from_config(&config).data_dir(),
            Path::new("/agent/data")
        );
    }
}
