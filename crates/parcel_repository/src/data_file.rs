//! A snapshot of a single file in the data directory.

use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use parcel_package::{read_metadata, DataFileMetadata};

use crate::RepositoryError;

/// Suffix of files that are still being received. Appended after a `.`, so these names do not
/// match agents that append `dhincomplete` directly to the file name.
pub const INCOMPLETE_SUFFIX: &str = "incomplete";

/// A file in the data directory: usually a packaged archive, or a partial one while it is being
/// transferred.
///
/// The size and modification time are captured when the file is listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFile {
    path: PathBuf,
    name: String,
    len: u64,
    modified: SystemTime,
}

impl DataFile {
    /// Reads the size and modification time of the file at `path`.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();
        let stat = fs_err::metadata(&path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            len: stat.len(),
            modified: stat.modified()?,
            name,
            path,
        })
    }

    /// The location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file name. For packaged archives this is the SHA-256 of the content.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The size in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns true if the file is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The last modification time.
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    /// Returns false while the file is still being received.
    pub fn is_complete(&self) -> bool {
        !self.name.ends_with(INCOMPLETE_SUFFIX)
    }

    /// The name the receiving side uses while this file is in transit, `<name>.incomplete`.
    pub fn remote_incomplete_name(&self) -> String {
        format!("{}.{INCOMPLETE_SUFFIX}", self.name)
    }

    /// Reads the sidecar stored in the archive.
    pub fn metadata(&self) -> Result<DataFileMetadata, RepositoryError> {
        Ok(read_metadata(&self.path)?)
    }

    /// When the payload was packaged, or `None` if the sidecar cannot be read.
    pub fn creation_timestamp(&self) -> Option<i64> {
        self.metadata_or_log().map(|m| m.creation_timestamp)
    }

    /// The node that packaged the payload, or `None` if the sidecar cannot be read.
    pub fn origin_id(&self) -> Option<String> {
        self.metadata_or_log().map(|m| m.origin_id)
    }

    /// The name the payload had before it was packaged, or `None` if the sidecar cannot be read.
    pub fn original_file_name(&self) -> Option<String> {
        self.metadata_or_log().map(|m| m.file_name)
    }

    fn metadata_or_log(&self) -> Option<DataFileMetadata> {
        match self.metadata() {
            Ok(metadata) => Some(metadata),
            Err(err) => {
                tracing::debug!("cannot read the metadata of {}: {err}", self.path.display());
                None
            }
        }
    }
}
