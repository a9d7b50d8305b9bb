#![deny(missing_docs)]

//! Packages a single data file together with a metadata sidecar into a zip archive that is named
//! after the SHA-256 of its own bytes, and unpackages such archives again.
//!
//! The pipeline for [`Packager::package`] is
//!
//! 1. allocate a staging directory named after the file ([`StagingDir`]),
//! 2. copy the file into it and write `<name>.json` next to it ([`write_metadata`]),
//! 3. zip the staging directory ([`compress_directory`]),
//! 4. hash the finished archive and move it to `<data>/<sha256>` ([`address_by_content`]),
//! 5. remove the staging directory, whatever happened in between.
//!
//! [`Unpackager::unpackage`] reverses this: the payload lands in the data directory under its
//! original name and the sidecar is written to the metadata directory.
//!
//! Concurrent operations coordinate only through the filesystem. A staging directory or payload
//! file that already exists is a collision; collisions are retried according to a
//! [`RetryPolicy`] and turn into a `ResourceExhausted` error once the policy gives up.

use std::path::PathBuf;

pub mod cas;
pub mod metadata;
pub mod package;
pub mod read;
pub mod retry;
pub mod staging;
pub mod write;

pub use cas::{address_by_content, verify_content_address, ContentAddress};
pub use metadata::{write_metadata, DataFileMetadata, METADATA_SUFFIX};
pub use package::{PackagedFile, Packager};
pub use read::{read_metadata, UnpackagedFile, Unpackager};
pub use retry::{
    retry_on_collision, CollisionError, FixedIntervalRetry, RetryDecision, RetryPolicy,
};
pub use staging::StagingDir;
pub use write::compress_directory;

/// An error that can occur while packaging a file.
#[derive(thiserror::Error, Debug)]
pub enum PackageError {
    /// The staging directory name stayed taken for the whole retry budget.
    #[error("'{}' is still in use after {retries} retries", .path.display())]
    ResourceExhausted {
        /// The contested path.
        path: PathBuf,
        /// How many retries were made after the first attempt.
        retries: u32,
    },

    /// A filesystem operation failed.
    #[error("an io error occurred")]
    IoError(#[from] std::io::Error),

    /// The archive could not be written.
    #[error("failed to write the archive")]
    ZipError(#[from] zip::result::ZipError),

    /// The metadata record could not be serialized.
    #[error("failed to serialize the metadata record")]
    MetadataError(#[from] serde_json::Error),

    /// The source path has no usable file name.
    #[error("'{}' does not name a file with a valid UTF-8 name", .0.display())]
    InvalidSourcePath(PathBuf),
}

impl From<CollisionError> for PackageError {
    fn from(err: CollisionError) -> Self {
        match err {
            CollisionError::Exhausted { path, retries } => {
                PackageError::ResourceExhausted { path, retries }
            }
            CollisionError::Io(err) => PackageError::IoError(err),
        }
    }
}

/// An error that can occur while unpackaging an archive.
#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    /// The payload destination stayed taken for the whole retry budget.
    #[error("'{}' is still in use after {retries} retries", .path.display())]
    ResourceExhausted {
        /// The contested path.
        path: PathBuf,
        /// How many retries were made after the first attempt.
        retries: u32,
    },

    /// A filesystem operation failed.
    #[error("an io error occurred")]
    IoError(#[from] std::io::Error),

    /// The archive is not a valid zip file.
    #[error("invalid zip archive")]
    ZipError(#[from] zip::result::ZipError),

    /// The metadata record could not be parsed.
    #[error("failed to parse the metadata record")]
    MetadataError(#[from] serde_json::Error),

    /// The archive does not contain a payload entry.
    #[error("the archive does not contain a payload")]
    MissingPayload,

    /// The archive does not contain a metadata entry.
    #[error("the archive does not contain a metadata record")]
    MissingMetadata,

    /// An entry would be written outside of its destination directory.
    #[error("refusing to extract entry '{0}' outside of the destination")]
    UnsafeEntryName(String),
}

impl From<CollisionError> for ExtractError {
    fn from(err: CollisionError) -> Self {
        match err {
            CollisionError::Exhausted { path, retries } => {
                ExtractError::ResourceExhausted { path, retries }
            }
            CollisionError::Io(err) => ExtractError::IoError(err),
        }
    }
}
