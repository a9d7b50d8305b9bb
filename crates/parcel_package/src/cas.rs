//! Naming finished archives after their content.
//!
//! An archive is hashed only after it has been completely written and then moved to
//! `<root>/<sha256>`. Because the name is a function of the bytes, two archives that land on the
//! same name are identical and the second one is simply discarded.

use std::path::{Path, PathBuf};

use parcel_digest::{compute_file_digest, content_name, parse_digest_from_hex, Sha256, Sha256Hash};
use tempfile::{PathPersistError, TempPath};

use crate::PackageError;

/// Where an archive ended up and the digest its name was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentAddress {
    /// `<root>/<sha256>`
    pub path: PathBuf,
    /// SHA-256 of the archive bytes.
    pub sha256: Sha256Hash,
}

/// Hashes the finished archive at `archive` and moves it to `<root>/<sha256>`.
///
/// If a file with that name already exists the archive is a duplicate: the existing file is
/// kept and `archive` is deleted. The move never replaces an existing file.
pub fn address_by_content(archive: TempPath, root: &Path) -> Result<ContentAddress, PackageError> {
    let sha256 = compute_file_digest::<Sha256>(&archive)?;
    fs_err::create_dir_all(root)?;
    let path = root.join(content_name(&sha256));

    match archive.persist_noclobber(&path) {
        Ok(()) => {
            tracing::debug!("stored archive as {}", path.display());
        }
        Err(PathPersistError { error, path: _temp })
            if error.kind() == std::io::ErrorKind::AlreadyExists && path.is_file() =>
        {
            tracing::debug!("{} already exists, discarding the duplicate", path.display());
        }
        Err(e) => return Err(PackageError::IoError(e.error)),
    }

    Ok(ContentAddress { path, sha256 })
}

/// Returns true if the file name of `path` is the hex SHA-256 of its content.
pub fn verify_content_address(path: &Path) -> Result<bool, std::io::Error> {
    let Some(expected) = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(parse_digest_from_hex::<Sha256>)
    else {
        return Ok(false);
    };
    Ok(compute_file_digest::<Sha256>(path)? == expected)
}
