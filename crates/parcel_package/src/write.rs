//! Writing the zip container.

use std::{
    io::{Seek, Write},
    path::{Path, PathBuf},
};

use tempfile::TempPath;
use walkdir::WalkDir;
use zip::{write::SimpleFileOptions, CompressionMethod, DateTime, ZipWriter};

use crate::PackageError;

/// Every file below `directory`, sorted so that archives of equal inputs are byte-identical.
fn collect_files(directory: &Path) -> Result<Vec<PathBuf>, PackageError> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

/// The name `path` gets inside the archive: relative to `base_path`, `/`-separated.
fn entry_name(base_path: &Path, path: &Path) -> Result<String, PackageError> {
    let relative = path
        .strip_prefix(base_path)
        .map_err(|_| PackageError::InvalidSourcePath(path.to_path_buf()))?;
    let components = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| PackageError::InvalidSourcePath(path.to_path_buf()))?;
    Ok(components.join("/"))
}

/// Writes `paths` into a deflate-compressed zip archive.
///
/// Entries are named relative to `base_path` and written in the given order. Timestamps and
/// permissions are fixed. No directory entries are written.
pub fn write_archive<W: Write + Seek>(
    writer: W,
    base_path: &Path,
    paths: &[PathBuf],
) -> Result<W, PackageError> {
    let mut archive = ZipWriter::new(writer);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    for path in paths {
        archive.start_file(entry_name(base_path, path)?, options)?;
        let mut file = fs_err::File::open(path)?;
        std::io::copy(&mut file, &mut archive)?;
    }

    Ok(archive.finish()?)
}

/// Compresses every file below `directory` into a new archive that is also placed in
/// `directory`. The file list is taken before the archive is created, so the archive never
/// contains itself.
///
/// The returned path deletes the archive when dropped unless it is persisted.
pub fn compress_directory(directory: &Path) -> Result<TempPath, PackageError> {
    let paths = collect_files(directory)?;

    let (file, temp_path) = tempfile::Builder::new()
        .prefix(".parcel-")
        .suffix(".zip")
        .tempfile_in(directory)?
        .into_parts();

    let file = write_archive(file, directory, &paths)?;
    file.sync_all()?;

    tracing::debug!(
        "compressed {} file(s) from {} into {}",
        paths.len(),
        directory.display(),
        temp_path.display()
    );
    Ok(temp_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn entries(archive_path: &Path) -> Vec<(String, Vec<u8>)> {
        let mut archive = zip::ZipArchive::new(fs_err::File::open(archive_path).unwrap()).unwrap();
        (0..archive.len())
            .map(|idx| {
                let mut entry = archive.by_index(idx).unwrap();
                let mut bytes = Vec::new();
                entry.read_to_end(&mut bytes).unwrap();
                (entry.name().to_owned(), bytes)
            })
            .collect()
    }

    #[test]
    fn test_compress_payload_and_sidecar() {
        let tmp = tempfile::tempdir().unwrap();
        fs_err::write(tmp.path().join("hello.txt"), b"0123456789").unwrap();
        fs_err::write(tmp.path().join("hello.txt.json"), br#"{"FileName":"hello.txt"}"#).unwrap();

        let archive = compress_directory(tmp.path()).unwrap();
        assert!(archive.starts_with(tmp.path()));

        let entries = entries(&archive);
        assert_eq!(
            entries,
            vec![
                ("hello.txt".to_owned(), b"0123456789".to_vec()),
                (
                    "hello.txt.json".to_owned(),
                    br#"{"FileName":"hello.txt"}"#.to_vec()
                ),
            ]
        );
    }

    #[test]
    fn test_compress_nested_uses_forward_slashes() {
        let tmp = tempfile::tempdir().unwrap();
        fs_err::create_dir_all(tmp.path().join("a/b")).unwrap();
        fs_err::write(tmp.path().join("a/b/c.txt"), b"c").unwrap();
        fs_err::write(tmp.path().join("z.txt"), b"z").unwrap();

        let archive = compress_directory(tmp.path()).unwrap();
        let names: Vec<_> = entries(&archive).into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a/b/c.txt", "z.txt"]);
    }

    #[test]
    fn test_archive_is_deleted_when_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        fs_err::write(tmp.path().join("x"), b"x").unwrap();
        let path = compress_directory(tmp.path()).unwrap().to_path_buf();
        assert!(!path.exists());
    }

    #[test]
    fn test_output_is_deterministic() {
        let tmp = tempfile::tempdir().unwrap();
        fs_err::write(tmp.path().join("b.bin"), vec![7u8; 4096]).unwrap();
        fs_err::write(tmp.path().join("a.bin"), b"aaaa").unwrap();
        let paths = collect_files(tmp.path()).unwrap();

        let first = write_archive(Cursor::new(Vec::new()), tmp.path(), &paths)
            .unwrap()
            .into_inner();
        let second = write_archive(Cursor::new(Vec::new()), tmp.path(), &paths)
            .unwrap()
            .into_inner();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_directory_gives_empty_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = compress_directory(tmp.path()).unwrap();
        assert!(entries(&archive).is_empty());
    }
}
