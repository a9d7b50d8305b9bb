//! Disk space accounting.

use std::path::Path;

/// Space that is always kept free on top of whatever a transfer needs: 100 MiB.
pub const BUFFER_SPACE: u64 = 100 * 1024 * 1024;

/// Reports the capacity of the filesystem a path lives on.
pub trait SpaceProbe {
    /// Total size of the filesystem in bytes.
    fn total_space(&self, path: &Path) -> std::io::Result<u64>;

    /// Bytes available to the current user.
    fn free_space(&self, path: &Path) -> std::io::Result<u64>;
}

/// Asks the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSpaceProbe;

impl SpaceProbe for FsSpaceProbe {
    fn total_space(&self, path: &Path) -> std::io::Result<u64> {
        fs2::total_space(existing_ancestor(path))
    }

    fn free_space(&self, path: &Path) -> std::io::Result<u64> {
        fs2::available_space(existing_ancestor(path))
    }
}

/// The data directory may not exist yet; the filesystem it will be created on is the one of its
/// closest existing ancestor.
fn existing_ancestor(path: &Path) -> &Path {
    path.ancestors()
        .find(|ancestor| ancestor.exists())
        .unwrap_or(path)
}

/// A snapshot of the space situation of a data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageInformation {
    /// Total size of the filesystem.
    pub total_space: u64,
    /// Bytes available on the filesystem.
    pub free_space: u64,
    /// Bytes taken by files that are still being received.
    pub incomplete_files_space: u64,
}

/// Returns true if `target_size` bytes fit while still leaving [`BUFFER_SPACE`] free.
pub fn has_enough_space(
    probe: &impl SpaceProbe,
    path: &Path,
    target_size: u64,
) -> std::io::Result<bool> {
    let free = probe.free_space(path)?;
    tracing::debug!(
        "free space: {free}, buffer: {BUFFER_SPACE}, target size: {target_size}"
    );
    Ok(free
        .checked_sub(BUFFER_SPACE)
        .is_some_and(|left| left >= target_size))
}
