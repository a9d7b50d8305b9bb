//! Strategies for picking the next file to send.

use parcel_config::UploadPriority;

use crate::DataFile;

/// Picks one file out of a list of candidates.
pub trait FileChooser: Send + Sync {
    /// Returns the preferred file, or `None` if `files` is empty. When several files are equally
    /// good the one that comes first wins.
    fn choose<'a>(&self, files: &'a [DataFile]) -> Option<&'a DataFile>;
}

/// Prefers the smallest file.
#[derive(Debug, Default, Clone, Copy)]
pub struct SmallestFileChooser;

/// Prefers the largest file.
#[derive(Debug, Default, Clone, Copy)]
pub struct LargestFileChooser;

/// Prefers the file that was packaged most recently.
#[derive(Debug, Default, Clone, Copy)]
pub struct NewestFileChooser;

/// Prefers the file that was packaged longest ago.
#[derive(Debug, Default, Clone, Copy)]
pub struct OldestFileChooser;

/// Keeps the first candidate unless a later one is strictly better.
fn choose_by<'a, K>(
    files: &'a [DataFile],
    key: impl Fn(&DataFile) -> K,
    is_better: impl Fn(&K, &K) -> bool,
) -> Option<&'a DataFile> {
    let mut iter = files.iter();
    let first = iter.next()?;
    let mut best = (first, key(first));
    for file in iter {
        let candidate = key(file);
        if is_better(&candidate, &best.1) {
            best = (file, candidate);
        }
    }
    Some(best.0)
}

/// Orders creation timestamps. A file whose timestamp is unknown is worse than any file whose
/// timestamp is known.
fn timestamp_is_better(
    candidate: &Option<i64>,
    best: &Option<i64>,
    cmp: impl Fn(i64, i64) -> bool,
) -> bool {
    match (candidate, best) {
        (Some(candidate), Some(best)) => cmp(*candidate, *best),
        (Some(_), None) => true,
        (None, _) => false,
    }
}

impl FileChooser for SmallestFileChooser {
    fn choose<'a>(&self, files: &'a [DataFile]) -> Option<&'a DataFile> {
        choose_by(files, DataFile::len, |a, b| a < b)
    }
}

impl FileChooser for LargestFileChooser {
    fn choose<'a>(&self, files: &'a [DataFile]) -> Option<&'a DataFile> {
        choose_by(files, DataFile::len, |a, b| a > b)
    }
}

impl FileChooser for NewestFileChooser {
    fn choose<'a>(&self, files: &'a [DataFile]) -> Option<&'a DataFile> {
        choose_by(files, DataFile::creation_timestamp, |a, b| {
            timestamp_is_better(a, b, |a, b| a > b)
        })
    }
}

impl FileChooser for OldestFileChooser {
    fn choose<'a>(&self, files: &'a [DataFile]) -> Option<&'a DataFile> {
        choose_by(files, DataFile::creation_timestamp, |a, b| {
            timestamp_is_better(a, b, |a, b| a < b)
        })
    }
}

/// The chooser that implements `priority`.
pub fn chooser_for(priority: UploadPriority) -> Box<dyn FileChooser> {
    match priority {
        UploadPriority::SmallestFirst => Box::new(SmallestFileChooser),
        UploadPriority::LargestFirst => Box::new(LargestFileChooser),
        UploadPriority::NewestFirst => Box::new(NewestFileChooser),
        UploadPriority::OldestFirst => Box::new(OldestFileChooser),
    }
}
