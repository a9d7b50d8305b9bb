//! The sidecar record that travels next to every payload.

use std::{collections::HashSet, path::Path};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::PackageError;

/// Suffix appended to a payload's name to form the name of its sidecar.
pub const METADATA_SUFFIX: &str = ".json";

/// Describes where a payload came from. The field names are part of the on-disk format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFileMetadata {
    /// The original name of the payload.
    #[serde(rename = "FileName")]
    pub file_name: String,

    /// When the payload was packaged, in milliseconds since the unix epoch (UTC).
    #[serde(rename = "CreationTimestamp")]
    pub creation_timestamp: i64,

    /// Identifier of the node that packaged the payload.
    #[serde(rename = "OriginUID")]
    pub origin_id: String,
}

impl DataFileMetadata {
    /// A record for `file_name` stamped with the current time.
    pub fn new(file_name: impl Into<String>, origin_id: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            creation_timestamp: Utc::now().timestamp_millis(),
            origin_id: origin_id.into(),
        }
    }

    /// The creation timestamp as a date, if it is in range.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.creation_timestamp)
    }
}

/// `<payload_name>.json`
pub fn metadata_file_name(payload_name: &str) -> String {
    format!("{payload_name}{METADATA_SUFFIX}")
}

/// Writes the sidecar for `payload_name` into `destination` and returns what was written.
pub fn write_metadata(
    payload_name: &str,
    destination: &Path,
    origin_id: &str,
) -> Result<DataFileMetadata, PackageError> {
    let metadata = DataFileMetadata::new(payload_name, origin_id);
    let file = fs_err::File::create(destination.join(metadata_file_name(payload_name)))?;
    serde_json::to_writer(std::io::BufWriter::new(file), &metadata)?;
    Ok(metadata)
}

/// Decides which archive entries are sidecars.
///
/// An entry is a sidecar when its name ends in [`METADATA_SUFFIX`] and the name without the
/// suffix is another entry. This keeps a payload that itself ends in `.json` from being taken
/// for metadata. Archives whose entries do not pair up at all fall back to the suffix alone.
pub(crate) fn metadata_entry_indices(names: &[String]) -> HashSet<usize> {
    let all: HashSet<&str> = names.iter().map(String::as_str).collect();
    let paired: HashSet<usize> = names
        .iter()
        .enumerate()
        .filter(|(_, name)| {
            name.strip_suffix(METADATA_SUFFIX)
                .is_some_and(|stem| all.contains(stem))
        })
        .map(|(idx, _)| idx)
        .collect();
    if !paired.is_empty() {
        return paired;
    }
    names
        .iter()
        .enumerate()
        .filter(|(_, name)| name.ends_with(METADATA_SUFFIX))
        .map(|(idx, _)| idx)
        .collect()
}
