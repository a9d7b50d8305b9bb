use serde::{Deserialize, Serialize};

/// Decides which complete data file is offered next when several are waiting to be sent.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum UploadPriority {
    /// Send the smallest file first.
    #[default]
    SmallestFirst,
    /// Send the largest file first.
    LargestFirst,
    /// Send the file with the most recent creation timestamp first.
    NewestFirst,
    /// Send the file with the oldest creation timestamp first.
    OldestFirst,
}
