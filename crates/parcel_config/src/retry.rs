use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Number of times a colliding name is retried before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Time to wait between two attempts on a colliding name.
pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_secs(5);

/// The `[retry]` table as it appears in a configuration file. Every field is optional so that
/// files can be layered on top of each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    /// How many times to retry after the first attempt collided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// How long to wait between attempts, written as a human readable duration (`"5s"`, `"250ms"`).
    #[serde(default, with = "humantime_option", skip_serializing_if = "Option::is_none")]
    pub wait_interval: Option<Duration>,
}

impl RetryConfig {
    /// Values in `other` take priority over the ones in `self`.
    pub fn merge_config(self, other: &Self) -> Self {
        Self {
            max_retries: other.max_retries.or(self.max_retries),
            wait_interval: other.wait_interval.or(self.wait_interval),
        }
    }

    /// Returns true if nothing was configured.
    pub fn is_default(&self) -> bool {
        self == &Self::default()
    }

    /// The configured retry count, or [`DEFAULT_MAX_RETRIES`].
    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    /// The configured wait interval, or [`DEFAULT_WAIT_INTERVAL`].
    pub fn wait_interval(&self) -> Duration {
        self.wait_interval.unwrap_or(DEFAULT_WAIT_INTERVAL)
    }
}

mod humantime_option {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => {
                serializer.serialize_str(&humantime::format_duration(*duration).to_string())
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let Some(text) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        humantime::parse_duration(&text)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}
