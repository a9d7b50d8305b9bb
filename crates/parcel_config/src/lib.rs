#![deny(missing_docs)]

//! Configuration shared by the parcel packager, unpackager and data-file repository.
//!
//! Configuration is read from one or more TOML files with [`ConfigFile::load_from_files`]; later
//! files override earlier ones field by field. The merged file is then resolved into a
//! [`ParcelConfig`], which is what the rest of parcel is constructed with. Nothing in parcel reads
//! settings from global state.
//!
//! ```toml
//! agent-root = "/var/lib/parcel"
//! origin-id = "node-17"
//! metadata-dir = "/var/lib/parcel/metadata"
//! upload-priority = "oldest-first"
//!
//! [retry]
//! max-retries = 3
//! wait-interval = "5s"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod retry;
mod upload_priority;

pub use retry::{RetryConfig, DEFAULT_MAX_RETRIES, DEFAULT_WAIT_INTERVAL};
pub use upload_priority::UploadPriority;

/// Directory below the agent root that holds staging directories, packaged archives and
/// unpackaged payloads.
pub const DATA_DIR: &str = "data";

/// Directory below the agent root that receives extracted metadata sidecars unless configured
/// otherwise.
pub const METADATA_DIR: &str = "metadata";

/// Environment variable that overrides the default agent root.
pub const AGENT_ROOT_ENV: &str = "PARCEL_AGENT_ROOT";

/// A configuration value is missing or unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Missing required field.
    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    /// Invalid value for a field.
    #[error("invalid value for field {0}: {1}")]
    InvalidValue(String, String),
}

/// An error that can occur while loading configuration files.
#[derive(Error, Debug)]
pub enum LoadError {
    /// IO error while reading a configuration file.
    #[error("failed to read configuration file")]
    IoError(#[from] std::io::Error),

    /// A configuration file is not valid TOML or does not match the schema.
    #[error("failed to parse configuration file {1}")]
    ParseError(#[source] toml::de::Error, PathBuf),

    /// The merged configuration is incomplete or invalid.
    #[error(transparent)]
    ValidationError(#[from] ValidationError),
}

/// A single configuration file. All fields are optional so files can be layered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigFile {
    /// Root directory of the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_root: Option<PathBuf>,

    /// Identifier of this node, recorded as the origin of every packaged file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<String>,

    /// Where extracted metadata sidecars are written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_dir: Option<PathBuf>,

    /// Order in which complete files are offered for transfer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_priority: Option<UploadPriority>,

    /// Collision retry behaviour for staging and extraction.
    #[serde(default, skip_serializing_if = "RetryConfig::is_default")]
    pub retry: RetryConfig,
}

impl ConfigFile {
    /// Values in `other` take priority over the ones in `self`.
    pub fn merge_config(self, other: &Self) -> Self {
        Self {
            agent_root: other.agent_root.clone().or(self.agent_root),
            origin_id: other.origin_id.clone().or(self.origin_id),
            metadata_dir: other.metadata_dir.clone().or(self.metadata_dir),
            upload_priority: other.upload_priority.or(self.upload_priority),
            retry: self.retry.merge_config(&other.retry),
        }
    }

    /// Reads and merges the given files in order.
    pub fn load_from_files<I, P>(paths: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut config = ConfigFile::default();
        for path in paths {
            let content = fs_err::read_to_string(path.as_ref())?;
            let other: ConfigFile = toml::from_str(&content)
                .map_err(|e| LoadError::ParseError(e, path.as_ref().to_path_buf()))?;
            config = config.merge_config(&other);
        }
        Ok(config)
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParcelConfig {
    agent_root: PathBuf,
    origin_id: String,
    metadata_dir: Option<PathBuf>,
    upload_priority: UploadPriority,
    retry: RetryConfig,
}

impl ParcelConfig {
    /// Creates a configuration with default values for everything except the agent root and the
    /// origin id.
    pub fn new(agent_root: impl Into<PathBuf>, origin_id: impl Into<String>) -> Self {
        Self {
            agent_root: agent_root.into(),
            origin_id: origin_id.into(),
            metadata_dir: None,
            upload_priority: UploadPriority::default(),
            retry: RetryConfig::default(),
        }
    }

    /// Loads and merges the given files, then resolves them. See
    /// [`ParcelConfig::from_config_file`].
    pub fn load_from_files<I, P>(paths: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let file = ConfigFile::load_from_files(paths)?;
        Ok(Self::from_config_file(file)?)
    }

    /// Resolves a (merged) configuration file. A missing `agent-root` falls back to
    /// [`default_agent_root`]; `origin-id` is required.
    pub fn from_config_file(file: ConfigFile) -> Result<Self, ValidationError> {
        let origin_id = file
            .origin_id
            .ok_or_else(|| ValidationError::MissingRequiredField("origin-id".to_string()))?;
        if origin_id.trim().is_empty() {
            return Err(ValidationError::InvalidValue(
                "origin-id".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let agent_root = match file.agent_root {
            Some(root) => root,
            None => default_agent_root()?,
        };

        Ok(Self {
            agent_root,
            origin_id,
            metadata_dir: file.metadata_dir,
            upload_priority: file.upload_priority.unwrap_or_default(),
            retry: file.retry,
        })
    }

    /// Overrides the directory that receives extracted metadata sidecars.
    pub fn with_metadata_dir(mut self, metadata_dir: impl Into<PathBuf>) -> Self {
        self.metadata_dir = Some(metadata_dir.into());
        self
    }

    /// Overrides the collision retry settings.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides the upload priority.
    pub fn with_upload_priority(mut self, upload_priority: UploadPriority) -> Self {
        self.upload_priority = upload_priority;
        self
    }

    /// Root directory of the agent.
    pub fn agent_root(&self) -> &Path {
        &self.agent_root
    }

    /// Identifier of this node.
    pub fn origin_id(&self) -> &str {
        &self.origin_id
    }

    /// `<agent-root>/data`: staging root, archive store and extraction directory in one.
    pub fn data_dir(&self) -> PathBuf {
        self.agent_root.join(DATA_DIR)
    }

    /// Where extracted metadata sidecars are written.
    pub fn metadata_dir(&self) -> PathBuf {
        self.metadata_dir
            .clone()
            .unwrap_or_else(|| self.agent_root.join(METADATA_DIR))
    }

    /// Order in which complete files are offered for transfer.
    pub fn upload_priority(&self) -> UploadPriority {
        self.upload_priority
    }

    /// Collision retry settings.
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }
}

/// Determines the default agent root.
///
/// Checks the `PARCEL_AGENT_ROOT` environment variable first and falls back to
/// `dirs::data_dir()/parcel`.
pub fn default_agent_root() -> Result<PathBuf, ValidationError> {
    if let Some(root) = std::env::var_os(AGENT_ROOT_ENV) {
        return Ok(PathBuf::from(root));
    }
    dirs::data_dir()
        .map(|dir| dir.join("parcel"))
        .ok_or_else(|| ValidationError::MissingRequiredField("agent-root".to_string()))
}
