use std::path::PathBuf;

use miette::{Context, IntoDiagnostic};
use parcel_config::{ConfigFile, ParcelConfig};

pub mod inspect;
pub mod next;
pub mod package;
pub mod status;
pub mod unpackage;

/// Options that select the configuration, shared by all subcommands.
#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    /// Configuration file to load. Can be given multiple times, later files take precedence.
    #[arg(long = "config", global = true)]
    config_files: Vec<PathBuf>,

    /// Root directory of the agent, overrides the configuration files
    #[arg(long, global = true)]
    agent_root: Option<PathBuf>,

    /// Identifier of this node, overrides the configuration files
    #[arg(long, global = true)]
    origin_id: Option<String>,
}

impl ConfigArgs {
    /// Merges the configuration files with the command line overrides.
    pub fn load(&self) -> miette::Result<ParcelConfig> {
        let files = ConfigFile::load_from_files(&self.config_files)
            .into_diagnostic()
            .context("failed to load the configuration")?;
        let overrides = ConfigFile {
            agent_root: self.agent_root.clone(),
            origin_id: self.origin_id.clone(),
            ..ConfigFile::default()
        };
        ParcelConfig::from_config_file(files.merge_config(&overrides))
            .into_diagnostic()
            .context("invalid configuration")
    }
}
