use std::path::PathBuf;

use miette::{Context, IntoDiagnostic};
use parcel_package::Unpackager;

use super::ConfigArgs;

#[derive(Debug, clap::Parser)]
pub struct Opt {
    /// The archive to extract
    #[clap(required = true)]
    archive: PathBuf,
}

pub fn unpackage(config: &ConfigArgs, opt: Opt) -> miette::Result<()> {
    let config = config.load()?;
    let unpacked = Unpackager::new(&config)
        .unpackage(&opt.archive)
        .into_diagnostic()
        .with_context(|| format!("failed to unpackage {}", opt.archive.display()))?;

    println!(
        "{} {}",
        console::style("✓").green(),
        unpacked.path.display()
    );
    Ok(())
}
