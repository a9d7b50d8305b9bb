use std::path::PathBuf;

use miette::{Context, IntoDiagnostic};
use parcel_package::Packager;

use super::ConfigArgs;

#[derive(Debug, clap::Parser)]
pub struct Opt {
    /// The file to package
    #[clap(required = true)]
    file: PathBuf,
}

pub fn package(config: &ConfigArgs, opt: Opt) -> miette::Result<()> {
    let config = config.load()?;
    let packaged = Packager::new(&config)
        .package(&opt.file)
        .into_diagnostic()
        .with_context(|| format!("failed to package {}", opt.file.display()))?;

    println!(
        "{} {}",
        console::style("✓").green(),
        packaged.path.display()
    );
    println!("  sha256: {:x}", packaged.sha256);
    Ok(())
}
