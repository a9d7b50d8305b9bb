use miette::IntoDiagnostic;
use parcel_repository::{DataFileRepository, FsSpaceProbe};

use super::ConfigArgs;

#[derive(Debug, clap::Parser)]
pub struct Opt {}

pub fn status(config: &ConfigArgs, _opt: Opt) -> miette::Result<()> {
    let config = config.load()?;
    let repository = DataFileRepository::from_config(&config);

    println!("data directory: {}", repository.data_dir().display());
    for file in repository.data_files().into_diagnostic()? {
        let state = if file.is_complete() {
            console::style("complete").green()
        } else {
            console::style("incomplete").yellow()
        };
        println!("  {state:<10} {:>12}  {}", file.len(), file.name());
    }

    let storage = repository
        .storage_information(&FsSpaceProbe)
        .into_diagnostic()?;
    println!("total space:       {}", storage.total_space);
    println!("free space:        {}", storage.free_space);
    println!("incomplete files:  {}", storage.incomplete_files_space);
    Ok(())
}
