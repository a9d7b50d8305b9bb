use miette::IntoDiagnostic;
use parcel_config::UploadPriority;
use parcel_repository::DataFileRepository;

use super::ConfigArgs;

#[derive(Debug, clap::Parser)]
pub struct Opt {
    /// Only consider files strictly smaller than this many bytes
    #[clap(long, default_value_t = u64::MAX)]
    max_size: u64,

    /// Override the configured upload priority
    #[clap(long)]
    priority: Option<UploadPriority>,
}

pub fn next(config: &ConfigArgs, opt: Opt) -> miette::Result<()> {
    let config = config.load()?;
    let priority = opt.priority.unwrap_or(config.upload_priority());
    let repository = DataFileRepository::from_config(&config);

    match repository
        .select_next_for_transfer(opt.max_size, priority)
        .into_diagnostic()?
    {
        Some(file) => println!("{}", file.path().display()),
        None => println!("{}", console::style("nothing to send").dim()),
    }
    Ok(())
}
