use std::path::PathBuf;

use miette::{Context, IntoDiagnostic};
use parcel_package::{read_metadata, verify_content_address};

#[derive(Debug, clap::Parser)]
pub struct Opt {
    /// The archive to inspect
    #[clap(required = true)]
    archive: PathBuf,
}

pub fn inspect(opt: Opt) -> miette::Result<()> {
    let metadata = read_metadata(&opt.archive)
        .into_diagnostic()
        .with_context(|| format!("failed to read the metadata of {}", opt.archive.display()))?;
    let verified = verify_content_address(&opt.archive)
        .into_diagnostic()
        .context("failed to hash the archive")?;

    let created = metadata
        .created_at()
        .map(|date| date.to_rfc3339())
        .unwrap_or_else(|| metadata.creation_timestamp.to_string());

    println!("file name:  {}", metadata.file_name);
    println!("created:    {created}");
    println!("origin:     {}", metadata.origin_id);
    if verified {
        println!("content:    {}", console::style("name matches content").green());
    } else {
        println!(
            "content:    {}",
            console::style("name does not match content").red()
        );
    }
    Ok(())
}
