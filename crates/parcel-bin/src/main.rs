use clap::Parser;
use tracing_subscriber::{filter::LevelFilter, util::SubscriberInitExt, EnvFilter};

mod commands;

/// Package data files into content-addressed archives and back
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: commands::ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Package a file into the data directory
    Package(commands::package::Opt),

    /// Extract the payload of an archive into the data directory
    Unpackage(commands::unpackage::Opt),

    /// Show the metadata of an archive and check its name
    Inspect(commands::inspect::Opt),

    /// List the files in the data directory and the free space
    Status(commands::status::Opt),

    /// Show which file would be sent next
    Next(commands::next::Opt),
}

/// Entry point of the `parcel` cli.
fn main() -> anyhow::Result<()> {
    // Parse the command line arguments
    let cli = Cli::parse();

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;

    // Setup the tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .finish()
        .try_init()?;

    // Dispatch the selected command
    let result = match cli.command {
        Commands::Package(opt) => commands::package::package(&cli.config, opt),
        Commands::Unpackage(opt) => commands::unpackage::unpackage(&cli.config, opt),
        Commands::Inspect(opt) => commands::inspect::inspect(opt),
        Commands::Status(opt) => commands::status::status(&cli.config, opt),
        Commands::Next(opt) => commands::next::next(&cli.config, opt),
    };

    result.map_err(|report| anyhow::anyhow!("{report:?}"))
}
