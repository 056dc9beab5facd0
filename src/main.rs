use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use reel_dl::batch::DEFAULT_BATCH_SIZE;
use reel_dl::{Config, Harvester, ProcessingOrder};

#[derive(Parser)]
#[command(name = "reel-dl")]
#[command(version, about = "Fetch post metadata and download the media it references", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// File with one post URL per line
    #[arg(default_value = "reels.txt")]
    input: PathBuf,

    /// Processing order: `asc` for file order, anything else for newest first
    order: Option<String>,

    /// JSON configuration file
    #[arg(short, long, global = true, env = "REEL_DL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Delete one URL's record from the media data file
    Remove {
        /// Post URL to remove
        url: String,
    },
    /// Move downloaded records into batch_<n> folders
    Batch {
        /// Records per batch
        #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
        size: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("reel_dl=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let harvester = Harvester::new(config)?;

    match cli.command {
        Some(Command::Remove { url }) => {
            if harvester.remove_record(&url).await? {
                println!("Removed {}", url);
            } else {
                println!("URL not found in media data: {}", url);
            }
        }
        Some(Command::Batch { size }) => {
            let summary = harvester.organize_batches(size).await?;
            println!(
                "Organized {} records into {} batches ({} files moved, {} missing, {} records failed)",
                summary.records,
                summary.batches,
                summary.files_moved,
                summary.missing_files,
                summary.failed_records
            );
        }
        None => {
            tokio::spawn(reel_dl::cancel_on_signal(harvester.shutdown_token()));

            let order = ProcessingOrder::from_arg(cli.order.as_deref());
            let report = harvester.run(&cli.input, order).await?;
            tracing::info!(
                fetched = report.fetch.fetched,
                downloaded = report.download.as_ref().map_or(0, |d| d.items_downloaded),
                "Run complete"
            );
        }
    }

    Ok(())
}
