use artsync::Result;
use artsync::commands::{init_config, list_museums, show_config, show_stats, sync};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "artsync")]
#[command(about = "Sync museum open-data artwork catalogs into a vector search index")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sync pass for the given museums (all museums when omitted)
    Sync {
        /// Museum slugs to sync, e.g. "smk cma"
        museums: Vec<String>,
    },
    /// Show the mirrored per-museum statistics
    Stats,
    /// List the supported museums
    Museums,
    /// Manage configuration
    Config {
        /// Show the active configuration instead of writing it to disk
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync { museums } => {
            sync(museums).await?;
        }
        Commands::Stats => {
            show_stats().await?;
        }
        Commands::Museums => {
            list_museums();
        }
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                init_config()?;
            }
        }
    }

    Ok(())
}
