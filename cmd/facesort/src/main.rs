//! Facesort CLI - sorts a photo collection into per-person folders.

use clap::{Parser, Subcommand};

mod commands;

use commands::{ConfigCommand, RenameCommand, ResetCommand, SortCommand};

/// Facesort CLI - sorts photos into per-person folders by face identity.
///
/// Faces are read from `<image>.faces.json` sidecars written by an
/// external extractor. Settings are stored in ~/.facesort/config.yaml.
#[derive(Parser)]
#[command(name = "facesort")]
#[command(about = "Sort photos into per-person folders by face identity")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.facesort/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sort an input directory
    Sort(SortCommand),
    /// Delete the identity cache and the output folders
    Reset(ResetCommand),
    /// Rename an identity and its folder
    Rename(RenameCommand),
    /// Show or change settings
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Sort(cmd) => cmd.run(&cli).await,
        Commands::Reset(cmd) => cmd.run(&cli),
        Commands::Rename(cmd) => cmd.run(&cli),
        Commands::Config(cmd) => cmd.run(&cli),
    }
}
