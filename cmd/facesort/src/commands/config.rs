//! Settings commands.

use clap::{Args, Subcommand};
use facesort::{FolderMatch, Settings};

use super::{print_success, settings_path};
use crate::Cli;

/// Show or change settings.
///
/// Settings are stored in ~/.facesort/config.yaml
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Print the effective settings
    Show,
    /// Change one or more settings
    Set {
        /// Cosine similarity needed to join an identity, in [-1, 1]
        #[arg(long, allow_negative_numbers = true)]
        threshold: Option<f32>,
        /// Image scale factor applied before detection
        #[arg(long)]
        resize_scale: Option<f32>,
        /// Minimum embeddings per identity after re-clustering
        #[arg(long)]
        min_cluster_size: Option<usize>,
        /// Folder reconciliation rule (legacy or strict)
        #[arg(long)]
        folder_match: Option<FolderMatch>,
    },
}

impl ConfigCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let path = settings_path(cli)?;
        match &self.command {
            ConfigSubcommand::Show => {
                let settings = Settings::load(&path)?;
                println!("# {}", path.display());
                print!("{}", serde_yaml::to_string(&settings)?);
                Ok(())
            }

            ConfigSubcommand::Set {
                threshold,
                resize_scale,
                min_cluster_size,
                folder_match,
            } => {
                let mut settings = Settings::load(&path)?;
                if let Some(v) = threshold {
                    settings.sim_threshold = *v;
                }
                if let Some(v) = resize_scale {
                    settings.resize_scale = *v;
                }
                if let Some(v) = min_cluster_size {
                    settings.min_cluster_size = *v;
                }
                if let Some(v) = folder_match {
                    settings.folder_match = *v;
                }
                settings.validate()?;
                settings.save(&path)?;
                print_success(&format!("Settings saved to {}", path.display()));
                Ok(())
            }
        }
    }
}
