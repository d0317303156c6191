use clap::Args;

use super::{get_settings, print_success};
use crate::Cli;

/// Delete the identity cache and every output folder.
#[derive(Args)]
pub struct ResetCommand {}

impl ResetCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let layout = get_settings(cli)?.layout();
        layout.reset()?;
        print_success(&format!(
            "Removed {} and {}",
            layout.cache().path().display(),
            layout.output_root().display()
        ));
        Ok(())
    }
}

/// Rename an identity in the cache and on disk.
///
/// The folder of OLD is merged into the folder of NEW; files with the
/// same name are replaced.
#[derive(Args)]
pub struct RenameCommand {
    /// Current identity id, e.g. cluster_3
    old: String,
    /// New identity id
    new: String,
}

impl RenameCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        get_settings(cli)?.layout().rename_identity(&self.old, &self.new)?;
        print_success(&format!("Renamed \"{}\" to \"{}\"", self.old, self.new));
        Ok(())
    }
}
