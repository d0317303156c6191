//! The `sort` command.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use facesort::{Controller, Event, Outcome, SidecarDetector, Sorter, Status};

use super::get_settings;
use crate::Cli;

/// Sort every image under INPUT into per-person folders.
///
/// Press Ctrl-C to stop after the current file. A stopped run keeps the
/// copies made so far but does not update the identity cache.
#[derive(Args)]
pub struct SortCommand {
    /// Directory to scan recursively
    input: PathBuf,

    /// Cosine similarity needed to join an identity, in [-1, 1]
    #[arg(long, allow_negative_numbers = true)]
    threshold: Option<f32>,

    /// Image scale factor applied before detection
    #[arg(long)]
    resize_scale: Option<f32>,

    /// Minimum embeddings per identity after re-clustering
    #[arg(long)]
    min_cluster_size: Option<usize>,

    /// Output root directory
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Identity cache file
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,
}

impl SortCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let mut settings = get_settings(cli)?;
        if let Some(v) = self.threshold {
            settings.sim_threshold = v;
        }
        if let Some(v) = self.resize_scale {
            settings.resize_scale = v;
        }
        if let Some(v) = self.min_cluster_size {
            settings.min_cluster_size = v;
        }
        if let Some(v) = &self.output {
            settings.output_dir = v.clone();
        }
        if let Some(v) = &self.cache {
            settings.cache_file = v.clone();
        }
        settings.validate()?;

        let sorter = Sorter::new(
            Arc::new(SidecarDetector::new()),
            settings.layout(),
            settings.params(),
        );
        let controller = Controller::new(sorter);
        let mut handle = controller.start(&self.input)?;
        let cancel = handle.cancel_token();

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut interrupted = false;
        loop {
            tokio::select! {
                event = handle.events().recv() => match event {
                    Some(event) => self.print(&event)?,
                    None => break,
                },
                res = &mut ctrl_c, if !interrupted => {
                    res?;
                    tracing::info!("interrupt received, stopping after current file");
                    cancel.cancel();
                    interrupted = true;
                }
            }
        }

        let (outcome, rest) = tokio::task::spawn_blocking(move || handle.join()).await?;
        for event in &rest {
            self.print(event)?;
        }
        if !self.json {
            eprintln!();
        }

        match outcome {
            Outcome::Done { files, identities } => {
                eprintln!("Sorted {files} files into {identities} identities");
                Ok(())
            }
            Outcome::Cancelled { processed } => {
                eprintln!("Cancelled after {processed} files; cache not updated");
                Ok(())
            }
            Outcome::Failed(e) => Err(e.into()),
        }
    }

    fn print(&self, event: &Event) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(event)?);
            return Ok(());
        }
        match event {
            Event::Progress { percent } => eprint!("\r[{percent:>3}%]"),
            Event::Log(log) => {
                let name = log.filename.as_deref().unwrap_or("-");
                let status = log.status.to_string();
                match (log.status, &log.identity) {
                    (Status::Success, Some(id)) => println!("\r{status:<12} {name} -> {id}"),
                    _ => println!("\r{status:<12} {name}"),
                }
            }
        }
        Ok(())
    }
}
