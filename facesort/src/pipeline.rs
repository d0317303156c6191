//! One sort run: walk the input, route faces, copy files, re-cluster.
//!
//! # States
//!
//! ```text
//! Idle -> Scanning -> Cancelled
//!                  -> Reclustering -> Done
//!      (any) -> Errored
//! ```
//!
//! The store is saved only when a run reaches `Done`. A cancelled or
//! failed run leaves the cache exactly as it was before the run; files
//! already copied stay where they are.

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use facesort_faceid::{
    match_or_add, recluster, IdentityStore, Reclustered, DEFAULT_MIN_CLUSTER_SIZE,
    DEFAULT_THRESHOLD,
};
use image::imageops::FilterType;
use image::DynamicImage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::detector::FaceDetector;
use crate::error::{io_at, PipelineError};
use crate::event::{percent, EventSink, Status};
use crate::layout::Layout;
use crate::sync::{sync_folders, FolderMatch};

/// File extensions accepted as input images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Default downscale factor applied before detection.
pub const DEFAULT_RESIZE_SCALE: f32 = 0.5;

/// Tunables of a sort run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Params {
    /// Minimum cosine similarity to join an existing identity.
    pub threshold: f32,
    /// Image scale factor applied before detection.
    pub resize_scale: f32,
    /// Minimum embeddings per identity after re-clustering.
    pub min_cluster_size: usize,
    /// How old identity folders follow re-clustered ids.
    pub folder_match: FolderMatch,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            resize_scale: DEFAULT_RESIZE_SCALE,
            min_cluster_size: DEFAULT_MIN_CLUSTER_SIZE,
            folder_match: FolderMatch::Legacy,
        }
    }
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Scanning,
    Reclustering,
    Cancelled,
    Done,
    Errored,
}

/// How a run ended.
#[derive(Debug)]
pub enum Outcome {
    /// All files processed, store re-clustered and saved.
    Done { files: usize, identities: usize },
    /// Stopped before file `processed + 1`; nothing saved.
    Cancelled { processed: usize },
    /// Stopped by an error; nothing saved.
    Failed(PipelineError),
}

impl Outcome {
    /// Terminal state matching this outcome.
    pub fn state(&self) -> RunState {
        match self {
            Self::Done { .. } => RunState::Done,
            Self::Cancelled { .. } => RunState::Cancelled,
            Self::Failed(_) => RunState::Errored,
        }
    }
}

/// Sorts photos by face identity.
///
/// Owns the detector, the output layout and the run parameters. One
/// `Sorter` may serve many runs, but runs must not overlap; see
/// [`Controller`](crate::Controller).
pub struct Sorter {
    detector: Arc<dyn FaceDetector>,
    layout: Layout,
    params: Params,
}

impl Sorter {
    pub fn new(detector: Arc<dyn FaceDetector>, layout: Layout, params: Params) -> Self {
        Self {
            detector,
            layout,
            params,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Runs a full sort of `input`.
    ///
    /// `cancel` is polled once per file, before the file is touched.
    /// Every error is reported as a `(None, error, None)` log event and
    /// returned as [`Outcome::Failed`].
    pub fn run(&self, input: &Path, cancel: &CancellationToken, events: &EventSink) -> Outcome {
        match self.try_run(input, cancel, events) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(input = %input.display(), error = %e, "sort run failed");
                events.log(None, Status::Error, None);
                Outcome::Failed(e)
            }
        }
    }

    fn try_run(
        &self,
        input: &Path,
        cancel: &CancellationToken,
        events: &EventSink,
    ) -> Result<Outcome, PipelineError> {
        let mut store = self.layout.cache().load();
        let files = collect_images(input, &[self.layout.output_root()])?;
        let total = files.len();
        debug!(state = ?RunState::Scanning, total, known = store.len(), "scanning input");

        for (i, path) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(processed = i, total, "sort run cancelled");
                events.log(None, Status::Cancelled, None);
                return Ok(Outcome::Cancelled { processed: i });
            }
            self.process(path, &mut store, events)?;
            events.progress(percent(i + 1, total));
        }

        debug!(state = ?RunState::Reclustering, embeddings = store.embedding_count(), "reclustering");
        let previous_ids = store.ids().to_vec();
        let Reclustered { store, first_seen } = recluster(&store, self.params.min_cluster_size);
        let report = sync_folders(
            &previous_ids,
            &first_seen,
            self.layout.output_root(),
            self.params.folder_match,
        )?;
        self.layout.cache().save(&store)?;

        info!(
            files = total,
            identities = store.len(),
            moved = report.moved.len(),
            orphaned = report.orphaned.len(),
            "sort run done"
        );
        events.log(None, Status::Done, None);
        Ok(Outcome::Done {
            files: total,
            identities: store.len(),
        })
    }

    fn process(
        &self,
        path: &Path,
        store: &mut IdentityStore,
        events: &EventSink,
    ) -> Result<(), PipelineError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let image = match decode(path) {
            Ok(image) => image,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cannot decode image");
                events.log(Some(&filename), Status::ReadError, None);
                return Ok(());
            }
        };

        let small = downscale(&image, self.params.resize_scale);
        let faces = self.detector.detect(&small, path)?;

        match faces.as_slice() {
            [] => events.log(Some(&filename), Status::NoFace, None),
            [face] => {
                let assignment = match_or_add(store, &face.embedding, self.params.threshold);
                copy_into(path, &self.layout.identity_dir(&assignment.id), &filename)?;
                debug!(file = %filename, id = %assignment.id, created = assignment.created, "face assigned");
                events.log(Some(&filename), Status::Success, Some(&assignment.id));
            }
            _ => {
                copy_into(path, self.layout.group_dir(), &filename)?;
                events.log(Some(&filename), Status::GroupPhoto, None);
            }
        }
        Ok(())
    }
}

/// Returns true if `path` has an allowed image extension.
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|x| ext.eq_ignore_ascii_case(x)))
}

/// Lists image files under `root`, depth first, sorted by name.
///
/// Directories in `skip` are not descended into. Unreadable entries are
/// logged and skipped.
pub fn collect_images(root: &Path, skip: &[&Path]) -> Result<Vec<PathBuf>, PipelineError> {
    if !root.is_dir() {
        return Err(io_at(root)(io::Error::new(
            io::ErrorKind::NotFound,
            "input is not a directory",
        )));
    }

    let skip: Vec<PathBuf> = skip.iter().filter_map(|s| s.canonicalize().ok()).collect();
    let skipped = |e: &walkdir::DirEntry| {
        e.file_type().is_dir()
            && e.path()
                .canonicalize()
                .is_ok_and(|p| skip.iter().any(|s| *s == p))
    };

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !skipped(e));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() && is_image_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Decodes by content, so a misnamed extension still loads.
fn decode(path: &Path) -> image::ImageResult<DynamicImage> {
    image::io::Reader::open(path)?.with_guessed_format()?.decode()
}

fn downscale(image: &DynamicImage, scale: f32) -> Cow<'_, DynamicImage> {
    if scale == 1.0 || !scale.is_finite() || scale <= 0.0 {
        return Cow::Borrowed(image);
    }
    let w = ((image.width() as f32 * scale).round() as u32).max(1);
    let h = ((image.height() as f32 * scale).round() as u32).max(1);
    Cow::Owned(image.resize_exact(w, h, FilterType::Triangle))
}

fn copy_into(src: &Path, dir: &Path, filename: &str) -> Result<(), PipelineError> {
    fs::create_dir_all(dir).map_err(io_at(dir))?;
    let dst = dir.join(filename);
    fs::copy(src, &dst).map_err(io_at(&dst))?;
    Ok(())
}
