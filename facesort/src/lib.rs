//! Sorts a photo collection into per-person folders.
//!
//! Each image under an input directory is decoded, downscaled and passed
//! to a [`FaceDetector`]. Photos with exactly one face are copied into the
//! folder of the matching identity (a new `person_<n>` when nothing is
//! close enough); photos with several faces go to the group folder. After
//! all files are processed the identity store is re-clustered, existing
//! folders are reconciled with the new ids, and the store is saved.
//!
//! Runs execute on a worker thread owned by a [`Controller`]; progress and
//! per-file results arrive as [`Event`]s over a channel.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use facesort::{Controller, Settings, SidecarDetector, Sorter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::default();
//! let sorter = Sorter::new(Arc::new(SidecarDetector::new()), settings.layout(), settings.params());
//! let controller = Controller::new(sorter);
//!
//! let mut run = controller.start("photos")?;
//! while let Some(event) = run.events().blocking_recv() {
//!     println!("{event:?}");
//! }
//! let (outcome, _) = run.join();
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

mod controller;
mod detector;
mod error;
mod event;
mod layout;
mod pipeline;
mod settings;
mod sync;

pub use controller::{Controller, RunHandle};
pub use detector::{DetectError, Face, FaceDetector, SidecarDetector, SIDECAR_SUFFIX};
pub use error::{ControllerError, PipelineError};
pub use event::{channel, percent, Event, EventSink, LogEvent, Status};
pub use layout::{Layout, DEFAULT_CACHE_FILE, DEFAULT_GROUP_DIR, DEFAULT_OUTPUT_DIR};
pub use pipeline::{
    collect_images, is_image_file, Outcome, Params, RunState, Sorter, DEFAULT_RESIZE_SCALE,
    IMAGE_EXTENSIONS,
};
pub use settings::{Settings, SettingsError, DEFAULT_BASE_DIR, DEFAULT_CONFIG_FILE};
pub use sync::{sync_folders, FolderMatch, SyncReport};

pub use facesort_faceid as faceid;
