use std::io;
use std::path::{Path, PathBuf};

use facesort_faceid::FaceIdError;
use thiserror::Error;

use crate::detector::DetectError;

/// Errors that end a sort run or a layout operation.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("facesort: io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("facesort: {0}")]
    Store(#[from] FaceIdError),

    #[error("facesort: {0}")]
    Detect(#[from] DetectError),

    #[error("facesort: invalid identity name: {0:?}")]
    InvalidName(String),

    #[error("facesort: worker panicked")]
    Panicked,
}

/// Returns a mapper attaching `path` to an io error.
pub(crate) fn io_at(path: &Path) -> impl FnOnce(io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Errors returned by [`Controller`](crate::Controller).
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("facesort: a sort run is already active")]
    Busy,

    #[error("facesort: cannot spawn worker: {0}")]
    Spawn(#[source] io::Error),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
