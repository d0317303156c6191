use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One detected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    /// L2-normalized identity embedding. The dimension is fixed per
    /// detector and never validated here.
    pub embedding: Vec<f32>,
}

/// Errors raised by a [`FaceDetector`]. Fatal for the current run.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("detector: {0}")]
    Model(String),

    #[error("detector: io error: {0}")]
    Io(#[from] io::Error),

    #[error("detector: invalid sidecar {}: {source}", path.display())]
    Sidecar {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Finds faces in an image and embeds each one.
///
/// The image passed in has already been downscaled by the run's resize
/// factor. `source` is the file the image was decoded from.
///
/// # Thread Safety
///
/// Implementations must be safe for concurrent use; the detector is
/// shared with the worker thread.
pub trait FaceDetector: Send + Sync {
    /// Returns zero or more faces found in `image`.
    fn detect(&self, image: &DynamicImage, source: &Path) -> Result<Vec<Face>, DetectError>;
}

/// Suffix appended to an image path to locate its sidecar.
pub const SIDECAR_SUFFIX: &str = ".faces.json";

/// Reads precomputed faces from a JSON sidecar next to each image.
///
/// For `photos/a.jpg` the sidecar is `photos/a.jpg.faces.json`, holding
/// `[{"embedding": [...]}, ...]`. A missing sidecar means no faces.
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarDetector;

impl SidecarDetector {
    pub fn new() -> Self {
        Self
    }

    /// Returns the sidecar path for `source`.
    pub fn sidecar_path(source: &Path) -> PathBuf {
        let mut p = source.as_os_str().to_owned();
        p.push(SIDECAR_SUFFIX);
        PathBuf::from(p)
    }
}

impl FaceDetector for SidecarDetector {
    fn detect(&self, _image: &DynamicImage, source: &Path) -> Result<Vec<Face>, DetectError> {
        let path = Self::sidecar_path(source);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&data).map_err(|source| DetectError::Sidecar { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn blank() -> DynamicImage {
        DynamicImage::new_rgb8(2, 2)
    }

    #[test]
    fn sidecar_path_appends_suffix() {
        let p = SidecarDetector::sidecar_path(Path::new("dir/a.jpg"));
        assert_eq!(p, PathBuf::from("dir/a.jpg.faces.json"));
    }

    #[test]
    fn missing_sidecar_is_no_face() {
        let dir = tempdir().unwrap();
        let faces = SidecarDetector::new()
            .detect(&blank(), &dir.path().join("a.jpg"))
            .unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn reads_faces() {
        let dir = tempdir().unwrap();
        let img = dir.path().join("a.jpg");
        fs::write(
            SidecarDetector::sidecar_path(&img),
            br#"[{"embedding":[1.0,0.0]},{"embedding":[0.0,1.0]}]"#,
        )
        .unwrap();
        let faces = SidecarDetector::new().detect(&blank(), &img).unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[1].embedding, vec![0.0, 1.0]);
    }

    #[test]
    fn malformed_sidecar_is_error() {
        let dir = tempdir().unwrap();
        let img = dir.path().join("a.jpg");
        fs::write(SidecarDetector::sidecar_path(&img), b"[{").unwrap();
        let err = SidecarDetector::new().detect(&blank(), &img).unwrap_err();
        assert!(matches!(err, DetectError::Sidecar { .. }));
    }
}
