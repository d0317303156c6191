//! User settings stored as YAML.
//!
//! Settings live in `~/.facesort/config.yaml` unless another path is
//! given. Every field has a default, so a partial file is valid and a
//! missing file means all defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use facesort_faceid::{DEFAULT_MIN_CLUSTER_SIZE, DEFAULT_THRESHOLD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layout::{Layout, DEFAULT_CACHE_FILE, DEFAULT_GROUP_DIR, DEFAULT_OUTPUT_DIR};
use crate::pipeline::{Params, DEFAULT_RESIZE_SCALE};
use crate::sync::FolderMatch;

/// Default base directory name under the home directory.
pub const DEFAULT_BASE_DIR: &str = ".facesort";
/// Default settings filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings: io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("settings: cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("settings: invalid value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Cosine similarity an embedding must exceed to join an identity.
    pub sim_threshold: f32,
    /// Image scale applied before detection. Values above 1 upscale.
    pub resize_scale: f32,
    pub min_cluster_size: usize,
    pub folder_match: FolderMatch,
    pub output_dir: PathBuf,
    pub group_dir_name: String,
    pub cache_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sim_threshold: DEFAULT_THRESHOLD,
            resize_scale: DEFAULT_RESIZE_SCALE,
            min_cluster_size: DEFAULT_MIN_CLUSTER_SIZE,
            folder_match: FolderMatch::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            group_dir_name: DEFAULT_GROUP_DIR.to_string(),
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
        }
    }
}

impl Settings {
    /// Gets the default settings path (~/.facesort/config.yaml).
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR).join(DEFAULT_CONFIG_FILE))
    }

    /// Loads settings from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the full settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |source: io::Error| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_yaml::to_string(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(io_err)
    }

    /// Rejects out-of-range values.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(-1.0..=1.0).contains(&self.sim_threshold) {
            return Err(SettingsError::Invalid(format!(
                "sim_threshold {} not in [-1, 1]",
                self.sim_threshold
            )));
        }
        if !self.resize_scale.is_finite() || self.resize_scale <= 0.0 {
            return Err(SettingsError::Invalid(format!(
                "resize_scale {} must be a positive number",
                self.resize_scale
            )));
        }
        if self.min_cluster_size < 1 {
            return Err(SettingsError::Invalid("min_cluster_size must be at least 1".into()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(SettingsError::Invalid("output_dir is empty".into()));
        }
        let g = &self.group_dir_name;
        if g.is_empty() || g == "." || g == ".." || g.contains(|c: char| c == '/' || c == '\\') {
            return Err(SettingsError::Invalid(format!("group_dir_name {g:?} is not a folder name")));
        }
        if self.cache_file.as_os_str().is_empty() {
            return Err(SettingsError::Invalid("cache_file is empty".into()));
        }
        Ok(())
    }

    /// Run parameters taken from these settings.
    pub fn params(&self) -> Params {
        Params {
            threshold: self.sim_threshold,
            resize_scale: self.resize_scale,
            min_cluster_size: self.min_cluster_size,
            folder_match: self.folder_match,
        }
    }

    /// Output layout taken from these settings.
    pub fn layout(&self) -> Layout {
        Layout::new(self.output_dir.clone(), &self.group_dir_name, self.cache_file.clone())
    }
}
