use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use facesort_faceid::CacheFile;
use tracing::info;

use crate::error::{io_at, PipelineError};
use crate::sync::merge_dir;

/// Default output root, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "Sorted_Images_Pro";
/// Default name of the multi-face folder inside the output root.
pub const DEFAULT_GROUP_DIR: &str = "Group_Photos";
/// Default identity cache file.
pub const DEFAULT_CACHE_FILE: &str = "facesort_cache.json";

/// Where a sort run keeps its state and its output.
///
/// ```text
/// <output_root>/
///   <identity id>/     copies of single-face photos
///   Group_Photos/      copies of multi-face photos
/// <cache file>         persisted identity store
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    output_root: PathBuf,
    group_dir: PathBuf,
    cache: CacheFile,
}

impl Layout {
    pub fn new(
        output_root: impl Into<PathBuf>,
        group_dir_name: &str,
        cache_file: impl Into<PathBuf>,
    ) -> Self {
        let output_root = output_root.into();
        let group_dir = output_root.join(group_dir_name);
        Self {
            output_root,
            group_dir,
            cache: CacheFile::new(cache_file),
        }
    }

    /// Layout rooted at `base` with default names.
    pub fn in_dir(base: &Path) -> Self {
        Self::new(
            base.join(DEFAULT_OUTPUT_DIR),
            DEFAULT_GROUP_DIR,
            base.join(DEFAULT_CACHE_FILE),
        )
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn group_dir(&self) -> &Path {
        &self.group_dir
    }

    pub fn cache(&self) -> &CacheFile {
        &self.cache
    }

    /// Folder holding the copies assigned to `id`.
    pub fn identity_dir(&self, id: &str) -> PathBuf {
        self.output_root.join(id)
    }

    /// Deletes the cache and the whole output tree.
    ///
    /// Safe to call when nothing exists. Must not run concurrently with
    /// a sort run.
    pub fn reset(&self) -> Result<(), PipelineError> {
        self.cache.remove()?;
        remove_tree(&self.output_root)?;
        remove_tree(&self.group_dir)?;
        info!(output = %self.output_root.display(), "cache and output removed");
        Ok(())
    }

    /// Renames identity `old` to `new` in the cache and on disk.
    ///
    /// The folder of `old`, if any, is merged into the folder of `new`.
    pub fn rename_identity(&self, old: &str, new: &str) -> Result<(), PipelineError> {
        self.check_name(new)?;
        let mut store = self.cache.load();
        store.rename(old, new)?;

        let src = self.identity_dir(old);
        if old != new && src.is_dir() {
            merge_dir(&src, &self.identity_dir(new))?;
        }
        self.cache.save(&store)?;
        info!(from = %old, to = %new, "identity renamed");
        Ok(())
    }

    fn check_name(&self, name: &str) -> Result<(), PipelineError> {
        let reserved = self
            .group_dir
            .file_name()
            .is_some_and(|g| g == name);
        let bad = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(|c: char| c == '/' || c == '\\')
            || reserved;
        if bad {
            return Err(PipelineError::InvalidName(name.to_string()));
        }
        Ok(())
    }
}

fn remove_tree(path: &Path) -> Result<(), PipelineError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_at(path)(e)),
    }
}
