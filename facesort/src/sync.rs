//! Reconciles per-identity output folders with a re-clustered store.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{io_at, PipelineError};

/// Rule mapping an old identity folder to a new identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderMatch {
    /// Containment rule: the destination is the first new id that
    /// contains the old id as a substring, or the first new id at all
    /// when the old id is itself still live. New ids are walked in
    /// first-seen order, see
    /// [`Reclustered::first_seen`](facesort_faceid::Reclustered::first_seen).
    ///
    /// This mis-routes lexically overlapping ids (`cluster_1` lands in
    /// `cluster_10`) and merges every live folder into the first live
    /// id. `person_<n>` folders never match `cluster_<n>` ids and are
    /// left in place.
    #[default]
    Legacy,

    /// A folder stays only if its id is still live; every other folder
    /// is left in place.
    Strict,
}

impl fmt::Display for FolderMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => write!(f, "legacy"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

impl FromStr for FolderMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(Self::Legacy),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown folder match rule: {other}")),
        }
    }
}

impl FolderMatch {
    /// Destination id for the folder of `old`, `None` to leave it alone.
    pub fn destination<'a>(&self, old: &str, new_ids: &'a [String]) -> Option<&'a str> {
        match self {
            Self::Legacy => {
                let live = new_ids.iter().any(|new| new == old);
                new_ids
                    .iter()
                    .find(|new| live || new.contains(old))
                    .map(String::as_str)
            }
            Self::Strict => new_ids
                .iter()
                .find(|new| new.as_str() == old)
                .map(String::as_str),
        }
    }
}

/// What [`sync_folders`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// `(old, new)` folder moves, in processing order.
    pub moved: Vec<(String, String)>,
    /// Old folders with no destination, left where they are.
    pub orphaned: Vec<String>,
}

/// Moves the folders of `previous_ids` under `output_root` to their
/// destination among `new_ids`.
///
/// `new_ids` is the live id list in the order the rule walks it.
/// Folders are processed in `previous_ids` order. Moving merges into an
/// existing destination; a file that already exists there is replaced
/// (last write wins). The emptied source folder is removed.
pub fn sync_folders(
    previous_ids: &[String],
    new_ids: &[String],
    output_root: &Path,
    rule: FolderMatch,
) -> Result<SyncReport, PipelineError> {
    let mut report = SyncReport::default();
    for old in previous_ids {
        let src = output_root.join(old);
        if !src.is_dir() {
            continue;
        }
        match rule.destination(old, new_ids) {
            None => {
                debug!(folder = %old, "no destination, folder left in place");
                report.orphaned.push(old.clone());
            }
            Some(new) if new == old => {}
            Some(new) => {
                merge_dir(&src, &output_root.join(new))?;
                debug!(from = %old, to = %new, "folder merged");
                report.moved.push((old.clone(), new.to_string()));
            }
        }
    }
    Ok(report)
}

/// Moves every entry of `src` into `dst` and removes `src`.
///
/// Existing entries in `dst` with the same name are replaced.
pub(crate) fn merge_dir(src: &Path, dst: &Path) -> Result<usize, PipelineError> {
    fs::create_dir_all(dst).map_err(io_at(dst))?;

    let mut entries = fs::read_dir(src)
        .map_err(io_at(src))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_at(src))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in &entries {
        let from = entry.path();
        let to = dst.join(entry.file_name());
        if let Ok(meta) = fs::symlink_metadata(&to) {
            warn!(path = %to.display(), "replacing existing entry");
            if meta.is_dir() {
                fs::remove_dir_all(&to).map_err(io_at(&to))?;
            } else {
                fs::remove_file(&to).map_err(io_at(&to))?;
            }
        }
        fs::rename(&from, &to).map_err(io_at(&from))?;
    }
    fs::remove_dir_all(src).map_err(io_at(src))?;
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn put(root: &Path, folder: &str, file: &str, body: &str) {
        let dir = root.join(folder);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), body).unwrap();
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn legacy_person_folders_orphaned() {
        let dir = tempdir().unwrap();
        put(dir.path(), "person_1", "a.jpg", "a");
        let new = ids(&["cluster_1"]);

        let report =
            sync_folders(&ids(&["person_1"]), &new, dir.path(), FolderMatch::Legacy).unwrap();
        assert_eq!(report.orphaned, ids(&["person_1"]));
        assert!(dir.path().join("person_1/a.jpg").is_file());
        assert!(!dir.path().join("cluster_1").exists());
    }

    #[test]
    fn legacy_substring_misroutes() {
        let dir = tempdir().unwrap();
        put(dir.path(), "cluster_1", "a.jpg", "a");
        let new = ids(&["cluster_10", "cluster_2"]);

        let report =
            sync_folders(&ids(&["cluster_1"]), &new, dir.path(), FolderMatch::Legacy).unwrap();
        assert_eq!(report.moved, vec![("cluster_1".to_string(), "cluster_10".to_string())]);
        assert!(dir.path().join("cluster_10/a.jpg").is_file());
        assert!(!dir.path().join("cluster_1").exists());
    }

    #[test]
    fn legacy_merges_live_folders_last_write_wins() {
        let dir = tempdir().unwrap();
        put(dir.path(), "cluster_1", "x.jpg", "first");
        put(dir.path(), "cluster_1", "only1.jpg", "1");
        put(dir.path(), "cluster_2", "x.jpg", "second");
        put(dir.path(), "cluster_2", "only2.jpg", "2");
        let new = ids(&["cluster_1", "cluster_2"]);

        let report = sync_folders(
            &ids(&["cluster_1", "cluster_2"]),
            &new,
            dir.path(),
            FolderMatch::Legacy,
        )
        .unwrap();

        assert_eq!(report.moved, vec![("cluster_2".to_string(), "cluster_1".to_string())]);
        let dst = dir.path().join("cluster_1");
        assert_eq!(fs::read_to_string(dst.join("x.jpg")).unwrap(), "second");
        assert!(dst.join("only1.jpg").is_file());
        assert!(dst.join("only2.jpg").is_file());
        assert!(!dir.path().join("cluster_2").exists());
    }

    #[test]
    fn legacy_walks_first_seen_order() {
        let dir = tempdir().unwrap();
        put(dir.path(), "cluster_1", "a.jpg", "a");
        put(dir.path(), "cluster_2", "b.jpg", "b");
        let new = ids(&["cluster_2", "cluster_1"]);

        let report = sync_folders(
            &ids(&["cluster_1", "cluster_2"]),
            &new,
            dir.path(),
            FolderMatch::Legacy,
        )
        .unwrap();

        assert_eq!(report.moved, vec![("cluster_1".to_string(), "cluster_2".to_string())]);
        assert!(dir.path().join("cluster_2/a.jpg").is_file());
        assert!(dir.path().join("cluster_2/b.jpg").is_file());
        assert!(!dir.path().join("cluster_1").exists());
    }

    #[test]
    fn strict_keeps_live_and_orphans_rest() {
        let dir = tempdir().unwrap();
        put(dir.path(), "cluster_1", "a.jpg", "a");
        put(dir.path(), "cluster_2", "b.jpg", "b");
        put(dir.path(), "cluster_3", "c.jpg", "c");
        let new = ids(&["cluster_1", "cluster_2"]);

        let report = sync_folders(
            &ids(&["cluster_1", "cluster_2", "cluster_3"]),
            &new,
            dir.path(),
            FolderMatch::Strict,
        )
        .unwrap();

        assert!(report.moved.is_empty());
        assert_eq!(report.orphaned, ids(&["cluster_3"]));
        assert!(dir.path().join("cluster_1/a.jpg").is_file());
        assert!(dir.path().join("cluster_2/b.jpg").is_file());
        assert!(dir.path().join("cluster_3/c.jpg").is_file());
    }

    #[test]
    fn unlisted_folders_untouched() {
        let dir = tempdir().unwrap();
        put(dir.path(), "Group_Photos", "g.jpg", "g");
        let new = ids(&["cluster_1"]);

        let report = sync_folders(&[], &new, dir.path(), FolderMatch::Legacy).unwrap();
        assert_eq!(report, SyncReport::default());
        assert!(dir.path().join("Group_Photos/g.jpg").is_file());
    }

    #[test]
    fn missing_folders_skipped() {
        let dir = tempdir().unwrap();
        let new = ids(&["cluster_1"]);
        let report =
            sync_folders(&ids(&["cluster_9"]), &new, dir.path(), FolderMatch::Legacy).unwrap();
        assert_eq!(report, SyncReport::default());
    }

    #[test]
    fn folder_match_parse() {
        assert_eq!("legacy".parse::<FolderMatch>().unwrap(), FolderMatch::Legacy);
        assert_eq!("strict".parse::<FolderMatch>().unwrap(), FolderMatch::Strict);
        assert!("loose".parse::<FolderMatch>().is_err());
        assert_eq!(FolderMatch::Strict.to_string(), "strict");
    }
}
