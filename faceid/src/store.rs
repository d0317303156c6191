use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::FaceIdError;

/// Cache format version written by [`CacheFile::save`].
const CACHE_VERSION: u32 = 1;

/// Prefix of ids created by the incremental matcher.
pub const PERSON_PREFIX: &str = "person_";

/// Prefix of ids created by a re-clustering pass.
pub const CLUSTER_PREFIX: &str = "cluster_";

/// Identity id to embedding list, plus the id creation order.
///
/// Every embedding is owned by exactly one identity. The order list
/// drives centroid iteration in the matcher and tie-breaking between
/// equally similar identities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityStore {
    identities: HashMap<String, Vec<Vec<f32>>>,
    order: Vec<String>,
    next_person: u64,
    dim: usize,
}

impl IdentityStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns live identity ids in order.
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    /// Returns the embeddings owned by `id`.
    pub fn embeddings(&self, id: &str) -> Option<&[Vec<f32>]> {
        self.identities.get(id).map(Vec::as_slice)
    }

    /// Returns true if `id` is a live identity.
    pub fn contains(&self, id: &str) -> bool {
        self.identities.contains_key(id)
    }

    /// Returns the number of live identities.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if the store holds no identities.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns the total number of embeddings across all identities.
    pub fn embedding_count(&self) -> usize {
        self.identities.values().map(Vec::len).sum()
    }

    /// Embedding dimension seen by this store, 0 while empty.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of `person_<n>` ids issued over the store's lifetime.
    pub fn persons_created(&self) -> u64 {
        self.next_person
    }

    /// Iterates identities in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Vec<f32>])> {
        self.order.iter().map(move |id| {
            let embs = self.identities.get(id).map(Vec::as_slice).unwrap_or(&[]);
            (id.as_str(), embs)
        })
    }

    /// Appends an embedding to an existing identity.
    pub(crate) fn push(&mut self, id: &str, emb: Vec<f32>) -> Result<(), FaceIdError> {
        let embs = self
            .identities
            .get_mut(id)
            .ok_or_else(|| FaceIdError::UnknownIdentity(id.to_string()))?;
        if self.dim == 0 {
            self.dim = emb.len();
        }
        embs.push(emb);
        Ok(())
    }

    /// Creates the next `person_<n>` identity seeded with one embedding.
    pub(crate) fn create_person(&mut self, emb: Vec<f32>) -> String {
        self.next_person += 1;
        let mut id = format!("{PERSON_PREFIX}{}", self.next_person);
        // A renamed identity may already hold the generated name.
        while self.identities.contains_key(&id) {
            self.next_person += 1;
            id = format!("{PERSON_PREFIX}{}", self.next_person);
        }
        if self.dim == 0 {
            self.dim = emb.len();
        }
        self.identities.insert(id.clone(), vec![emb]);
        self.order.push(id.clone());
        id
    }

    /// Builds a store from already grouped identities, keeping the
    /// lifetime person counter of `previous`.
    pub(crate) fn from_groups(
        groups: BTreeMap<String, Vec<Vec<f32>>>,
        previous: &IdentityStore,
    ) -> Self {
        let order: Vec<String> = groups.keys().cloned().collect();
        Self {
            identities: groups.into_iter().collect(),
            order,
            next_person: previous.next_person,
            dim: previous.dim,
        }
    }

    /// Renames a live identity, keeping its position and embeddings.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), FaceIdError> {
        if !self.identities.contains_key(old) {
            return Err(FaceIdError::UnknownIdentity(old.to_string()));
        }
        if old == new {
            return Ok(());
        }
        if self.identities.contains_key(new) {
            return Err(FaceIdError::IdentityExists(new.to_string()));
        }
        if let Some(embs) = self.identities.remove(old) {
            self.identities.insert(new.to_string(), embs);
        }
        for id in self.order.iter_mut() {
            if id == old {
                *id = new.to_string();
            }
        }
        Ok(())
    }
}

/// On-disk representation of an [`IdentityStore`].
#[derive(Debug, Serialize, Deserialize)]
struct CacheDoc {
    version: u32,
    #[serde(default)]
    dim: usize,
    #[serde(default)]
    next_person: u64,
    order: Vec<String>,
    identities: BTreeMap<String, Vec<Vec<f32>>>,
}

impl CacheDoc {
    fn into_store(self) -> Option<IdentityStore> {
        if self.version != CACHE_VERSION {
            return None;
        }
        let unique: HashSet<&String> = self.order.iter().collect();
        if unique.len() != self.order.len() || unique.len() != self.identities.len() {
            return None;
        }
        if !self.order.iter().all(|id| self.identities.contains_key(id)) {
            return None;
        }
        Some(IdentityStore {
            identities: self.identities.into_iter().collect(),
            order: self.order,
            next_person: self.next_person,
            dim: self.dim,
        })
    }
}

/// JSON file persisting one [`IdentityStore`].
#[derive(Debug, Clone)]
pub struct CacheFile {
    path: PathBuf,
}

impl CacheFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the cache file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted store.
    ///
    /// Never fails: a missing, unreadable or corrupt cache yields an
    /// empty store.
    pub fn load(&self) -> IdentityStore {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return IdentityStore::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cache unreadable, starting empty");
                return IdentityStore::new();
            }
        };
        let doc: CacheDoc = match serde_json::from_slice(&data) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cache corrupt, starting empty");
                return IdentityStore::new();
            }
        };
        match doc.into_store() {
            Some(store) => {
                debug!(path = %self.path.display(), identities = store.len(), "cache loaded");
                store
            }
            None => {
                warn!(path = %self.path.display(), "cache inconsistent, starting empty");
                IdentityStore::new()
            }
        }
    }

    /// Overwrites the cache with `store`.
    ///
    /// Writes a sibling temp file first and renames it over the target.
    pub fn save(&self, store: &IdentityStore) -> Result<(), FaceIdError> {
        let doc = CacheDoc {
            version: CACHE_VERSION,
            dim: store.dim,
            next_person: store.next_person,
            order: store.order.clone(),
            identities: store
                .identities
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        let data = serde_json::to_vec(&doc)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), identities = store.len(), "cache saved");
        Ok(())
    }

    /// Deletes the cache file. Succeeds if it does not exist.
    pub fn remove(&self) -> Result<(), FaceIdError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
