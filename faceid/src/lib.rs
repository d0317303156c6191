//! Face identity store with online nearest-centroid matching and
//! offline HDBSCAN re-clustering.
//!
//! The crate knows nothing about images or directories; it only maps
//! identity ids to the embedding vectors that belong to them.
//!
//! # Usage
//!
//! ```
//! use facesort_faceid::{match_or_add, recluster, IdentityStore};
//!
//! let mut store = IdentityStore::new();
//!
//! // Online: greedy assignment against current centroids.
//! let a = match_or_add(&mut store, &[1.0, 0.0, 0.0], 0.62);
//! assert_eq!(a.id, "person_1");
//!
//! // Offline: global re-clustering corrects greedy drift.
//! let rebuilt = recluster(&store, 2);
//! assert!(rebuilt.store.is_empty());
//! ```
//!
//! # Design
//!
//! [`match_or_add`] is order dependent: early embeddings shape the
//! centroids later ones are compared against. [`recluster`] discards the
//! greedy partition and rebuilds identities from every embedding at
//! once. Embeddings the clusterer labels as noise are dropped from the
//! rebuilt store.

mod error;
pub mod hdbscan;
mod matcher;
mod recluster;
mod store;
pub mod vector;

pub use error::FaceIdError;
pub use matcher::{match_or_add, Assignment, DEFAULT_THRESHOLD};
pub use recluster::{recluster, Reclustered, DEFAULT_MIN_CLUSTER_SIZE};
pub use store::{CacheFile, IdentityStore, CLUSTER_PREFIX, PERSON_PREFIX};
