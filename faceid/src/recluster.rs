use std::collections::BTreeMap;

use tracing::info;

use crate::hdbscan::{hdbscan, NOISE};
use crate::store::{IdentityStore, CLUSTER_PREFIX};

/// Default minimum number of embeddings per re-clustered identity.
pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 2;

/// Store rebuilt by [`recluster`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reclustered {
    /// Identities in lexicographic id order.
    pub store: IdentityStore,
    /// The same ids ordered by where each cluster's first embedding sits
    /// in the flattened input.
    pub first_seen: Vec<String>,
}

/// Re-clusters every embedding in `store` from scratch.
///
/// Runs HDBSCAN (Euclidean, `min_samples = min_cluster_size`) over all
/// embeddings in store order. Each cluster label `L` becomes identity
/// `cluster_<L+1>`; the id list is the lexicographically sorted set of
/// those ids. Noise points are dropped: their embeddings are no longer
/// owned by any identity. The previous identities are discarded; only
/// the lifetime person counter carries over.
pub fn recluster(store: &IdentityStore, min_cluster_size: usize) -> Reclustered {
    let mut points: Vec<&[f32]> = Vec::with_capacity(store.embedding_count());
    for (_, embs) in store.iter() {
        points.extend(embs.iter().map(Vec::as_slice));
    }

    let labels = hdbscan(&points, min_cluster_size, min_cluster_size);

    let mut groups: BTreeMap<String, Vec<Vec<f32>>> = BTreeMap::new();
    let mut first_seen = Vec::new();
    let mut noise = 0usize;
    for (emb, &label) in points.iter().zip(labels.iter()) {
        if label == NOISE {
            noise += 1;
            continue;
        }
        let id = format!("{CLUSTER_PREFIX}{}", label + 1);
        if !groups.contains_key(&id) {
            first_seen.push(id.clone());
        }
        groups.entry(id).or_default().push(emb.to_vec());
    }

    info!(
        points = points.len(),
        clusters = groups.len(),
        noise,
        "reclustered identities"
    );
    Reclustered {
        store: IdentityStore::from_groups(groups, store),
        first_seen,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::match_or_add;

    fn build(embs: &[Vec<f32>], threshold: f32) -> IdentityStore {
        let mut store = IdentityStore::new();
        for e in embs {
            match_or_add(&mut store, e, threshold);
        }
        store
    }

    fn two_groups_and_outlier() -> Vec<Vec<f32>> {
        vec![
            vec![1.0, 0.0, 0.0],
            vec![0.99, 0.1, 0.0],
            vec![0.98, 0.15, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.1, 0.99, 0.0],
            vec![0.15, 0.98, 0.0],
            vec![0.0, 0.0, 1.0],
        ]
    }

    #[test]
    fn empty_store_stays_empty() {
        let out = recluster(&IdentityStore::new(), 2).store;
        assert!(out.is_empty());
    }

    #[test]
    fn corrects_greedy_merge() {
        // A permissive threshold lumps everything into person_1.
        let store = build(&two_groups_and_outlier(), -0.5);
        assert_eq!(store.len(), 1);

        let out = recluster(&store, 2).store;
        assert_eq!(out.ids(), &["cluster_1".to_string(), "cluster_2".to_string()]);
        assert_eq!(out.embeddings("cluster_1").unwrap().len(), 3);
        assert_eq!(out.embeddings("cluster_2").unwrap().len(), 3);
    }

    #[test]
    fn noise_is_dropped() {
        let store = build(&two_groups_and_outlier(), 0.62);
        let out = recluster(&store, 2).store;

        let outlier = vec![0.0, 0.0, 1.0];
        assert_eq!(out.embedding_count(), 6);
        assert!(out.iter().all(|(_, embs)| !embs.contains(&outlier)));
    }

    #[test]
    fn old_identities_discarded() {
        let store = build(&two_groups_and_outlier(), 0.62);
        assert!(store.contains("person_1"));
        let out = recluster(&store, 2).store;
        assert!(out.ids().iter().all(|id| id.starts_with(CLUSTER_PREFIX)));
        assert!(!out.contains("person_1"));
    }

    #[test]
    fn person_counter_survives() {
        let store = build(&two_groups_and_outlier(), 0.62);
        let created = store.persons_created();
        let mut out = recluster(&store, 2).store;
        assert_eq!(out.persons_created(), created);

        let a = match_or_add(&mut out, &[-1.0, 0.0, 0.0], 0.62);
        assert_eq!(a.id, format!("person_{}", created + 1));
    }

    #[test]
    fn ids_sorted_lexicographically() {
        // Eleven well separated pairs produce cluster_1..cluster_11.
        let mut embs = Vec::new();
        for i in 0..11 {
            let mut a = vec![0.0f32; 11];
            a[i] = 1.0;
            let mut b = a.clone();
            b[(i + 1) % 11] = 0.05;
            embs.push(a);
            embs.push(b);
        }
        let out = recluster(&build(&embs, 0.62), 2).store;
        assert_eq!(out.len(), 11);
        let mut sorted = out.ids().to_vec();
        sorted.sort();
        assert_eq!(out.ids(), sorted.as_slice());
        assert_eq!(out.ids()[1], "cluster_10");
    }

    #[test]
    fn min_cluster_size_respected() {
        let store = build(&two_groups_and_outlier(), 0.62);
        for k in 1..5 {
            let out = recluster(&store, k).store;
            for (id, embs) in out.iter() {
                assert!(embs.len() >= k, "k={k}: {id} has {} embeddings", embs.len());
            }
        }
    }

    #[test]
    fn reproducible_partition() {
        let store = build(&two_groups_and_outlier(), 0.62);
        assert_eq!(recluster(&store, 2), recluster(&store, 2));
    }

    #[test]
    fn first_seen_follows_flattened_order() {
        // The far group X gets label 0, but the first flattened point
        // belongs to group Y.
        let embs: Vec<Vec<f32>> = vec![
            vec![1.0, 1.0],
            vec![1.01, 1.0],
            vec![1.0, 1.01],
            vec![2.0, 1.0],
            vec![2.01, 1.0],
            vec![2.0, 1.01],
            vec![11.0, 1.0],
            vec![11.01, 1.0],
            vec![11.0, 1.01],
        ];
        let store = build(&embs, -0.5);
        assert_eq!(store.len(), 1);

        let out = recluster(&store, 2);
        assert_eq!(
            out.store.ids(),
            &["cluster_1".to_string(), "cluster_2".to_string(), "cluster_3".to_string()]
        );
        assert_eq!(out.first_seen, vec!["cluster_2", "cluster_3", "cluster_1"]);
        assert!(out.store.embeddings("cluster_2").unwrap().contains(&vec![1.0, 1.0]));
        assert!(out.store.embeddings("cluster_1").unwrap().contains(&vec![11.0, 1.0]));
    }

    #[test]
    fn first_seen_lists_every_cluster_once() {
        let out = recluster(&build(&two_groups_and_outlier(), 0.62), 2);
        let mut sorted = out.first_seen.clone();
        sorted.sort();
        assert_eq!(sorted.as_slice(), out.store.ids());
    }
}
