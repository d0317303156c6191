use crate::store::IdentityStore;
use crate::vector::{cosine_sim, mean};

/// Default minimum cosine similarity to join an existing identity.
pub const DEFAULT_THRESHOLD: f32 = 0.62;

/// Result of routing one embedding through [`match_or_add`].
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Identity the embedding now belongs to.
    pub id: String,

    /// Best centroid similarity seen, `None` when the store was empty.
    pub similarity: Option<f32>,

    /// True if a new identity was created for this embedding.
    pub created: bool,
}

/// Assigns `emb` to the most similar identity or creates a new one.
///
/// Each identity's centroid is the arithmetic mean of all its embeddings,
/// recomputed on every call so it always reflects current membership.
/// The embedding joins the identity with the highest cosine similarity
/// if that similarity is strictly greater than `threshold`; ties go to
/// the identity that comes first in store order. Otherwise a new
/// `person_<n>` identity is created and seeded with `emb`.
pub fn match_or_add(store: &mut IdentityStore, emb: &[f32], threshold: f32) -> Assignment {
    let mut best: Option<(usize, f32)> = None;
    for (i, (_, embs)) in store.iter().enumerate() {
        let sim = cosine_sim(emb, &mean(embs));
        match best {
            Some((_, best_sim)) if sim <= best_sim => {}
            _ => best = Some((i, sim)),
        }
    }

    if let Some((idx, sim)) = best {
        if sim > threshold {
            let id = store.ids()[idx].clone();
            // The id was just read from the store, so push cannot miss.
            if store.push(&id, emb.to_vec()).is_ok() {
                return Assignment {
                    id,
                    similarity: Some(sim),
                    created: false,
                };
            }
        }
    }

    let id = store.create_person(emb.to_vec());
    Assignment {
        id,
        similarity: best.map(|(_, s)| s),
        created: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_creates_first_identity() {
        let mut store = IdentityStore::new();
        let a = match_or_add(&mut store, &[1.0, 0.0, 0.0], DEFAULT_THRESHOLD);
        assert_eq!(a.id, "person_1");
        assert!(a.created);
        assert_eq!(a.similarity, None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn similar_embedding_joins_identity() {
        let mut store = IdentityStore::new();
        match_or_add(&mut store, &[1.0, 0.0, 0.0], DEFAULT_THRESHOLD);
        let a = match_or_add(&mut store, &[0.99, 0.1, 0.0], DEFAULT_THRESHOLD);
        assert_eq!(a.id, "person_1");
        assert!(!a.created);
        assert!(a.similarity.unwrap() > 0.9);
        assert_eq!(store.embeddings("person_1").unwrap().len(), 2);
    }

    #[test]
    fn dissimilar_embedding_creates_identity() {
        let mut store = IdentityStore::new();
        match_or_add(&mut store, &[1.0, 0.0, 0.0], DEFAULT_THRESHOLD);
        let a = match_or_add(&mut store, &[0.0, 1.0, 0.0], DEFAULT_THRESHOLD);
        assert_eq!(a.id, "person_2");
        assert!(a.created);
        assert_eq!(store.ids(), &["person_1".to_string(), "person_2".to_string()]);
    }

    #[test]
    fn threshold_is_strict() {
        let mut store = IdentityStore::new();
        match_or_add(&mut store, &[1.0, 0.0], 0.5);
        // Similarity of exactly 1.0 does not exceed a threshold of 1.0.
        let a = match_or_add(&mut store, &[1.0, 0.0], 1.0);
        assert!(a.created);
    }

    #[test]
    fn tie_goes_to_first_identity() {
        let mut store = IdentityStore::new();
        match_or_add(&mut store, &[1.0, 0.0], 0.9);
        match_or_add(&mut store, &[0.0, 1.0], 0.9);
        // Equidistant from both centroids.
        let a = match_or_add(&mut store, &[1.0, 1.0], 0.5);
        assert_eq!(a.id, "person_1");
    }

    #[test]
    fn centroid_tracks_membership() {
        let mut store = IdentityStore::new();
        match_or_add(&mut store, &[1.0, 0.0], 0.5);
        match_or_add(&mut store, &[0.8, 0.6], 0.5);
        // Centroid is now (0.9, 0.3); this vector only matches because
        // the second member pulled the centroid toward it.
        let a = match_or_add(&mut store, &[0.6, 0.8], 0.8);
        assert_eq!(a.id, "person_1");
    }

    #[test]
    fn deterministic_for_same_state() {
        let mut base = IdentityStore::new();
        match_or_add(&mut base, &[1.0, 0.0, 0.0], DEFAULT_THRESHOLD);
        match_or_add(&mut base, &[0.0, 1.0, 0.0], DEFAULT_THRESHOLD);

        let query = [0.7, 0.7, 0.1];
        let mut s1 = base.clone();
        let mut s2 = base.clone();
        assert_eq!(
            match_or_add(&mut s1, &query, DEFAULT_THRESHOLD),
            match_or_add(&mut s2, &query, DEFAULT_THRESHOLD)
        );
        assert_eq!(s1, s2);
    }

    #[test]
    fn every_embedding_owned_once() {
        let seq: Vec<Vec<f32>> = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.9, 0.1, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.1, 0.9, 0.0],
            vec![0.0, 0.1, 0.9],
        ];
        let mut store = IdentityStore::new();
        for emb in &seq {
            match_or_add(&mut store, emb, DEFAULT_THRESHOLD);
        }
        assert_eq!(store.embedding_count(), seq.len());
        for emb in &seq {
            let owners = store
                .iter()
                .filter(|(_, embs)| embs.iter().any(|e| e == emb))
                .count();
            assert_eq!(owners, 1);
        }
    }

    #[test]
    fn higher_threshold_never_fewer_identities() {
        // Three tight groups around the axes, interleaved.
        let seq: Vec<Vec<f32>> = vec![
            vec![1.0, 0.0, 0.03],
            vec![0.0, 1.0, 0.03],
            vec![0.03, 0.0, 1.0],
            vec![1.0, 0.03, 0.0],
            vec![0.03, 1.0, 0.0],
            vec![0.0, 0.03, 1.0],
            vec![1.0, 0.0, -0.03],
            vec![0.0, 1.0, -0.03],
            vec![-0.03, 0.0, 1.0],
        ];

        let counts: Vec<usize> = [-0.5, 0.1, 0.5, 0.9, 0.9999]
            .iter()
            .map(|&threshold| {
                let mut store = IdentityStore::new();
                for emb in &seq {
                    match_or_add(&mut store, emb, threshold);
                }
                store.len()
            })
            .collect();

        assert_eq!(counts, vec![1, 3, 3, 3, 9]);
        assert!(counts.windows(2).all(|w| w[0] <= w[1]));
    }
}
