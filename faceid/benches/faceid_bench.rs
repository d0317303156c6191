use criterion::{black_box, criterion_group, criterion_main, Criterion};
use facesort_faceid::{match_or_add, recluster, IdentityStore};

fn normalize(v: &mut [f32]) {
    let norm: f64 = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        let s = (1.0 / norm) as f32;
        for x in v.iter_mut() {
            *x *= s;
        }
    }
}

fn random_unit_vec(dim: usize, seed: u64) -> Vec<f32> {
    let mut state = seed;
    let mut v: Vec<f32> = (0..dim)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((state >> 33) as f32) / (u32::MAX as f32) - 0.5
        })
        .collect();
    normalize(&mut v);
    v
}

/// Faces of one person: a centre plus per-photo jitter.
fn make_person(dim: usize, n: usize, jitter: f32, seed: u64) -> Vec<Vec<f32>> {
    let centre = random_unit_vec(dim, seed);
    (0..n)
        .map(|i| {
            let r = random_unit_vec(dim, seed.wrapping_add(1 + i as u64 * 997));
            let mut v: Vec<f32> = centre.iter().zip(&r).map(|(c, x)| c + x * jitter).collect();
            normalize(&mut v);
            v
        })
        .collect()
}

fn seeded_store(dim: usize, persons: usize, per_person: usize) -> IdentityStore {
    let mut store = IdentityStore::new();
    for p in 0..persons {
        for emb in make_person(dim, per_person, 0.3, 100 * (p as u64 + 1)) {
            match_or_add(&mut store, &emb, 0.62);
        }
    }
    store
}

fn bench_match(c: &mut Criterion) {
    let dim = 512;
    let store = seeded_store(dim, 20, 10);
    let query = random_unit_vec(dim, 999);

    c.bench_function("faceid_match_512d_20identities", |b| {
        b.iter_with_setup(
            || store.clone(),
            |mut s| {
                let _ = black_box(match_or_add(&mut s, black_box(&query), 0.62));
            },
        );
    });
}

fn bench_recluster(c: &mut Criterion) {
    let dim = 512;
    let store = seeded_store(dim, 3, 20);

    c.bench_function("faceid_recluster_512d_60points_3persons", |b| {
        b.iter(|| {
            let _ = black_box(recluster(black_box(&store), 2));
        });
    });
}

criterion_group!(benches, bench_match, bench_recluster);
criterion_main!(benches);
