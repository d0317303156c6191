//! HDBSCAN density clustering over Euclidean distance.
//!
//! Steps:
//!
//! 1. Core distance of each point: distance to its `min_samples`-th
//!    nearest neighbour, counting the point itself.
//! 2. Minimum spanning tree over the mutual reachability distance
//!    `max(core(a), core(b), d(a, b))` (Prim, dense graph).
//! 3. Single-linkage dendrogram from the sorted MST edges.
//! 4. Condensed tree: splits where either side is smaller than
//!    `min_cluster_size` become points falling out of the parent.
//! 5. Excess-of-mass selection of flat clusters; the root is never
//!    selected.
//!
//! Every step breaks ties by index, so labels are reproducible for a
//! fixed input order.
//!
//! Cost: steps 1 and 2 each evaluate every pairwise distance, so a run is
//! O(n² · D) time for n points of dimension D. Distances are recomputed
//! rather than stored, keeping memory at O(n).

use crate::vector::euclidean;

/// Label of points that belong to no cluster.
pub const NOISE: i32 = -1;

/// Smallest distance used when converting to lambda = 1 / distance.
const MIN_DISTANCE: f64 = 1e-12;

/// One edge of the mutual reachability spanning tree.
#[derive(Debug, Clone, Copy)]
struct Edge {
    a: usize,
    b: usize,
    weight: f64,
}

/// Internal dendrogram node; node `n + i` is `merges[i]`.
#[derive(Debug, Clone, Copy)]
struct Merge {
    left: usize,
    right: usize,
    distance: f64,
    size: usize,
}

/// Row of the condensed tree. `child < n` is a point, otherwise a cluster.
#[derive(Debug, Clone, Copy)]
struct CondensedRow {
    parent: usize,
    child: usize,
    lambda: f64,
    size: usize,
}

/// Clusters `points` and returns one label per point.
///
/// Labels are `0..k` for the `k` selected clusters and [`NOISE`] for
/// points that belong to none. `min_cluster_size` below 2 is treated as
/// 2; `min_samples` is clamped to `1..=points.len()`.
pub fn hdbscan(points: &[&[f32]], min_cluster_size: usize, min_samples: usize) -> Vec<i32> {
    let n = points.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![NOISE];
    }

    let min_cluster_size = min_cluster_size.max(2);
    let min_samples = min_samples.clamp(1, n);

    let core = core_distances(points, min_samples);
    let mut edges = spanning_tree(points, &core);
    // Stable sort keeps Prim's discovery order among equal weights.
    edges.sort_by(|x, y| x.weight.total_cmp(&y.weight));
    let merges = single_linkage(n, &edges);
    let (rows, num_clusters) = condense(n, &merges, min_cluster_size);
    let selected = select_clusters(n, &rows, num_clusters);
    label_points(n, &rows, num_clusters, &selected)
}

/// O(n² · D): one full distance row per point, reusing a single buffer.
fn core_distances(points: &[&[f32]], k: usize) -> Vec<f64> {
    let mut dists = vec![0.0f64; points.len()];
    points
        .iter()
        .map(|p| {
            for (slot, q) in dists.iter_mut().zip(points.iter()) {
                *slot = euclidean(p, q);
            }
            let (_, kth, _) = dists.select_nth_unstable_by(k - 1, |x, y| x.total_cmp(y));
            *kth
        })
        .collect()
}

/// Dense Prim. Recomputes distances from each newly added vertex, O(n² · D).
fn spanning_tree(points: &[&[f32]], core: &[f64]) -> Vec<Edge> {
    let n = points.len();
    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut from = vec![0usize; n];
    let mut edges = Vec::with_capacity(n - 1);

    let mut current = 0usize;
    in_tree[current] = true;
    for _ in 1..n {
        let mut next: Option<usize> = None;
        for j in 0..n {
            if in_tree[j] {
                continue;
            }
            let d = euclidean(points[current], points[j])
                .max(core[current])
                .max(core[j]);
            if d < best[j] {
                best[j] = d;
                from[j] = current;
            }
            match next {
                Some(k) if best[j] >= best[k] => {}
                _ => next = Some(j),
            }
        }
        let Some(j) = next else { break };
        in_tree[j] = true;
        edges.push(Edge {
            a: from[j],
            b: j,
            weight: best[j],
        });
        current = j;
    }
    edges
}

fn single_linkage(n: usize, edges: &[Edge]) -> Vec<Merge> {
    let total = 2 * n - 1;
    let mut parent: Vec<usize> = (0..total).collect();
    let mut size = vec![1usize; total];
    let mut merges = Vec::with_capacity(n - 1);

    fn find(parent: &mut [usize], mut x: usize) -> usize {
        let mut root = x;
        while parent[root] != root {
            root = parent[root];
        }
        while parent[x] != root {
            let next = parent[x];
            parent[x] = root;
            x = next;
        }
        root
    }

    let mut next_node = n;
    for e in edges {
        let ra = find(&mut parent, e.a);
        let rb = find(&mut parent, e.b);
        if ra == rb {
            continue;
        }
        let merged = size[ra] + size[rb];
        merges.push(Merge {
            left: ra,
            right: rb,
            distance: e.weight,
            size: merged,
        });
        parent[ra] = next_node;
        parent[rb] = next_node;
        size[next_node] = merged;
        next_node += 1;
    }
    merges
}

/// Breadth-first listing of the dendrogram below `root`, root included.
fn subtree(n: usize, merges: &[Merge], root: usize) -> Vec<usize> {
    let mut out = vec![root];
    let mut i = 0;
    while i < out.len() {
        let node = out[i];
        if node >= n {
            let m = &merges[node - n];
            out.push(m.left);
            out.push(m.right);
        }
        i += 1;
    }
    out
}

/// Emits every point below `side` as falling out of `parent` at `lambda`.
fn fall_out(
    n: usize,
    merges: &[Merge],
    rows: &mut Vec<CondensedRow>,
    ignore: &mut [bool],
    side: usize,
    parent: usize,
    lambda: f64,
) {
    for sub in subtree(n, merges, side) {
        if sub < n {
            rows.push(CondensedRow {
                parent,
                child: sub,
                lambda,
                size: 1,
            });
        }
        ignore[sub] = true;
    }
}

/// Returns the condensed tree rows and the number of condensed clusters.
/// Cluster labels are `n..n + count`, the root being `n`.
fn condense(n: usize, merges: &[Merge], min_cluster_size: usize) -> (Vec<CondensedRow>, usize) {
    let node_size = |node: usize| if node < n { 1 } else { merges[node - n].size };

    // An incomplete dendrogram (disconnected input) has no single root.
    if merges.len() != n - 1 {
        return (Vec::new(), 1);
    }

    let root = n + merges.len() - 1;
    let mut relabel = vec![0usize; root + 1];
    let mut ignore = vec![false; root + 1];
    let mut rows = Vec::with_capacity(2 * n);
    relabel[root] = n;
    let mut next_label = n + 1;

    for node in subtree(n, merges, root) {
        if node < n || ignore[node] {
            continue;
        }
        let m = merges[node - n];
        let lambda = 1.0 / m.distance.max(MIN_DISTANCE);
        let parent = relabel[node];
        let (ls, rs) = (node_size(m.left), node_size(m.right));

        if ls >= min_cluster_size && rs >= min_cluster_size {
            for (side, size) in [(m.left, ls), (m.right, rs)] {
                relabel[side] = next_label;
                rows.push(CondensedRow {
                    parent,
                    child: next_label,
                    lambda,
                    size,
                });
                next_label += 1;
            }
        } else if ls < min_cluster_size && rs < min_cluster_size {
            fall_out(n, merges, &mut rows, &mut ignore, m.left, parent, lambda);
            fall_out(n, merges, &mut rows, &mut ignore, m.right, parent, lambda);
        } else if ls < min_cluster_size {
            relabel[m.right] = parent;
            fall_out(n, merges, &mut rows, &mut ignore, m.left, parent, lambda);
        } else {
            relabel[m.left] = parent;
            fall_out(n, merges, &mut rows, &mut ignore, m.right, parent, lambda);
        }
    }

    (rows, next_label - n)
}

/// Excess-of-mass selection. Returns a flag per condensed cluster.
fn select_clusters(n: usize, rows: &[CondensedRow], num_clusters: usize) -> Vec<bool> {
    let mut birth = vec![0.0f64; num_clusters];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); num_clusters];
    for r in rows.iter().filter(|r| r.child >= n) {
        birth[r.child - n] = r.lambda;
        children[r.parent - n].push(r.child - n);
    }

    let mut stability = vec![0.0f64; num_clusters];
    for r in rows {
        let c = r.parent - n;
        stability[c] += (r.lambda - birth[c]) * r.size as f64;
    }

    let mut selected = vec![true; num_clusters];
    selected[0] = false;
    // Children always carry larger labels than their parents.
    for c in (1..num_clusters).rev() {
        let subtree_stability: f64 = children[c].iter().map(|&k| stability[k]).sum();
        if subtree_stability > stability[c] {
            selected[c] = false;
            stability[c] = subtree_stability;
        } else {
            let mut stack = children[c].clone();
            while let Some(k) = stack.pop() {
                selected[k] = false;
                stack.extend_from_slice(&children[k]);
            }
        }
    }
    selected
}

fn label_points(n: usize, rows: &[CondensedRow], num_clusters: usize, selected: &[bool]) -> Vec<i32> {
    let mut point_parent = vec![n; n];
    let mut cluster_parent = vec![n; num_clusters];
    for r in rows {
        if r.child < n {
            point_parent[r.child] = r.parent;
        } else {
            cluster_parent[r.child - n] = r.parent;
        }
    }

    let mut flat = vec![NOISE; num_clusters];
    let mut next = 0i32;
    for (c, _) in selected.iter().enumerate().filter(|(_, s)| **s) {
        flat[c] = next;
        next += 1;
    }

    (0..n)
        .map(|p| {
            let mut c = point_parent[p];
            loop {
                let idx = c - n;
                if selected[idx] {
                    return flat[idx];
                }
                if idx == 0 {
                    return NOISE;
                }
                c = cluster_parent[idx];
            }
        })
        .collect()
}
