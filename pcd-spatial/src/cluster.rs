//! DBSCAN density clustering.
//!
//! A point is a core point when its ε-neighbourhood (the point itself
//! included) holds at least `min_samples` points. Clusters grow by chaining
//! core points through shared neighbourhoods; non-core points reached from a
//! cluster become border members of the first cluster that reaches them.
//! Everything else is labelled [`NOISE`].
//!
//! Cluster ids are assigned in order of the lowest-indexed core point of each
//! cluster, so the result is deterministic for a fixed input order.

use std::collections::VecDeque;

use rstar::Point as RTreePoint;

use crate::index::SpatialIndex;

pub const NOISE: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DbscanParams {
    pub eps: f64,
    pub min_samples: usize,
}

/// Per-point cluster ids in `{NOISE} ∪ {0, 1, ..}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterLabels {
    pub labels: Vec<i32>,
    pub cluster_count: usize,
}

impl ClusterLabels {
    /// Member count of each cluster, indexed by cluster id.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.cluster_count];
        for &label in &self.labels {
            if label >= 0 {
                sizes[label as usize] += 1;
            }
        }
        sizes
    }

    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|&&label| label == NOISE).count()
    }

    /// Id of the biggest cluster; ties go to the lowest id.
    pub fn largest(&self) -> Option<i32> {
        self.sizes()
            .into_iter()
            .enumerate()
            .fold(None, |best: Option<(usize, usize)>, (id, size)| match best {
                Some((_, best_size)) if best_size >= size => best,
                _ => Some((id, size)),
            })
            .map(|(id, _)| id as i32)
    }
}

pub fn dbscan<const D: usize>(points: &[[f64; D]], params: DbscanParams) -> ClusterLabels
where
    [f64; D]: RTreePoint<Scalar = f64>,
{
    let n = points.len();
    let mut labels = vec![NOISE; n];
    if n == 0 {
        return ClusterLabels {
            labels,
            cluster_count: 0,
        };
    }

    let index = SpatialIndex::new(points);
    let neighbourhoods = index.within_batch(points, params.eps);
    let is_core: Vec<bool> = neighbourhoods
        .iter()
        .map(|neighbours| neighbours.len() >= params.min_samples)
        .collect();

    let mut cluster_count = 0usize;
    let mut queue = VecDeque::new();

    for seed in 0..n {
        if !is_core[seed] || labels[seed] != NOISE {
            continue;
        }

        let cluster_id = cluster_count as i32;
        cluster_count += 1;
        labels[seed] = cluster_id;
        queue.push_back(seed);

        while let Some(current) = queue.pop_front() {
            for &neighbour in &neighbourhoods[current] {
                if labels[neighbour] != NOISE {
                    continue;
                }
                labels[neighbour] = cluster_id;
                if is_core[neighbour] {
                    queue.push_back(neighbour);
                }
            }
        }
    }

    let clusters = ClusterLabels {
        labels,
        cluster_count,
    };
    log::debug!(
        "dbscan(eps={}, min_samples={}): {} points -> {} clusters, {} noise",
        params.eps,
        params.min_samples,
        n,
        clusters.cluster_count,
        clusters.noise_count()
    );
    clusters
}
