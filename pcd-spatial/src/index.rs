//! Radius and nearest-neighbour queries over static point sets.
//!
//! Backed by a bulk-loaded R*-tree. Each stored entry keeps the index of the
//! point in the slice the index was built from, so queries answer with
//! indices into the caller's own arrays. The index is immutable; rebuild it
//! whenever the underlying points change.

use rayon::prelude::*;
use rstar::{primitives::GeomWithData, Point as RTreePoint, PointDistance as _, RTree};

type Entry<const D: usize> = GeomWithData<[f64; D], usize>;

pub struct SpatialIndex<const D: usize>
where
    [f64; D]: RTreePoint<Scalar = f64>,
{
    tree: RTree<Entry<D>>,
}

pub type SpatialIndex2D = SpatialIndex<2>;
pub type SpatialIndex3D = SpatialIndex<3>;

impl<const D: usize> SpatialIndex<D>
where
    [f64; D]: RTreePoint<Scalar = f64>,
{
    pub fn new(points: &[[f64; D]]) -> Self {
        let entries: Vec<Entry<D>> = points
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new(*p, i))
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Indices of all points within `radius` (inclusive) of `query`, ascending.
    pub fn within(&self, query: [f64; D], radius: f64) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .tree
            .locate_within_distance(query, radius * radius)
            .map(|entry| entry.data)
            .collect();
        indices.sort_unstable();
        indices
    }

    pub fn any_within(&self, query: [f64; D], radius: f64) -> bool {
        self.tree
            .locate_within_distance(query, radius * radius)
            .next()
            .is_some()
    }

    /// [`within`](Self::within) for many queries at once; the result is in query order.
    pub fn within_batch(&self, queries: &[[f64; D]], radius: f64) -> Vec<Vec<usize>> {
        queries
            .par_iter()
            .map(|query| self.within(*query, radius))
            .collect()
    }

    /// Index of the nearest point and its Euclidean distance.
    pub fn nearest(&self, query: [f64; D]) -> Option<(usize, f64)> {
        self.tree
            .nearest_neighbor(&query)
            .map(|entry| (entry.data, entry.distance_2(&query).sqrt()))
    }
}
