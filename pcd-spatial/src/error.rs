use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("convex hull needs at least 3 distinct points, got {distinct} (from {total} input points)")]
    TooFewPoints { distinct: usize, total: usize },

    #[error("convex hull of {total} points is degenerate: all points are collinear")]
    Collinear { total: usize },
}
