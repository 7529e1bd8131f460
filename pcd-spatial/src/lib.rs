//! Spatial primitives shared by the terrain stages: radius queries over 2D/3D
//! point sets, density clustering and planar convex hulls.

pub mod cluster;
pub mod error;
pub mod hull;
pub mod index;

pub use cluster::{dbscan, ClusterLabels, DbscanParams, NOISE};
pub use error::GeometryError;
pub use hull::ConvexHull;
pub use index::{SpatialIndex, SpatialIndex2D, SpatialIndex3D};
