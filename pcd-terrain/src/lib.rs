//! Terrain model construction, height normalization and class reconciliation.

pub mod dtm;
pub mod error;
pub mod height;
pub mod reconcile;

pub use dtm::{build_dtm, DtmParams, TerrainModel};
pub use error::TerrainError;
pub use height::normalize_heights;
pub use reconcile::{reconcile, ClassPolicy, Disposition, ReconcileThresholds, Reconciliation};
