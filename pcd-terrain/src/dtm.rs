//! Digital terrain model construction.
//!
//! The builder turns the terrain-labelled points into a sparse lattice of
//! ground elevations:
//!
//! 1. voxel subsampling of large inputs,
//! 2. density clustering to set aside small outlier clusters as noise,
//! 3. median elevation per lattice cell with an expanding search radius,
//! 4. optional cropping to the footprint of the full cloud,
//! 5. optional isotropic smoothing over the lattice,
//! 6. repair of lattice islands that drifted from the main surface.
//!
//! Sparse inputs fall back to weaker policies and are logged, never raised.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use pcd_core::pointcloud::{
    decimation::decimator::{PointCloudDecimator as _, VoxelDecimator},
    grid::TerrainGrid,
    label::ClassLabel,
    point::{Point, PointCloud},
};
use pcd_spatial::{dbscan, DbscanParams, SpatialIndex2D, SpatialIndex3D};

use crate::error::TerrainError;

/// Inputs larger than this are voxel-subsampled before clustering.
pub const SUBSAMPLE_ABOVE: usize = 1000;
/// A subsample smaller than this is discarded in favour of the full set.
pub const MIN_SUBSAMPLED_POINTS: usize = 100;
/// `min_samples` used when clustering the lattice during gap repair.
pub const GAP_MIN_SAMPLES: usize = 15;
/// Gap repair and footprint cropping work within this many grid cells.
pub const GRID_NEIGHBOURHOOD_CELLS: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DtmParams {
    /// Lattice spacing; every other radius defaults to a multiple of it.
    pub grid_resolution: f64,
    pub clustering_epsilon: f64,
    pub clustering_min_samples: usize,
    /// Clusters smaller than this are treated as noise.
    pub min_cluster_points: usize,
    /// The clustered set replaces the subsample only if it keeps this many points.
    pub min_retained_points: usize,
    pub subsample_min_spacing: f64,
    /// Zero disables smoothing.
    pub smoothing_radius: f64,
    pub crop: bool,
    pub min_neighbours: usize,
    pub max_search_radius: f64,
    /// Margin added around the terrain bounding box before laying out the lattice.
    pub grid_margin: f64,
}

impl Default for DtmParams {
    fn default() -> Self {
        Self::with_resolution(0.5)
    }
}

impl DtmParams {
    pub fn with_resolution(grid_resolution: f64) -> Self {
        Self {
            grid_resolution,
            clustering_epsilon: 0.3,
            clustering_min_samples: 2,
            min_cluster_points: 250,
            min_retained_points: 500,
            subsample_min_spacing: 0.1,
            smoothing_radius: 3.0 * grid_resolution,
            crop: true,
            min_neighbours: 100,
            max_search_radius: 5.0,
            grid_margin: 3.0,
        }
    }

    pub fn validate(&self) -> Result<(), TerrainError> {
        let positive = [
            ("grid_resolution", self.grid_resolution),
            ("clustering_epsilon", self.clustering_epsilon),
            ("subsample_min_spacing", self.subsample_min_spacing),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(TerrainError::InvalidParameter { name, value });
            }
        }

        let non_negative = [
            ("smoothing_radius", self.smoothing_radius),
            ("max_search_radius", self.max_search_radius),
            ("grid_margin", self.grid_margin),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(TerrainError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }

    fn neighbourhood_radius(&self) -> f64 {
        GRID_NEIGHBOURHOOD_CELLS * self.grid_resolution
    }
}

#[derive(Debug, Clone)]
pub struct TerrainModel {
    pub grid: TerrainGrid,
    /// Terrain points set aside by clustering, relabelled as noise.
    pub noise_points: PointCloud,
}

/// Builds the terrain model from the terrain-labelled points.
///
/// `footprint` is the full, uncropped cloud; when given and cropping is
/// enabled, lattice cells with no footprint point nearby are removed.
pub fn build_dtm(
    terrain: PointCloud,
    footprint: Option<&PointCloud>,
    params: &DtmParams,
) -> Result<TerrainModel, TerrainError> {
    params.validate()?;
    log::info!(
        "start building DTM from {} terrain points (resolution {})...",
        terrain.len(),
        params.grid_resolution
    );

    let working = subsample(terrain, params);
    let (working, noise_points) = reject_small_clusters(working, params);
    log::info!(
        "{} terrain points set aside as noise, {} points in the working set",
        noise_points.len(),
        working.len()
    );

    if working.is_empty() {
        log::warn!("no terrain points to build a DTM from; the grid is empty");
        return Ok(TerrainModel {
            grid: TerrainGrid::new(Vec::new(), params.grid_resolution),
            noise_points,
        });
    }

    let mut grid = sample_lattice(&working, params);
    drop(working);
    log::debug!("{} lattice cells sampled", grid.len());

    if params.crop {
        match footprint {
            Some(footprint) => {
                grid = crop_to_footprint(grid, footprint, params.neighbourhood_radius());
                log::debug!("{} lattice cells after cropping", grid.len());
            }
            None => log::debug!("no footprint given; DTM is not cropped"),
        }
    }

    if params.smoothing_radius > 0.0 {
        grid = smooth(grid, params.smoothing_radius);
    }

    let grid = repair_gaps(grid, params);
    if grid.is_empty() {
        log::warn!("DTM has no cells");
    }
    log::info!("finish building DTM: {} cells", grid.len());

    Ok(TerrainModel { grid, noise_points })
}

/// Voxel-subsamples large inputs, falling back to the full set if the
/// subsample collapses.
pub fn subsample(terrain: PointCloud, params: &DtmParams) -> PointCloud {
    if terrain.len() <= SUBSAMPLE_ABOVE {
        return terrain;
    }

    let decimator = VoxelDecimator {
        voxel_size: params.subsample_min_spacing,
    };
    let decimated = decimator.decimate(&terrain.points);
    if decimated.len() < MIN_SUBSAMPLED_POINTS {
        log::warn!(
            "subsampling left only {} of {} terrain points; using the full set",
            decimated.len(),
            terrain.len()
        );
        return terrain;
    }

    log::debug!(
        "subsampled terrain: {} -> {} points",
        terrain.len(),
        decimated.len()
    );
    terrain.with_points(decimated)
}

/// Clusters the working set in 3D and splits off points in noise or in
/// clusters smaller than `min_cluster_points`.
///
/// Returns `(working, noise)`. The noise set is always reported, but it only
/// leaves the working set when enough points remain; otherwise the working
/// set is returned unchanged.
pub fn reject_small_clusters(working: PointCloud, params: &DtmParams) -> (PointCloud, PointCloud) {
    let clusters = dbscan(
        &working.xyz(),
        DbscanParams {
            eps: params.clustering_epsilon,
            min_samples: params.clustering_min_samples,
        },
    );
    let sizes = clusters.sizes();
    let keep: Vec<bool> = clusters
        .labels
        .iter()
        .map(|&label| label >= 0 && sizes[label as usize] >= params.min_cluster_points)
        .collect();

    let noise: Vec<Point> = working
        .points
        .iter()
        .zip(&keep)
        .filter(|(_, keep)| !**keep)
        .map(|(point, _)| Point {
            label: ClassLabel::Noise,
            ..point.clone()
        })
        .collect();
    let noise_points = working.with_points(noise);

    let retained = working.len() - noise_points.len();
    if retained < params.min_retained_points {
        log::warn!(
            "only {} terrain points survive clustering (need {}); keeping the unclustered set",
            retained,
            params.min_retained_points
        );
        return (working, noise_points);
    }

    let template = working.empty_like();
    let kept: Vec<Point> = working
        .points
        .into_iter()
        .zip(keep)
        .filter_map(|(point, keep)| keep.then_some(point))
        .collect();
    (template.with_points(kept), noise_points)
}

/// Samples the median terrain elevation on a regular lattice covering the
/// working set's bounding box plus `grid_margin`.
///
/// Each cell searches with a radius growing by one resolution step until it
/// finds `min_neighbours` points or the radius passes `max_search_radius`.
/// Cells that find nothing are omitted.
pub fn sample_lattice(working: &PointCloud, params: &DtmParams) -> TerrainGrid {
    let resolution = params.grid_resolution;
    if working.is_empty() {
        return TerrainGrid::new(Vec::new(), resolution);
    }

    let index = SpatialIndex2D::new(&working.xy());
    let z: Vec<f64> = working.points.iter().map(|p| p.z).collect();

    let bounds = working.bounding_volume();
    let xs = linspace(
        bounds.min[0].floor() - params.grid_margin,
        bounds.max[0].ceil() + params.grid_margin,
        resolution,
    );
    let ys = linspace(
        bounds.min[1].floor() - params.grid_margin,
        bounds.max[1].ceil() + params.grid_margin,
        resolution,
    );
    let queries: Vec<[f64; 2]> = xs
        .iter()
        .flat_map(|&x| ys.iter().map(move |&y| [x, y]))
        .collect();

    let points: Vec<[f64; 3]> = queries
        .par_iter()
        .filter_map(|&query| {
            let mut neighbours = Vec::new();
            let mut radius = resolution;
            while neighbours.len() < params.min_neighbours && radius <= params.max_search_radius {
                neighbours = index.within(query, radius);
                radius += resolution;
            }
            if neighbours.is_empty() {
                return None;
            }
            let mut elevations: Vec<f64> = neighbours.iter().map(|&i| z[i]).collect();
            median(&mut elevations).map(|elevation| [query[0], query[1], elevation])
        })
        .collect();

    log::debug!(
        "lattice {} x {} ({} queries) -> {} cells",
        xs.len(),
        ys.len(),
        queries.len(),
        points.len()
    );
    TerrainGrid::new(points, resolution)
}

/// Drops cells with no footprint point within `radius` in the plane.
pub fn crop_to_footprint(grid: TerrainGrid, footprint: &PointCloud, radius: f64) -> TerrainGrid {
    let index = SpatialIndex2D::new(&footprint.xy());
    let resolution = grid.resolution;
    let points: Vec<[f64; 3]> = grid
        .points
        .into_par_iter()
        .filter(|p| index.any_within([p[0], p[1]], radius))
        .collect();
    TerrainGrid::new(points, resolution)
}

/// Replaces each cell's elevation with the mean elevation of all cells
/// within `radius` in 3D, itself included.
pub fn smooth(grid: TerrainGrid, radius: f64) -> TerrainGrid {
    if grid.is_empty() {
        return grid;
    }

    let index = SpatialIndex3D::new(&grid.points);
    let neighbourhoods = index.within_batch(&grid.points, radius);
    let points: Vec<[f64; 3]> = grid
        .points
        .par_iter()
        .zip(neighbourhoods.par_iter())
        .map(|(p, neighbours)| {
            let sum: f64 = neighbours.iter().map(|&i| grid.points[i][2]).sum();
            [p[0], p[1], sum / neighbours.len() as f64]
        })
        .collect();
    TerrainGrid::new(points, grid.resolution)
}

/// Clusters the lattice and re-seats cells outside the dominant cluster on
/// the median elevation of nearby dominant cells.
///
/// Rejected cells with no dominant cell within reach are dropped. A lattice
/// with no cluster at all is returned as is.
pub fn repair_gaps(grid: TerrainGrid, params: &DtmParams) -> TerrainGrid {
    if grid.is_empty() {
        return grid;
    }

    let radius = params.neighbourhood_radius();
    let clusters = dbscan(
        &grid.points,
        DbscanParams {
            eps: radius,
            min_samples: GAP_MIN_SAMPLES,
        },
    );
    let Some(dominant) = clusters.largest() else {
        log::warn!(
            "no dense region among {} lattice cells; skipping gap repair",
            grid.len()
        );
        return grid;
    };

    let resolution = grid.resolution;
    let (accepted, rejected): (Vec<_>, Vec<_>) = grid
        .points
        .into_iter()
        .zip(clusters.labels)
        .partition(|(_, label)| *label == dominant);
    let mut accepted: Vec<[f64; 3]> = accepted.into_iter().map(|(p, _)| p).collect();
    if rejected.is_empty() {
        return TerrainGrid::new(accepted, resolution);
    }

    let index = SpatialIndex2D::new(&accepted.iter().map(|p| [p[0], p[1]]).collect::<Vec<_>>());
    let corrected: Vec<[f64; 3]> = rejected
        .par_iter()
        .filter_map(|(p, _)| {
            let mut elevations: Vec<f64> = index
                .within([p[0], p[1]], radius)
                .into_iter()
                .map(|i| accepted[i][2])
                .collect();
            median(&mut elevations).map(|elevation| [p[0], p[1], elevation])
        })
        .collect();

    log::debug!(
        "gap repair: {} cells accepted, {} corrected, {} dropped",
        accepted.len(),
        corrected.len(),
        rejected.len() - corrected.len()
    );
    accepted.extend(corrected);
    TerrainGrid::new(accepted, resolution)
}

/// `n = ceil((stop - start) / step) + 1` evenly spaced values from `start`
/// to `stop` inclusive.
fn linspace(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let n = ((stop - start) / step).ceil() as usize + 1;
    if n == 1 {
        return vec![start];
    }
    let spacing = (stop - start) / (n - 1) as f64;
    (0..n).map(|i| start + i as f64 * spacing).collect()
}

/// The 50th percentile with linear interpolation between the middle pair.
fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use pcd_core::pointcloud::point::Field;

    use super::*;

    fn terrain_cloud(points: Vec<[f64; 3]>) -> PointCloud {
        let points = points
            .into_iter()
            .map(|[x, y, z]| Point::new(x, y, z, ClassLabel::Terrain))
            .collect();
        PointCloud::new(points, vec![Field::X, Field::Y, Field::Z, Field::Label])
    }

    fn plane(n: usize, spacing: f64, z: f64) -> Vec<[f64; 3]> {
        let mut points = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                points.push([i as f64 * spacing, j as f64 * spacing, z]);
            }
        }
        points
    }

    #[test]
    fn median_interpolates_even_counts() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn linspace_includes_both_ends() {
        assert_eq!(linspace(-3.0, 3.0, 1.0), vec![-3.0, -2.0, -1.0, 0.0, 1.0, 2.0, 3.0]);
        // a step that does not divide the span is stretched to fit
        let values = linspace(0.0, 1.0, 0.4);
        assert_eq!(values.len(), 4);
        assert_abs_diff_eq!(values[3], 1.0);
    }

    #[test]
    fn small_inputs_are_not_subsampled() {
        let cloud = terrain_cloud(plane(10, 0.01, 0.0));
        let params = DtmParams::default();
        assert_eq!(subsample(cloud, &params).len(), 100);
    }

    /// `copies` points at the centre of each of 250 voxels of 0.1 m.
    fn stacked_voxels(copies: usize) -> Vec<[f64; 3]> {
        (0..250 * copies)
            .map(|i| {
                let voxel = i % 250;
                [
                    (voxel % 25) as f64 * 0.1 + 0.05,
                    (voxel / 25) as f64 * 0.1 + 0.05,
                    0.05,
                ]
            })
            .collect()
    }

    #[test]
    fn subsampling_starts_above_a_thousand_points() {
        let params = DtmParams::default();
        let points = stacked_voxels(4);
        assert_eq!(points.len(), SUBSAMPLE_ABOVE);
        assert_eq!(subsample(terrain_cloud(points.clone()), &params).len(), 1000);

        let mut points = points;
        points.push(points[0]);
        assert_eq!(subsample(terrain_cloud(points), &params).len(), 250);
    }

    #[test]
    fn collapsed_subsample_falls_back_to_full_set() {
        // 1600 points packed into four voxels
        let cloud = terrain_cloud(plane(40, 0.004, 0.0));
        let params = DtmParams::default();
        assert_eq!(subsample(cloud, &params).len(), 1600);
    }

    #[test]
    fn dense_input_is_subsampled() {
        // 2500 points on a 0.05 spacing collapse to one per 0.1 voxel
        let points = plane(50, 0.05, 0.0)
            .into_iter()
            .map(|[x, y, z]| [x + 0.01, y + 0.01, z])
            .collect();
        let cloud = terrain_cloud(points);
        let params = DtmParams::default();
        assert_eq!(subsample(cloud, &params).len(), 625);
    }

    #[test]
    fn small_clusters_become_noise() {
        let mut points = plane(30, 0.1, 0.0);
        points.extend([[10.0, 10.0, 2.0], [10.1, 10.0, 2.0], [10.0, 10.1, 2.0]]);
        points.push([-20.0, -20.0, 0.0]);
        let params = DtmParams {
            min_retained_points: 100,
            ..DtmParams::default()
        };

        let (working, noise) = reject_small_clusters(terrain_cloud(points), &params);
        assert_eq!(working.len(), 900);
        assert_eq!(noise.len(), 4);
        assert!(noise.iter().all(|(_, _, _, p)| p.label == ClassLabel::Noise));
        assert!(working.iter().all(|(_, _, _, p)| p.label == ClassLabel::Terrain));
    }

    #[test]
    fn over_aggressive_rejection_keeps_the_working_set() {
        let mut points = plane(20, 0.1, 0.0);
        points.push([50.0, 50.0, 0.0]);
        let params = DtmParams::default();

        let (working, noise) = reject_small_clusters(terrain_cloud(points), &params);
        // 400 clustered points is below min_retained_points
        assert_eq!(working.len(), 401);
        assert_eq!(noise.len(), 1);
    }

    #[test]
    fn lattice_cells_without_evidence_are_omitted() {
        let params = DtmParams {
            max_search_radius: 1.0,
            ..DtmParams::with_resolution(1.0)
        };
        let working = terrain_cloud(vec![[0.5, 0.5, 4.0]]);
        let grid = sample_lattice(&working, &params);

        // lattice spans [-3, 4] on both axes; only cells within 1.0 of the point survive
        assert!(!grid.is_empty());
        for p in grid.iter() {
            assert!(((p[0] - 0.5).powi(2) + (p[1] - 0.5).powi(2)).sqrt() <= 1.0);
            assert_eq!(p[2], 4.0);
        }
        assert_eq!(grid.len(), 4);
    }

    #[test]
    fn crop_keeps_cells_near_the_footprint() {
        let grid = TerrainGrid::new(vec![[0.0, 0.0, 1.0], [5.0, 0.0, 1.0], [10.0, 0.0, 1.0]], 1.0);
        let footprint = terrain_cloud(vec![[0.5, 0.0, 0.0], [7.9, 0.0, 0.0]]);
        let cropped = crop_to_footprint(grid, &footprint, 3.0);
        assert_eq!(cropped.points, vec![[0.0, 0.0, 1.0], [5.0, 0.0, 1.0], [10.0, 0.0, 1.0]]);

        let grid = TerrainGrid::new(vec![[0.0, 0.0, 1.0], [20.0, 0.0, 1.0]], 1.0);
        let cropped = crop_to_footprint(grid, &footprint, 3.0);
        assert_eq!(cropped.points, vec![[0.0, 0.0, 1.0]]);
    }

    #[test]
    fn smoothing_averages_original_elevations() {
        let grid = TerrainGrid::new(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.3], [2.0, 0.0, 0.6]], 1.0);
        let smoothed = smooth(grid, 1.1);
        assert_abs_diff_eq!(smoothed.points[0][2], 0.15, epsilon = 1e-12);
        assert_abs_diff_eq!(smoothed.points[1][2], 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(smoothed.points[2][2], 0.45, epsilon = 1e-12);
        assert_eq!(smoothed.points[2][0], 2.0);
    }

    #[test]
    fn gap_repair_reseats_islands_on_the_main_surface() {
        let params = DtmParams::with_resolution(1.0);
        let mut points = plane(10, 1.0, 0.0);
        // a cell that drifted upwards, too far in z to join the main cluster
        points.push([4.5, 4.5, 20.0]);
        // an isolated cell with no accepted cells in reach
        points.push([100.0, 100.0, 0.0]);

        let repaired = repair_gaps(TerrainGrid::new(points, 1.0), &params);
        assert_eq!(repaired.len(), 101);
        assert_eq!(repaired.points[100], [4.5, 4.5, 0.0]);
    }

    #[test]
    fn gap_repair_keeps_the_largest_cluster_even_when_found_last() {
        let params = DtmParams::with_resolution(1.0);
        // a raised 4 x 4 island listed before the main surface
        let mut points = Vec::new();
        for x in [-4.5, -3.5, -2.5, -1.5] {
            for y in [0.0, 1.0, 2.0, 3.0] {
                points.push([x, y, 5.0]);
            }
        }
        let surface = plane(10, 1.0, 0.0);
        points.extend(&surface);

        let clusters = dbscan(
            &points,
            DbscanParams {
                eps: params.neighbourhood_radius(),
                min_samples: GAP_MIN_SAMPLES,
            },
        );
        assert_eq!(clusters.labels[0], 0);
        assert_eq!(clusters.labels[16], 1);

        let repaired = repair_gaps(TerrainGrid::new(points, 1.0), &params);
        // the two island columns within reach of the surface are re-seated,
        // the outer two are dropped
        assert_eq!(repaired.len(), 108);
        assert_eq!(&repaired.points[..100], surface.as_slice());
        assert!(repaired.iter().all(|p| p[2] == 0.0));
        assert_eq!(repaired.points[100], [-2.5, 0.0, 0.0]);
    }

    #[test]
    fn invalid_resolution_is_rejected() {
        let params = DtmParams::with_resolution(0.0);
        assert_eq!(
            build_dtm(terrain_cloud(Vec::new()), None, &params).err(),
            Some(TerrainError::InvalidParameter {
                name: "grid_resolution",
                value: 0.0
            })
        );
    }

    #[test]
    fn empty_terrain_yields_empty_grid() {
        let model = build_dtm(terrain_cloud(Vec::new()), None, &DtmParams::default()).unwrap();
        assert!(model.grid.is_empty());
        assert!(model.noise_points.is_empty());
    }
}
