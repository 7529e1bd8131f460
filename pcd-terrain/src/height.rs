use rayon::prelude::*;

use pcd_core::pointcloud::{
    grid::TerrainGrid,
    point::{Field, PointCloud},
};
use pcd_spatial::SpatialIndex2D;

use crate::error::TerrainError;

/// Sets every point's height above the terrain: its z minus the elevation of
/// the nearest grid cell in the plane.
///
/// Points far outside the grid still get a value from the nearest edge cell.
pub fn normalize_heights(
    mut cloud: PointCloud,
    grid: &TerrainGrid,
) -> Result<PointCloud, TerrainError> {
    if grid.is_empty() {
        return Err(TerrainError::EmptyTerrainGrid {
            points: cloud.len(),
        });
    }

    log::info!(
        "start normalizing heights of {} points against {} DTM cells...",
        cloud.len(),
        grid.len()
    );
    let index = SpatialIndex2D::new(&grid.xy());

    cloud.points.par_iter_mut().for_each(|point| {
        if let Some((nearest, _)) = index.nearest(point.xy()) {
            point.height_above_dtm = point.z - grid.points[nearest][2];
        }
    });
    cloud.add_field(Field::HeightAboveDtm);

    Ok(cloud)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use pcd_core::pointcloud::{label::ClassLabel, point::Point};

    use super::*;

    #[test]
    fn heights_follow_the_nearest_cell() {
        let grid = TerrainGrid::new(vec![[0.0, 0.0, 1.0], [1.0, 0.0, 2.0]], 1.0);
        let cloud = PointCloud::new(
            vec![
                Point::new(0.2, 0.1, 1.5, ClassLabel::Stem),
                Point::new(0.9, -0.3, 1.5, ClassLabel::Vegetation),
                Point::new(50.0, 0.0, 2.0, ClassLabel::Cwd),
            ],
            vec![Field::X, Field::Y, Field::Z, Field::Label],
        );

        let normalized = normalize_heights(cloud, &grid).unwrap();
        assert!(normalized.has_field(Field::HeightAboveDtm));
        assert_abs_diff_eq!(normalized.points[0].height_above_dtm, 0.5);
        assert_abs_diff_eq!(normalized.points[1].height_above_dtm, -0.5);
        assert_abs_diff_eq!(normalized.points[2].height_above_dtm, 0.0);
    }

    #[test]
    fn empty_grid_is_an_error() {
        let cloud = PointCloud::new(
            vec![Point::new(0.0, 0.0, 0.0, ClassLabel::Terrain)],
            vec![Field::X, Field::Y, Field::Z],
        );
        assert_eq!(
            normalize_heights(cloud, &TerrainGrid::new(Vec::new(), 0.5)).err(),
            Some(TerrainError::EmptyTerrainGrid { points: 1 })
        );
    }
}
