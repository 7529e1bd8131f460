use std::collections::BTreeMap;

use crate::pointcloud::point::Point;

pub trait PointCloudDecimator {
    fn decimate(&self, points: &[Point]) -> Vec<Point>;
}

/// Keeps one representative point per cubic voxel: the one closest to the
/// voxel centre.
///
/// Voxels are visited in index order, so the output order depends only on
/// the input coordinates.
pub struct VoxelDecimator {
    pub voxel_size: f64,
}

type VoxelKey = [i64; 3];

impl PointCloudDecimator for VoxelDecimator {
    fn decimate(&self, points: &[Point]) -> Vec<Point> {
        // voxel -> (squared distance to centre, index of the best point)
        let mut best: BTreeMap<VoxelKey, (f64, usize)> = BTreeMap::new();

        for (i, point) in points.iter().enumerate() {
            let key = self.voxel_of(point);
            let distance = self.distance_to_centre(point, key);
            best.entry(key)
                .and_modify(|current| {
                    if distance < current.0 {
                        *current = (distance, i);
                    }
                })
                .or_insert((distance, i));
        }

        log::debug!(
            "voxel decimation: {} points -> {} voxels (voxel size {})",
            points.len(),
            best.len(),
            self.voxel_size
        );

        best.into_values()
            .map(|(_, i)| points[i].clone())
            .collect()
    }
}

impl VoxelDecimator {
    fn voxel_of(&self, point: &Point) -> VoxelKey {
        point.xyz().map(|v| (v / self.voxel_size).floor() as i64)
    }

    fn distance_to_centre(&self, point: &Point, key: VoxelKey) -> f64 {
        point
            .xyz()
            .iter()
            .zip(key)
            .map(|(v, k)| {
                let centre = (k as f64 + 0.5) * self.voxel_size;
                (v - centre).powi(2)
            })
            .sum()
    }
}
