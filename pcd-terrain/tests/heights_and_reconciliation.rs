use approx::assert_abs_diff_eq;
use rand::{rngs::StdRng, Rng as _, SeedableRng as _};

use pcd_core::pointcloud::{
    label::ClassLabel,
    point::{Field, Point, PointCloud},
};
use pcd_terrain::{build_dtm, normalize_heights, reconcile, DtmParams, ReconcileThresholds};

const GROUND: f64 = 12.5;

/// A flat 10 x 10 m plot with ground at 12.5 m and a few labelled features.
fn plot() -> PointCloud {
    let mut rng = StdRng::seed_from_u64(99);
    let mut points: Vec<Point> = (0..1200)
        .map(|_| {
            Point::new(
                rng.gen_range(0.0..10.0),
                rng.gen_range(0.0..10.0),
                GROUND,
                ClassLabel::Terrain,
            )
        })
        .collect();

    let features = [
        (5.0, 5.0, GROUND + 8.0, ClassLabel::Stem),
        (5.0, 5.0, GROUND + 0.02, ClassLabel::Stem),
        (2.0, 7.0, GROUND + 4.0, ClassLabel::Vegetation),
        (2.0, 7.0, GROUND - 0.03, ClassLabel::Vegetation),
        (7.0, 2.0, GROUND + 0.5, ClassLabel::Cwd),
        (7.0, 2.0, GROUND + 5.0, ClassLabel::Cwd),
        (7.0, 3.0, GROUND + 11.0, ClassLabel::Cwd),
        (3.0, 3.0, GROUND + 1.0, ClassLabel::Terrain),
    ];
    for (x, y, z, label) in features {
        points.push(Point::new(x, y, z, label));
    }
    PointCloud::new(points, vec![Field::X, Field::Y, Field::Z, Field::Label])
}

#[test]
fn heights_are_measured_from_the_nearest_cell() {
    let cloud = plot();
    let terrain = cloud.select_label(ClassLabel::Terrain);
    let model = build_dtm(terrain, Some(&cloud), &DtmParams::with_resolution(1.0)).unwrap();
    let normalized = normalize_heights(cloud, &model.grid).unwrap();

    assert!(normalized.has_field(Field::HeightAboveDtm));
    for (_, _, z, point) in normalized.iter() {
        assert_abs_diff_eq!(point.height_above_dtm, z - GROUND, epsilon = 1e-9);
    }
}

#[test]
fn plot_is_reconciled_by_height() {
    let cloud = plot();
    let terrain = cloud.select_label(ClassLabel::Terrain);
    let model = build_dtm(terrain, Some(&cloud), &DtmParams::with_resolution(1.0)).unwrap();
    let normalized = normalize_heights(cloud, &model.grid).unwrap();
    let result = reconcile(normalized, &ReconcileThresholds::default());

    // 1200 ground points, the near-ground stem and vegetation returns
    assert_eq!(result.terrain.len(), 1202);
    assert_eq!(result.stem.len(), 1);
    assert_eq!(result.vegetation.len(), 1);
    assert_eq!(result.cwd.len(), 1);
    assert_eq!(result.rejected[&ClassLabel::Terrain].len(), 1);
    // the near-ground returns are reassigned and still counted against their class
    assert_eq!(result.rejected[&ClassLabel::Stem].len(), 1);
    assert_eq!(result.rejected[&ClassLabel::Vegetation].len(), 1);
    assert_eq!(result.rejected[&ClassLabel::Cwd].len(), 1);
    assert_eq!(result.excluded[&ClassLabel::Cwd].len(), 1);

    let cleaned = result.into_cleaned();
    assert_eq!(cleaned.len(), 1205);
    assert!(cleaned
        .iter()
        .all(|(_, _, _, p)| p.height_above_dtm < 10.0));
    assert_eq!(cleaned.points[1204].label, ClassLabel::Stem);
}
