use std::path::Path;

use approx::assert_abs_diff_eq;

use pcd_core::pointcloud::{
    grid::TerrainGrid,
    label::{ClassLabel, LabelScheme, LabelSource},
    point::{Color, Field, Point, PointCloud},
};
use pcd_exporter::exporters::{exporter_for_path, Exporter as _};
use pcd_parser::parsers::{parser_for_path, ParseOptions};

fn processed() -> ParseOptions {
    ParseOptions {
        scheme: LabelScheme::default(),
        source: LabelSource::Processed,
    }
}

fn cleaned_cloud() -> PointCloud {
    let labels = [
        ClassLabel::Terrain,
        ClassLabel::Stem,
        ClassLabel::Vegetation,
        ClassLabel::Cwd,
        ClassLabel::Noise,
    ];
    let points = labels
        .iter()
        .enumerate()
        .map(|(i, &label)| Point {
            color: Some(Color {
                r: 1000 * i as u16,
                g: 200,
                b: 65535,
            }),
            height_above_dtm: 0.125 * i as f64,
            ..Point::new(
                512_340.123 + i as f64,
                6_780_001.5 - i as f64,
                120.25 + 0.5 * i as f64,
                label,
            )
        })
        .collect();
    PointCloud::new(
        points,
        vec![
            Field::X,
            Field::Y,
            Field::Z,
            Field::Red,
            Field::Green,
            Field::Blue,
            Field::Label,
            Field::HeightAboveDtm,
        ],
    )
}

fn write_and_read(cloud: &PointCloud, path: &Path) -> PointCloud {
    exporter_for_path(path, LabelScheme::default())
        .unwrap()
        .export(cloud, path)
        .unwrap();
    parser_for_path(vec![path.to_path_buf()], processed())
        .unwrap()
        .parse()
        .unwrap()
}

fn assert_same_points(expected: &PointCloud, actual: &PointCloud, tolerance: f64) {
    assert_eq!(actual.len(), expected.len());
    for (e, a) in expected.points.iter().zip(&actual.points) {
        assert_abs_diff_eq!(a.x, e.x, epsilon = tolerance);
        assert_abs_diff_eq!(a.y, e.y, epsilon = tolerance);
        assert_abs_diff_eq!(a.z, e.z, epsilon = tolerance);
        assert_eq!(a.label, e.label);
        assert_eq!(a.color, e.color);
        assert_abs_diff_eq!(a.height_above_dtm, e.height_above_dtm, epsilon = 1e-12);
    }
}

#[test]
fn las_keeps_labels_heights_and_colors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/plot_segmented_cleaned.las");
    let cloud = cleaned_cloud();

    let read = write_and_read(&cloud, &path);
    assert_same_points(&cloud, &read, 1e-3);
    assert_eq!(read.fields(), cloud.fields());
}

#[test]
fn csv_keeps_every_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plot_segmented_cleaned.csv");
    let cloud = cleaned_cloud();

    let read = write_and_read(&cloud, &path);
    assert_same_points(&cloud, &read, 1e-9);
    assert_eq!(read.fields(), cloud.fields());
}

#[test]
fn las_without_color_or_height() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stem_points.las");
    let points = vec![
        Point::new(1.0, 2.0, 3.0, ClassLabel::Stem),
        Point::new(4.0, 5.0, 6.0, ClassLabel::Cwd),
    ];
    let cloud = PointCloud::new(points, vec![Field::X, Field::Y, Field::Z, Field::Label]);

    let read = write_and_read(&cloud, &path);
    assert_same_points(&cloud, &read, 1e-3);
    assert!(!read.has_field(Field::Red));
    assert!(!read.has_field(Field::HeightAboveDtm));
}

#[test]
fn grid_is_written_as_bare_coordinates() {
    let dir = tempfile::tempdir().unwrap();
    let grid = TerrainGrid::new(vec![[0.0, 0.0, 10.5], [0.5, 0.0, 10.75]], 0.5);

    let csv_path = dir.path().join("DTM.csv");
    exporter_for_path(&csv_path, LabelScheme::default())
        .unwrap()
        .export_grid(&grid, &csv_path)
        .unwrap();
    let contents = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines, vec!["x,y,z", "0,0,10.5", "0.5,0,10.75"]);

    let las_path = dir.path().join("DTM.las");
    exporter_for_path(&las_path, LabelScheme::default())
        .unwrap()
        .export_grid(&grid, &las_path)
        .unwrap();
    let mut reader = las::Reader::from_path(&las_path).unwrap();
    let points: Vec<las::Point> = reader.points().map(|p| p.unwrap()).collect();
    assert_eq!(points.len(), 2);
    assert_abs_diff_eq!(points[1].z, 10.75, epsilon = 1e-3);
    assert!(points[1].extra_bytes.is_empty());
}

#[test]
fn las_refuses_class_codes_it_cannot_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stem_points.las");
    let cloud = PointCloud::new(
        vec![Point::new(1.0, 2.0, 3.0, ClassLabel::Stem)],
        vec![Field::X, Field::Y, Field::Z, Field::Label],
    );
    let scheme = LabelScheme {
        stem: 40,
        ..LabelScheme::default()
    };

    let result = exporter_for_path(&path, scheme).unwrap().export(&cloud, &path);
    assert!(matches!(
        result,
        Err(pcd_exporter::ExportError::ClassCode { code: 40, .. })
    ));
}
