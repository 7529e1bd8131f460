use serde::{Deserialize, Serialize};

use crate::pointcloud::label::ClassLabel;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u16,
    pub g: u16,
    pub b: u16,
}

/// Columns a persisted point cloud may carry.
///
/// The order of the variants is the canonical column order used when writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    X,
    Y,
    Z,
    Red,
    Green,
    Blue,
    Label,
    HeightAboveDtm,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::X => "x",
            Field::Y => "y",
            Field::Z => "z",
            Field::Red => "red",
            Field::Green => "green",
            Field::Blue => "blue",
            Field::Label => "label",
            Field::HeightAboveDtm => "height_above_DTM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub color: Option<Color>,
    pub label: ClassLabel,
    /// Height above the terrain model; zero until heights are normalized.
    pub height_above_dtm: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64, label: ClassLabel) -> Self {
        Self {
            x,
            y,
            z,
            color: None,
            label,
            height_above_dtm: 0.0,
        }
    }

    pub fn xy(&self) -> [f64; 2] {
        [self.x, self.y]
    }

    pub fn xyz(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    pub points: Vec<Point>,
    pub metadata: Metadata,
}

impl PointCloud {
    pub fn new(points: Vec<Point>, fields: Vec<Field>) -> Self {
        let mut fields = fields;
        fields.sort();
        fields.dedup();

        let bounding_volume = BoundingVolume::from_points(&points);
        let metadata = Metadata {
            point_count: points.len(),
            bounding_volume,
            fields,
        };

        PointCloud { points, metadata }
    }

    /// An empty cloud with the same column layout as `self`.
    pub fn empty_like(&self) -> Self {
        self.with_points(Vec::new())
    }

    /// A new cloud with the same column layout as `self`.
    pub fn with_points(&self, points: Vec<Point>) -> Self {
        PointCloud::new(points, self.metadata.fields.clone())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn fields(&self) -> &[Field] {
        &self.metadata.fields
    }

    pub fn has_field(&self, field: Field) -> bool {
        self.metadata.fields.contains(&field)
    }

    pub fn add_field(&mut self, field: Field) {
        if !self.has_field(field) {
            self.metadata.fields.push(field);
            self.metadata.fields.sort();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64, f64, &Point)> {
        self.points
            .iter()
            .map(|point| (point.x, point.y, point.z, point))
    }

    pub fn xy(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(Point::xy).collect()
    }

    pub fn xyz(&self) -> Vec<[f64; 3]> {
        self.points.iter().map(Point::xyz).collect()
    }

    /// Copies the points matching `predicate` into a new cloud.
    pub fn select<F>(&self, predicate: F) -> PointCloud
    where
        F: Fn(&Point) -> bool,
    {
        let points = self
            .points
            .iter()
            .filter(|p| predicate(p))
            .cloned()
            .collect();
        self.with_points(points)
    }

    pub fn select_label(&self, label: ClassLabel) -> PointCloud {
        self.select(|p| p.label == label)
    }

    /// Consumes the cloud, keeping only points matching `predicate`.
    pub fn filter<F>(self, predicate: F) -> PointCloud
    where
        F: Fn(&Point) -> bool,
    {
        let (kept, _) = self.split(predicate);
        kept
    }

    /// Consumes the cloud into (matching, non-matching) halves.
    pub fn split<F>(self, predicate: F) -> (PointCloud, PointCloud)
    where
        F: Fn(&Point) -> bool,
    {
        let PointCloud { points, metadata } = self;
        let (matching, rest): (Vec<Point>, Vec<Point>) =
            points.into_iter().partition(|p| predicate(p));

        (
            PointCloud::new(matching, metadata.fields.clone()),
            PointCloud::new(rest, metadata.fields),
        )
    }

    /// Concatenates clouds in order. The column layout is the union of all inputs.
    pub fn concat<I>(clouds: I) -> PointCloud
    where
        I: IntoIterator<Item = PointCloud>,
    {
        let mut points = Vec::new();
        let mut fields = Vec::new();
        for cloud in clouds {
            fields.extend(cloud.metadata.fields);
            points.extend(cloud.points);
        }
        PointCloud::new(points, fields)
    }

    pub fn bounding_volume(&self) -> &BoundingVolume {
        &self.metadata.bounding_volume
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundingVolume {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Default for BoundingVolume {
    fn default() -> Self {
        Self {
            min: [f64::MAX, f64::MAX, f64::MAX],
            max: [f64::MIN, f64::MIN, f64::MIN],
        }
    }
}

impl BoundingVolume {
    pub fn from_points(points: &[Point]) -> Self {
        let mut bounding_volume = BoundingVolume::default();
        for point in points {
            bounding_volume.extend([point.x, point.y, point.z]);
        }
        bounding_volume
    }

    pub fn extend(&mut self, xyz: [f64; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(xyz[axis]);
            self.max[axis] = self.max[axis].max(xyz[axis]);
        }
    }

    /// False until at least one point has been added.
    pub fn is_valid(&self) -> bool {
        (0..3).all(|axis| self.min[axis] <= self.max[axis])
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub point_count: usize,
    pub bounding_volume: BoundingVolume,
    /// The "headers of interest": which columns this cloud carries.
    pub fields: Vec<Field>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_cloud() -> PointCloud {
        let points = vec![
            Point::new(0.0, 0.0, 0.0, ClassLabel::Terrain),
            Point::new(1.0, 2.0, 3.0, ClassLabel::Stem),
            Point::new(-1.0, 5.0, 1.0, ClassLabel::Terrain),
        ];
        PointCloud::new(points, vec![Field::Label, Field::X, Field::Y, Field::Z])
    }

    #[test]
    fn new_sorts_fields_and_computes_bounds() {
        let cloud = make_cloud();
        assert_eq!(cloud.fields(), &[Field::X, Field::Y, Field::Z, Field::Label]);
        assert_eq!(cloud.metadata.point_count, 3);
        assert_eq!(cloud.bounding_volume().min, [-1.0, 0.0, 0.0]);
        assert_eq!(cloud.bounding_volume().max, [1.0, 5.0, 3.0]);
    }

    #[test]
    fn split_partitions_every_point_once() {
        let (terrain, rest) = make_cloud().split(|p| p.label == ClassLabel::Terrain);
        assert_eq!(terrain.len(), 2);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest.points[0].label, ClassLabel::Stem);
        assert_eq!(terrain.bounding_volume().max, [0.0, 5.0, 1.0]);
    }

    #[test]
    fn concat_keeps_order_and_unions_fields() {
        let a = make_cloud();
        let mut b = make_cloud().select_label(ClassLabel::Stem);
        b.add_field(Field::HeightAboveDtm);
        let merged = PointCloud::concat([a, b]);
        assert_eq!(merged.len(), 4);
        assert_eq!(merged.points[3].label, ClassLabel::Stem);
        assert!(merged.has_field(Field::HeightAboveDtm));
    }

    #[test]
    fn empty_bounding_volume_is_invalid() {
        let cloud = PointCloud::new(Vec::new(), vec![Field::X]);
        assert!(!cloud.bounding_volume().is_valid());
        assert!(make_cloud().bounding_volume().is_valid());
    }
}
