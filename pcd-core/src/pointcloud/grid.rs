/// Sparse terrain elevation grid.
///
/// Samples sit on a regular lattice of spacing `resolution`, but cells without
/// terrain evidence are simply absent, so this is a bag of `[x, y, z]` triples
/// rather than a dense raster.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerrainGrid {
    pub points: Vec<[f64; 3]>,
    pub resolution: f64,
}

impl TerrainGrid {
    pub fn new(points: Vec<[f64; 3]>, resolution: f64) -> Self {
        Self { points, resolution }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64; 3]> {
        self.points.iter()
    }

    pub fn xy(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(|p| [p[0], p[1]]).collect()
    }
}
