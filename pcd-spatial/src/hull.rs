//! Planar convex hull, used to estimate the surveyed plot area.

use crate::error::GeometryError;

#[derive(Debug, Clone, PartialEq)]
pub struct ConvexHull {
    /// Boundary vertices in counter-clockwise order, starting from the
    /// lowest-x (then lowest-y) vertex. Collinear boundary points are dropped.
    pub vertices: Vec<[f64; 2]>,
    pub area: f64,
}

impl ConvexHull {
    /// Andrew's monotone chain.
    pub fn compute(points: &[[f64; 2]]) -> Result<Self, GeometryError> {
        let total = points.len();
        let mut sorted: Vec<[f64; 2]> = points.to_vec();
        sorted.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
        sorted.dedup();

        if sorted.len() < 3 {
            return Err(GeometryError::TooFewPoints {
                distinct: sorted.len(),
                total,
            });
        }

        let mut lower: Vec<[f64; 2]> = Vec::with_capacity(sorted.len());
        for p in &sorted {
            while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], *p) <= 0.0
            {
                lower.pop();
            }
            lower.push(*p);
        }

        let mut upper: Vec<[f64; 2]> = Vec::with_capacity(sorted.len());
        for p in sorted.iter().rev() {
            while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], *p) <= 0.0
            {
                upper.pop();
            }
            upper.push(*p);
        }

        // the last point of each chain is the first point of the other
        lower.pop();
        upper.pop();
        let mut vertices = lower;
        vertices.extend(upper);

        let area = shoelace(&vertices);
        if vertices.len() < 3 || area <= 0.0 {
            return Err(GeometryError::Collinear { total });
        }

        Ok(Self { vertices, area })
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    /// Area in hectares.
    pub fn area_ha(&self) -> f64 {
        self.area / 10_000.0
    }
}

fn cross(o: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

fn shoelace(vertices: &[[f64; 2]]) -> f64 {
    let n = vertices.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            a[0] * b[1] - b[0] * a[1]
        })
        .sum();
    twice.abs() / 2.0
}
