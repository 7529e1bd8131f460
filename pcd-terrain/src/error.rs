use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TerrainError {
    #[error("terrain grid is empty; cannot compute heights for {points} points")]
    EmptyTerrainGrid { points: usize },

    #[error("invalid terrain parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}
