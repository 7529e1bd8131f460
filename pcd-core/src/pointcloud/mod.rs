pub mod decimation;
pub mod grid;
pub mod label;
pub mod point;
