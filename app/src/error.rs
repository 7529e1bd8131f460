use std::path::PathBuf;

use thiserror::Error;

use pcd_core::pointcloud::label::ClassLabel;
use pcd_exporter::ExportError;
use pcd_parser::ParseError;
use pcd_terrain::TerrainError;

use crate::run_times::RunTimesError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no input point cloud given; pass --input or set input_point_cloud in the parameter file")]
    MissingInput,

    #[error("input point cloud path has no file name: {0}")]
    InvalidInputPath(PathBuf),

    #[error("failed to read parameter file {path}: {source}")]
    ParameterFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid parameter file {path}: {source}")]
    ParameterJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} and {1} classes share the same label code")]
    LabelCollision(ClassLabel, ClassLabel),

    #[error("{class} class code {code} is outside 0-31 or is the reserved overlap code 12")]
    ClassCodeOutOfRange { class: ClassLabel, code: i32 },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Terrain(#[from] TerrainError),

    #[error(transparent)]
    RunTimes(#[from] RunTimesError),
}
