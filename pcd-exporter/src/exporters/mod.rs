use std::{ffi::OsStr, fs, path::Path};

use pcd_core::pointcloud::{grid::TerrainGrid, label::LabelScheme, point::PointCloud};

use crate::error::ExportError;

pub mod csv;
pub mod las;

pub trait Exporter {
    /// Writes the cloud with the columns listed in its metadata.
    fn export(&self, point_cloud: &PointCloud, path: &Path) -> Result<(), ExportError>;

    /// Writes the terrain grid as bare x, y, z records.
    fn export_grid(&self, grid: &TerrainGrid, path: &Path) -> Result<(), ExportError>;
}

/// Picks the writer for `path`'s extension.
pub fn exporter_for_path(
    path: &Path,
    scheme: LabelScheme,
) -> Result<Box<dyn Exporter>, ExportError> {
    let extension = path
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("las" | "laz") => Ok(Box::new(las::LasExporter { scheme })),
        Some("csv" | "txt") => Ok(Box::new(csv::CsvExporter { scheme })),
        _ => Err(ExportError::UnsupportedExtension(path.to_path_buf())),
    }
}

pub(crate) fn create_parent_dir(path: &Path) -> Result<(), ExportError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| ExportError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}
