use std::path::Path;

use csv::Writer;

use pcd_core::pointcloud::{
    grid::TerrainGrid,
    label::LabelScheme,
    point::{Field, Point, PointCloud},
};

use super::{create_parent_dir, Exporter};
use crate::error::ExportError;

pub struct CsvExporter {
    pub scheme: LabelScheme,
}

impl CsvExporter {
    fn field_value(&self, point: &Point, field: Field) -> String {
        let color = point.color.unwrap_or_default();
        match field {
            Field::X => point.x.to_string(),
            Field::Y => point.y.to_string(),
            Field::Z => point.z.to_string(),
            Field::Red => color.r.to_string(),
            Field::Green => color.g.to_string(),
            Field::Blue => color.b.to_string(),
            Field::Label => self.scheme.encode(point.label).to_string(),
            Field::HeightAboveDtm => point.height_above_dtm.to_string(),
        }
    }
}

impl Exporter for CsvExporter {
    fn export(&self, point_cloud: &PointCloud, path: &Path) -> Result<(), ExportError> {
        let csv_error = |source| ExportError::Csv {
            path: path.to_path_buf(),
            source,
        };
        create_parent_dir(path)?;

        let fields = point_cloud.fields();
        let mut writer = Writer::from_path(path).map_err(csv_error)?;
        writer
            .write_record(fields.iter().map(|field| field.name()))
            .map_err(csv_error)?;
        for point in &point_cloud.points {
            writer
                .write_record(fields.iter().map(|&field| self.field_value(point, field)))
                .map_err(csv_error)?;
        }
        writer
            .flush()
            .map_err(|source| csv_error(source.into()))?;

        log::info!("wrote {} points to {:?}", point_cloud.len(), path);
        Ok(())
    }

    fn export_grid(&self, grid: &TerrainGrid, path: &Path) -> Result<(), ExportError> {
        let csv_error = |source| ExportError::Csv {
            path: path.to_path_buf(),
            source,
        };
        create_parent_dir(path)?;

        let mut writer = Writer::from_path(path).map_err(csv_error)?;
        writer
            .write_record([Field::X.name(), Field::Y.name(), Field::Z.name()])
            .map_err(csv_error)?;
        for [x, y, z] in grid.iter() {
            writer
                .write_record([x.to_string(), y.to_string(), z.to_string()])
                .map_err(csv_error)?;
        }
        writer
            .flush()
            .map_err(|source| csv_error(source.into()))?;

        log::info!("wrote {} DTM cells to {:?}", grid.len(), path);
        Ok(())
    }
}
