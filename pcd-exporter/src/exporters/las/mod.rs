use std::path::Path;

use las::{point::Format, Builder, Transform, Vector, Vlr, Writer};

use pcd_core::{
    extra_bytes::{
        ExtraBytesDescriptor, ExtraBytesLayout, ExtraBytesType, EXTRA_BYTES_RECORD_ID,
        EXTRA_BYTES_USER_ID,
    },
    pointcloud::{
        grid::TerrainGrid,
        label::LabelScheme,
        point::{BoundingVolume, Field, PointCloud},
    },
};

use super::{create_parent_dir, Exporter};
use crate::error::ExportError;

pub static SCALE_FACTOR: f64 = 0.001;

/// Largest classification the legacy point formats can hold.
pub const MAX_CLASS_CODE: i32 = 31;
/// Overlap points; las-rs refuses to write it.
pub const OVERLAP_CLASS_CODE: i32 = 12;

/// Whether `code` can be written as a point classification.
pub fn is_storable_class_code(code: i32) -> bool {
    (0..=MAX_CLASS_CODE).contains(&code) && code != OVERLAP_CLASS_CODE
}

pub struct LasExporter {
    pub scheme: LabelScheme,
}

impl Exporter for LasExporter {
    fn export(&self, point_cloud: &PointCloud, path: &Path) -> Result<(), ExportError> {
        let las_error = |source| ExportError::Las {
            path: path.to_path_buf(),
            source,
        };
        create_parent_dir(path)?;

        let has_color = [Field::Red, Field::Green, Field::Blue]
            .into_iter()
            .any(|field| point_cloud.has_field(field));

        let mut descriptors = Vec::new();
        if point_cloud.has_field(Field::Label) {
            descriptors.push(
                ExtraBytesDescriptor::new(Field::Label.name(), ExtraBytesType::U8)
                    .with_description("semantic class"),
            );
        }
        if point_cloud.has_field(Field::HeightAboveDtm) {
            descriptors.push(
                ExtraBytesDescriptor::new(Field::HeightAboveDtm.name(), ExtraBytesType::F64)
                    .with_description("height above terrain"),
            );
        }
        let layout = ExtraBytesLayout::new(descriptors);
        let label_field = layout.find(Field::Label.name());
        let height_field = layout.find(Field::HeightAboveDtm.name());

        let format_id = if has_color { 3 } else { 1 };
        let header = build_header(point_cloud.bounding_volume(), format_id, &layout)
            .map_err(las_error)?;
        let mut writer = Writer::from_path(path, header).map_err(las_error)?;

        for point in &point_cloud.points {
            let code = self.scheme.encode(point.label);
            let mut extra_bytes = vec![0u8; layout.record_len()];
            if let Some(field) = label_field {
                field.write(&mut extra_bytes, code as f64);
            }
            if let Some(field) = height_field {
                field.write(&mut extra_bytes, point.height_above_dtm);
            }

            if !is_storable_class_code(code) {
                return Err(ExportError::ClassCode {
                    path: path.to_path_buf(),
                    code,
                });
            }
            let classification =
                las::point::Classification::new(code as u8).map_err(las_error)?;
            let color = has_color.then(|| {
                let c = point.color.unwrap_or_default();
                las::Color::new(c.r, c.g, c.b)
            });

            let las_point = las::Point {
                x: point.x,
                y: point.y,
                z: point.z,
                classification,
                gps_time: Some(0.0),
                color,
                extra_bytes,
                ..Default::default()
            };
            writer.write_point(las_point).map_err(las_error)?;
        }
        writer.close().map_err(las_error)?;

        log::info!("wrote {} points to {:?}", point_cloud.len(), path);
        Ok(())
    }

    fn export_grid(&self, grid: &TerrainGrid, path: &Path) -> Result<(), ExportError> {
        let las_error = |source| ExportError::Las {
            path: path.to_path_buf(),
            source,
        };
        create_parent_dir(path)?;

        let mut bounding_volume = BoundingVolume::default();
        for p in grid.iter() {
            bounding_volume.extend(*p);
        }
        let header = build_header(&bounding_volume, 0, &ExtraBytesLayout::default())
            .map_err(las_error)?;
        let mut writer = Writer::from_path(path, header).map_err(las_error)?;

        for &[x, y, z] in grid.iter() {
            let las_point = las::Point {
                x,
                y,
                z,
                ..Default::default()
            };
            writer.write_point(las_point).map_err(las_error)?;
        }
        writer.close().map_err(las_error)?;

        log::info!("wrote {} DTM cells to {:?}", grid.len(), path);
        Ok(())
    }
}

fn build_header(
    bounding_volume: &BoundingVolume,
    format_id: u8,
    layout: &ExtraBytesLayout,
) -> las::Result<las::Header> {
    let mut builder = Builder::from((1, 4));
    builder.point_format = Format::new(format_id)?;
    builder.point_format.extra_bytes = layout.record_len() as u16;
    builder.generating_software = "fsct-post".to_string();
    builder.transforms = transforms(bounding_volume);
    if !layout.is_empty() {
        builder.vlrs.push(Vlr {
            user_id: EXTRA_BYTES_USER_ID.to_string(),
            record_id: EXTRA_BYTES_RECORD_ID,
            description: "Extra Bytes".to_string(),
            data: layout.vlr_data(),
        });
    }
    builder.into_header()
}

/// Per-axis transforms anchored at the cloud minimum, so projected
/// coordinates fit the i32 record range.
fn transforms(bounding_volume: &BoundingVolume) -> Vector<Transform> {
    let axis = |axis: usize| {
        if !bounding_volume.is_valid() {
            return Transform {
                scale: SCALE_FACTOR,
                offset: 0.0,
            };
        }
        let offset = bounding_volume.min[axis].floor();
        let span = bounding_volume.max[axis] - offset;
        let mut scale = SCALE_FACTOR;
        while span / scale >= i32::MAX as f64 {
            scale *= 10.0;
        }
        Transform { scale, offset }
    };
    Vector {
        x: axis(0),
        y: axis(1),
        z: axis(2),
    }
}
