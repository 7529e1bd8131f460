use std::path::{Path, PathBuf};

use las::{Reader, Vlr};

use pcd_core::{
    extra_bytes::{
        ExtraBytesDescriptor, ExtraBytesField, ExtraBytesLayout, EXTRA_BYTES_RECORD_ID,
        EXTRA_BYTES_USER_ID,
    },
    pointcloud::point::{Color, Field, Point, PointCloud},
};

use super::{label_code, ParseOptions, Parser, ParserProvider};
use crate::error::ParseError;

pub struct LasParserProvider {
    pub filenames: Vec<PathBuf>,
    pub options: ParseOptions,
}

impl ParserProvider for LasParserProvider {
    fn get_parser(&self) -> Box<dyn Parser> {
        Box::new(LasParser {
            filenames: self.filenames.clone(),
            options: self.options,
        })
    }
}

pub struct LasParser {
    pub filenames: Vec<PathBuf>,
    pub options: ParseOptions,
}

impl Parser for LasParser {
    fn parse(&self) -> Result<PointCloud, ParseError> {
        if self.filenames.is_empty() {
            return Err(ParseError::NoInput);
        }

        let mut clouds = Vec::with_capacity(self.filenames.len());
        for filename in &self.filenames {
            let start = std::time::Instant::now();
            let cloud = self.parse_file(filename)?;
            log::info!(
                "read {} points from {:?} in {:?}",
                cloud.len(),
                filename,
                start.elapsed()
            );
            clouds.push(cloud);
        }

        Ok(PointCloud::concat(clouds))
    }
}

impl LasParser {
    fn parse_file(&self, path: &Path) -> Result<PointCloud, ParseError> {
        let las_error = |source| ParseError::Las {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = Reader::from_path(path).map_err(las_error)?;

        let header = reader.header();
        let has_color = header.point_format().has_color;
        let layout = extra_bytes_layout(header.vlrs().iter().chain(header.evlrs()));
        let label_field = layout.find(Field::Label.name());
        let height_field = layout.find(Field::HeightAboveDtm.name());

        let mut fields = vec![Field::X, Field::Y, Field::Z, Field::Label];
        if has_color {
            fields.extend([Field::Red, Field::Green, Field::Blue]);
        }
        if height_field.is_some() {
            fields.push(Field::HeightAboveDtm);
        }
        log::debug!(
            "{:?}: color {}, label from {}",
            path,
            has_color,
            if label_field.is_some() {
                "extra bytes"
            } else {
                "classification"
            }
        );

        let mut points = Vec::with_capacity(header.number_of_points() as usize);
        for (index, las_point) in reader.points().enumerate() {
            let las_point = las_point.map_err(las_error)?;

            let code = match read_extra(label_field, &las_point.extra_bytes) {
                Some(value) => label_code(value).ok_or_else(|| ParseError::InvalidValue {
                    path: path.to_path_buf(),
                    record: index as u64,
                    column: Field::Label.name(),
                    value: value.to_string(),
                })?,
                None => u8::from(las_point.classification) as i32,
            };
            let label = self.options.decode(code, path)?;

            let mut point = Point::new(las_point.x, las_point.y, las_point.z, label);
            point.color = las_point.color.map(|c| Color {
                r: c.red,
                g: c.green,
                b: c.blue,
            });
            if let Some(height) = read_extra(height_field, &las_point.extra_bytes) {
                point.height_above_dtm = height;
            }
            points.push(point);
        }

        Ok(PointCloud::new(points, fields))
    }
}

fn read_extra(field: Option<ExtraBytesField>, extra_bytes: &[u8]) -> Option<f64> {
    field.and_then(|field| field.read(extra_bytes))
}

fn extra_bytes_layout<'a>(vlrs: impl Iterator<Item = &'a Vlr>) -> ExtraBytesLayout {
    let descriptors = vlrs
        .filter(|vlr| vlr.user_id == EXTRA_BYTES_USER_ID && vlr.record_id == EXTRA_BYTES_RECORD_ID)
        .flat_map(|vlr| ExtraBytesDescriptor::parse_all(&vlr.data))
        .collect();
    ExtraBytesLayout::new(descriptors)
}
