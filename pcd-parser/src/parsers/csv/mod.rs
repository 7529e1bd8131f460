use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use csv::{ReaderBuilder, StringRecord};

use pcd_core::pointcloud::point::{Color, Field, Point, PointCloud};

use super::{label_code, ParseOptions, Parser, ParserProvider};
use crate::error::ParseError;

/// Accepted header spellings per column, compared after normalization.
const COLUMN_ALIASES: [(Field, &[&str]); 8] = [
    (Field::X, &["x"]),
    (Field::Y, &["y"]),
    (Field::Z, &["z"]),
    (Field::Red, &["red", "r"]),
    (Field::Green, &["green", "g"]),
    (Field::Blue, &["blue", "b"]),
    (Field::Label, &["label", "classification"]),
    (Field::HeightAboveDtm, &["height_above_dtm"]),
];

const REQUIRED_FIELDS: [Field; 4] = [Field::X, Field::Y, Field::Z, Field::Label];

pub struct CsvParserProvider {
    pub filenames: Vec<PathBuf>,
    pub options: ParseOptions,
}

impl ParserProvider for CsvParserProvider {
    fn get_parser(&self) -> Box<dyn Parser> {
        Box::new(CsvParser {
            filenames: self.filenames.clone(),
            options: self.options,
        })
    }
}

pub struct CsvParser {
    pub filenames: Vec<PathBuf>,
    pub options: ParseOptions,
}

impl Parser for CsvParser {
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

impl CsvParser {
    fn parse_file(&self, path: &Path) -> Result<PointCloud, ParseError> {
        let csv_error = |source| ParseError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(csv_error)?;

        let headers = reader.headers().map_err(csv_error)?.clone();
        let field_mapping = create_field_mapping(&headers, path)?;
        let has_color = field_mapping.contains_key(&Field::Red)
            || field_mapping.contains_key(&Field::Green)
            || field_mapping.contains_key(&Field::Blue);

        let mut points = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(csv_error)?;
            let position = record
                .position()
                .map_or(index as u64 + 2, |position| position.line());
            let row = Row {
                record: &record,
                field_mapping: &field_mapping,
                path,
                line: position,
            };

            let code = row.label_code()?;
            let label = self.options.decode(code, path)?;

            let mut point = Point::new(
                row.required(Field::X)?,
                row.required(Field::Y)?,
                row.required(Field::Z)?,
                label,
            );
            if has_color {
                point.color = Some(Color {
                    r: row.optional(Field::Red)?.unwrap_or(0.0) as u16,
                    g: row.optional(Field::Green)?.unwrap_or(0.0) as u16,
                    b: row.optional(Field::Blue)?.unwrap_or(0.0) as u16,
                });
            }
            if let Some(height) = row.optional(Field::HeightAboveDtm)? {
                point.height_above_dtm = height;
            }
            points.push(point);
        }

        let fields: Vec<Field> = field_mapping.keys().copied().collect();
        Ok(PointCloud::new(points, fields))
    }
}

fn normalize_header(header: &str) -> String {
    header.to_lowercase().replace(['_', '-', ' '], "")
}

fn create_field_mapping(
    headers: &StringRecord,
    path: &Path,
) -> Result<HashMap<Field, usize>, ParseError> {
    let mut mapping = HashMap::new();

    for (index, header) in headers.iter().enumerate() {
        let normalized_header = normalize_header(header);
        for (field, aliases) in COLUMN_ALIASES {
            if aliases
                .iter()
                .any(|alias| normalize_header(alias) == normalized_header)
            {
                mapping.entry(field).or_insert(index);
                break;
            }
        }
    }

    for field in REQUIRED_FIELDS {
        if !mapping.contains_key(&field) {
            return Err(ParseError::MissingColumn {
                path: path.to_path_buf(),
                column: field.name(),
            });
        }
    }

    Ok(mapping)
}

struct Row<'a> {
    record: &'a StringRecord,
    field_mapping: &'a HashMap<Field, usize>,
    path: &'a Path,
    line: u64,
}

impl Row<'_> {
    fn get_field_value(&self, field: Field) -> Option<&str> {
        let &index = self.field_mapping.get(&field)?;
        self.record.get(index)
    }

    fn required(&self, field: Field) -> Result<f64, ParseError> {
        self.optional(field)?.ok_or_else(|| ParseError::InvalidValue {
            path: self.path.to_path_buf(),
            record: self.line,
            column: field.name(),
            value: String::new(),
        })
    }

    fn label_code(&self) -> Result<i32, ParseError> {
        let value = self.required(Field::Label)?;
        label_code(value).ok_or_else(|| ParseError::InvalidValue {
            path: self.path.to_path_buf(),
            record: self.line,
            column: Field::Label.name(),
            value: self
                .get_field_value(Field::Label)
                .unwrap_or_default()
                .to_string(),
        })
    }

    /// `None` when the column is absent or the cell is empty.
    fn optional(&self, field: Field) -> Result<Option<f64>, ParseError> {
        match self.get_field_value(field) {
            Some(value) if !value.trim().is_empty() => value
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| ParseError::InvalidValue {
                    path: self.path.to_path_buf(),
                    record: self.line,
                    column: field.name(),
                    value: value.to_string(),
                }),
            _ => Ok(None),
        }
    }
}
