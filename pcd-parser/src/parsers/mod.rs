use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use pcd_core::pointcloud::{
    label::{ClassLabel, LabelScheme, LabelSource},
    point::PointCloud,
};

use crate::error::ParseError;

pub mod csv;
pub mod las;

pub trait ParserProvider {
    fn get_parser(&self) -> Box<dyn Parser>;
}

pub trait Parser {
    fn parse(&self) -> Result<PointCloud, ParseError>;
}

/// How persisted label codes are turned into classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub scheme: LabelScheme,
    pub source: LabelSource,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            scheme: LabelScheme::default(),
            source: LabelSource::Upstream,
        }
    }
}

impl ParseOptions {
    pub(crate) fn decode(&self, code: i32, path: &Path) -> Result<ClassLabel, ParseError> {
        self.scheme
            .decode_from(code, self.source)
            .ok_or_else(|| ParseError::UnknownLabel {
                path: path.to_path_buf(),
                code,
            })
    }
}

/// A stored label value as an integer code; `None` unless it is a whole
/// number within `i32`.
pub(crate) fn label_code(value: f64) -> Option<i32> {
    let in_range = value >= i32::MIN as f64 && value <= i32::MAX as f64;
    (value.is_finite() && value.fract() == 0.0 && in_range).then_some(value as i32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    Las,
    Laz,
    Csv,
    Txt,
}

pub fn get_extension(extension: &str) -> Result<Extension, ParseError> {
    match extension.to_ascii_lowercase().as_str() {
        "las" => Ok(Extension::Las),
        "laz" => Ok(Extension::Laz),
        "csv" => Ok(Extension::Csv),
        "txt" => Ok(Extension::Txt),
        _ => Err(ParseError::UnsupportedExtension(extension.to_string())),
    }
}

/// The shared extension of `paths`; mixing formats is an error.
pub fn check_and_get_extension(paths: &[PathBuf]) -> Result<Extension, ParseError> {
    let mut extensions = vec![];
    for path in paths.iter() {
        match path.extension().and_then(OsStr::to_str) {
            Some(ext) => extensions.push(ext.to_ascii_lowercase()),
            None => return Err(ParseError::MissingExtension(path.clone())),
        }
    }
    extensions.sort();
    extensions.dedup();

    match extensions.as_slice() {
        [] => Err(ParseError::NoInput),
        [extension] => get_extension(extension),
        _ => Err(ParseError::MixedExtensions(extensions)),
    }
}

/// Picks the parser for the files' common extension.
pub fn parser_for_path(
    filenames: Vec<PathBuf>,
    options: ParseOptions,
) -> Result<Box<dyn Parser>, ParseError> {
    let provider: Box<dyn ParserProvider> = match check_and_get_extension(&filenames)? {
        Extension::Las | Extension::Laz => Box::new(las::LasParserProvider { filenames, options }),
        Extension::Csv | Extension::Txt => Box::new(csv::CsvParserProvider { filenames, options }),
    };
    Ok(provider.get_parser())
}
