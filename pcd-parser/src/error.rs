use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no input files given")]
    NoInput,

    #[error("file extension is not found: {0}")]
    MissingExtension(PathBuf),

    #[error("unsupported extension: {0}")]
    UnsupportedExtension(String),

    #[error("multiple extensions are not supported: {0:?}")]
    MixedExtensions(Vec<String>),

    #[error("failed to read LAS file {path}: {source}")]
    Las {
        path: PathBuf,
        #[source]
        source: las::Error,
    },

    #[error("failed to read CSV file {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("required column '{column}' is missing in {path}")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("failed to parse '{column}' value {value:?} at record {record} of {path}")]
    InvalidValue {
        path: PathBuf,
        record: u64,
        column: &'static str,
        value: String,
    },

    #[error("label code {code} in {path} does not match any class")]
    UnknownLabel { path: PathBuf, code: i32 },
}
