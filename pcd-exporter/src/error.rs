use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported output extension: {0}")]
    UnsupportedExtension(PathBuf),

    #[error("failed to create directory for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write LAS file {path}: {source}")]
    Las {
        path: PathBuf,
        #[source]
        source: las::Error,
    },

    #[error("class code {code} cannot be stored in LAS file {path}")]
    ClassCode { path: PathBuf, code: i32 },

    #[error("failed to write CSV file {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}
