pub mod error;
pub mod exporters;

pub use error::ExportError;
