use std::sync::Arc;

use thiserror::Error;

/// The error type for this crate.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Cannot open/read/write a path.
    #[error("file error: {0}")]
    FileError(String),
    /// I/O failure underlying a `FileError`.
    #[error(transparent)]
    Io(Arc<std::io::Error>),
    /// Malformed model: bad XML, scale too big, unknown element, unmatched tag.
    #[error("model parse error: {0}")]
    ModelParseError(String),
    /// Wrong column count, unknown attribute, unknown scale value.
    #[error("csv parse error: {0}")]
    CsvParseError(String),
    /// Underlying CSV library failure.
    #[error(transparent)]
    Csv(Arc<csv::Error>),
    /// Post-load validation failed (length mismatch, out-of-range value).
    #[error("options inconsistent: {0}")]
    OptionsInconsistent(String),
    /// Prediction called with an empty learning subset; kappa computed with N=0.
    #[error("solver error: {0}")]
    SolverError(String),
    /// Invariant violated.
    #[error("internal error: {0}")]
    InternalError(String),
    /// Caller returned false from a callback or interrupt.
    #[error("cancelled")]
    Cancelled,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Self::Csv(Arc::new(err))
    }
}

impl From<pest::error::Error<crate::io::model_xml::Rule>> for Error {
    fn from(err: pest::error::Error<crate::io::model_xml::Rule>) -> Self {
        Self::ModelParseError(err.to_string())
    }
}

/// A specialized [`Result`] type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
