use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    /// Name or code missing from the lookup tables.
    #[error("Unknown {kind}: {key}")]
    Lookup { kind: &'static str, key: String },

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid table identifier: {0}")]
    InvalidTableId(String),

    #[error("Table not found in store: {0}")]
    MissingTable(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowError {
    pub(crate) fn lookup(kind: &'static str, key: impl Into<String>) -> Self {
        FlowError::Lookup {
            kind,
            key: key.into(),
        }
    }
}

#[cfg(feature = "python")]
impl From<FlowError> for pyo3::PyErr {
    fn from(err: FlowError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyValueError};
        match err {
            FlowError::Lookup { .. } => PyKeyError::new_err(err.to_string()),
            FlowError::InvalidDate(_)
            | FlowError::InvalidArgument(_)
            | FlowError::InvalidTableId(_) => PyValueError::new_err(err.to_string()),
            other => PyRuntimeError::new_err(other.to_string()),
        }
    }
}
