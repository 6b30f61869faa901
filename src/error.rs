use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("No data source available: upload a file, pass a URL, or place '{0}' in the working directory")]
    NoSource(String),

    #[error("Failed to fetch '{url}': {reason}")]
    Fetch { url: String, reason: String },

    #[error("Failed to parse spreadsheet: {0}")]
    Parse(String),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[error("Computation error: {0}")]
    Compute(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::error::PolarsError> for DashboardError {
    fn from(err: polars::error::PolarsError) -> Self {
        DashboardError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
