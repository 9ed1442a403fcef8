use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Input file does not exist: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(
        "Inconsistent data for target {target_id}: coords recorded at {first:?} and {second:?}"
    )]
    InconsistentTarget {
        target_id: u32,
        first: (i64, i64),
        second: (i64, i64),
    },

    #[error("Invalid study: {0} (expected 'position' or 'validation')")]
    InvalidStudy(String),

    #[error("Invalid graph type: {0} (expected 'scatter' or 'vector')")]
    InvalidGraphType(String),

    #[error("Invalid value for {column}: '{value}'")]
    InvalidField { column: String, value: String },

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Target {target_id} has no stats for position {position}")]
    MissingTargetPosition { target_id: u32, position: String },

    #[error("Invalid survey value: {0}")]
    InvalidSurveyValue(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to format report: {0}")]
    Format(#[from] std::fmt::Error),
}

impl AnalysisError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnalysisError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_field(column: impl Into<String>, value: impl Into<String>) -> Self {
        AnalysisError::InvalidField {
            column: column.into(),
            value: value.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Fail with [`AnalysisError::MissingFile`] unless `path` exists.
pub fn require_file(path: &std::path::Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(AnalysisError::MissingFile(path.to_path_buf()))
    }
}
