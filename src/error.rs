use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Required columns could not be resolved: {0}")]
    MissingColumns(String),

    #[error("External summary service unavailable: {0}")]
    ExternalUnavailable(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
