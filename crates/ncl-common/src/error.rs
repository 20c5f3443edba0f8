use thiserror::Error;

#[derive(Debug, Error)]
pub enum NclError {
    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Non-numeric input in column '{column}' at row '{row_id}': {value:?}")]
    NonNumeric {
        column: String,
        row_id: String,
        value: String,
    },

    #[error("Empty selection: {0}")]
    EmptySelection(String),

    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("No prediction for row '{0}'")]
    MissingPrediction(String),

    #[error("Linear algebra error: {0}")]
    Linalg(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, NclError>;
