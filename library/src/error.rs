use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),
    #[error("Invalid name \"{0}\"")]
    InvalidName(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("Compute error: {0}")]
    Compute(String),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Binary encoding error: {0}")]
    Binary(#[from] bincode::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        GraphError::NotFound(msg.into())
    }

    pub fn topology(msg: impl Into<String>) -> Self {
        GraphError::InvalidTopology(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        GraphError::InvalidArgument(msg.into())
    }

    pub fn compute(msg: impl Into<String>) -> Self {
        GraphError::Compute(msg.into())
    }

    pub fn type_mismatch(expected: impl ToString, found: impl ToString) -> Self {
        GraphError::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}
