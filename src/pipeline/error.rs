//! Pipeline error types.

use serde_json::Value;
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised while executing a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Cannot convert {value} to double")]
    InvalidNumber { value: Value },

    #[error("{op} only supports numeric types, got {value}")]
    TypeMismatch { op: &'static str, value: Value },

    #[error("Invalid stage: {0}")]
    InvalidStage(String),

    #[error("Output document does not match the report row: {0}")]
    Shape(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn invalid_number(value: &Value) -> Self {
        Self::InvalidNumber {
            value: value.clone(),
        }
    }

    pub fn type_mismatch(op: &'static str, value: &Value) -> Self {
        Self::TypeMismatch {
            op,
            value: value.clone(),
        }
    }
}
