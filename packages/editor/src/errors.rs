//! Error types for the editor

use quire_model::Pos;
use quire_transform::StepError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Transform was built on a different document than the current one")]
    StaleTransform,

    #[error("Selection position {0} is not valid in the document")]
    InvalidSelection(Pos),

    #[error("Step error: {0}")]
    Step(#[from] StepError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
