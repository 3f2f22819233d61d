//! Error types for the document model

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{parent} can't contain {child}")]
    InvalidContent {
        parent: &'static str,
        child: &'static str,
    },
}
