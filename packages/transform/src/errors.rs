use quire_model::{ModelError, Pos};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StepError {
    #[error("Unknown step kind: {0}")]
    UnknownStep(String),

    #[error("Step {step} is missing `{field}`")]
    MissingField { step: String, field: &'static str },

    #[error("Step {step} carries the wrong kind of parameter")]
    BadParam { step: String },

    #[error("Position {0} does not exist in the document")]
    InvalidPos(Pos),

    #[error("Range end {to} comes before its start {from}")]
    Reversed { from: Pos, to: Pos },

    #[error("Open depths of the slice don't match the replaced range")]
    MismatchedDepth,

    #[error("Can't join {before} with {after}")]
    CantJoin {
        before: &'static str,
        after: &'static str,
    },

    #[error("{parent} can't contain {child}")]
    InvalidContent {
        parent: &'static str,
        child: &'static str,
    },

    #[error("Invalid depth {depth} at {pos}")]
    InvalidDepth { pos: Pos, depth: usize },

    #[error("Range {from} to {to} doesn't cover whole siblings")]
    NotSiblings { from: Pos, to: Pos },

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
