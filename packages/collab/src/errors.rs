//! Error types for collaboration

use crate::ids::VersionId;
use quire_editor::EditorError;
use quire_transform::StepError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollabError {
    #[error("Version {0} is not in the store")]
    MissingVersion(VersionId),

    #[error("Version {to} does not descend from {from}")]
    UnconnectedVersions { from: VersionId, to: VersionId },

    #[error("Too many unconfirmed steps (limit {limit})")]
    UnconfirmedOverflow { limit: usize },

    #[error("No request in flight")]
    NoRequestInFlight,

    #[error("Remote steps do not apply: {0}")]
    Step(#[from] StepError),

    #[error("Editor error: {0}")]
    Editor(#[from] EditorError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Failure of one exchange with the hub.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Request was cancelled")]
    Cancelled,

    #[error("Channel closed")]
    Closed,

    #[error("Hub error: {0}")]
    Remote(String),
}
