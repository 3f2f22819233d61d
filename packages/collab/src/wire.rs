//! Messages exchanged between a client and the hub. Steps travel as JSON
//! values produced by [`quire_transform::step_to_json`].

use crate::ids::ClientId;
use quire_transform::{step_from_json, step_to_json, Step, StepError, StepRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A batch of local steps, made against hub version `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendRequest {
    pub client_id: ClientId,
    pub version: u64,
    pub steps: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    pub accepted: bool,
    /// The hub's version after handling the request.
    pub version: u64,
}

/// Steps the hub accepted from `client_id`, the first of which produced
/// hub version `version + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    pub version: u64,
    pub client_id: ClientId,
    pub steps: Vec<Value>,
}

impl Broadcast {
    /// The hub version after these steps.
    pub fn end(&self) -> u64 {
        self.version + self.steps.len() as u64
    }
}

pub fn encode_steps<'a>(steps: impl IntoIterator<Item = &'a Step>) -> Result<Vec<Value>, StepError> {
    steps.into_iter().map(step_to_json).collect()
}

pub fn decode_steps(registry: &StepRegistry, values: &[Value]) -> Result<Vec<Step>, StepError> {
    values.iter().map(|value| step_from_json(registry, value)).collect()
}
