//! JSON form of steps, as exchanged with the server.

use crate::errors::StepError;
use crate::step::{Step, StepRegistry};
use serde::Deserialize;
use serde_json::Value;

pub fn step_to_json(step: &Step) -> Result<Value, StepError> {
    Ok(serde_json::to_value(step)?)
}

/// Decode a step, rejecting kinds the registry doesn't know.
pub fn step_from_json(registry: &StepRegistry, value: &Value) -> Result<Step, StepError> {
    let step = Step::deserialize(value)?;
    if !registry.contains(&step.name) {
        return Err(StepError::UnknownStep(step.name));
    }
    Ok(step)
}
