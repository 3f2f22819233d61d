//! # Quire Transform
//!
//! Steps, position maps, and transforms over [`quire_model`] documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Step: named, serializable edit description  │
//! │  - behaviour comes from a StepKind          │
//! │  - looked up in an explicit StepRegistry    │
//! └─────────────────────────────────────────────┘
//!                     ↓ apply
//! ┌─────────────────────────────────────────────┐
//! │ StepResult: new document + PosMap           │
//! └─────────────────────────────────────────────┘
//!                     ↓ collect
//! ┌─────────────────────────────────────────────┐
//! │ Transform: steps, snapshots, maps           │
//! │ Remapping + map_transform: rebase onto      │
//! │ another version of the document             │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Pure steps**: applying a step never mutates the input document
//! 2. **Invertible**: every applied step can produce its own inverse
//! 3. **Maps, not diffs**: positions move through `PosMap`s, and a deleted
//!    position can be recovered when its content comes back

mod ancestor;
mod errors;
mod join;
mod json;
mod map;
mod rebase;
mod remapping;
mod replace;
mod split;
mod step;
mod style;
mod transform;

pub use errors::StepError;
pub use json::{step_from_json, step_to_json};
pub use map::{Bias, CollapsedRange, MapResult, MovedRange, PosMap, Recovery};
pub use rebase::{map_step, map_transform, Rebased};
pub use remapping::{MapEntry, MapKey, Remapping};
pub use step::{Step, StepKind, StepParam, StepRegistry, StepResult};
pub use transform::{selected_siblings, Transform};
