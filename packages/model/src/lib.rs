//! # Quire Model
//!
//! Immutable document snapshots and the positions that address them.
//!
//! Every edit in the engine works on [`Node`] values and [`Pos`] addresses:
//! a position is only meaningful against the snapshot it was produced for,
//! and snapshots are never mutated in place.

mod errors;
pub mod inline;
mod node;
mod pos;
mod style;

#[cfg(any(test, feature = "testing"))]
pub mod build;

pub use errors::ModelError;
pub use node::{Attrs, Group, Markup, Node, NodeType, Slice};
pub use pos::{reduce_left, reduce_right, Pos};
pub use style::{add_style, has_style_kind, normalize_styles, remove_style, Style};
