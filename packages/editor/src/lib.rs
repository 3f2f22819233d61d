//! # Quire Editor
//!
//! Editor state and undo history on top of the transform layer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ transform: steps, position maps, rebasing   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: document + selection + history      │
//! │  - Apply transforms built on the current doc│
//! │  - Group edits into undo events             │
//! │  - Undo/redo mapped over later changes      │
//! │  - Rebase history under remote steps        │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ collab: unconfirmed steps, hub, versions    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Undo is a new change**: undoing applies inverted steps, it never
//!    rewinds to an old snapshot
//! 2. **History survives foreign edits**: inverted steps are mapped over
//!    everything that happened after them
//! 3. **Time is injected**: event grouping reads a [`Clock`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quire_editor::EditorState;
//!
//! let mut state = EditorState::new(registry, doc);
//! let mut tr = state.transform();
//! tr.insert_text(&pos, "hello");
//! state.apply(&tr)?;
//!
//! state.undo();
//! state.redo();
//! ```

mod branch;
mod clock;
mod config;
mod errors;
mod history;
mod state;

pub use branch::{Branch, InvertedStep};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::HistoryConfig;
pub use errors::{ConfigError, EditorError};
pub use history::History;
pub use state::{ApplyOptions, EditorState, Selection};
