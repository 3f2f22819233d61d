//! # Editor state
//!
//! The current document, the selection in it and the undo history. Every
//! change goes through [`EditorState::apply`], which checks the transform
//! was built on the current document, maps the selection and records the
//! change in history.

use crate::clock::{Clock, SystemClock};
use crate::config::HistoryConfig;
use crate::errors::EditorError;
use crate::history::History;
use quire_model::{Node, Pos};
use quire_transform::{Bias, PosMap, Rebased, Remapping, StepRegistry, Transform};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Pos,
    pub head: Pos,
}

impl Selection {
    pub fn new(anchor: Pos, head: Pos) -> Self {
        Self { anchor, head }
    }

    pub fn cursor(pos: Pos) -> Self {
        Self {
            anchor: pos.clone(),
            head: pos,
        }
    }

    /// A cursor at the start of the first textblock, or of the document
    /// when it has none.
    pub fn at_start(doc: &Node) -> Self {
        let mut path = Vec::new();
        let mut node = doc;
        while !node.is_textblock() {
            match node.child(0) {
                Some(child) if !child.is_text() => {
                    path.push(0);
                    node = child;
                }
                _ => return Self::cursor(Pos::start(&[])),
            }
        }
        Self::cursor(Pos::start(&path))
    }

    pub fn from(&self) -> &Pos {
        std::cmp::min(&self.anchor, &self.head)
    }

    pub fn to(&self) -> &Pos {
        std::cmp::max(&self.anchor, &self.head)
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    fn map_with(&self, f: impl Fn(&Pos) -> Pos) -> Selection {
        Selection {
            anchor: f(&self.anchor),
            head: f(&self.head),
        }
    }
}

/// Options for [`EditorState::apply_with`].
#[derive(Debug, Clone, Copy)]
pub struct ApplyOptions {
    /// Whether the change can be undone. Remote and programmatic changes
    /// pass `false`.
    pub add_to_history: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self { add_to_history: true }
    }
}

#[derive(Debug)]
pub struct EditorState {
    registry: Arc<StepRegistry>,
    doc: Node,
    selection: Selection,
    history: History,
    clock: Arc<dyn Clock>,
}

impl EditorState {
    pub fn new(registry: Arc<StepRegistry>, doc: Node) -> Self {
        Self::with_config(registry, doc, HistoryConfig::default(), Arc::new(SystemClock))
    }

    pub fn with_config(
        registry: Arc<StepRegistry>,
        doc: Node,
        config: HistoryConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            selection: Selection::at_start(&doc),
            doc,
            history: History::new(config),
            clock,
        }
    }

    pub fn registry(&self) -> &Arc<StepRegistry> {
        &self.registry
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    pub fn set_selection(&mut self, selection: Selection) -> Result<(), EditorError> {
        for pos in [&selection.anchor, &selection.head] {
            if !self.doc.is_valid_pos(pos) {
                return Err(EditorError::InvalidSelection(pos.clone()));
            }
        }
        self.selection = selection;
        Ok(())
    }

    /// An empty transform on the current document.
    pub fn transform(&self) -> Transform {
        Transform::new(self.registry.clone(), self.doc.clone())
    }

    pub fn apply(&mut self, transform: &Transform) -> Result<(), EditorError> {
        self.apply_with(transform, ApplyOptions::default())
    }

    pub fn apply_with(&mut self, transform: &Transform, options: ApplyOptions) -> Result<(), EditorError> {
        if transform.before() != &self.doc {
            return Err(EditorError::StaleTransform);
        }
        self.history
            .record(transform, options.add_to_history, self.clock.now_millis());
        self.set_doc(transform);
        Ok(())
    }

    /// Undo the newest event. Returns the applied transform, or `None` when
    /// there was nothing to undo.
    pub fn undo(&mut self) -> Option<Transform> {
        let transform = self.history.undo(&self.registry, &self.doc)?;
        self.set_doc(&transform);
        Some(transform)
    }

    pub fn redo(&mut self) -> Option<Transform> {
        let transform = self.history.redo(&self.registry, &self.doc)?;
        self.set_doc(&transform);
        Some(transform)
    }

    /// Take in remote steps that landed under the trailing local ones.
    /// `rebased.transform` replays those local steps on top of the remote
    /// ones and becomes the new document; `rebased.mapping` carries the
    /// selection over.
    pub fn rebase(&mut self, remote_maps: &[PosMap], rebased: &Rebased) {
        self.selection = map_selection(&self.selection, &rebased.mapping);
        self.doc = rebased.transform.doc().clone();
        self.history
            .rebase(remote_maps, &rebased.transform, &rebased.positions);
    }

    fn set_doc(&mut self, transform: &Transform) {
        self.selection = self
            .selection
            .map_with(|pos| transform.map(pos, Bias::After).pos);
        self.doc = transform.doc().clone();
    }
}

fn map_selection(selection: &Selection, mapping: &Remapping) -> Selection {
    selection.map_with(|pos| mapping.map(pos, Bias::After).pos)
}
