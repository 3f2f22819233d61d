//! # Steps
//!
//! A [`Step`] is a named, serializable edit description. What a step *does*
//! is defined by the [`StepKind`] registered under its name in a
//! [`StepRegistry`]. The registry is an explicit value, built once and
//! shared (`Arc<StepRegistry>`) by everything that applies steps.

use crate::errors::StepError;
use crate::map::PosMap;
use crate::{ancestor, join, replace, split, style};
use quire_model::{Markup, Node, Pos, Slice, Style};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Pos>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Pos>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Pos>,
    #[serde(default, skip_serializing_if = "StepParam::is_none")]
    pub param: StepParam,
}

/// Step-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepParam {
    #[default]
    None,
    Slice(Slice),
    Split {
        depth: usize,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        markups: Vec<Markup>,
    },
    Join {
        depth: usize,
    },
    Ancestor {
        depth: usize,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        wrappers: Vec<Markup>,
    },
    Style(Style),
}

impl StepParam {
    pub fn is_none(&self) -> bool {
        matches!(self, StepParam::None)
    }
}

impl Step {
    pub const REPLACE: &'static str = "replace";
    pub const SPLIT: &'static str = "split";
    pub const JOIN: &'static str = "join";
    pub const ANCESTOR: &'static str = "ancestor";
    pub const ADD_STYLE: &'static str = "add_style";
    pub const REMOVE_STYLE: &'static str = "remove_style";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            from: None,
            to: None,
            pos: None,
            param: StepParam::None,
        }
    }

    pub fn replace(from: Pos, to: Pos, slice: Slice) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            param: StepParam::Slice(slice),
            ..Self::new(Self::REPLACE)
        }
    }

    /// Split `depth` levels of nodes at `pos`. `markups` optionally gives the
    /// type of each new right-hand node, outermost first.
    pub fn split(pos: Pos, depth: usize, markups: Vec<Markup>) -> Self {
        Self {
            pos: Some(pos),
            param: StepParam::Split { depth, markups },
            ..Self::new(Self::SPLIT)
        }
    }

    /// Join the nodes before and after the block position `pos`, `depth`
    /// levels deep.
    pub fn join(pos: Pos, depth: usize) -> Self {
        Self {
            pos: Some(pos),
            param: StepParam::Join { depth },
            ..Self::new(Self::JOIN)
        }
    }

    /// Lift the sibling range `from..to` out of `depth` ancestors and wrap it
    /// in `wrappers` (outermost first).
    pub fn ancestor(from: Pos, to: Pos, depth: usize, wrappers: Vec<Markup>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            param: StepParam::Ancestor { depth, wrappers },
            ..Self::new(Self::ANCESTOR)
        }
    }

    pub fn add_style(from: Pos, to: Pos, style: Style) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            param: StepParam::Style(style),
            ..Self::new(Self::ADD_STYLE)
        }
    }

    pub fn remove_style(from: Pos, to: Pos, style: Style) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            param: StepParam::Style(style),
            ..Self::new(Self::REMOVE_STYLE)
        }
    }

    pub(crate) fn require_from(&self) -> Result<&Pos, StepError> {
        self.from.as_ref().ok_or(StepError::MissingField {
            step: self.name.clone(),
            field: "from",
        })
    }

    pub(crate) fn require_to(&self) -> Result<&Pos, StepError> {
        self.to.as_ref().ok_or(StepError::MissingField {
            step: self.name.clone(),
            field: "to",
        })
    }

    pub(crate) fn require_pos(&self) -> Result<&Pos, StepError> {
        self.pos.as_ref().ok_or(StepError::MissingField {
            step: self.name.clone(),
            field: "pos",
        })
    }

    pub(crate) fn bad_param(&self) -> StepError {
        StepError::BadParam {
            step: self.name.clone(),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(from) = &self.from {
            write!(f, " from {}", from)?;
        }
        if let Some(to) = &self.to {
            write!(f, " to {}", to)?;
        }
        if let Some(pos) = &self.pos {
            write!(f, " at {}", pos)?;
        }
        Ok(())
    }
}

/// Outcome of applying a step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub before: Node,
    pub doc: Node,
    pub map: PosMap,
}

/// Behaviour of one kind of step.
///
/// `apply` must be a pure function of the document and the step. Invalid
/// input is an error here; the registry turns it into "no result".
pub trait StepKind: Send + Sync {
    /// The name steps of this kind carry
    fn name(&self) -> &'static str;

    /// Apply the step to `doc`
    fn apply(&self, doc: &Node, step: &Step) -> Result<StepResult, StepError>;

    /// A step that undoes `step`, valid against `result.doc`
    fn invert(&self, step: &Step, result: &StepResult) -> Result<Step, StepError>;
}

pub struct StepRegistry {
    kinds: HashMap<&'static str, Box<dyn StepKind>>,
}

impl StepRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// A registry with every built-in step kind.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(replace::ReplaceKind);
        registry.register(split::SplitKind);
        registry.register(join::JoinKind);
        registry.register(ancestor::AncestorKind);
        registry.register(style::AddStyleKind);
        registry.register(style::RemoveStyleKind);
        registry
    }

    pub fn register(&mut self, kind: impl StepKind + 'static) {
        self.kinds.insert(kind.name(), Box::new(kind));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&dyn StepKind, StepError> {
        self.kinds
            .get(name)
            .map(|kind| kind.as_ref())
            .ok_or_else(|| StepError::UnknownStep(name.to_string()))
    }

    /// Apply `step` to `doc`, or `None` when the step doesn't fit the
    /// document.
    pub fn apply(&self, doc: &Node, step: &Step) -> Option<StepResult> {
        match self.get(&step.name).and_then(|kind| kind.apply(doc, step)) {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::debug!("[Transform] Rejected {}: {}", step, e);
                None
            }
        }
    }

    pub fn invert(&self, step: &Step, result: &StepResult) -> Option<Step> {
        match self.get(&step.name).and_then(|kind| kind.invert(step, result)) {
            Ok(inverted) => Some(inverted),
            Err(e) => {
                tracing::warn!("[Transform] Can't invert {}: {}", step, e);
                None
            }
        }
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&&str> = self.kinds.keys().collect();
        names.sort();
        f.debug_struct("StepRegistry").field("kinds", &names).finish()
    }
}
