//! Split `depth` levels of nodes at a position. The innermost split node is
//! the one containing the position; every new right-hand node lands directly
//! after its left half.

use crate::errors::StepError;
use crate::map::{CollapsedRange, MovedRange, PosMap};
use crate::replace::close;
use crate::step::{Step, StepKind, StepParam, StepResult};
use quire_model::{Markup, Node, Pos};

pub struct SplitKind;

impl StepKind for SplitKind {
    fn name(&self) -> &'static str {
        Step::SPLIT
    }

    fn apply(&self, doc: &Node, step: &Step) -> Result<StepResult, StepError> {
        let pos = step.require_pos()?;
        match &step.param {
            StepParam::Split { depth, markups } => split(doc, pos, *depth, markups),
            _ => Err(step.bad_param()),
        }
    }

    fn invert(&self, step: &Step, _result: &StepResult) -> Result<Step, StepError> {
        let pos = step.require_pos()?;
        let depth = match &step.param {
            StepParam::Split { depth, .. } => *depth,
            _ => return Err(step.bad_param()),
        };
        let top = pos.depth() - depth;
        Ok(Step::join(pos.shorten(top, 1), depth))
    }
}

/// Path of the right-hand node created at `level`.
fn right_path(pos: &Pos, top: usize, level: usize) -> Vec<usize> {
    let mut path = pos.path[..top].to_vec();
    path.push(pos.path[top] + 1);
    path.extend(std::iter::repeat(0).take(level - top - 1));
    path
}

fn split(doc: &Node, pos: &Pos, depth: usize, markups: &[Markup]) -> Result<StepResult, StepError> {
    let deepest = pos.depth();
    if depth == 0 || depth > deepest {
        return Err(StepError::InvalidDepth {
            pos: pos.clone(),
            depth,
        });
    }
    let nodes = doc
        .path_nodes(&pos.path)
        .ok_or_else(|| StepError::InvalidPos(pos.clone()))?;
    let inner = nodes[deepest];
    if inner.is_text() || pos.offset > inner.size() {
        return Err(StepError::InvalidPos(pos.clone()));
    }
    let top = deepest - depth;
    let markup_at = |level: usize| -> Markup {
        markups
            .get(level - top - 1)
            .cloned()
            .unwrap_or_else(|| nodes[level].markup())
    };

    let mut left = close(inner, inner.cut(0, pos.offset))?;
    let right_markup = markup_at(deepest);
    let mut right = close(&right_markup.create(vec![]), inner.cut(pos.offset, inner.size()))?;
    for level in (top + 1..deepest).rev() {
        let node = nodes[level];
        let index = pos.path[level];
        let mut left_content = node.cut(0, index);
        left_content.push(left);
        left = close(node, left_content)?;

        let mut right_content = vec![right];
        right_content.extend(node.cut(index + 1, node.child_count()));
        right = close(&markup_at(level).create(vec![]), right_content)?;
    }

    let parent = nodes[top];
    let index = pos.path[top];
    let mut content = parent.cut(0, index);
    content.push(left);
    content.push(right);
    content.extend(parent.cut(index + 1, parent.child_count()));
    let rebuilt = close(parent, content)?;
    let new_doc = doc
        .replace_at(&pos.path[..top], rebuilt)
        .ok_or_else(|| StepError::InvalidPos(pos.clone()))?;

    let mut moved = vec![MovedRange {
        start: pos.shorten(top, 1),
        size: parent.child_count() - index - 1,
        dest: pos.shorten(top, 2),
    }];
    for level in top + 1..=deepest {
        let node = nodes[level];
        if level < deepest {
            moved.push(MovedRange {
                start: pos.shorten(level, 1),
                size: node.child_count() - pos.path[level] - 1,
                dest: Pos::new(right_path(pos, top, level), 1),
            });
        } else {
            moved.push(MovedRange {
                start: pos.clone(),
                size: node.size() - pos.offset,
                dest: Pos::new(right_path(pos, top, level), 0),
            });
        }
    }
    let collapsed = vec![CollapsedRange {
        from: pos.clone(),
        to: pos.clone(),
        new_from: pos.clone(),
        new_to: Pos::new(right_path(pos, top, deepest), 0),
    }];
    Ok(StepResult {
        before: doc.clone(),
        doc: new_doc,
        map: PosMap::new(moved, collapsed),
    })
}
