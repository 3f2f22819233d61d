//! Add or remove an inline style across a range. Only text changes, so the
//! position map is the identity.

use crate::errors::StepError;
use crate::map::PosMap;
use crate::step::{Step, StepKind, StepParam, StepResult};
use quire_model::{add_style, has_style_kind, inline, remove_style, Node, Pos, Style};

pub struct AddStyleKind;

pub struct RemoveStyleKind;

fn style_param(step: &Step) -> Result<&Style, StepError> {
    match &step.param {
        StepParam::Style(style) => Ok(style),
        _ => Err(step.bad_param()),
    }
}

fn check_range(doc: &Node, from: &Pos, to: &Pos) -> Result<(), StepError> {
    if from > to {
        return Err(StepError::Reversed {
            from: from.clone(),
            to: to.clone(),
        });
    }
    for pos in [from, to] {
        if !doc.is_valid_pos(pos) {
            return Err(StepError::InvalidPos(pos.clone()));
        }
    }
    Ok(())
}

/// Whether the child at `index` of the node at `path` overlaps `from..to`.
fn child_in_range(path: &[usize], index: usize, from: &Pos, to: &Pos) -> bool {
    let child_start = Pos::new(path.to_vec(), index);
    let child_end = Pos::new(path.to_vec(), index + 1);
    from < &child_end && to > &child_start
}

/// Character range of the textblock at `path` that lies inside `from..to`.
fn text_range(node: &Node, path: &[usize], from: &Pos, to: &Pos) -> (usize, usize) {
    let start = if from.path == path { from.offset } else { 0 };
    let end = if to.path == path { to.offset } else { node.size() };
    (start, end)
}

fn restyle(
    node: &Node,
    path: &mut Vec<usize>,
    from: &Pos,
    to: &Pos,
    f: &dyn Fn(&[Style]) -> Vec<Style>,
) -> Node {
    if node.is_textblock() {
        let (start, end) = text_range(node, path, from, to);
        return node.copy(inline::restyle(node.content(), start, end, f));
    }
    let mut content = node.content().to_vec();
    for (index, child) in content.iter_mut().enumerate() {
        if child.child_count() == 0 || !child_in_range(path, index, from, to) {
            continue;
        }
        path.push(index);
        *child = restyle(child, path, from, to, f);
        path.pop();
    }
    node.copy(content)
}

/// Whether any text in the range satisfies `pred`, and whether all of it
/// does.
fn coverage(
    node: &Node,
    path: &mut Vec<usize>,
    from: &Pos,
    to: &Pos,
    pred: &dyn Fn(&[Style]) -> bool,
    acc: &mut (bool, bool),
) {
    if node.is_textblock() {
        let (start, end) = text_range(node, path, from, to);
        let (any, all) = inline::style_coverage(node.content(), start, end, pred);
        acc.0 |= any;
        acc.1 &= all;
        return;
    }
    for (index, child) in node.content().iter().enumerate() {
        if child.child_count() == 0 || !child_in_range(path, index, from, to) {
            continue;
        }
        path.push(index);
        coverage(child, path, from, to, pred, acc);
        path.pop();
    }
}

pub(crate) fn range_coverage(
    doc: &Node,
    from: &Pos,
    to: &Pos,
    pred: &dyn Fn(&[Style]) -> bool,
) -> (bool, bool) {
    let mut acc = (false, true);
    coverage(doc, &mut Vec::new(), from, to, pred, &mut acc);
    acc
}

fn restyle_step(
    doc: &Node,
    step: &Step,
    f: &dyn Fn(&[Style]) -> Vec<Style>,
) -> Result<StepResult, StepError> {
    let from = step.require_from()?;
    let to = step.require_to()?;
    check_range(doc, from, to)?;
    let new_doc = restyle(doc, &mut Vec::new(), from, to, f);
    Ok(StepResult {
        before: doc.clone(),
        doc: new_doc,
        map: PosMap::identity(),
    })
}

fn restore_range(step: &Step, result: &StepResult) -> Result<Step, StepError> {
    let from = step.require_from()?;
    let to = step.require_to()?;
    let slice = result
        .before
        .slice(from, to)
        .ok_or_else(|| StepError::InvalidPos(from.clone()))?;
    Ok(Step::replace(from.clone(), to.clone(), slice))
}

impl StepKind for AddStyleKind {
    fn name(&self) -> &'static str {
        Step::ADD_STYLE
    }

    fn apply(&self, doc: &Node, step: &Step) -> Result<StepResult, StepError> {
        let style = style_param(step)?;
        restyle_step(doc, step, &|styles| add_style(styles, style))
    }

    fn invert(&self, step: &Step, result: &StepResult) -> Result<Step, StepError> {
        let style = style_param(step)?;
        let from = step.require_from()?;
        let to = step.require_to()?;
        let (any, _) = range_coverage(&result.before, from, to, &|styles| {
            has_style_kind(styles, style)
        });
        if any {
            restore_range(step, result)
        } else {
            Ok(Step::remove_style(from.clone(), to.clone(), style.clone()))
        }
    }
}

impl StepKind for RemoveStyleKind {
    fn name(&self) -> &'static str {
        Step::REMOVE_STYLE
    }

    fn apply(&self, doc: &Node, step: &Step) -> Result<StepResult, StepError> {
        let style = style_param(step)?;
        restyle_step(doc, step, &|styles| remove_style(styles, style))
    }

    fn invert(&self, step: &Step, result: &StepResult) -> Result<Step, StepError> {
        let style = style_param(step)?;
        let from = step.require_from()?;
        let to = step.require_to()?;
        let (_, all) = range_coverage(&result.before, from, to, &|styles| styles.contains(style));
        if all {
            Ok(Step::add_style(from.clone(), to.clone(), style.clone()))
        } else {
            restore_range(step, result)
        }
    }
}
