//! # Replace
//!
//! Replace the range `from..to` with a slice. The slice's open sides are
//! joined with the nodes that the range cuts through, so the open depth on
//! each side must line up with the depth of the matching position:
//! `from.depth() - open_start == to.depth() - open_end`.
//!
//! The map collapses the replaced range and moves everything after `to`
//! (at every level from the deepest shared ancestor down) to its new
//! address, counted from the end of each rewritten node.

use crate::errors::StepError;
use crate::map::{CollapsedRange, MovedRange, PosMap};
use crate::step::{Step, StepKind, StepParam, StepResult};
use quire_model::{Node, Pos, Slice};

pub struct ReplaceKind;

impl StepKind for ReplaceKind {
    fn name(&self) -> &'static str {
        Step::REPLACE
    }

    fn apply(&self, doc: &Node, step: &Step) -> Result<StepResult, StepError> {
        let from = step.require_from()?;
        let to = step.require_to()?;
        match &step.param {
            StepParam::Slice(slice) => replace(doc, from, to, slice),
            StepParam::None => replace(doc, from, to, &Slice::empty()),
            _ => Err(step.bad_param()),
        }
    }

    fn invert(&self, step: &Step, result: &StepResult) -> Result<Step, StepError> {
        let from = step.require_from()?;
        let to = step.require_to()?;
        let new_to = result
            .map
            .collapsed()
            .first()
            .map(|range| range.new_to.clone())
            .ok_or_else(|| StepError::InvalidPos(to.clone()))?;
        let removed = result
            .before
            .slice(from, to)
            .ok_or_else(|| StepError::InvalidPos(to.clone()))?;
        Ok(Step::replace(from.clone(), new_to, removed))
    }
}

/// One end of a replaced range (or of a slice), with the nodes along its
/// path.
struct Side {
    nodes: Vec<Node>,
    path: Vec<usize>,
    offset: usize,
}

impl Side {
    fn resolve(root: &Node, pos: &Pos) -> Result<Side, StepError> {
        let invalid = || StepError::InvalidPos(pos.clone());
        let found = root.path_nodes(&pos.path).ok_or_else(invalid)?;
        let last = found.last().ok_or_else(invalid)?;
        if last.is_text() || pos.offset > last.size() {
            return Err(invalid());
        }
        Ok(Side {
            nodes: found.into_iter().cloned().collect(),
            path: pos.path.clone(),
            offset: pos.offset,
        })
    }

    fn depth(&self) -> usize {
        self.path.len()
    }

    fn node(&self, depth: usize) -> &Node {
        &self.nodes[depth]
    }

    fn index(&self, depth: usize) -> usize {
        if depth < self.path.len() {
            self.path[depth]
        } else {
            self.offset
        }
    }

    /// Content of the node at `depth` before this side's path.
    fn left(&self, depth: usize) -> Vec<Node> {
        self.node(depth).cut(0, self.index(depth))
    }

    /// Content of the node at `depth` after this side's path.
    fn right(&self, depth: usize) -> Vec<Node> {
        let node = self.node(depth);
        if depth == self.depth() {
            node.cut(self.offset, node.size())
        } else {
            node.cut(self.index(depth) + 1, node.child_count())
        }
    }
}

fn joinable(before: &Node, after: &Node) -> Result<(), StepError> {
    let contains = before.ty().contains();
    if contains.is_some() && contains == after.ty().contains() {
        Ok(())
    } else {
        Err(StepError::CantJoin {
            before: before.ty().name(),
            after: after.ty().name(),
        })
    }
}

pub(crate) fn close(node: &Node, content: Vec<Node>) -> Result<Node, StepError> {
    if let Some(child) = content.iter().find(|child| !node.ty().accepts(child.ty())) {
        return Err(StepError::InvalidContent {
            parent: node.ty().name(),
            child: child.ty().name(),
        });
    }
    Ok(node.copy(content))
}

fn replace_two_way(from: &Side, to: &Side, depth: usize) -> Result<Vec<Node>, StepError> {
    let mut content = from.left(depth);
    if depth < from.depth() {
        if depth >= to.depth() {
            return Err(StepError::MismatchedDepth);
        }
        let before = from.node(depth + 1);
        joinable(before, to.node(depth + 1))?;
        content.push(close(before, replace_two_way(from, to, depth + 1)?)?);
    } else if depth < to.depth() {
        return Err(StepError::MismatchedDepth);
    }
    content.extend(to.right(depth));
    Ok(content)
}

/// Slice content between the slice's two sides at `depth`, excluding the
/// open nodes along either side.
fn between(start: &Side, end: &Side, depth: usize) -> Vec<Node> {
    let node = start.node(depth);
    let from = if depth < start.depth() {
        start.index(depth) + 1
    } else {
        start.index(depth)
    };
    let to = end.index(depth);
    if from < to {
        node.cut(from, to)
    } else {
        Vec::new()
    }
}

fn replace_three_way(
    from: &Side,
    start: &Side,
    end: &Side,
    to: &Side,
    depth: usize,
) -> Result<Vec<Node>, StepError> {
    let open_start = if depth < from.depth() {
        let node = from.node(depth + 1);
        joinable(node, start.node(depth + 1))?;
        Some(node)
    } else {
        None
    };
    let open_end = if depth < to.depth() {
        let node = end.node(depth + 1);
        joinable(node, to.node(depth + 1))?;
        Some(node)
    } else {
        None
    };

    let mut content = from.left(depth);
    match (open_start, open_end) {
        (Some(first), Some(last)) if start.index(depth) == end.index(depth) => {
            joinable(first, last)?;
            content.push(close(first, replace_three_way(from, start, end, to, depth + 1)?)?);
        }
        _ => {
            if let Some(first) = open_start {
                content.push(close(first, replace_two_way(from, start, depth + 1)?)?);
            }
            content.extend(between(start, end, depth));
            if let Some(last) = open_end {
                content.push(close(last, replace_two_way(end, to, depth + 1)?)?);
            }
        }
    }
    content.extend(to.right(depth));
    Ok(content)
}

/// Wrap the slice in copies of `from`'s ancestors down to `depth`, and
/// resolve both of its sides inside that tree.
fn slice_sides(from: &Side, slice: &Slice, depth: usize) -> Result<(Side, Side), StepError> {
    let mut root = from.node(depth).copy(slice.content.clone());
    for d in (0..depth).rev() {
        root = from.node(d).copy(vec![root]);
    }

    let mut start_path = vec![0; depth];
    let mut end_path = vec![0; depth];
    let mut node = &root;
    for _ in 0..depth {
        node = node.child(0).ok_or(StepError::MismatchedDepth)?;
    }
    let slice_root = node;

    for _ in 0..slice.open_start {
        node = node.child(0).ok_or(StepError::MismatchedDepth)?;
        start_path.push(0);
    }
    let start = Side::resolve(&root, &Pos::new(start_path, 0))?;

    node = slice_root;
    for _ in 0..slice.open_end {
        let last = node.child_count().checked_sub(1).ok_or(StepError::MismatchedDepth)?;
        node = node.child(last).ok_or(StepError::MismatchedDepth)?;
        end_path.push(last);
    }
    let end = Side::resolve(&root, &Pos::new(end_path, node.size()))?;
    Ok((start, end))
}

/// The position `to` ends up at once the replaced content is gone, found by
/// counting from the end of each rebuilt node.
fn locate_new_to(doc: &Node, to: &Side, shared: usize) -> Option<Pos> {
    let mut path = to.path[..shared].to_vec();
    let mut node = doc.path(&path)?;
    for depth in shared..to.depth() {
        let after = to.node(depth).child_count() - to.path[depth] - 1;
        let index = node.child_count().checked_sub(after + 1)?;
        path.push(index);
        node = node.child(index)?;
    }
    let after = to.node(to.depth()).size() - to.offset;
    let offset = node.size().checked_sub(after)?;
    Some(Pos::new(path, offset))
}

fn replace_map(to: &Side, from: &Pos, new_to: &Pos, shared: usize) -> PosMap {
    let mut moved = Vec::new();
    for depth in shared..=to.depth() {
        let node = to.node(depth);
        if depth < to.depth() {
            let start = to.path[depth] + 1;
            moved.push(MovedRange {
                start: Pos::new(to.path[..depth].to_vec(), start),
                size: node.child_count() - start,
                dest: Pos::new(new_to.path[..depth].to_vec(), new_to.path[depth] + 1),
            });
        } else {
            moved.push(MovedRange {
                start: Pos::new(to.path.clone(), to.offset),
                size: node.size() - to.offset,
                dest: new_to.clone(),
            });
        }
    }
    PosMap::new(
        moved,
        vec![CollapsedRange {
            from: from.clone(),
            to: Pos::new(to.path.clone(), to.offset),
            new_from: from.clone(),
            new_to: new_to.clone(),
        }],
    )
}

pub(crate) fn replace(doc: &Node, from: &Pos, to: &Pos, slice: &Slice) -> Result<StepResult, StepError> {
    if from > to {
        return Err(StepError::Reversed {
            from: from.clone(),
            to: to.clone(),
        });
    }
    let depth = from
        .depth()
        .checked_sub(slice.open_start)
        .ok_or(StepError::MismatchedDepth)?;
    if to.depth().checked_sub(slice.open_end) != Some(depth) {
        return Err(StepError::MismatchedDepth);
    }
    if slice.is_empty() && (slice.open_start > 0 || slice.open_end > 0) {
        return Err(StepError::MismatchedDepth);
    }

    let from_side = Side::resolve(doc, from)?;
    let to_side = Side::resolve(doc, to)?;
    let mut shared = 0;
    while shared < depth && from.path[shared] == to.path[shared] {
        shared += 1;
    }

    let parent = from_side.node(shared);
    let content = if slice.is_empty() {
        replace_two_way(&from_side, &to_side, shared)?
    } else if slice.open_start == 0
        && slice.open_end == 0
        && from.depth() == shared
        && to.depth() == shared
    {
        let mut content = parent.cut(0, from.offset);
        content.extend(slice.content.iter().cloned());
        content.extend(parent.cut(to.offset, parent.size()));
        content
    } else {
        let (start, end) = slice_sides(&from_side, slice, depth)?;
        replace_three_way(&from_side, &start, &end, &to_side, shared)?
    };
    let rebuilt = close(parent, content)?;
    let new_doc = doc
        .replace_at(&from.path[..shared], rebuilt)
        .ok_or_else(|| StepError::InvalidPos(from.clone()))?;

    let new_to = locate_new_to(&new_doc, &to_side, shared)
        .ok_or_else(|| StepError::InvalidPos(to.clone()))?;
    let map = replace_map(&to_side, from, &new_to, shared);
    Ok(StepResult {
        before: doc.clone(),
        doc: new_doc,
        map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Bias;
    use quire_model::{blockquote, doc, em, li, p, ul};

    fn apply(doc: &Node, from: &Pos, to: &Pos, slice: Slice) -> StepResult {
        replace(doc, from, to, &slice).expect("replace applies")
    }

    #[test]
    fn test_insert_text() {
        let t = doc![p!["he<a>llo"]];
        let at = t.tag("a");
        let result = apply(&t.node, &at, &at, Slice::closed(vec![Node::new_text("XY", vec![])]));
        assert_eq!(result.doc, doc![p!["heXYllo"]].node);
        assert_eq!(result.map.map(&Pos::new(vec![0], 3), Bias::After).pos, Pos::new(vec![0], 5));
        assert_eq!(result.map.map(&at, Bias::Before).pos, at);
        assert_eq!(result.map.map(&at, Bias::After).pos, Pos::new(vec![0], 4));
    }

    #[test]
    fn test_delete_across_paragraphs_joins_them() {
        let t = doc![p!["on<a>e"], p!["two"], p!["th<b>ree"], p!["four"]];
        let result = apply(&t.node, &t.tag("a"), &t.tag("b"), Slice::empty());
        assert_eq!(result.doc, doc![p!["onree"], p!["four"]].node);
        let map = &result.map;
        assert_eq!(map.map(&Pos::new(vec![2], 4), Bias::After).pos, Pos::new(vec![0], 4));
        assert_eq!(map.map(&Pos::new(vec![3], 1), Bias::After).pos, Pos::new(vec![1], 1));
        let inside = map.map(&Pos::new(vec![1], 1), Bias::After);
        assert!(inside.deleted);
        assert_eq!(inside.pos, Pos::new(vec![0], 2));
    }

    #[test]
    fn test_open_slice_splits_paragraph() {
        let t = doc![p!["ab<a>cd"]];
        let at = t.tag("a");
        let slice = Slice::new(vec![p!["x"].node, p!["y"].node], 1, 1);
        let result = apply(&t.node, &at, &at, slice);
        assert_eq!(result.doc, doc![p!["abx"], p!["ycd"]].node);
        assert_eq!(result.map.map(&Pos::new(vec![0], 3), Bias::After).pos, Pos::new(vec![1], 2));
    }

    #[test]
    fn test_replace_inside_nested_nodes() {
        let t = doc![p!["x"], blockquote![ul![li![p!["a<a>b<b>c"]]]]];
        let result = apply(
            &t.node,
            &t.tag("a"),
            &t.tag("b"),
            Slice::closed(vec![Node::new_text("Q", vec![])]),
        );
        assert_eq!(result.doc, doc![p!["x"], blockquote![ul![li![p!["aQc"]]]]].node);
        // the untouched first paragraph is shared with the old snapshot
        assert_eq!(result.doc.child(0), t.node.child(0));
    }

    #[test]
    fn test_invert_restores_document() {
        let t = doc![p!["on<a>e"], blockquote![p!["two"]], p!["t<b>hree"]];
        let step = Step::replace(t.tag("a"), t.tag("b"), Slice::empty());
        let result = ReplaceKind.apply(&t.node, &step).unwrap();
        let inverted = ReplaceKind.invert(&step, &result).unwrap();
        let undone = ReplaceKind.apply(&result.doc, &inverted).unwrap();
        assert_eq!(undone.doc, t.node);
    }

    #[test]
    fn test_styled_text_survives_replace() {
        let t = doc![p!["a", em!["b<a>c"], "d"]];
        let at = t.tag("a");
        let result = apply(&t.node, &at, &at, Slice::closed(vec![Node::new_text("Z", vec![])]));
        assert_eq!(result.doc.to_string(), "doc(p(\"a\", em(\"b\"), \"Z\", em(\"c\"), \"d\"))");
    }

    #[test]
    fn test_rejects_mismatched_open_depth() {
        let t = doc![p!["ab<a>cd"]];
        let at = t.tag("a");
        let slice = Slice::new(vec![p!["x"].node], 1, 0);
        assert!(matches!(
            replace(&t.node, &at, &at, &slice),
            Err(StepError::MismatchedDepth)
        ));
    }

    #[test]
    fn test_rejects_invalid_content() {
        let t = doc![ul![li![p!["a"]], "<a>", li![p!["b"]]]];
        let at = t.tag("a");
        let slice = Slice::closed(vec![p!["x"].node]);
        assert!(matches!(
            replace(&t.node, &at, &at, &slice),
            Err(StepError::InvalidContent { .. })
        ));
    }
}
