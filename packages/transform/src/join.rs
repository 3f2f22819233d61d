//! Join the node before a block position with the node after it, and keep
//! joining the last child of the first with the first child of the second,
//! `depth` levels in total.

use crate::errors::StepError;
use crate::map::{CollapsedRange, MovedRange, PosMap};
use crate::replace::close;
use crate::step::{Step, StepKind, StepParam, StepResult};
use quire_model::{Node, Pos};

pub struct JoinKind;

impl StepKind for JoinKind {
    fn name(&self) -> &'static str {
        Step::JOIN
    }

    fn apply(&self, doc: &Node, step: &Step) -> Result<StepResult, StepError> {
        let pos = step.require_pos()?;
        match &step.param {
            StepParam::Join { depth } => join(doc, pos, *depth),
            _ => Err(step.bad_param()),
        }
    }

    fn invert(&self, step: &Step, result: &StepResult) -> Result<Step, StepError> {
        let pos = step.require_pos()?;
        let depth = match &step.param {
            StepParam::Join { depth } => *depth,
            _ => return Err(step.bad_param()),
        };
        let chains = Chains::resolve(&result.before, pos, depth)?;
        let markups = chains.after.iter().map(|node| node.markup()).collect();
        Ok(Step::split(chains.joint(), depth, markups))
    }
}

/// The nodes on both sides of a join: `before[m]` is the last descendant
/// of the node before the position at level `m`, `after[m]` the first
/// descendant of the node after it.
struct Chains<'a> {
    parent: &'a Node,
    pos: Pos,
    before: Vec<&'a Node>,
    after: Vec<&'a Node>,
    before_path: Vec<Vec<usize>>,
    after_path: Vec<Vec<usize>>,
}

impl<'a> Chains<'a> {
    fn resolve(doc: &'a Node, pos: &Pos, depth: usize) -> Result<Chains<'a>, StepError> {
        let invalid_depth = || StepError::InvalidDepth {
            pos: pos.clone(),
            depth,
        };
        if depth == 0 {
            return Err(invalid_depth());
        }
        let parent = doc
            .path(&pos.path)
            .filter(|node| !node.is_textblock() && !node.is_text())
            .ok_or_else(|| StepError::InvalidPos(pos.clone()))?;
        if pos.offset == 0 || pos.offset >= parent.child_count() {
            return Err(StepError::InvalidPos(pos.clone()));
        }

        let mut before = Vec::with_capacity(depth);
        let mut after = Vec::with_capacity(depth);
        let mut before_path = Vec::with_capacity(depth);
        let mut after_path = Vec::with_capacity(depth);
        let (mut a_path, mut b_path) = (pos.path.clone(), pos.path.clone());
        a_path.push(pos.offset - 1);
        b_path.push(pos.offset);
        let (mut a, mut b) = (
            parent.child(pos.offset - 1).ok_or_else(invalid_depth)?,
            parent.child(pos.offset).ok_or_else(invalid_depth)?,
        );
        for level in 0..depth {
            let contains = a.ty().contains();
            if contains.is_none() || contains != b.ty().contains() {
                return Err(StepError::CantJoin {
                    before: a.ty().name(),
                    after: b.ty().name(),
                });
            }
            before.push(a);
            after.push(b);
            before_path.push(a_path.clone());
            after_path.push(b_path.clone());
            if level + 1 < depth {
                if a.is_textblock() || b.is_textblock() {
                    return Err(invalid_depth());
                }
                let last = a.child_count().checked_sub(1).ok_or_else(invalid_depth)?;
                a = a.child(last).ok_or_else(invalid_depth)?;
                b = b.child(0).ok_or_else(invalid_depth)?;
                a_path.push(last);
                b_path.push(0);
            }
        }
        Ok(Chains {
            parent,
            pos: pos.clone(),
            before,
            after,
            before_path,
            after_path,
        })
    }

    fn depth(&self) -> usize {
        self.before.len()
    }

    /// Where the two innermost nodes meet once joined.
    fn joint(&self) -> Pos {
        let k = self.depth() - 1;
        Pos::new(self.before_path[k].clone(), self.before[k].size())
    }

    fn merge(&self) -> Result<Node, StepError> {
        let k = self.depth() - 1;
        let (a, b) = (self.before[k], self.after[k]);
        let mut content = a.cut(0, a.size());
        content.extend(b.cut(0, b.size()));
        let mut merged = close(a, content)?;
        for m in (0..k).rev() {
            let (a, b) = (self.before[m], self.after[m]);
            let mut content = a.cut(0, a.child_count() - 1);
            content.push(merged);
            content.extend(b.cut(1, b.child_count()));
            merged = close(a, content)?;
        }
        Ok(merged)
    }

    fn map(&self) -> PosMap {
        let k = self.depth() - 1;
        let joint = self.joint();
        let mut moved = vec![MovedRange {
            start: Pos::new(self.pos.path.clone(), self.pos.offset + 1),
            size: self.parent.child_count() - self.pos.offset - 1,
            dest: self.pos.clone(),
        }];
        for m in 0..=k {
            if m < k {
                moved.push(MovedRange {
                    start: Pos::new(self.after_path[m].clone(), 1),
                    size: self.after[m].child_count() - 1,
                    dest: Pos::new(self.before_path[m].clone(), self.before[m].child_count()),
                });
            } else {
                moved.push(MovedRange {
                    start: Pos::new(self.after_path[m].clone(), 0),
                    size: self.after[m].size(),
                    dest: joint.clone(),
                });
            }
        }
        PosMap::new(
            moved,
            vec![CollapsedRange {
                from: joint.clone(),
                to: Pos::new(self.after_path[k].clone(), 0),
                new_from: joint.clone(),
                new_to: joint,
            }],
        )
    }
}

fn join(doc: &Node, pos: &Pos, depth: usize) -> Result<StepResult, StepError> {
    let chains = Chains::resolve(doc, pos, depth)?;
    let merged = chains.merge()?;
    let parent = chains.parent;
    let mut content = parent.cut(0, pos.offset - 1);
    content.push(merged);
    content.extend(parent.cut(pos.offset + 1, parent.child_count()));
    let rebuilt = close(parent, content)?;
    let new_doc = doc
        .replace_at(&pos.path, rebuilt)
        .ok_or_else(|| StepError::InvalidPos(pos.clone()))?;
    Ok(StepResult {
        before: doc.clone(),
        doc: new_doc,
        map: chains.map(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Bias;
    use quire_model::{blockquote, doc, li, p, ul};

    #[test]
    fn test_join_paragraphs() {
        let t = doc![p!["ab"], "<a>", p!["cd"], p!["e"]];
        let step = Step::join(t.tag("a"), 1);
        let result = JoinKind.apply(&t.node, &step).unwrap();
        assert_eq!(result.doc, doc![p!["abcd"], p!["e"]].node);
        let map = &result.map;
        assert_eq!(map.map(&Pos::new(vec![1], 1), Bias::After).pos, Pos::new(vec![0], 3));
        assert_eq!(map.map(&Pos::new(vec![2], 1), Bias::After).pos, Pos::new(vec![1], 1));
        assert_eq!(map.map(&Pos::new(vec![0], 1), Bias::After).pos, Pos::new(vec![0], 1));
        assert!(map.map(&Pos::new(vec![], 1), Bias::After).deleted);
    }

    #[test]
    fn test_join_two_levels() {
        let t = doc![blockquote![p!["a"], p!["b"]], "<a>", blockquote![p!["c"], p!["d"]]];
        let step = Step::join(t.tag("a"), 2);
        let result = JoinKind.apply(&t.node, &step).unwrap();
        assert_eq!(result.doc, doc![blockquote![p!["a"], p!["bc"], p!["d"]]].node);
        assert_eq!(
            result.map.map(&Pos::new(vec![1, 1], 1), Bias::After).pos,
            Pos::new(vec![0, 2], 1)
        );
        assert_eq!(
            result.map.map(&Pos::new(vec![1, 0], 1), Bias::After).pos,
            Pos::new(vec![0, 1], 2)
        );
    }

    #[test]
    fn test_invert_is_split() {
        let t = doc![ul![li![p!["one"]], "<a>", li![p!["two"]]]];
        let step = Step::join(t.tag("a"), 2);
        let result = JoinKind.apply(&t.node, &step).unwrap();
        assert_eq!(result.doc, doc![ul![li![p!["onetwo"]]]].node);
        let inverted = JoinKind.invert(&step, &result).unwrap();
        let undone = crate::split::SplitKind.apply(&result.doc, &inverted).unwrap();
        assert_eq!(undone.doc, t.node);
    }

    #[test]
    fn test_rejects_incompatible_nodes() {
        let t = doc![p!["ab"], "<a>", ul![li![p!["cd"]]]];
        let step = Step::join(t.tag("a"), 1);
        assert!(matches!(
            JoinKind.apply(&t.node, &step),
            Err(StepError::CantJoin { .. })
        ));
    }

    #[test]
    fn test_rejects_edge_positions() {
        let t = doc!["<a>", p!["ab"]];
        let step = Step::join(t.tag("a"), 1);
        assert!(matches!(
            JoinKind.apply(&t.node, &step),
            Err(StepError::InvalidPos(_))
        ));
    }
}
