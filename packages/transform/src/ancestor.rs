//! Change the ancestry of a range of siblings: drop `depth` enclosing nodes
//! (each of which the range must cover entirely) and wrap the range in a
//! chain of new nodes. This one step kind covers lifting, wrapping, and
//! changing a block's wrapper type.

use crate::errors::StepError;
use crate::map::{CollapsedRange, MovedRange, PosMap};
use crate::replace::close;
use crate::step::{Step, StepKind, StepParam, StepResult};
use quire_model::{Markup, Node, Pos};

pub struct AncestorKind;

impl StepKind for AncestorKind {
    fn name(&self) -> &'static str {
        Step::ANCESTOR
    }

    fn apply(&self, doc: &Node, step: &Step) -> Result<StepResult, StepError> {
        let from = step.require_from()?;
        let to = step.require_to()?;
        match &step.param {
            StepParam::Ancestor { depth, wrappers } => {
                let plan = Plan::resolve(doc, from, to, *depth, wrappers)?;
                plan.apply(doc)
            }
            _ => Err(step.bad_param()),
        }
    }

    fn invert(&self, step: &Step, result: &StepResult) -> Result<Step, StepError> {
        let from = step.require_from()?;
        let to = step.require_to()?;
        let (depth, wrappers) = match &step.param {
            StepParam::Ancestor { depth, wrappers } => (*depth, wrappers),
            _ => return Err(step.bad_param()),
        };
        let plan = Plan::resolve(&result.before, from, to, depth, wrappers)?;
        let removed = result
            .before
            .path_nodes(&from.path)
            .ok_or_else(|| StepError::InvalidPos(from.clone()))?;
        let first_removed = from.depth() + 1 - depth;
        let markups = removed[first_removed..].iter().map(|node| node.markup()).collect();
        let base = plan.base();
        let end = base.with_offset(base.offset + plan.len());
        Ok(Step::ancestor(base, end, wrappers.len(), markups))
    }
}

struct Plan<'a> {
    from: &'a Pos,
    to: &'a Pos,
    wrappers: &'a [Markup],
    /// Path of the node that keeps its place and receives the result
    outer: Vec<usize>,
    /// Index range in `outer` that gets replaced
    start: usize,
    end: usize,
}

impl<'a> Plan<'a> {
    fn resolve(
        doc: &Node,
        from: &'a Pos,
        to: &'a Pos,
        depth: usize,
        wrappers: &'a [Markup],
    ) -> Result<Plan<'a>, StepError> {
        let not_siblings = || StepError::NotSiblings {
            from: from.clone(),
            to: to.clone(),
        };
        if from.path != to.path || from.offset >= to.offset {
            return Err(not_siblings());
        }
        if depth == 0 && wrappers.is_empty() {
            return Err(StepError::InvalidDepth {
                pos: from.clone(),
                depth,
            });
        }
        let inner = doc
            .path(&from.path)
            .filter(|node| !node.is_textblock() && !node.is_text())
            .ok_or_else(|| StepError::InvalidPos(from.clone()))?;
        if to.offset > inner.child_count() {
            return Err(StepError::InvalidPos(to.clone()));
        }

        let mut outer = from.path.clone();
        let (mut start, mut end) = (from.offset, to.offset);
        for _ in 0..depth {
            let node = doc.path(&outer).ok_or_else(|| StepError::InvalidPos(from.clone()))?;
            if start > 0 || end < node.child_count() {
                return Err(not_siblings());
            }
            start = outer.pop().ok_or_else(|| StepError::InvalidDepth {
                pos: from.clone(),
                depth,
            })?;
            end = start + 1;
        }
        Ok(Plan {
            from,
            to,
            wrappers,
            outer,
            start,
            end,
        })
    }

    fn len(&self) -> usize {
        self.to.offset - self.from.offset
    }

    /// Position of the range's start in the new document.
    fn base(&self) -> Pos {
        if self.wrappers.is_empty() {
            Pos::new(self.outer.clone(), self.start)
        } else {
            let mut path = self.outer.clone();
            path.push(self.start);
            path.extend(std::iter::repeat(0).take(self.wrappers.len() - 1));
            Pos::new(path, 0)
        }
    }

    /// Number of nodes that end up in `outer` in place of the replaced ones.
    fn inserted(&self) -> usize {
        if self.wrappers.is_empty() {
            self.len()
        } else {
            1
        }
    }

    fn apply(&self, doc: &Node) -> Result<StepResult, StepError> {
        let invalid = || StepError::InvalidPos(self.from.clone());
        let inner = doc.path(&self.from.path).ok_or_else(invalid)?;
        let parent = doc.path(&self.outer).ok_or_else(invalid)?;

        let mut replacement = inner.cut(self.from.offset, self.to.offset);
        for wrapper in self.wrappers.iter().rev() {
            replacement = vec![close(&wrapper.create(vec![]), replacement)?];
        }
        let mut content = parent.cut(0, self.start);
        content.extend(replacement);
        content.extend(parent.cut(self.end, parent.child_count()));
        let rebuilt = close(parent, content)?;
        let new_doc = doc.replace_at(&self.outer, rebuilt).ok_or_else(invalid)?;

        let base = self.base();
        let base_end = base.with_offset(base.offset + self.len());
        let outer_start = Pos::new(self.outer.clone(), self.start);
        let outer_end = Pos::new(self.outer.clone(), self.end);
        let after = Pos::new(self.outer.clone(), self.start + self.inserted());
        let map = PosMap::new(
            vec![
                MovedRange {
                    start: self.from.clone(),
                    size: self.len(),
                    dest: base.clone(),
                },
                MovedRange {
                    start: outer_end.clone(),
                    size: parent.child_count() - self.end,
                    dest: after.clone(),
                },
            ],
            vec![
                CollapsedRange {
                    from: outer_start.clone(),
                    to: self.from.clone(),
                    new_from: outer_start,
                    new_to: base,
                },
                CollapsedRange {
                    from: self.to.clone(),
                    to: outer_end,
                    new_from: base_end,
                    new_to: after,
                },
            ],
        );
        Ok(StepResult {
            before: doc.clone(),
            doc: new_doc,
            map,
        })
    }
}
