//! # Transform
//!
//! An ordered list of applied steps, with the document after every step and
//! the position map of every step. Steps that don't apply are rejected and
//! leave the transform unchanged.
//!
//! The helper methods (`insert_text`, `delete`, `wrap`, `lift`, ...) turn an
//! editing gesture into one or more steps and return `&mut Self`, so
//! gestures chain.

use crate::errors::StepError;
use crate::map::{Bias, MapResult, PosMap};
use crate::step::{Step, StepRegistry, StepResult};
use quire_model::{reduce_left, reduce_right, Group, Markup, Node, NodeType, Pos, Slice, Style};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct Transform {
    registry: Arc<StepRegistry>,
    before: Node,
    steps: Vec<Step>,
    docs: Vec<Node>,
    maps: Vec<PosMap>,
}

impl Transform {
    pub fn new(registry: Arc<StepRegistry>, doc: Node) -> Self {
        Self {
            registry,
            before: doc,
            steps: Vec::new(),
            docs: Vec::new(),
            maps: Vec::new(),
        }
    }

    /// Replay `steps` on `doc`, failing on the first one that doesn't apply.
    pub fn from_steps(
        registry: Arc<StepRegistry>,
        doc: Node,
        steps: impl IntoIterator<Item = Step>,
    ) -> Result<Self, StepError> {
        let mut transform = Self::new(registry, doc);
        for step in steps {
            transform.try_step(step)?;
        }
        Ok(transform)
    }

    pub fn registry(&self) -> &Arc<StepRegistry> {
        &self.registry
    }

    /// The document the transform started from.
    pub fn before(&self) -> &Node {
        &self.before
    }

    /// The current document.
    pub fn doc(&self) -> &Node {
        self.docs.last().unwrap_or(&self.before)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Document after each step.
    pub fn docs(&self) -> &[Node] {
        &self.docs
    }

    pub fn maps(&self) -> &[PosMap] {
        &self.maps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Document that step `index` was applied to. `index == len()` gives the
    /// current document; anything past that is `None`.
    pub fn doc_before(&self, index: usize) -> Option<&Node> {
        match index.checked_sub(1) {
            Some(prev) => self.docs.get(prev),
            None => Some(&self.before),
        }
    }

    /// Apply `step` to the current document. Returns whether it applied.
    pub fn step(&mut self, step: Step) -> bool {
        match self.registry.apply(self.doc(), &step) {
            Some(result) => {
                self.push_result(step, result);
                true
            }
            None => false,
        }
    }

    /// Apply `step`, reporting why it didn't fit.
    pub fn try_step(&mut self, step: Step) -> Result<(), StepError> {
        let result = self.registry.get(&step.name)?.apply(self.doc(), &step)?;
        self.push_result(step, result);
        Ok(())
    }

    fn push_result(&mut self, step: Step, result: StepResult) {
        self.steps.push(step);
        self.docs.push(result.doc);
        self.maps.push(result.map);
    }

    /// Append a step that was already applied elsewhere, with its outcome.
    pub fn push_applied(&mut self, step: Step, doc: Node, map: PosMap) {
        self.steps.push(step);
        self.docs.push(doc);
        self.maps.push(map);
    }

    /// The transform made of every step after the first `count`.
    pub fn drop_front(&self, count: usize) -> Transform {
        let count = count.min(self.len());
        Transform {
            registry: self.registry.clone(),
            before: self.doc_before(count).unwrap_or_else(|| self.doc()).clone(),
            steps: self.steps[count..].to_vec(),
            docs: self.docs[count..].to_vec(),
            maps: self.maps[count..].to_vec(),
        }
    }

    /// A step that undoes step `index`, valid against the document right
    /// after it.
    pub fn invert_step(&self, index: usize) -> Option<Step> {
        let step = self.steps.get(index)?;
        let result = StepResult {
            before: self.doc_before(index)?.clone(),
            doc: self.docs.get(index)?.clone(),
            map: self.maps.get(index)?.clone(),
        };
        self.registry.invert(step, &result)
    }

    /// Map a position from the starting document through every step.
    pub fn map(&self, pos: &Pos, bias: Bias) -> MapResult {
        self.map_from(0, pos, bias)
    }

    /// Map a position from the document before step `start` to the current
    /// one.
    pub fn map_from(&self, start: usize, pos: &Pos, bias: Bias) -> MapResult {
        let mut deleted = false;
        let mut pos = pos.clone();
        for map in self.maps.iter().skip(start) {
            let result = map.map(&pos, bias);
            deleted |= result.deleted;
            pos = result.pos;
        }
        MapResult {
            pos,
            deleted,
            recover: None,
        }
    }

    pub fn insert(&mut self, pos: &Pos, nodes: Vec<Node>) -> &mut Self {
        if !nodes.is_empty() {
            self.step(Step::replace(pos.clone(), pos.clone(), Slice::closed(nodes)));
        }
        self
    }

    pub fn insert_text(&mut self, pos: &Pos, text: &str) -> &mut Self {
        self.insert_styled_text(pos, text, Vec::new())
    }

    pub fn insert_styled_text(&mut self, pos: &Pos, text: &str, styles: Vec<Style>) -> &mut Self {
        if text.is_empty() {
            return self;
        }
        self.insert(pos, vec![Node::new_text(text, styles)])
    }

    /// Delete the range `from..to`. Ends that sit at the edge of whole nodes
    /// are widened so those nodes go away entirely.
    pub fn delete(&mut self, from: &Pos, to: &Pos) -> &mut Self {
        if from == to {
            return self;
        }
        let (start, end) = {
            let wide_start = reduce_right(self.doc(), from);
            let wide_end = reduce_left(to);
            if wide_start.depth() == wide_end.depth() && wide_start < wide_end {
                (wide_start, wide_end)
            } else {
                (from.clone(), to.clone())
            }
        };
        self.step(Step::replace(start, end, Slice::empty()));
        self
    }

    pub fn replace(&mut self, from: &Pos, to: &Pos, slice: Slice) -> &mut Self {
        self.step(Step::replace(from.clone(), to.clone(), slice));
        self
    }

    /// Split the node containing `pos` and `depth - 1` of its ancestors.
    pub fn split(&mut self, pos: &Pos, depth: usize) -> &mut Self {
        self.step(Step::split(pos.clone(), depth, Vec::new()));
        self
    }

    /// Join the blocks on both sides of the block position `pos`.
    pub fn join(&mut self, pos: &Pos) -> &mut Self {
        self.step(Step::join(pos.clone(), 1));
        self
    }

    pub fn add_style(&mut self, from: &Pos, to: &Pos, style: Style) -> &mut Self {
        let (_, all) = crate::style::range_coverage(self.doc(), from, to, &|styles| {
            styles.contains(&style)
        });
        if from < to && !all {
            self.step(Step::add_style(from.clone(), to.clone(), style));
        }
        self
    }

    pub fn remove_style(&mut self, from: &Pos, to: &Pos, style: Style) -> &mut Self {
        let (any, _) = crate::style::range_coverage(self.doc(), from, to, &|styles| {
            quire_model::has_style_kind(styles, &style)
        });
        if from < to && any {
            self.step(Step::remove_style(from.clone(), to.clone(), style));
        }
        self
    }

    /// Wrap the blocks touched by `from..to` in a node of `markup`, adding
    /// list items where the schema needs them.
    pub fn wrap(&mut self, from: &Pos, to: &Pos, markup: Markup) -> &mut Self {
        let Some((path, start, end)) = selected_siblings(self.doc(), from, to) else {
            return self;
        };
        let plan = self.doc().path(&path).and_then(|parent| {
            let first = parent.child(start)?;
            let around = connect(parent.ty(), markup.ty)?;
            let inside = connect(markup.ty, first.ty())?;
            Some((around, inside))
        });
        let Some((around, inside)) = plan else {
            tracing::debug!("[Transform] Can't wrap {}..{} in {}", from, to, markup.ty.name());
            return self;
        };

        let mut wrappers = around.clone();
        wrappers.push(markup);
        wrappers.extend(inside.iter().cloned());
        let range_start = Pos::new(path.clone(), start);
        let range_end = Pos::new(path.clone(), end);
        if !self.step(Step::ancestor(range_start, range_end, 0, wrappers)) {
            return self;
        }

        if !inside.is_empty() {
            // one item per wrapped block
            let mut item = path;
            item.push(start);
            item.extend(std::iter::repeat(0).take(around.len() + 1));
            for index in (1..end - start).rev() {
                self.step(Step::split(Pos::new(item.clone(), index), 1, Vec::new()));
            }
        }
        self
    }

    /// Lift the blocks touched by `from..to` out of their nearest ancestor
    /// that can hold them one level up, splitting that ancestor around them.
    pub fn lift(&mut self, from: &Pos, to: &Pos) -> &mut Self {
        let Some((path, start, end)) = selected_siblings(self.doc(), from, to) else {
            return self;
        };
        let Some(depth) = lift_depth(self.doc(), &path) else {
            tracing::debug!("[Transform] Nothing to lift {}..{} out of", from, to);
            return self;
        };

        let mut pos = Pos::new(path.clone(), end);
        for d in 0..depth {
            let size = self.doc().path(&pos.path).map(Node::size).unwrap_or(0);
            if pos.offset < size {
                self.split(&pos, depth - d);
                break;
            }
            pos = pos.shorten(pos.depth() - 1, 1);
        }

        let mut range = (path.clone(), start, end);
        let mut pos = Pos::new(path.clone(), start);
        for d in 0..depth {
            if pos.offset > 0 {
                self.split(&pos, depth - d);
                let cut = path.len() - depth;
                let mut moved = pos.path[..cut].to_vec();
                moved.push(pos.path[cut] + 1);
                moved.resize(path.len(), 0);
                range = (moved, 0, end - start);
                break;
            }
            pos = pos.shorten(pos.depth() - 1, 0);
        }

        let (path, start, end) = range;
        self.step(Step::ancestor(
            Pos::new(path.clone(), start),
            Pos::new(path, end),
            depth,
            Vec::new(),
        ));
        self
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("steps", &self.steps)
            .field("doc", &self.doc().to_string())
            .finish()
    }
}

/// The sibling range covering `from..to`: the path of the shared parent and
/// the start and end index in it. A range inside one textblock selects that
/// textblock.
pub fn selected_siblings(doc: &Node, from: &Pos, to: &Pos) -> Option<(Vec<usize>, usize, usize)> {
    let mut node = doc;
    let mut depth: usize = 0;
    loop {
        if node.is_textblock() {
            let parent = depth.checked_sub(1)?;
            let index = from.path[parent];
            return Some((from.path[..parent].to_vec(), index, index + 1));
        }
        let from_end = depth == from.depth();
        let to_end = depth == to.depth();
        let left = from.index(depth);
        let right = to.index(depth);
        if from_end || to_end || left != right {
            let end = if to_end { right } else { right + 1 };
            return Some((from.path[..depth].to_vec(), left, end));
        }
        node = node.child(left)?;
        depth += 1;
    }
}

/// Wrapper nodes needed between a node of type `outer` and a child of type
/// `inner`.
fn connect(outer: NodeType, inner: NodeType) -> Option<Vec<Markup>> {
    if outer.accepts(inner) {
        Some(Vec::new())
    } else if outer.contains() == Some(Group::ListItem) && NodeType::ListItem.accepts(inner) {
        Some(vec![Markup::new(NodeType::ListItem)])
    } else {
        None
    }
}

/// How many levels up the children of the node at `path` can be moved: the
/// distance to the nearest ancestor accepting the same content.
fn lift_depth(doc: &Node, path: &[usize]) -> Option<usize> {
    let contains = doc.path(path)?.ty().contains()?;
    (0..path.len())
        .rev()
        .find(|&depth| {
            doc.path(&path[..depth])
                .and_then(|node| node.ty().contains())
                == Some(contains)
        })
        .map(|depth| path.len() - depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_model::{blockquote, doc, em, li, p, strong, ul};

    fn transform(doc: &Node) -> Transform {
        Transform::new(Arc::new(StepRegistry::standard()), doc.clone())
    }

    #[test]
    fn test_insert_text_and_map() {
        let t = doc![p!["he<a>llo"]];
        let mut tr = transform(&t.node);
        tr.insert_text(&t.tag("a"), "XY");
        assert_eq!(tr.doc(), &doc![p!["heXYllo"]].node);
        assert_eq!(tr.len(), 1);
        assert_eq!(tr.map(&Pos::new(vec![0], 4), Bias::After).pos, Pos::new(vec![0], 6));
        assert_eq!(tr.before(), &t.node);
    }

    #[test]
    fn test_rejected_step_leaves_transform_unchanged() {
        let t = doc![p!["hello"]];
        let mut tr = transform(&t.node);
        assert!(!tr.step(Step::replace(Pos::new(vec![3], 0), Pos::new(vec![3], 0), Slice::empty())));
        assert!(tr.is_empty());
        assert_eq!(tr.doc(), &t.node);
    }

    #[test]
    fn test_delete_whole_paragraph_removes_it() {
        let t = doc![p!["one"], p!["<a>two"], p!["three"]];
        let mut tr = transform(&t.node);
        tr.delete(&t.tag("a"), &Pos::new(vec![2], 0));
        assert_eq!(tr.doc(), &doc![p!["one"], p!["three"]].node);
    }

    #[test]
    fn test_delete_within_text() {
        let t = doc![p!["o<a>ne"], p!["tw<b>o"]];
        let mut tr = transform(&t.node);
        tr.delete(&t.tag("a"), &t.tag("b"));
        assert_eq!(tr.doc(), &doc![p!["oo"]].node);
    }

    #[test]
    fn test_wrap_in_list_creates_item_per_block() {
        let t = doc![p!["<a>one"], p!["tw<b>o"]];
        let mut tr = transform(&t.node);
        tr.wrap(&t.tag("a"), &t.tag("b"), Markup::new(NodeType::BulletList));
        assert_eq!(tr.doc(), &doc![ul![li![p!["one"]], li![p!["two"]]]].node);
    }

    #[test]
    fn test_wrap_single_paragraph_in_blockquote() {
        let t = doc![p!["x"], p!["o<a>ne"]];
        let mut tr = transform(&t.node);
        tr.wrap(&t.tag("a"), &t.tag("a"), Markup::new(NodeType::Blockquote));
        assert_eq!(tr.doc(), &doc![p!["x"], blockquote![p!["one"]]].node);
    }

    #[test]
    fn test_lift_from_list() {
        let t = doc![ul![li![p!["a"]], li![p!["<a>b"]]]];
        let mut tr = transform(&t.node);
        tr.lift(&t.tag("a"), &t.tag("a"));
        assert_eq!(tr.doc(), &doc![ul![li![p!["a"]]], p!["b"]].node);
    }

    #[test]
    fn test_lift_from_middle_of_blockquote() {
        let t = doc![blockquote![p!["a"], p!["<a>b"], p!["c"]]];
        let mut tr = transform(&t.node);
        tr.lift(&t.tag("a"), &t.tag("a"));
        assert_eq!(
            tr.doc(),
            &doc![blockquote![p!["a"]], p!["b"], blockquote![p!["c"]]].node
        );
    }

    #[test]
    fn test_style_helpers_skip_noops() {
        let t = doc![p!["<a>a", strong!["bc"], "<b>"]];
        let mut tr = transform(&t.node);
        tr.remove_style(&t.tag("a"), &t.tag("b"), Style::Em);
        assert!(tr.is_empty());
        tr.add_style(&t.tag("a"), &t.tag("b"), Style::Em);
        assert_eq!(tr.doc(), &doc![p![em!["a"], em![strong!["bc"]]]].node);
        tr.add_style(&t.tag("a"), &t.tag("b"), Style::Em);
        assert_eq!(tr.len(), 1);
    }

    #[test]
    fn test_invert_steps_in_reverse_restores_start() {
        let t = doc![p!["on<a>e"], p!["two"]];
        let mut tr = transform(&t.node);
        tr.insert_text(&t.tag("a"), "!!")
            .split(&Pos::new(vec![0], 1), 1)
            .join(&Pos::new(vec![], 2));
        assert_eq!(tr.len(), 3);
        let mut undo = transform(tr.doc());
        for index in (0..tr.len()).rev() {
            let inverted = tr.invert_step(index).unwrap();
            assert!(undo.step(inverted));
        }
        assert_eq!(undo.doc(), &t.node);
    }

    #[test]
    fn test_out_of_range_index_is_none() {
        let t = doc![p!["<a>"]];
        let mut tr = transform(&t.node);
        tr.insert_text(&t.tag("a"), "a");
        assert!(tr.invert_step(1).is_none());
        assert!(tr.invert_step(5).is_none());
        assert_eq!(tr.doc_before(0), Some(&t.node));
        assert_eq!(tr.doc_before(1), Some(tr.doc()));
        assert!(tr.doc_before(2).is_none());
    }

    #[test]
    fn test_drop_front_keeps_later_steps() {
        let t = doc![p!["<a>"]];
        let mut tr = transform(&t.node);
        tr.insert_text(&t.tag("a"), "a");
        tr.insert_text(&Pos::new(vec![0], 1), "b");
        let rest = tr.drop_front(1);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest.before(), &doc![p!["a"]].node);
        assert_eq!(rest.doc(), tr.doc());
    }

    #[test]
    fn test_selected_siblings() {
        let t = doc![blockquote![p!["a<a>b"], p!["c"], p!["d<b>"]]];
        assert_eq!(
            selected_siblings(&t.node, &t.tag("a"), &t.tag("b")),
            Some((vec![0], 0, 3))
        );
        assert_eq!(
            selected_siblings(&t.node, &t.tag("a"), &t.tag("a")),
            Some((vec![0], 0, 1))
        );
    }
}
