//! # Document nodes
//!
//! Immutable tree values. Children sit behind an `Arc`, so an edit copies
//! the spine from the root down to the edited node and shares every other
//! subtree with the snapshot it came from.
//!
//! ## Schema
//!
//! ```text
//! doc            contains block
//! paragraph      block      contains inline   (textblock)
//! heading        block      contains inline   (textblock)
//! blockquote     block      contains block
//! bullet_list    block      contains list_item
//! ordered_list   block      contains list_item
//! list_item      list_item  contains block
//! horizontal_rule block     (leaf)
//! text           inline     (leaf, text + styles)
//! ```

use crate::inline;
use crate::style::{normalize_styles, Style};
use crate::{ModelError, Pos};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub type Attrs = BTreeMap<String, String>;

/// Content group a node belongs to, and that container nodes accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Block,
    Inline,
    ListItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Doc,
    Paragraph,
    Heading,
    Blockquote,
    BulletList,
    OrderedList,
    ListItem,
    HorizontalRule,
    Text,
}

impl NodeType {
    /// The group this type belongs to. `Doc` belongs to none.
    pub fn group(self) -> Option<Group> {
        match self {
            NodeType::Doc => None,
            NodeType::Paragraph
            | NodeType::Heading
            | NodeType::Blockquote
            | NodeType::BulletList
            | NodeType::OrderedList
            | NodeType::HorizontalRule => Some(Group::Block),
            NodeType::ListItem => Some(Group::ListItem),
            NodeType::Text => Some(Group::Inline),
        }
    }

    /// The group this type accepts as children. Leaves accept none.
    pub fn contains(self) -> Option<Group> {
        match self {
            NodeType::Doc | NodeType::Blockquote | NodeType::ListItem => Some(Group::Block),
            NodeType::Paragraph | NodeType::Heading => Some(Group::Inline),
            NodeType::BulletList | NodeType::OrderedList => Some(Group::ListItem),
            NodeType::HorizontalRule | NodeType::Text => None,
        }
    }

    pub fn is_textblock(self) -> bool {
        self.contains() == Some(Group::Inline)
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeType::Doc => "doc",
            NodeType::Paragraph => "paragraph",
            NodeType::Heading => "heading",
            NodeType::Blockquote => "blockquote",
            NodeType::BulletList => "bullet_list",
            NodeType::OrderedList => "ordered_list",
            NodeType::ListItem => "list_item",
            NodeType::HorizontalRule => "horizontal_rule",
            NodeType::Text => "text",
        }
    }

    /// Whether a node of this type may hold `child`.
    pub fn accepts(self, child: NodeType) -> bool {
        self.contains().is_some() && self.contains() == child.group()
    }
}

/// A node's type and attributes, without content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Markup {
    #[serde(rename = "type")]
    pub ty: NodeType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: Attrs,
}

impl Markup {
    pub fn new(ty: NodeType) -> Self {
        Self {
            ty,
            attrs: Attrs::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Create a node with this markup.
    pub fn create(&self, content: Vec<Node>) -> Node {
        Node::new(self.ty, self.attrs.clone(), content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "type")]
    ty: NodeType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attrs: Attrs,
    #[serde(default, skip_serializing_if = "no_content")]
    content: Arc<Vec<Node>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    styles: Vec<Style>,
}

fn no_content(content: &Arc<Vec<Node>>) -> bool {
    content.is_empty()
}

impl Node {
    pub fn new(ty: NodeType, attrs: Attrs, content: Vec<Node>) -> Self {
        let content = if ty.is_textblock() {
            inline::normalize(content)
        } else {
            content
        };
        Self {
            ty,
            attrs,
            content: Arc::new(content),
            text: String::new(),
            styles: Vec::new(),
        }
    }

    pub fn new_text(text: impl Into<String>, styles: Vec<Style>) -> Self {
        Self {
            ty: NodeType::Text,
            attrs: Attrs::new(),
            content: Arc::default(),
            text: text.into(),
            styles: normalize_styles(styles),
        }
    }

    pub fn ty(&self) -> NodeType {
        self.ty
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn content(&self) -> &[Node] {
        &self.content
    }

    /// Text payload. Empty for anything but text nodes.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn styles(&self) -> &[Style] {
        &self.styles
    }

    pub fn markup(&self) -> Markup {
        Markup {
            ty: self.ty,
            attrs: self.attrs.clone(),
        }
    }

    /// Type and attributes match.
    pub fn same_markup(&self, other: &Node) -> bool {
        self.ty == other.ty && self.attrs == other.attrs
    }

    pub fn is_text(&self) -> bool {
        self.ty == NodeType::Text
    }

    pub fn is_textblock(&self) -> bool {
        self.ty.is_textblock()
    }

    pub fn child_count(&self) -> usize {
        self.content.len()
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.content.get(index)
    }

    /// Character count for text and textblocks, child count otherwise.
    pub fn size(&self) -> usize {
        if self.is_text() {
            self.text.chars().count()
        } else if self.is_textblock() {
            self.content.iter().map(Node::size).sum()
        } else {
            self.content.len()
        }
    }

    /// The concatenated text of every text node below this one.
    pub fn text_content(&self) -> String {
        if self.is_text() {
            return self.text.clone();
        }
        self.content.iter().map(Node::text_content).collect()
    }

    /// The node at `path`, if the path is valid.
    pub fn path(&self, path: &[usize]) -> Option<&Node> {
        let mut node = self;
        for &index in path {
            if node.is_textblock() {
                return None;
            }
            node = node.content.get(index)?;
        }
        Some(node)
    }

    /// Every node from this one down to the one at `path`, inclusive.
    pub fn path_nodes(&self, path: &[usize]) -> Option<Vec<&Node>> {
        let mut nodes = Vec::with_capacity(path.len() + 1);
        let mut node = self;
        nodes.push(node);
        for &index in path {
            if node.is_textblock() {
                return None;
            }
            node = node.content.get(index)?;
            nodes.push(node);
        }
        Some(nodes)
    }

    /// Whether `pos` addresses a point in this tree.
    pub fn is_valid_pos(&self, pos: &Pos) -> bool {
        match self.path(&pos.path) {
            Some(node) => !node.is_text() && pos.offset <= node.size(),
            None => false,
        }
    }

    /// A node with the same markup and new content.
    pub fn copy(&self, content: Vec<Node>) -> Node {
        Node::new(self.ty, self.attrs.clone(), content)
    }

    /// Content between two offsets of this node, cutting text where needed.
    pub fn cut(&self, from: usize, to: usize) -> Vec<Node> {
        if self.is_textblock() {
            inline::cut(&self.content, from, to)
        } else {
            let to = to.min(self.content.len());
            let from = from.min(to);
            self.content[from..to].to_vec()
        }
    }

    /// Replace the child at `index`.
    pub fn replace_child(&self, index: usize, child: Node) -> Node {
        let mut content = (*self.content).clone();
        content[index] = child;
        self.copy(content)
    }

    /// Replace the node at `path` with `replacement`, copying the spine.
    pub fn replace_at(&self, path: &[usize], replacement: Node) -> Option<Node> {
        match path.split_first() {
            None => Some(replacement),
            Some((&index, rest)) => {
                let child = self.content.get(index)?;
                let updated = child.replace_at(rest, replacement)?;
                Some(self.replace_child(index, updated))
            }
        }
    }

    /// Whether this node's children satisfy the schema, recursively.
    pub fn check(&self) -> Result<(), ModelError> {
        if self.is_text() {
            return if self.content.is_empty() {
                Ok(())
            } else {
                Err(ModelError::InvalidContent {
                    parent: self.ty.name(),
                    child: "node",
                })
            };
        }
        for child in self.content.iter() {
            if !self.ty.accepts(child.ty) {
                return Err(ModelError::InvalidContent {
                    parent: self.ty.name(),
                    child: child.ty.name(),
                });
            }
            child.check()?;
        }
        Ok(())
    }

    /// Parse a document from JSON and check it against the schema.
    pub fn from_json(json: &str) -> Result<Node, ModelError> {
        let node: Node = serde_json::from_str(json)?;
        node.check()?;
        Ok(node)
    }

    /// Cut the range between two positions out of this tree.
    ///
    /// The slice's open depths record how many ancestors of each end were
    /// only partially covered.
    pub fn slice(&self, from: &Pos, to: &Pos) -> Option<Slice> {
        if from > to || !self.is_valid_pos(from) || !self.is_valid_pos(to) {
            return None;
        }
        let shared = Pos::common_depth(from, to);
        let parent = self.path(&from.path[..shared])?;
        let content = if shared == from.depth() && shared == to.depth() {
            parent.cut(from.offset, to.offset)
        } else {
            let start = from.index(shared);
            let end = to.index(shared);
            let mut content = Vec::new();
            if shared < from.depth() {
                content.push(self.slice_side(&from.path[..=shared], from, Side::After)?);
            }
            let inner_start = if shared < from.depth() { start + 1 } else { start };
            if inner_start < end {
                content.extend(parent.cut(inner_start, end));
            }
            if shared < to.depth() {
                content.push(self.slice_side(&to.path[..=shared], to, Side::Before)?);
            }
            content
        };
        Some(Slice {
            content,
            open_start: from.depth() - shared,
            open_end: to.depth() - shared,
        })
    }

    /// The part of the node at `path` after (or before) `pos`, which lies
    /// inside it.
    fn slice_side(&self, path: &[usize], pos: &Pos, side: Side) -> Option<Node> {
        let node = self.path(path)?;
        let depth = path.len();
        let content = if depth == pos.depth() {
            match side {
                Side::After => node.cut(pos.offset, node.size()),
                Side::Before => node.cut(0, pos.offset),
            }
        } else {
            let index = pos.path[depth];
            let mut child_path = path.to_vec();
            child_path.push(index);
            let inner = self.slice_side(&child_path, pos, side)?;
            let mut content = Vec::new();
            match side {
                Side::After => {
                    content.push(inner);
                    content.extend(node.cut(index + 1, node.child_count()));
                }
                Side::Before => {
                    content.extend(node.cut(0, index));
                    content.push(inner);
                }
            }
            content
        };
        Some(node.copy(content))
    }
}

#[derive(Clone, Copy)]
enum Side {
    Before,
    After,
}

/// A piece of document cut out between two positions.
///
/// `open_start`/`open_end` count how many levels of nodes along each edge
/// were cut through, and so should be joined with the surrounding content
/// when the slice is inserted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Slice {
    pub content: Vec<Node>,
    #[serde(default)]
    pub open_start: usize,
    #[serde(default)]
    pub open_end: usize,
}

impl Slice {
    pub fn new(content: Vec<Node>, open_start: usize, open_end: usize) -> Self {
        Self {
            content,
            open_start,
            open_end,
        }
    }

    /// A closed slice holding `content`.
    pub fn closed(content: Vec<Node>) -> Self {
        Self::new(content, 0, 0)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_text() {
            let mut text = format!("{:?}", self.text);
            for style in self.styles.iter().rev() {
                text = format!("{}({})", style.name(), text);
            }
            return f.write_str(&text);
        }
        let name = match self.ty {
            NodeType::Paragraph => "p",
            NodeType::Heading => "h",
            NodeType::BulletList => "ul",
            NodeType::OrderedList => "ol",
            NodeType::ListItem => "li",
            NodeType::HorizontalRule => "hr",
            other => other.name(),
        };
        write!(f, "{}(", name)?;
        for (i, child) in self.content.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", child)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{blockquote, doc, em, li, p, ul};

    #[test]
    fn test_size_and_path() {
        let t = doc![p!["hello"], blockquote![p!["a"], p!["bc"]]];
        assert_eq!(t.node.size(), 2);
        assert_eq!(t.node.path(&[0]).map(Node::size), Some(5));
        assert_eq!(t.node.path(&[1, 1]).map(Node::text_content), Some("bc".to_string()));
        assert!(t.node.path(&[0, 0]).is_none());
        assert!(t.node.path(&[4]).is_none());
    }

    #[test]
    fn test_textblocks_glue_equal_styles() {
        let t = doc![p!["a", "b", em!["c"], em!["d"]]];
        let para = t.node.child(0).unwrap();
        assert_eq!(para.child_count(), 2);
        assert_eq!(para.to_string(), "p(\"ab\", em(\"cd\"))");
    }

    #[test]
    fn test_replace_at_shares_untouched_children() {
        let t = doc![p!["one"], p!["two"]];
        let updated = t.node.replace_at(&[1], p!["three"].node).unwrap();
        assert!(Arc::ptr_eq(
            &updated.child(0).unwrap().content,
            &t.node.child(0).unwrap().content
        ));
        assert_eq!(updated.child(0), t.node.child(0));
        assert_eq!(updated.text_content(), "onethree");
        assert_eq!(t.node.text_content(), "onetwo");
    }

    #[test]
    fn test_slice_within_textblock() {
        let t = doc![p!["hello"]];
        let slice = t.node.slice(&Pos::new(vec![0], 1), &Pos::new(vec![0], 3)).unwrap();
        assert_eq!(slice.open_start, 0);
        assert_eq!(slice.open_end, 0);
        assert_eq!(slice.content, vec![Node::new_text("el", vec![])]);
    }

    #[test]
    fn test_empty_slice_inside_text_is_empty() {
        let t = doc![p!["hello"]];
        let at = Pos::new(vec![0], 2);
        let slice = t.node.slice(&at, &at).unwrap();
        assert!(slice.is_empty());
        assert!(slice.content.is_empty());
    }

    #[test]
    fn test_slice_across_blocks_is_open() {
        let t = doc![p!["one"], p!["two"], ul![li![p!["three"]]]];
        let slice = t
            .node
            .slice(&Pos::new(vec![0], 1), &Pos::new(vec![2, 0, 0], 2))
            .unwrap();
        assert_eq!(slice.open_start, 1);
        assert_eq!(slice.open_end, 3);
        let rendered: Vec<String> = slice.content.iter().map(|n| n.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["p(\"ne\")", "p(\"two\")", "ul(li(p(\"th\")))"]
        );
    }

    #[test]
    fn test_check_rejects_bad_nesting() {
        let bad = Node::new(
            NodeType::Doc,
            Attrs::new(),
            vec![Node::new(NodeType::ListItem, Attrs::new(), vec![])],
        );
        assert!(matches!(bad.check(), Err(ModelError::InvalidContent { .. })));
    }

    #[test]
    fn test_json_roundtrip_keeps_structure() {
        let t = doc![p!["a", em!["b"]], blockquote![p!["c"]]];
        let json = serde_json::to_string(&t.node).unwrap();
        let back = Node::from_json(&json).unwrap();
        assert_eq!(back, t.node);
    }
}
