//! # Document builders for tests
//!
//! Small macros that build documents and collect tagged positions:
//!
//! ```rust,ignore
//! let t = doc![p!["h<1>ell<2>o"], "<3>", blockquote![p!["x"]]];
//! assert_eq!(t.tag("1"), Pos::new(vec![0], 1));
//! assert_eq!(t.tag("3"), Pos::new(vec![], 1));
//! ```
//!
//! A `<name>` marker inside text marks a character offset. A string made only
//! of markers between block children marks a child index.

use crate::{Markup, Node, NodeType, Pos, Style};
use std::collections::HashMap;

/// A built node plus the positions of its tags, relative to the node.
#[derive(Debug, Clone)]
pub struct Tagged {
    pub node: Node,
    pub tags: HashMap<String, Pos>,
}

impl Tagged {
    /// Position of tag `name`. Panics when the tag is missing.
    pub fn tag(&self, name: &str) -> Pos {
        self.tags
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("no tag <{}> in {}", name, self.node))
    }
}

#[derive(Debug, Clone)]
pub struct Run {
    text: String,
    styles: Vec<Style>,
}

/// A builder argument: styled text runs or a finished child node.
#[derive(Debug, Clone)]
pub enum Child {
    Inline(Vec<Run>),
    Node(Tagged),
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Inline(vec![Run {
            text: text.to_string(),
            styles: Vec::new(),
        }])
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::from(text.as_str())
    }
}

impl From<Tagged> for Child {
    fn from(tagged: Tagged) -> Self {
        Child::Node(tagged)
    }
}

/// Add `style` to every run in `children`.
pub fn styled(style: Style, children: Vec<Child>) -> Child {
    let mut runs = Vec::new();
    for child in children {
        match child {
            Child::Inline(inner) => runs.extend(inner.into_iter().map(|mut run| {
                run.styles.push(style.clone());
                run
            })),
            Child::Node(tagged) => panic!("styles only wrap text, got {}", tagged.node),
        }
    }
    Child::Inline(runs)
}

enum Segment<'a> {
    Text(&'a str),
    Tag(&'a str),
}

/// Split text into plain segments and `<tag>` markers.
fn scan_tags(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('<') {
        let after = &rest[open + 1..];
        let name_len = after
            .find('>')
            .filter(|&end| end > 0 && after[..end].chars().all(|c| c.is_alphanumeric() || c == '_'));
        match name_len {
            Some(end) => {
                segments.push(Segment::Text(&rest[..open]));
                segments.push(Segment::Tag(&after[..end]));
                rest = &after[end + 1..];
            }
            None => {
                segments.push(Segment::Text(&rest[..=open]));
                rest = after;
            }
        }
    }
    segments.push(Segment::Text(rest));
    segments
}

pub fn build(markup: Markup, children: Vec<Child>) -> Tagged {
    let mut tags = HashMap::new();
    let mut content = Vec::new();
    if markup.ty.is_textblock() {
        let mut offset = 0;
        for child in children {
            let runs = match child {
                Child::Inline(runs) => runs,
                Child::Node(tagged) => panic!("textblocks hold text, got {}", tagged.node),
            };
            for run in runs {
                let mut text = String::new();
                for segment in scan_tags(&run.text) {
                    match segment {
                        Segment::Text(segment) => {
                            offset += segment.chars().count();
                            text.push_str(segment);
                        }
                        Segment::Tag(name) => {
                            tags.insert(name.to_string(), Pos::new(vec![], offset));
                        }
                    }
                }
                content.push(Node::new_text(text, run.styles));
            }
        }
    } else {
        for child in children {
            match child {
                Child::Inline(runs) => {
                    for run in runs {
                        for segment in scan_tags(&run.text) {
                            match segment {
                                Segment::Text(segment) => assert!(
                                    segment.trim().is_empty(),
                                    "text {:?} outside a textblock",
                                    segment
                                ),
                                Segment::Tag(name) => {
                                    tags.insert(name.to_string(), Pos::new(vec![], content.len()));
                                }
                            }
                        }
                    }
                }
                Child::Node(tagged) => {
                    let index = content.len();
                    for (name, pos) in tagged.tags {
                        let mut path = vec![index];
                        path.extend(pos.path);
                        tags.insert(name, Pos::new(path, pos.offset));
                    }
                    content.push(tagged.node);
                }
            }
        }
    }
    Tagged {
        node: markup.create(content),
        tags,
    }
}

pub fn node(ty: NodeType, children: Vec<Child>) -> Tagged {
    build(Markup::new(ty), children)
}

#[macro_export]
macro_rules! doc {
    ($($child:expr),* $(,)?) => {
        $crate::build::node($crate::NodeType::Doc, vec![$($crate::build::Child::from($child)),*])
    };
}

#[macro_export]
macro_rules! p {
    ($($child:expr),* $(,)?) => {
        $crate::build::node($crate::NodeType::Paragraph, vec![$($crate::build::Child::from($child)),*])
    };
}

#[macro_export]
macro_rules! h1 {
    ($($child:expr),* $(,)?) => {
        $crate::build::build(
            $crate::Markup::new($crate::NodeType::Heading).with_attr("level", "1"),
            vec![$($crate::build::Child::from($child)),*],
        )
    };
}

#[macro_export]
macro_rules! blockquote {
    ($($child:expr),* $(,)?) => {
        $crate::build::node($crate::NodeType::Blockquote, vec![$($crate::build::Child::from($child)),*])
    };
}

#[macro_export]
macro_rules! ul {
    ($($child:expr),* $(,)?) => {
        $crate::build::node($crate::NodeType::BulletList, vec![$($crate::build::Child::from($child)),*])
    };
}

#[macro_export]
macro_rules! ol {
    ($($child:expr),* $(,)?) => {
        $crate::build::node($crate::NodeType::OrderedList, vec![$($crate::build::Child::from($child)),*])
    };
}

#[macro_export]
macro_rules! li {
    ($($child:expr),* $(,)?) => {
        $crate::build::node($crate::NodeType::ListItem, vec![$($crate::build::Child::from($child)),*])
    };
}

#[macro_export]
macro_rules! hr {
    () => {
        $crate::build::node($crate::NodeType::HorizontalRule, vec![])
    };
}

#[macro_export]
macro_rules! em {
    ($($child:expr),* $(,)?) => {
        $crate::build::styled($crate::Style::Em, vec![$($crate::build::Child::from($child)),*])
    };
}

#[macro_export]
macro_rules! strong {
    ($($child:expr),* $(,)?) => {
        $crate::build::styled($crate::Style::Strong, vec![$($crate::build::Child::from($child)),*])
    };
}

#[macro_export]
macro_rules! code {
    ($($child:expr),* $(,)?) => {
        $crate::build::styled($crate::Style::Code, vec![$($crate::build::Child::from($child)),*])
    };
}
