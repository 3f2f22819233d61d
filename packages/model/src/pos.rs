//! # Positions
//!
//! A [`Pos`] addresses a point in a document snapshot: the path of child
//! indices from the root to the node containing the point, plus an offset
//! inside that node. Inside a textblock the offset counts characters,
//! anywhere else it counts children.
//!
//! Positions are ordered as if the path and offset formed one sequence, so a
//! position before a node sorts before every position inside that node.

use crate::Node;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Pos {
    pub path: Vec<usize>,
    pub offset: usize,
}

impl Pos {
    pub fn new(path: Vec<usize>, offset: usize) -> Self {
        Self { path, offset }
    }

    /// Start of the node at `path`.
    pub fn start(path: &[usize]) -> Self {
        Self::new(path.to_vec(), 0)
    }

    /// End of the node at `path` in `doc`.
    pub fn end(doc: &Node, path: &[usize]) -> Option<Self> {
        doc.path(path).map(|node| Self::new(path.to_vec(), node.size()))
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// The index at `depth` in this position's path, or its offset when
    /// `depth` equals the position's own depth.
    pub fn index(&self, depth: usize) -> usize {
        if depth < self.path.len() {
            self.path[depth]
        } else {
            self.offset
        }
    }

    /// Move the position up to `depth`, pointing at the ancestor that the
    /// original path passes through, plus `delta` (0 = before it, 1 = after).
    pub fn shorten(&self, depth: usize, delta: usize) -> Pos {
        debug_assert!(depth < self.path.len());
        Pos::new(self.path[..depth].to_vec(), self.path[depth] + delta)
    }

    /// Same path, different offset.
    pub fn with_offset(&self, offset: usize) -> Pos {
        Pos::new(self.path.clone(), offset)
    }

    /// Whether this position lies inside the node addressed by `prefix` (or
    /// directly in it when the paths are equal).
    pub fn starts_with(&self, prefix: &[usize]) -> bool {
        self.path.len() >= prefix.len() && self.path[..prefix.len()] == *prefix
    }

    /// Number of leading path entries the two positions share.
    pub fn common_depth(a: &Pos, b: &Pos) -> usize {
        a.path
            .iter()
            .zip(b.path.iter())
            .take_while(|(x, y)| x == y)
            .count()
    }

    fn sequence(&self) -> impl Iterator<Item = usize> + '_ {
        self.path.iter().copied().chain(std::iter::once(self.offset))
    }
}

impl Ord for Pos {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sequence().cmp(other.sequence())
    }
}

impl PartialOrd for Pos {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = self.path.iter().map(|i| i.to_string()).collect();
        write!(f, "{}:{}", path.join("/"), self.offset)
    }
}

/// Pull a range end that sits at the very start of a chain of nodes up to
/// the point before the outermost node of that chain.
pub fn reduce_left(pos: &Pos) -> Pos {
    if pos.offset > 0 || pos.path.is_empty() {
        return pos.clone();
    }
    let max = pos.path.iter().rposition(|&i| i > 0).unwrap_or(0);
    pos.shorten(max, 0)
}

/// Pull a range start that sits at the very end of a chain of nodes up to
/// the point after the outermost node of that chain.
pub fn reduce_right(doc: &Node, pos: &Pos) -> Pos {
    if pos.path.is_empty() {
        return pos.clone();
    }
    let mut node = doc;
    let mut max = 0;
    for (depth, &index) in pos.path.iter().enumerate() {
        if index + 1 < node.child_count() {
            max = depth;
        }
        match node.child(index) {
            Some(child) => node = child,
            None => return pos.clone(),
        }
    }
    if pos.offset < node.size() {
        return pos.clone();
    }
    pos.shorten(max, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{blockquote, doc, p};

    #[test]
    fn test_ordering_is_lexicographic() {
        let before = Pos::new(vec![], 1);
        let inside = Pos::new(vec![1], 0);
        let after = Pos::new(vec![], 2);
        assert!(before < inside);
        assert!(inside < after);
        assert!(Pos::new(vec![0], 5) < Pos::new(vec![1], 0));
        assert_eq!(Pos::new(vec![2, 1], 3).cmp(&Pos::new(vec![2, 1], 3)), Ordering::Equal);
    }

    #[test]
    fn test_shorten_and_index() {
        let pos = Pos::new(vec![3, 1], 4);
        assert_eq!(pos.shorten(1, 0), Pos::new(vec![3], 1));
        assert_eq!(pos.shorten(0, 1), Pos::new(vec![], 4));
        assert_eq!(pos.index(0), 3);
        assert_eq!(pos.index(2), 4);
        assert_eq!(Pos::common_depth(&pos, &Pos::new(vec![3, 2], 0)), 1);
    }

    #[test]
    fn test_reduce() {
        let t = doc![p!["one"], blockquote![p!["two"]], p!["three"]];
        // start of the blockquote's paragraph reduces to before the blockquote
        assert_eq!(reduce_left(&Pos::new(vec![1, 0], 0)), Pos::new(vec![], 1));
        // end of the first paragraph reduces to after it
        assert_eq!(reduce_right(&t.node, &Pos::new(vec![0], 3)), Pos::new(vec![], 1));
        // end of the quoted paragraph reduces to after the blockquote
        assert_eq!(reduce_right(&t.node, &Pos::new(vec![1, 0], 3)), Pos::new(vec![], 2));
        // positions with content on both sides stay put
        assert_eq!(reduce_right(&t.node, &Pos::new(vec![0], 1)), Pos::new(vec![0], 1));
        assert_eq!(reduce_left(&Pos::new(vec![2], 2)), Pos::new(vec![2], 2));
    }

    #[test]
    fn test_display() {
        assert_eq!(Pos::new(vec![0, 2], 5).to_string(), "0/2:5");
    }
}
