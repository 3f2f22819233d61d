//! Helpers for the inline (text) content of textblocks.
//!
//! Offsets are character offsets across the concatenated text of the
//! textblock's children.

use crate::style::Style;
use crate::{Node, NodeType};

fn char_slice(text: &str, from: usize, to: usize) -> String {
    text.chars().skip(from).take(to.saturating_sub(from)).collect()
}

/// Glue adjacent text nodes with equal style sets and drop empty ones.
pub fn normalize(content: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(content.len());
    for node in content {
        if node.ty() == NodeType::Text && node.text().is_empty() {
            continue;
        }
        if let Some(last) = out.last_mut() {
            if last.is_text() && node.is_text() && last.styles() == node.styles() {
                let joined = format!("{}{}", last.text(), node.text());
                *last = Node::new_text(joined, last.styles().to_vec());
                continue;
            }
        }
        out.push(node);
    }
    out
}

/// The text between two character offsets, as styled text nodes.
pub fn cut(content: &[Node], from: usize, to: usize) -> Vec<Node> {
    let mut out = Vec::new();
    if from >= to {
        return out;
    }
    let mut start = 0;
    for node in content {
        let size = node.size();
        let end = start + size;
        if end > from && start < to {
            let local_from = from.saturating_sub(start);
            let local_to = (to - start).min(size);
            if local_from == 0 && local_to == size {
                out.push(node.clone());
            } else {
                out.push(Node::new_text(
                    char_slice(node.text(), local_from, local_to),
                    node.styles().to_vec(),
                ));
            }
        }
        start = end;
        if start >= to {
            break;
        }
    }
    out
}

/// Rewrite the style sets of the text between two offsets with `f`.
pub fn restyle(
    content: &[Node],
    from: usize,
    to: usize,
    f: impl Fn(&[Style]) -> Vec<Style>,
) -> Vec<Node> {
    let size: usize = content.iter().map(Node::size).sum();
    let mut out = cut(content, 0, from);
    for node in cut(content, from, to) {
        out.push(Node::new_text(node.text(), f(node.styles())));
    }
    out.extend(cut(content, to, size));
    normalize(out)
}

/// Whether any text between the offsets satisfies `pred`, and whether all of
/// it does. An empty range reports `(false, true)`.
pub fn style_coverage(
    content: &[Node],
    from: usize,
    to: usize,
    pred: impl Fn(&[Style]) -> bool,
) -> (bool, bool) {
    let mut any = false;
    let mut all = true;
    for node in cut(content, from, to) {
        if pred(node.styles()) {
            any = true;
        } else {
            all = false;
        }
    }
    (any, all)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Node {
        Node::new_text(s, vec![])
    }

    fn em(s: &str) -> Node {
        Node::new_text(s, vec![Style::Em])
    }

    #[test]
    fn test_cut_splits_text_nodes() {
        let content = vec![text("hel"), em("lo")];
        assert_eq!(cut(&content, 1, 4), vec![text("el"), em("l")]);
        assert_eq!(cut(&content, 3, 5), vec![em("lo")]);
        assert!(cut(&content, 2, 2).is_empty());
    }

    #[test]
    fn test_normalize_merges_and_drops_empty() {
        let content = vec![text("a"), text(""), text("b"), em("c")];
        assert_eq!(normalize(content), vec![text("ab"), em("c")]);
    }

    #[test]
    fn test_restyle_range() {
        let content = vec![text("hello")];
        let out = restyle(&content, 1, 3, |styles| {
            crate::style::add_style(styles, &Style::Strong)
        });
        assert_eq!(
            out,
            vec![
                text("h"),
                Node::new_text("el", vec![Style::Strong]),
                text("lo")
            ]
        );
    }

    #[test]
    fn test_style_coverage() {
        let content = vec![text("ab"), em("cd")];
        let has_em = |s: &[Style]| s.contains(&Style::Em);
        assert_eq!(style_coverage(&content, 0, 4, has_em), (true, false));
        assert_eq!(style_coverage(&content, 2, 4, has_em), (true, true));
        assert_eq!(style_coverage(&content, 0, 2, has_em), (false, false));
        // empty range inside a text node
        assert_eq!(style_coverage(&content, 1, 1, has_em), (false, true));
    }
}
