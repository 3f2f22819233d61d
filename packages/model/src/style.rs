//! Inline styles carried by text nodes.

use serde::{Deserialize, Serialize};

/// A style applied to a run of text.
///
/// Text nodes keep their styles as a sorted, duplicate-free set. At most one
/// style of each kind is present, so a text run can't carry two links.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Style {
    Em,
    Strong,
    Code,
    Link {
        href: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
}

impl Style {
    pub fn link(href: impl Into<String>) -> Self {
        Style::Link {
            href: href.into(),
            title: None,
        }
    }

    /// Two styles are of the same kind when they would occupy the same slot
    /// in a style set (`Link`s with different targets included).
    pub fn same_kind(&self, other: &Style) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Style::Em => "em",
            Style::Strong => "strong",
            Style::Code => "code",
            Style::Link { .. } => "link",
        }
    }
}

/// Normalize a style list into a sorted set with one style per kind.
pub fn normalize_styles(mut styles: Vec<Style>) -> Vec<Style> {
    let mut out: Vec<Style> = Vec::with_capacity(styles.len());
    for style in styles.drain(..) {
        out.retain(|s| !s.same_kind(&style));
        out.push(style);
    }
    out.sort();
    out
}

/// Return `set` with `style` added, replacing any style of the same kind.
pub fn add_style(set: &[Style], style: &Style) -> Vec<Style> {
    let mut out: Vec<Style> = set.iter().filter(|s| !s.same_kind(style)).cloned().collect();
    out.push(style.clone());
    out.sort();
    out
}

/// Return `set` without any style of the same kind as `style`.
pub fn remove_style(set: &[Style], style: &Style) -> Vec<Style> {
    set.iter().filter(|s| !s.same_kind(style)).cloned().collect()
}

pub fn has_style_kind(set: &[Style], style: &Style) -> bool {
    set.iter().any(|s| s.same_kind(style))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_replaces_same_kind() {
        let set = vec![Style::Em, Style::link("a")];
        let out = add_style(&set, &Style::link("b"));
        assert_eq!(out, vec![Style::Em, Style::link("b")]);
    }

    #[test]
    fn test_normalize_sorts_and_dedupes() {
        let out = normalize_styles(vec![Style::Strong, Style::Em, Style::Strong]);
        assert_eq!(out, vec![Style::Em, Style::Strong]);
    }

    #[test]
    fn test_remove_by_kind() {
        let set = vec![Style::Code, Style::link("x")];
        assert_eq!(remove_style(&set, &Style::link("y")), vec![Style::Code]);
        assert!(has_style_kind(&set, &Style::link("z")));
        assert!(!has_style_kind(&set, &Style::Em));
    }
}
