//! # Position maps
//!
//! A [`PosMap`] describes how one step moved positions around. It is a set
//! of moved ranges (content that shifted to a new address) and collapsed
//! ranges (content that was replaced; positions inside it have nowhere to go
//! and bind to one end of the replacement, as chosen by the bias).
//!
//! Collapsed ranges are checked first, then moved ranges, and a position
//! matching neither is unchanged.

use quire_model::Pos;

/// Which side of an insertion at exactly this point a position sticks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bias {
    Before,
    After,
}

impl Bias {
    pub fn flip(self) -> Bias {
        match self {
            Bias::Before => Bias::After,
            Bias::After => Bias::Before,
        }
    }
}

/// `size` units starting at `start` (in the node at `start.path`) now live at
/// `dest`. Positions at `start.offset + size` move along with the range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedRange {
    pub start: Pos,
    pub size: usize,
    pub dest: Pos,
}

/// Everything strictly between `from` and `to` was replaced by the content
/// between `new_from` and `new_to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapsedRange {
    pub from: Pos,
    pub to: Pos,
    pub new_from: Pos,
    pub new_to: Pos,
}

/// Where a position sat relative to the start of the collapsed range that
/// touched it (as an end or strictly inside), so a map that reproduces the
/// same replacement can put it back exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovery {
    index: usize,
    up: usize,
    delta: usize,
    tail: Option<(Vec<usize>, usize)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapResult {
    pub pos: Pos,
    pub deleted: bool,
    pub recover: Option<Recovery>,
}

impl MapResult {
    fn kept(pos: Pos) -> Self {
        Self {
            pos,
            deleted: false,
            recover: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PosMap {
    moved: Vec<MovedRange>,
    collapsed: Vec<CollapsedRange>,
}

impl PosMap {
    pub fn new(moved: Vec<MovedRange>, collapsed: Vec<CollapsedRange>) -> Self {
        Self { moved, collapsed }
    }

    /// A map that leaves every position where it is.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn is_identity(&self) -> bool {
        self.moved.is_empty() && self.collapsed.is_empty()
    }

    pub fn moved(&self) -> &[MovedRange] {
        &self.moved
    }

    pub fn collapsed(&self) -> &[CollapsedRange] {
        &self.collapsed
    }

    /// Map a position from the document before the step to the one after.
    pub fn map(&self, pos: &Pos, bias: Bias) -> MapResult {
        self.map_dir(pos, bias, false)
    }

    /// Map a position from the document after the step back to the one
    /// before, as if through the inverted map.
    pub fn map_back(&self, pos: &Pos, bias: Bias) -> MapResult {
        self.map_dir(pos, bias, true)
    }

    /// The map of the inverse step.
    pub fn invert(&self) -> PosMap {
        PosMap {
            moved: self
                .moved
                .iter()
                .map(|r| MovedRange {
                    start: r.dest.clone(),
                    size: r.size,
                    dest: r.start.clone(),
                })
                .collect(),
            collapsed: self
                .collapsed
                .iter()
                .map(|r| CollapsedRange {
                    from: r.new_from.clone(),
                    to: r.new_to.clone(),
                    new_from: r.from.clone(),
                    new_to: r.to.clone(),
                })
                .collect(),
        }
    }

    /// Restore a position deleted by the map this one mirrors.
    pub fn recover(&self, recovery: &Recovery) -> Option<Pos> {
        let range = self.collapsed.get(recovery.index)?;
        restore(&range.new_from, recovery)
    }

    /// Like [`PosMap::recover`], for the inverted map.
    pub fn recover_back(&self, recovery: &Recovery) -> Option<Pos> {
        let range = self.collapsed.get(recovery.index)?;
        restore(&range.from, recovery)
    }

    fn map_dir(&self, pos: &Pos, bias: Bias, back: bool) -> MapResult {
        for (index, range) in self.collapsed.iter().enumerate() {
            let (from, to, new_from, new_to) = if back {
                (&range.new_from, &range.new_to, &range.from, &range.to)
            } else {
                (&range.from, &range.to, &range.new_from, &range.new_to)
            };
            let edge = if pos == from && pos == to {
                Some(match bias {
                    Bias::Before => new_from,
                    Bias::After => new_to,
                })
            } else if pos == from {
                Some(new_from)
            } else if pos == to {
                Some(new_to)
            } else {
                None
            };
            if let Some(edge) = edge {
                return MapResult {
                    pos: edge.clone(),
                    deleted: false,
                    recover: relative_to(from, pos, index),
                };
            }
            if pos > from && pos < to {
                return MapResult {
                    pos: match bias {
                        Bias::Before => new_from.clone(),
                        Bias::After => new_to.clone(),
                    },
                    deleted: true,
                    recover: relative_to(from, pos, index),
                };
            }
        }
        for range in &self.moved {
            let (start, dest) = if back {
                (&range.dest, &range.start)
            } else {
                (&range.start, &range.dest)
            };
            if let Some(moved) = translate(start, range.size, dest, pos) {
                return MapResult::kept(moved);
            }
        }
        MapResult::kept(pos.clone())
    }
}

fn translate(start: &Pos, size: usize, dest: &Pos, pos: &Pos) -> Option<Pos> {
    let depth = start.depth();
    if !pos.starts_with(&start.path) {
        return None;
    }
    let end = start.offset + size;
    if pos.depth() == depth {
        if pos.offset < start.offset || pos.offset > end {
            return None;
        }
        return Some(Pos::new(
            dest.path.clone(),
            dest.offset + pos.offset - start.offset,
        ));
    }
    let index = pos.path[depth];
    if index < start.offset || index >= end {
        return None;
    }
    let mut path = dest.path.clone();
    path.push(dest.offset + index - start.offset);
    path.extend_from_slice(&pos.path[depth + 1..]);
    Some(Pos::new(path, pos.offset))
}

fn relative_to(start: &Pos, pos: &Pos, index: usize) -> Option<Recovery> {
    let shared = Pos::common_depth(start, pos);
    let delta = pos.index(shared).checked_sub(start.index(shared))?;
    let tail = if pos.depth() > shared {
        Some((pos.path[shared + 1..].to_vec(), pos.offset))
    } else {
        None
    };
    Some(Recovery {
        index,
        up: start.depth() - shared,
        delta,
        tail,
    })
}

fn restore(start: &Pos, recovery: &Recovery) -> Option<Pos> {
    let depth = start.depth().checked_sub(recovery.up)?;
    let index = start.index(depth) + recovery.delta;
    let mut path = start.path[..depth].to_vec();
    match &recovery.tail {
        None => Some(Pos::new(path, index)),
        Some((rest, offset)) => {
            path.push(index);
            path.extend_from_slice(rest);
            Some(Pos::new(path, *offset))
        }
    }
}
