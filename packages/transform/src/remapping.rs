//! # Remapping
//!
//! Composition of several [`PosMap`]s, used to carry a position between two
//! versions that share an ancestor:
//!
//! - the *back* list holds maps leading from the ancestor to the position's
//!   own version. They are traversed newest first, inverted, with the bias
//!   flipped.
//! - the *forward* list holds maps leading from the ancestor to the target
//!   version, traversed in order.
//!
//! Every entry has a [`MapKey`]. When the back traversal deletes a position,
//! the forward entry with the same key restores it. When a forward entry
//! deletes a position and a later forward entry declares itself the mirror
//! of that one, the mirror restores it and the maps in between are skipped.

use crate::map::{Bias, MapResult, PosMap};
use quire_model::Pos;
use std::collections::{HashMap, VecDeque};

/// Identifies one map: the change it came from and the step inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapKey {
    pub origin: u128,
    pub step: usize,
}

impl MapKey {
    pub fn new(origin: u128, step: usize) -> Self {
        Self { origin, step }
    }
}

#[derive(Debug, Clone)]
pub struct MapEntry {
    pub map: PosMap,
    pub key: MapKey,
    /// Key of an earlier forward entry whose change this one exactly reverses.
    pub mirror: Option<MapKey>,
}

impl MapEntry {
    pub fn new(map: PosMap, key: MapKey) -> Self {
        Self {
            map,
            key,
            mirror: None,
        }
    }

    pub fn mirroring(mut self, key: MapKey) -> Self {
        self.mirror = Some(key);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Remapping {
    back: Vec<MapEntry>,
    forward: VecDeque<MapEntry>,
}

impl Remapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a map to the back list. Back maps are added oldest first.
    pub fn add_inverted(&mut self, entry: MapEntry) {
        self.back.push(entry);
    }

    /// Add a map in front of the forward list, to be applied before every
    /// forward map added so far.
    pub fn add_to_front(&mut self, entry: MapEntry) {
        self.forward.push_front(entry);
    }

    /// Add a map at the end of the forward list.
    pub fn add_to_back(&mut self, entry: MapEntry) {
        self.forward.push_back(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.back.is_empty() && self.forward.is_empty()
    }

    pub fn map(&self, pos: &Pos, bias: Bias) -> MapResult {
        let mut pos = pos.clone();
        let mut recoveries = HashMap::new();

        for entry in self.back.iter().rev() {
            let result = entry.map.map_back(&pos, bias.flip());
            if let Some(recovery) = result.recover {
                recoveries.insert(entry.key, recovery);
            }
            pos = result.pos;
        }

        let mut deleted = false;
        let mut i = 0;
        while i < self.forward.len() {
            let entry = &self.forward[i];
            if let Some(recovery) = recoveries.remove(&entry.key) {
                if let Some(restored) = entry.map.recover(&recovery) {
                    pos = restored;
                    i += 1;
                    continue;
                }
            }
            let result = entry.map.map(&pos, bias);
            if result.deleted {
                if let Some((j, restored)) = self.find_mirror(i, result.recover.as_ref()) {
                    pos = restored;
                    i = j + 1;
                    continue;
                }
                deleted = true;
            }
            pos = result.pos;
            i += 1;
        }

        MapResult {
            pos,
            deleted,
            recover: None,
        }
    }

    fn find_mirror(
        &self,
        index: usize,
        recovery: Option<&crate::map::Recovery>,
    ) -> Option<(usize, Pos)> {
        let recovery = recovery?;
        let key = self.forward[index].key;
        let offset = self
            .forward
            .iter()
            .skip(index + 1)
            .position(|e| e.mirror == Some(key))?;
        let j = index + 1 + offset;
        let restored = self.forward[j].map.recover(recovery)?;
        Some((j, restored))
    }
}
