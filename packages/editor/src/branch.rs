//! # Branch
//!
//! One side of the history: a bounded log of events, each a list of
//! inverted steps, plus the maps of every step applied to the document
//! since the branch last became non-empty.
//!
//! Versions count those maps. An inverted step remembers the version it was
//! recorded at, so when it is popped it can be mapped forward through every
//! map that came after it. The `mirror` table links the map of an undo step
//! to the version of the step it reverses, which lets positions deleted by
//! the original come back when the undo restores them.

use quire_model::Node;
use quire_transform::{map_step, MapEntry, MapKey, PosMap, Remapping, Step, StepRegistry, Transform};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

const BRANCH_ORIGIN: u128 = 0;
const POPPED_ORIGIN: u128 = 1;

/// A step that undoes an applied one, valid against the document at
/// `version`.
#[derive(Debug, Clone)]
pub struct InvertedStep {
    pub step: Step,
    pub version: usize,
}

#[derive(Debug, Clone)]
pub struct Branch {
    max_depth: usize,
    version: usize,
    /// The last entry produced `version`.
    maps: Vec<PosMap>,
    mirror: HashMap<usize, usize>,
    events: VecDeque<Vec<InvertedStep>>,
}

impl Branch {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
            version: 0,
            maps: Vec::new(),
            mirror: HashMap::new(),
            events: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn version(&self) -> usize {
        self.version
    }

    /// Number of maps currently kept.
    pub fn map_count(&self) -> usize {
        self.maps.len()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.maps.clear();
        self.mirror.clear();
    }

    /// Start a new event, evicting the oldest ones past the depth limit.
    pub fn new_event(&mut self) {
        self.events.push_back(Vec::new());
        let mut evicted = 0;
        while self.events.len() > self.max_depth {
            self.events.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            tracing::debug!("[History] Evicted {} event(s) past depth {}", evicted, self.max_depth);
            self.trim_maps();
        }
    }

    /// Record the map of a step that doesn't go into this branch. Ignored
    /// while the branch is empty.
    pub fn add_map(&mut self, map: PosMap) {
        if !self.is_empty() {
            self.maps.push(map);
            self.version += 1;
        }
    }

    /// Invert every step of `transform` into the current event.
    pub fn add_transform(&mut self, transform: &Transform) {
        if self.is_empty() {
            self.new_event();
        }
        for (index, map) in transform.maps().iter().enumerate() {
            self.add_map(map.clone());
            match transform.invert_step(index) {
                Some(step) => {
                    let version = self.version;
                    if let Some(event) = self.events.back_mut() {
                        event.push(InvertedStep { step, version });
                    }
                }
                None => {
                    tracing::warn!("[History] Could not invert step {}", transform.steps()[index]);
                }
            }
        }
    }

    /// The map that produced `version`, if still kept.
    fn map_at(&self, version: usize) -> Option<&PosMap> {
        let behind = self.version.checked_sub(version)?;
        let index = self.maps.len().checked_sub(behind + 1)?;
        self.maps.get(index)
    }

    /// Drop maps older than the oldest step any event still holds.
    fn trim_maps(&mut self) {
        let oldest = self.events.iter().flatten().map(|step| step.version).min();
        let Some(oldest) = oldest else {
            return;
        };
        let keep = self.version - oldest + 1;
        if self.maps.len() > keep {
            let excess = self.maps.len() - keep;
            self.maps.drain(..excess);
        }
        self.mirror.retain(|version, _| *version >= oldest);
    }

    /// Pop the newest event and build a transform that undoes it against
    /// `doc`. Steps that no longer apply are skipped, so the transform may
    /// be empty.
    pub fn pop_event(
        &mut self,
        registry: &Arc<StepRegistry>,
        doc: &Node,
        allow_collapsing: bool,
    ) -> Option<Transform> {
        let event = self.events.pop_back()?;
        let mut remap = BranchRemapping::new(self.version);
        let mut collapsing = allow_collapsing;
        let mut transform = Transform::new(registry.clone(), doc.clone());

        for (index, inverted) in event.iter().enumerate().rev() {
            if collapsing
                && inverted.version == remap.version
                && !self.maps.is_empty()
                && transform.step(inverted.step.clone())
            {
                self.mirror.remove(&self.version);
                self.maps.pop();
                self.version -= 1;
                remap.version -= 1;
                continue;
            }
            collapsing = false;

            remap.move_to_version(self, inverted.version);
            let applied = match map_step(&inverted.step, &remap.remapping) {
                Some(step) => transform.step(step),
                None => false,
            };
            let result = if applied { transform.maps().last().cloned() } else { None };
            if let Some(map) = &result {
                self.maps.push(map.clone());
                self.version += 1;
                self.mirror.insert(self.version, inverted.version);
            } else {
                tracing::debug!("[History] Dropped step {} of undone event", inverted.step);
            }

            if index > 0 {
                remap.move_past_step(self, result, index);
            }
        }

        if self.events.is_empty() {
            self.maps.clear();
            self.mirror.clear();
        }
        Some(transform)
    }

    /// Adjust the branch after remote steps were inserted before the last
    /// `positions.len()` local steps. `remote_maps` are the maps of those
    /// remote steps, `rebased` holds the local steps mapped over them, and
    /// `positions` says where each local step ended up in it.
    pub fn rebase(&mut self, remote_maps: &[PosMap], rebased: &Transform, positions: &[Option<usize>]) {
        if self.is_empty() {
            return;
        }
        let covered = positions.len().min(self.maps.len());
        let positions = &positions[positions.len() - covered..];
        let start = self.version - covered;

        'events: for event in self.events.iter_mut().rev() {
            let mut j = event.len();
            while j > 0 {
                j -= 1;
                let version = event[j].version;
                if version <= start {
                    break 'events;
                }
                let inverted = positions[version - start - 1].and_then(|offset| {
                    rebased.invert_step(offset).map(|step| InvertedStep {
                        step,
                        version: start + remote_maps.len() + offset + 1,
                    })
                });
                match inverted {
                    Some(inverted) => event[j] = inverted,
                    None => {
                        event.remove(j);
                    }
                }
            }
        }

        let keep = self.maps.len() - covered;
        self.maps.truncate(keep);
        self.maps.extend(remote_maps.iter().cloned());
        self.maps.extend(rebased.maps().iter().cloned());
        self.version = start + remote_maps.len() + rebased.len();
        self.mirror.retain(|version, _| *version <= start);
    }
}

/// Maps a popped event's steps from the version they were recorded at to
/// the document being built.
struct BranchRemapping {
    remapping: Remapping,
    version: usize,
}

impl BranchRemapping {
    fn new(version: usize) -> Self {
        Self {
            remapping: Remapping::new(),
            version,
        }
    }

    fn move_to_version(&mut self, branch: &Branch, version: usize) {
        while self.version > version {
            if self.add_next_map(branch).is_none() {
                tracing::warn!("[History] Missing map for version {}", self.version);
                break;
            }
        }
    }

    fn add_next_map(&mut self, branch: &Branch) -> Option<MapKey> {
        let map = branch.map_at(self.version)?.clone();
        let key = MapKey::new(BRANCH_ORIGIN, self.version);
        let mut entry = MapEntry::new(map, key);
        if let Some(reversed) = branch.mirror.get(&self.version) {
            entry = entry.mirroring(MapKey::new(BRANCH_ORIGIN, *reversed));
        }
        self.remapping.add_to_front(entry);
        self.version -= 1;
        Some(key)
    }

    /// Step over the map of the step just handled. When its undo applied,
    /// the undo's map restores what the original map deleted.
    fn move_past_step(&mut self, branch: &Branch, result: Option<PosMap>, index: usize) {
        let key = self.add_next_map(branch);
        if let (Some(key), Some(map)) = (key, result) {
            self.remapping
                .add_to_back(MapEntry::new(map, MapKey::new(POPPED_ORIGIN, index)).mirroring(key));
        }
    }
}
