//! # Rebasing transforms
//!
//! [`map_transform`] carries a transform made against one version of a
//! document onto another version, given a [`Remapping`] between the two.
//! Each step's positions are mapped; a step whose positions were all
//! deleted, or that no longer applies, is dropped.
//!
//! The returned mapping extends the input one: it maps positions from the
//! transform's final document into the rebased result.

use crate::map::Bias;
use crate::remapping::{MapEntry, MapKey, Remapping};
use crate::step::Step;
use crate::transform::Transform;
use quire_model::{Node, Pos};

#[derive(Debug, Clone)]
pub struct Rebased {
    pub transform: Transform,
    /// For every input step, the index of its rebased counterpart, or
    /// `None` when it was dropped.
    pub positions: Vec<Option<usize>>,
    pub mapping: Remapping,
}

/// Map the positions of one step through `mapping`. `None` when every
/// position the step has was deleted.
pub fn map_step(step: &Step, mapping: &Remapping) -> Option<Step> {
    let mut all_deleted = true;
    let mut any = false;
    let mut map = |pos: &Pos, bias: Bias| {
        let result = mapping.map(pos, bias);
        any = true;
        if !result.deleted {
            all_deleted = false;
        }
        result.pos
    };

    let from = step.from.as_ref().map(|pos| map(pos, Bias::After));
    let to = match (&step.to, &step.from, &from) {
        (Some(to), Some(old_from), Some(new_from)) if to == old_from => Some(new_from.clone()),
        (Some(to), _, new_from) => {
            let mapped = map(to, Bias::Before);
            match new_from {
                Some(new_from) if *new_from > mapped => Some(new_from.clone()),
                _ => Some(mapped),
            }
        }
        (None, _, _) => None,
    };
    let pos = match &step.pos {
        Some(pos) if Some(pos) == step.from.as_ref() => from.clone(),
        Some(pos) if Some(pos) == step.to.as_ref() => to.clone(),
        Some(pos) => Some(map(pos, Bias::After)),
        None => None,
    };

    if any && all_deleted {
        return None;
    }
    Some(Step {
        from,
        to,
        pos,
        ..step.clone()
    })
}

/// Rebase `transform` onto `doc`, where `remapping` maps positions from
/// `transform.before()` to `doc`. Map keys for the transform's own steps
/// use `origin`.
pub fn map_transform(doc: &Node, remapping: &Remapping, transform: &Transform, origin: u128) -> Rebased {
    let mut mapping = remapping.clone();
    let mut result = Transform::new(transform.registry().clone(), doc.clone());
    let mut positions = Vec::with_capacity(transform.len());

    for (index, (step, own_map)) in transform.steps().iter().zip(transform.maps()).enumerate() {
        let key = MapKey::new(origin, index);
        let applied = match map_step(step, &mapping) {
            Some(mapped) => result.step(mapped),
            None => false,
        };
        if applied {
            positions.push(Some(result.len() - 1));
            if let Some(map) = result.maps().last() {
                mapping.add_to_back(MapEntry::new(map.clone(), key));
            }
        } else {
            tracing::debug!("[Transform] Dropped step {} ({}) while rebasing", index, step);
            positions.push(None);
        }
        mapping.add_inverted(MapEntry::new(own_map.clone(), key));
    }

    Rebased {
        transform: result,
        positions,
        mapping,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepRegistry;
    use quire_model::{doc, p};
    use std::sync::Arc;

    #[test]
    fn test_empty_remapping_replays_steps() {
        let t = doc![p!["ab<a>c"]];
        let registry = Arc::new(StepRegistry::standard());
        let mut tr = Transform::new(registry, t.node.clone());
        tr.insert_text(&t.tag("a"), "X");
        let rebased = map_transform(&t.node, &Remapping::new(), &tr, 1);
        assert_eq!(rebased.transform.doc(), tr.doc());
        assert_eq!(rebased.positions, vec![Some(0)]);
    }

    #[test]
    fn test_step_without_surviving_positions_is_dropped() {
        let t = doc![p!["a<a>bc<b>d"]];
        let registry = Arc::new(StepRegistry::standard());
        let mut remote = Transform::new(registry.clone(), t.node.clone());
        remote.delete(&Pos::new(vec![0], 0), &Pos::new(vec![0], 4));
        let mut local = Transform::new(registry, t.node.clone());
        local.delete(&t.tag("a"), &t.tag("b"));

        let mut remapping = Remapping::new();
        remapping.add_to_back(MapEntry::new(remote.maps()[0].clone(), MapKey::new(2, 0)));
        let rebased = map_transform(remote.doc(), &remapping, &local, 1);
        assert_eq!(rebased.positions, vec![None]);
        assert!(rebased.transform.is_empty());
        assert_eq!(rebased.transform.doc(), remote.doc());
    }
}
