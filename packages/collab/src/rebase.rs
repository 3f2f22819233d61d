//! # Rebasing concurrent transitions
//!
//! Transitions authored concurrently against shared versions are put in one
//! deterministic order by [`merge_change_sets`], then replayed one after the
//! other by [`rebase_changes`]. Each transition is mapped back over the
//! changes its author had already seen and forward over the ones applied
//! before it, so every replica reaches the same document and version id
//! whatever order it received them in.

use crate::errors::CollabError;
use crate::ids::{ClientId, VersionId};
use crate::versions::{Transition, VersionStore};
use quire_model::{Node, Pos};
use quire_transform::{map_transform, Bias, MapEntry, MapKey, MapResult, Remapping};

/// Something authored by a client.
pub trait Authored {
    fn client_id(&self) -> ClientId;
}

impl Authored for Transition {
    fn client_id(&self) -> ClientId {
        self.client_id
    }
}

/// Merge two client-ordered lists. Items from `new` only go ahead of items
/// from `old` when their client sorts first.
pub fn merge_change_sets<T: Authored + Clone>(old: &[T], new: &[T]) -> Vec<T> {
    let mut result = Vec::with_capacity(old.len() + new.len());
    let (mut i_old, mut i_new) = (0, 0);
    while i_old < old.len() && i_new < new.len() {
        if old[i_old].client_id() > new[i_new].client_id() {
            result.push(new[i_new].clone());
            i_new += 1;
        } else {
            result.push(old[i_old].clone());
            i_old += 1;
        }
    }
    result.extend_from_slice(&old[i_old..]);
    result.extend_from_slice(&new[i_new..]);
    result
}

fn key(transition: &Transition, step: usize) -> MapKey {
    MapKey::new(transition.id.0, step)
}

/// A remapping that undoes `back` and then applies `forward`.
fn remapping(back: &[Transition], forward: &[Transition]) -> Remapping {
    let mut remapping = Remapping::new();
    for transition in back {
        for (step, map) in transition.transform.maps().iter().enumerate() {
            remapping.add_inverted(MapEntry::new(map.clone(), key(transition, step)));
        }
    }
    for transition in forward {
        for (step, map) in transition.transform.maps().iter().enumerate() {
            remapping.add_to_back(MapEntry::new(map.clone(), key(transition, step)));
        }
    }
    remapping
}

/// Map a position from the version before `forward` (and after `back`) to
/// the version after `forward`.
pub fn map_position(back: &[Transition], forward: &[Transition], pos: &Pos, bias: Bias) -> MapResult {
    remapping(back, forward).map(pos, bias)
}

#[derive(Debug, Clone)]
pub struct RebaseResult {
    /// The version reached after every transition.
    pub id: VersionId,
    pub doc: Node,
    /// The rebased transitions, in the order applied.
    pub forward: Vec<Transition>,
}

/// Replay `transitions` (already merged) on top of version `base_id`,
/// storing every version reached along the way. On error the store is left
/// untouched.
pub fn rebase_changes(
    base_id: VersionId,
    transitions: &[Transition],
    store: &mut VersionStore,
) -> Result<RebaseResult, CollabError> {
    let mut id = base_id;
    let mut doc = store.version(base_id)?.clone();
    let mut forward: Vec<Transition> = Vec::with_capacity(transitions.len());
    let mut reached: Vec<(VersionId, VersionId, Node)> = Vec::with_capacity(transitions.len());

    for transition in transitions {
        if !store.contains(transition.base_id) {
            tracing::warn!(
                "[Collab] Rejecting transition {} from {}: unknown base {}",
                transition.id,
                transition.client_id,
                transition.base_id
            );
            return Err(CollabError::MissingVersion(transition.base_id));
        }
        let back = store.transitions_between(base_id, transition.base_id)?;
        let mapping = remapping(&back, &forward);
        let rebased = map_transform(&doc, &mapping, &transition.transform, transition.id.0);
        let dropped = rebased.positions.iter().filter(|p| p.is_none()).count();
        if dropped > 0 {
            tracing::debug!(
                "[Collab] Transition {} lost {} step(s) while rebasing",
                transition.id,
                dropped
            );
        }

        let next = id ^ transition.id;
        doc = rebased.transform.doc().clone();
        reached.push((next, id, doc.clone()));
        forward.push(Transition::new(transition.id, id, transition.client_id, rebased.transform));
        id = next;
    }

    for (version, base, snapshot) in reached {
        store.store_version(version, Some(base), snapshot);
    }
    for stored in &forward {
        store.store_transition(stored.clone());
    }

    Ok(RebaseResult { id, doc, forward })
}
