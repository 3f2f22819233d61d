//! # Version store
//!
//! Snapshots by version id, and the transition that produced each version.
//! The base links form a tree rooted at [`VersionId::NULL`].

use crate::errors::CollabError;
use crate::ids::{ClientId, VersionId};
use quire_model::Node;
use quire_transform::Transform;
use std::collections::HashMap;

/// A transform authored by one client against version `base_id`.
#[derive(Debug, Clone)]
pub struct Transition {
    pub id: VersionId,
    pub base_id: VersionId,
    pub client_id: ClientId,
    pub transform: Transform,
}

impl Transition {
    pub fn new(id: VersionId, base_id: VersionId, client_id: ClientId, transform: Transform) -> Self {
        Self {
            id,
            base_id,
            client_id,
            transform,
        }
    }

    /// The version this transition leads to.
    pub fn result_id(&self) -> VersionId {
        self.base_id ^ self.id
    }
}

#[derive(Debug, Clone)]
struct StoredVersion {
    base_id: Option<VersionId>,
    doc: Node,
}

#[derive(Debug, Clone, Default)]
pub struct VersionStore {
    versions: HashMap<VersionId, StoredVersion>,
    incoming: HashMap<VersionId, Transition>,
}

impl VersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding only the initial version.
    pub fn with_root(doc: Node) -> Self {
        let mut store = Self::new();
        store.store_version(VersionId::NULL, None, doc);
        store
    }

    pub fn store_version(&mut self, id: VersionId, base_id: Option<VersionId>, doc: Node) {
        self.versions.insert(id, StoredVersion { base_id, doc });
    }

    /// Record `transition` as the way into its result version.
    pub fn store_transition(&mut self, transition: Transition) {
        self.incoming.insert(transition.result_id(), transition);
    }

    pub fn contains(&self, id: VersionId) -> bool {
        self.versions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn version(&self, id: VersionId) -> Result<&Node, CollabError> {
        self.versions
            .get(&id)
            .map(|stored| &stored.doc)
            .ok_or(CollabError::MissingVersion(id))
    }

    pub fn base_of(&self, id: VersionId) -> Option<VersionId> {
        self.versions.get(&id).and_then(|stored| stored.base_id)
    }

    pub fn incoming(&self, id: VersionId) -> Option<&Transition> {
        self.incoming.get(&id)
    }

    /// The transitions leading from `from` to `to`, oldest first.
    pub fn transitions_between(&self, from: VersionId, to: VersionId) -> Result<Vec<Transition>, CollabError> {
        let mut chain = Vec::new();
        let mut current = to;
        while current != from {
            // a chain longer than the number of transitions means a cycle
            let transition = match self.incoming.get(&current) {
                Some(transition) if chain.len() < self.incoming.len() => transition,
                _ => return Err(CollabError::UnconnectedVersions { from, to }),
            };
            chain.push(transition.clone());
            current = transition.base_id;
        }
        chain.reverse();
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_model::{doc, p, Pos};
    use quire_transform::StepRegistry;
    use std::sync::Arc;

    fn typed(doc: &Node, text: &str) -> Transform {
        let mut tr = Transform::new(Arc::new(StepRegistry::standard()), doc.clone());
        tr.insert_text(&Pos::new(vec![0], 0), text);
        tr
    }

    fn chain(store: &mut VersionStore, base: VersionId, texts: &[&str]) -> Vec<VersionId> {
        let mut ids = Vec::new();
        let mut current = base;
        for text in texts {
            let tr = typed(store.version(current).unwrap(), text);
            let transition = Transition::new(VersionId::random(), current, ClientId(1), tr);
            let next = transition.result_id();
            store.store_version(next, Some(current), transition.transform.doc().clone());
            store.store_transition(transition);
            ids.push(next);
            current = next;
        }
        ids
    }

    #[test]
    fn test_transitions_between_walks_back() {
        let mut store = VersionStore::with_root(doc![p!["x"]].node);
        let ids = chain(&mut store, VersionId::NULL, &["a", "b", "c"]);

        let between = store.transitions_between(ids[0], ids[2]).unwrap();
        assert_eq!(between.len(), 2);
        assert_eq!(between[0].base_id, ids[0]);
        assert_eq!(between[1].result_id(), ids[2]);
        assert!(store.transitions_between(ids[1], ids[1]).unwrap().is_empty());
        assert_eq!(store.version(ids[2]).unwrap(), &doc![p!["cbax"]].node);
        assert_eq!(store.base_of(ids[1]), Some(ids[0]));
    }

    #[test]
    fn test_unconnected_versions() {
        let mut store = VersionStore::with_root(doc![p!["x"]].node);
        let left = chain(&mut store, VersionId::NULL, &["a"]);
        let right = chain(&mut store, VersionId::NULL, &["b"]);
        assert!(matches!(
            store.transitions_between(left[0], right[0]),
            Err(CollabError::UnconnectedVersions { .. })
        ));
        assert!(matches!(
            store.version(VersionId(42)),
            Err(CollabError::MissingVersion(VersionId(42)))
        ));
    }
}
