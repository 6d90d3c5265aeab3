use crate::{graph::GraphStore, properties::NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{btree_set, BTreeSet};

/// Ids of the parents whose subtree is currently rendered as a cluster.
///
/// Membership is retained on nodes hidden behind a collapsed ancestor; it only takes visible
/// effect once every ancestor above it is expanded. Mutation is reserved to the cluster engine
/// so the set never drifts from the durable `is_collapsed` flags it mirrors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollapsedSet(BTreeSet<NodeId>);

impl CollapsedSet {
    pub fn new() -> CollapsedSet {
        CollapsedSet::default()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, NodeId> {
        self.0.iter()
    }

    pub(crate) fn insert(&mut self, id: NodeId) -> bool {
        self.0.insert(id)
    }

    pub(crate) fn remove(&mut self, id: &NodeId) -> bool {
        self.0.remove(id)
    }

    /// Members that break the parent-only invariant against `store`: unknown ids and
    /// non-parent nodes.
    pub fn invalid_members(&self, store: &GraphStore) -> Vec<NodeId> {
        self.0
            .iter()
            .filter(|id| !store.get(id).is_some_and(|n| n.is_parent))
            .cloned()
            .collect()
    }
}

impl FromIterator<NodeId> for CollapsedSet {
    fn from_iter<T: IntoIterator<Item = NodeId>>(iter: T) -> Self {
        CollapsedSet(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a CollapsedSet {
    type Item = &'a NodeId;
    type IntoIter = btree_set::Iter<'a, NodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
