use crate::{
    error::OrbitError,
    persistence::PersistenceAdapter,
    properties::{Edge, EdgeId, GraphSnapshot, Node, NodeId},
};
use parking_lot::RwLock;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

#[derive(Debug, Default)]
struct MemoryState {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeId, Edge>,
    collapsed: BTreeSet<NodeId>,
    offline: bool,
    writes: usize,
}

impl MemoryState {
    fn check_online(&self) -> Result<(), OrbitError> {
        match self.offline {
            true => Err(OrbitError::Persistence("store is offline".to_string())),
            false => Ok(()),
        }
    }
}

/// An in-process store. Clones share the same underlying state, so a test (or a second
/// "device") can hold a handle and mutate what the session will later read back.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore(Arc<RwLock<MemoryState>>);

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn from_snapshot(snapshot: GraphSnapshot) -> MemoryStore {
        let collapsed = snapshot.collapsed_ids().into_iter().collect();
        let state = MemoryState {
            nodes: snapshot
                .nodes
                .into_iter()
                .map(|n| (n.id.clone(), n))
                .collect(),
            edges: snapshot
                .edges
                .into_iter()
                .map(|e| (e.id.clone(), e))
                .collect(),
            collapsed,
            ..Default::default()
        };
        MemoryStore(Arc::new(RwLock::new(state)))
    }

    /// While offline every call fails with [`OrbitError::Persistence`].
    pub fn set_offline(&self, offline: bool) {
        self.0.write().offline = offline;
    }

    /// Change a durable collapsed flag behind the session's back, the way another device would.
    pub fn set_remote_flag(&self, id: &NodeId, is_collapsed: bool) {
        let mut state = self.0.write();
        match is_collapsed {
            true => state.collapsed.insert(id.clone()),
            false => state.collapsed.remove(id),
        };
    }

    pub fn collapsed(&self) -> BTreeSet<NodeId> {
        self.0.read().collapsed.clone()
    }

    /// Number of successful write calls so far.
    pub fn writes(&self) -> usize {
        self.0.read().writes
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let state = self.0.read();
        GraphSnapshot {
            nodes: state
                .nodes
                .values()
                .cloned()
                .map(|mut n| {
                    n.is_collapsed = state.collapsed.contains(&n.id);
                    n
                })
                .collect(),
            edges: state.edges.values().cloned().collect(),
            collapsed: state.collapsed.iter().cloned().collect(),
        }
    }
}

impl PersistenceAdapter for MemoryStore {
    async fn load_all(&self) -> Result<GraphSnapshot, OrbitError> {
        self.0.read().check_online()?;
        Ok(self.snapshot())
    }

    async fn load_collapsed_flags(&self) -> Result<BTreeMap<NodeId, bool>, OrbitError> {
        let state = self.0.read();
        state.check_online()?;
        Ok(state
            .nodes
            .keys()
            .map(|id| (id.clone(), state.collapsed.contains(id)))
            .collect())
    }

    async fn save_node_flag(&self, id: &NodeId, is_collapsed: bool) -> Result<(), OrbitError> {
        let mut state = self.0.write();
        state.check_online()?;
        if !state.nodes.contains_key(id) {
            return Err(OrbitError::NotFound(format!("node {id}")));
        }
        match is_collapsed {
            true => state.collapsed.insert(id.clone()),
            false => state.collapsed.remove(id),
        };
        state.writes += 1;
        Ok(())
    }

    async fn save_snapshot(&self, snapshot: &GraphSnapshot) -> Result<(), OrbitError> {
        let mut state = self.0.write();
        state.check_online()?;
        state.nodes = snapshot
            .nodes
            .iter()
            .map(|n| (n.id.clone(), n.clone()))
            .collect();
        state.edges = snapshot
            .edges
            .iter()
            .map(|e| (e.id.clone(), e.clone()))
            .collect();
        state.collapsed = snapshot.collapsed_ids().into_iter().collect();
        state.writes += 1;
        Ok(())
    }

    async fn upsert_node(&self, node: &Node) -> Result<(), OrbitError> {
        let mut state = self.0.write();
        state.check_online()?;
        match node.is_collapsed {
            true => state.collapsed.insert(node.id.clone()),
            false => state.collapsed.remove(&node.id),
        };
        state.nodes.insert(node.id.clone(), node.clone());
        state.writes += 1;
        Ok(())
    }

    async fn insert_edge(&self, edge: &Edge) -> Result<(), OrbitError> {
        let mut state = self.0.write();
        state.check_online()?;
        state.edges.insert(edge.id.clone(), edge.clone());
        state.writes += 1;
        Ok(())
    }

    async fn remove_nodes(&self, ids: &[NodeId]) -> Result<(), OrbitError> {
        let mut state = self.0.write();
        state.check_online()?;
        let doomed: BTreeSet<&NodeId> = ids.iter().collect();
        state
            .edges
            .retain(|_, e| !doomed.contains(&e.from) && !doomed.contains(&e.to));
        for id in ids {
            state.nodes.remove(id);
            state.collapsed.remove(id);
        }
        state.writes += 1;
        Ok(())
    }
}
