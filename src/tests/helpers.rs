//! Shared fixtures for unit tests

use crate::{
    persistence::MemoryStore,
    properties::{Edge, GraphSnapshot, Node, NodeId},
};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

pub fn parent(id: &str) -> Node {
    Node::parent(id).with_id(id)
}

pub fn leaf(id: &str) -> Node {
    Node::new(id).with_id(id)
}

/// Edge with a deterministic id so snapshots compare equal across runs.
pub fn edge(from: &str, to: &str) -> Edge {
    Edge {
        id: format!("{from}->{to}").into(),
        from: id(from),
        to: id(to),
    }
}

/// `Root -> A -> {B, C}`: labels equal ids.
pub fn scenario_snapshot() -> GraphSnapshot {
    GraphSnapshot {
        nodes: vec![parent("Root"), parent("A"), leaf("B"), leaf("C")],
        edges: vec![edge("Root", "A"), edge("A", "B"), edge("A", "C")],
        collapsed: vec![],
    }
}

/// `A -> B -> C -> D`, every inner node a parent.
pub fn chain_snapshot() -> GraphSnapshot {
    GraphSnapshot {
        nodes: vec![parent("A"), parent("B"), parent("C"), leaf("D")],
        edges: vec![edge("A", "B"), edge("B", "C"), edge("C", "D")],
        collapsed: vec![],
    }
}

/// `R -> M -> T` plus a visible sibling `R -> S`.
pub fn reveal_snapshot() -> GraphSnapshot {
    GraphSnapshot {
        nodes: vec![parent("R"), parent("M"), leaf("T"), leaf("S")],
        edges: vec![edge("R", "M"), edge("M", "T"), edge("R", "S")],
        collapsed: vec![],
    }
}

pub fn memory_store(snapshot: GraphSnapshot) -> MemoryStore {
    init_logging();
    MemoryStore::from_snapshot(snapshot)
}
