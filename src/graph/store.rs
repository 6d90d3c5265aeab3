//! The authoritative in-memory copy of every node and edge, collapsed or not.
//!
//! Nodes live in an arena keyed by [`NodeId`]; structure is held in two explicit indexes
//! (children-by-parent and parent-by-child) rather than in references between nodes. The
//! store enforces the forest shape on every insertion: an edge is rejected if its child already
//! has a parent or if it would close a cycle.

use crate::{
    error::OrbitError,
    graph::CollapsedSet,
    properties::{Edge, EdgeId, GraphSnapshot, Node, NodeId},
};
use petgraph::{algo::is_cyclic_directed, graphmap::DiGraphMap};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphStore {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeId, Edge>,
    children: BTreeMap<NodeId, BTreeSet<NodeId>>,
    /// child -> id of its single incoming edge
    parents: BTreeMap<NodeId, EdgeId>,
}

/// What a cascading delete took out of the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removed {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
}

impl GraphStore {
    pub fn empty() -> GraphStore {
        GraphStore::default()
    }

    /// Build a store from whatever a persistence backend returned.
    ///
    /// Loading is lenient: records that would break the forest invariant (duplicate ids,
    /// dangling edges, second parents, cycles) are dropped and returned as diagnostics rather
    /// than failing the whole load. Durable `is_collapsed` flags are cleared; the caller
    /// re-applies collapsed state through the cluster engine.
    pub fn load(nodes: Vec<Node>, edges: Vec<Edge>) -> (GraphStore, Vec<OrbitError>) {
        let mut store = GraphStore::default();
        let mut diagnostics = Vec::new();

        for mut node in nodes {
            if store.nodes.contains_key(&node.id) {
                diagnostics.push(OrbitError::Structural(format!(
                    "duplicate node id {}",
                    node.id
                )));
                continue;
            }
            node.is_root = true;
            node.is_collapsed = false;
            store.nodes.insert(node.id.clone(), node);
        }

        for edge in edges {
            if let Err(e) = store.insert_edge(edge) {
                diagnostics.push(e);
            }
        }

        for diagnostic in diagnostics.iter() {
            tracing::warn!("[GraphStore::load] dropped record: {diagnostic}");
        }
        tracing::debug!(
            "[GraphStore::load] {} nodes, {} edges, {} roots",
            store.nodes.len(),
            store.edges.len(),
            store.roots().count()
        );
        (store, diagnostics)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn roots(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|n| n.is_root)
    }

    pub fn children(&self, id: &NodeId) -> impl Iterator<Item = &NodeId> {
        self.children.get(id).into_iter().flatten()
    }

    pub fn child_count(&self, id: &NodeId) -> usize {
        self.children.get(id).map(|c| c.len()).unwrap_or(0)
    }

    /// The incoming edge of `id`, if it is not a root.
    pub fn incoming(&self, id: &NodeId) -> Option<&Edge> {
        self.parents.get(id).and_then(|eid| self.edges.get(eid))
    }

    pub fn parent(&self, id: &NodeId) -> Option<&NodeId> {
        self.incoming(id).map(|edge| &edge.from)
    }

    /// Every node below `id`, breadth-first (so each node appears after its parent).
    pub fn descendants(&self, id: &NodeId) -> Result<Vec<NodeId>, OrbitError> {
        let mut result = Vec::new();
        let mut visited = BTreeSet::from([id.clone()]);
        let mut queue: VecDeque<&NodeId> = self.children(id).collect();

        while let Some(current) = queue.pop_front() {
            if current == id {
                return Err(OrbitError::Structural(format!(
                    "node {id} is its own descendant"
                )));
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            result.push(current.clone());
            queue.extend(self.children(current));
        }
        Ok(result)
    }

    /// Ancestors of `id`, nearest first, ending at its root.
    pub fn ancestors(&self, id: &NodeId) -> Result<Vec<NodeId>, OrbitError> {
        let mut chain = Vec::new();
        let mut visited = BTreeSet::from([id.clone()]);
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            if !visited.insert(parent.clone()) {
                return Err(OrbitError::Structural(format!(
                    "cycle detected above node {id} at {parent}"
                )));
            }
            chain.push(parent.clone());
            current = parent;
        }
        Ok(chain)
    }

    /// Number of edges between `id` and its root.
    pub fn depth(&self, id: &NodeId) -> Result<usize, OrbitError> {
        self.ancestors(id).map(|chain| chain.len())
    }

    fn is_ancestor_or_self(&self, candidate: &NodeId, of: &NodeId) -> bool {
        let mut visited = BTreeSet::new();
        let mut current = Some(of);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            if !visited.insert(id) {
                return false;
            }
            current = self.parent(id);
        }
        false
    }

    /// Insert a node with no edges yet. The node starts out as a root.
    pub fn add_node(&mut self, mut node: Node) -> Result<(), OrbitError> {
        if self.nodes.contains_key(&node.id) {
            return Err(OrbitError::InvalidOperation(format!(
                "node {} already exists",
                node.id
            )));
        }
        node.is_root = !self.parents.contains_key(&node.id);
        node.is_collapsed = false;
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Replace a node's content. Structural flags (`is_root`, `is_collapsed`) are owned by the
    /// store and the collapsed-set, so they are carried over from the existing record.
    pub fn update_node(&mut self, node: Node) -> Result<&Node, OrbitError> {
        let Some(existing) = self.nodes.get_mut(&node.id) else {
            return Err(OrbitError::NotFound(format!("node {}", node.id)));
        };
        let is_root = existing.is_root;
        let is_collapsed = existing.is_collapsed;
        *existing = Node {
            is_root,
            is_collapsed,
            ..node
        };
        Ok(existing)
    }

    pub(crate) fn set_collapsed_flag(&mut self, id: &NodeId, is_collapsed: bool) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.is_collapsed = is_collapsed;
        }
    }

    pub fn insert_edge(&mut self, edge: Edge) -> Result<(), OrbitError> {
        for end in [&edge.from, &edge.to] {
            if !self.nodes.contains_key(end) {
                return Err(OrbitError::NotFound(format!(
                    "edge {} ({edge}) references unknown node {end}",
                    edge.id
                )));
            }
        }
        if self.edges.contains_key(&edge.id) {
            return Err(OrbitError::InvalidOperation(format!(
                "edge id {} already exists",
                edge.id
            )));
        }
        if let Some(existing) = self.parent(&edge.to) {
            return Err(OrbitError::Structural(format!(
                "node {} already has parent {existing}, edge {edge} rejected",
                edge.to
            )));
        }
        if self.is_ancestor_or_self(&edge.to, &edge.from) {
            return Err(OrbitError::Structural(format!(
                "edge {edge} would close a cycle"
            )));
        }

        self.children
            .entry(edge.from.clone())
            .or_default()
            .insert(edge.to.clone());
        self.parents.insert(edge.to.clone(), edge.id.clone());
        if let Some(child) = self.nodes.get_mut(&edge.to) {
            child.is_root = false;
        }
        self.edges.insert(edge.id.clone(), edge);
        Ok(())
    }

    pub fn remove_edge(&mut self, id: &EdgeId) -> Option<Edge> {
        let edge = self.edges.remove(id)?;
        if let Some(siblings) = self.children.get_mut(&edge.from) {
            siblings.remove(&edge.to);
            if siblings.is_empty() {
                self.children.remove(&edge.from);
            }
        }
        if self.parents.get(&edge.to) == Some(&edge.id) {
            self.parents.remove(&edge.to);
            if let Some(child) = self.nodes.get_mut(&edge.to) {
                child.is_root = true;
            }
        }
        Some(edge)
    }

    /// Delete `id` together with every descendant and every edge touching them.
    pub fn remove_subtree(&mut self, id: &NodeId) -> Result<Removed, OrbitError> {
        if !self.nodes.contains_key(id) {
            return Err(OrbitError::NotFound(format!("node {id}")));
        }
        let mut doomed = vec![id.clone()];
        doomed.extend(self.descendants(id)?);

        let doomed_set: BTreeSet<&NodeId> = doomed.iter().collect();
        let edge_ids: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| doomed_set.contains(&e.from) || doomed_set.contains(&e.to))
            .map(|e| e.id.clone())
            .collect();

        for eid in edge_ids.iter() {
            self.remove_edge(eid);
        }
        for nid in doomed.iter() {
            self.nodes.remove(nid);
            self.children.remove(nid);
        }
        tracing::debug!(
            "[GraphStore::remove_subtree] removed {} nodes and {} edges under {id}",
            doomed.len(),
            edge_ids.len()
        );
        Ok(Removed {
            nodes: doomed,
            edges: edge_ids,
        })
    }

    pub fn snapshot(&self, collapsed: &CollapsedSet) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.values().cloned().collect(),
            collapsed: collapsed.iter().cloned().collect(),
        }
    }

    fn as_graphmap(&self) -> DiGraphMap<&str, ()> {
        let mut graph = DiGraphMap::new();
        for id in self.nodes.keys() {
            graph.add_node(id.as_str());
        }
        for edge in self.edges.values() {
            graph.add_edge(edge.from.as_str(), edge.to.as_str(), ());
        }
        graph
    }

    /// Cross-check the indexes against the edge list and the forest invariant. Returns a
    /// description of every violation found; an empty vector means the store is consistent.
    pub fn built_in_test(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for edge in self.edges.values() {
            for end in [&edge.from, &edge.to] {
                if !self.nodes.contains_key(end) {
                    errors.push(format!("edge {edge} references missing node {end}"));
                }
            }
            if self.parents.get(&edge.to) != Some(&edge.id) {
                errors.push(format!("parent index does not point at edge {edge}"));
            }
            if !self
                .children
                .get(&edge.from)
                .is_some_and(|c| c.contains(&edge.to))
            {
                errors.push(format!("children index is missing edge {edge}"));
            }
        }

        for node in self.nodes.values() {
            let has_parent = self.parents.contains_key(&node.id);
            if node.is_root == has_parent {
                errors.push(format!(
                    "node {} has is_root={} but {} incoming edge",
                    node.id,
                    node.is_root,
                    if has_parent { "an" } else { "no" }
                ));
            }
        }

        let child_count: usize = self.children.values().map(|c| c.len()).sum();
        if child_count != self.edges.len() {
            errors.push(format!(
                "children index holds {child_count} links for {} edges",
                self.edges.len()
            ));
        }

        if is_cyclic_directed(&self.as_graphmap()) {
            errors.push("edge set contains a cycle".to_string());
        }

        if !errors.is_empty() {
            tracing::debug!("GraphStore isn't consistent. Errors:\n- {}", errors.join("\n- "));
        }
        errors
    }
}
